//! Table and column discovery: scan the endpoint catalogs and write the
//! table, table-map, and column-map metadata rows the reconciler reads.

use crate::config::Config;
use crate::driver::SourceClient;
use crate::error::Result;
use crate::mapping::{self, align};
use crate::model::{ColumnInfo, Side, TableMap};
use crate::repo::RepoPool;
use std::collections::HashMap;
use tracing::{info, warn};

/// Discover every base table in `schema` on the target, register it, and
/// compile column maps for both sides. Tables whose source half cannot be
/// read are registered without a column map (a later discover or manual
/// mapping completes them).
pub async fn run_discovery(cfg: &Config, repo: &RepoPool, schema: &str) -> Result<usize> {
    info!("Performing table discovery for schema: {}", schema);

    let mut target = SourceClient::connect("target", &cfg.target).await?;
    let mut source = SourceClient::connect("source", &cfg.source).await?;

    let tables = target.query_catalog_tables(schema).await?;
    let opts = cfg.cast_options();
    let mut discovered = 0usize;

    for table in &tables {
        let alias = table.table_name.to_lowercase();
        let tid = repo.save_table(cfg.project, &alias).await?;

        for (side, platform) in [
            (Side::Source, cfg.source.platform),
            (Side::Target, cfg.target.platform),
        ] {
            repo.save_table_map(&TableMap {
                tid,
                side,
                schema_name: table.owner.clone(),
                table_name: table.table_name.clone(),
                mod_column: None,
                table_filter: None,
                schema_preserve_case: platform.needs_preserve_case(&table.owner),
                table_preserve_case: platform.needs_preserve_case(&table.table_name),
            })
            .await?;
        }

        let target_cols: Vec<ColumnInfo> = target
            .query_catalog_columns(&table.owner, &table.table_name)
            .await?
            .iter()
            .map(|raw| mapping::build_column_info(cfg.target.platform, raw, &opts))
            .collect();

        let source_cols: Vec<ColumnInfo> = match source
            .query_catalog_columns(&table.owner, &table.table_name)
            .await
        {
            Ok(raw) => raw
                .iter()
                .map(|raw| mapping::build_column_info(cfg.source.platform, raw, &opts))
                .collect(),
            Err(e) => {
                warn!(
                    "Discovered table {} has no readable source columns: {}",
                    table.table_name, e
                );
                Vec::new()
            }
        };

        let entries = align(&source_cols, &target_cols, &HashMap::new());
        repo.save_column_map(tid, Side::Source, &entries).await?;
        repo.save_column_map(tid, Side::Target, &entries).await?;

        info!("Discovered table: {} (tid {})", table.table_name, tid);
        discovered += 1;
    }

    info!("Discovery complete: {} tables", discovered);
    Ok(discovered)
}
