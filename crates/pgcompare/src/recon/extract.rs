//! Extractor workers: shard a table's rows, stream fingerprints from the
//! engine, and push batches onto the side's queue.

use super::queue::BatchSender;
use super::sync::SyncState;
use crate::config::Config;
use crate::dialect::Platform;
use crate::driver::{FingerprintQuery, SourceClient};
use crate::error::{CompareError, Result};
use crate::mapping::CompiledSide;
use crate::model::{ColumnMapEntry, DataClass, Side, TableMap};
use crate::repo::RepoPool;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long a throttled extractor sleeps before re-checking the flag.
const THROTTLE_PAUSE: Duration = Duration::from_millis(250);

/// One extractor shard assignment.
#[derive(Debug, Clone)]
pub struct ShardSpec {
    pub side: Side,
    pub shard: i32,
    pub shard_count: i32,
    pub tid: i32,
    pub batch_nbr: i32,
}

/// Resolve the shard column's quoted name and data class from the column
/// map, matching the configured mod_column case-insensitively.
pub fn resolve_mod_column(
    platform: Platform,
    entries: &[ColumnMapEntry],
    side: Side,
    mod_column: &str,
) -> Option<(String, DataClass)> {
    entries.iter().find_map(|entry| {
        let info = entry.side(side)?;
        if info.column_name.eq_ignore_ascii_case(mod_column) {
            Some((
                platform.quote(&info.column_name, info.preserve_case),
                info.data_class,
            ))
        } else {
            None
        }
    })
}

/// Build the fingerprint SELECT for one shard.
pub fn build_extract_sql(
    platform: Platform,
    table_map: &TableMap,
    compiled: &CompiledSide,
    spec: &ShardSpec,
    mod_column: Option<&(String, DataClass)>,
    database_sort: bool,
) -> String {
    let table = platform.qualify(
        &table_map.schema_name,
        &table_map.table_name,
        table_map.schema_preserve_case,
        table_map.table_preserve_case,
    );

    let mut sql = format!(
        "SELECT {} AS pk_hash, {} AS column_hash, {} AS pk FROM {}",
        compiled.pk_hash_expr, compiled.column_hash_expr, compiled.pk_json_expr, table
    );

    let mut conditions: Vec<String> = Vec::new();
    if let Some(filter) = &table_map.table_filter {
        if !filter.is_empty() {
            conditions.push(format!("({})", filter));
        }
    }
    if spec.shard_count > 1 {
        if let Some((column, data_class)) = mod_column {
            conditions.push(platform.shard_predicate(
                column,
                *data_class,
                spec.shard_count,
                spec.shard,
            ));
        }
    }
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    if database_sort {
        sql.push_str(" ORDER BY 1");
    }
    sql
}

/// Run one extractor shard to completion.
///
/// On normal end of cursor an empty sentinel batch is enqueued and the
/// side's running-extractor counter is decremented; the last shard out
/// raises the side's complete flag. Errors are recorded on the sync state
/// so the reconciler marks the table failed.
#[allow(clippy::too_many_arguments)]
pub async fn run_extractor(
    cfg: Arc<Config>,
    table_alias: String,
    spec: ShardSpec,
    sql: String,
    queue: Option<BatchSender>,
    repo: RepoPool,
    sync: Arc<SyncState>,
    cancel: CancellationToken,
) -> Result<u64> {
    let side = spec.side;
    let worker = format!("extract-{}-s{}", side, spec.shard);
    debug!("{}: {}", worker, sql);

    let db = cfg.side(side).clone();
    let client = match SourceClient::connect(side.as_str(), &db).await {
        Ok(c) => c,
        Err(e) => {
            sync.record_extract_error();
            sync.extractor_finished(side);
            warn!("{}: connect failed: {}", worker, e);
            return Err(e);
        }
    };

    let mut rx = client.stream_fingerprints(FingerprintQuery {
        sql,
        tid: spec.tid,
        fetch_size: cfg.batch_fetch_size,
    });

    let mut rows: u64 = 0;
    let mut next_report = cfg.batch_progress_report_size;
    let result = loop {
        let batch = match rx.recv().await {
            Some(Ok(batch)) => batch,
            Some(Err(e)) => {
                sync.record_extract_error();
                break Err(CompareError::extract(&table_alias, e));
            }
            None => break Ok(()),
        };

        if cancel.is_cancelled() {
            break Err(CompareError::Cancelled);
        }

        // Observer throttle: stall before the next enqueue until cleared.
        while sync.is_throttled() && !cancel.is_cancelled() {
            tokio::time::sleep(THROTTLE_PAUSE).await;
        }

        let batch_rows = batch.len() as u64;
        rows += batch_rows;
        let total = sync.add_rows_extracted(side, batch_rows);
        if total >= next_report {
            info!("{}: extracted {} rows ({} total on side)", worker, rows, total);
            next_report += cfg.batch_progress_report_size;
        }

        match &queue {
            Some(tx) => {
                if tx.send(batch).await.is_err() {
                    // All loaders are gone; nothing left to feed.
                    break Ok(());
                }
            }
            None => {
                // Degraded mode (loader-threads = 0): write synchronously.
                if let Err(e) = repo
                    .insert_fingerprints(side, spec.batch_nbr, &batch)
                    .await
                {
                    sync.record_extract_error();
                    break Err(e);
                }
                sync.add_rows_loaded(side, batch_rows);
            }
        }
    };

    // End-of-cursor sentinel, then leave the running set.
    if let Some(tx) = &queue {
        let _ = tx.send(Vec::new()).await;
    }
    sync.extractor_finished(side);

    match result {
        Ok(()) => {
            info!("{}: shard complete, {} rows", worker, rows);
            Ok(rows)
        }
        Err(e) => {
            warn!("{}: shard failed: {}", worker, e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::CompiledSide;

    fn table_map(filter: Option<&str>, mod_column: Option<&str>) -> TableMap {
        TableMap {
            tid: 1,
            side: Side::Source,
            schema_name: "hr".to_string(),
            table_name: "emp".to_string(),
            mod_column: mod_column.map(str::to_string),
            table_filter: filter.map(str::to_string),
            schema_preserve_case: false,
            table_preserve_case: false,
        }
    }

    fn compiled() -> CompiledSide {
        CompiledSide {
            pk_hash_expr: "MD5(CONCAT_WS('', pkv))".to_string(),
            column_hash_expr: "MD5(CONCAT_WS('', colv))".to_string(),
            pk_json_expr: "CONCAT_WS('', '{\"id\": \"', pkv, '\"}')".to_string(),
            pk_aliases: vec!["id".to_string()],
        }
    }

    fn spec(shard: i32, count: i32) -> ShardSpec {
        ShardSpec {
            side: Side::Source,
            shard,
            shard_count: count,
            tid: 1,
            batch_nbr: 1,
        }
    }

    #[test]
    fn basic_select_shape() {
        let sql = build_extract_sql(
            Platform::Postgres,
            &table_map(None, None),
            &compiled(),
            &spec(0, 1),
            None,
            false,
        );
        assert!(sql.starts_with("SELECT MD5(CONCAT_WS('', pkv)) AS pk_hash"));
        assert!(sql.contains("FROM hr.emp"));
        assert!(!sql.contains("WHERE"));
        assert!(!sql.contains("ORDER BY"));
    }

    #[test]
    fn filter_and_shard_predicate() {
        let mod_col = ("id".to_string(), DataClass::Numeric);
        let sql = build_extract_sql(
            Platform::Postgres,
            &table_map(Some("active = true"), Some("id")),
            &compiled(),
            &spec(2, 4),
            Some(&mod_col),
            false,
        );
        assert!(sql.contains("WHERE (active = true) AND MOD(ABS(id), 4) = 2"));
    }

    #[test]
    fn single_shard_skips_predicate() {
        let mod_col = ("id".to_string(), DataClass::Numeric);
        let sql = build_extract_sql(
            Platform::Postgres,
            &table_map(None, Some("id")),
            &compiled(),
            &spec(0, 1),
            Some(&mod_col),
            false,
        );
        assert!(!sql.contains("MOD("));
    }

    #[test]
    fn database_sort_appends_order_by() {
        let sql = build_extract_sql(
            Platform::Oracle,
            &table_map(None, None),
            &compiled(),
            &spec(0, 1),
            None,
            true,
        );
        assert!(sql.ends_with("ORDER BY 1"));
    }

    #[test]
    fn resolve_mod_column_matches_case_insensitively() {
        use crate::cast::CastOptions;
        use crate::mapping::build_column_info;
        use crate::model::CatalogColumn;

        let raw = CatalogColumn {
            owner: "hr".to_string(),
            table_name: "emp".to_string(),
            column_name: "EMP_ID".to_string(),
            data_type: "number".to_string(),
            data_length: 0,
            data_precision: 10,
            data_scale: 0,
            nullable: false,
            primary_key: true,
        };
        let info = build_column_info(Platform::Oracle, &raw, &CastOptions::default());
        let entries = vec![ColumnMapEntry {
            alias: "emp_id".to_string(),
            source: Some(info.clone()),
            target: Some(info),
        }];

        let resolved =
            resolve_mod_column(Platform::Oracle, &entries, Side::Source, "emp_id").unwrap();
        assert_eq!(resolved.0, "EMP_ID");
        assert_eq!(resolved.1, DataClass::Numeric);
    }
}
