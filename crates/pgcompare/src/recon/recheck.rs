//! Check mode: re-read previously out-of-sync rows on both sides through
//! the column map and confirm or clear each finding in-process.
//!
//! Staging tables are never touched here; only the findings tables are
//! read and (for resolved rows) pruned.

use crate::config::Config;
use crate::dialect::Platform;
use crate::driver::SourceClient;
use crate::error::{CompareError, Result};
use crate::mapping::{CompiledSide, CompiledTable};
use crate::model::{
    ColumnMapEntry, Finding, RecheckOutcome, RecheckSummary, Side, TableEntry, TableMap,
};
use crate::repo::RepoPool;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Build the single-row fingerprint SELECT for one side: the extract
/// projection narrowed by one equality predicate per pk column, bound in
/// pk-alias order.
pub fn build_recheck_sql(
    platform: Platform,
    table_map: &TableMap,
    compiled: &CompiledSide,
    entries: &[ColumnMapEntry],
    side: Side,
    table_alias: &str,
) -> Result<String> {
    let table = platform.qualify(
        &table_map.schema_name,
        &table_map.table_name,
        table_map.schema_preserve_case,
        table_map.table_preserve_case,
    );

    let mut conditions: Vec<String> = Vec::new();
    if let Some(filter) = &table_map.table_filter {
        if !filter.is_empty() {
            conditions.push(format!("({})", filter));
        }
    }

    for (n, alias) in compiled.pk_aliases.iter().enumerate() {
        let info = entries
            .iter()
            .find(|e| &e.alias == alias)
            .and_then(|e| e.side(side))
            .ok_or_else(|| {
                CompareError::map(table_alias, format!("pk alias '{}' missing from map", alias))
            })?;
        conditions.push(format!(
            "{} = {}",
            info.value_expression,
            platform.bind_placeholder(n + 1)
        ));
    }

    Ok(format!(
        "SELECT {} AS pk_hash, {} AS column_hash, {} AS pk FROM {} WHERE {}",
        compiled.pk_hash_expr,
        compiled.column_hash_expr,
        compiled.pk_json_expr,
        table,
        conditions.join(" AND ")
    ))
}

/// Bind values for one finding: the stored pk JSON values in pk-alias
/// order, as canonical text.
fn binds_for(finding: &Finding, pk_aliases: &[String]) -> Vec<String> {
    pk_aliases
        .iter()
        .map(|alias| match finding.pk.get(alias) {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        })
        .collect()
}

/// Re-examine every finding of a tid/batch. Returns the outcome counts.
#[allow(clippy::too_many_arguments)]
pub async fn run_recheck(
    cfg: &Config,
    repo: &RepoPool,
    entry: &TableEntry,
    source_map: &TableMap,
    target_map: &TableMap,
    compiled: &CompiledTable,
) -> Result<RecheckSummary> {
    let findings = repo.get_findings(entry.tid, entry.batch_nbr).await?;
    let mut summary = RecheckSummary::default();
    if findings.is_empty() {
        info!("recheck {}: no findings to examine", entry.alias);
        return Ok(summary);
    }

    let source_sql = build_recheck_sql(
        cfg.source.platform,
        source_map,
        &compiled.source,
        &compiled.entries,
        Side::Source,
        &entry.alias,
    )?;
    let target_sql = build_recheck_sql(
        cfg.target.platform,
        target_map,
        &compiled.target,
        &compiled.entries,
        Side::Target,
        &entry.alias,
    )?;
    debug!("recheck source sql: {}", source_sql);
    debug!("recheck target sql: {}", target_sql);

    let mut source = SourceClient::connect("source", &cfg.source).await?;
    let mut target = SourceClient::connect("target", &cfg.target).await?;

    // A not_equal verdict produces one finding per side for the same row;
    // group by pk so each row is re-read once and both findings share the
    // outcome.
    let mut groups: BTreeMap<String, Vec<Finding>> = BTreeMap::new();
    for finding in findings {
        groups
            .entry(finding.pk.to_string())
            .or_default()
            .push(finding);
    }

    info!(
        "recheck {}: re-reading {} out-of-sync rows",
        entry.alias,
        groups.len()
    );

    for (pk_text, group) in groups {
        let binds = binds_for(&group[0], &compiled.source.pk_aliases);
        let src = source
            .fetch_fingerprint(&source_sql, &binds, entry.tid)
            .await?;
        let tgt = target
            .fetch_fingerprint(&target_sql, &binds, entry.tid)
            .await?;

        let outcome = match (&src, &tgt) {
            (Some(s), Some(t)) if s.pk_hash == t.pk_hash && s.column_hash == t.column_hash => {
                RecheckOutcome::Resolved
            }
            (Some(_), Some(_)) => RecheckOutcome::Confirmed,
            (None, None) => RecheckOutcome::Resolved,
            _ => RecheckOutcome::StillMissing,
        };

        match outcome {
            RecheckOutcome::Resolved => {
                summary.resolved += 1;
                for finding in &group {
                    repo.delete_finding(finding).await?;
                }
                debug!("recheck {}: pk {} resolved", entry.alias, pk_text);
            }
            RecheckOutcome::Confirmed => {
                summary.confirmed += 1;
                warn!("recheck {}: pk {} confirmed out-of-sync", entry.alias, pk_text);
            }
            RecheckOutcome::StillMissing => {
                summary.still_missing += 1;
                warn!("recheck {}: pk {} still missing", entry.alias, pk_text);
            }
        }
    }

    info!(
        "recheck {}: confirmed={} resolved={} stillMissing={}",
        entry.alias, summary.confirmed, summary.resolved, summary.still_missing
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cast::CastOptions;
    use crate::mapping::{align, build_column_info, compile};
    use crate::model::{CatalogColumn, FindingStatus};
    use std::collections::HashMap;

    fn catalog(name: &str, data_type: &str, pk: bool) -> CatalogColumn {
        CatalogColumn {
            owner: "public".to_string(),
            table_name: "emp".to_string(),
            column_name: name.to_string(),
            data_type: data_type.to_string(),
            data_length: 0,
            data_precision: if pk { 10 } else { 0 },
            data_scale: 0,
            nullable: !pk,
            primary_key: pk,
        }
    }

    fn compiled_pair() -> CompiledTable {
        let opts = CastOptions::default();
        let cols: Vec<_> = [catalog("id", "numeric", true), catalog("name", "varchar", false)]
            .iter()
            .map(|c| build_column_info(Platform::Postgres, c, &opts))
            .collect();
        let entries = align(&cols, &cols.clone(), &HashMap::new());
        compile(Platform::Postgres, Platform::Postgres, entries, "emp").unwrap()
    }

    fn table_map() -> TableMap {
        TableMap {
            tid: 1,
            side: Side::Source,
            schema_name: "public".to_string(),
            table_name: "emp".to_string(),
            mod_column: None,
            table_filter: None,
            schema_preserve_case: false,
            table_preserve_case: false,
        }
    }

    #[test]
    fn recheck_sql_binds_each_pk_column() {
        let compiled = compiled_pair();
        let sql = build_recheck_sql(
            Platform::Postgres,
            &table_map(),
            &compiled.source,
            &compiled.entries,
            Side::Source,
            "emp",
        )
        .unwrap();
        assert!(sql.contains("WHERE"));
        assert!(sql.contains("= $1"));
        assert!(!sql.contains("$2")); // single pk column
        assert!(sql.starts_with("SELECT MD5("));
    }

    #[test]
    fn recheck_sql_keeps_table_filter() {
        let compiled = compiled_pair();
        let mut map = table_map();
        map.table_filter = Some("active = true".to_string());
        let sql = build_recheck_sql(
            Platform::Postgres,
            &map,
            &compiled.source,
            &compiled.entries,
            Side::Source,
            "emp",
        )
        .unwrap();
        assert!(sql.contains("(active = true) AND"));
    }

    #[test]
    fn binds_follow_pk_alias_order() {
        let finding = Finding {
            tid: 1,
            batch_nbr: 1,
            side: Side::Source,
            pk: serde_json::json!({"id": "2", "region": "west"}),
            status: FindingStatus::NotEqual,
        };
        let binds = binds_for(&finding, &["id".to_string(), "region".to_string()]);
        assert_eq!(binds, vec!["2", "west"]);
    }

    #[test]
    fn binds_render_non_string_values_as_text() {
        let finding = Finding {
            tid: 1,
            batch_nbr: 1,
            side: Side::Source,
            pk: serde_json::json!({"id": 2}),
            status: FindingStatus::Missing,
        };
        let binds = binds_for(&finding, &["id".to_string()]);
        assert_eq!(binds, vec!["2"]);
    }
}
