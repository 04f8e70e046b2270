//! Column-map compiler: aligns source and target column metadata into an
//! ordered [`ColumnMapEntry`] list and compiles the per-side hash and pk
//! projection expressions.
//!
//! Ordering inside the hash expressions is always lexicographic by column
//! alias, never catalog order, so hash inputs stay alignment-stable when
//! the two engines report columns differently.

use crate::cast::{self, CastOptions};
use crate::dialect::Platform;
use crate::error::{CompareError, Result};
use crate::model::{CatalogColumn, ColumnInfo, ColumnMapEntry, Side};
use std::collections::HashMap;
use tracing::warn;

/// The compiled per-side SQL fragments for one table.
#[derive(Debug, Clone)]
pub struct CompiledSide {
    /// MD5 over the ordered canonical pk values.
    pub pk_hash_expr: String,
    /// MD5 over the ordered canonical non-pk values.
    pub column_hash_expr: String,
    /// JSON object literal `{"alias": "value", …}` projected as `pk`.
    pub pk_json_expr: String,
    /// Aliases of the pk columns, in expression order.
    pub pk_aliases: Vec<String>,
}

/// A fully compiled table pair, ready for extraction.
#[derive(Debug, Clone)]
pub struct CompiledTable {
    pub entries: Vec<ColumnMapEntry>,
    pub source: CompiledSide,
    pub target: CompiledSide,
}

/// Build a [`ColumnInfo`] from one catalog row: classify the type, decide
/// case preservation, and compile the canonical value expression.
pub fn build_column_info(
    platform: Platform,
    raw: &CatalogColumn,
    opts: &CastOptions,
) -> ColumnInfo {
    let supported = !matches!(cast::classify(&raw.data_type), cast::TypeClass::Unsupported);
    if !supported {
        warn!(
            "Unsupported data type ({}) for column ({})",
            raw.data_type, raw.column_name
        );
    }

    let preserve_case = platform.needs_preserve_case(&raw.column_name);
    let quoted = platform.quote(&raw.column_name, preserve_case);
    let value_expression = cast::cast_expr(
        platform,
        &quoted,
        &raw.data_type,
        raw.data_precision,
        raw.data_scale,
        opts,
    );

    ColumnInfo {
        column_name: raw.column_name.clone(),
        data_type: raw.data_type.clone(),
        data_length: raw.data_length,
        data_precision: raw.data_precision,
        data_scale: raw.data_scale,
        nullable: raw.nullable,
        primary_key: raw.primary_key,
        data_class: cast::data_class(&raw.data_type),
        preserve_case,
        value_expression,
        supported,
    }
}

/// The logical alias for a column: the override map wins, otherwise the
/// lowercased column name.
fn alias_for(column_name: &str, overrides: &HashMap<String, String>) -> String {
    overrides
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(column_name))
        .map(|(_, v)| v.to_lowercase())
        .unwrap_or_else(|| column_name.to_lowercase())
}

/// Pair source and target columns by case-insensitive alias into an ordered
/// column map. Columns present on only one side become one-sided entries
/// and are excluded from hashing (with a warning).
pub fn align(
    source: &[ColumnInfo],
    target: &[ColumnInfo],
    overrides: &HashMap<String, String>,
) -> Vec<ColumnMapEntry> {
    let mut by_alias: HashMap<String, ColumnMapEntry> = HashMap::new();

    for col in source {
        let alias = alias_for(&col.column_name, overrides);
        by_alias
            .entry(alias.clone())
            .or_insert_with(|| ColumnMapEntry {
                alias,
                source: None,
                target: None,
            })
            .source = Some(col.clone());
    }

    for col in target {
        let alias = alias_for(&col.column_name, overrides);
        by_alias
            .entry(alias.clone())
            .or_insert_with(|| ColumnMapEntry {
                alias,
                source: None,
                target: None,
            })
            .target = Some(col.clone());
    }

    let mut entries: Vec<ColumnMapEntry> = by_alias.into_values().collect();
    entries.sort_by(|a, b| a.alias.cmp(&b.alias));

    for entry in &entries {
        if entry.source.is_none() || entry.target.is_none() {
            let side = if entry.source.is_none() { "source" } else { "target" };
            warn!(
                "Column alias ({}) has no {} counterpart and is excluded from hashing",
                entry.alias, side
            );
        }
    }

    entries
}

/// Compile one side's hash and pk projection expressions from an aligned
/// column map. Fails when the primary key is empty or its cardinality
/// differs between sides.
pub fn compile_side(
    platform: Platform,
    entries: &[ColumnMapEntry],
    side: Side,
    table: &str,
) -> Result<CompiledSide> {
    let mut pk_exprs: Vec<String> = Vec::new();
    let mut pk_pairs: Vec<(String, String)> = Vec::new();
    let mut column_exprs: Vec<String> = Vec::new();

    for entry in entries {
        if !entry.hashable() {
            continue;
        }
        // hashable() guarantees both sides are present.
        let info = entry.side(side).unwrap();
        if entry.is_primary_key() {
            pk_exprs.push(info.value_expression.clone());
            pk_pairs.push((entry.alias.clone(), info.value_expression.clone()));
        } else {
            column_exprs.push(info.value_expression.clone());
        }
    }

    if pk_exprs.is_empty() {
        return Err(CompareError::map(
            table,
            "no usable primary key columns in the column map",
        ));
    }

    Ok(CompiledSide {
        pk_hash_expr: platform.hash_expr(&pk_exprs),
        column_hash_expr: platform.hash_expr(&column_exprs),
        pk_json_expr: platform.pk_json_expr(&pk_pairs),
        pk_aliases: pk_pairs.into_iter().map(|(a, _)| a).collect(),
    })
}

/// Compile both sides of a table pair.
pub fn compile(
    source_platform: Platform,
    target_platform: Platform,
    entries: Vec<ColumnMapEntry>,
    table: &str,
) -> Result<CompiledTable> {
    let source = compile_side(source_platform, &entries, Side::Source, table)?;
    let target = compile_side(target_platform, &entries, Side::Target, table)?;

    if source.pk_aliases.len() != target.pk_aliases.len() {
        return Err(CompareError::map(
            table,
            format!(
                "primary key cardinality differs between sides ({} vs {})",
                source.pk_aliases.len(),
                target.pk_aliases.len()
            ),
        ));
    }

    Ok(CompiledTable {
        entries,
        source,
        target,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DataClass;

    fn catalog_col(name: &str, data_type: &str, pk: bool) -> CatalogColumn {
        CatalogColumn {
            owner: "public".to_string(),
            table_name: "emp".to_string(),
            column_name: name.to_string(),
            data_type: data_type.to_string(),
            data_length: 0,
            data_precision: if data_type == "numeric" { 10 } else { 0 },
            data_scale: if data_type == "numeric" { 2 } else { 0 },
            nullable: !pk,
            primary_key: pk,
        }
    }

    fn info(platform: Platform, name: &str, data_type: &str, pk: bool) -> ColumnInfo {
        build_column_info(platform, &catalog_col(name, data_type, pk), &CastOptions::default())
    }

    #[test]
    fn build_column_info_marks_unsupported() {
        let col = info(Platform::Mssql, "rv", "rowversion", false);
        assert!(!col.supported);
        assert_eq!(col.data_class, DataClass::Char);
        assert!(!col.value_expression.is_empty());
    }

    #[test]
    fn build_column_info_quotes_mixed_case() {
        let col = info(Platform::Postgres, "EmpName", "varchar", false);
        assert!(col.preserve_case);
        assert!(col.value_expression.contains("\"EmpName\""));
    }

    #[test]
    fn align_pairs_case_insensitively_and_sorts() {
        let source = vec![
            info(Platform::Oracle, "SALARY", "number", false),
            info(Platform::Oracle, "ID", "number", true),
            info(Platform::Oracle, "NAME", "varchar2", false),
        ];
        let target = vec![
            info(Platform::Postgres, "id", "int4", true),
            info(Platform::Postgres, "name", "varchar", false),
            info(Platform::Postgres, "salary", "numeric", false),
        ];
        let entries = align(&source, &target, &HashMap::new());
        let aliases: Vec<&str> = entries.iter().map(|e| e.alias.as_str()).collect();
        assert_eq!(aliases, vec!["id", "name", "salary"]);
        assert!(entries.iter().all(|e| e.hashable()));
    }

    #[test]
    fn align_keeps_one_sided_entries_unhashable() {
        let source = vec![info(Platform::Postgres, "id", "int4", true)];
        let target = vec![
            info(Platform::Postgres, "id", "int4", true),
            info(Platform::Postgres, "extra", "varchar", false),
        ];
        let entries = align(&source, &target, &HashMap::new());
        assert_eq!(entries.len(), 2);
        let extra = entries.iter().find(|e| e.alias == "extra").unwrap();
        assert!(!extra.hashable());
    }

    #[test]
    fn align_honors_alias_overrides() {
        let source = vec![info(Platform::Oracle, "EMP_ID", "number", true)];
        let target = vec![info(Platform::Postgres, "id", "int4", true)];
        let mut overrides = HashMap::new();
        overrides.insert("emp_id".to_string(), "id".to_string());
        let entries = align(&source, &target, &overrides);
        assert_eq!(entries.len(), 1);
        assert!(entries[0].hashable());
        assert_eq!(entries[0].alias, "id");
    }

    #[test]
    fn compile_builds_aligned_expressions() {
        let source = vec![
            info(Platform::Oracle, "ID", "number", true),
            info(Platform::Oracle, "NAME", "varchar2", false),
        ];
        let target = vec![
            info(Platform::Postgres, "id", "int4", true),
            info(Platform::Postgres, "name", "varchar", false),
        ];
        let entries = align(&source, &target, &HashMap::new());
        let compiled =
            compile(Platform::Oracle, Platform::Postgres, entries, "emp").unwrap();

        assert!(compiled.source.pk_hash_expr.contains("STANDARD_HASH"));
        assert!(compiled.target.pk_hash_expr.starts_with("MD5("));
        assert_eq!(compiled.source.pk_aliases, vec!["id"]);
        assert!(compiled.target.pk_json_expr.contains("\"id\""));
    }

    #[test]
    fn compile_fails_without_primary_key() {
        let source = vec![info(Platform::Postgres, "name", "varchar", false)];
        let target = vec![info(Platform::Postgres, "name", "varchar", false)];
        let entries = align(&source, &target, &HashMap::new());
        let err = compile(Platform::Postgres, Platform::Postgres, entries, "emp");
        assert!(matches!(err, Err(CompareError::Map { .. })));
    }

    #[test]
    fn pk_columns_excluded_from_column_hash() {
        let source = vec![
            info(Platform::Postgres, "id", "int4", true),
            info(Platform::Postgres, "name", "varchar", false),
        ];
        let entries = align(&source, &source.clone(), &HashMap::new());
        let side = compile_side(Platform::Postgres, &entries, Side::Source, "emp").unwrap();
        assert!(!side.column_hash_expr.contains("id AS BIGINT"));
        assert!(side.pk_hash_expr.contains("id"));
    }
}
