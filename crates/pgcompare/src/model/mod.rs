//! Core data model for the reconciliation engine.
//!
//! These types mirror the repository schema (`dc_table`, `dc_table_map`,
//! `dc_table_column_map`, staging and findings tables) and the in-flight
//! records moved between extractors and loaders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which end of the comparison a worker or record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Source,
    Target,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Source => "source",
            Side::Target => "target",
        }
    }

    /// Staging table for this side.
    pub fn staging_table(&self) -> &'static str {
        match self {
            Side::Source => "dc_source",
            Side::Target => "dc_target",
        }
    }

    /// Findings table for this side.
    pub fn findings_table(&self) -> &'static str {
        match self {
            Side::Source => "dc_source_findings",
            Side::Target => "dc_target_findings",
        }
    }

    /// The other side.
    pub fn other(&self) -> Side {
        match self {
            Side::Source => Side::Target,
            Side::Target => Side::Source,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run mode for a reconciliation invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Full extract/load/compare pass.
    Compare,
    /// Re-read previously out-of-sync rows and confirm or clear them.
    Check,
}

/// A registered table pair (one row of `dc_table`).
#[derive(Debug, Clone)]
pub struct TableEntry {
    pub tid: i32,
    pub pid: i32,
    pub alias: String,
    pub enabled: bool,
    pub batch_nbr: i32,
    pub parallel_degree: i32,
}

/// Per-side physical mapping of a table (one row of `dc_table_map`).
#[derive(Debug, Clone)]
pub struct TableMap {
    pub tid: i32,
    pub side: Side,
    pub schema_name: String,
    pub table_name: String,
    pub mod_column: Option<String>,
    pub table_filter: Option<String>,
    pub schema_preserve_case: bool,
    pub table_preserve_case: bool,
}

/// Classification of a column for hashing purposes.
///
/// Timestamps, strings, and binaries all collapse to `Char` once their
/// canonical text form is fixed; booleans and numerics keep their own class
/// so the shard predicate and cast compiler can branch on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataClass {
    Boolean,
    Numeric,
    Char,
}

impl DataClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataClass::Boolean => "boolean",
            DataClass::Numeric => "numeric",
            DataClass::Char => "char",
        }
    }

    pub fn parse(s: &str) -> DataClass {
        match s {
            "boolean" => DataClass::Boolean,
            "numeric" => DataClass::Numeric,
            _ => DataClass::Char,
        }
    }
}

/// One row of an engine's uniform catalog projection (dialect metadata
/// SELECT), before classification and cast compilation.
#[derive(Debug, Clone)]
pub struct CatalogColumn {
    pub owner: String,
    pub table_name: String,
    pub column_name: String,
    pub data_type: String,
    pub data_length: i32,
    pub data_precision: i32,
    pub data_scale: i32,
    pub nullable: bool,
    pub primary_key: bool,
}

/// One table discovered from an engine's catalog.
#[derive(Debug, Clone)]
pub struct CatalogTable {
    pub owner: String,
    pub table_name: String,
}

/// Column metadata for one side of a mapped column (one row of
/// `dc_table_column_map` for a given origin).
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    pub column_name: String,
    pub data_type: String,
    pub data_length: i32,
    pub data_precision: i32,
    pub data_scale: i32,
    pub nullable: bool,
    pub primary_key: bool,
    pub data_class: DataClass,
    pub preserve_case: bool,
    /// Compiled dialect-specific SQL fragment yielding the column's
    /// canonical text form.
    pub value_expression: String,
    pub supported: bool,
}

/// One aligned column of a table pair, keyed by its logical alias.
#[derive(Debug, Clone)]
pub struct ColumnMapEntry {
    pub alias: String,
    pub source: Option<ColumnInfo>,
    pub target: Option<ColumnInfo>,
}

impl ColumnMapEntry {
    pub fn side(&self, side: Side) -> Option<&ColumnInfo> {
        match side {
            Side::Source => self.source.as_ref(),
            Side::Target => self.target.as_ref(),
        }
    }

    /// A column participates in hashing only when both sides are present
    /// and both sides carry a supported type.
    pub fn hashable(&self) -> bool {
        matches!((&self.source, &self.target), (Some(s), Some(t)) if s.supported && t.supported)
    }

    pub fn is_primary_key(&self) -> bool {
        self.source.as_ref().map(|c| c.primary_key).unwrap_or(false)
            || self.target.as_ref().map(|c| c.primary_key).unwrap_or(false)
    }
}

/// A content-addressed fingerprint of one row, in flight between an
/// extractor and a loader.
///
/// `pk_hash` and `column_hash` are 32-character lowercase hex MD5 digests;
/// `pk` is a JSON object mapping pk column aliases to canonical text values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFingerprint {
    pub tid: i32,
    pub pk_hash: String,
    pub column_hash: String,
    pub pk: String,
}

/// Verdict recorded for an out-of-sync row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingStatus {
    Missing,
    NotEqual,
}

impl FindingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingStatus::Missing => "missing",
            FindingStatus::NotEqual => "not_equal",
        }
    }

    pub fn parse(s: &str) -> FindingStatus {
        match s {
            "missing" => FindingStatus::Missing,
            _ => FindingStatus::NotEqual,
        }
    }
}

/// A persisted out-of-sync verdict (one row of a findings table).
#[derive(Debug, Clone)]
pub struct Finding {
    pub tid: i32,
    pub batch_nbr: i32,
    pub side: Side,
    pub pk: serde_json::Value,
    pub status: FindingStatus,
}

/// Outcome of re-examining a finding in check mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecheckOutcome {
    /// The finding stands: the rows still disagree.
    Confirmed,
    /// The rows now agree; the finding is cleared.
    Resolved,
    /// The row is still absent on one side.
    StillMissing,
}

impl RecheckOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecheckOutcome::Confirmed => "confirmed",
            RecheckOutcome::Resolved => "resolved",
            RecheckOutcome::StillMissing => "still_missing",
        }
    }
}

/// Per-row verdict counts from one table compare.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CompareCounts {
    pub equal: i64,
    #[serde(rename = "notEqual")]
    pub not_equal: i64,
    #[serde(rename = "missingSource")]
    pub missing_source: i64,
    #[serde(rename = "missingTarget")]
    pub missing_target: i64,
}

impl CompareCounts {
    pub fn total(&self) -> i64 {
        self.equal + self.not_equal + self.missing_source + self.missing_target
    }

    pub fn out_of_sync(&self) -> i64 {
        self.not_equal + self.missing_source + self.missing_target
    }
}

/// Lifecycle of a table within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    Pending,
    Running,
    Compared,
    Failed,
    Skipped,
    Rechecking,
    Rechecked,
}

impl TableStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableStatus::Pending => "pending",
            TableStatus::Running => "running",
            TableStatus::Compared => "compared",
            TableStatus::Failed => "failed",
            TableStatus::Skipped => "skipped",
            TableStatus::Rechecking => "rechecking",
            TableStatus::Rechecked => "rechecked",
        }
    }
}

/// Result of reconciling one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableResult {
    #[serde(rename = "tableName")]
    pub table_name: String,
    pub tid: i32,
    #[serde(rename = "batchNbr")]
    pub batch_nbr: i32,
    #[serde(rename = "compareStatus")]
    pub status: TableStatus,
    #[serde(flatten)]
    pub counts: CompareCounts,
    #[serde(rename = "elapsedMs")]
    pub elapsed_ms: u64,
    #[serde(rename = "rowsPerSecond")]
    pub rows_per_second: i64,
    /// Check-mode outcome counts, present only after a recheck pass.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recheck: Option<RecheckSummary>,
}

impl TableResult {
    pub fn new(table_name: &str, tid: i32, batch_nbr: i32) -> Self {
        Self {
            table_name: table_name.to_string(),
            tid,
            batch_nbr,
            status: TableStatus::Pending,
            counts: CompareCounts::default(),
            elapsed_ms: 0,
            rows_per_second: 0,
            recheck: None,
        }
    }
}

/// Counts from one check-mode pass over a table's findings.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RecheckSummary {
    pub confirmed: i64,
    pub resolved: i64,
    #[serde(rename = "stillMissing")]
    pub still_missing: i64,
}

impl RecheckSummary {
    pub fn out_of_sync(&self) -> i64 {
        self.confirmed + self.still_missing
    }
}

/// Overall result of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(rename = "startedAt")]
    pub started_at: DateTime<Utc>,
    #[serde(rename = "completedAt")]
    pub completed_at: DateTime<Utc>,
    pub tables: Vec<TableResult>,
}

impl RunSummary {
    pub fn totals(&self) -> CompareCounts {
        let mut totals = CompareCounts::default();
        for t in &self.tables {
            totals.equal += t.counts.equal;
            totals.not_equal += t.counts.not_equal;
            totals.missing_source += t.counts.missing_source;
            totals.missing_target += t.counts.missing_target;
        }
        totals
    }

    pub fn out_of_sync(&self) -> i64 {
        self.tables
            .iter()
            .map(|t| match &t.recheck {
                Some(r) => r.out_of_sync(),
                None => t.counts.out_of_sync(),
            })
            .sum()
    }

    pub fn elapsed_seconds(&self) -> i64 {
        (self.completed_at - self.started_at).num_seconds().max(1)
    }

    pub fn rows_per_second(&self) -> i64 {
        self.totals().total() / self.elapsed_seconds()
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_tables() {
        assert_eq!(Side::Source.staging_table(), "dc_source");
        assert_eq!(Side::Target.findings_table(), "dc_target_findings");
        assert_eq!(Side::Source.other(), Side::Target);
    }

    #[test]
    fn counts_roll_up() {
        let counts = CompareCounts {
            equal: 10,
            not_equal: 2,
            missing_source: 1,
            missing_target: 3,
        };
        assert_eq!(counts.total(), 16);
        assert_eq!(counts.out_of_sync(), 6);
    }

    #[test]
    fn recheck_overrides_compare_counts() {
        let mut table = TableResult::new("emp", 1, 0);
        table.counts.not_equal = 5;
        table.recheck = Some(RecheckSummary {
            confirmed: 1,
            resolved: 4,
            still_missing: 0,
        });
        let summary = RunSummary {
            started_at: Utc::now(),
            completed_at: Utc::now(),
            tables: vec![table],
        };
        assert_eq!(summary.out_of_sync(), 1);
    }
}
