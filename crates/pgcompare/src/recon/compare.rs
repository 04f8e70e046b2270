//! Repository-side set-difference: classify staged rows into equal,
//! not_equal, and one-sided-missing verdicts and record findings.
//!
//! Tie-break: a pk_hash present on both sides with distinct column hashes
//! is always `not_equal`, never `missing`; the missing queries therefore
//! exclude any pk_hash that exists on the other side at all.

use crate::error::Result;
use crate::model::{CompareCounts, Side};
use crate::repo::RepoPool;
use tracing::info;

/// Count of rows whose pk and column hashes match on both sides.
fn equal_count_sql() -> String {
    "SELECT COUNT(*) FROM dc_source s \
     JOIN dc_target t ON t.tid = s.tid AND t.batch_nbr = s.batch_nbr \
                     AND t.pk_hash = s.pk_hash AND t.column_hash = s.column_hash \
     WHERE s.tid = $1 AND s.batch_nbr = $2"
        .to_string()
}

/// Insert `not_equal` findings for one side: pk matches, columns differ.
fn not_equal_sql(side: Side) -> String {
    let (own, other) = (side.staging_table(), side.other().staging_table());
    format!(
        "INSERT INTO {findings} (tid, batch_nbr, pk, status) \
         SELECT s.tid, s.batch_nbr, s.pk, 'not_equal' \
         FROM {own} s \
         JOIN {other} t ON t.tid = s.tid AND t.batch_nbr = s.batch_nbr \
                       AND t.pk_hash = s.pk_hash \
         WHERE s.tid = $1 AND s.batch_nbr = $2 \
           AND s.column_hash <> t.column_hash",
        findings = side.findings_table(),
        own = own,
        other = other
    )
}

/// Insert `missing` findings for rows present on this side only.
fn missing_sql(side: Side) -> String {
    let (own, other) = (side.staging_table(), side.other().staging_table());
    format!(
        "INSERT INTO {findings} (tid, batch_nbr, pk, status) \
         SELECT s.tid, s.batch_nbr, s.pk, 'missing' \
         FROM {own} s \
         WHERE s.tid = $1 AND s.batch_nbr = $2 \
           AND NOT EXISTS (SELECT 1 FROM {other} t \
                           WHERE t.tid = s.tid AND t.batch_nbr = s.batch_nbr \
                             AND t.pk_hash = s.pk_hash)",
        findings = side.findings_table(),
        own = own,
        other = other
    )
}

/// Run the compare for one tid/batch, writing findings and returning the
/// verdict counts.
pub async fn run_compare(repo: &RepoPool, tid: i32, batch_nbr: i32) -> Result<CompareCounts> {
    let client = repo.get().await?;

    let equal: i64 = client
        .query_one(&equal_count_sql(), &[&tid, &batch_nbr])
        .await?
        .get(0);

    // not_equal findings land on both sides; the counts are symmetric.
    let not_equal = client
        .execute(&not_equal_sql(Side::Source), &[&tid, &batch_nbr])
        .await? as i64;
    client
        .execute(&not_equal_sql(Side::Target), &[&tid, &batch_nbr])
        .await?;

    // A row present only in source is missing from the target, and the
    // other way around.
    let missing_target = client
        .execute(&missing_sql(Side::Source), &[&tid, &batch_nbr])
        .await? as i64;
    let missing_source = client
        .execute(&missing_sql(Side::Target), &[&tid, &batch_nbr])
        .await? as i64;

    let counts = CompareCounts {
        equal,
        not_equal,
        missing_source,
        missing_target,
    };
    info!(
        "compare tid {}: equal={} notEqual={} missingSource={} missingTarget={}",
        tid, counts.equal, counts.not_equal, counts.missing_source, counts.missing_target
    );
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_requires_both_hashes() {
        let sql = equal_count_sql();
        assert!(sql.contains("t.pk_hash = s.pk_hash"));
        assert!(sql.contains("t.column_hash = s.column_hash"));
    }

    #[test]
    fn not_equal_joins_on_pk_hash_only() {
        let sql = not_equal_sql(Side::Source);
        assert!(sql.contains("INSERT INTO dc_source_findings"));
        assert!(sql.contains("JOIN dc_target t"));
        assert!(sql.contains("t.pk_hash = s.pk_hash"));
        assert!(sql.contains("s.column_hash <> t.column_hash"));
        assert!(!sql.contains("NOT EXISTS"));
    }

    #[test]
    fn missing_excludes_any_pk_match() {
        // Any pk_hash present on the other side (equal or not) keeps the
        // row out of the missing verdict.
        let sql = missing_sql(Side::Source);
        assert!(sql.contains("INSERT INTO dc_source_findings"));
        assert!(sql.contains("NOT EXISTS"));
        assert!(sql.contains("t.pk_hash = s.pk_hash"));
        assert!(!sql.contains("column_hash"));
    }

    #[test]
    fn target_side_mirrors_source() {
        let sql = missing_sql(Side::Target);
        assert!(sql.contains("INSERT INTO dc_target_findings"));
        assert!(sql.contains("FROM dc_target s"));
        assert!(sql.contains("FROM dc_source t"));
    }
}
