//! Run summaries: console log lines and the optional HTML report.

use crate::error::Result;
use crate::model::{RunMode, RunSummary};
use std::path::Path;
use tracing::info;

/// Log the per-table and run-level summary lines.
pub fn log_run_summary(summary: &RunSummary) {
    info!("Processed {} tables", summary.tables.len());
    for table in &summary.tables {
        info!(
            "Table Summary: Table = {:<30}; Status = {:<12}; Equal = {}; Not Equal = {}; \
             Missing Source = {}; Missing Target = {}",
            table.table_name,
            table.status.as_str(),
            table.counts.equal,
            table.counts.not_equal,
            table.counts.missing_source,
            table.counts.missing_target
        );
        if let Some(recheck) = &table.recheck {
            info!(
                "Recheck Summary: Table = {:<30}; Confirmed = {}; Resolved = {}; Still Missing = {}",
                table.table_name, recheck.confirmed, recheck.resolved, recheck.still_missing
            );
        }
    }
    let totals = summary.totals();
    info!(
        "Run Summary:  Elapsed Time (seconds) = {}; Total Rows Processed = {}; \
         Total Out-of-Sync = {}; Through-put (rows/per second) = {}",
        summary.elapsed_seconds(),
        totals.total(),
        summary.out_of_sync(),
        summary.rows_per_second()
    );
}

/// Render the HTML report.
pub fn render_html(summary: &RunSummary, mode: RunMode) -> String {
    let totals = summary.totals();
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<title>pgcompare report</title>\n");
    html.push_str(
        "<style>\n\
         body { font-family: sans-serif; margin: 2em; }\n\
         table { border-collapse: collapse; margin: 1em 0; }\n\
         th, td { border: 1px solid #999; padding: 4px 10px; text-align: right; }\n\
         th { background: #eee; }\n\
         td:first-child, th:first-child { text-align: left; }\n\
         </style>\n</head>\n<body>\n",
    );

    html.push_str("<h1>Job Summary</h1>\n<table>\n");
    html.push_str(&format!(
        "<tr><th>Started</th><td>{}</td></tr>\n\
         <tr><th>Completed</th><td>{}</td></tr>\n\
         <tr><th>Elapsed (s)</th><td>{}</td></tr>\n\
         <tr><th>Rows Processed</th><td>{}</td></tr>\n\
         <tr><th>Out-of-Sync</th><td>{}</td></tr>\n\
         <tr><th>Rows/Second</th><td>{}</td></tr>\n",
        summary.started_at.format("%Y-%m-%d %H:%M:%S"),
        summary.completed_at.format("%Y-%m-%d %H:%M:%S"),
        summary.elapsed_seconds(),
        totals.total(),
        summary.out_of_sync(),
        summary.rows_per_second()
    ));
    html.push_str("</table>\n");

    html.push_str("<h1>Tables</h1>\n<table>\n");
    html.push_str(
        "<tr><th>Table</th><th>Status</th><th>Equal</th><th>Not Equal</th>\
         <th>Missing Source</th><th>Missing Target</th><th>Elapsed (ms)</th>\
         <th>Rows/Second</th></tr>\n",
    );
    for table in &summary.tables {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td>\
             <td>{}</td><td>{}</td></tr>\n",
            table.table_name,
            table.status.as_str(),
            table.counts.equal,
            table.counts.not_equal,
            table.counts.missing_source,
            table.counts.missing_target,
            table.elapsed_ms,
            table.rows_per_second
        ));
    }
    html.push_str("</table>\n");

    if mode == RunMode::Check {
        html.push_str("<h1>Recheck Findings</h1>\n<table>\n");
        html.push_str(
            "<tr><th>Table</th><th>Confirmed</th><th>Resolved</th><th>Still Missing</th></tr>\n",
        );
        for table in &summary.tables {
            if let Some(recheck) = &table.recheck {
                html.push_str(&format!(
                    "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                    table.table_name,
                    recheck.confirmed,
                    recheck.resolved,
                    recheck.still_missing
                ));
            }
        }
        html.push_str("</table>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

/// Write the HTML report to a file.
pub fn write_report<P: AsRef<Path>>(path: P, summary: &RunSummary, mode: RunMode) -> Result<()> {
    std::fs::write(path.as_ref(), render_html(summary, mode))?;
    info!("Report written to {}", path.as_ref().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RecheckSummary, TableResult, TableStatus};
    use chrono::Utc;

    fn summary() -> RunSummary {
        let mut table = TableResult::new("emp", 1, 1);
        table.status = TableStatus::Compared;
        table.counts.equal = 10;
        table.counts.not_equal = 1;
        RunSummary {
            started_at: Utc::now(),
            completed_at: Utc::now(),
            tables: vec![table],
        }
    }

    #[test]
    fn html_has_job_and_table_sections() {
        let html = render_html(&summary(), RunMode::Compare);
        assert!(html.contains("<h1>Job Summary</h1>"));
        assert!(html.contains("<h1>Tables</h1>"));
        assert!(html.contains("<td>emp</td>"));
        assert!(!html.contains("Recheck Findings"));
    }

    #[test]
    fn check_mode_adds_findings_section() {
        let mut s = summary();
        s.tables[0].recheck = Some(RecheckSummary {
            confirmed: 1,
            resolved: 2,
            still_missing: 0,
        });
        let html = render_html(&s, RunMode::Check);
        assert!(html.contains("Recheck Findings"));
        assert!(html.contains("<td>2</td>"));
    }
}
