use crate::error::CliError;
use model::execution::outcome::{RunReport, TableOutcome};
use std::{fmt::Write as _, path::Path};

/// Human-readable per-table summary, one line per table in list order.
pub fn render_summary(report: &RunReport) -> String {
    let mut out = String::new();
    let summary = report.summary();
    let elapsed = report
        .finished_at
        .map(|end| (end - report.started_at).num_milliseconds() as f64 / 1000.0)
        .unwrap_or_default();

    let _ = writeln!(out, "Run {} ({}) in {:.2}s", report.run_id, report.job_name, elapsed);
    let _ = writeln!(out, "{:<4} {:<28} {:<36} {:<8} DETAIL", "#", "TABLE", "DESTINATION", "STATUS");
    for table in &report.tables {
        let detail = match &table.outcome {
            TableOutcome::Written { rows, created } => {
                format!("{rows} rows{}", if *created { ", created" } else { "" })
            }
            TableOutcome::Empty => "no rows".to_string(),
            TableOutcome::Failed { stage, reason } => format!("{stage}: {reason}"),
            TableOutcome::Skipped { reason } => reason.clone(),
        };
        let _ = writeln!(
            out,
            "{:<4} {:<28} {:<36} {:<8} {}",
            table.index,
            table.table.as_str(),
            table.destination.to_string(),
            table.outcome.label(),
            detail
        );
    }
    let _ = write!(
        out,
        "{} written ({} rows), {} empty, {} failed, {} skipped, {} retries",
        summary.written, summary.rows_written, summary.empty, summary.failed, summary.skipped,
        report.retries
    );
    out
}

pub fn print_summary(report: &RunReport) {
    println!("{}", render_summary(report));
}

pub async fn write_report(report: &RunReport, path: &Path) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(report)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use model::{
        core::identifiers::{RunId, TableName},
        execution::outcome::{TableReport, TableStage},
    };

    fn report() -> RunReport {
        let mut report = RunReport::new(RunId::new("run-1"), "nightly", "raw", Utc::now());
        report.finished_at = Some(report.started_at);
        for (index, name, outcome) in [
            (0, "Incident", TableOutcome::Written { rows: 12, created: true }),
            (
                1,
                "problem",
                TableOutcome::Failed {
                    stage: TableStage::Fetching,
                    reason: "401 Unauthorized".into(),
                },
            ),
        ] {
            let table = TableName::from(name);
            report.tables.push(TableReport {
                index,
                destination: table.destination("raw"),
                table,
                outcome,
                duration_ms: 1,
            });
        }
        report
    }

    #[test]
    fn test_summary_lists_each_table() {
        let text = render_summary(&report());
        assert!(text.contains("raw.incident"));
        assert!(text.contains("12 rows, created"));
        assert!(text.contains("fetching: 401 Unauthorized"));
        assert!(text.ends_with("1 written (12 rows), 0 empty, 1 failed, 0 skipped, 0 retries"));
    }

    #[tokio::test]
    async fn test_write_report_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        write_report(&report(), &path).await.unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["tables"][0]["destination"], "raw.incident");
        assert_eq!(json["tables"][1]["status"], "failed");
    }
}
