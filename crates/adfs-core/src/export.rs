use crate::history::HistoryEntry;
use crate::runner::ExecutionResult;
use anyhow::Context;
use serde::Serialize;
use std::fmt::Write as _;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExportFormat {
    Json,
    Csv,
    Text,
}

impl ExportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Text => "text/plain; charset=utf-8",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Text => "txt",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "txt" | "text" => Ok(ExportFormat::Text),
            other => anyhow::bail!("unsupported export format '{other}'"),
        }
    }
}

#[derive(Serialize)]
struct ExportDocument<'a> {
    exported_at: String,
    history: &'a [HistoryEntry],
    results: &'a [ExecutionResult],
}

/// Renders the history snapshot plus the latest per-profile results.
pub fn render(
    format: ExportFormat,
    history: &[HistoryEntry],
    results: &[ExecutionResult],
) -> anyhow::Result<String> {
    match format {
        ExportFormat::Json => {
            let document = ExportDocument {
                exported_at: crate::history::now_rfc3339(),
                history,
                results,
            };
            serde_json::to_string_pretty(&document).context("serialize export")
        }
        ExportFormat::Csv => render_csv(history, results),
        ExportFormat::Text => Ok(render_text(history, results)),
    }
}

fn render_csv(history: &[HistoryEntry], results: &[ExecutionResult]) -> anyhow::Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    writer.write_record([
        "id",
        "timestamp",
        "command",
        "profiles",
        "succeeded",
        "failed",
        "skipped",
        "total",
    ])?;
    for entry in history {
        writer.write_record([
            entry.id.to_string(),
            entry.timestamp.clone(),
            entry.command.clone(),
            entry.profiles.join(";"),
            entry.success_count.to_string(),
            entry.failure_count.to_string(),
            entry.skipped_count.to_string(),
            entry.total.to_string(),
        ])?;
    }
    if !results.is_empty() {
        writer.write_record([""])?;
        writer.write_record([
            "profile",
            "group",
            "success",
            "skipped",
            "exit_code",
            "duration_secs",
            "error",
            "output",
        ])?;
        for result in results {
            writer.write_record([
                result.profile.clone(),
                result.group.as_str().to_string(),
                result.success.to_string(),
                result.skipped.to_string(),
                result
                    .exit_code
                    .map(|code| code.to_string())
                    .unwrap_or_default(),
                format!("{:.3}", result.duration.as_secs_f64()),
                result.error.clone().unwrap_or_default(),
                result.display_output().unwrap_or_default(),
            ])?;
        }
    }
    let bytes = writer.into_inner().context("flush csv export")?;
    String::from_utf8(bytes).context("csv export is not utf-8")
}

fn render_text(history: &[HistoryEntry], results: &[ExecutionResult]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Command history ({} entries)", history.len());
    for entry in history {
        let _ = writeln!(
            out,
            "[{}] {} -> {} ({} ok, {} failed, {} skipped of {})",
            entry.timestamp,
            entry.command,
            entry.profiles.join(", "),
            entry.success_count,
            entry.failure_count,
            entry.skipped_count,
            entry.total
        );
    }
    if !results.is_empty() {
        let _ = writeln!(out, "\nLatest results");
        for result in results {
            let verdict = match (result.success, result.skipped) {
                (true, _) => "OK",
                (false, true) => "SKIPPED",
                (false, false) => "FAILED",
            };
            let _ = writeln!(
                out,
                "== {} [{}] {} in {:.2}s",
                result.profile,
                result.group,
                verdict,
                result.duration.as_secs_f64()
            );
            if let Some(error) = &result.error {
                let _ = writeln!(out, "   error: {error}");
            }
            if let Some(output) = result.display_output() {
                for line in output.lines() {
                    let _ = writeln!(out, "   {line}");
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecutionFailure;
    use crate::model::EnvironmentGroup;

    fn sample() -> (Vec<HistoryEntry>, Vec<ExecutionResult>) {
        let skipped = ExecutionResult::failed(
            "kds-ets-pd",
            EnvironmentGroup::Prod,
            ExecutionFailure::SkippedDevFailure,
            "2026-01-01T00:00:00Z".into(),
        );
        let entry = HistoryEntry::summarize(
            "aws s3 ls, --recursive",
            &["kds-ets-pd".to_string()],
            std::slice::from_ref(&skipped),
        );
        (vec![entry], vec![skipped])
    }

    #[test]
    fn parses_formats() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("txt".parse::<ExportFormat>().unwrap(), ExportFormat::Text);
        assert!("xml".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn csv_quotes_commands_with_commas() {
        let (history, results) = sample();
        let rendered = render(ExportFormat::Csv, &history, &results).unwrap();
        assert!(rendered.starts_with("id,timestamp,command,"));
        assert!(rendered.contains("\"aws s3 ls, --recursive\""));
        assert!(rendered.contains("skipped due to dev profile failure"));
    }

    #[test]
    fn json_contains_both_sections() {
        let (history, results) = sample();
        let rendered = render(ExportFormat::Json, &history, &results).unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["history"][0]["skipped_count"], 1);
        assert_eq!(value["results"][0]["profile"], "kds-ets-pd");
    }

    #[test]
    fn text_marks_skipped_profiles() {
        let (history, results) = sample();
        let rendered = render(ExportFormat::Text, &history, &results).unwrap();
        assert!(rendered.contains("Command history (1 entries)"));
        assert!(rendered.contains("== kds-ets-pd [prod] SKIPPED"));
    }
}
