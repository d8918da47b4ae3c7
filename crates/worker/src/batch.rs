use anyhow::Context;
use std::io::{BufRead, Write};

use budgetwise_core::config::AnalysisConfig;
use budgetwise_core::domain::contract::{AnalysisRequest, LabelRequest};
use budgetwise_core::pipeline;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Mode {
    /// Full analysis report per request.
    Analysis,
    /// Category importance labels per request.
    Labels,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: usize,
    pub failed: usize,
}

/// Runs a single request document. With `dry_run` the request is only validated and the
/// returned value is `None`.
pub fn run_one(
    mode: Mode,
    raw: &str,
    cfg: &AnalysisConfig,
    dry_run: bool,
) -> budgetwise_core::Result<Option<serde_json::Value>> {
    match mode {
        Mode::Analysis => {
            let request: AnalysisRequest = serde_json::from_str(raw)?;
            if dry_run {
                let validated = request.validate_and_into_request()?;
                tracing::info!(
                    expenses = validated.expenses.len(),
                    all_expenses = validated.all_expenses.len(),
                    categories = validated.categories.len(),
                    dry_run = true,
                    "analysis request is valid"
                );
                return Ok(None);
            }
            let report = pipeline::analyze(request, cfg)?;
            Ok(Some(serde_json::to_value(report)?))
        }
        Mode::Labels => {
            let request: LabelRequest = serde_json::from_str(raw)?;
            if dry_run {
                let past = request.validate_and_into_expenses()?;
                tracing::info!(past_expenses = past.len(), dry_run = true, "label request is valid");
                return Ok(None);
            }
            let report = pipeline::label(request, cfg)?;
            Ok(Some(serde_json::to_value(report)?))
        }
    }
}

/// One request per non-blank line. A failing line is written as `{"error": ...}` and the run
/// moves on; only I/O failures abort.
pub fn run_lines<R: BufRead, W: Write>(
    mode: Mode,
    reader: R,
    mut writer: W,
    cfg: &AnalysisConfig,
    dry_run: bool,
) -> anyhow::Result<BatchSummary> {
    let mut summary = BatchSummary::default();

    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("read line {}", idx + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        summary.processed += 1;

        let out = match run_one(mode, &line, cfg, dry_run) {
            Ok(Some(value)) => value,
            Ok(None) => continue,
            Err(err) => {
                summary.failed += 1;
                tracing::warn!(line = idx + 1, error = %err, "request failed");
                serde_json::json!({ "error": err.to_string() })
            }
        };
        serde_json::to_writer(&mut writer, &out)?;
        writer.write_all(b"\n")?;
    }

    writer.flush()?;
    Ok(summary)
}
