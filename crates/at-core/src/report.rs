//! Reporting bridge: spreadsheet export and the recommendations digest.
//!
//! Both are best effort. Failures come back as [`Error::Reporting`] for the
//! caller to log; tuning results on disk are unaffected.

use crate::tool::{ExternalTool, ToolInvocation};
use at_common::{Error, Result, ToolStage};
use regex::Regex;
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info};

/// Report file written by the recommendations tool, relative to the base dir.
pub const RECOMMENDATIONS_LOG: &str = "autotune/autotune_recommendations.log";

pub const DIGEST_HEADING: &str = "Autotune pump profile recommendations:";

/// Table rows whose trailing columns are empty.
static EMPTY_ROW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\| *\| *$").expect("regex"));

/// Filtered recommendations, ready to print.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Digest {
    pub log_file: PathBuf,
    pub lines: Vec<String>,
}

/// Drop blank lines and rows with empty trailing cells.
pub fn filter_recommendations(text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !EMPTY_ROW_RE.is_match(line))
        .map(str::to_string)
        .collect()
}

/// Print a digest under the standard heading.
pub fn render_digest(digest: &Digest, out: &mut dyn Write) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{DIGEST_HEADING}")?;
    writeln!(out, "{}", "-".repeat(57))?;
    writeln!(
        out,
        "Recommendations Log File: {}",
        digest.log_file.display()
    )?;
    for line in &digest.lines {
        writeln!(out, "{line}")?;
    }
    Ok(())
}

pub struct ReportingBridge<'a> {
    report: &'a dyn ExternalTool,
    export: &'a dyn ExternalTool,
}

impl<'a> ReportingBridge<'a> {
    pub fn new(report: &'a dyn ExternalTool, export: &'a dyn ExternalTool) -> Self {
        Self { report, export }
    }

    /// Export every result under `base_dir` to a spreadsheet.
    pub fn export(&self, base_dir: &Path, filename: &str) -> Result<()> {
        let call = ToolInvocation::new(ToolStage::Export)
            .arg("--dir")
            .arg(base_dir)
            .arg("--output")
            .arg(filename);
        run_checked(self.export, &call)?;
        info!(output = filename, "spreadsheet exported");
        Ok(())
    }

    /// Generate the recommendations report and read back its digest.
    pub fn summarize(&self, base_dir: &Path) -> Result<Digest> {
        let call = ToolInvocation::new(ToolStage::Report).arg(base_dir);
        run_checked(self.report, &call)?;

        let log_file = base_dir.join(RECOMMENDATIONS_LOG);
        let text = std::fs::read_to_string(&log_file).map_err(|e| {
            Error::Reporting(format!("cannot read {}: {e}", log_file.display()))
        })?;
        let lines = filter_recommendations(&text);
        debug!(path = %log_file.display(), kept = lines.len(), "recommendations read");
        Ok(Digest { log_file, lines })
    }
}

fn run_checked(tool: &dyn ExternalTool, call: &ToolInvocation) -> Result<()> {
    let run = tool
        .invoke(call)
        .map_err(|e| Error::Reporting(e.to_string()))?;
    if !run.success {
        return Err(Error::Reporting(format!(
            "{} exited with status {}",
            tool.name(),
            run.exit_code
                .map_or_else(|| "signal".to_string(), |c| c.to_string())
        )));
    }
    Ok(())
}
