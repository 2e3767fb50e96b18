use colored::Colorize;
use kafka_ops::{ItemReport, ItemStatus, Reporter, RunSummary};
use std::io::{self, Write};
use tracing::warn;

/// Width the TASK and SUMMARY banners are padded to
const BANNER_WIDTH: usize = 80;

/// Prints item results in the `TASK [...]` / `ok: [broker]` layout
pub(crate) struct ConsoleReporter<W: Write> {
    out: W,
    broker: String,
    verbose: bool,
    /// First failed write; later output is dropped
    write_error: Option<io::Error>,
}

impl<W: Write> ConsoleReporter<W> {
    pub(crate) fn new(out: W, broker: impl Into<String>, verbose: bool) -> Self {
        Self {
            out,
            broker: broker.into(),
            verbose,
            write_error: None,
        }
    }

    /// Returns the error that stopped output, if any
    pub(crate) fn take_write_error(&mut self) -> Option<io::Error> {
        self.write_error.take()
    }

    fn write_lines(&mut self, lines: &[&str]) {
        if self.write_error.is_some() {
            return;
        }
        let result = lines
            .iter()
            .try_for_each(|line| writeln!(self.out, "{}", line))
            .and_then(|()| self.out.flush());
        if let Err(e) = result {
            warn!(error = %e, "Failed to write report, dropping further output");
            self.write_error = Some(e);
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

fn banner(title: &str) -> String {
    let stars = BANNER_WIDTH.saturating_sub(title.len()).max(3);
    format!("{} {}", title, "*".repeat(stars))
}

fn pretty_json(value: &serde_json::Value) -> String {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    match serde::Serialize::serialize(value, &mut serializer) {
        Ok(()) => String::from_utf8_lossy(&out).into_owned(),
        Err(_) => value.to_string(),
    }
}

impl<W: Write> Reporter for ConsoleReporter<W> {
    fn report(&mut self, report: &ItemReport) {
        let header = banner(&format!("TASK [{} : {}]", report.kind, report.task));

        let status = format!("{}: [{}]", report.status, self.broker);
        let line = match report.status {
            ItemStatus::Ok => status.green().to_string(),
            ItemStatus::Changed => status.yellow().to_string(),
            ItemStatus::Error => format!("{} {}", status, report.message).red().to_string(),
        };

        let detail = if self.verbose {
            pretty_json(&report.detail)
        } else {
            String::new()
        };
        let mut lines = vec![header.as_str(), line.as_str()];
        if self.verbose {
            lines.push(detail.as_str());
        }
        lines.push("");
        self.write_lines(&lines);
    }

    fn summary(&mut self, summary: &RunSummary) {
        let counts = format!(
            " ok={}   changed={}   failed={}",
            summary.ok, summary.changed, summary.failed
        );
        let counts = if summary.is_success() {
            counts.green()
        } else {
            counts.red()
        };

        let header = format!("SUMMARY {}", "*".repeat(BANNER_WIDTH));
        let counts = counts.to_string();
        self.write_lines(&[header.as_str(), counts.as_str()]);
    }
}
