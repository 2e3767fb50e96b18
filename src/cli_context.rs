use colored::Colorize;
use std::io::IsTerminal;
use std::path::PathBuf;

use crate::Cli;
use kafka_ops::{OpsError, Result};

/// CLI context shared by the actions
pub(crate) struct CliContext {
    pub(crate) output_file: Option<PathBuf>,
}

impl CliContext {
    pub(crate) fn new(cli: &Cli) -> Self {
        // Dumps go to the --spec path when one is given
        let output_file = if cli.dump { cli.spec.clone() } else { None };

        let use_color = !cli.no_color && std::io::stdout().is_terminal() && output_file.is_none();
        if !use_color {
            colored::control::set_override(false);
        }

        Self { output_file }
    }

    /// Write output to stdout or the output file
    pub(crate) fn write_output(&self, content: &str) -> Result<()> {
        match &self.output_file {
            Some(path) => {
                std::fs::write(path, content).map_err(OpsError::Io)?;
                eprintln!("{} Output written to {}", "✓".green(), path.display());
                Ok(())
            }
            None => {
                print!("{}", content);
                Ok(())
            }
        }
    }

    /// Print error message
    pub(crate) fn error(&self, message: &str) {
        eprintln!("{} {}", "ERROR:".red(), message);
    }
}
