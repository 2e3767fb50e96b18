//! Spec manifest loading

use super::template::{render_template, TemplateVars};
use super::Spec;
use crate::error::{OpsError, Result};
use std::path::Path;
use tracing::debug;

/// Encoding of a spec manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpecFormat {
    /// Try YAML first, then JSON
    #[default]
    Auto,
    Yaml,
    Json,
}

/// Reads spec manifests, optionally rendering them as templates first
#[derive(Debug, Clone, Default)]
pub struct SpecLoader {
    format: SpecFormat,
    template: Option<(TemplateVars, bool)>,
}

impl SpecLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force a format instead of detecting it
    pub fn with_format(mut self, format: SpecFormat) -> Self {
        self.format = format;
        self
    }

    /// Treat the manifest as a template rendered against `vars`
    pub fn with_template(mut self, vars: TemplateVars, missing_ok: bool) -> Self {
        self.template = Some((vars, missing_ok));
        self
    }

    /// Load a manifest from a file
    pub fn load_file(&self, path: &Path) -> Result<Spec> {
        debug!(path = %path.display(), "Loading spec manifest");

        let content = std::fs::read_to_string(path).map_err(|e| {
            OpsError::Parse(format!("failed to read {}: {}", path.display(), e))
        })?;
        self.load_str(&content)
    }

    /// Load a manifest from its text
    pub fn load_str(&self, content: &str) -> Result<Spec> {
        match &self.template {
            Some((vars, missing_ok)) => {
                let rendered = render_template(content, vars, *missing_ok)?;
                self.parse(&rendered)
            }
            None => self.parse(content),
        }
    }

    fn parse(&self, content: &str) -> Result<Spec> {
        match self.format {
            SpecFormat::Yaml => parse_yaml(content),
            SpecFormat::Json => parse_json(content),
            SpecFormat::Auto => parse_yaml(content).or_else(|yaml_err| {
                debug!(error = %yaml_err, "Manifest is not YAML, trying JSON");
                parse_json(content).map_err(|_| yaml_err)
            }),
        }
    }
}

fn parse_yaml(content: &str) -> Result<Spec> {
    serde_yaml::from_str(content).map_err(|e| OpsError::Parse(e.to_string()))
}

fn parse_json(content: &str) -> Result<Spec> {
    serde_json::from_str(content).map_err(|e| OpsError::Parse(e.to_string()))
}
