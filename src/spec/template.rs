//! Template rendering for spec manifests
//!
//! Manifests are Handlebars templates rendered against the template
//! variables. Field references may also be written `{{ .Name }}`, and a `-`
//! next to the braces (`{{- .Name -}}`) trims the whitespace on that side;
//! both are rewritten to plain Handlebars (`{{~Name~}}`) before rendering.
//! Conditionals and loops use Handlebars block helpers:
//!
//! ```text
//! {{#if (eq .Env "prod")}}replication_factor: 3{{else}}replication_factor: 1{{/if}}
//! ```

use crate::error::{OpsError, Result};
use handlebars::{no_escape, Handlebars};
use regex::{Captures, Regex};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// One `{{ ... }}` action with optional trim markers
const MUSTACHE: &str = r"\{\{(-\s|~)?(.*?)(\s-|~)?\}\}";

/// A `.Name` field reference inside an action
const FIELD_REFERENCE: &str = r"(^|[\s(])\.([A-Za-z_][A-Za-z0-9_]*)";

/// Template actions with no Handlebars counterpart
const UNSUPPORTED_ACTIONS: &[&str] = &["if", "range", "with", "end", "define", "template", "block"];

/// Variables available to a template
#[derive(Debug, Clone, Default)]
pub struct TemplateVars {
    values: HashMap<String, String>,
}

impl TemplateVars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable
    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Load variables from `(key, value)` pairs, e.g. `std::env::vars()`
    pub fn with_pairs<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.values
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Apply `key=value` assignments, overriding earlier values
    ///
    /// The value is everything after the first `=`; an assignment without one
    /// sets the key to an empty string.
    pub fn with_assignments<S: AsRef<str>>(mut self, assignments: &[S]) -> Self {
        for assignment in assignments {
            let (key, value) = assignment
                .as_ref()
                .split_once('=')
                .unwrap_or((assignment.as_ref(), ""));
            self.values.insert(key.to_string(), value.to_string());
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Render a template against a set of variables
///
/// An undefined variable is an error unless `missing_ok` is set, in which
/// case it renders as an empty string.
pub fn render_template(template: &str, vars: &TemplateVars, missing_ok: bool) -> Result<String> {
    let (source, references) = to_handlebars(template)?;

    if !missing_ok {
        if let Some(key) = references.iter().find(|key| vars.get(key).is_none()) {
            return Err(OpsError::Template(format!(
                "map has no entry for key \"{}\"",
                key
            )));
        }
    }

    let mut registry = Handlebars::new();
    registry.register_escape_fn(no_escape);
    registry.set_strict_mode(!missing_ok);

    debug!(references = references.len(), missing_ok, "Rendering template");
    registry
        .render_template(&source, &vars.values)
        .map_err(|e| OpsError::Template(e.to_string()))
}

/// Rewrite `.Name` references and `-` trim markers into Handlebars syntax
///
/// Returns the rewritten template and the names of the referenced fields.
fn to_handlebars(template: &str) -> Result<(String, BTreeSet<String>)> {
    let mustache = Regex::new(MUSTACHE)
        .map_err(|e| OpsError::Template(format!("invalid action pattern: {}", e)))?;
    let field = Regex::new(FIELD_REFERENCE)
        .map_err(|e| OpsError::Template(format!("invalid field pattern: {}", e)))?;

    let mut references = BTreeSet::new();
    let mut unsupported = None;

    let source = mustache.replace_all(template, |caps: &Captures<'_>| {
        let body = &caps[2];
        let keyword = body.split_whitespace().next().unwrap_or_default();
        if unsupported.is_none() && UNSUPPORTED_ACTIONS.contains(&keyword) {
            unsupported = Some(caps[0].to_string());
        }

        let body = field.replace_all(body, |f: &Captures<'_>| {
            references.insert(f[2].to_string());
            format!("{}{}", &f[1], &f[2])
        });
        let open = if caps.get(1).is_some() { "~" } else { "" };
        let close = if caps.get(3).is_some() { "~" } else { "" };
        format!("{{{{{}{}{}}}}}", open, body.trim(), close)
    });

    if let Some(action) = unsupported {
        return Err(OpsError::Template(format!(
            "unsupported template action {}: use Handlebars block helpers such as {{{{#if}}}} ... {{{{/if}}}}",
            action
        )));
    }
    Ok((source.into_owned(), references))
}
