//! Reports on a compilation, as text for people or JSON for tools.

use scrivener_xslt::{CompilationResult, StaticError};
use serde::Serialize;
use std::fmt::Write;

#[derive(Debug, Serialize)]
pub struct Report<'a> {
    pub stylesheet: &'a str,
    pub success: bool,
    pub errors: &'a [StaticError],
    pub suppressed: usize,
    /// Named templates in the compiled stylesheet, in name order.
    pub templates: Vec<&'a str>,
}

impl<'a> Report<'a> {
    pub fn new(stylesheet: &'a str, result: &'a CompilationResult) -> Self {
        let templates = result
            .executable()
            .map(|executable| executable.templates.keys().map(String::as_str).collect())
            .unwrap_or_default();
        Self {
            stylesheet,
            success: result.is_success(),
            errors: &result.errors,
            suppressed: result.suppressed,
            templates,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for error in self.errors {
            let _ = writeln!(
                out,
                "{}:{}:{}: error[{}]: {} ({})",
                self.stylesheet,
                error.node.location.line,
                error.node.location.column,
                error.code,
                error.message,
                error.node.name
            );
        }
        if self.suppressed > 0 {
            let _ = writeln!(out, "{} further error(s) not shown", self.suppressed);
        }
        if self.success {
            let _ = writeln!(
                out,
                "{}: ok, {} template(s)",
                self.stylesheet,
                self.templates.len()
            );
        } else {
            let _ = writeln!(
                out,
                "{}: {} error(s)",
                self.stylesheet,
                self.errors.len() + self.suppressed
            );
        }
        out
    }
}
