//! Structured diagnostics, accumulated across the whole generation run and
//! rendered grouped by file.

use std::fmt;

use indexmap::IndexMap;

/// 1-based line/column position within a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub location: Option<Location>,
    pub message: String,
    pub fatal: bool,
}

/// Collects diagnostics as the pipeline runs. Nothing is reported eagerly:
/// every file's problems are gathered so they can all be rendered together.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    by_file: IndexMap<String, Vec<Diagnostic>>,
}

impl DiagnosticSink {
    /// Record a fatal diagnostic against `file`.
    pub fn error(
        &mut self,
        file: impl Into<String>,
        location: Option<Location>,
        message: impl Into<String>,
    ) {
        self.by_file.entry(file.into()).or_default().push(Diagnostic {
            location,
            message: message.into(),
            fatal: true,
        });
    }

    pub fn has_fatal(&self) -> bool {
        self.by_file
            .values()
            .flatten()
            .any(|diagnostic| diagnostic.fatal)
    }

    pub fn is_empty(&self) -> bool {
        self.by_file.is_empty()
    }

    pub fn into_report(self) -> DiagnosticReport {
        DiagnosticReport {
            by_file: self.by_file,
        }
    }
}

/// A finished set of diagnostics, grouped by file in discovery order.
#[derive(Debug)]
pub struct DiagnosticReport {
    by_file: IndexMap<String, Vec<Diagnostic>>,
}

impl DiagnosticReport {
    pub fn error_count(&self) -> usize {
        self.by_file
            .values()
            .flatten()
            .filter(|diagnostic| diagnostic.fatal)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.by_file
            .values()
            .flatten()
            .filter(|diagnostic| !diagnostic.fatal)
            .count()
    }

    /// Iterate diagnostics per file, in discovery order.
    pub fn files(&self) -> impl Iterator<Item = (&str, &[Diagnostic])> {
        self.by_file
            .iter()
            .map(|(file, diagnostics)| (file.as_str(), diagnostics.as_slice()))
    }
}

impl fmt::Display for DiagnosticReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (file, diagnostics) in &self.by_file {
            writeln!(f, "{file}")?;
            for diagnostic in diagnostics {
                let severity = if diagnostic.fatal { "error" } else { "warning" };
                match diagnostic.location {
                    Some(Location { line, column }) => {
                        writeln!(f, "  {line}:{column}  {severity}  {}", diagnostic.message)?
                    }
                    None => writeln!(f, "  {severity}  {}", diagnostic.message)?,
                }
            }
            writeln!(f)?;
        }

        let errors = self.error_count();
        let warnings = self.warning_count();
        match (errors, warnings) {
            (errors, 0) => write!(f, "✖ {errors} {}", plural(errors, "error")),
            (0, warnings) => write!(f, "⚠ {warnings} {}", plural(warnings, "warning")),
            (errors, warnings) => write!(
                f,
                "✖ {errors} {}, {warnings} {}",
                plural(errors, "error"),
                plural(warnings, "warning")
            ),
        }
    }
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        noun.to_string()
    } else {
        format!("{noun}s")
    }
}
