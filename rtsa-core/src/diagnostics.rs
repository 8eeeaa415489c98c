//! Reporting of soft errors.
//!
//! Not every problem aborts a call. Unknown parameter names in setters,
//! residuals containing undefined values or a defaulted frequency are reported
//! to a [`DiagnosticSink`] and the computation continues with a best-effort result.
//! The sink is injected when the model is constructed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// A setter referenced a parameter that does not exist
    UnknownParameter,
    /// Simulation, residuals or noise contain undefined values
    NumericalDegeneracy,
    /// Observation times are not all on the simulation grid
    InterpolationEnabled,
    /// No frequency could be derived from the series
    FrequencyDefaulted,
    /// A component was requested that is not attached
    MissingComponent,
    /// Parameters were used that have not been optimised
    UnoptimizedParameters,
    /// Noise was requested while no noise model is attached
    NoiseDisabled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(severity: Severity, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            severity,
            kind,
            message: message.into(),
        }
    }

    pub fn info(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, kind, message)
    }

    pub fn warning(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, kind, message)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)
    }
}

/// Receiver of diagnostics emitted by a model
pub trait DiagnosticSink: Send + Sync + fmt::Debug {
    fn report(&self, diagnostic: &Diagnostic);
}

/// Prints diagnostics to standard error.
///
/// This is the sink used when none is supplied.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink;

impl DiagnosticSink for StderrSink {
    fn report(&self, diagnostic: &Diagnostic) {
        eprintln!("{}", diagnostic);
    }
}

/// Forwards diagnostics to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(&self, diagnostic: &Diagnostic) {
        match diagnostic.severity {
            Severity::Info => log::info!("{}", diagnostic.message),
            Severity::Warning => log::warn!("{}", diagnostic.message),
            Severity::Error => log::error!("{}", diagnostic.message),
        }
    }
}

/// Keeps every diagnostic in memory.
///
/// Clones share the same storage, so a clone can be handed to a model while
/// the original is used to inspect what was reported.
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    diagnostics: Arc<Mutex<Vec<Diagnostic>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of diagnostics of a given kind
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.diagnostics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|d| d.kind == kind)
            .count()
    }

    pub fn clear(&self) {
        self.diagnostics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

impl DiagnosticSink for CollectingSink {
    fn report(&self, diagnostic: &Diagnostic) {
        self.diagnostics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(diagnostic.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collecting_sink_shares_storage() {
        let sink = CollectingSink::new();
        let shared: Arc<dyn DiagnosticSink> = Arc::new(sink.clone());
        shared.report(&Diagnostic::warning(
            DiagnosticKind::UnknownParameter,
            "Parameter 'foo' not present",
        ));
        shared.report(&Diagnostic::info(
            DiagnosticKind::FrequencyDefaulted,
            "Using daily frequency",
        ));
        assert_eq!(sink.diagnostics().len(), 2);
        assert_eq!(sink.count(DiagnosticKind::UnknownParameter), 1);
        sink.clear();
        assert!(sink.diagnostics().is_empty());
    }

    #[test]
    fn display_includes_severity() {
        let d = Diagnostic::warning(DiagnosticKind::NumericalDegeneracy, "3 NaN residuals");
        assert_eq!(d.to_string(), "[warning] 3 NaN residuals");
    }
}
