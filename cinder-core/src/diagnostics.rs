//! Verbosity-gated diagnostic stream.
//!
//! Solve-time conditions (unsupported sorts, cancellation, toolchain
//! failures) are not `Err` values in this workspace: the backend folds
//! them into an `Unknown` verdict and keeps the detail here, where tests
//! and embedders can read it back. Messages are mirrored to `tracing`.

use std::fmt;
use std::sync::Mutex;

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Progress detail, shown at verbosity >= 2.
    Debug,
    /// Recoverable problem, shown at verbosity >= 1.
    Warning,
    /// Problem that forced the current operation to give up; always kept.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Debug => write!(f, "debug"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A recorded diagnostic message.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Severity level.
    pub severity: Severity,
    /// Message text.
    pub message: String,
}

/// Collects diagnostics for one context.
///
/// Emission takes `&self` so passes holding a shared context reference
/// can report; the record lives behind a mutex for that reason, not for
/// cross-thread use.
#[derive(Debug, Default)]
pub struct DiagnosticEngine {
    verbosity: u32,
    records: Mutex<Vec<Diagnostic>>,
}

impl DiagnosticEngine {
    /// Create an engine at the given verbosity. 0 is quiet: warnings and
    /// debug messages are dropped and subprocess output goes to files.
    #[must_use]
    pub fn new(verbosity: u32) -> Self {
        Self {
            verbosity,
            records: Mutex::new(Vec::new()),
        }
    }

    /// Configured verbosity level.
    #[must_use]
    pub fn verbosity(&self) -> u32 {
        self.verbosity
    }

    /// Record a diagnostic, subject to the verbosity gate.
    pub fn emit(&self, severity: Severity, message: impl Into<String>) {
        let message = message.into();
        match severity {
            Severity::Debug => tracing::debug!(target: "cinder", "{message}"),
            Severity::Warning => tracing::warn!(target: "cinder", "{message}"),
            Severity::Error => tracing::error!(target: "cinder", "{message}"),
        }
        let kept = match severity {
            Severity::Debug => self.verbosity >= 2,
            Severity::Warning => self.verbosity >= 1,
            Severity::Error => true,
        };
        if kept
            && let Ok(mut records) = self.records.lock()
        {
            records.push(Diagnostic { severity, message });
        }
    }

    /// Record a debug-level diagnostic.
    pub fn debug(&self, message: impl Into<String>) {
        self.emit(Severity::Debug, message);
    }

    /// Record a warning.
    pub fn warning(&self, message: impl Into<String>) {
        self.emit(Severity::Warning, message);
    }

    /// Record an error.
    pub fn error(&self, message: impl Into<String>) {
        self.emit(Severity::Error, message);
    }

    /// Snapshot of everything recorded so far.
    #[must_use]
    pub fn recorded(&self) -> Vec<Diagnostic> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Check whether any recorded message contains `needle`.
    #[must_use]
    pub fn any_contains(&self, needle: &str) -> bool {
        self.records
            .lock()
            .map(|r| r.iter().any(|d| d.message.contains(needle)))
            .unwrap_or(false)
    }
}
