//! Solving context: term storage plus diagnostics.

use crate::diagnostics::DiagnosticEngine;
use crate::term::TermManager;

/// Shared state for one front end / solver pairing: the term arena and
/// the diagnostic stream. Owned by the caller for the duration of a
/// solve; only the solving thread touches it.
#[derive(Debug, Default)]
pub struct Context {
    /// Term arena.
    pub terms: TermManager,
    /// Verbosity-gated diagnostic stream.
    pub diagnostics: DiagnosticEngine,
}

impl Context {
    /// Create a context at verbosity 0 (quiet).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context at the given verbosity.
    #[must_use]
    pub fn with_verbosity(verbosity: u32) -> Self {
        Self {
            terms: TermManager::new(),
            diagnostics: DiagnosticEngine::new(verbosity),
        }
    }

    /// Configured verbosity level.
    #[must_use]
    pub fn verbosity(&self) -> u32 {
        self.diagnostics.verbosity()
    }
}
