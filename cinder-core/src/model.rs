//! Satisfying assignments.

use crate::term::TermId;
use rustc_hash::FxHashMap;

/// A (partial) assignment of constant values to free variables.
///
/// The fuzzing backend never produces one: reconstructing a model from a
/// fuzzer-found input is unimplemented, so its responses carry `None`.
/// The type exists so the response shape matches solvers that do.
#[derive(Debug, Clone, Default)]
pub struct Model {
    assignments: FxHashMap<TermId, u64>,
}

impl Model {
    /// Create an empty model.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a variable to a constant value.
    pub fn assign(&mut self, var: TermId, value: u64) {
        self.assignments.insert(var, value);
    }

    /// Look up a variable's value.
    #[must_use]
    pub fn value(&self, var: TermId) -> Option<u64> {
        self.assignments.get(&var).copied()
    }

    /// Number of bound variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    /// Check if the model binds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}
