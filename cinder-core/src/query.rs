//! Queries: ordered constraint sets submitted for satisfiability.

use crate::term::TermId;

/// An ordered collection of top-level boolean constraints, interpreted
/// as a conjunction. Passes may rewrite it in place; ordering is
/// preserved because later pipeline stages (buffer layout, code
/// generation) depend on it being stable.
#[derive(Debug, Clone, Default)]
pub struct Query {
    constraints: Vec<TermId>,
}

impl Query {
    /// Create an empty (trivially satisfiable) query.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a query from constraints, keeping their order.
    #[must_use]
    pub fn from_constraints(constraints: Vec<TermId>) -> Self {
        Self { constraints }
    }

    /// Append a constraint.
    pub fn assert(&mut self, term: TermId) {
        self.constraints.push(term);
    }

    /// The constraints in assertion order.
    #[must_use]
    pub fn constraints(&self) -> &[TermId] {
        &self.constraints
    }

    /// Replace the constraint set, keeping the given order.
    pub fn replace_constraints(&mut self, constraints: Vec<TermId>) {
        self.constraints = constraints;
    }

    /// Number of constraints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    /// Check if the query has no constraints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }
}
