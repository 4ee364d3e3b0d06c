//! Fuzzing analysis passes.
//!
//! Two analyses feed code generation: equality extraction, which folds
//! variables asserted equal (or pinned to a constant) at the top level
//! into one buffer slot, and the free-variable buffer assignment, which
//! lays every remaining variable out in a flat bit-packed input buffer.
//! [`FuzzingAnalysisInfo`] bundles both so the orchestrator can register
//! them ahead of the program builder in one pass pipeline.

use cinder_core::{Context, PassManager, Query, QueryPass, TermId, TermKind, collect_free_variables};
use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex};

/// Equivalence information over free variables, extracted from
/// top-level `(= ...)` constraints.
#[derive(Debug, Clone, Default)]
pub struct EqualityFacts {
    representative: FxHashMap<TermId, TermId>,
    fixed: FxHashMap<TermId, u64>,
}

impl EqualityFacts {
    /// Representative of the variable's equivalence class (the variable
    /// itself when nothing was extracted for it).
    #[must_use]
    pub fn representative(&self, var: TermId) -> TermId {
        self.representative.get(&var).copied().unwrap_or(var)
    }

    /// Constant the variable's class is pinned to, if any.
    #[must_use]
    pub fn fixed_value(&self, var: TermId) -> Option<u64> {
        self.fixed.get(&self.representative(var)).copied()
    }

    /// Number of variables with non-trivial facts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.representative.len()
    }

    /// Check if nothing was extracted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.representative.is_empty()
    }
}

fn constant_value(ctx: &Context, id: TermId) -> Option<u64> {
    match ctx.terms.kind(id) {
        TermKind::True => Some(1),
        TermKind::False => Some(0),
        TermKind::BvConst { value, .. } => Some(*value),
        _ => None,
    }
}

/// Extracts variable equivalence classes and constant pins from
/// top-level equality constraints. Read-only on the query; results are
/// consumed by [`FreeVariableAssignmentPass`].
#[derive(Debug, Default)]
pub struct EqualityExtractionPass {
    facts: Mutex<EqualityFacts>,
}

impl EqualityExtractionPass {
    /// Create the pass.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Facts from the last run.
    #[must_use]
    pub fn facts(&self) -> EqualityFacts {
        self.facts.lock().map(|f| f.clone()).unwrap_or_default()
    }
}

impl QueryPass for EqualityExtractionPass {
    fn run(&self, query: &mut Query, ctx: &Context) -> bool {
        // Union-find over variables; the smallest handle (the earliest
        // created variable) becomes the class representative so buffer
        // layout stays in declaration order.
        let mut parent: FxHashMap<TermId, TermId> = FxHashMap::default();
        let mut pinned: Vec<(TermId, u64)> = Vec::new();

        fn find(parent: &mut FxHashMap<TermId, TermId>, var: TermId) -> TermId {
            let mut root = var;
            while let Some(&p) = parent.get(&root) {
                if p == root {
                    break;
                }
                root = p;
            }
            // Path compression.
            let mut cursor = var;
            while let Some(&p) = parent.get(&cursor) {
                if p == root {
                    break;
                }
                parent.insert(cursor, root);
                cursor = p;
            }
            root
        }

        for &constraint in query.constraints() {
            if *ctx.terms.kind(constraint) != TermKind::Eq {
                continue;
            }
            let lhs = ctx.terms.child(constraint, 0);
            let rhs = ctx.terms.child(constraint, 1);
            match (ctx.terms.is_var(lhs), ctx.terms.is_var(rhs)) {
                (true, true) => {
                    parent.entry(lhs).or_insert(lhs);
                    parent.entry(rhs).or_insert(rhs);
                    let ra = find(&mut parent, lhs);
                    let rb = find(&mut parent, rhs);
                    if ra != rb {
                        let (root, child) = if ra < rb { (ra, rb) } else { (rb, ra) };
                        parent.insert(child, root);
                    }
                }
                (true, false) => {
                    if let Some(value) = constant_value(ctx, rhs) {
                        parent.entry(lhs).or_insert(lhs);
                        pinned.push((lhs, value));
                    }
                }
                (false, true) => {
                    if let Some(value) = constant_value(ctx, lhs) {
                        parent.entry(rhs).or_insert(rhs);
                        pinned.push((rhs, value));
                    }
                }
                (false, false) => {}
            }
        }

        let mut facts = EqualityFacts::default();
        let vars: Vec<TermId> = parent.keys().copied().collect();
        for var in vars {
            let root = find(&mut parent, var);
            facts.representative.insert(var, root);
        }
        for (var, value) in pinned {
            let root = facts.representative(var);
            if let Some(existing) = facts.fixed.get(&root) {
                if *existing != value {
                    // Contradictory pins make the query unsatisfiable;
                    // this backend cannot conclude UNSAT, so note it and
                    // let the fuzzer search in vain.
                    ctx.diagnostics.debug(format!(
                        "conflicting constant bindings ({existing} vs {value}) for one equality class"
                    ));
                }
            } else {
                facts.fixed.insert(root, value);
            }
        }
        tracing::debug!(
            target: "cinder",
            classes = facts.representative.len(),
            pinned = facts.fixed.len(),
            "equality extraction finished"
        );
        if let Ok(mut slot) = self.facts.lock() {
            *slot = facts;
        }
        true
    }

    fn name(&self) -> &'static str {
        "equality-extraction"
    }
}

/// Where a free variable's value comes from at candidate-evaluation
/// time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarLocation {
    /// Read from the fuzzer input buffer at a bit offset.
    Buffer {
        /// Bit offset of the value's least significant bit.
        offset_bits: u64,
        /// Width in bits.
        width_bits: u32,
    },
    /// Pinned to a constant by an extracted equality.
    Fixed(u64),
}

/// One allocated slot in the input buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferElement {
    /// Class representative the slot belongs to.
    pub var: TermId,
    /// Bit offset.
    pub offset_bits: u64,
    /// Width in bits.
    pub width_bits: u32,
}

/// Bit-packed layout of all free variables in the fuzzer input buffer.
#[derive(Debug, Clone, Default)]
pub struct BufferAssignment {
    elements: Vec<BufferElement>,
    locations: FxHashMap<TermId, VarLocation>,
    total_bits: u64,
}

impl BufferAssignment {
    /// Allocated slots in layout order.
    #[must_use]
    pub fn elements(&self) -> &[BufferElement] {
        &self.elements
    }

    /// Location of a free variable.
    #[must_use]
    pub fn location(&self, var: TermId) -> Option<VarLocation> {
        self.locations.get(&var).copied()
    }

    /// Total occupied width in bits.
    #[must_use]
    pub fn total_bits(&self) -> u64 {
        self.total_bits
    }

    /// Buffer length in bytes: `ceil(total_bits / 8)`.
    #[must_use]
    pub fn max_input_length(&self) -> u64 {
        self.total_bits.div_ceil(8)
    }
}

/// Assigns every free variable a buffer slot (or a fixed constant),
/// honoring the equality classes so one slot serves a whole class.
#[derive(Debug)]
pub struct FreeVariableAssignmentPass {
    equalities: Arc<EqualityExtractionPass>,
    assignment: Mutex<Option<Arc<BufferAssignment>>>,
}

impl FreeVariableAssignmentPass {
    /// Create the pass; `equalities` must run first in the same
    /// pipeline.
    #[must_use]
    pub fn new(equalities: Arc<EqualityExtractionPass>) -> Self {
        Self {
            equalities,
            assignment: Mutex::new(None),
        }
    }

    /// The assignment produced by the last run.
    #[must_use]
    pub fn assignment(&self) -> Option<Arc<BufferAssignment>> {
        self.assignment.lock().ok().and_then(|a| a.clone())
    }
}

impl QueryPass for FreeVariableAssignmentPass {
    fn run(&self, query: &mut Query, ctx: &Context) -> bool {
        let facts = self.equalities.facts();
        let variables = collect_free_variables(&ctx.terms, query.constraints());

        let mut out = BufferAssignment::default();
        let mut slot_of: FxHashMap<TermId, usize> = FxHashMap::default();
        for var in variables {
            let Some(width_bits) = ctx.terms.sort(var).encoded_bits() else {
                // Unsupported sorts never get this far; the sort
                // conformance check runs before analysis.
                continue;
            };
            if let Some(value) = facts.fixed_value(var) {
                out.locations.insert(var, VarLocation::Fixed(value));
                continue;
            }
            let repr = facts.representative(var);
            let element_index = match slot_of.get(&repr) {
                Some(&index) => index,
                None => {
                    let index = out.elements.len();
                    out.elements.push(BufferElement {
                        var: repr,
                        offset_bits: out.total_bits,
                        width_bits,
                    });
                    out.total_bits += u64::from(width_bits);
                    slot_of.insert(repr, index);
                    index
                }
            };
            let element = &out.elements[element_index];
            out.locations.insert(
                var,
                VarLocation::Buffer {
                    offset_bits: element.offset_bits,
                    width_bits: element.width_bits,
                },
            );
        }

        tracing::debug!(
            target: "cinder",
            slots = out.elements.len(),
            total_bits = out.total_bits,
            "free variable assignment finished"
        );
        if let Ok(mut slot) = self.assignment.lock() {
            *slot = Some(Arc::new(out));
        }
        true
    }

    fn name(&self) -> &'static str {
        "free-variable-assignment"
    }
}

/// The derived artifacts a fuzzing backend needs: equality facts plus
/// the free-variable buffer assignment. Built once per solve attempt
/// and read-only afterwards; the program builder renders from it and
/// the orchestrator sizes the fuzzer's input length from it.
#[derive(Debug)]
pub struct FuzzingAnalysisInfo {
    /// Equality extraction pass (holds the facts after running).
    pub equality_extraction: Arc<EqualityExtractionPass>,
    /// Buffer assignment pass (holds the layout after running).
    pub free_variable_assignment: Arc<FreeVariableAssignmentPass>,
}

impl FuzzingAnalysisInfo {
    /// Create the analysis bundle.
    #[must_use]
    pub fn new() -> Self {
        let equality_extraction = Arc::new(EqualityExtractionPass::new());
        let free_variable_assignment = Arc::new(FreeVariableAssignmentPass::new(Arc::clone(
            &equality_extraction,
        )));
        Self {
            equality_extraction,
            free_variable_assignment,
        }
    }

    /// Register the analysis passes, in dependency order, ahead of
    /// whatever consumes them (the program builder).
    pub fn add_to(&self, pm: &mut PassManager) {
        pm.add(self.equality_extraction.clone());
        pm.add(self.free_variable_assignment.clone());
    }

    /// The buffer assignment, once the passes have run.
    #[must_use]
    pub fn buffer_assignment(&self) -> Option<Arc<BufferAssignment>> {
        self.free_variable_assignment.assignment()
    }
}

impl Default for FuzzingAnalysisInfo {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_core::Sort;

    fn run_analysis(query: &mut Query, ctx: &Context) -> Arc<BufferAssignment> {
        let info = FuzzingAnalysisInfo::new();
        let mut pm = PassManager::new();
        info.add_to(&mut pm);
        pm.run(query, ctx);
        info.buffer_assignment().expect("assignment populated")
    }

    #[test]
    fn test_buffer_length_rounds_up() {
        let mut ctx = Context::new();
        let a = ctx.terms.mk_var("a", Sort::Bool);
        let b = ctx.terms.mk_var("b", Sort::BitVec(7));
        let c = ctx.terms.mk_var("c", Sort::BitVec(16));
        let t = ctx.terms.mk_true();
        let bc = ctx.terms.mk_bv_const(1, 7);
        let cc = ctx.terms.mk_bv_const(9, 16);
        let c0 = ctx.terms.mk_implies(a, t);
        let c1 = ctx.terms.mk_bv_ult(bc, b);
        let c2 = ctx.terms.mk_bv_ule(c, cc);
        let mut query = Query::from_constraints(vec![c0, c1, c2]);

        let assignment = run_analysis(&mut query, &ctx);
        // 1 + 7 + 16 bits = 24 bits = 3 bytes.
        assert_eq!(assignment.total_bits(), 24);
        assert_eq!(assignment.max_input_length(), 3);
        assert_eq!(assignment.elements().len(), 3);
    }

    #[test]
    fn test_equal_variables_share_a_slot() {
        let mut ctx = Context::new();
        let x = ctx.terms.mk_var("x", Sort::BitVec(8));
        let y = ctx.terms.mk_var("y", Sort::BitVec(8));
        let z = ctx.terms.mk_var("z", Sort::BitVec(8));
        let eq_xy = ctx.terms.mk_eq(x, y);
        let c = ctx.terms.mk_bv_const(7, 8);
        let lt = ctx.terms.mk_bv_ult(z, c);
        let mut query = Query::from_constraints(vec![eq_xy, lt]);

        let assignment = run_analysis(&mut query, &ctx);
        // x and y collapse onto one slot; z gets its own.
        assert_eq!(assignment.elements().len(), 2);
        assert_eq!(assignment.total_bits(), 16);
        assert_eq!(assignment.location(x), assignment.location(y));
        assert_ne!(assignment.location(x), assignment.location(z));
    }

    #[test]
    fn test_pinned_variable_needs_no_slot() {
        let mut ctx = Context::new();
        let x = ctx.terms.mk_var("x", Sort::BitVec(8));
        let y = ctx.terms.mk_var("y", Sort::BitVec(8));
        let c = ctx.terms.mk_bv_const(42, 8);
        let pin = ctx.terms.mk_eq(x, c);
        let lt = ctx.terms.mk_bv_ult(x, y);
        let mut query = Query::from_constraints(vec![pin, lt]);

        let assignment = run_analysis(&mut query, &ctx);
        assert_eq!(assignment.location(x), Some(VarLocation::Fixed(42)));
        assert_eq!(assignment.elements().len(), 1);
        assert_eq!(assignment.total_bits(), 8);
    }

    #[test]
    fn test_pin_propagates_through_class() {
        let mut ctx = Context::new();
        let x = ctx.terms.mk_var("x", Sort::BitVec(8));
        let y = ctx.terms.mk_var("y", Sort::BitVec(8));
        let c = ctx.terms.mk_bv_const(5, 8);
        let eq_xy = ctx.terms.mk_eq(x, y);
        let pin_y = ctx.terms.mk_eq(c, y);
        let mut query = Query::from_constraints(vec![eq_xy, pin_y]);

        let assignment = run_analysis(&mut query, &ctx);
        assert_eq!(assignment.location(x), Some(VarLocation::Fixed(5)));
        assert_eq!(assignment.location(y), Some(VarLocation::Fixed(5)));
        assert_eq!(assignment.max_input_length(), 0);
    }
}
