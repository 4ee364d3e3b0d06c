//! Read-only term visiting and whole-graph enumeration.

use crate::term::{TermId, TermKind, TermManager};
use rustc_hash::FxHashSet;

/// Dispatches constant terms to one handler per category.
///
/// This design only works for read-only traversal: there is no hook for
/// rewriting a term and no guarantee about the order children are seen
/// in. It needs rethinking before it can support modification or a
/// fixed traversal order, so do not bolt either on here.
pub trait TermVisitor {
    /// Called for `true` / `false`.
    fn visit_bool_constant(&mut self, tm: &TermManager, id: TermId);

    /// Called for bit-vector constants.
    fn visit_bv_constant(&mut self, tm: &TermManager, id: TermId);

    /// Dispatch a single term to the matching handler. Non-constant
    /// terms are ignored; enumerating a whole graph is the caller's job
    /// (see [`for_each_distinct`]).
    fn visit(&mut self, tm: &TermManager, id: TermId) {
        match tm.kind(id) {
            TermKind::True | TermKind::False => self.visit_bool_constant(tm, id),
            TermKind::BvConst { .. } => self.visit_bv_constant(tm, id),
            _ => {}
        }
    }
}

/// Depth-first enumeration of every distinct term reachable from
/// `roots`, calling `f` exactly once per node no matter how many parents
/// share it. The visited set keys on handle identity; hash-consing makes
/// that equivalent to structural identity. No visit order is guaranteed.
pub fn for_each_distinct<F>(tm: &TermManager, roots: &[TermId], mut f: F)
where
    F: FnMut(TermId),
{
    let mut worklist: Vec<TermId> = roots.to_vec();
    let mut visited: FxHashSet<TermId> = FxHashSet::default();
    while let Some(id) = worklist.pop() {
        if !visited.insert(id) {
            continue;
        }
        f(id);
        worklist.extend_from_slice(tm.children(id));
    }
}

/// Free variables reachable from `roots`, in first-encounter order of a
/// deterministic DFS. Order matters downstream: the input-buffer layout
/// is derived from it.
#[must_use]
pub fn collect_free_variables(tm: &TermManager, roots: &[TermId]) -> Vec<TermId> {
    let mut variables = Vec::new();
    let mut worklist: Vec<TermId> = roots.iter().rev().copied().collect();
    let mut visited: FxHashSet<TermId> = FxHashSet::default();
    while let Some(id) = worklist.pop() {
        if !visited.insert(id) {
            continue;
        }
        if tm.is_var(id) {
            variables.push(id);
        }
        for &child in tm.children(id).iter().rev() {
            worklist.push(child);
        }
    }
    variables
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sort::Sort;

    #[test]
    fn test_distinct_visits_shared_node_once() {
        let mut tm = TermManager::new();
        let x = tm.mk_var("x", Sort::BitVec(8));
        let one = tm.mk_bv_const(1, 8);
        let inc = tm.mk_bv_add(x, one);
        let a = tm.mk_bv_ult(inc, x);
        let b = tm.mk_bv_ule(inc, one);

        let mut seen = Vec::new();
        for_each_distinct(&tm, &[a, b], |id| seen.push(id));
        // x, one, inc, a, b: five distinct nodes, `inc` only once.
        assert_eq!(seen.len(), 5);
        assert_eq!(seen.iter().filter(|&&id| id == inc).count(), 1);
    }

    #[test]
    fn test_collect_free_variables_ordered() {
        let mut tm = TermManager::new();
        let a = tm.mk_var("a", Sort::Bool);
        let x = tm.mk_var("x", Sort::BitVec(8));
        let y = tm.mk_var("y", Sort::BitVec(8));
        let lt = tm.mk_bv_ult(x, y);
        let c0 = tm.mk_implies(a, lt);
        let c1 = tm.mk_bv_ule(y, x);

        let vars = collect_free_variables(&tm, &[c0, c1]);
        assert_eq!(vars, vec![a, x, y]);
    }

    #[test]
    fn test_visitor_dispatch() {
        struct Counter {
            bools: usize,
            bvs: usize,
        }
        impl TermVisitor for Counter {
            fn visit_bool_constant(&mut self, _tm: &TermManager, _id: TermId) {
                self.bools += 1;
            }
            fn visit_bv_constant(&mut self, _tm: &TermManager, _id: TermId) {
                self.bvs += 1;
            }
        }

        let mut tm = TermManager::new();
        let t = tm.mk_true();
        let c = tm.mk_bv_const(3, 4);
        let x = tm.mk_var("x", Sort::BitVec(4));

        let mut counter = Counter { bools: 0, bvs: 0 };
        counter.visit(&tm, t);
        counter.visit(&tm, c);
        counter.visit(&tm, x); // not a constant, no handler fires
        assert_eq!(counter.bools, 1);
        assert_eq!(counter.bvs, 1);
    }
}
