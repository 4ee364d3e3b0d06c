//! Sort conformance checking.
//!
//! Before any code generation, every distinct term reachable from the
//! query must have a sort the backend can encode into a fuzzer input
//! buffer. The check is a read-only query pass so it can slot into the
//! same pipeline (and cancellation registry) as everything else.

use cinder_core::{Context, Query, QueryPass, Sort, TermId};
use rustc_hash::FxHashSet;
use std::sync::atomic::{AtomicBool, Ordering};

/// Predicate over sorts, with the context available for diagnostics.
pub type SortPredicate = dyn Fn(&Sort, &Context) -> bool + Send + Sync;

/// Verifies that a predicate holds for the sort of every distinct term
/// reachable from the query's constraints. Aborts on the first failure.
/// Never mutates the query.
pub struct SortConformanceCheckPass {
    predicate: Box<SortPredicate>,
    held: AtomicBool,
    cancelled: AtomicBool,
}

impl SortConformanceCheckPass {
    /// Create the pass with the given predicate.
    pub fn new(predicate: impl Fn(&Sort, &Context) -> bool + Send + Sync + 'static) -> Self {
        Self {
            predicate: Box::new(predicate),
            held: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
        }
    }

    /// True iff the last `run` saw the predicate hold for every distinct
    /// reachable term. A cancelled run reports false.
    #[must_use]
    pub fn predicate_always_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

impl QueryPass for SortConformanceCheckPass {
    fn run(&self, query: &mut Query, ctx: &Context) -> bool {
        // LIFO worklist DFS. Sibling order ends up reversed relative to
        // child index, which is immaterial: the predicate is evaluated
        // per distinct term, not in any promised order.
        let mut worklist: Vec<TermId> = query.constraints().to_vec();
        let mut visited: FxHashSet<TermId> = FxHashSet::default();
        self.held.store(true, Ordering::Release);

        while let Some(node) = worklist.pop() {
            if self.cancelled.load(Ordering::Acquire) {
                ctx.diagnostics.debug("sort conformance check cancelled");
                self.held.store(false, Ordering::Release);
                return false;
            }
            if visited.contains(&node) {
                continue;
            }
            if !(self.predicate)(ctx.terms.sort(node), ctx) {
                self.held.store(false, Ordering::Release);
                break;
            }
            visited.insert(node);
            for index in 0..ctx.terms.num_children(node) {
                worklist.push(ctx.terms.child(node, index));
            }
        }
        true
    }

    fn name(&self) -> &'static str {
        "sort-conformance-check"
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

/// The fuzzing backend's sort predicate: booleans and bit-vectors up to
/// 64 bits wide. Rejections are explained on the warning stream.
pub fn fuzzable_sort(sort: &Sort, ctx: &Context) -> bool {
    match sort {
        Sort::Bool => true,
        Sort::BitVec(width) if *width <= 64 => true,
        Sort::BitVec(width) => {
            ctx.diagnostics
                .warning(format!("bit-vector width {width} not supported"));
            false
        }
        other => {
            ctx.diagnostics
                .warning(format!("sort \"{other}\" not supported"));
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn run_check(
        query: &mut Query,
        ctx: &Context,
        predicate: impl Fn(&Sort, &Context) -> bool + Send + Sync + 'static,
    ) -> bool {
        let pass = SortConformanceCheckPass::new(predicate);
        pass.run(query, ctx);
        pass.predicate_always_held()
    }

    #[test]
    fn test_shared_subterm_evaluated_once() {
        let mut ctx = Context::new();
        let x = ctx.terms.mk_var("x", Sort::BitVec(8));
        let one = ctx.terms.mk_bv_const(1, 8);
        let inc = ctx.terms.mk_bv_add(x, one);
        // `inc` shared by two parents.
        let c0 = ctx.terms.mk_bv_ult(inc, x);
        let c1 = ctx.terms.mk_bv_ule(inc, one);
        let mut query = Query::from_constraints(vec![c0, c1]);

        let evaluations = std::sync::Arc::new(AtomicUsize::new(0));
        let counter = std::sync::Arc::clone(&evaluations);
        let held = run_check(&mut query, &ctx, move |_, _| {
            counter.fetch_add(1, Ordering::Relaxed);
            true
        });
        assert!(held);
        // Distinct nodes: x, one, inc, c0, c1.
        assert_eq!(evaluations.load(Ordering::Relaxed), 5);
    }

    #[test]
    fn test_aborts_on_first_failure() {
        let mut ctx = Context::new();
        let x = ctx.terms.mk_var("x", Sort::Uninterpreted("Real".into()));
        let y = ctx.terms.mk_var("x2", Sort::Uninterpreted("Real".into()));
        let eq = ctx.terms.mk_eq(x, y);
        let mut query = Query::from_constraints(vec![eq]);

        let evaluations = std::sync::Arc::new(AtomicUsize::new(0));
        let counter = std::sync::Arc::clone(&evaluations);
        let held = run_check(&mut query, &ctx, move |sort, _| {
            counter.fetch_add(1, Ordering::Relaxed);
            sort.is_bool()
        });
        assert!(!held);
        // eq is Bool and passes; the first Real operand fails and stops
        // the traversal before the second is reached.
        assert_eq!(evaluations.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_width_64_supported() {
        let mut ctx = Context::new();
        let x = ctx.terms.mk_var("x", Sort::BitVec(64));
        let c = ctx.terms.mk_bv_const(0, 64);
        let eq = ctx.terms.mk_eq(x, c);
        let mut query = Query::from_constraints(vec![eq]);
        assert!(run_check(&mut query, &ctx, fuzzable_sort));
    }

    #[test]
    fn test_width_65_rejected_with_diagnostic() {
        let mut ctx = Context::with_verbosity(1);
        let x = ctx.terms.mk_var("x", Sort::BitVec(65));
        let y = ctx.terms.mk_var("y", Sort::BitVec(65));
        let eq = ctx.terms.mk_eq(x, y);
        let mut query = Query::from_constraints(vec![eq]);
        assert!(!run_check(&mut query, &ctx, fuzzable_sort));
        assert!(ctx.diagnostics.any_contains("65"));
    }

    #[test]
    fn test_unsupported_sort_named_in_diagnostic() {
        let mut ctx = Context::with_verbosity(1);
        let x = ctx.terms.mk_var("x", Sort::Uninterpreted("Real".into()));
        let y = ctx.terms.mk_var("y", Sort::Uninterpreted("Real".into()));
        let eq = ctx.terms.mk_eq(x, y);
        let mut query = Query::from_constraints(vec![eq]);
        assert!(!run_check(&mut query, &ctx, fuzzable_sort));
        assert!(ctx.diagnostics.any_contains("Real"));
    }

    #[test]
    fn test_cancelled_run_reports_false() {
        let mut ctx = Context::new();
        let t = ctx.terms.mk_true();
        let mut query = Query::from_constraints(vec![t]);
        let pass = SortConformanceCheckPass::new(|_, _| true);
        pass.cancel();
        pass.run(&mut query, &ctx);
        assert!(!pass.predicate_always_held());
    }

    #[test]
    fn test_empty_query_holds_vacuously() {
        let ctx = Context::new();
        let mut query = Query::new();
        assert!(run_check(&mut query, &ctx, |_, _| false));
    }
}
