//! Query pass framework.
//!
//! A pass is a named transformation or analysis step run against a
//! mutable [`Query`]. Passes are shared as `Arc<dyn QueryPass>` so a
//! solver can keep handles to in-flight passes (for cancellation) while
//! the manager runs them; per-run results therefore live in
//! interior-mutable fields on the pass itself.

use crate::context::Context;
use crate::query::Query;
use std::sync::Arc;

/// A single pipeline step.
pub trait QueryPass: Send + Sync {
    /// Run the pass. The returned flag is reserved for a future
    /// halt-pipeline signal; [`PassManager::run`] currently ignores it.
    fn run(&self, query: &mut Query, ctx: &Context) -> bool;

    /// Stable name for logging and diagnostics.
    fn name(&self) -> &'static str;

    /// Request that an in-progress `run` stop early. Default: no-op.
    /// Callable from any thread, idempotent.
    fn cancel(&self) {}
}

/// Runs an ordered list of passes against one query.
#[derive(Default)]
pub struct PassManager {
    passes: Vec<Arc<dyn QueryPass>>,
}

impl PassManager {
    /// Create an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pass; passes execute in insertion order.
    pub fn add(&mut self, pass: Arc<dyn QueryPass>) {
        self.passes.push(pass);
    }

    /// Number of registered passes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// Check if no passes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Run every pass in insertion order against `query`; later passes
    /// observe earlier passes' effects.
    pub fn run(&self, query: &mut Query, ctx: &Context) {
        for pass in &self.passes {
            tracing::debug!(target: "cinder", pass = pass.name(), "running pass");
            let _halt = pass.run(query, ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sort::Sort;
    use std::sync::Mutex;

    struct RecordingPass {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl QueryPass for RecordingPass {
        fn run(&self, _query: &mut Query, _ctx: &Context) -> bool {
            self.log.lock().unwrap().push(self.name);
            true
        }
        fn name(&self) -> &'static str {
            self.name
        }
    }

    struct DropFirstConstraintPass;

    impl QueryPass for DropFirstConstraintPass {
        fn run(&self, query: &mut Query, _ctx: &Context) -> bool {
            let mut constraints = query.constraints().to_vec();
            if !constraints.is_empty() {
                constraints.remove(0);
            }
            query.replace_constraints(constraints);
            true
        }
        fn name(&self) -> &'static str {
            "drop-first-constraint"
        }
    }

    struct LenSnapshotPass {
        seen: Arc<Mutex<Option<usize>>>,
    }

    impl QueryPass for LenSnapshotPass {
        fn run(&self, query: &mut Query, _ctx: &Context) -> bool {
            *self.seen.lock().unwrap() = Some(query.len());
            true
        }
        fn name(&self) -> &'static str {
            "len-snapshot"
        }
    }

    #[test]
    fn test_passes_run_in_insertion_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pm = PassManager::new();
        pm.add(Arc::new(RecordingPass {
            name: "first",
            log: Arc::clone(&log),
        }));
        pm.add(Arc::new(RecordingPass {
            name: "second",
            log: Arc::clone(&log),
        }));

        let mut ctx = Context::new();
        let t = ctx.terms.mk_true();
        let mut query = Query::from_constraints(vec![t]);
        pm.run(&mut query, &ctx);
        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn test_later_pass_sees_earlier_effects() {
        let mut ctx = Context::new();
        let a = ctx.terms.mk_var("a", Sort::Bool);
        let b = ctx.terms.mk_var("b", Sort::Bool);
        let mut query = Query::from_constraints(vec![a, b]);

        let seen = Arc::new(Mutex::new(None));
        let mut pm = PassManager::new();
        pm.add(Arc::new(DropFirstConstraintPass));
        pm.add(Arc::new(LenSnapshotPass {
            seen: Arc::clone(&seen),
        }));
        pm.run(&mut query, &ctx);

        assert_eq!(*seen.lock().unwrap(), Some(1));
        assert_eq!(query.constraints(), &[b]);
    }
}
