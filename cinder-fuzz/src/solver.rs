//! The fuzzing solver orchestrator.
//!
//! One `solve` call walks a strictly sequential state machine:
//! check sorts, build the candidate program, compile it, configure and
//! run the fuzzer, report. There are no retries and no backward
//! transitions; every stage boundary doubles as a cancellation
//! checkpoint. `cancel()` may arrive from any thread at any point and
//! reaches whichever stage is active: an in-flight pass through the
//! cancellable-pass registry, a subprocess through its invocation
//! manager.

use crate::analysis::FuzzingAnalysisInfo;
use crate::clang::{ClangInvocationManager, CompilationManager};
use crate::error::BackendResult;
use crate::libfuzzer::{FuzzExecutionManager, FuzzerOutcome, LibFuzzerInvocationManager};
use crate::options::{BackendOptions, LibFuzzerOptions};
use crate::program::ProgramBuilderPass;
use crate::sort_check::{SortConformanceCheckPass, fuzzable_sort};
use crate::workdir::WorkingDirectory;
use cinder_core::{Context, Model, PassManager, Query, QueryPass};
use rustc_hash::FxHashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// What the solver concluded. This backend can witness satisfiability
/// (the fuzzer found an input) but can never rule it out, so there is
/// no `Unsat` variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Satisfiability {
    /// A satisfying assignment exists.
    Sat,
    /// Not determined: unsupported input, compile failure, fuzzing
    /// exhausted, or cancellation. Detail is on the diagnostic stream.
    Unknown,
}

/// Verdict for one solve call.
#[derive(Debug, Clone)]
pub struct SolverResponse {
    /// The verdict.
    pub satisfiability: Satisfiability,
    model: Option<Model>,
}

impl SolverResponse {
    fn new(satisfiability: Satisfiability) -> Self {
        Self {
            satisfiability,
            model: None,
        }
    }

    /// The model, were one ever produced. Reconstructing a model from a
    /// fuzzer-found input is unimplemented, so this is always `None`.
    #[must_use]
    pub fn model(&self) -> Option<&Model> {
        self.model.as_ref()
    }
}

/// Registry of currently-executing cancellable passes, guarded by one
/// lock. A pass is inserted just before it runs and removed by the RAII
/// guard on every exit path, so `cancel()` never sees a half-registered
/// pass and nothing stays registered after its run.
#[derive(Default)]
struct CancellablePassSet {
    inner: Mutex<FxHashMap<usize, Arc<dyn QueryPass>>>,
}

struct PassRegistration<'a> {
    set: &'a CancellablePassSet,
    key: usize,
}

impl CancellablePassSet {
    fn register(&self, pass: Arc<dyn QueryPass>) -> PassRegistration<'_> {
        let key = Arc::as_ptr(&pass) as *const () as usize;
        if let Ok(mut inner) = self.inner.lock() {
            inner.insert(key, pass);
        }
        PassRegistration { set: self, key }
    }

    fn cancel_all(&self) {
        if let Ok(inner) = self.inner.lock() {
            for pass in inner.values() {
                pass.cancel();
            }
        }
    }

    fn len(&self) -> usize {
        self.inner.lock().map(|inner| inner.len()).unwrap_or(0)
    }
}

impl Drop for PassRegistration<'_> {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.set.inner.lock() {
            inner.remove(&self.key);
        }
    }
}

/// Decides queries by compiling them into a native candidate-checking
/// program and fuzzing it for a satisfying input.
pub struct FuzzingSolver {
    options: BackendOptions,
    workdir: WorkingDirectory,
    compiler: Box<dyn CompilationManager>,
    fuzzer: Box<dyn FuzzExecutionManager>,
    cancelled: AtomicBool,
    cancellable_passes: CancellablePassSet,
}

impl FuzzingSolver {
    /// Create a solver backed by the real clang and libFuzzer
    /// invocation managers. Fails outright when the configured
    /// toolchain does not exist; a broken setup should not surface as
    /// `Unknown` verdicts later.
    pub fn new(
        options: BackendOptions,
        workdir: WorkingDirectory,
        ctx: &Context,
    ) -> BackendResult<Self> {
        options.clang.check_paths(ctx)?;
        Ok(Self::with_managers(
            options,
            workdir,
            Box::new(ClangInvocationManager::new()),
            Box::new(LibFuzzerInvocationManager::new()),
        ))
    }

    /// Create a solver with caller-supplied managers. No toolchain
    /// check; the managers own that concern.
    #[must_use]
    pub fn with_managers(
        options: BackendOptions,
        workdir: WorkingDirectory,
        compiler: Box<dyn CompilationManager>,
        fuzzer: Box<dyn FuzzExecutionManager>,
    ) -> Self {
        Self {
            options,
            workdir,
            compiler,
            fuzzer,
            cancelled: AtomicBool::new(false),
            cancellable_passes: CancellablePassSet::default(),
        }
    }

    /// Backend name, for diagnostics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        "fuzzing-solver"
    }

    /// Cooperatively cancel the current (or next) solve. Callable from
    /// any thread, idempotent, never blocks on the solve's progress.
    /// The flag is observed at every stage boundary; active passes and
    /// subprocesses are interrupted directly.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.cancellable_passes.cancel_all();
        // Unconditional forwarding: each manager's cancel is a no-op
        // when it has nothing running.
        self.compiler.cancel();
        self.fuzzer.cancel();
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn unknown(&self) -> SolverResponse {
        SolverResponse::new(Satisfiability::Unknown)
    }

    fn checkpoint(&self, ctx: &Context) -> Option<SolverResponse> {
        if self.is_cancelled() {
            ctx.diagnostics.debug(format!("{} cancelled", self.name()));
            Some(self.unknown())
        } else {
            None
        }
    }

    fn check_sorts(&self, query: &mut Query, ctx: &Context) -> bool {
        let pass = Arc::new(SortConformanceCheckPass::new(fuzzable_sort));
        let as_dyn: Arc<dyn QueryPass> = pass.clone();
        let _registration = self.cancellable_passes.register(Arc::clone(&as_dyn));
        let mut pm = PassManager::new();
        pm.add(as_dyn);
        pm.run(query, ctx);
        pass.predicate_always_held()
    }

    fn quiet_capture(&self, ctx: &Context, stdout: &str, stderr: &str) -> (Option<PathBuf>, Option<PathBuf>) {
        if ctx.verbosity() == 0 {
            (
                Some(self.workdir.path_to_file(stdout)),
                Some(self.workdir.path_to_file(stderr)),
            )
        } else {
            (None, None)
        }
    }

    /// Decide `query`. Returns SAT when the fuzzer finds an input
    /// satisfying every constraint, UNKNOWN otherwise; never UNSAT and
    /// never a model.
    pub fn solve(&self, query: &mut Query, ctx: &Context, produce_model: bool) -> SolverResponse {
        // Model-request gate: nothing downstream can honor one.
        if produce_model {
            ctx.diagnostics.error("model generation not supported");
            return self.unknown();
        }
        if let Some(response) = self.checkpoint(ctx) {
            return response;
        }

        tracing::debug!(target: "cinder", stage = "check-sorts", "solve");
        if !self.check_sorts(query, ctx) {
            ctx.diagnostics.debug("unsupported sorts in query");
            return self.unknown();
        }
        if let Some(response) = self.checkpoint(ctx) {
            return response;
        }

        tracing::debug!(target: "cinder", stage = "build-program", "solve");
        let info = Arc::new(FuzzingAnalysisInfo::new());
        let builder = Arc::new(ProgramBuilderPass::new(Arc::clone(&info)));
        {
            let as_dyn: Arc<dyn QueryPass> = builder.clone();
            let _registration = self.cancellable_passes.register(Arc::clone(&as_dyn));
            let mut pm = PassManager::new();
            info.add_to(&mut pm);
            pm.add(as_dyn);
            pm.run(query, ctx);
        }
        if let Some(response) = self.checkpoint(ctx) {
            return response;
        }
        let Some(program) = builder.program() else {
            ctx.diagnostics.error("candidate program generation produced nothing");
            return self.unknown();
        };
        let Some(assignment) = info.buffer_assignment() else {
            ctx.diagnostics.error("free variable assignment missing");
            return self.unknown();
        };

        tracing::debug!(target: "cinder", stage = "compile", "solve");
        let source_file = self.workdir.path_to_file("program.c");
        let output_file = self.workdir.path_to_file("fuzzer");
        let (clang_stdout, clang_stderr) =
            self.quiet_capture(ctx, "clang.stdout.txt", "clang.stderr.txt");
        let compiled = self.compiler.compile(
            &program,
            &source_file,
            &output_file,
            &self.options.clang,
            clang_stdout.as_deref(),
            clang_stderr.as_deref(),
            ctx,
        );
        if !compiled {
            ctx.diagnostics.error("candidate program compilation failed");
            return self.unknown();
        }
        if let Some(response) = self.checkpoint(ctx) {
            return response;
        }

        tracing::debug!(target: "cinder", stage = "configure-fuzzer", "solve");
        let corpus_dir = match self.workdir.new_directory("corpus") {
            Ok(dir) => dir,
            Err(err) => {
                ctx.diagnostics.error(format!("failed to create corpus directory: {err}"));
                return self.unknown();
            }
        };
        let artifact_dir = match self.workdir.new_directory("artifacts") {
            Ok(dir) => dir,
            Err(err) => {
                ctx.diagnostics.error(format!("failed to create artifact directory: {err}"));
                return self.unknown();
            }
        };
        let fuzzer_opts = LibFuzzerOptions {
            target_binary: output_file,
            max_length: assignment.max_input_length(),
            corpus_dir,
            artifact_dir,
            use_cmp: self.options.clang.wants_cmp_trace(),
            max_total_time: None,
        };
        let (fuzzer_stdout, fuzzer_stderr) =
            self.quiet_capture(ctx, "libfuzzer.stdout.txt", "libfuzzer.stderr.txt");
        if let Some(response) = self.checkpoint(ctx) {
            return response;
        }

        tracing::debug!(target: "cinder", stage = "fuzz", "solve");
        let outcome = self.fuzzer.fuzz(
            &fuzzer_opts,
            fuzzer_stdout.as_deref(),
            fuzzer_stderr.as_deref(),
            ctx,
        );
        match outcome {
            FuzzerOutcome::TargetFound => SolverResponse::new(Satisfiability::Sat),
            // Deliberately indistinguishable in the verdict; the
            // diagnostic stream keeps the difference.
            FuzzerOutcome::Unknown => {
                ctx.diagnostics.debug("fuzzing inconclusive");
                self.unknown()
            }
            FuzzerOutcome::Cancelled => {
                ctx.diagnostics.debug("fuzzing cancelled");
                self.unknown()
            }
        }
    }
}
