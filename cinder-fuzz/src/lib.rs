//! Cinder Fuzz - Fuzzing-Based Satisfiability Backend
//!
//! Decides quantifier-free boolean / bit-vector queries by synthesizing
//! a native candidate-checking program, compiling it with libFuzzer
//! instrumentation, and running coverage-guided fuzzing until an input
//! satisfies every constraint (SAT) or the attempt gives up (UNKNOWN).
//! This backend never answers UNSAT and never produces a model.
//!
//! Pipeline: sort conformance check, analysis passes (equality
//! extraction, free-variable buffer assignment), program builder, clang,
//! libFuzzer. The [`FuzzingSolver`] orchestrator sequences the stages
//! with a cancellation checkpoint between each.
//!
//! # Examples
//!
//! ```no_run
//! use cinder_core::{Context, Query, Sort};
//! use cinder_fuzz::{BackendOptions, FuzzingSolver, WorkingDirectory};
//!
//! let mut ctx = Context::new();
//! let x = ctx.terms.mk_var("x", Sort::BitVec(32));
//! let c = ctx.terms.mk_bv_const(0xdead_beef, 32);
//! let mut query = Query::new();
//! query.assert(ctx.terms.mk_eq(x, c));
//!
//! let workdir = WorkingDirectory::create("/tmp/cinder-run")?;
//! let solver = FuzzingSolver::new(BackendOptions::default(), workdir, &ctx)?;
//! let response = solver.solve(&mut query, &ctx, false);
//! println!("{:?}", response.satisfiability);
//! # Ok::<(), cinder_fuzz::BackendError>(())
//! ```

#![warn(missing_docs)]

pub mod analysis;
pub mod clang;
pub mod error;
mod invoke;
pub mod libfuzzer;
pub mod options;
pub mod program;
pub mod solver;
pub mod sort_check;
pub mod workdir;

pub use analysis::{BufferAssignment, BufferElement, FuzzingAnalysisInfo, VarLocation};
pub use clang::{ClangInvocationManager, CompilationManager};
pub use error::{BackendError, BackendResult};
pub use libfuzzer::{FuzzExecutionManager, FuzzerOutcome, LibFuzzerInvocationManager};
pub use options::{BackendOptions, ClangOptions, LibFuzzerOptions, SanitizerCoverage};
pub use program::{Program, ProgramBuilderPass};
pub use solver::{FuzzingSolver, Satisfiability, SolverResponse};
pub use sort_check::{SortConformanceCheckPass, fuzzable_sort};
pub use workdir::WorkingDirectory;
