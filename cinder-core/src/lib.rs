//! Cinder Core - Terms, Queries, and the Pass Framework
//!
//! This crate provides the foundational types for the Cinder fuzzing
//! solver:
//! - Hash-consed terms with cheap [`TermId`] handles over a shared DAG
//! - A small sort system (booleans and fixed-width bit-vectors)
//! - [`Query`] / [`Context`] pairing a constraint set with term storage
//!   and a verbosity-gated diagnostic stream
//! - A [`QueryPass`] / [`PassManager`] pipeline framework with optional
//!   per-pass cancellation
//! - Read-only constant visiting and distinct-term DFS enumeration
//!
//! # Examples
//!
//! ```
//! use cinder_core::{Context, Query, Sort};
//!
//! let mut ctx = Context::new();
//! let x = ctx.terms.mk_var("x", Sort::BitVec(8));
//! let c = ctx.terms.mk_bv_const(200, 8);
//! let gt = ctx.terms.mk_bv_ult(c, x);
//!
//! let mut query = Query::new();
//! query.assert(gt);
//! assert_eq!(query.len(), 1);
//! ```

#![warn(missing_docs)]

pub mod context;
pub mod diagnostics;
pub mod model;
pub mod pass;
pub mod query;
pub mod sort;
pub mod term;
pub mod traversal;

pub use context::Context;
pub use diagnostics::{Diagnostic, DiagnosticEngine, Severity};
pub use model::Model;
pub use pass::{PassManager, QueryPass};
pub use query::Query;
pub use sort::Sort;
pub use term::{TermId, TermKind, TermManager};
pub use traversal::{TermVisitor, collect_free_variables, for_each_distinct};
