//! Backend configuration.
//!
//! Immutable once a solver is constructed. Clang options describe the
//! toolchain invocation; libFuzzer options are derived fresh for each
//! solve (target path, max input length and artifact directories depend
//! on the query).

use crate::error::{BackendError, BackendResult};
use cinder_core::Context;
use std::path::PathBuf;
use std::time::Duration;

/// Coverage instrumentation modes passed to clang via
/// `-fsanitize-coverage=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SanitizerCoverage {
    /// `trace-pc`
    TracePc,
    /// `trace-pc-guard`
    TracePcGuard,
    /// `trace-cmp`; also switches the fuzzer to comparison tracing.
    TraceCmp,
}

impl SanitizerCoverage {
    /// The clang flag fragment for this mode.
    #[must_use]
    pub fn as_flag(&self) -> &'static str {
        match self {
            SanitizerCoverage::TracePc => "trace-pc",
            SanitizerCoverage::TracePcGuard => "trace-pc-guard",
            SanitizerCoverage::TraceCmp => "trace-cmp",
        }
    }
}

/// Toolchain invocation options.
#[derive(Debug, Clone)]
pub struct ClangOptions {
    /// Path to the clang binary.
    pub clang_path: PathBuf,
    /// `-O` level for the candidate program.
    pub optimization_level: u32,
    /// Coverage instrumentation to request, in addition to
    /// `-fsanitize=fuzzer`.
    pub sanitizer_coverage: Vec<SanitizerCoverage>,
}

impl Default for ClangOptions {
    fn default() -> Self {
        Self {
            clang_path: PathBuf::from("clang"),
            optimization_level: 2,
            sanitizer_coverage: vec![SanitizerCoverage::TracePcGuard, SanitizerCoverage::TraceCmp],
        }
    }
}

impl ClangOptions {
    /// Check that the configured toolchain exists. Bare command names
    /// (no path separator) are left to `PATH` resolution at spawn time.
    pub fn check_paths(&self, ctx: &Context) -> BackendResult<()> {
        if self.clang_path.components().count() > 1 && !self.clang_path.exists() {
            ctx.diagnostics
                .error(format!("clang not found at {}", self.clang_path.display()));
            return Err(BackendError::MissingToolchain {
                path: self.clang_path.clone(),
            });
        }
        Ok(())
    }

    /// Whether comparison tracing was requested.
    #[must_use]
    pub fn wants_cmp_trace(&self) -> bool {
        self.sanitizer_coverage.contains(&SanitizerCoverage::TraceCmp)
    }
}

/// Options for one libFuzzer run, derived per solve.
#[derive(Debug, Clone, Default)]
pub struct LibFuzzerOptions {
    /// The compiled candidate-checking binary.
    pub target_binary: PathBuf,
    /// Maximum input length in bytes (the packed free-variable buffer).
    pub max_length: u64,
    /// Corpus directory.
    pub corpus_dir: PathBuf,
    /// Directory crash artifacts are written to.
    pub artifact_dir: PathBuf,
    /// Enable comparison-trace guided mutation.
    pub use_cmp: bool,
    /// Stop fuzzing after this wall-clock budget, if set. Cinder itself
    /// imposes no timeout; external watchdogs should prefer `cancel()`.
    pub max_total_time: Option<Duration>,
}

/// Complete backend configuration.
#[derive(Debug, Clone, Default)]
pub struct BackendOptions {
    /// Toolchain options.
    pub clang: ClangOptions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_wants_cmp() {
        assert!(ClangOptions::default().wants_cmp_trace());
    }

    #[test]
    fn test_check_paths_missing_binary() {
        let ctx = Context::new();
        let opts = ClangOptions {
            clang_path: PathBuf::from("/nonexistent/path/to/clang"),
            ..ClangOptions::default()
        };
        assert!(matches!(
            opts.check_paths(&ctx),
            Err(BackendError::MissingToolchain { .. })
        ));
        assert!(ctx.diagnostics.any_contains("/nonexistent/path/to/clang"));
    }

    #[test]
    fn test_check_paths_bare_name_ok() {
        let ctx = Context::new();
        assert!(ClangOptions::default().check_paths(&ctx).is_ok());
    }
}
