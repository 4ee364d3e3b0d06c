//! LibFuzzer invocation.

use crate::invoke::{SubprocessHandle, capture_to};
use crate::options::LibFuzzerOptions;
use cinder_core::Context;
use std::path::Path;
use std::process::Command;

/// Outcome of one fuzzing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuzzerOutcome {
    /// The target aborted: an input satisfying every constraint exists.
    TargetFound,
    /// The run finished without finding a satisfying input.
    Unknown,
    /// The run was cancelled mid-search.
    Cancelled,
}

/// Drives coverage-guided fuzzing against the compiled target.
///
/// Same trait seam as the compilation side: the real implementation is
/// [`LibFuzzerInvocationManager`], tests substitute their own.
pub trait FuzzExecutionManager: Send + Sync {
    /// Run the fuzzer per `opts`, redirecting its output to the given
    /// files when paths are supplied (quiet mode).
    fn fuzz(
        &self,
        opts: &LibFuzzerOptions,
        stdout_file: Option<&Path>,
        stderr_file: Option<&Path>,
        ctx: &Context,
    ) -> FuzzerOutcome;

    /// Kill an in-flight fuzzing run; harmless when idle.
    fn cancel(&self);
}

/// Invokes the libFuzzer-instrumented target binary.
#[derive(Debug, Default)]
pub struct LibFuzzerInvocationManager {
    subprocess: SubprocessHandle,
}

impl LibFuzzerInvocationManager {
    /// Create an idle manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn artifact_found(artifact_dir: &Path) -> bool {
        std::fs::read_dir(artifact_dir)
            .map(|entries| entries.flatten().next().is_some())
            .unwrap_or(false)
    }
}

impl FuzzExecutionManager for LibFuzzerInvocationManager {
    fn fuzz(
        &self,
        opts: &LibFuzzerOptions,
        stdout_file: Option<&Path>,
        stderr_file: Option<&Path>,
        ctx: &Context,
    ) -> FuzzerOutcome {
        let mut cmd = Command::new(&opts.target_binary);
        cmd.arg(format!("-max_len={}", opts.max_length));
        cmd.arg(format!("-use_cmp={}", u8::from(opts.use_cmp)));
        // Trailing separator so libFuzzer treats it as a directory
        // prefix rather than a file name prefix.
        cmd.arg(format!(
            "-artifact_prefix={}/",
            opts.artifact_dir.display()
        ));
        if let Some(budget) = opts.max_total_time {
            cmd.arg(format!("-max_total_time={}", budget.as_secs().max(1)));
        }
        cmd.arg(&opts.corpus_dir);

        let stdout = match capture_to(stdout_file) {
            Ok(stdio) => stdio,
            Err(err) => {
                ctx.diagnostics.error(format!("failed to open fuzzer stdout capture: {err}"));
                return FuzzerOutcome::Unknown;
            }
        };
        let stderr = match capture_to(stderr_file) {
            Ok(stdio) => stdio,
            Err(err) => {
                ctx.diagnostics.error(format!("failed to open fuzzer stderr capture: {err}"));
                return FuzzerOutcome::Unknown;
            }
        };
        cmd.stdout(stdout).stderr(stderr);

        tracing::info!(
            target: "cinder",
            target_binary = %opts.target_binary.display(),
            max_len = opts.max_length,
            use_cmp = opts.use_cmp,
            "starting fuzzing run"
        );
        let status = match self.subprocess.run(&mut cmd) {
            Ok(status) => status,
            Err(err) => {
                ctx.diagnostics.error(format!("failed to run fuzz target: {err}"));
                return FuzzerOutcome::Unknown;
            }
        };
        if self.subprocess.cancelled() {
            ctx.diagnostics.debug("fuzzing run cancelled");
            return FuzzerOutcome::Cancelled;
        }
        // The generated target aborts when every constraint holds;
        // libFuzzer exits non-zero and leaves a crash artifact behind.
        if !status.success() && Self::artifact_found(&opts.artifact_dir) {
            FuzzerOutcome::TargetFound
        } else {
            ctx.diagnostics
                .debug(format!("fuzzing run inconclusive (status {status})"));
            FuzzerOutcome::Unknown
        }
    }

    fn cancel(&self) {
        self.subprocess.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_target_is_unknown() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = Context::new();
        let opts = LibFuzzerOptions {
            target_binary: tmp.path().join("no-such-binary"),
            max_length: 3,
            corpus_dir: tmp.path().join("corpus"),
            artifact_dir: tmp.path().join("artifacts"),
            use_cmp: true,
            max_total_time: None,
        };
        let manager = LibFuzzerInvocationManager::new();
        assert_eq!(manager.fuzz(&opts, None, None, &ctx), FuzzerOutcome::Unknown);
    }
}
