//! Clang invocation.

use crate::invoke::{SubprocessHandle, capture_to};
use crate::options::ClangOptions;
use crate::program::Program;
use cinder_core::Context;
use std::path::Path;
use std::process::Command;

/// Turns a rendered candidate program into an executable fuzz target.
///
/// A trait seam so the orchestrator can be driven by a stub in tests;
/// the real implementation is [`ClangInvocationManager`].
pub trait CompilationManager: Send + Sync {
    /// Write `program` to `source_file`, compile it to `output_file`.
    /// Captured tool output goes to the given files when paths are
    /// supplied (quiet mode). Returns false on failure or cancellation.
    #[allow(clippy::too_many_arguments)]
    fn compile(
        &self,
        program: &Program,
        source_file: &Path,
        output_file: &Path,
        opts: &ClangOptions,
        stdout_file: Option<&Path>,
        stderr_file: Option<&Path>,
        ctx: &Context,
    ) -> bool;

    /// Kill an in-flight compilation; harmless when idle.
    fn cancel(&self);
}

/// Compiles candidate programs with clang and libFuzzer
/// instrumentation.
#[derive(Debug, Default)]
pub struct ClangInvocationManager {
    subprocess: SubprocessHandle,
}

impl ClangInvocationManager {
    /// Create an idle manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CompilationManager for ClangInvocationManager {
    fn compile(
        &self,
        program: &Program,
        source_file: &Path,
        output_file: &Path,
        opts: &ClangOptions,
        stdout_file: Option<&Path>,
        stderr_file: Option<&Path>,
        ctx: &Context,
    ) -> bool {
        if let Err(err) = std::fs::write(source_file, program.source()) {
            ctx.diagnostics.error(format!(
                "failed to write candidate source {}: {err}",
                source_file.display()
            ));
            return false;
        }

        let mut cmd = Command::new(&opts.clang_path);
        cmd.arg(format!("-O{}", opts.optimization_level));
        cmd.arg("-fsanitize=fuzzer");
        if !opts.sanitizer_coverage.is_empty() {
            let modes: Vec<&str> = opts.sanitizer_coverage.iter().map(|m| m.as_flag()).collect();
            cmd.arg(format!("-fsanitize-coverage={}", modes.join(",")));
        }
        cmd.arg("-o").arg(output_file).arg(source_file);

        let stdout = match capture_to(stdout_file) {
            Ok(stdio) => stdio,
            Err(err) => {
                ctx.diagnostics.error(format!("failed to open clang stdout capture: {err}"));
                return false;
            }
        };
        let stderr = match capture_to(stderr_file) {
            Ok(stdio) => stdio,
            Err(err) => {
                ctx.diagnostics.error(format!("failed to open clang stderr capture: {err}"));
                return false;
            }
        };
        cmd.stdout(stdout).stderr(stderr);

        tracing::info!(
            target: "cinder",
            clang = %opts.clang_path.display(),
            output = %output_file.display(),
            "compiling candidate program"
        );
        match self.subprocess.run(&mut cmd) {
            Ok(status) if self.subprocess.cancelled() => {
                ctx.diagnostics.debug(format!("clang cancelled (status {status})"));
                false
            }
            Ok(status) if status.success() => true,
            Ok(status) => {
                ctx.diagnostics.error(format!("clang failed with {status}"));
                false
            }
            Err(err) => {
                ctx.diagnostics.error(format!("failed to run clang: {err}"));
                false
            }
        }
    }

    fn cancel(&self) {
        self.subprocess.cancel();
    }
}
