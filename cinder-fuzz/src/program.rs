//! Candidate-program generation.
//!
//! Renders a query into a self-contained C fuzz target: every distinct
//! term becomes one local computed in dependency order (so shared
//! sub-terms are evaluated once), every constraint becomes an
//! early-return check, and an input that survives every check hits
//! `abort()` - which libFuzzer reports as a crash, i.e. the satisfying
//! assignment was found.

use crate::analysis::{FuzzingAnalysisInfo, VarLocation};
use cinder_core::{Context, Query, QueryPass, Sort, TermId, TermKind};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// A rendered candidate program.
#[derive(Debug, Clone)]
pub struct Program {
    source: String,
}

impl Program {
    /// The program's C source text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Builds the candidate program from a query plus its analysis info.
/// Must run after the analysis passes in the same pipeline. Cancellable.
pub struct ProgramBuilderPass {
    info: Arc<FuzzingAnalysisInfo>,
    cancelled: AtomicBool,
    program: Mutex<Option<Arc<Program>>>,
}

const PRELUDE: &str = r#"#include <stdint.h>
#include <stdlib.h>
#include <stddef.h>

static uint64_t read_bits(const uint8_t *data, uint64_t offset, uint32_t width) {
  uint64_t value = 0;
  for (uint32_t i = 0; i < width; ++i) {
    uint64_t bit = offset + i;
    value |= (uint64_t)((data[bit >> 3] >> (bit & 7)) & 1) << i;
  }
  return value;
}

static uint64_t bv_udiv(uint64_t a, uint64_t b, uint64_t mask) {
  return b == 0 ? mask : a / b;
}

static uint64_t bv_urem(uint64_t a, uint64_t b) {
  return b == 0 ? a : a % b;
}

static uint64_t bv_shl(uint64_t a, uint64_t b, uint32_t width, uint64_t mask) {
  return b >= width ? 0 : (a << b) & mask;
}

static uint64_t bv_lshr(uint64_t a, uint64_t b, uint32_t width) {
  return b >= width ? 0 : a >> b;
}

static int64_t bv_signed(uint64_t a, uint32_t width) {
  if (width == 64) {
    return (int64_t)a;
  }
  uint64_t sign = 1ULL << (width - 1);
  return (int64_t)((a ^ sign) - sign);
}

static uint64_t bv_ashr(uint64_t a, uint64_t b, uint32_t width, uint64_t mask) {
  uint64_t sign = (a >> (width - 1)) & 1;
  if (b >= width) {
    return sign ? mask : 0;
  }
  uint64_t shifted = a >> b;
  if (sign) {
    shifted |= mask & ~(mask >> b);
  }
  return shifted & mask;
}
"#;

fn width_mask(width: u32) -> u64 {
    if width >= 64 { u64::MAX } else { (1u64 << width) - 1 }
}

fn sort_width(sort: &Sort) -> u32 {
    match sort {
        Sort::Bool => 1,
        Sort::BitVec(w) => *w,
        // Rejected by the sort conformance check before this pass runs.
        Sort::Uninterpreted(_) => 0,
    }
}

impl ProgramBuilderPass {
    /// Create the builder over the given analysis bundle.
    #[must_use]
    pub fn new(info: Arc<FuzzingAnalysisInfo>) -> Self {
        Self {
            info,
            cancelled: AtomicBool::new(false),
            program: Mutex::new(None),
        }
    }

    /// The program rendered by the last run, if it completed.
    #[must_use]
    pub fn program(&self) -> Option<Arc<Program>> {
        self.program.lock().ok().and_then(|p| p.clone())
    }

    /// Distinct terms reachable from the constraints, children before
    /// parents.
    fn dependency_order(ctx: &Context, roots: &[TermId]) -> Vec<TermId> {
        let mut order = Vec::new();
        let mut visited: FxHashSet<TermId> = FxHashSet::default();
        let mut stack: Vec<(TermId, bool)> = roots.iter().rev().map(|&r| (r, false)).collect();
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            if !visited.insert(id) {
                continue;
            }
            stack.push((id, true));
            for &child in ctx.terms.children(id).iter().rev() {
                if !visited.contains(&child) {
                    stack.push((child, false));
                }
            }
        }
        order
    }

    fn render_term(
        &self,
        ctx: &Context,
        id: TermId,
        names: &FxHashMap<TermId, String>,
    ) -> Option<String> {
        let n = |child: TermId| names[&child].clone();
        let width = sort_width(ctx.terms.sort(id));
        let mask = width_mask(width);
        let kids = ctx.terms.children(id);
        let expr = match ctx.terms.kind(id) {
            TermKind::True => "1".to_string(),
            TermKind::False => "0".to_string(),
            TermKind::Var(name) => {
                let assignment = self.info.buffer_assignment()?;
                match assignment.location(id)? {
                    VarLocation::Buffer {
                        offset_bits,
                        width_bits,
                    } => format!("read_bits(data, {offset_bits}, {width_bits}) /* {name} */"),
                    VarLocation::Fixed(value) => format!("{value:#x}ULL /* {name} = const */"),
                }
            }
            TermKind::BvConst { value, .. } => format!("{value:#x}ULL"),
            TermKind::Not => format!("(!{})", n(kids[0])),
            TermKind::And => {
                if kids.is_empty() {
                    "1".to_string()
                } else {
                    let parts: Vec<String> = kids.iter().map(|&k| n(k)).collect();
                    format!("({})", parts.join(" & "))
                }
            }
            TermKind::Or => {
                if kids.is_empty() {
                    "0".to_string()
                } else {
                    let parts: Vec<String> = kids.iter().map(|&k| n(k)).collect();
                    format!("({})", parts.join(" | "))
                }
            }
            TermKind::Implies => format!("((!{}) | {})", n(kids[0]), n(kids[1])),
            TermKind::Ite => format!("({} ? {} : {})", n(kids[0]), n(kids[1]), n(kids[2])),
            TermKind::Eq => format!("({} == {})", n(kids[0]), n(kids[1])),
            TermKind::BvNot => format!("((~{}) & {mask:#x}ULL)", n(kids[0])),
            TermKind::BvNeg => format!("((0ULL - {}) & {mask:#x}ULL)", n(kids[0])),
            TermKind::BvAnd => format!("({} & {})", n(kids[0]), n(kids[1])),
            TermKind::BvOr => format!("({} | {})", n(kids[0]), n(kids[1])),
            TermKind::BvXor => format!("({} ^ {})", n(kids[0]), n(kids[1])),
            TermKind::BvAdd => format!("(({} + {}) & {mask:#x}ULL)", n(kids[0]), n(kids[1])),
            TermKind::BvSub => format!("(({} - {}) & {mask:#x}ULL)", n(kids[0]), n(kids[1])),
            TermKind::BvMul => format!("(({} * {}) & {mask:#x}ULL)", n(kids[0]), n(kids[1])),
            TermKind::BvUdiv => {
                format!("bv_udiv({}, {}, {mask:#x}ULL)", n(kids[0]), n(kids[1]))
            }
            TermKind::BvUrem => format!("bv_urem({}, {})", n(kids[0]), n(kids[1])),
            TermKind::BvShl => format!(
                "bv_shl({}, {}, {width}, {mask:#x}ULL)",
                n(kids[0]),
                n(kids[1])
            ),
            TermKind::BvLshr => format!("bv_lshr({}, {}, {width})", n(kids[0]), n(kids[1])),
            TermKind::BvAshr => format!(
                "bv_ashr({}, {}, {width}, {mask:#x}ULL)",
                n(kids[0]),
                n(kids[1])
            ),
            TermKind::BvUlt => format!("({} < {})", n(kids[0]), n(kids[1])),
            TermKind::BvUle => format!("({} <= {})", n(kids[0]), n(kids[1])),
            TermKind::BvSlt => {
                let w = sort_width(ctx.terms.sort(kids[0]));
                format!(
                    "(bv_signed({}, {w}) < bv_signed({}, {w}))",
                    n(kids[0]),
                    n(kids[1])
                )
            }
            TermKind::BvSle => {
                let w = sort_width(ctx.terms.sort(kids[0]));
                format!(
                    "(bv_signed({}, {w}) <= bv_signed({}, {w}))",
                    n(kids[0]),
                    n(kids[1])
                )
            }
            TermKind::BvConcat => {
                let low_width = sort_width(ctx.terms.sort(kids[1]));
                format!(
                    "((({} << {low_width}) | {}) & {mask:#x}ULL)",
                    n(kids[0]),
                    n(kids[1])
                )
            }
            TermKind::BvExtract { low, .. } => {
                format!("(({} >> {low}) & {mask:#x}ULL)", n(kids[0]))
            }
        };
        Some(expr)
    }
}

impl QueryPass for ProgramBuilderPass {
    fn run(&self, query: &mut Query, ctx: &Context) -> bool {
        let Some(assignment) = self.info.buffer_assignment() else {
            ctx.diagnostics
                .error("program builder ran before free variable assignment");
            return true;
        };

        let order = Self::dependency_order(ctx, query.constraints());
        let mut names: FxHashMap<TermId, String> = FxHashMap::default();
        let mut body = String::new();

        for (index, &id) in order.iter().enumerate() {
            if self.cancelled.load(Ordering::Acquire) {
                ctx.diagnostics.debug("program builder cancelled");
                return false;
            }
            let name = format!("t{index}");
            let Some(expr) = self.render_term(ctx, id, &names) else {
                ctx.diagnostics
                    .error("program builder found a variable with no buffer location");
                return true;
            };
            body.push_str(&format!("  const uint64_t {name} = {expr};\n"));
            names.insert(id, name);
        }

        let mut source = String::from(PRELUDE);
        source.push('\n');
        source.push_str("int LLVMFuzzerTestOneInput(const uint8_t *data, size_t size) {\n");
        source.push_str(&format!(
            "  if (size < {}) {{\n    return 0;\n  }}\n",
            assignment.max_input_length()
        ));
        source.push_str(&body);
        for (index, constraint) in query.constraints().iter().enumerate() {
            source.push_str(&format!(
                "  if (!{}) {{ /* constraint {index} */\n    return 0;\n  }}\n",
                names[constraint]
            ));
        }
        source.push_str("  abort(); /* every constraint satisfied */\n");
        source.push_str("  return 0;\n}\n");

        tracing::debug!(
            target: "cinder",
            terms = order.len(),
            constraints = query.len(),
            "candidate program rendered"
        );
        if let Ok(mut slot) = self.program.lock() {
            *slot = Some(Arc::new(Program { source }));
        }
        true
    }

    fn name(&self) -> &'static str {
        "program-builder"
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_core::PassManager;

    fn build(query: &mut Query, ctx: &Context) -> Option<Arc<Program>> {
        let info = Arc::new(FuzzingAnalysisInfo::new());
        let builder = Arc::new(ProgramBuilderPass::new(Arc::clone(&info)));
        let mut pm = PassManager::new();
        info.add_to(&mut pm);
        let as_dyn: Arc<dyn QueryPass> = builder.clone();
        pm.add(as_dyn);
        pm.run(query, ctx);
        builder.program()
    }

    #[test]
    fn test_renders_fuzz_entry_point() {
        let mut ctx = Context::new();
        let x = ctx.terms.mk_var("x", Sort::BitVec(8));
        let c = ctx.terms.mk_bv_const(200, 8);
        let gt = ctx.terms.mk_bv_ult(c, x);
        let mut query = Query::from_constraints(vec![gt]);

        let program = build(&mut query, &ctx).expect("program rendered");
        let source = program.source();
        assert!(source.contains("LLVMFuzzerTestOneInput"));
        assert!(source.contains("if (size < 1)"));
        assert!(source.contains("read_bits(data, 0, 8)"));
        assert!(source.contains("abort();"));
    }

    #[test]
    fn test_shared_subterm_computed_once() {
        let mut ctx = Context::new();
        let x = ctx.terms.mk_var("x", Sort::BitVec(8));
        let one = ctx.terms.mk_bv_const(1, 8);
        let inc = ctx.terms.mk_bv_add(x, one);
        let c0 = ctx.terms.mk_bv_ult(inc, x);
        let c1 = ctx.terms.mk_bv_ule(inc, one);
        let mut query = Query::from_constraints(vec![c0, c1]);

        let program = build(&mut query, &ctx).expect("program rendered");
        // x, one, inc, c0, c1: exactly five locals.
        let locals = program
            .source()
            .lines()
            .filter(|l| l.trim_start().starts_with("const uint64_t t"))
            .count();
        assert_eq!(locals, 5);
    }

    #[test]
    fn test_pinned_variable_rendered_as_constant() {
        let mut ctx = Context::new();
        let x = ctx.terms.mk_var("x", Sort::BitVec(8));
        let y = ctx.terms.mk_var("y", Sort::BitVec(8));
        let c = ctx.terms.mk_bv_const(42, 8);
        let pin = ctx.terms.mk_eq(x, c);
        let lt = ctx.terms.mk_bv_ult(x, y);
        let mut query = Query::from_constraints(vec![pin, lt]);

        let program = build(&mut query, &ctx).expect("program rendered");
        assert!(program.source().contains("0x2aULL /* x = const */"));
        // y still comes from the buffer.
        assert!(program.source().contains("read_bits(data, 0, 8) /* y */"));
    }

    #[test]
    fn test_cancelled_builder_produces_nothing() {
        let mut ctx = Context::new();
        let t = ctx.terms.mk_true();
        let mut query = Query::from_constraints(vec![t]);

        let info = Arc::new(FuzzingAnalysisInfo::new());
        let mut pm = PassManager::new();
        info.add_to(&mut pm);
        pm.run(&mut query, &ctx);

        let builder = ProgramBuilderPass::new(Arc::clone(&info));
        builder.cancel();
        builder.run(&mut query, &ctx);
        assert!(builder.program().is_none());
    }
}
