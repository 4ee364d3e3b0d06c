//! Hash-consed term arena.
//!
//! Terms live in a [`TermManager`] and are addressed by [`TermId`]
//! handles. Construction is structurally deduplicating, so two
//! occurrences of an identical sub-term are the *same* node and the term
//! graph is a DAG. Handle equality is therefore node identity, which is
//! what every visited-set in this workspace keys on.

use crate::sort::Sort;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// Handle to a term in a [`TermManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TermId(u32);

impl TermId {
    /// Raw arena index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The operator or constant a term represents.
///
/// This is a closed set: the program builder in `cinder-fuzz` has a code
/// generation rule for every variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TermKind {
    /// Boolean constant `true`.
    True,
    /// Boolean constant `false`.
    False,
    /// A free variable, identified by name.
    Var(String),
    /// A bit-vector constant (value already masked to `width` bits).
    BvConst {
        /// Constant value.
        value: u64,
        /// Width in bits, at most 64.
        width: u32,
    },
    /// Boolean negation.
    Not,
    /// N-ary conjunction.
    And,
    /// N-ary disjunction.
    Or,
    /// Boolean implication.
    Implies,
    /// If-then-else over any single sort.
    Ite,
    /// Equality over any single sort.
    Eq,
    /// Bitwise complement.
    BvNot,
    /// Two's complement negation.
    BvNeg,
    /// Bitwise and.
    BvAnd,
    /// Bitwise or.
    BvOr,
    /// Bitwise xor.
    BvXor,
    /// Addition modulo 2^width.
    BvAdd,
    /// Subtraction modulo 2^width.
    BvSub,
    /// Multiplication modulo 2^width.
    BvMul,
    /// Unsigned division (`x / 0` is all-ones, SMT-LIB semantics).
    BvUdiv,
    /// Unsigned remainder (`x % 0` is `x`, SMT-LIB semantics).
    BvUrem,
    /// Left shift (zero once the shift amount reaches the width).
    BvShl,
    /// Logical right shift.
    BvLshr,
    /// Arithmetic right shift.
    BvAshr,
    /// Unsigned less-than.
    BvUlt,
    /// Unsigned less-or-equal.
    BvUle,
    /// Signed less-than.
    BvSlt,
    /// Signed less-or-equal.
    BvSle,
    /// Concatenation; the first child occupies the high bits.
    BvConcat,
    /// Bit extraction, inclusive bounds, `high >= low`.
    BvExtract {
        /// Highest extracted bit index.
        high: u32,
        /// Lowest extracted bit index.
        low: u32,
    },
}

type Children = SmallVec<[TermId; 2]>;

#[derive(Debug)]
struct TermData {
    kind: TermKind,
    sort: Sort,
    children: Children,
}

/// Arena of structurally deduplicated terms.
#[derive(Debug, Default)]
pub struct TermManager {
    terms: Vec<TermData>,
    interned: FxHashMap<(TermKind, Children), TermId>,
}

fn mask(width: u32) -> u64 {
    if width >= 64 { u64::MAX } else { (1u64 << width) - 1 }
}

impl TermManager {
    /// Create an empty term manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct terms in the arena.
    #[must_use]
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Check if the arena is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    fn intern(&mut self, kind: TermKind, sort: Sort, children: Children) -> TermId {
        let key = (kind, children);
        if let Some(&id) = self.interned.get(&key) {
            return id;
        }
        let (kind, children) = key;
        debug_assert!(self.terms.len() < u32::MAX as usize);
        let id = TermId(self.terms.len() as u32);
        self.terms.push(TermData {
            kind: kind.clone(),
            sort,
            children: children.clone(),
        });
        self.interned.insert((kind, children), id);
        id
    }

    /// Operator or constant of a term.
    #[must_use]
    pub fn kind(&self, id: TermId) -> &TermKind {
        &self.terms[id.index()].kind
    }

    /// Sort of a term.
    #[must_use]
    pub fn sort(&self, id: TermId) -> &Sort {
        &self.terms[id.index()].sort
    }

    /// Ordered child handles of a term (empty for leaves).
    #[must_use]
    pub fn children(&self, id: TermId) -> &[TermId] {
        &self.terms[id.index()].children
    }

    /// Number of children.
    #[must_use]
    pub fn num_children(&self, id: TermId) -> usize {
        self.terms[id.index()].children.len()
    }

    /// The `i`-th child.
    #[must_use]
    pub fn child(&self, id: TermId, i: usize) -> TermId {
        self.terms[id.index()].children[i]
    }

    /// Check if a term is a free variable.
    #[must_use]
    pub fn is_var(&self, id: TermId) -> bool {
        matches!(self.kind(id), TermKind::Var(_))
    }

    /// Name of a free variable term.
    #[must_use]
    pub fn var_name(&self, id: TermId) -> Option<&str> {
        match self.kind(id) {
            TermKind::Var(name) => Some(name),
            _ => None,
        }
    }

    // Leaf constructors.

    /// Boolean constant `true`.
    pub fn mk_true(&mut self) -> TermId {
        self.intern(TermKind::True, Sort::Bool, Children::new())
    }

    /// Boolean constant `false`.
    pub fn mk_false(&mut self) -> TermId {
        self.intern(TermKind::False, Sort::Bool, Children::new())
    }

    /// Boolean constant from a `bool`.
    pub fn mk_bool(&mut self, b: bool) -> TermId {
        if b { self.mk_true() } else { self.mk_false() }
    }

    /// A free variable of the given sort. Variables are deduplicated by
    /// name: declaring `x` twice yields the same node, so a name must
    /// not be reused at a different sort.
    pub fn mk_var(&mut self, name: impl Into<String>, sort: Sort) -> TermId {
        let name = name.into();
        let id = self.intern(TermKind::Var(name), sort.clone(), Children::new());
        debug_assert_eq!(self.sort(id), &sort, "variable redeclared at a different sort");
        id
    }

    /// A bit-vector constant, masked to `width` bits.
    pub fn mk_bv_const(&mut self, value: u64, width: u32) -> TermId {
        debug_assert!(width >= 1 && width <= 64);
        self.intern(
            TermKind::BvConst {
                value: value & mask(width),
                width,
            },
            Sort::BitVec(width),
            Children::new(),
        )
    }

    // Boolean connectives.

    /// Boolean negation.
    pub fn mk_not(&mut self, a: TermId) -> TermId {
        debug_assert!(self.sort(a).is_bool());
        self.intern(TermKind::Not, Sort::Bool, SmallVec::from_slice(&[a]))
    }

    /// N-ary conjunction.
    pub fn mk_and(&mut self, operands: Vec<TermId>) -> TermId {
        debug_assert!(operands.iter().all(|&t| self.sort(t).is_bool()));
        self.intern(TermKind::And, Sort::Bool, Children::from_vec(operands))
    }

    /// N-ary disjunction.
    pub fn mk_or(&mut self, operands: Vec<TermId>) -> TermId {
        debug_assert!(operands.iter().all(|&t| self.sort(t).is_bool()));
        self.intern(TermKind::Or, Sort::Bool, Children::from_vec(operands))
    }

    /// Boolean implication.
    pub fn mk_implies(&mut self, a: TermId, b: TermId) -> TermId {
        debug_assert!(self.sort(a).is_bool() && self.sort(b).is_bool());
        self.intern(TermKind::Implies, Sort::Bool, SmallVec::from_slice(&[a, b]))
    }

    /// If-then-else. Both branches must share a sort.
    pub fn mk_ite(&mut self, cond: TermId, then: TermId, els: TermId) -> TermId {
        debug_assert!(self.sort(cond).is_bool());
        debug_assert_eq!(self.sort(then), self.sort(els));
        let sort = self.sort(then).clone();
        self.intern(TermKind::Ite, sort, SmallVec::from_slice(&[cond, then, els]))
    }

    /// Equality over a single sort.
    pub fn mk_eq(&mut self, a: TermId, b: TermId) -> TermId {
        debug_assert_eq!(self.sort(a), self.sort(b));
        self.intern(TermKind::Eq, Sort::Bool, SmallVec::from_slice(&[a, b]))
    }

    // Bit-vector operations.

    fn bv_unary(&mut self, kind: TermKind, a: TermId) -> TermId {
        let sort = self.sort(a).clone();
        debug_assert!(sort.is_bitvec());
        self.intern(kind, sort, SmallVec::from_slice(&[a]))
    }

    fn bv_binary(&mut self, kind: TermKind, a: TermId, b: TermId) -> TermId {
        debug_assert_eq!(self.sort(a), self.sort(b));
        let sort = self.sort(a).clone();
        debug_assert!(sort.is_bitvec());
        self.intern(kind, sort, SmallVec::from_slice(&[a, b]))
    }

    fn bv_predicate(&mut self, kind: TermKind, a: TermId, b: TermId) -> TermId {
        debug_assert_eq!(self.sort(a), self.sort(b));
        debug_assert!(self.sort(a).is_bitvec());
        self.intern(kind, Sort::Bool, SmallVec::from_slice(&[a, b]))
    }

    /// Bitwise complement.
    pub fn mk_bv_not(&mut self, a: TermId) -> TermId {
        self.bv_unary(TermKind::BvNot, a)
    }

    /// Two's complement negation.
    pub fn mk_bv_neg(&mut self, a: TermId) -> TermId {
        self.bv_unary(TermKind::BvNeg, a)
    }

    /// Bitwise and.
    pub fn mk_bv_and(&mut self, a: TermId, b: TermId) -> TermId {
        self.bv_binary(TermKind::BvAnd, a, b)
    }

    /// Bitwise or.
    pub fn mk_bv_or(&mut self, a: TermId, b: TermId) -> TermId {
        self.bv_binary(TermKind::BvOr, a, b)
    }

    /// Bitwise xor.
    pub fn mk_bv_xor(&mut self, a: TermId, b: TermId) -> TermId {
        self.bv_binary(TermKind::BvXor, a, b)
    }

    /// Addition modulo 2^width.
    pub fn mk_bv_add(&mut self, a: TermId, b: TermId) -> TermId {
        self.bv_binary(TermKind::BvAdd, a, b)
    }

    /// Subtraction modulo 2^width.
    pub fn mk_bv_sub(&mut self, a: TermId, b: TermId) -> TermId {
        self.bv_binary(TermKind::BvSub, a, b)
    }

    /// Multiplication modulo 2^width.
    pub fn mk_bv_mul(&mut self, a: TermId, b: TermId) -> TermId {
        self.bv_binary(TermKind::BvMul, a, b)
    }

    /// Unsigned division with SMT-LIB zero semantics.
    pub fn mk_bv_udiv(&mut self, a: TermId, b: TermId) -> TermId {
        self.bv_binary(TermKind::BvUdiv, a, b)
    }

    /// Unsigned remainder with SMT-LIB zero semantics.
    pub fn mk_bv_urem(&mut self, a: TermId, b: TermId) -> TermId {
        self.bv_binary(TermKind::BvUrem, a, b)
    }

    /// Left shift.
    pub fn mk_bv_shl(&mut self, a: TermId, b: TermId) -> TermId {
        self.bv_binary(TermKind::BvShl, a, b)
    }

    /// Logical right shift.
    pub fn mk_bv_lshr(&mut self, a: TermId, b: TermId) -> TermId {
        self.bv_binary(TermKind::BvLshr, a, b)
    }

    /// Arithmetic right shift.
    pub fn mk_bv_ashr(&mut self, a: TermId, b: TermId) -> TermId {
        self.bv_binary(TermKind::BvAshr, a, b)
    }

    /// Unsigned less-than.
    pub fn mk_bv_ult(&mut self, a: TermId, b: TermId) -> TermId {
        self.bv_predicate(TermKind::BvUlt, a, b)
    }

    /// Unsigned less-or-equal.
    pub fn mk_bv_ule(&mut self, a: TermId, b: TermId) -> TermId {
        self.bv_predicate(TermKind::BvUle, a, b)
    }

    /// Signed less-than.
    pub fn mk_bv_slt(&mut self, a: TermId, b: TermId) -> TermId {
        self.bv_predicate(TermKind::BvSlt, a, b)
    }

    /// Signed less-or-equal.
    pub fn mk_bv_sle(&mut self, a: TermId, b: TermId) -> TermId {
        self.bv_predicate(TermKind::BvSle, a, b)
    }

    /// Concatenation; `a` supplies the high bits.
    pub fn mk_bv_concat(&mut self, a: TermId, b: TermId) -> TermId {
        let wa = self.sort(a).bitvec_width().unwrap_or(0);
        let wb = self.sort(b).bitvec_width().unwrap_or(0);
        debug_assert!(wa > 0 && wb > 0 && wa + wb <= 64);
        self.intern(
            TermKind::BvConcat,
            Sort::BitVec(wa + wb),
            SmallVec::from_slice(&[a, b]),
        )
    }

    /// Bit extraction, inclusive bounds.
    pub fn mk_bv_extract(&mut self, high: u32, low: u32, a: TermId) -> TermId {
        let w = self.sort(a).bitvec_width().unwrap_or(0);
        debug_assert!(high >= low && high < w);
        self.intern(
            TermKind::BvExtract { high, low },
            Sort::BitVec(high - low + 1),
            SmallVec::from_slice(&[a]),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_consing_dedupes() {
        let mut tm = TermManager::new();
        let x = tm.mk_var("x", Sort::BitVec(8));
        let y = tm.mk_var("y", Sort::BitVec(8));
        let s1 = tm.mk_bv_add(x, y);
        let s2 = tm.mk_bv_add(x, y);
        assert_eq!(s1, s2);

        // Same name yields the same node.
        let x2 = tm.mk_var("x", Sort::BitVec(8));
        assert_eq!(x, x2);
    }

    #[test]
    fn test_shared_subterm_is_one_node() {
        let mut tm = TermManager::new();
        let x = tm.mk_var("x", Sort::BitVec(8));
        let one = tm.mk_bv_const(1, 8);
        let inc = tm.mk_bv_add(x, one);
        // `inc` reachable through two parents, still one arena node.
        let a = tm.mk_bv_ult(inc, x);
        let b = tm.mk_bv_ule(inc, one);
        assert_eq!(tm.child(a, 0), tm.child(b, 0));
    }

    #[test]
    fn test_bv_const_masked() {
        let mut tm = TermManager::new();
        let c = tm.mk_bv_const(0x1ff, 8);
        match tm.kind(c) {
            TermKind::BvConst { value, width } => {
                assert_eq!(*value, 0xff);
                assert_eq!(*width, 8);
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn test_children_order() {
        let mut tm = TermManager::new();
        let x = tm.mk_var("x", Sort::BitVec(4));
        let y = tm.mk_var("y", Sort::BitVec(4));
        let sub = tm.mk_bv_sub(x, y);
        assert_eq!(tm.children(sub), &[x, y]);
        assert_eq!(tm.sort(sub), &Sort::BitVec(4));
    }

    #[test]
    fn test_concat_extract_widths() {
        let mut tm = TermManager::new();
        let x = tm.mk_var("x", Sort::BitVec(4));
        let y = tm.mk_var("y", Sort::BitVec(12));
        let c = tm.mk_bv_concat(x, y);
        assert_eq!(tm.sort(c), &Sort::BitVec(16));
        let e = tm.mk_bv_extract(11, 4, c);
        assert_eq!(tm.sort(e), &Sort::BitVec(8));
    }
}
