//! Sort system for Cinder terms.
//!
//! Only booleans and fixed-width bit-vectors are first-class; everything
//! else is carried as an uninterpreted sort so front ends can still load
//! queries that a backend will later reject.

use std::fmt;

/// The sort (type) of a term.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Sort {
    /// Boolean sort.
    Bool,
    /// Bit-vector sort with the given width in bits.
    BitVec(u32),
    /// A sort this solver has no interpretation for, kept by name.
    Uninterpreted(String),
}

impl Sort {
    /// Check if this is the boolean sort.
    #[must_use]
    pub fn is_bool(&self) -> bool {
        matches!(self, Sort::Bool)
    }

    /// Check if this is a bit-vector sort.
    #[must_use]
    pub fn is_bitvec(&self) -> bool {
        matches!(self, Sort::BitVec(_))
    }

    /// Bit-vector width, if this is a bit-vector sort.
    #[must_use]
    pub fn bitvec_width(&self) -> Option<u32> {
        match self {
            Sort::BitVec(w) => Some(*w),
            _ => None,
        }
    }

    /// Number of bits a value of this sort occupies in a packed input
    /// buffer. Uninterpreted sorts have no encoding.
    #[must_use]
    pub fn encoded_bits(&self) -> Option<u32> {
        match self {
            Sort::Bool => Some(1),
            Sort::BitVec(w) => Some(*w),
            Sort::Uninterpreted(_) => None,
        }
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sort::Bool => write!(f, "Bool"),
            Sort::BitVec(w) => write!(f, "(_ BitVec {w})"),
            Sort::Uninterpreted(name) => write!(f, "{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Sort::Bool.to_string(), "Bool");
        assert_eq!(Sort::BitVec(32).to_string(), "(_ BitVec 32)");
        assert_eq!(Sort::Uninterpreted("Real".into()).to_string(), "Real");
    }

    #[test]
    fn test_encoded_bits() {
        assert_eq!(Sort::Bool.encoded_bits(), Some(1));
        assert_eq!(Sort::BitVec(17).encoded_bits(), Some(17));
        assert_eq!(Sort::Uninterpreted("Real".into()).encoded_bits(), None);
    }
}
