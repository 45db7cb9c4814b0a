//! The closed vocabulary of heap value kinds and the layout facts attached to them.
//!
//! Every value on the [`Heap`](crate::Heap) reports exactly one [`Kind`]. The size
//! estimator, the inspector and the description helpers all dispatch on it, so the
//! per-kind facts they share (element widths, which header a value carries, whether
//! a value can have children at all) live here rather than in each walker.

use strum::{Display, EnumIter, IntoStaticStr};

/// Width of a pointer on the host, in bytes.
pub const POINTER_SIZE: u64 = size_of::<usize>() as u64;

/// Width of a double on the host, in bytes.
pub const DOUBLE_SIZE: u64 = size_of::<f64>() as u64;

/// Allocation granule for vector payloads: the wider of a pointer and a double.
pub const VECTOR_CHUNK: u64 = if POINTER_SIZE > DOUBLE_SIZE {
    POINTER_SIZE
} else {
    DOUBLE_SIZE
};

/// Header shared by every node: type info, attribute link and two allocator links.
pub const NODE_HEADER: u64 = 4 * POINTER_SIZE;

/// Header of vector-like values: the node header plus length and true length.
pub const VECTOR_HEADER: u64 = NODE_HEADER + 2 * POINTER_SIZE;

/// The three pointer-wide slots every non-vector node carries after its header.
pub const NODE_SLOTS: u64 = 3 * POINTER_SIZE;

/// Discriminant of a heap value's internal representation.
///
/// The display form is the runtime's own type name (`"double"`, `"pairlist"`,
/// `"external pointer"`, ...), which is what [`classify`](crate::classify) and the
/// inspector print.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr, EnumIter, serde::Serialize, serde::Deserialize,
)]
pub enum Kind {
    #[strum(serialize = "NULL")]
    Null,
    #[strum(serialize = "builtin")]
    Builtin,
    #[strum(serialize = "special")]
    Special,
    #[strum(serialize = "logical")]
    Logical,
    #[strum(serialize = "integer")]
    Integer,
    #[strum(serialize = "double")]
    Double,
    #[strum(serialize = "complex")]
    Complex,
    #[strum(serialize = "raw")]
    Raw,
    /// Leaf string storage: the bytes of one string, shared through the string cache.
    #[strum(serialize = "string")]
    Char,
    #[strum(serialize = "character")]
    Character,
    #[strum(serialize = "list")]
    List,
    #[strum(serialize = "expression")]
    Expression,
    #[strum(serialize = "pairlist")]
    Pairlist,
    /// An unevaluated call: a cons-cell chain whose first value is the function.
    #[strum(serialize = "call")]
    Call,
    #[strum(serialize = "...")]
    Dots,
    #[strum(serialize = "environment")]
    Environment,
    #[strum(serialize = "function")]
    Closure,
    #[strum(serialize = "promise")]
    Promise,
    #[strum(serialize = "external pointer")]
    ExternalPointer,
    #[strum(serialize = "symbol")]
    Symbol,
    #[strum(serialize = "bytecode")]
    ByteCode,
    /// Dedicated storage for formal-class objects.
    #[strum(serialize = "S4")]
    S4,
    /// A kind the host can report but which has no layout rule.
    #[strum(serialize = "any")]
    Any,
}

impl Kind {
    /// Returns the runtime's type name for this kind.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Runtime-fixed singletons that occupy no space attributable to any graph.
    #[must_use]
    pub fn is_zero_cost(self) -> bool {
        matches!(self, Self::Null | Self::Builtin | Self::Special)
    }

    /// Vectors whose elements are stored inline rather than as references.
    #[must_use]
    pub fn is_primitive_vector(self) -> bool {
        matches!(
            self,
            Self::Logical | Self::Integer | Self::Double | Self::Complex | Self::Raw
        )
    }

    /// Kinds laid out with the vector header (a length-prefixed payload).
    #[must_use]
    pub fn is_vector(self) -> bool {
        self.is_primitive_vector() || matches!(self, Self::Char | Self::Character | Self::List | Self::Expression)
    }

    /// Kinds stored as a chain of cons cells.
    #[must_use]
    pub fn is_cons_chain(self) -> bool {
        matches!(self, Self::Pairlist | Self::Call | Self::Dots)
    }

    /// Kinds that can never have children, whatever their expansion settings.
    ///
    /// The inspector never flags these as skipped when it runs out of depth.
    #[must_use]
    pub fn is_leaf(self) -> bool {
        self.is_primitive_vector()
            || matches!(
                self,
                Self::Null | Self::Builtin | Self::Special | Self::Char | Self::Symbol
            )
    }

    /// Width in bytes of one element of a vector kind, `None` for everything else.
    #[must_use]
    pub fn element_width(self) -> Option<u64> {
        match self {
            Self::Logical | Self::Integer => Some(size_of::<i32>() as u64),
            Self::Double => Some(DOUBLE_SIZE),
            Self::Complex => Some(2 * DOUBLE_SIZE),
            Self::Raw | Self::Char => Some(1),
            Self::Character | Self::List | Self::Expression => Some(POINTER_SIZE),
            _ => None,
        }
    }

    /// Fixed header charged for every value of this kind.
    #[must_use]
    pub fn base_header(self) -> u64 {
        if self.is_vector() { VECTOR_HEADER } else { NODE_HEADER }
    }

    /// Vector-like kinds that [`describe`](crate::describe) summarizes by shape.
    #[must_use]
    pub fn has_shape(self) -> bool {
        self.is_primitive_vector() || matches!(self, Self::Character | Self::List)
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn headers_match_64_bit_layout() {
        assert_eq!(NODE_HEADER, 32);
        assert_eq!(VECTOR_HEADER, 48);
        assert_eq!(VECTOR_CHUNK, 8);
    }

    #[test]
    fn every_leaf_kind_uses_no_children() {
        for kind in Kind::iter().filter(|k| k.is_leaf()) {
            assert!(!kind.is_cons_chain(), "{kind} cannot be both a leaf and a chain");
        }
    }

    #[test]
    fn names_follow_runtime_type_names() {
        assert_eq!(Kind::Closure.name(), "function");
        assert_eq!(Kind::ExternalPointer.to_string(), "external pointer");
        assert_eq!(Kind::Dots.name(), "...");
    }
}
