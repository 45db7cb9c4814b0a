use std::fmt;

use crate::{identity::Identity, kind::Kind};

/// Result alias for fallible heap queries.
pub type HeapResult<T> = Result<T, HeapError>;

/// Error returned by a heap query.
///
/// Every error is reported at the call boundary; no partial result survives it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeapError {
    /// The value's kind has no layout rule. Fatal for size computation, since a
    /// size must never silently under-count.
    UnsupportedKind { kind: Kind },
    /// A `class` attribute is present but is neither a single name nor a list of names.
    InvalidClassTag { kind: Kind },
    /// An element-wise query was applied to something other than a list,
    /// character vector or environment.
    NotAContainer { kind: Kind },
    /// The value is not a compact wrapper.
    NotCompact { kind: Kind },
    /// A compact wrapper was built with an apparent kind that is not a vector.
    NotAVector { kind: Kind },
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedKind { kind } => write!(f, "can't compute size of {kind}"),
            Self::InvalidClassTag { kind } => {
                write!(f, "class attribute of a {kind} must be a name or a list of names")
            }
            Self::NotAContainer { kind } => {
                write!(f, "`x` must be a list, environment, or character vector, not a {kind}")
            }
            Self::NotCompact { kind } => write!(f, "{kind} value is not a compact representation"),
            Self::NotAVector { kind } => write!(f, "compact representations must wrap a vector, not a {kind}"),
        }
    }
}

impl std::error::Error for HeapError {}

/// Non-fatal problem found while enumerating children for display.
///
/// Diagnostic walks degrade gracefully: the offending value is shown with no
/// children and the warning is handed to the tracer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// A value whose kind has no child enumeration rule.
    UnsupportedKind { kind: Kind, address: Identity },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedKind { kind, address } => write!(f, "unimplemented type {kind} at {address}"),
        }
    }
}
