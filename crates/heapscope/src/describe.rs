//! One-line descriptions of values and their immediate children.
//!
//! These helpers are what a navigator shows next to each entry: the type name
//! with its class tags, a short shape summary and the named parts below it.

use smallvec::SmallVec;

use crate::{
    error::{HeapError, HeapResult, Warning},
    heap::{Heap, HeapData, HeapId},
    identity::Identity,
    kind::Kind,
    tracer::WalkTracer,
};

/// Returns the runtime's type name for a value.
#[must_use]
pub fn kind_name(heap: &Heap, id: HeapId) -> &'static str {
    heap.kind_of(id).name()
}

/// Short shape summary.
///
/// Vector-like values give `[n]`, or `[d1 x d2 x ...]` when they carry an
/// integer `dim` attribute. External pointers give their address in angle
/// brackets and symbols their backquoted name. Everything else is empty.
#[must_use]
pub fn describe(heap: &Heap, id: HeapId) -> String {
    let kind = heap.kind_of(id);
    match kind {
        _ if kind.has_shape() => match heap.dim(id) {
            Some(dims) => {
                let dims: Vec<String> = dims.iter().map(ToString::to_string).collect();
                format!("[{}]", dims.join(" x "))
            }
            None => format!("[{}]", heap.length_of(id)),
        },
        Kind::ExternalPointer => format!("<{}>", Identity::of(id)),
        Kind::Symbol => format!("`{}`", heap.symbol_name(id).unwrap_or_default()),
        _ => String::new(),
    }
}

/// Type name followed by the value's class tags.
///
/// Untagged values give the bare type name. Informal tags are listed in order,
/// `list (a, b)`. Instances of formal classes give `S4 (pkg::Class)`; when the
/// instance is stored in some other kind the suffix is marked, `list (S4: pkg::Class)`.
///
/// # Errors
/// [`HeapError::InvalidClassTag`] if the `class` attribute is not a non-empty
/// character vector, or a formal tag names more than one class.
pub fn classify(heap: &Heap, id: HeapId) -> HeapResult<String> {
    let kind = heap.kind_of(id);
    let Some(class) = heap.attribute(id, "class") else {
        return Ok(kind.name().to_owned());
    };
    if heap.kind_of(class) != Kind::Character {
        return Err(HeapError::InvalidClassTag { kind });
    }
    let names: Vec<&str> = heap
        .elements(class)
        .iter()
        .filter_map(|&elt| heap.char_value(elt))
        .collect();
    if names.is_empty() {
        return Err(HeapError::InvalidClassTag { kind });
    }

    if !heap.is_s4(id) {
        return Ok(format!("{kind} ({})", names.join(", ")));
    }
    let [name] = names.as_slice() else {
        return Err(HeapError::InvalidClassTag { kind });
    };
    let mut out = format!("{kind} (");
    if kind != Kind::S4 {
        out.push_str("S4: ");
    }
    if let Some(package) = heap.attribute(class, "package")
        && let Some(&first) = heap.elements(package).first()
        && let Some(package) = heap.char_value(first)
    {
        out.push_str(package);
        out.push_str("::");
    }
    out.push_str(name);
    out.push(')');
    Ok(out)
}

/// Named immediate children for navigation.
///
/// Vectors expose only their attributes (`_attrib`); closures expose `_body`,
/// `_formals`, `_enclosure` and then `_attrib`. Values that can never have
/// children give nothing. Any other kind is reported to `tracer` as a
/// [`Warning::UnsupportedKind`] and gives nothing.
pub fn children_of<Tr: WalkTracer>(
    heap: &Heap,
    id: HeapId,
    tracer: &mut Tr,
) -> SmallVec<[(&'static str, HeapId); 4]> {
    let mut out = SmallVec::new();
    let kind = heap.kind_of(id);
    match kind {
        Kind::Null | Kind::Builtin | Kind::Special | Kind::Symbol | Kind::Char => return out,
        Kind::Logical | Kind::Integer | Kind::Double | Kind::Complex | Kind::Raw | Kind::Character => {}
        Kind::Closure => {
            if let HeapData::Closure(closure) = heap.data(id) {
                out.push(("_body", closure.body));
                out.push(("_formals", closure.formals));
                out.push(("_enclosure", closure.env));
            }
        }
        Kind::List
        | Kind::Expression
        | Kind::Pairlist
        | Kind::Call
        | Kind::Dots
        | Kind::Environment
        | Kind::Promise
        | Kind::ExternalPointer
        | Kind::ByteCode
        | Kind::S4
        | Kind::Any => {
            tracer.on_warning(&Warning::UnsupportedKind {
                kind,
                address: Identity::of(id),
            });
            return out;
        }
    }
    if let Some(attributes) = heap.attributes_of(id) {
        out.push(("_attrib", attributes));
    }
    out
}

/// Number of children a navigator would list, attributes counted as one.
///
/// External pointers have two parts, closures and promises three, lists,
/// calls, pairlists and byte-code one per element, and environments one per
/// live binding plus one for a non-empty enclosure. Kinds without a counting
/// rule are reported to `tracer` and count only their attributes.
pub fn child_count<Tr: WalkTracer>(heap: &Heap, id: HeapId, tracer: &mut Tr) -> usize {
    let kind = heap.kind_of(id);
    let own = match kind {
        Kind::Null
        | Kind::Builtin
        | Kind::Special
        | Kind::Symbol
        | Kind::Char
        | Kind::S4
        | Kind::Logical
        | Kind::Integer
        | Kind::Double
        | Kind::Complex
        | Kind::Raw
        | Kind::Character => 0,
        Kind::ExternalPointer => 2,
        Kind::Closure | Kind::Promise => 3,
        Kind::List | Kind::Expression | Kind::Call | Kind::Pairlist | Kind::Dots | Kind::ByteCode => {
            heap.length_of(id)
        }
        Kind::Environment => {
            let enclosed = heap.environment(id).is_some_and(|env| env.enclos != heap.empty_env());
            heap.length_of(id) + usize::from(enclosed)
        }
        Kind::Any => {
            tracer.on_warning(&Warning::UnsupportedKind {
                kind,
                address: Identity::of(id),
            });
            0
        }
    };
    own + usize::from(heap.attributes_of(id).is_some())
}

/// The class descriptor and backing payloads of a compact wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactParts {
    pub class: HeapId,
    pub data1: HeapId,
    pub data2: HeapId,
}

/// Returns the internals of a compact wrapper.
///
/// # Errors
/// [`HeapError::NotCompact`] for any value that is not a compact wrapper.
pub fn compact_parts(heap: &Heap, id: HeapId) -> HeapResult<CompactParts> {
    match heap.data(id) {
        HeapData::Compact(compact) => Ok(CompactParts {
            class: compact.class,
            data1: compact.data1,
            data2: compact.data2,
        }),
        other => Err(HeapError::NotCompact { kind: other.kind() }),
    }
}
