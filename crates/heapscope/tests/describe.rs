//! Tests for the one-line description helpers: `describe`, `classify`,
//! `children_of`, `child_count` and `compact_parts`.

use heapscope::{
    CompactParts, Heap, HeapData, HeapError, HeapId, Kind, NoopTracer, RecordingTracer, child_count, children_of,
    classify, compact_parts, describe, identity_of, kind_name,
};
use pretty_assertions::assert_eq;

// =============================================================================
// 1. describe
// =============================================================================

/// Flat vectors show their length.
#[test]
fn describe_flat_vector() {
    let mut heap = Heap::new();
    let x = heap.double(vec![0.0; 7]);
    assert_eq!(describe(&heap, x), "[7]");
}

/// Shaped vectors show their dimensions.
#[test]
fn describe_matrix() {
    let mut heap = Heap::new();
    let x = heap.integer((1..=12).collect());
    heap.set_dim(x, &[3, 4]);
    assert_eq!(describe(&heap, x), "[3 x 4]");
}

/// Lists and character vectors are vector-like too.
#[test]
fn describe_list_and_character() {
    let mut heap = Heap::new();
    let list = heap.list(vec![HeapId::NULL, HeapId::NULL]);
    let chars = heap.character(&["a"]);
    assert_eq!(describe(&heap, list), "[2]");
    assert_eq!(describe(&heap, chars), "[1]");
}

/// Symbols and external pointers have their own forms; everything else is empty.
#[test]
fn describe_other_kinds() {
    let mut heap = Heap::new();
    let sym = heap.install("foo");
    let ptr = heap.external_pointer(0x1234, HeapId::NULL, HeapId::NULL);
    let f = heap.closure(HeapId::NULL, HeapId::NULL, heap.global_env());
    assert_eq!(describe(&heap, sym), "`foo`");
    assert_eq!(describe(&heap, ptr), format!("<{}>", identity_of(ptr)));
    assert_eq!(describe(&heap, f), "");
    assert_eq!(describe(&heap, HeapId::NULL), "");
}

// =============================================================================
// 2. classify
// =============================================================================

/// Untagged values give the bare type name.
#[test]
fn classify_untagged() {
    let mut heap = Heap::new();
    let x = heap.double(vec![1.0]);
    let f = heap.closure(HeapId::NULL, HeapId::NULL, heap.global_env());
    assert_eq!(classify(&heap, x).unwrap(), "double");
    assert_eq!(classify(&heap, f).unwrap(), "function");
    assert_eq!(kind_name(&heap, f), "function");
}

/// Informal tags are listed in order.
#[test]
fn classify_informal_tags() {
    let mut heap = Heap::new();
    let list = heap.list(Vec::new());
    heap.set_class(list, &["a", "b"]);
    assert_eq!(classify(&heap, list).unwrap(), "list (a, b)");
}

/// Formal instances show their package and class.
#[test]
fn classify_formal_instance() {
    let mut heap = Heap::new();
    let obj = heap.s4_object("C", Some("m"));
    assert_eq!(classify(&heap, obj).unwrap(), "S4 (m::C)");
}

/// A formal instance without a package shows only the class.
#[test]
fn classify_formal_without_package() {
    let mut heap = Heap::new();
    let obj = heap.s4_object("C", None);
    assert_eq!(classify(&heap, obj).unwrap(), "S4 (C)");
}

/// Formal instances stored in another kind are marked.
#[test]
fn classify_formal_in_other_storage() {
    let mut heap = Heap::new();
    let list = heap.list(Vec::new());
    heap.set_s4_class(list, "C", Some("m"));
    assert_eq!(classify(&heap, list).unwrap(), "list (S4: m::C)");
}

/// A class attribute that is not a character vector is rejected.
#[test]
fn classify_rejects_invalid_tag() {
    let mut heap = Heap::new();
    let x = heap.double(vec![1.0]);
    let tag = heap.integer(vec![1]);
    heap.set_attr(x, "class", tag);
    assert_eq!(classify(&heap, x), Err(HeapError::InvalidClassTag { kind: Kind::Double }));
}

/// A formal tag must name exactly one class.
#[test]
fn classify_rejects_multiple_formal_classes() {
    let mut heap = Heap::new();
    let obj = heap.s4_object("C", None);
    heap.set_class(obj, &["C", "D"]);
    assert_eq!(classify(&heap, obj), Err(HeapError::InvalidClassTag { kind: Kind::S4 }));
}

// =============================================================================
// 3. children_of and child_count
// =============================================================================

/// Vectors expose only their attributes.
#[test]
fn children_of_vector() {
    let mut heap = Heap::new();
    let x = heap.double(vec![1.0, 2.0]);
    let mut tracer = NoopTracer;
    assert!(children_of(&heap, x, &mut tracer).is_empty());
    heap.set_names(x, &["a", "b"]);
    let attributes = heap.attributes_of(x).unwrap();
    assert_eq!(children_of(&heap, x, &mut tracer).to_vec(), vec![("_attrib", attributes)]);
}

/// Closures expose body, formals and enclosure.
#[test]
fn children_of_closure() {
    let mut heap = Heap::new();
    let body = heap.double(vec![1.0]);
    let formals = heap.pairlist(&[(Some("x"), heap.missing_arg())]);
    let f = heap.closure(formals, body, heap.global_env());
    let children = children_of(&heap, f, &mut NoopTracer);
    assert_eq!(
        children.to_vec(),
        vec![("_body", body), ("_formals", formals), ("_enclosure", heap.global_env())]
    );
}

/// Kinds without a child rule warn through the tracer.
#[test]
fn children_of_unsupported_kind_warns() {
    let mut heap = Heap::new();
    let env = heap.new_env(heap.global_env());
    let mut tracer = RecordingTracer::new();
    assert!(children_of(&heap, env, &mut tracer).is_empty());
    assert_eq!(tracer.warnings().len(), 1);
}

/// Child counts follow the per-kind rules plus one for attributes.
#[test]
fn child_count_per_kind() {
    let mut heap = Heap::new();
    let x = heap.double(vec![1.0, 2.0]);
    let list = heap.list(vec![x, x, x]);
    let ptr = heap.external_pointer(1, HeapId::NULL, HeapId::NULL);
    let f = heap.closure(HeapId::NULL, x, heap.global_env());
    let env = heap.new_env(heap.global_env());
    heap.define(env, "a", x);
    heap.define(env, "b", x);
    let top = heap.new_env(heap.empty_env());
    let mut tracer = NoopTracer;

    assert_eq!(child_count(&heap, x, &mut tracer), 0);
    assert_eq!(child_count(&heap, list, &mut tracer), 3);
    assert_eq!(child_count(&heap, ptr, &mut tracer), 2);
    assert_eq!(child_count(&heap, f, &mut tracer), 3);
    assert_eq!(child_count(&heap, env, &mut tracer), 3, "two bindings plus the enclosure");
    assert_eq!(child_count(&heap, top, &mut tracer), 0, "the empty environment does not count");

    heap.set_names(list, &["a", "b", "c"]);
    assert_eq!(child_count(&heap, list, &mut tracer), 4);
}

/// Unsupported kinds warn and count nothing of their own.
#[test]
fn child_count_unsupported_kind_warns() {
    let mut heap = Heap::new();
    let any = heap.allocate(HeapData::Any);
    let mut tracer = RecordingTracer::new();
    assert_eq!(child_count(&heap, any, &mut tracer), 0);
    assert_eq!(tracer.warnings().len(), 1);
}

// =============================================================================
// 4. compact_parts
// =============================================================================

/// Compact wrappers expose their encoding.
#[test]
fn compact_parts_of_wrapper() {
    let mut heap = Heap::new();
    let class = heap.install("compact_intseq");
    let data1 = heap.double(vec![1.0, 3.0, 1.0]);
    let seq = heap.compact(Kind::Integer, 3, class, data1, HeapId::NULL, Vec::new()).unwrap();
    assert_eq!(
        compact_parts(&heap, seq).unwrap(),
        CompactParts {
            class,
            data1,
            data2: HeapId::NULL,
        }
    );
}

/// Ordinary values are rejected.
#[test]
fn compact_parts_rejects_ordinary_values() {
    let mut heap = Heap::new();
    let x = heap.integer(vec![1, 2, 3]);
    assert_eq!(compact_parts(&heap, x), Err(HeapError::NotCompact { kind: Kind::Integer }));
}
