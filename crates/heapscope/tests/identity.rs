//! Tests for identities, sharing counts and the per-call bookkeeping sets.

use heapscope::{
    Heap, HeapError, HeapId, Kind, SeenMap, VisitedSet, identity_of, identity_of_many, refs, refs_of_many,
};
use pretty_assertions::assert_eq;

// =============================================================================
// 1. Identity Strings
// =============================================================================

/// The same value always yields the same identity.
#[test]
fn identity_is_stable() {
    let mut heap = Heap::new();
    let x = heap.double(vec![1.0]);
    assert_eq!(identity_of(x), identity_of(x));
    assert!(identity_of(x).starts_with("0x"), "identity should be a hex address");
}

/// Distinct values yield distinct identities, even when equal in content.
#[test]
fn distinct_values_have_distinct_identities() {
    let mut heap = Heap::new();
    let x = heap.double(vec![1.0]);
    let y = heap.double(vec![1.0]);
    assert!(identity_of(x) != identity_of(y));
}

/// Elements of a character vector report their cached leaf strings.
#[test]
fn identity_of_many_for_strings() {
    let mut heap = Heap::new();
    let x = heap.character(&["a", "b", "a"]);
    let ids = identity_of_many(&heap, x).unwrap();
    assert_eq!(ids.len(), 3);
    assert_eq!(ids[0], ids[2], "equal strings share a leaf");
    assert!(ids[0] != ids[1]);
}

/// Lists report one identity per element.
#[test]
fn identity_of_many_for_lists() {
    let mut heap = Heap::new();
    let x = heap.double(vec![1.0]);
    let y = heap.integer(vec![1]);
    let list = heap.list(vec![x, y, x]);
    assert_eq!(
        identity_of_many(&heap, list).unwrap(),
        vec![identity_of(x), identity_of(y), identity_of(x)]
    );
}

/// Environments report their live bindings and skip unbound slots.
#[test]
fn identity_of_many_for_environments() {
    let mut heap = Heap::new();
    let x = heap.double(vec![1.0]);
    let y = heap.integer(vec![1]);
    let env = heap.new_env(heap.global_env());
    heap.define(env, "x", x);
    heap.define(env, "y", y);
    heap.define(env, "gone", y);
    heap.unbind(env, "gone");
    // frames prepend, so the newest binding comes first
    assert_eq!(identity_of_many(&heap, env).unwrap(), vec![identity_of(y), identity_of(x)]);
}

/// Hashed environments are enumerated bucket by bucket.
#[test]
fn identity_of_many_for_hashed_environments() {
    let mut heap = Heap::new();
    let env = heap.new_hashed_env(heap.global_env(), 8);
    let values: Vec<HeapId> = (0..5).map(|i| heap.integer(vec![i])).collect();
    for (i, &value) in values.iter().enumerate() {
        heap.define(env, &format!("v{i}"), value);
    }
    let mut ids = identity_of_many(&heap, env).unwrap();
    let mut expected: Vec<String> = values.iter().map(|&v| identity_of(v)).collect();
    ids.sort();
    expected.sort();
    assert_eq!(ids, expected);
}

/// Compact wrappers are enumerated through their materialized elements.
#[test]
fn identity_of_many_for_compact_wrappers() {
    let mut heap = Heap::new();
    let class = heap.install("deferred_string");
    let source = heap.integer(vec![1, 2]);
    let a = heap.mk_char("1");
    let b = heap.mk_char("2");
    heap.set_named(b, 3);
    let strings = heap
        .compact(Kind::Character, 2, class, source, HeapId::NULL, vec![a, b])
        .unwrap();
    assert_eq!(heap.kind_of(strings), Kind::Character);
    assert_eq!(identity_of_many(&heap, strings).unwrap(), vec![identity_of(a), identity_of(b)]);
    assert_eq!(refs_of_many(&heap, strings).unwrap(), vec![0, 3]);
}

/// A compact primitive vector holds no heap values and is rejected.
#[test]
fn identity_of_many_rejects_compact_primitive_vectors() {
    let mut heap = Heap::new();
    let class = heap.install("compact_intseq");
    let data1 = heap.double(vec![1.0, 3.0, 1.0]);
    let seq = heap.compact(Kind::Integer, 3, class, data1, HeapId::NULL, Vec::new()).unwrap();
    assert_eq!(
        identity_of_many(&heap, seq),
        Err(HeapError::NotAContainer { kind: Kind::Integer })
    );
}

/// Anything else is rejected.
#[test]
fn identity_of_many_rejects_other_kinds() {
    let mut heap = Heap::new();
    let x = heap.double(vec![1.0]);
    assert_eq!(
        identity_of_many(&heap, x),
        Err(HeapError::NotAContainer { kind: Kind::Double })
    );
}

// =============================================================================
// 2. Sharing Counts
// =============================================================================

/// Sharing counts are whatever the host recorded.
#[test]
fn refs_report_host_counts() {
    let mut heap = Heap::new();
    let x = heap.double(vec![1.0]);
    let y = heap.double(vec![2.0]);
    heap.set_named(x, 2);
    let list = heap.list(vec![x, y]);
    assert_eq!(refs(&heap, x), 2);
    assert_eq!(refs_of_many(&heap, list).unwrap(), vec![2, 0]);
    assert_eq!(
        refs_of_many(&heap, x),
        Err(HeapError::NotAContainer { kind: Kind::Double })
    );
}

// =============================================================================
// 3. Bookkeeping Sets
// =============================================================================

/// The visited set reports only the first insertion.
#[test]
fn visited_set_marks_once() {
    let mut heap = Heap::new();
    let x = heap.double(vec![1.0]);
    let mut visited = VisitedSet::new();
    assert!(visited.is_empty());
    assert!(visited.mark_if_new(x));
    assert!(!visited.mark_if_new(x));
    assert!(visited.contains(x));
    assert_eq!(visited.len(), 1);
}

/// The seen map hands out 1-based ids in insertion order.
#[test]
fn seen_map_assigns_sequential_ids() {
    let mut heap = Heap::new();
    let x = heap.double(vec![1.0]);
    let y = heap.double(vec![2.0]);
    let mut seen = SeenMap::new();
    assert_eq!(seen.get(x), None);
    assert_eq!(seen.assign(x), (1, true));
    assert_eq!(seen.assign(y), (2, true));
    assert_eq!(seen.assign(x), (1, false));
    assert_eq!(seen.get(y), Some(2));
    assert_eq!(seen.len(), 2);
}
