//! Aggregate memory footprint of the object graph reachable from a set of roots.
//!
//! The estimator walks the graph with an explicit work stack and charges each
//! value once: the first root to reach a shared value pays for it, every later
//! path sees it as free. Runtime singletons are always free and recognized
//! environments (global, base, empty, namespaces and caller-supplied sentinels)
//! stop the walk.

use crate::{
    error::{HeapError, HeapResult},
    heap::{EnvClass, Heap, HeapData, HeapId},
    identity::VisitedSet,
    kind::{NODE_SLOTS, POINTER_SIZE, VECTOR_CHUNK},
    tracer::{NoopTracer, WalkTracer},
};

/// Bytes allocated for a vector payload of `n` elements of `element_width` bytes.
///
/// Models the runtime's allocator: payloads are measured in chunks of
/// [`VECTOR_CHUNK`] bytes; up to 16 chunks come from a small-object pool with fixed
/// size classes, anything larger is allocated in 8-byte granules. An empty
/// payload allocates nothing.
///
/// ```
/// use heapscope::allocation_size;
///
/// assert_eq!(allocation_size(0, 8), 0);
/// assert_eq!(allocation_size(5, 8), 48);
/// assert_eq!(allocation_size(17, 8), 136);
/// ```
#[must_use]
pub fn allocation_size(n: u64, element_width: u64) -> u64 {
    if n == 0 {
        return 0;
    }
    let chunks = n.saturating_mul(element_width).div_ceil(VECTOR_CHUNK);
    match chunks {
        c if c > 16 => c.saturating_mul(8),
        9..=16 => 128,
        7 | 8 => 64,
        5 | 6 => 48,
        3 | 4 => 32,
        2 => 16,
        1 => 8,
        _ => 0,
    }
}

/// Total size of everything reachable from `roots`, counting shared values once.
pub fn compute_size(heap: &Heap, roots: &[HeapId], sentinel_envs: &[HeapId]) -> HeapResult<u64> {
    Ok(compute_sizes(heap, roots, sentinel_envs)?.into_iter().sum())
}

/// Size charged to each root, in order.
///
/// All roots share one visited set, so a value reachable from several roots is
/// charged to the first of them only.
pub fn compute_sizes(heap: &Heap, roots: &[HeapId], sentinel_envs: &[HeapId]) -> HeapResult<Vec<u64>> {
    let mut estimator = SizeEstimator::new(heap, sentinel_envs, NoopTracer);
    roots.iter().map(|&root| estimator.add_root(root)).collect()
}

/// Incremental size computation over one visited set.
///
/// [`compute_size`] and [`compute_sizes`] are thin wrappers; use the estimator
/// directly to attach a tracer or to inspect how many values were charged.
#[derive(Debug)]
pub struct SizeEstimator<'a, Tr: WalkTracer = NoopTracer> {
    heap: &'a Heap,
    sentinels: &'a [HeapId],
    visited: VisitedSet,
    stack: Vec<HeapId>,
    tracer: Tr,
}

impl<'a, Tr: WalkTracer> SizeEstimator<'a, Tr> {
    #[must_use]
    pub fn new(heap: &'a Heap, sentinels: &'a [HeapId], tracer: Tr) -> Self {
        Self {
            heap,
            sentinels,
            visited: VisitedSet::new(),
            stack: Vec::new(),
            tracer,
        }
    }

    /// Charges everything reachable from `root` that no earlier root reached.
    ///
    /// Returns the bytes newly charged. An [`HeapError::UnsupportedKind`] aborts
    /// the walk; the estimator should be discarded afterwards.
    pub fn add_root(&mut self, root: HeapId) -> HeapResult<u64> {
        self.stack.push(root);
        let mut total: u64 = 0;
        while let Some(id) = self.stack.pop() {
            match self.charge(id) {
                Ok(bytes) => total = total.saturating_add(bytes),
                Err(err) => {
                    self.stack.clear();
                    return Err(err);
                }
            }
        }
        Ok(total)
    }

    /// Number of distinct values charged so far.
    #[must_use]
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    #[must_use]
    pub fn tracer(&self) -> &Tr {
        &self.tracer
    }

    #[must_use]
    pub fn into_tracer(self) -> Tr {
        self.tracer
    }

    /// Charges a value's own bytes and queues its children.
    fn charge(&mut self, id: HeapId) -> HeapResult<u64> {
        let heap = self.heap;
        let data = heap.data(id);
        let kind = data.kind();
        if kind.is_zero_cost() {
            return Ok(0);
        }
        if !self.visited.mark_if_new(id) {
            self.tracer.on_shared(id);
            return Ok(0);
        }
        self.tracer.on_visit(id, kind, self.stack.len());

        let class = heap.recognized_environment_class(id, self.sentinels);
        if class != EnvClass::None {
            self.tracer.on_sentinel(id, class);
            return Ok(0);
        }

        // leaf strings carry no attributes and compact wrappers keep theirs out of the count
        if !matches!(data, HeapData::Char(_) | HeapData::Compact(_))
            && let Some(attributes) = heap.attributes_of(id)
        {
            self.stack.push(attributes);
        }

        let payload = match data {
            HeapData::Null | HeapData::Builtin(_) | HeapData::Special(_) => 0,
            HeapData::Logical(_)
            | HeapData::Integer(_)
            | HeapData::Double(_)
            | HeapData::Complex(_)
            | HeapData::Raw(_) => allocation_size(heap.length_of(id) as u64, kind.element_width().unwrap_or(0)),
            HeapData::Char(value) => allocation_size(value.len() as u64 + 1, 1),
            HeapData::Character(elements) | HeapData::List(elements) | HeapData::Expression(elements) => {
                self.push_all(elements.iter().copied());
                allocation_size(elements.len() as u64, POINTER_SIZE)
            }
            // every cell of a chain is its own value, so the next cell pays its own header
            HeapData::Pairlist(cell) | HeapData::Call(cell) | HeapData::Dots(cell) => {
                self.push_all([cell.tag, cell.car, cell.cdr]);
                NODE_SLOTS
            }
            HeapData::Environment(env) => {
                self.push_all([env.frame, env.enclos, env.hashtab]);
                NODE_SLOTS
            }
            HeapData::Closure(closure) => {
                self.push_all([closure.formals, closure.body, closure.env]);
                NODE_SLOTS
            }
            HeapData::Promise(promise) => {
                self.push_all([promise.value, promise.code, promise.env]);
                NODE_SLOTS
            }
            HeapData::ExternalPointer(pointer) => {
                self.push_all([pointer.prot, pointer.tag]);
                POINTER_SIZE
            }
            // never walk into the symbol table
            HeapData::Symbol(_) => NODE_SLOTS,
            HeapData::ByteCode(code) => {
                self.push_all([code.tag, code.code, code.consts]);
                NODE_SLOTS
            }
            HeapData::S4 { tag } => {
                self.stack.push(*tag);
                NODE_SLOTS
            }
            HeapData::Compact(compact) => {
                self.push_all([compact.class, compact.data1, compact.data2]);
                NODE_SLOTS
            }
            HeapData::Any => return Err(HeapError::UnsupportedKind { kind }),
        };

        let bytes = kind.base_header() + payload;
        self.tracer.on_charge(id, kind, bytes);
        Ok(bytes)
    }

    /// Queues children so they are popped in their natural order.
    fn push_all(&mut self, children: impl IntoIterator<Item = HeapId, IntoIter: DoubleEndedIterator>) {
        self.stack.extend(children.into_iter().rev());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_is_free_for_every_width() {
        for width in [1, 4, 8, 16] {
            assert_eq!(allocation_size(0, width), 0, "width {width}");
        }
    }

    #[test]
    fn small_vector_pool_classes() {
        assert_eq!(allocation_size(1, 8), 8);
        assert_eq!(allocation_size(2, 8), 16);
        assert_eq!(allocation_size(3, 8), 32);
        assert_eq!(allocation_size(4, 8), 32);
        assert_eq!(allocation_size(5, 8), 48);
        assert_eq!(allocation_size(7, 8), 64);
        assert_eq!(allocation_size(9, 8), 128);
        assert_eq!(allocation_size(16, 8), 128);
    }

    #[test]
    fn large_vectors_grow_in_granules() {
        assert_eq!(allocation_size(17, 8), 136);
        assert_eq!(allocation_size(1000, 8), 8000);
    }

    #[test]
    fn narrow_elements_pack_into_chunks() {
        // eight bytes or two ints per chunk
        assert_eq!(allocation_size(8, 1), 8);
        assert_eq!(allocation_size(9, 1), 16);
        assert_eq!(allocation_size(3, 4), 16);
    }

    #[test]
    fn wide_elements_span_chunks() {
        // one complex number is two chunks
        assert_eq!(allocation_size(1, 16), 16);
        assert_eq!(allocation_size(9, 16), 136);
    }
}
