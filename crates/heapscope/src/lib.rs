#![doc = include_str!("../../../README.md")]

mod describe;
mod error;
mod heap;
mod identity;
mod inspect;
mod kind;
mod size;
pub mod tracer;

pub use crate::{
    describe::{CompactParts, child_count, children_of, classify, compact_parts, describe, kind_name},
    error::{HeapError, HeapResult, Warning},
    heap::{
        Binding, ByteCode, Chain, Closure, Compact, Complex, ConsCell, EnvClass, Environment, ExternalPointer, Heap,
        HeapData, HeapEntry, HeapId, Promise,
    },
    identity::{Identity, SeenMap, VisitedSet, identity_of, identity_of_many, refs, refs_of_many},
    inspect::{DEFAULT_MAX_DEPTH, Expand, InspectOptions, InspectionNode, Inspector, NodeFlags, inspect},
    kind::{DOUBLE_SIZE, Kind, NODE_HEADER, NODE_SLOTS, POINTER_SIZE, VECTOR_CHUNK, VECTOR_HEADER},
    size::{SizeEstimator, allocation_size, compute_size, compute_sizes},
    tracer::{NoopTracer, RecordingTracer, StderrTracer, TraceEvent, WalkTracer},
};
