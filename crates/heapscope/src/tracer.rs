//! Walk tracing infrastructure.
//!
//! Both walkers are generic over a [`WalkTracer`] and report what they do through
//! its hooks: values entered, bytes charged, shared values skipped, sentinel
//! environments left unexpanded and non-fatal warnings. With [`NoopTracer`] every
//! hook compiles away via monomorphization.
//!
//! | Tracer | Purpose |
//! |--------|---------|
//! | [`NoopTracer`] | Zero-cost no-op (default) |
//! | [`StderrTracer`] | Human-readable walk log to stderr |
//! | [`RecordingTracer`] | Full event capture for tests and post-mortem |
//!
//! ```
//! use heapscope::{Heap, RecordingTracer, SizeEstimator, TraceEvent};
//!
//! let mut heap = Heap::new();
//! let x = heap.double(vec![1.0, 2.0]);
//! let mut estimator = SizeEstimator::new(&heap, &[], RecordingTracer::new());
//! estimator.add_root(x).unwrap();
//! assert!(matches!(estimator.tracer().events()[0], TraceEvent::Visit { .. }));
//! ```

use crate::{
    error::Warning,
    heap::{EnvClass, HeapId},
    identity::Identity,
    kind::Kind,
};

/// Trace event emitted during a walk.
///
/// Used by [`RecordingTracer`] to capture the whole walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// A value was reached for the first time.
    Visit {
        address: Identity,
        kind: Kind,
        /// Number of values on the work stack below this one.
        depth: usize,
    },
    /// The size estimator charged a value's own bytes (children excluded).
    Charge { address: Identity, kind: Kind, bytes: u64 },
    /// A value was reached again and not counted or expanded a second time.
    Shared { address: Identity },
    /// A recognized environment was left unexpanded.
    Sentinel { address: Identity, class: EnvClass },
    /// A non-fatal problem.
    Warning(Warning),
}

/// Trait for walk tracing.
///
/// All methods have default no-op implementations, so [`NoopTracer`] needs no code
/// at all. Implementations override only the hooks they care about.
pub trait WalkTracer: std::fmt::Debug {
    /// Called when a value is reached for the first time.
    #[inline(always)]
    fn on_visit(&mut self, _id: HeapId, _kind: Kind, _depth: usize) {}

    /// Called when the size estimator charges a value's own bytes.
    #[inline(always)]
    fn on_charge(&mut self, _id: HeapId, _kind: Kind, _bytes: u64) {}

    /// Called when a value has already been counted or assigned an id.
    #[inline(always)]
    fn on_shared(&mut self, _id: HeapId) {}

    /// Called when a recognized environment stops the walk.
    #[inline(always)]
    fn on_sentinel(&mut self, _id: HeapId, _class: EnvClass) {}

    /// Called for every non-fatal warning.
    #[inline(always)]
    fn on_warning(&mut self, _warning: &Warning) {}
}

impl<T: WalkTracer + ?Sized> WalkTracer for &mut T {
    fn on_visit(&mut self, id: HeapId, kind: Kind, depth: usize) {
        (**self).on_visit(id, kind, depth);
    }

    fn on_charge(&mut self, id: HeapId, kind: Kind, bytes: u64) {
        (**self).on_charge(id, kind, bytes);
    }

    fn on_shared(&mut self, id: HeapId) {
        (**self).on_shared(id);
    }

    fn on_sentinel(&mut self, id: HeapId, class: EnvClass) {
        (**self).on_sentinel(id, class);
    }

    fn on_warning(&mut self, warning: &Warning) {
        (**self).on_warning(warning);
    }
}

// ============================================================================
// NoopTracer
// ============================================================================

/// A tracer that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl WalkTracer for NoopTracer {}

// ============================================================================
// StderrTracer
// ============================================================================

/// Tracer that prints a human-readable walk log to stderr.
///
/// Output format:
/// ```text
///   visit  0x558120000118 list        depth=0
///   charge 0x558120000118 list        64 bytes
///   shared 0x5581200001c0
///   stop   0x558120000070 global
///   warn   unimplemented type any at 0x558120000230
/// ```
#[derive(Debug, Default)]
pub struct StderrTracer {
    /// Maximum number of lines before going quiet. None = unlimited.
    limit: Option<usize>,
    count: usize,
    stopped: bool,
}

impl StderrTracer {
    /// Creates a new stderr tracer with no line limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new stderr tracer that stops after `limit` lines.
    ///
    /// Warnings are always printed, even past the limit.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    fn emit(&mut self, line: std::fmt::Arguments<'_>) {
        if self.stopped {
            return;
        }
        eprintln!("{line}");
        self.count += 1;
        if let Some(limit) = self.limit
            && self.count >= limit
        {
            eprintln!("--- trace limit reached ({limit} events) ---");
            self.stopped = true;
        }
    }
}

impl WalkTracer for StderrTracer {
    fn on_visit(&mut self, id: HeapId, kind: Kind, depth: usize) {
        let address = Identity::of(id);
        self.emit(format_args!("  visit  {address} {kind:<12} depth={depth}"));
    }

    fn on_charge(&mut self, id: HeapId, kind: Kind, bytes: u64) {
        let address = Identity::of(id);
        self.emit(format_args!("  charge {address} {kind:<12} {bytes} bytes"));
    }

    fn on_shared(&mut self, id: HeapId) {
        let address = Identity::of(id);
        self.emit(format_args!("  shared {address}"));
    }

    fn on_sentinel(&mut self, id: HeapId, class: EnvClass) {
        let address = Identity::of(id);
        let label = class.label().unwrap_or("environment");
        self.emit(format_args!("  stop   {address} {label}"));
    }

    fn on_warning(&mut self, warning: &Warning) {
        eprintln!("  warn   {warning}");
    }
}

// ============================================================================
// RecordingTracer
// ============================================================================

/// Tracer that records every event.
///
/// The most expensive tracer (allocates per event); meant for tests and for
/// debugging a specific walk.
#[derive(Debug, Default)]
pub struct RecordingTracer {
    events: Vec<TraceEvent>,
    limit: Option<usize>,
}

impl RecordingTracer {
    /// Creates a new recording tracer with no event limit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new recording tracer that stops recording after `limit` events.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            events: Vec::with_capacity(limit.min(1024)),
            limit: Some(limit),
        }
    }

    /// Returns the recorded events.
    #[must_use]
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Consumes the tracer and returns the recorded events.
    #[must_use]
    pub fn into_events(self) -> Vec<TraceEvent> {
        self.events
    }

    /// Returns only the recorded warnings.
    #[must_use]
    pub fn warnings(&self) -> Vec<&Warning> {
        self.events
            .iter()
            .filter_map(|event| match event {
                TraceEvent::Warning(warning) => Some(warning),
                _ => None,
            })
            .collect()
    }

    /// Sum of all charged bytes.
    #[must_use]
    pub fn charged_bytes(&self) -> u64 {
        self.events
            .iter()
            .map(|event| match event {
                TraceEvent::Charge { bytes, .. } => *bytes,
                _ => 0,
            })
            .sum()
    }

    fn record(&mut self, event: TraceEvent) {
        if self.limit.is_some_and(|l| self.events.len() >= l) {
            return;
        }
        self.events.push(event);
    }
}

impl WalkTracer for RecordingTracer {
    fn on_visit(&mut self, id: HeapId, kind: Kind, depth: usize) {
        self.record(TraceEvent::Visit {
            address: Identity::of(id),
            kind,
            depth,
        });
    }

    fn on_charge(&mut self, id: HeapId, kind: Kind, bytes: u64) {
        self.record(TraceEvent::Charge {
            address: Identity::of(id),
            kind,
            bytes,
        });
    }

    fn on_shared(&mut self, id: HeapId) {
        self.record(TraceEvent::Shared {
            address: Identity::of(id),
        });
    }

    fn on_sentinel(&mut self, id: HeapId, class: EnvClass) {
        self.record(TraceEvent::Sentinel {
            address: Identity::of(id),
            class,
        });
    }

    fn on_warning(&mut self, warning: &Warning) {
        self.record(TraceEvent::Warning(warning.clone()));
    }
}
