//! In-memory model of the host runtime's heap.
//!
//! The size estimator and the inspector never own runtime values; they only read
//! them through the collaborator queries on [`Heap`]. This module is that
//! collaborator: an arena of [`HeapEntry`] slots addressed by [`HeapId`], each holding
//! one [`HeapData`] variant per [`Kind`] plus the attribute pairlist, the host's
//! sharing count and the formal-object bit.
//!
//! Construction mirrors how the runtime itself builds values: symbols are interned
//! (`install`), leaf strings go through a global cache so equal strings share one
//! storage value, environments prepend bindings to their frame (or to a hash
//! bucket), and the runtime-fixed singletons (`NULL`, the unbound marker, the
//! empty/base/global environments) exist from the moment the heap is created.

use ahash::{AHashMap, AHashSet};

use crate::{
    error::{HeapError, HeapResult},
    kind::Kind,
};

/// Address of slot zero when rendering identities.
const HEAP_BASE_ADDRESS: usize = 0x5581_2000_0000;

/// Distance between two slot addresses; the size of one node.
const SLOT_STRIDE: usize = 0x38;

/// Binding that marks an environment as a package namespace.
const NAMESPACE_MARKER: &str = ".__NAMESPACE__.";

/// Unique identifier for values stored inside the heap arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct HeapId(usize);

impl HeapId {
    /// The `NULL` singleton, always the first slot of every heap.
    pub const NULL: Self = Self(0);

    /// Returns the raw index value.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }

    /// Returns the address the runtime would report for this slot.
    #[inline]
    #[must_use]
    pub fn address(self) -> usize {
        HEAP_BASE_ADDRESS + self.0 * SLOT_STRIDE
    }

    /// Returns true for the `NULL` singleton.
    #[inline]
    #[must_use]
    pub fn is_null(self) -> bool {
        self == Self::NULL
    }
}

/// One complex number element.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

/// A cons cell: optional name, value and next link.
///
/// `active` marks an environment binding whose value is a function computing the
/// binding on access rather than the stored value itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ConsCell {
    pub tag: HeapId,
    pub car: HeapId,
    pub cdr: HeapId,
    pub active: bool,
}

impl ConsCell {
    #[must_use]
    pub fn new(tag: HeapId, car: HeapId, cdr: HeapId) -> Self {
        Self {
            tag,
            car,
            cdr,
            active: false,
        }
    }
}

/// A binding frame plus its enclosing environment.
///
/// `hashtab` is `NULL` for plain environments, whose bindings live on the `frame`
/// pairlist. Hashed environments keep a list of bucket pairlists instead and leave
/// `frame` empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Environment {
    pub frame: HeapId,
    pub enclos: HeapId,
    pub hashtab: HeapId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Closure {
    pub formals: HeapId,
    pub body: HeapId,
    pub env: HeapId,
}

/// A deferred binding.
///
/// `value` holds the unbound marker until the promise is forced; forcing clears `env`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Promise {
    pub value: HeapId,
    pub code: HeapId,
    pub env: HeapId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ExternalPointer {
    pub address: usize,
    pub prot: HeapId,
    pub tag: HeapId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ByteCode {
    pub tag: HeapId,
    pub code: HeapId,
    pub consts: HeapId,
}

/// A vector whose payload is produced on demand from a compact encoding.
///
/// `apparent` is the vector kind the value presents to the rest of the runtime.
/// `elements` is the host's materialized view for string and list wrappers
/// (empty for primitive vectors, whose elements are not heap values).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Compact {
    pub apparent: Kind,
    pub length: usize,
    pub class: HeapId,
    pub data1: HeapId,
    pub data2: HeapId,
    pub elements: Vec<HeapId>,
}

/// Payload of a heap slot, one variant per kind.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum HeapData {
    Null,
    Builtin(String),
    Special(String),
    Logical(Vec<i32>),
    Integer(Vec<i32>),
    Double(Vec<f64>),
    Complex(Vec<Complex>),
    Raw(Vec<u8>),
    Char(String),
    Character(Vec<HeapId>),
    List(Vec<HeapId>),
    Expression(Vec<HeapId>),
    Pairlist(ConsCell),
    Call(ConsCell),
    Dots(ConsCell),
    Environment(Environment),
    Closure(Closure),
    Promise(Promise),
    ExternalPointer(ExternalPointer),
    Symbol(String),
    ByteCode(ByteCode),
    S4 { tag: HeapId },
    Compact(Compact),
    Any,
}

impl HeapData {
    /// Returns the kind this payload presents; compact wrappers report their apparent kind.
    #[must_use]
    pub fn kind(&self) -> Kind {
        match self {
            Self::Null => Kind::Null,
            Self::Builtin(_) => Kind::Builtin,
            Self::Special(_) => Kind::Special,
            Self::Logical(_) => Kind::Logical,
            Self::Integer(_) => Kind::Integer,
            Self::Double(_) => Kind::Double,
            Self::Complex(_) => Kind::Complex,
            Self::Raw(_) => Kind::Raw,
            Self::Char(_) => Kind::Char,
            Self::Character(_) => Kind::Character,
            Self::List(_) => Kind::List,
            Self::Expression(_) => Kind::Expression,
            Self::Pairlist(_) => Kind::Pairlist,
            Self::Call(_) => Kind::Call,
            Self::Dots(_) => Kind::Dots,
            Self::Environment(_) => Kind::Environment,
            Self::Closure(_) => Kind::Closure,
            Self::Promise(_) => Kind::Promise,
            Self::ExternalPointer(_) => Kind::ExternalPointer,
            Self::Symbol(_) => Kind::Symbol,
            Self::ByteCode(_) => Kind::ByteCode,
            Self::S4 { .. } => Kind::S4,
            Self::Compact(compact) => compact.apparent,
            Self::Any => Kind::Any,
        }
    }

    /// Returns the cons cell of pairlists, calls and dots.
    #[must_use]
    pub fn cons_cell(&self) -> Option<&ConsCell> {
        match self {
            Self::Pairlist(cell) | Self::Call(cell) | Self::Dots(cell) => Some(cell),
            _ => None,
        }
    }

    fn cons_cell_mut(&mut self) -> Option<&mut ConsCell> {
        match self {
            Self::Pairlist(cell) | Self::Call(cell) | Self::Dots(cell) => Some(cell),
            _ => None,
        }
    }
}

/// One slot of the arena.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct HeapEntry {
    data: HeapData,
    /// Attribute pairlist, `NULL` when the value has none.
    attributes: HeapId,
    /// The host's approximate sharing count.
    named: u8,
    /// Set on instances of formal classes, whatever their storage kind.
    s4: bool,
}

impl HeapEntry {
    #[must_use]
    pub fn data(&self) -> &HeapData {
        &self.data
    }

    #[must_use]
    pub fn attributes(&self) -> HeapId {
        self.attributes
    }

    #[must_use]
    pub fn named(&self) -> u8 {
        self.named
    }

    #[must_use]
    pub fn is_s4(&self) -> bool {
        self.s4
    }
}

/// How the runtime recognizes an environment that must not be walked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum EnvClass {
    /// An ordinary environment.
    None,
    Global,
    Base,
    Empty,
    /// A package namespace (its frame carries the namespace marker binding).
    Namespace,
    /// One of the environments the caller passed as a sentinel.
    Sentinel,
}

impl EnvClass {
    /// Short label shown by the inspector, `None` for ordinary environments.
    #[must_use]
    pub fn label(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Global => Some("global"),
            Self::Base => Some("base"),
            Self::Empty => Some("empty"),
            Self::Namespace => Some("namespace"),
            Self::Sentinel => Some("sentinel"),
        }
    }
}

/// A live binding of an environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    /// The bound symbol.
    pub name: HeapId,
    pub value: HeapId,
    /// True when `value` is the accessor function of an active binding.
    pub active: bool,
}

/// Walks a chain of cons cells.
///
/// Iteration stops at the first link that is not a cons cell; [`Chain::tail`] then
/// returns that link (`NULL` for a proper chain).
#[derive(Debug)]
pub struct Chain<'h> {
    heap: &'h Heap,
    cursor: HeapId,
}

impl Chain<'_> {
    /// The link where iteration stopped, or the next cell if it has not finished.
    #[must_use]
    pub fn tail(&self) -> HeapId {
        self.cursor
    }
}

impl<'h> Iterator for Chain<'h> {
    type Item = (HeapId, &'h ConsCell);

    fn next(&mut self) -> Option<Self::Item> {
        let heap: &'h Heap = self.heap;
        let id = self.cursor;
        let cell = heap.data(id).cons_cell()?;
        self.cursor = cell.cdr;
        Some((id, cell))
    }
}

/// Arena holding every value of the modeled runtime.
///
/// Only the builders below create slots, so every stored id is in range and no
/// cdr chain loops back on itself. A heap can be serialized as a snapshot but
/// not read back.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Heap {
    entries: Vec<HeapEntry>,
    /// Interned symbols by name.
    symbols: AHashMap<String, HeapId>,
    /// Global leaf string cache.
    strings: AHashMap<String, HeapId>,
    unbound: HeapId,
    missing_arg: HeapId,
    empty_env: HeapId,
    base_env: HeapId,
    global_env: HeapId,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Heap {
    /// Creates a heap holding only the runtime-fixed singletons.
    #[must_use]
    pub fn new() -> Self {
        let mut heap = Self {
            entries: Vec::new(),
            symbols: AHashMap::new(),
            strings: AHashMap::new(),
            unbound: HeapId::NULL,
            missing_arg: HeapId::NULL,
            empty_env: HeapId::NULL,
            base_env: HeapId::NULL,
            global_env: HeapId::NULL,
        };
        heap.allocate(HeapData::Null);
        // both markers are symbols with no name and never enter the symbol table
        heap.unbound = heap.allocate(HeapData::Symbol(String::new()));
        heap.missing_arg = heap.allocate(HeapData::Symbol(String::new()));
        heap.empty_env = heap.new_env(HeapId::NULL);
        heap.base_env = heap.new_env(heap.empty_env);
        heap.global_env = heap.new_env(heap.base_env);
        heap
    }

    /// Number of slots in the arena, singletons included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// A heap always holds its singletons, so it is never empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn unbound(&self) -> HeapId {
        self.unbound
    }

    #[must_use]
    pub fn missing_arg(&self) -> HeapId {
        self.missing_arg
    }

    #[must_use]
    pub fn empty_env(&self) -> HeapId {
        self.empty_env
    }

    #[must_use]
    pub fn base_env(&self) -> HeapId {
        self.base_env
    }

    #[must_use]
    pub fn global_env(&self) -> HeapId {
        self.global_env
    }

    // ------------------------------------------------------------------
    // Collaborator queries
    // ------------------------------------------------------------------

    /// Gets the entry for a value.
    ///
    /// # Panics
    /// Panics if `id` was not produced by this heap.
    #[must_use]
    pub fn get(&self, id: HeapId) -> &HeapEntry {
        &self.entries[id.index()]
    }

    /// Gets the payload of a value.
    #[must_use]
    pub fn data(&self, id: HeapId) -> &HeapData {
        &self.get(id).data
    }

    #[must_use]
    pub fn kind_of(&self, id: HeapId) -> Kind {
        self.data(id).kind()
    }

    /// Returns the element count the runtime reports for a value.
    ///
    /// Vectors report their length, cons chains their number of cells and
    /// environments their number of live bindings. `NULL` has length zero and every
    /// other kind has length one.
    #[must_use]
    pub fn length_of(&self, id: HeapId) -> usize {
        match self.data(id) {
            HeapData::Null => 0,
            HeapData::Logical(v) | HeapData::Integer(v) => v.len(),
            HeapData::Double(v) => v.len(),
            HeapData::Complex(v) => v.len(),
            HeapData::Raw(v) => v.len(),
            HeapData::Char(s) => s.len(),
            HeapData::Character(v) | HeapData::List(v) | HeapData::Expression(v) => v.len(),
            HeapData::Compact(compact) => compact.length,
            HeapData::Pairlist(_) | HeapData::Call(_) | HeapData::Dots(_) => self.chain(id).count(),
            HeapData::Environment(_) => self.binding_count(id),
            HeapData::Builtin(_)
            | HeapData::Special(_)
            | HeapData::Closure(_)
            | HeapData::Promise(_)
            | HeapData::ExternalPointer(_)
            | HeapData::Symbol(_)
            | HeapData::ByteCode(_)
            | HeapData::S4 { .. }
            | HeapData::Any => 1,
        }
    }

    /// Returns the attribute pairlist of a value, if it has one.
    #[must_use]
    pub fn attributes_of(&self, id: HeapId) -> Option<HeapId> {
        let attributes = self.get(id).attributes;
        (!attributes.is_null()).then_some(attributes)
    }

    /// Looks up one attribute by name.
    #[must_use]
    pub fn attribute(&self, id: HeapId, name: &str) -> Option<HeapId> {
        let attributes = self.attributes_of(id)?;
        self.chain(attributes)
            .find(|(_, cell)| self.symbol_name(cell.tag) == Some(name))
            .map(|(_, cell)| cell.car)
    }

    #[must_use]
    pub fn is_zero_cost_singleton(&self, id: HeapId) -> bool {
        self.kind_of(id).is_zero_cost()
    }

    /// Returns true for instances of formal classes.
    #[must_use]
    pub fn is_s4(&self, id: HeapId) -> bool {
        self.get(id).s4
    }

    #[must_use]
    pub fn is_compact(&self, id: HeapId) -> bool {
        matches!(self.data(id), HeapData::Compact(_))
    }

    /// The host's approximate sharing count for a value.
    #[must_use]
    pub fn approximate_sharing_count(&self, id: HeapId) -> u8 {
        self.get(id).named
    }

    /// Classifies an environment the walkers must treat as opaque.
    ///
    /// Values that are not environments are always [`EnvClass::None`].
    #[must_use]
    pub fn recognized_environment_class(&self, id: HeapId, sentinels: &[HeapId]) -> EnvClass {
        if !matches!(self.data(id), HeapData::Environment(_)) {
            EnvClass::None
        } else if id == self.global_env {
            EnvClass::Global
        } else if id == self.base_env {
            EnvClass::Base
        } else if id == self.empty_env {
            EnvClass::Empty
        } else if sentinels.contains(&id) {
            EnvClass::Sentinel
        } else if self.is_namespace(id) {
            EnvClass::Namespace
        } else {
            EnvClass::None
        }
    }

    /// Returns true if the environment's own frame binds the namespace marker.
    #[must_use]
    pub fn is_namespace(&self, env: HeapId) -> bool {
        self.symbols.get(NAMESPACE_MARKER).is_some_and(|&marker| {
            self.lookup_binding(env, marker)
                .is_some_and(|binding| binding.value != self.unbound)
        })
    }

    /// Walks the cons cells starting at `id`.
    #[must_use]
    pub fn chain(&self, id: HeapId) -> Chain<'_> {
        Chain { heap: self, cursor: id }
    }

    /// Returns the environment payload of `id`, if it is one.
    #[must_use]
    pub fn environment(&self, id: HeapId) -> Option<&Environment> {
        match self.data(id) {
            HeapData::Environment(env) => Some(env),
            _ => None,
        }
    }

    /// Enumerates the live bindings of an environment.
    ///
    /// Hashed environments are walked bucket by bucket, plain ones along their
    /// frame. Slots holding the unbound marker are skipped.
    #[must_use]
    pub fn bindings(&self, env: HeapId) -> Vec<Binding> {
        let mut out = Vec::new();
        self.for_each_frame_cell(env, |cell| {
            if cell.car != self.unbound {
                out.push(Binding {
                    name: cell.tag,
                    value: cell.car,
                    active: cell.active,
                });
            }
        });
        out
    }

    fn binding_count(&self, env: HeapId) -> usize {
        let mut count = 0;
        self.for_each_frame_cell(env, |cell| {
            if cell.car != self.unbound {
                count += 1;
            }
        });
        count
    }

    fn for_each_frame_cell(&self, env: HeapId, mut f: impl FnMut(&ConsCell)) {
        let Some(environment) = self.environment(env) else {
            return;
        };
        if let HeapData::List(buckets) = self.data(environment.hashtab) {
            for &bucket in buckets {
                for (_, cell) in self.chain(bucket) {
                    f(cell);
                }
            }
        } else {
            for (_, cell) in self.chain(environment.frame) {
                f(cell);
            }
        }
    }

    /// Finds a binding in the environment's own frame only.
    #[must_use]
    pub fn lookup_binding(&self, env: HeapId, symbol: HeapId) -> Option<Binding> {
        let cell_id = self.binding_cell(env, symbol)?;
        let cell = self.data(cell_id).cons_cell()?;
        Some(Binding {
            name: cell.tag,
            value: cell.car,
            active: cell.active,
        })
    }

    fn binding_cell(&self, env: HeapId, symbol: HeapId) -> Option<HeapId> {
        let environment = self.environment(env)?;
        let start = if let HeapData::List(buckets) = self.data(environment.hashtab) {
            let name = self.symbol_name(symbol)?;
            *buckets.get(bucket_index(name, buckets.len())?)?
        } else {
            environment.frame
        };
        self.chain(start).find(|(_, cell)| cell.tag == symbol).map(|(id, _)| id)
    }

    /// Looks a symbol up through the chain of enclosing environments.
    ///
    /// Unbound slots are skipped exactly as if the binding did not exist.
    #[must_use]
    pub fn find_var(&self, symbol: HeapId, env: HeapId) -> Option<HeapId> {
        let mut visited = AHashSet::new();
        let mut current = env;
        while self.environment(current).is_some() && visited.insert(current) {
            if let Some(binding) = self.lookup_binding(current, symbol)
                && binding.value != self.unbound
            {
                return Some(binding.value);
            }
            current = self.environment(current).map_or(HeapId::NULL, |e| e.enclos);
        }
        None
    }

    /// Resolves a promise to its current value without evaluating anything.
    ///
    /// Forced promises yield their memoized value. An unforced promise whose
    /// expression is a symbol is followed through its defining environment, which
    /// threads promises passed down through several calls. Anything else stays as
    /// the promise itself; non-promises are returned unchanged.
    #[must_use]
    pub fn force_if_lazy(&self, id: HeapId) -> HeapId {
        let mut visited = AHashSet::new();
        let mut current = id;
        while let HeapData::Promise(promise) = self.data(current) {
            if !visited.insert(current) {
                break;
            }
            if promise.value != self.unbound {
                current = promise.value;
                continue;
            }
            if matches!(self.data(promise.code), HeapData::Symbol(_))
                && let Some(found) = self.find_var(promise.code, promise.env)
            {
                current = found;
                continue;
            }
            break;
        }
        current
    }

    #[must_use]
    pub fn symbol_name(&self, id: HeapId) -> Option<&str> {
        match self.data(id) {
            HeapData::Symbol(name) => Some(name),
            _ => None,
        }
    }

    /// Returns the contents of a leaf string.
    #[must_use]
    pub fn char_value(&self, id: HeapId) -> Option<&str> {
        match self.data(id) {
            HeapData::Char(value) => Some(value),
            _ => None,
        }
    }

    /// Elements of character vectors, lists and expressions; the materialized view
    /// for compact wrappers of those kinds. Empty for everything else.
    #[must_use]
    pub fn elements(&self, id: HeapId) -> &[HeapId] {
        match self.data(id) {
            HeapData::Character(v) | HeapData::List(v) | HeapData::Expression(v) => v,
            HeapData::Compact(compact) => &compact.elements,
            _ => &[],
        }
    }

    /// Returns the `names` attribute as one optional name per element.
    ///
    /// Empty names are reported as `None`.
    #[must_use]
    pub fn names(&self, id: HeapId) -> Vec<Option<&str>> {
        let Some(names) = self.attribute(id, "names") else {
            return Vec::new();
        };
        self.elements(names)
            .iter()
            .map(|&elt| self.char_value(elt).filter(|name| !name.is_empty()))
            .collect()
    }

    /// Returns the `dim` attribute if it is an integer vector.
    #[must_use]
    pub fn dim(&self, id: HeapId) -> Option<&[i32]> {
        match self.data(self.attribute(id, "dim")?) {
            HeapData::Integer(dims) => Some(dims),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Allocates a new slot holding `data` with no attributes.
    pub fn allocate(&mut self, data: HeapData) -> HeapId {
        let id = HeapId(self.entries.len());
        self.entries.push(HeapEntry {
            data,
            attributes: HeapId::NULL,
            named: 0,
            s4: false,
        });
        id
    }

    /// Interns a symbol, returning the existing one if the name is already known.
    pub fn install(&mut self, name: &str) -> HeapId {
        if let Some(&id) = self.symbols.get(name) {
            return id;
        }
        let id = self.allocate(HeapData::Symbol(name.to_owned()));
        self.symbols.insert(name.to_owned(), id);
        id
    }

    /// Returns the cached leaf string for `value`, creating it on first use.
    pub fn mk_char(&mut self, value: &str) -> HeapId {
        if let Some(&id) = self.strings.get(value) {
            return id;
        }
        let id = self.allocate(HeapData::Char(value.to_owned()));
        self.strings.insert(value.to_owned(), id);
        id
    }

    pub fn builtin(&mut self, name: &str) -> HeapId {
        self.allocate(HeapData::Builtin(name.to_owned()))
    }

    pub fn special(&mut self, name: &str) -> HeapId {
        self.allocate(HeapData::Special(name.to_owned()))
    }

    pub fn logical(&mut self, values: &[bool]) -> HeapId {
        self.allocate(HeapData::Logical(values.iter().map(|&b| i32::from(b)).collect()))
    }

    pub fn integer(&mut self, values: Vec<i32>) -> HeapId {
        self.allocate(HeapData::Integer(values))
    }

    pub fn double(&mut self, values: Vec<f64>) -> HeapId {
        self.allocate(HeapData::Double(values))
    }

    pub fn complex(&mut self, values: Vec<Complex>) -> HeapId {
        self.allocate(HeapData::Complex(values))
    }

    pub fn raw(&mut self, values: Vec<u8>) -> HeapId {
        self.allocate(HeapData::Raw(values))
    }

    /// Builds a character vector; equal strings share their leaf storage.
    pub fn character(&mut self, values: &[&str]) -> HeapId {
        let elements = values.iter().map(|value| self.mk_char(value)).collect();
        self.allocate(HeapData::Character(elements))
    }

    pub fn list(&mut self, elements: Vec<HeapId>) -> HeapId {
        self.allocate(HeapData::List(elements))
    }

    pub fn expression(&mut self, elements: Vec<HeapId>) -> HeapId {
        self.allocate(HeapData::Expression(elements))
    }

    /// Builds a list carrying a `names` attribute.
    pub fn named_list(&mut self, items: &[(&str, HeapId)]) -> HeapId {
        let list = self.list(items.iter().map(|&(_, value)| value).collect());
        let names: Vec<&str> = items.iter().map(|&(name, _)| name).collect();
        self.set_names(list, &names);
        list
    }

    /// Builds a proper pairlist; an empty one is `NULL`.
    pub fn pairlist(&mut self, items: &[(Option<&str>, HeapId)]) -> HeapId {
        self.cons_chain(items, HeapId::NULL, HeapData::Pairlist)
    }

    /// Builds a pairlist ending in `tail` instead of `NULL`.
    pub fn pairlist_with_tail(&mut self, items: &[(Option<&str>, HeapId)], tail: HeapId) -> HeapId {
        self.cons_chain(items, tail, HeapData::Pairlist)
    }

    /// Builds an unevaluated call of `function` with the given arguments.
    pub fn call(&mut self, function: HeapId, args: &[(Option<&str>, HeapId)]) -> HeapId {
        let args = self.pairlist(args);
        self.allocate(HeapData::Call(ConsCell::new(HeapId::NULL, function, args)))
    }

    /// Builds a `...` argument chain.
    pub fn dots(&mut self, items: &[(Option<&str>, HeapId)]) -> HeapId {
        self.cons_chain(items, HeapId::NULL, HeapData::Dots)
    }

    fn cons_chain(
        &mut self,
        items: &[(Option<&str>, HeapId)],
        tail: HeapId,
        make: fn(ConsCell) -> HeapData,
    ) -> HeapId {
        let mut next = tail;
        for &(name, value) in items.iter().rev() {
            let tag = name.map_or(HeapId::NULL, |name| self.install(name));
            next = self.allocate(make(ConsCell::new(tag, value, next)));
        }
        next
    }

    /// Creates an empty environment whose bindings live on a frame pairlist.
    pub fn new_env(&mut self, enclos: HeapId) -> HeapId {
        self.allocate(HeapData::Environment(Environment {
            frame: HeapId::NULL,
            enclos,
            hashtab: HeapId::NULL,
        }))
    }

    /// Creates an empty environment whose bindings are spread over `buckets` hash buckets.
    pub fn new_hashed_env(&mut self, enclos: HeapId, buckets: usize) -> HeapId {
        let hashtab = self.list(vec![HeapId::NULL; buckets.max(1)]);
        self.allocate(HeapData::Environment(Environment {
            frame: HeapId::NULL,
            enclos,
            hashtab,
        }))
    }

    /// Creates a package namespace environment enclosed by the base environment.
    pub fn new_namespace(&mut self, package: &str) -> HeapId {
        let namespace = self.new_env(self.base_env);
        let info = self.new_env(self.base_env);
        let spec = self.character(&[package]);
        self.define(info, "spec", spec);
        self.define(namespace, NAMESPACE_MARKER, info);
        namespace
    }

    /// Binds `name` to `value` in the environment's own frame.
    ///
    /// An existing binding is overwritten in place; a new one is prepended to the
    /// frame (or to its hash bucket). Does nothing when `env` is not an environment.
    pub fn define(&mut self, env: HeapId, name: &str, value: HeapId) {
        self.define_binding(env, name, value, false);
    }

    /// Binds `name` to an accessor function that computes the value on access.
    pub fn define_active(&mut self, env: HeapId, name: &str, function: HeapId) {
        self.define_binding(env, name, function, true);
    }

    /// Leaves a binding slot in place but marks it unbound.
    pub fn unbind(&mut self, env: HeapId, name: &str) {
        let symbol = self.install(name);
        let unbound = self.unbound;
        if let Some(cell_id) = self.binding_cell(env, symbol)
            && let Some(cell) = self.entries[cell_id.index()].data.cons_cell_mut()
        {
            cell.car = unbound;
            cell.active = false;
        }
    }

    fn define_binding(&mut self, env: HeapId, name: &str, value: HeapId, active: bool) {
        let symbol = self.install(name);
        let Some(environment) = self.environment(env).copied() else {
            return;
        };
        if let Some(cell_id) = self.binding_cell(env, symbol) {
            if let Some(cell) = self.entries[cell_id.index()].data.cons_cell_mut() {
                cell.car = value;
                cell.active = active;
            }
            return;
        }

        let bucket = match self.data(environment.hashtab) {
            HeapData::List(buckets) => bucket_index(name, buckets.len()).map(|i| (i, buckets[i])),
            _ => None,
        };
        match bucket {
            Some((index, head)) => {
                let cell = self.allocate_binding(symbol, value, head, active);
                if let HeapData::List(buckets) = &mut self.entries[environment.hashtab.index()].data {
                    buckets[index] = cell;
                }
            }
            None => {
                let cell = self.allocate_binding(symbol, value, environment.frame, active);
                if let HeapData::Environment(environment) = &mut self.entries[env.index()].data {
                    environment.frame = cell;
                }
            }
        }
    }

    fn allocate_binding(&mut self, symbol: HeapId, value: HeapId, next: HeapId, active: bool) -> HeapId {
        let mut cell = ConsCell::new(symbol, value, next);
        cell.active = active;
        self.allocate(HeapData::Pairlist(cell))
    }

    pub fn closure(&mut self, formals: HeapId, body: HeapId, env: HeapId) -> HeapId {
        self.allocate(HeapData::Closure(Closure { formals, body, env }))
    }

    /// Creates an unforced promise of `code` in `env`.
    pub fn promise(&mut self, code: HeapId, env: HeapId) -> HeapId {
        let value = self.unbound;
        self.allocate(HeapData::Promise(Promise { value, code, env }))
    }

    /// Creates a promise that has already been forced to `value`.
    pub fn forced_promise(&mut self, value: HeapId, code: HeapId) -> HeapId {
        self.allocate(HeapData::Promise(Promise {
            value,
            code,
            env: HeapId::NULL,
        }))
    }

    pub fn external_pointer(&mut self, address: usize, prot: HeapId, tag: HeapId) -> HeapId {
        self.allocate(HeapData::ExternalPointer(ExternalPointer { address, prot, tag }))
    }

    pub fn bytecode(&mut self, code: HeapId, consts: HeapId) -> HeapId {
        self.allocate(HeapData::ByteCode(ByteCode {
            tag: HeapId::NULL,
            code,
            consts,
        }))
    }

    /// Creates a formal-class instance stored in the dedicated object kind.
    pub fn s4_object(&mut self, class: &str, package: Option<&str>) -> HeapId {
        let id = self.allocate(HeapData::S4 { tag: HeapId::NULL });
        self.set_s4_class(id, class, package);
        id
    }

    /// Creates a compact wrapper presenting itself as an `apparent` vector of `length`.
    pub fn compact(
        &mut self,
        apparent: Kind,
        length: usize,
        class: HeapId,
        data1: HeapId,
        data2: HeapId,
        elements: Vec<HeapId>,
    ) -> HeapResult<HeapId> {
        if !apparent.is_vector() || apparent == Kind::Char {
            return Err(HeapError::NotAVector { kind: apparent });
        }
        Ok(self.allocate(HeapData::Compact(Compact {
            apparent,
            length,
            class,
            data1,
            data2,
            elements,
        })))
    }

    /// Sets (or replaces) one attribute.
    ///
    /// Leaf strings cannot carry attributes; the call is ignored for them.
    pub fn set_attr(&mut self, id: HeapId, name: &str, value: HeapId) {
        if matches!(self.data(id), HeapData::Char(_)) {
            return;
        }
        let tag = self.install(name);
        let mut last = None;
        let mut cursor = self.entries[id.index()].attributes;
        while let Some(cell) = self.data(cursor).cons_cell() {
            let (cell_tag, next) = (cell.tag, cell.cdr);
            if cell_tag == tag {
                if let Some(cell) = self.entries[cursor.index()].data.cons_cell_mut() {
                    cell.car = value;
                }
                return;
            }
            last = Some(cursor);
            cursor = next;
        }
        let cell = self.allocate(HeapData::Pairlist(ConsCell::new(tag, value, HeapId::NULL)));
        match last {
            Some(last) => {
                if let Some(last) = self.entries[last.index()].data.cons_cell_mut() {
                    last.cdr = cell;
                }
            }
            None => self.entries[id.index()].attributes = cell,
        }
    }

    pub fn set_names(&mut self, id: HeapId, names: &[&str]) {
        let names = self.character(names);
        self.set_attr(id, "names", names);
    }

    pub fn set_dim(&mut self, id: HeapId, dims: &[i32]) {
        let dims = self.integer(dims.to_vec());
        self.set_attr(id, "dim", dims);
    }

    /// Tags a value with informal class names.
    pub fn set_class(&mut self, id: HeapId, classes: &[&str]) {
        let classes = self.character(classes);
        self.set_attr(id, "class", classes);
    }

    /// Marks a value as an instance of a formal class defined in `package`.
    pub fn set_s4_class(&mut self, id: HeapId, class: &str, package: Option<&str>) {
        let class = self.character(&[class]);
        if let Some(package) = package {
            let package = self.character(&[package]);
            self.set_attr(class, "package", package);
        }
        self.set_attr(id, "class", class);
        self.entries[id.index()].s4 = true;
    }

    /// Records the host's sharing count for a value.
    pub fn set_named(&mut self, id: HeapId, named: u8) {
        self.entries[id.index()].named = named;
    }
}

/// Picks the hash bucket for a binding name, `None` for an empty table.
fn bucket_index(name: &str, buckets: usize) -> Option<usize> {
    if buckets == 0 {
        return None;
    }
    Some(pjw_hash(name) as usize % buckets)
}

/// The PJW string hash the runtime uses to place bindings in buckets.
fn pjw_hash(name: &str) -> u32 {
    let mut h: u32 = 0;
    for &byte in name.as_bytes() {
        h = (h << 4).wrapping_add(u32::from(byte));
        let g = h & 0xf000_0000;
        if g != 0 {
            h ^= g >> 24;
            h ^= g;
        }
    }
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singletons_exist_from_the_start() {
        let heap = Heap::new();
        assert_eq!(heap.kind_of(HeapId::NULL), Kind::Null);
        assert_eq!(heap.kind_of(heap.global_env()), Kind::Environment);
        assert_eq!(heap.environment(heap.global_env()).map(|e| e.enclos), Some(heap.base_env()));
        assert_eq!(heap.environment(heap.base_env()).map(|e| e.enclos), Some(heap.empty_env()));
        assert_ne!(heap.unbound(), heap.missing_arg());
    }

    #[test]
    fn symbols_and_strings_are_interned() {
        let mut heap = Heap::new();
        assert_eq!(heap.install("x"), heap.install("x"));
        assert_eq!(heap.mk_char("x"), heap.mk_char("x"));
        assert_ne!(heap.install("x"), heap.mk_char("x"));
    }

    #[test]
    fn define_overwrites_in_place() {
        let mut heap = Heap::new();
        let env = heap.new_env(heap.global_env());
        let one = heap.integer(vec![1]);
        let two = heap.integer(vec![2]);
        heap.define(env, "x", one);
        heap.define(env, "x", two);
        let bindings = heap.bindings(env);
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].value, two);
    }

    #[test]
    fn hashed_lookup_finds_every_binding() {
        let mut heap = Heap::new();
        let env = heap.new_hashed_env(heap.global_env(), 3);
        let value = heap.integer(vec![1]);
        for name in ["alpha", "beta", "gamma", "delta"] {
            heap.define(env, name, value);
        }
        for name in ["alpha", "beta", "gamma", "delta"] {
            let symbol = heap.install(name);
            assert_eq!(heap.lookup_binding(env, symbol).map(|b| b.value), Some(value), "{name}");
        }
        assert_eq!(heap.length_of(env), 4);
    }

    #[test]
    fn find_var_walks_enclosures() {
        let mut heap = Heap::new();
        let outer = heap.new_env(heap.global_env());
        let inner = heap.new_env(outer);
        let value = heap.double(vec![1.0]);
        heap.define(outer, "x", value);
        let x = heap.install("x");
        assert_eq!(heap.find_var(x, inner), Some(value));
        heap.unbind(outer, "x");
        assert_eq!(heap.find_var(x, inner), None);
    }

    #[test]
    fn force_if_lazy_follows_symbol_promises() {
        let mut heap = Heap::new();
        let env = heap.new_env(heap.global_env());
        let value = heap.double(vec![1.0]);
        heap.define(env, "x", value);
        let x = heap.install("x");
        let first = heap.promise(x, env);
        heap.define(env, "y", first);
        let y = heap.install("y");
        let second = heap.promise(y, env);
        assert_eq!(heap.force_if_lazy(second), value);

        let call = heap.call(x, &[]);
        let opaque = heap.promise(call, env);
        assert_eq!(heap.force_if_lazy(opaque), opaque);
    }

    #[test]
    fn attributes_are_replaced_by_name() {
        let mut heap = Heap::new();
        let x = heap.double(vec![1.0, 2.0]);
        heap.set_names(x, &["a", "b"]);
        heap.set_names(x, &["c", "d"]);
        assert_eq!(heap.names(x), vec![Some("c"), Some("d")]);
        assert_eq!(heap.length_of(heap.attributes_of(x).unwrap_or(HeapId::NULL)), 1);
    }

    #[test]
    fn leaf_strings_ignore_attributes() {
        let mut heap = Heap::new();
        let leaf = heap.mk_char("a");
        heap.set_names(leaf, &["n"]);
        assert_eq!(heap.attributes_of(leaf), None);
    }

    #[test]
    fn namespaces_are_recognized() {
        let mut heap = Heap::new();
        let namespace = heap.new_namespace("pkg");
        let plain = heap.new_env(heap.global_env());
        assert_eq!(heap.recognized_environment_class(namespace, &[]), EnvClass::Namespace);
        assert_eq!(heap.recognized_environment_class(plain, &[]), EnvClass::None);
        assert_eq!(heap.recognized_environment_class(plain, &[plain]), EnvClass::Sentinel);
        assert_eq!(heap.recognized_environment_class(HeapId::NULL, &[HeapId::NULL]), EnvClass::None);
    }

    #[test]
    fn unbound_marker_binding_is_not_a_namespace() {
        let mut heap = Heap::new();
        let namespace = heap.new_namespace("pkg");
        heap.unbind(namespace, NAMESPACE_MARKER);
        assert!(!heap.is_namespace(namespace));
        assert_eq!(heap.recognized_environment_class(namespace, &[]), EnvClass::None);
    }

    #[test]
    fn snapshot_lists_every_slot() {
        let mut heap = Heap::new();
        heap.double(vec![1.0]);
        let snapshot = serde_json::to_value(&heap).unwrap();
        assert_eq!(snapshot["entries"].as_array().map(Vec::len), Some(heap.len()));
    }
}
