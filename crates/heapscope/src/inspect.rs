//! Structural snapshots of a value's internal representation.
//!
//! [`inspect`] walks the graph below one root and builds a tree of
//! [`InspectionNode`]s, one per value reached. Every value gets a sequential id
//! the first time it is seen; later encounters produce a childless marker that
//! points back at that id, so cycles terminate and sharing stays visible.
//!
//! The walk uses an explicit stack of partially built nodes. Children are
//! opened lazily, one at a time, so ids are assigned in pre-order.

use std::fmt;

use serde::Serialize;
use smallvec::SmallVec;

use crate::{
    error::Warning,
    heap::{Heap, HeapData, HeapId},
    identity::{Identity, SeenMap},
    kind::Kind,
    tracer::{NoopTracer, WalkTracer},
};

/// Depth used by [`InspectOptions::default`].
pub const DEFAULT_MAX_DEPTH: i64 = 5;

/// Which internal representations the inspector exposes.
///
/// Every toggle defaults to off. Toggles change which children are produced,
/// never the metadata of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, serde::Deserialize)]
#[expect(clippy::struct_excessive_bools, reason = "one independent toggle per representation")]
pub struct Expand {
    /// Show the class and backing payloads of compact wrappers instead of their
    /// apparent vector.
    pub compact: bool,
    /// Expand the leaf strings of character vectors.
    pub leaf_strings: bool,
    /// Show the frame, hash table and enclosure of environments instead of their
    /// bindings by name.
    pub raw_environment_frames: bool,
    /// Expand the cells of unevaluated calls; when off they are flagged skipped.
    pub unevaluated_calls: bool,
    /// Expand the tag, code and constants of byte-code.
    pub byte_code: bool,
}

impl Expand {
    /// Nothing expanded.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            compact: false,
            leaf_strings: false,
            raw_environment_frames: false,
            unevaluated_calls: false,
            byte_code: false,
        }
    }

    /// Everything expanded.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            compact: true,
            leaf_strings: true,
            raw_environment_frames: true,
            unevaluated_calls: true,
            byte_code: true,
        }
    }

    #[must_use]
    pub const fn compact(mut self, on: bool) -> Self {
        self.compact = on;
        self
    }

    #[must_use]
    pub const fn leaf_strings(mut self, on: bool) -> Self {
        self.leaf_strings = on;
        self
    }

    #[must_use]
    pub const fn raw_environment_frames(mut self, on: bool) -> Self {
        self.raw_environment_frames = on;
        self
    }

    #[must_use]
    pub const fn unevaluated_calls(mut self, on: bool) -> Self {
        self.unevaluated_calls = on;
        self
    }

    #[must_use]
    pub const fn byte_code(mut self, on: bool) -> Self {
        self.byte_code = on;
        self
    }
}

/// Configuration for one inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectOptions {
    /// Levels below the root that are expanded. Zero or less expands nothing.
    pub max_depth: i64,
    pub expand: Expand,
    /// Environments shown as opaque in addition to the runtime's own.
    pub sentinel_envs: Vec<HeapId>,
}

impl Default for InspectOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            expand: Expand::none(),
            sentinel_envs: Vec::new(),
        }
    }
}

impl InspectOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how many levels below the root are expanded.
    #[must_use]
    pub const fn max_depth(mut self, depth: i64) -> Self {
        self.max_depth = depth;
        self
    }

    /// Expands every level.
    #[must_use]
    pub const fn unbounded(mut self) -> Self {
        self.max_depth = i64::MAX;
        self
    }

    #[must_use]
    pub const fn expand(mut self, expand: Expand) -> Self {
        self.expand = expand;
        self
    }

    /// Sets the environments shown without their bindings.
    #[must_use]
    pub fn sentinel_envs(mut self, envs: Vec<HeapId>) -> Self {
        self.sentinel_envs = envs;
        self
    }
}

/// Boolean facts about an inspected value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[expect(clippy::struct_excessive_bools, reason = "flags are reported independently")]
pub struct NodeFlags {
    pub has_attributes: bool,
    pub is_compact: bool,
    /// The value already has a node elsewhere in the tree; this one is a marker.
    pub previously_seen: bool,
    /// The value has children that were not expanded.
    pub skipped: bool,
    /// The value is the accessor function of an active binding.
    pub active_binding: bool,
}

/// One value in an inspection tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InspectionNode {
    /// Sequential id, 1 for the root. Markers repeat the id of the first node.
    pub id: usize,
    pub address: String,
    #[serde(serialize_with = "serialize_kind")]
    pub kind: Kind,
    pub length: usize,
    /// The host's approximate sharing count.
    pub sharing: u8,
    pub flags: NodeFlags,
    /// Symbol name, or the label of a recognized environment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub children: Vec<(Option<String>, InspectionNode)>,
}

#[expect(clippy::trivially_copy_pass_by_ref, reason = "serde hands fields over by reference")]
fn serialize_kind<S: serde::Serializer>(kind: &Kind, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(kind.name())
}

impl InspectionNode {
    /// Returns the child with the given name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Self> {
        self.children
            .iter()
            .find(|(child_name, _)| child_name.as_deref() == Some(name))
            .map(|(_, child)| child)
    }

    /// Number of nodes in the tree, markers included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter().map(|(_, child)| child));
        }
        count
    }

    fn write_header(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}:{}]", self.id, self.address)?;
        if self.flags.previously_seen {
            return Ok(());
        }
        write!(f, " <{} [{}]", self.kind, self.length)?;
        if self.flags.is_compact {
            f.write_str(", compact")?;
        }
        f.write_str(">")?;
        if let Some(value) = &self.value {
            write!(f, " {value}")?;
        }
        if self.flags.active_binding {
            f.write_str(" (active)")?;
        }
        if self.flags.skipped {
            f.write_str(" ...")?;
        }
        Ok(())
    }
}

/// Renders the tree one node per line:
///
/// ```text
/// [1:0x558120000268] <list [1]>
/// ├─x = [2:0x558120000150] <double [3]>
/// └─_attrib = [3:0x558120000230] <pairlist [1]>
///   └─names = [4:0x5581200001f8] <character [2]>
/// ```
impl fmt::Display for InspectionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_header(f)?;
        let mut stack: Vec<RenderFrame<'_>> = Vec::new();
        push_children(&mut stack, self, "");
        while let Some((name, node, prefix, last)) = stack.pop() {
            f.write_str("\n")?;
            f.write_str(&prefix)?;
            f.write_str(if last { "└─" } else { "├─" })?;
            if let Some(name) = name {
                write!(f, "{name} = ")?;
            }
            node.write_header(f)?;
            let prefix = format!("{prefix}{}", if last { "  " } else { "│ " });
            push_children(&mut stack, node, &prefix);
        }
        Ok(())
    }
}

type RenderFrame<'n> = (Option<&'n str>, &'n InspectionNode, String, bool);

fn push_children<'n>(stack: &mut Vec<RenderFrame<'n>>, node: &'n InspectionNode, prefix: &str) {
    let count = node.children.len();
    for (index, (name, child)) in node.children.iter().enumerate().rev() {
        stack.push((name.as_deref(), child, prefix.to_owned(), index + 1 == count));
    }
}

/// Inspects `root` with a fresh seen map and no tracer.
#[must_use]
pub fn inspect(heap: &Heap, root: HeapId, options: &InspectOptions) -> InspectionNode {
    Inspector::new(heap, options, NoopTracer).inspect(root)
}

/// A child waiting to be opened.
#[derive(Debug)]
struct Child {
    name: Option<String>,
    id: HeapId,
    active: bool,
}

impl Child {
    fn new(name: Option<String>, id: HeapId) -> Self {
        Self {
            name,
            id,
            active: false,
        }
    }

    fn named(name: &str, id: HeapId) -> Self {
        Self::new(Some(name.to_owned()), id)
    }
}

type Children = SmallVec<[Child; 4]>;

/// What a value contributes below its own node.
enum Expansion {
    Children(Children),
    /// Expansion is turned off for this kind.
    Skipped,
}

/// A node whose children are still being opened.
struct Frame {
    name: Option<String>,
    node: InspectionNode,
    pending: smallvec::IntoIter<[Child; 4]>,
    depth: i64,
}

/// Per-call inspection state.
///
/// Successive calls to [`Inspector::inspect`] share one seen map, so a value
/// shown under an earlier root appears as a marker under later ones.
#[derive(Debug)]
pub struct Inspector<'a, Tr: WalkTracer = NoopTracer> {
    heap: &'a Heap,
    options: &'a InspectOptions,
    seen: SeenMap,
    warnings: Vec<Warning>,
    tracer: Tr,
}

impl<'a, Tr: WalkTracer> Inspector<'a, Tr> {
    #[must_use]
    pub fn new(heap: &'a Heap, options: &'a InspectOptions, tracer: Tr) -> Self {
        Self {
            heap,
            options,
            seen: SeenMap::new(),
            warnings: Vec::new(),
            tracer,
        }
    }

    /// Builds the tree below `root`.
    pub fn inspect(&mut self, root: HeapId) -> InspectionNode {
        let depth = self.options.max_depth;
        let (node, pending) = self.open(root, depth, 0);
        if pending.is_empty() {
            return node;
        }
        let mut current = Frame {
            name: None,
            node,
            pending: pending.into_iter(),
            depth,
        };
        let mut ancestors: Vec<Frame> = Vec::new();

        loop {
            if let Some(child) = current.pending.next() {
                let depth = current.depth - 1;
                let (mut node, pending) = self.open(child.id, depth, ancestors.len() + 1);
                node.flags.active_binding = child.active;
                if pending.is_empty() {
                    current.node.children.push((child.name, node));
                } else {
                    let frame = Frame {
                        name: child.name,
                        node,
                        pending: pending.into_iter(),
                        depth,
                    };
                    ancestors.push(std::mem::replace(&mut current, frame));
                }
            } else {
                let Some(mut parent) = ancestors.pop() else {
                    return current.node;
                };
                parent.node.children.push((current.name, current.node));
                current = parent;
            }
        }
    }

    /// Warnings raised so far.
    #[must_use]
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Number of distinct values given an id so far.
    #[must_use]
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn tracer(&self) -> &Tr {
        &self.tracer
    }

    #[must_use]
    pub fn into_tracer(self) -> Tr {
        self.tracer
    }

    /// Builds the node for `id` and returns the children still to open.
    fn open(&mut self, id: HeapId, depth: i64, level: usize) -> (InspectionNode, Children) {
        let heap = self.heap;
        let kind = heap.kind_of(id);
        let (number, fresh) = self.seen.assign(id);
        let mut node = InspectionNode {
            id: number,
            address: Identity::of(id).to_string(),
            kind,
            length: heap.length_of(id),
            sharing: heap.approximate_sharing_count(id),
            flags: NodeFlags {
                has_attributes: kind != Kind::Char && heap.attributes_of(id).is_some(),
                is_compact: heap.is_compact(id),
                ..NodeFlags::default()
            },
            value: None,
            children: Vec::new(),
        };
        if !fresh {
            node.flags.previously_seen = true;
            self.tracer.on_shared(id);
            return (node, Children::new());
        }
        self.tracer.on_visit(id, kind, level);

        if let Some(name) = heap.symbol_name(id) {
            node.value = Some(name.to_owned());
        }
        let class = heap.recognized_environment_class(id, &self.options.sentinel_envs);
        if let Some(label) = class.label() {
            self.tracer.on_sentinel(id, class);
            node.value = Some(label.to_owned());
            return (node, Children::new());
        }

        match self.expansion(id) {
            Expansion::Skipped => {
                node.flags.skipped = true;
                (node, Children::new())
            }
            Expansion::Children(children) if depth <= 0 && !children.is_empty() => {
                node.flags.skipped = true;
                (node, Children::new())
            }
            Expansion::Children(children) => (node, children),
        }
    }

    /// Children of a value in display order, attributes last.
    fn expansion(&mut self, id: HeapId) -> Expansion {
        let heap = self.heap;
        let expand = self.options.expand;
        let mut children = Children::new();
        match heap.data(id) {
            HeapData::Null
            | HeapData::Builtin(_)
            | HeapData::Special(_)
            | HeapData::Logical(_)
            | HeapData::Integer(_)
            | HeapData::Double(_)
            | HeapData::Complex(_)
            | HeapData::Raw(_)
            | HeapData::Symbol(_) => {}
            // leaf strings never carry attributes
            HeapData::Char(_) => return Expansion::Children(children),
            HeapData::Character(elements) => {
                if expand.leaf_strings {
                    children.extend(elements.iter().map(|&elt| Child::new(None, elt)));
                }
            }
            HeapData::List(_) | HeapData::Expression(_) => self.push_elements(id, &mut children),
            HeapData::Call(_) if !expand.unevaluated_calls => return Expansion::Skipped,
            HeapData::Pairlist(_) | HeapData::Call(_) | HeapData::Dots(_) => {
                let mut chain = heap.chain(id);
                for (_, cell) in chain.by_ref() {
                    let name = heap.symbol_name(cell.tag).filter(|name| !name.is_empty());
                    children.push(Child::new(name.map(str::to_owned), cell.car));
                }
                let tail = chain.tail();
                if !tail.is_null() {
                    children.push(Child::named("_tail", tail));
                }
            }
            HeapData::Environment(env) => {
                if expand.raw_environment_frames {
                    children.push(Child::named("_frame", env.frame));
                    children.push(Child::named("_hashtab", env.hashtab));
                } else {
                    for binding in heap.bindings(id) {
                        let name = heap.symbol_name(binding.name).map(str::to_owned);
                        let value = if binding.active {
                            binding.value
                        } else {
                            heap.force_if_lazy(binding.value)
                        };
                        children.push(Child {
                            name,
                            id: value,
                            active: binding.active,
                        });
                    }
                }
                children.push(Child::named("_enclos", env.enclos));
            }
            HeapData::Closure(closure) => {
                children.push(Child::named("_formals", closure.formals));
                children.push(Child::named("_body", closure.body));
                children.push(Child::named("_env", closure.env));
            }
            HeapData::Promise(promise) => {
                children.push(Child::named("_value", promise.value));
                children.push(Child::named("_code", promise.code));
                children.push(Child::named("_env", promise.env));
            }
            HeapData::ExternalPointer(pointer) => {
                children.push(Child::named("_prot", pointer.prot));
                children.push(Child::named("_tag", pointer.tag));
            }
            HeapData::S4 { tag } => children.push(Child::named("_tag", *tag)),
            HeapData::ByteCode(code) => {
                if !expand.byte_code {
                    return Expansion::Skipped;
                }
                children.push(Child::named("_tag", code.tag));
                children.push(Child::named("_code", code.code));
                children.push(Child::named("_consts", code.consts));
            }
            HeapData::Compact(compact) => {
                if expand.compact {
                    children.push(Child::named("_class", compact.class));
                    children.push(Child::named("_data1", compact.data1));
                    children.push(Child::named("_data2", compact.data2));
                } else {
                    match compact.apparent {
                        Kind::Character if expand.leaf_strings => {
                            children.extend(compact.elements.iter().map(|&elt| Child::new(None, elt)));
                        }
                        Kind::List | Kind::Expression => self.push_elements(id, &mut children),
                        _ => {}
                    }
                }
            }
            HeapData::Any => {
                let warning = Warning::UnsupportedKind {
                    kind: Kind::Any,
                    address: Identity::of(id),
                };
                self.tracer.on_warning(&warning);
                self.warnings.push(warning);
                return Expansion::Children(children);
            }
        }

        if let Some(attributes) = heap.attributes_of(id) {
            children.push(Child::named("_attrib", attributes));
        }
        Expansion::Children(children)
    }

    /// Elements of a list, named from its `names` attribute.
    fn push_elements(&self, id: HeapId, children: &mut Children) {
        let names = self.heap.names(id);
        for (index, &elt) in self.heap.elements(id).iter().enumerate() {
            let name = names.get(index).copied().flatten().map(str::to_owned);
            children.push(Child::new(name, elt));
        }
    }
}

