//! Target Sequence Adapter
//!
//! The reconcilers mutate an ordered sequence of nodes they do not own: a
//! platform tree, a terminal buffer, whatever the embedder renders into.
//! This module defines the narrow trait they reach it through, plus an
//! in-memory reference implementation used by the test suite and by
//! embedders without a real platform tree.
//!
//! # Contract
//!
//! Nodes are opaque, cheaply cloneable identifiers. The adapter must
//! preserve node identity across `extract_range` + `insert_after` (a moved
//! node is the same node afterwards), and `next_sibling` must reflect every
//! prior mutation immediately.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Debug;
use std::rc::Rc;

/// The boundary between the reconcilers and the embedder's node sequence.
pub trait Adapter: Clone + 'static {
    /// An opaque handle to one node in the target sequence.
    type Node: Clone + PartialEq + Debug + 'static;

    /// Create a detached placeholder node with no visible representation.
    fn create_marker(&self) -> Self::Node;

    /// The node immediately after `node`, if any.
    fn next_sibling(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Insert `nodes`, in order, immediately after `anchor`.
    fn insert_after(&self, anchor: &Self::Node, nodes: &[Self::Node]);

    /// Detach and return the inclusive range `start..=end`, preserving node
    /// identity and order.
    fn extract_range(&self, start: &Self::Node, end: &Self::Node) -> Vec<Self::Node>;

    /// Detach a single node from the sequence.
    fn remove(&self, node: &Self::Node);

    /// Register a hook to run when `node` is disposed, replacing any
    /// previous hook.
    fn on_remove(&self, node: &Self::Node, hook: Box<dyn FnOnce()>);

    /// Run and clear the node's disposal hook, if one is registered.
    fn dispose(&self, node: &Self::Node);
}

/// Opaque identifier for a node in a [`MemorySequence`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeId(u64);

struct SequenceState {
    /// Attached nodes, in sequence order.
    order: Vec<NodeId>,
    next_id: u64,
    hooks: HashMap<NodeId, Box<dyn FnOnce()>>,
}

impl SequenceState {
    fn position(&self, node: &NodeId) -> usize {
        self.order
            .iter()
            .position(|n| n == node)
            .expect("node is attached to the sequence")
    }

    fn allocate(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }
}

/// An in-memory adapter: a flat ordered sequence of opaque node ids.
///
/// Created with a single attached anchor node; everything else starts
/// detached. Handles are `Clone` and share the same sequence.
#[derive(Clone)]
pub struct MemorySequence {
    state: Rc<RefCell<SequenceState>>,
    anchor: NodeId,
}

impl MemorySequence {
    pub fn new() -> Self {
        let anchor = NodeId(0);
        Self {
            state: Rc::new(RefCell::new(SequenceState {
                order: vec![anchor],
                next_id: 1,
                hooks: HashMap::new(),
            })),
            anchor,
        }
    }

    /// The anchor node the sequence was created with.
    pub fn anchor(&self) -> NodeId {
        self.anchor
    }

    /// Allocate a detached node for content (as opposed to a marker).
    pub fn create_node(&self) -> NodeId {
        self.state.borrow_mut().allocate()
    }

    /// Snapshot of the attached nodes, in order.
    pub fn order(&self) -> Vec<NodeId> {
        self.state.borrow().order.clone()
    }
}

impl Default for MemorySequence {
    fn default() -> Self {
        Self::new()
    }
}

impl Adapter for MemorySequence {
    type Node = NodeId;

    fn create_marker(&self) -> NodeId {
        self.state.borrow_mut().allocate()
    }

    fn next_sibling(&self, node: &NodeId) -> Option<NodeId> {
        let state = self.state.borrow();
        let pos = state.position(node);
        state.order.get(pos + 1).copied()
    }

    fn insert_after(&self, anchor: &NodeId, nodes: &[NodeId]) {
        let mut state = self.state.borrow_mut();
        let pos = state.position(anchor);
        for (offset, node) in nodes.iter().enumerate() {
            state.order.insert(pos + 1 + offset, *node);
        }
    }

    fn extract_range(&self, start: &NodeId, end: &NodeId) -> Vec<NodeId> {
        let mut state = self.state.borrow_mut();
        let start_pos = state.position(start);
        let end_pos = state.position(end);
        state.order.drain(start_pos..=end_pos).collect()
    }

    fn remove(&self, node: &NodeId) {
        let mut state = self.state.borrow_mut();
        if let Some(pos) = state.order.iter().position(|n| n == node) {
            state.order.remove(pos);
        }
    }

    fn on_remove(&self, node: &NodeId, hook: Box<dyn FnOnce()>) {
        self.state.borrow_mut().hooks.insert(*node, hook);
    }

    fn dispose(&self, node: &NodeId) {
        // Take the hook out before calling it so a hook that mutates the
        // sequence can re-borrow.
        let hook = self.state.borrow_mut().hooks.remove(node);
        if let Some(hook) = hook {
            hook();
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
