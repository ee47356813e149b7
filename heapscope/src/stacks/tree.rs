//! Prefix-shared tree of interned call stacks.

use std::collections::HashMap;

use crate::domain::types::{FrameId, TraceIndex};

#[derive(Debug, Clone, Copy)]
struct Node {
    frame_id: FrameId,
    parent_index: TraceIndex,
}

/// Interned tree of `(parent_index, frame_id)` nodes.
///
/// A whole call stack maps to the index of its topmost node; stacks that
/// share a prefix share the prefix's node chain. Index `0` is the empty
/// trace and has no node record, so node `i` lives at `nodes[i - 1]`.
/// The tree is append-only: an index, once returned, stays valid and
/// keeps its meaning for the life of the tree.
pub struct FrameTree {
    nodes: Vec<Node>,
    children: HashMap<(TraceIndex, FrameId), TraceIndex>,
}

impl FrameTree {
    #[must_use]
    pub fn new() -> Self {
        Self { nodes: Vec::new(), children: HashMap::new() }
    }

    /// Fold a root-to-top frame sequence into its trace index, creating
    /// any missing nodes along the way.
    pub fn get_trace_index(&mut self, stack: &[FrameId]) -> TraceIndex {
        let mut current = TraceIndex::ROOT;
        for &frame_id in stack {
            current = match self.children.get(&(current, frame_id)) {
                Some(&index) => index,
                None => {
                    self.nodes.push(Node { frame_id, parent_index: current });
                    let index = TraceIndex(self.nodes.len());
                    self.children.insert((current, frame_id), index);
                    index
                }
            };
        }
        current
    }

    /// Reverse walk: the frame at `index` and the index of its parent.
    /// Returns `None` for the empty trace and for indices never handed out.
    #[must_use]
    pub fn next_node(&self, index: TraceIndex) -> Option<(FrameId, TraceIndex)> {
        if index.is_root() {
            return None;
        }
        let node = self.nodes.get(index.0 - 1)?;
        Some((node.frame_id, node.parent_index))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Default for FrameTree {
    fn default() -> Self {
        Self::new()
    }
}
