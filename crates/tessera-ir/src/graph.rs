//! # Value Graph
//!
//! The graph owns every node of one compilation unit. Nodes live in an arena and
//! are referred to by [`NodeId`]. Ids are stable: replacing a node rebinds the
//! input edges of its usages, it never moves or renumbers anything.
//!
//! ## Key Components
//!
//! *   [`Graph`]: the arena, the uniquing table and the list of roots.
//! *   [`Node`]: one slot, holding the [`NodeKind`], its [`Stamp`] and the reverse
//!     usage edges.
//! *   [`NodeKey`]: the structural key used for uniquing. Two requests with the
//!     same key return the same node.
//!
//! Parameters and returns are pinned: they are never swept as dead. Constants
//! and compression nodes float and disappear once nothing uses them.

use std::fmt;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::constant::Constant;
use crate::encoding::CompressEncoding;
use crate::error::{CompressionError, IrResult};
use crate::node::{compression_stamp, CompressionNode, CompressionOp};
use crate::stamp::Stamp;

/// Unique identifier for a node within a specific [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// The `index`-th incoming value of the compilation unit.
    Parameter { index: u32 },
    Constant(Constant),
    Compression(CompressionNode),
    /// Consumes a value as a result of the compilation unit. Roots the graph.
    Return { value: NodeId },
}

impl NodeKind {
    /// The value inputs of this node, in port order.
    pub fn inputs(&self) -> impl Iterator<Item = NodeId> {
        let input = match self {
            NodeKind::Compression(node) => Some(node.input()),
            NodeKind::Return { value } => Some(*value),
            NodeKind::Parameter { .. } | NodeKind::Constant(_) => None,
        };
        input.into_iter()
    }

    fn replace_input(&mut self, old: NodeId, new: NodeId) {
        match self {
            NodeKind::Compression(node) => node.replace_input(old, new),
            NodeKind::Return { value } => {
                if *value == old {
                    *value = new;
                }
            }
            NodeKind::Parameter { .. } | NodeKind::Constant(_) => {}
        }
    }

    /// Floating nodes have no identity beyond their inputs and can be swept.
    fn is_floating(&self) -> bool {
        matches!(self, NodeKind::Constant(_) | NodeKind::Compression(_))
    }
}

/// Structural identity of a value-numberable node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKey {
    Parameter(u32),
    /// The same constant may be typed with different stamps.
    Constant(Constant, Stamp),
    /// The stamp is a function of the node, so it is not part of the key.
    Compression(CompressionNode),
}

impl NodeKey {
    fn of(kind: &NodeKind, stamp: &Stamp) -> Option<NodeKey> {
        match kind {
            NodeKind::Parameter { index } => Some(NodeKey::Parameter(*index)),
            NodeKind::Constant(constant) => Some(NodeKey::Constant(constant.clone(), stamp.clone())),
            NodeKind::Compression(node) => Some(NodeKey::Compression(*node)),
            NodeKind::Return { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    /// Fixed when the node is created.
    pub stamp: Stamp,
    usages: Vec<NodeId>,
}

impl Node {
    /// Nodes consuming this node's value. A node appears once per input edge.
    pub fn usages(&self) -> &[NodeId] {
        &self.usages
    }
}

#[derive(Debug, Clone, Default)]
pub struct Graph {
    /// Name of the compilation unit, used for diagnostics and symbol names.
    pub name: String,
    nodes: Vec<Option<Node>>,
    cache: FxHashMap<NodeKey, NodeId>,
    roots: Vec<NodeId>,
}

impl Graph {
    pub fn new(name: impl Into<String>) -> Self {
        Graph { name: name.into(), ..Default::default() }
    }

    // --- Construction ---

    /// Returns the node with the same structure as `kind`, or inserts a new one.
    pub fn unique(&mut self, kind: NodeKind, stamp: Stamp) -> IrResult<NodeId> {
        match NodeKey::of(&kind, &stamp) {
            Some(key) => {
                if let Some(existing) = self.cache.get(&key) {
                    log::trace!("{}: reusing {} for {:?}", self.name, existing, key);
                    return Ok(*existing);
                }
                let id = self.add_node(kind, stamp)?;
                log::trace!("{}: created {} for {:?}", self.name, id, key);
                self.cache.insert(key, id);
                Ok(id)
            }
            None => self.add_node(kind, stamp),
        }
    }

    /// Each index names one parameter; asking for it with another stamp is a defect.
    pub fn parameter(&mut self, index: u32, stamp: Stamp) -> IrResult<NodeId> {
        if let Some(existing) = self.cache.get(&NodeKey::Parameter(index)).copied() {
            let existing_stamp = self.stamp(existing)?;
            if *existing_stamp != stamp {
                return Err(CompressionError::ParameterStampMismatch {
                    index,
                    existing: existing_stamp.clone(),
                    requested: stamp,
                });
            }
            return Ok(existing);
        }
        self.unique(NodeKind::Parameter { index }, stamp)
    }

    pub fn constant(&mut self, constant: Constant, stamp: Stamp) -> IrResult<NodeId> {
        self.unique(NodeKind::Constant(constant), stamp)
    }

    pub fn compress(&mut self, input: NodeId, encoding: CompressEncoding) -> IrResult<NodeId> {
        self.compression(CompressionOp::Compress, input, encoding)
    }

    pub fn uncompress(&mut self, input: NodeId, encoding: CompressEncoding) -> IrResult<NodeId> {
        self.compression(CompressionOp::Uncompress, input, encoding)
    }

    /// Computes the stamp for the requested shape, then asks the uniquing table.
    pub fn compression(&mut self, op: CompressionOp, input: NodeId, encoding: CompressEncoding) -> IrResult<NodeId> {
        let stamp = compression_stamp(op, self.stamp(input)?, encoding)?;
        self.unique(NodeKind::Compression(CompressionNode::new(op, input, encoding)), stamp)
    }

    /// Adds a return of `value` and pins it as a root of the graph.
    pub fn add_return(&mut self, value: NodeId) -> IrResult<NodeId> {
        let id = self.add_node(NodeKind::Return { value }, Stamp::Void)?;
        self.roots.push(id);
        Ok(id)
    }

    fn add_node(&mut self, kind: NodeKind, stamp: Stamp) -> IrResult<NodeId> {
        let id = NodeId(self.nodes.len() as u32);
        assert!(id.0 < u32::MAX, "Graph NodeId overflow for {}", self.name);
        for input in kind.inputs() {
            self.node_mut(input)?.usages.push(id);
        }
        self.nodes.push(Some(Node { kind, stamp, usages: Vec::new() }));
        Ok(id)
    }

    // --- Queries ---

    pub fn node(&self, id: NodeId) -> IrResult<&Node> {
        self.nodes
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .ok_or(CompressionError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> IrResult<&mut Node> {
        self.nodes
            .get_mut(id.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(CompressionError::UnknownNode(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_ok()
    }

    pub fn stamp(&self, id: NodeId) -> IrResult<&Stamp> {
        Ok(&self.node(id)?.stamp)
    }

    pub fn is_constant(&self, id: NodeId) -> bool {
        self.as_constant(id).is_some()
    }

    pub fn as_constant(&self, id: NodeId) -> Option<&Constant> {
        match &self.node(id).ok()?.kind {
            NodeKind::Constant(constant) => Some(constant),
            _ => None,
        }
    }

    pub fn as_compression(&self, id: NodeId) -> Option<&CompressionNode> {
        match &self.node(id).ok()?.kind {
            NodeKind::Compression(node) => Some(node),
            _ => None,
        }
    }

    pub fn usages(&self, id: NodeId) -> IrResult<&[NodeId]> {
        Ok(self.node(id)?.usages())
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Parameter nodes ordered by index.
    pub fn parameters(&self) -> Vec<(u32, NodeId)> {
        let mut params: Vec<_> = self
            .live_nodes()
            .filter_map(|id| match self.node(id).ok()?.kind {
                NodeKind::Parameter { index } => Some((index, id)),
                _ => None,
            })
            .collect();
        params.sort();
        params
    }

    pub fn live_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(index, _)| NodeId(index as u32))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.is_some()).count()
    }

    /// The node registered in the uniquing table for the same structure as `id`,
    /// if that is a different node.
    pub fn find_duplicate(&self, id: NodeId) -> Option<NodeId> {
        let node = self.node(id).ok()?;
        let key = NodeKey::of(&node.kind, &node.stamp)?;
        self.cache.get(&key).copied().filter(|existing| *existing != id)
    }

    /// Live nodes reachable from the roots, every node after its inputs.
    pub fn schedule(&self) -> IrResult<Vec<NodeId>> {
        let mut order = Vec::new();
        let mut visited = FxHashSet::default();
        // (node, inputs already pushed)
        let mut stack: Vec<(NodeId, bool)> = self.roots.iter().rev().map(|root| (*root, false)).collect();

        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            if !visited.insert(id) {
                continue;
            }
            stack.push((id, true));
            for input in self.node(id)?.kind.inputs() {
                if !visited.contains(&input) {
                    stack.push((input, false));
                }
            }
        }
        Ok(order)
    }

    // --- Rewriting ---

    /// Rebinds every input edge pointing at `old` to `new`.
    ///
    /// Returns the nodes whose inputs changed. `old` keeps existing with no
    /// usages until dead nodes are swept.
    pub fn replace_at_usages(&mut self, old: NodeId, new: NodeId) -> IrResult<Vec<NodeId>> {
        if old == new {
            return Ok(Vec::new());
        }
        self.node(new)?;
        let usages = std::mem::take(&mut self.node_mut(old)?.usages);

        let mut touched = Vec::new();
        for user in &usages {
            if !touched.contains(user) {
                touched.push(*user);
            }
        }
        for user in &touched {
            self.uncache(*user)?;
            self.node_mut(*user)?.kind.replace_input(old, new);
            self.recache(*user)?;
        }
        self.node_mut(new)?.usages.extend(usages);
        log::trace!("{}: replaced {} with {} at {} usage(s)", self.name, old, new, touched.len());
        Ok(touched)
    }

    fn uncache(&mut self, id: NodeId) -> IrResult<()> {
        let node = self.node(id)?;
        if let Some(key) = NodeKey::of(&node.kind, &node.stamp) {
            if self.cache.get(&key) == Some(&id) {
                self.cache.remove(&key);
            }
        }
        Ok(())
    }

    /// Re-registers `id` under its current key unless another node holds it;
    /// in that case [`Graph::find_duplicate`] reports the survivor.
    fn recache(&mut self, id: NodeId) -> IrResult<()> {
        let node = self.node(id)?;
        if let Some(key) = NodeKey::of(&node.kind, &node.stamp) {
            self.cache.entry(key).or_insert(id);
        }
        Ok(())
    }

    /// Deletes floating nodes that have no usages, transitively.
    /// Returns the number of nodes removed.
    pub fn remove_dead_nodes(&mut self) -> usize {
        let mut worklist: Vec<NodeId> = self.live_nodes().collect();
        let mut removed = 0;

        while let Some(id) = worklist.pop() {
            let Ok(node) = self.node(id) else { continue };
            if !node.kind.is_floating() || !node.usages.is_empty() {
                continue;
            }
            let _ = self.uncache(id);
            let Some(node) = self.nodes[id.0 as usize].take() else { continue };
            for input in node.kind.inputs() {
                if let Ok(input_node) = self.node_mut(input) {
                    if let Some(pos) = input_node.usages.iter().position(|user| *user == id) {
                        input_node.usages.swap_remove(pos);
                    }
                    worklist.push(input);
                }
            }
            removed += 1;
        }
        if removed > 0 {
            log::debug!("{}: removed {} dead node(s)", self.name, removed);
        }
        removed
    }
}
