//! Canonicalization for the value graph.
//!
//! Node kinds implement [`Canonicalizable`] and report what should replace them.
//! The [`Canonicalizer`] owns the fixed-point loop: it applies replacements to
//! the graph, revisits the usages of every rewritten node, and finally sweeps
//! the nodes nothing uses anymore.

use std::collections::VecDeque;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::error::{CompressionError, IrResult};
use crate::graph::{Graph, NodeId, NodeKind};

/// Outcome of offering a node to its canonicalization rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteResult {
    /// The node is already canonical.
    Unchanged,
    /// Every usage of the node should use this node instead.
    Replace(NodeId),
}

pub trait Canonicalizable {
    /// Computes the canonical replacement for the node `id`.
    ///
    /// May add nodes to the graph (e.g. folded constants) but must not rewire
    /// existing edges; the driver does that.
    fn canonical(&self, id: NodeId, graph: &mut Graph) -> IrResult<RewriteResult>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanonicalizerConfig {
    /// Upper bound on the number of rewrites applied before giving up.
    /// Nodes that are already canonical do not count.
    pub max_rewrites: usize,
    /// Sweep unused floating nodes once the fixed point is reached.
    pub remove_dead_nodes: bool,
}

impl Default for CanonicalizerConfig {
    fn default() -> Self {
        CanonicalizerConfig { max_rewrites: 100_000, remove_dead_nodes: true }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CanonicalizeStats {
    /// Number of replacements applied.
    pub rewrites: usize,
    /// Number of dead nodes removed afterwards.
    pub removed: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Canonicalizer {
    config: CanonicalizerConfig,
}

impl Canonicalizer {
    pub fn new(config: CanonicalizerConfig) -> Self {
        Canonicalizer { config }
    }

    /// Runs canonicalization on `graph` until no rule applies.
    pub fn apply(&self, graph: &mut Graph) -> IrResult<CanonicalizeStats> {
        log::debug!("canonicalizing {} ({} nodes)", graph.name, graph.node_count());

        let mut stats = CanonicalizeStats::default();
        let mut worklist: VecDeque<NodeId> = graph.live_nodes().collect();
        let mut queued: FxHashSet<NodeId> = worklist.iter().copied().collect();

        while let Some(id) = worklist.pop_front() {
            queued.remove(&id);
            if !graph.contains(id) {
                continue;
            }
            let RewriteResult::Replace(replacement) = canonicalize_node(graph, id)? else {
                continue;
            };
            if replacement == id {
                continue;
            }
            if stats.rewrites >= self.config.max_rewrites {
                log::warn!("{}: canonicalizer gave up after {} rewrites", graph.name, stats.rewrites);
                return Err(CompressionError::NoFixedPoint { rewrites: stats.rewrites });
            }

            log::trace!("{}: {} -> {}", graph.name, id, replacement);
            let touched = graph.replace_at_usages(id, replacement)?;
            stats.rewrites += 1;
            for node in touched.into_iter().chain(std::iter::once(replacement)) {
                if queued.insert(node) {
                    worklist.push_back(node);
                }
            }
        }

        if self.config.remove_dead_nodes {
            stats.removed = graph.remove_dead_nodes();
        }
        log::debug!(
            "canonicalized {}: {} rewrite(s), {} node(s) removed",
            graph.name,
            stats.rewrites,
            stats.removed
        );
        Ok(stats)
    }
}

/// Offers one node to its rule, then to global value numbering.
fn canonicalize_node(graph: &mut Graph, id: NodeId) -> IrResult<RewriteResult> {
    let node = graph.node(id)?;
    if node.usages().is_empty() {
        // Nothing to rewire; dead nodes are left to the sweep.
        return Ok(RewriteResult::Unchanged);
    }
    let compression = match &node.kind {
        NodeKind::Compression(compression) => Some(*compression),
        NodeKind::Parameter { .. } | NodeKind::Constant(_) | NodeKind::Return { .. } => None,
    };
    let result = match compression {
        Some(compression) => compression.canonical(id, graph)?,
        None => RewriteResult::Unchanged,
    };
    if result != RewriteResult::Unchanged {
        return Ok(result);
    }
    Ok(graph.find_duplicate(id).map_or(RewriteResult::Unchanged, RewriteResult::Replace))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::CompressEncoding;
    use crate::stamp::Stamp;

    #[test]
    fn rewrite_budget_is_enforced() -> IrResult<()> {
        let mut graph = Graph::new("budget");
        let encoding = CompressEncoding::new(0, 0);
        for index in 0..2 {
            let p = graph.parameter(index, Stamp::integer(64))?;
            let c = graph.compress(p, encoding)?;
            let u = graph.uncompress(c, encoding)?;
            graph.add_return(u)?;
        }

        let config = CanonicalizerConfig { max_rewrites: 1, remove_dead_nodes: true };
        let err = Canonicalizer::new(config).apply(&mut graph).unwrap_err();
        assert_eq!(err, CompressionError::NoFixedPoint { rewrites: 1 });
        Ok(())
    }

    #[test]
    fn canonical_graph_larger_than_the_budget_converges() -> IrResult<()> {
        let mut graph = Graph::new("wide");
        for index in 0..10 {
            let p = graph.parameter(index, Stamp::integer(64))?;
            graph.add_return(p)?;
        }

        let config = CanonicalizerConfig { max_rewrites: 5, remove_dead_nodes: true };
        let stats = Canonicalizer::new(config).apply(&mut graph)?;
        assert_eq!(stats, CanonicalizeStats::default());
        assert_eq!(graph.node_count(), 20);
        Ok(())
    }

    #[test]
    fn unused_nodes_are_not_rewritten() -> IrResult<()> {
        let mut graph = Graph::new("unused");
        let p = graph.parameter(0, Stamp::integer(64))?;
        let encoding = CompressEncoding::new(0, 0);
        let c = graph.compress(p, encoding)?;
        let _u = graph.uncompress(c, encoding)?;

        let config = CanonicalizerConfig { remove_dead_nodes: false, ..Default::default() };
        let stats = Canonicalizer::new(config).apply(&mut graph)?;
        assert_eq!(stats, CanonicalizeStats::default());
        assert_eq!(graph.node_count(), 3);
        Ok(())
    }
}
