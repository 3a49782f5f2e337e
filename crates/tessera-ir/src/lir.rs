//! Lowering of the value graph to a backend.
//!
//! The backend implements [`CompressionEmitter`]; [`LirGenerator`] walks the live
//! graph in dependency order, resolves operands and records one result per node.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::constant::Constant;
use crate::encoding::CompressEncoding;
use crate::error::{CompressionError, IrResult};
use crate::graph::{Graph, NodeId, NodeKind};
use crate::stamp::Stamp;

/// The code-generation contract a backend provides.
pub trait CompressionEmitter {
    /// Backend handle for a produced value.
    type Value: Copy + fmt::Debug;
    /// Backend failure; IR defects found during lowering convert into it.
    type Error: From<CompressionError>;

    fn emit_parameter(&mut self, index: u32, stamp: &Stamp) -> Result<Self::Value, Self::Error>;

    fn emit_constant(&mut self, constant: &Constant, stamp: &Stamp) -> Result<Self::Value, Self::Error>;

    fn emit_compress(&mut self, input: Self::Value, encoding: &CompressEncoding, non_null: bool) -> Self::Value;

    fn emit_uncompress(&mut self, input: Self::Value, encoding: &CompressEncoding, non_null: bool) -> Self::Value;
}

pub struct LirGenerator<E: CompressionEmitter> {
    emitter: E,
    results: FxHashMap<NodeId, E::Value>,
}

impl<E: CompressionEmitter> LirGenerator<E> {
    pub fn new(emitter: E) -> Self {
        LirGenerator { emitter, results: FxHashMap::default() }
    }

    /// The lowered value of `node`.
    pub fn operand(&self, node: NodeId) -> IrResult<E::Value> {
        self.results.get(&node).copied().ok_or(CompressionError::MissingOperand(node))
    }

    /// Records the lowered value of `node`. Each node is lowered once.
    pub fn set_result(&mut self, node: NodeId, value: E::Value) -> IrResult<()> {
        if self.results.insert(node, value).is_some() {
            return Err(CompressionError::AlreadyLowered(node));
        }
        Ok(())
    }

    pub fn emitter_mut(&mut self) -> &mut E {
        &mut self.emitter
    }

    pub fn into_emitter(self) -> E {
        self.emitter
    }

    /// Lowers every node reachable from the roots of `graph`.
    ///
    /// Returns the values consumed by the graph's returns, in root order.
    pub fn generate(&mut self, graph: &Graph) -> Result<Vec<E::Value>, E::Error> {
        let schedule = graph.schedule()?;
        log::debug!("lowering {} ({} scheduled nodes)", graph.name, schedule.len());

        let mut returned = Vec::new();
        for id in schedule {
            let node = graph.node(id)?;
            match &node.kind {
                NodeKind::Parameter { index } => {
                    let value = self.emitter.emit_parameter(*index, &node.stamp)?;
                    self.set_result(id, value)?;
                }
                NodeKind::Constant(constant) => {
                    let value = self.emitter.emit_constant(constant, &node.stamp)?;
                    self.set_result(id, value)?;
                }
                NodeKind::Compression(compression) => compression.generate(id, graph, self)?,
                NodeKind::Return { value } => returned.push(self.operand(*value)?),
            }
        }
        Ok(returned)
    }
}
