//! Error types for the compression IR.
//!
//! Every variant here is an internal-consistency defect: reaching one means an
//! upstream pass built a malformed graph. Callers propagate these with `?` up to
//! the compilation-unit driver, which reports the diagnostic and discards the unit.

use miette::Diagnostic;
use thiserror::Error;

use crate::constant::Constant;
use crate::encoding::CompressEncoding;
use crate::graph::NodeId;
use crate::node::CompressionOp;
use crate::stamp::Stamp;

/// Result type for IR operations
pub type IrResult<T> = Result<T, CompressionError>;

#[derive(Debug, Error, Diagnostic, Clone, PartialEq, Eq)]
pub enum CompressionError {
    /// The stamp rule was handed an input stamp that is not one of the two
    /// valid shapes for the operation.
    #[error("unexpected input stamp {stamp} for {op} with encoding {encoding}")]
    #[diagnostic(
        code(tessera::ir::unexpected_stamp),
        help("the input of a compression node must be an object or narrow-oop stamp, or an integer of the matching width")
    )]
    UnexpectedStamp {
        op: CompressionOp,
        stamp: Stamp,
        encoding: CompressEncoding,
    },

    /// The constant evaluator was handed a constant outside its domain.
    #[error("invalid constant input for {op}: {constant} (encoding {encoding})")]
    #[diagnostic(code(tessera::ir::invalid_constant))]
    InvalidConstant {
        op: CompressionOp,
        constant: Constant,
        encoding: CompressEncoding,
    },

    /// A node id that does not name a live node in the graph.
    #[error("node {0} does not exist in the graph")]
    #[diagnostic(code(tessera::ir::unknown_node))]
    UnknownNode(NodeId),

    /// A parameter index was requested again with a different stamp.
    #[error("parameter {index} already exists with stamp {existing}, requested {requested}")]
    #[diagnostic(code(tessera::ir::parameter_stamp_mismatch))]
    ParameterStampMismatch {
        index: u32,
        existing: Stamp,
        requested: Stamp,
    },

    /// The canonicalizer kept rewriting past the configured budget.
    #[error("canonicalization did not reach a fixed point after {rewrites} rewrites")]
    #[diagnostic(
        code(tessera::ir::no_fixed_point),
        help("raise `max_rewrites` in the canonicalizer configuration, or look for a rewrite that undoes another")
    )]
    NoFixedPoint { rewrites: usize },

    /// Lowering asked for the value of a node that has not been lowered yet.
    #[error("no lowered value for operand {0}")]
    #[diagnostic(code(tessera::lir::missing_operand))]
    MissingOperand(NodeId),

    /// Lowering produced a second result for the same node.
    #[error("node {0} was lowered more than once")]
    #[diagnostic(code(tessera::lir::already_lowered))]
    AlreadyLowered(NodeId),
}
