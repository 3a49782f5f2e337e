//! Tessera IR
//!
//! Graph nodes that compress and uncompress object references and metadata
//! pointers, together with the pieces of the compiler they plug into: stamps,
//! constants, the value graph, canonicalization and lowering.

pub mod canonical;
pub mod config;
pub mod constant;
pub mod encoding;
pub mod error;
pub mod graph;
pub mod lir;
pub mod node;
pub mod stamp;

pub use canonical::{CanonicalizeStats, Canonicalizable, Canonicalizer, CanonicalizerConfig, RewriteResult};
pub use config::{CompilerConfig, ConfigError, VmConfig};
pub use constant::{Constant, MetaspaceConstant, MetaspaceObject, ObjectConstant, ObjectHandle, PointerWidth};
pub use encoding::CompressEncoding;
pub use error::{CompressionError, IrResult};
pub use graph::{Graph, Node, NodeId, NodeKind};
pub use lir::{CompressionEmitter, LirGenerator};
pub use node::{compression_stamp, CompressionNode, CompressionOp};
pub use stamp::{IntegerStamp, NarrowOopStamp, ObjectStamp, Stamp};
