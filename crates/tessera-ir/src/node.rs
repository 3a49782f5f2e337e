//! # Compression Node
//!
//! Compresses or uncompresses an object reference or a metadata pointer.
//!
//! A [`CompressionNode`] is immutable once created: the operation, the encoding
//! and the input never change, and its stamp is fixed by [`compression_stamp`]
//! when the graph inserts it. The node participates in three later phases:
//!
//! 1.  Constant evaluation ([`CompressionOp::evaluate`], [`CompressionNode::convert`],
//!     [`CompressionNode::reverse`]).
//! 2.  Canonicalization ([`Canonicalizable`]): folding constant inputs and
//!     cancelling `uncompress(compress(x))` / `compress(uncompress(x))`.
//! 3.  Lowering ([`CompressionNode::generate`]): exactly one backend request.

use std::fmt;

use crate::canonical::{Canonicalizable, RewriteResult};
use crate::constant::{Constant, MetaspaceConstant, PointerWidth};
use crate::encoding::CompressEncoding;
use crate::error::{CompressionError, IrResult};
use crate::graph::{Graph, NodeId};
use crate::lir::{CompressionEmitter, LirGenerator};
use crate::stamp::{IntegerStamp, NarrowOopStamp, Stamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionOp {
    Compress,
    Uncompress,
}

impl CompressionOp {
    pub fn inverse(self) -> Self {
        match self {
            CompressionOp::Compress => CompressionOp::Uncompress,
            CompressionOp::Uncompress => CompressionOp::Compress,
        }
    }

    /// Folds `constant` through this operation.
    pub fn evaluate(self, constant: &Constant, encoding: CompressEncoding) -> IrResult<Constant> {
        match self {
            CompressionOp::Compress => compress_constant(constant, encoding),
            CompressionOp::Uncompress => uncompress_constant(constant, encoding),
        }
    }

    /// The constant that this operation would have mapped to `constant`.
    pub fn invert(self, constant: &Constant, encoding: CompressEncoding) -> IrResult<Constant> {
        self.inverse().evaluate(constant, encoding)
    }
}

impl fmt::Display for CompressionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressionOp::Compress => write!(f, "Compress"),
            CompressionOp::Uncompress => write!(f, "Uncompress"),
        }
    }
}

fn compress_constant(constant: &Constant, encoding: CompressEncoding) -> IrResult<Constant> {
    match constant {
        Constant::NullObject => Ok(Constant::CompressedNull),
        Constant::Object(object) if !object.compressed => Ok(Constant::Object(object.compress())),
        Constant::Metaspace(meta) if meta.width == PointerWidth::Word => Ok(Constant::Metaspace(
            MetaspaceConstant::narrow(encoding.compress(meta.raw), meta.object.clone()),
        )),
        Constant::CompressedNull | Constant::Object(_) | Constant::Metaspace(_) | Constant::Int { .. } => {
            Err(CompressionError::InvalidConstant {
                op: CompressionOp::Compress,
                constant: constant.clone(),
                encoding,
            })
        }
    }
}

fn uncompress_constant(constant: &Constant, encoding: CompressEncoding) -> IrResult<Constant> {
    match constant {
        Constant::CompressedNull => Ok(Constant::NullObject),
        Constant::Object(object) if object.compressed => Ok(Constant::Object(object.uncompress())),
        Constant::Metaspace(meta) if meta.width == PointerWidth::Narrow => Ok(Constant::Metaspace(
            MetaspaceConstant::word(encoding.uncompress(meta.raw as i32), meta.object.clone()),
        )),
        Constant::NullObject | Constant::Object(_) | Constant::Metaspace(_) | Constant::Int { .. } => {
            Err(CompressionError::InvalidConstant {
                op: CompressionOp::Uncompress,
                constant: constant.clone(),
                encoding,
            })
        }
    }
}

/// Infers the stamp of `op` applied to a value with stamp `input`.
pub fn compression_stamp(op: CompressionOp, input: &Stamp, encoding: CompressEncoding) -> IrResult<Stamp> {
    match (op, input) {
        // compressed oop
        (CompressionOp::Compress, Stamp::Object(object)) => {
            Ok(Stamp::NarrowOop(NarrowOopStamp::compressed(object.clone(), encoding)))
        }
        // compressed metaspace pointer
        (CompressionOp::Compress, Stamp::Integer(IntegerStamp { bits: 64, .. })) => {
            Ok(Stamp::Integer(IntegerStamp::unsigned_full(32)))
        }
        // oop
        (CompressionOp::Uncompress, Stamp::NarrowOop(narrow)) if narrow.encoding == encoding => {
            Ok(narrow.uncompressed())
        }
        // metaspace pointer
        (CompressionOp::Uncompress, Stamp::Integer(IntegerStamp { bits: 32, .. })) => {
            Ok(Stamp::Integer(IntegerStamp::unsigned_full(64)))
        }
        _ => Err(CompressionError::UnexpectedStamp { op, stamp: input.clone(), encoding }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompressionNode {
    op: CompressionOp,
    encoding: CompressEncoding,
    input: NodeId,
}

impl CompressionNode {
    /// Builds the node value. Use [`Graph::compress`] / [`Graph::uncompress`]
    /// to obtain a uniqued node with its stamp.
    pub(crate) fn new(op: CompressionOp, input: NodeId, encoding: CompressEncoding) -> Self {
        CompressionNode { op, encoding, input }
    }

    pub fn op(&self) -> CompressionOp {
        self.op
    }

    pub fn encoding(&self) -> CompressEncoding {
        self.encoding
    }

    pub fn input(&self) -> NodeId {
        self.input
    }

    pub(crate) fn replace_input(&mut self, old: NodeId, new: NodeId) {
        if self.input == old {
            self.input = new;
        }
    }

    pub fn convert(&self, constant: &Constant) -> IrResult<Constant> {
        self.op.evaluate(constant, self.encoding)
    }

    pub fn reverse(&self, constant: &Constant) -> IrResult<Constant> {
        self.op.invert(constant, self.encoding)
    }

    /// Compression never loses information.
    pub fn is_lossless(&self) -> bool {
        true
    }

    /// Emits the single backend operation for this node and records its result.
    pub fn generate<E: CompressionEmitter>(
        &self,
        id: NodeId,
        graph: &Graph,
        gen: &mut LirGenerator<E>,
    ) -> Result<(), E::Error> {
        let input_stamp = graph.stamp(self.input)?;
        let non_null = if input_stamp.is_object() {
            input_stamp.is_object_non_null()
        } else {
            // metaspace pointers are never null
            true
        };

        let operand = gen.operand(self.input)?;
        let result = match self.op {
            CompressionOp::Compress => gen.emitter_mut().emit_compress(operand, &self.encoding, non_null),
            CompressionOp::Uncompress => gen.emitter_mut().emit_uncompress(operand, &self.encoding, non_null),
        };
        log::trace!("lowered {} {} (non_null={})", id, self, non_null);
        gen.set_result(id, result)?;
        Ok(())
    }
}

impl Canonicalizable for CompressionNode {
    fn canonical(&self, id: NodeId, graph: &mut Graph) -> IrResult<RewriteResult> {
        if let Some(constant) = graph.as_constant(self.input) {
            let folded = self.convert(constant)?;
            let stamp = graph.stamp(id)?.clone();
            return graph.constant(folded, stamp).map(RewriteResult::Replace);
        }
        if let Some(other) = graph.as_compression(self.input) {
            if self.op != other.op && self.encoding == other.encoding {
                return Ok(RewriteResult::Replace(other.input));
            }
        }
        Ok(RewriteResult::Unchanged)
    }
}

impl fmt::Display for CompressionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constant::MetaspaceObject;
    use crate::stamp::ObjectStamp;

    const ENCODING: CompressEncoding = CompressEncoding::new(0x8_0000_0000, 3);

    fn klass() -> MetaspaceObject {
        MetaspaceObject::new("java/lang/Object")
    }

    #[test]
    fn compress_null_is_compressed_null() -> IrResult<()> {
        assert_eq!(CompressionOp::Compress.evaluate(&Constant::NullObject, ENCODING)?, Constant::CompressedNull);
        assert_eq!(CompressionOp::Uncompress.evaluate(&Constant::CompressedNull, ENCODING)?, Constant::NullObject);
        Ok(())
    }

    #[test]
    fn metaspace_payload_goes_through_the_encoding() -> IrResult<()> {
        let raw = 0x8_0000_0000 + (0x1234 << 3);
        let narrow = CompressionOp::Compress.evaluate(&Constant::metaspace(raw, klass()), ENCODING)?;
        assert_eq!(narrow, Constant::Metaspace(MetaspaceConstant::narrow(0x1234, klass())));
        Ok(())
    }

    #[test]
    fn round_trips_are_exact() -> IrResult<()> {
        let samples = [
            Constant::NullObject,
            Constant::object(0xdead_beef),
            Constant::metaspace(0x8_0000_0000 + (0x7fff_fff0 << 3), klass()),
        ];
        for constant in &samples {
            let narrow = CompressionOp::Compress.evaluate(constant, ENCODING)?;
            assert_eq!(&CompressionOp::Uncompress.evaluate(&narrow, ENCODING)?, constant);
            assert_eq!(&CompressionOp::Uncompress.invert(constant, ENCODING)?, &narrow);
        }
        Ok(())
    }

    #[test]
    fn wrong_kind_is_a_defect() {
        let err = CompressionOp::Uncompress.evaluate(&Constant::NullObject, ENCODING).unwrap_err();
        assert!(matches!(err, CompressionError::InvalidConstant { op: CompressionOp::Uncompress, .. }));

        let narrow_meta = Constant::Metaspace(MetaspaceConstant::narrow(1, klass()));
        assert!(CompressionOp::Compress.evaluate(&narrow_meta, ENCODING).is_err());
        assert!(CompressionOp::Compress.evaluate(&Constant::Int { bits: 64, value: 8 }, ENCODING).is_err());
    }

    #[test]
    fn stamp_rule_shapes() -> IrResult<()> {
        let object = Stamp::object(ObjectStamp::non_null());
        let narrow = compression_stamp(CompressionOp::Compress, &object, ENCODING)?;
        assert_eq!(compression_stamp(CompressionOp::Uncompress, &narrow, ENCODING)?, object);

        assert_eq!(
            compression_stamp(CompressionOp::Compress, &Stamp::integer(64), ENCODING)?,
            Stamp::integer(32)
        );
        assert_eq!(
            compression_stamp(CompressionOp::Uncompress, &Stamp::integer(32), ENCODING)?,
            Stamp::integer(64)
        );
        Ok(())
    }

    #[test]
    fn stamp_rule_rejects_other_shapes() {
        for (op, stamp) in [
            (CompressionOp::Compress, Stamp::integer(32)),
            (CompressionOp::Uncompress, Stamp::integer(64)),
            (CompressionOp::Uncompress, Stamp::object(ObjectStamp::unrestricted())),
            (CompressionOp::Compress, Stamp::Float { bits: 64 }),
            (CompressionOp::Compress, Stamp::Void),
        ] {
            let err = compression_stamp(op, &stamp, ENCODING).unwrap_err();
            assert_eq!(err, CompressionError::UnexpectedStamp { op, stamp, encoding: ENCODING });
        }
    }

    #[test]
    fn uncompress_requires_matching_encoding() {
        let narrow = Stamp::NarrowOop(NarrowOopStamp::compressed(ObjectStamp::unrestricted(), ENCODING));
        let other = CompressEncoding::new(0, 3);
        assert!(compression_stamp(CompressionOp::Uncompress, &narrow, other).is_err());
    }

    #[test]
    fn node_display_is_the_operation() {
        let node = CompressionNode::new(CompressionOp::Uncompress, NodeId(0), ENCODING);
        assert_eq!(node.to_string(), "Uncompress");
        assert!(node.is_lossless());
    }
}
