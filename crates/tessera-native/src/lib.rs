//! Native lowering for tessera graphs.
//!
//! [`CraneliftEmitter`] turns compression requests into Cranelift instructions;
//! [`compile_graph`] wraps a whole graph into a JIT-compiled function.

pub mod backend;
pub mod emitter;
pub mod error;

pub use backend::{compile_graph, CompiledGraph};
pub use emitter::{translate_stamp, CraneliftEmitter};
pub use error::NativeError;
