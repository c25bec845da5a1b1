//! asnake-graph: policy/value graph IR, compiler, validator and ONNX serialization.
//!
//! Pipeline: [`compile`] a resolved checkpoint into a [`Graph`], [`validate`] it, and
//! [`write_graph`] it as an ONNX model. [`export_checkpoint`] runs the whole chain.

pub mod compile;
pub mod export;
pub mod import;
pub mod ir;
pub mod onnx;
pub mod parity;
pub mod proto;
pub mod runtime;
pub mod schema;
pub mod validate;
pub mod writer;

pub use compile::compile;
pub use export::{
    export_bytes, export_checkpoint, ExportError, ExportOptions, ExportSummary, ParityOutcome,
};
pub use import::{decode_model, from_model_proto, ImportError};
pub use ir::{AttrValue, Dim, ElemType, Graph, Initializer, Node, OpKind, TensorData, TensorSpec};
pub use onnx::{encode_model, to_model_proto};
pub use parity::{
    batch_len, parity_check, synthetic_states, ParityError, ParityOptions, ParityReport,
};
pub use runtime::{run, GraphSession, RuntimeError, Tensor};
pub use validate::{validate, GraphValidationError};
pub use writer::{tmp_path, write_graph, WriteError, WriteReport};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");


#[cfg(test)]
mod test_support;

#[cfg(test)]
mod compile_tests;
#[cfg(test)]
mod export_tests;
#[cfg(test)]
mod onnx_tests;
#[cfg(test)]
mod validate_tests;
