//! asnake-ckpt: Binary checkpoint reader/writer + shape resolution for the linear
//! policy/value model.

pub mod format;
pub mod reader;
pub mod resolve;
pub mod weights;
pub mod writer;

pub use format::{FORMAT_VERSION, MAGIC};
pub use reader::{
    load_checkpoint, read_checkpoint, Checkpoint, CheckpointError, CheckpointHeader, FormatError,
    RawWeights,
};
pub use resolve::{resolve, ResolveError, ResolvedModel, ShapeMismatchError};
pub use weights::PolicyValueWeights;
pub use writer::{encode_checkpoint, header_for, write_checkpoint, AdamMoments};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
