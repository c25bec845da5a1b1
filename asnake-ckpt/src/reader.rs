//! Checkpoint reader: header + the four required weight vectors.
//!
//! Reading stops right after `value_bias`. Whatever the trainer appended afterwards
//! (Adam moments today) is counted but never parsed.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::format::{
    F_BOARD_SIZE, F_INPUT_DIM, F_MAGIC, F_POLICY_BIAS, F_POLICY_WEIGHTS, F_STEP, F_VALUE_BIAS,
    F_VALUE_WEIGHTS, F_VERSION, MAGIC, POLICY_BIAS_LEN,
};

#[derive(Debug, Error, PartialEq)]
pub enum FormatError {
    #[error("checkpoint truncated reading {field}: need {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        field: &'static str,
        offset: usize,
        needed: u64,
        available: usize,
    },
    #[error("bad magic: 0x{found:08X} (expected 0x{expected:08X})")]
    BadMagic { found: u32, expected: u32 },
    #[error("invalid board_size in header: {0}")]
    BadBoardSize(u32),
    #[error("header input_dim={input_dim} but 4 * board_size^2 = {expected} (board_size={board_size})")]
    BadInputDim {
        board_size: u32,
        input_dim: u32,
        expected: usize,
    },
    #[error("invalid vector length for {field}: got {got}, expected {expected}")]
    BadVectorLen {
        field: &'static str,
        got: usize,
        expected: usize,
    },
}

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("failed to read checkpoint {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Format(#[from] FormatError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CheckpointHeader {
    pub magic: u32,
    pub version: u32,
    pub board_size: u32,
    pub input_dim: u32,
    pub step: u64,
}

/// Weight vectors exactly as stored, before any reshape.
#[derive(Debug, Clone, PartialEq)]
pub struct RawWeights {
    pub policy_weights: Vec<f32>,
    pub policy_bias: [f32; POLICY_BIAS_LEN],
    pub value_weights: Vec<f32>,
    pub value_bias: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub header: CheckpointHeader,
    pub raw: RawWeights,
    /// Bytes consumed by the header and the four required fields.
    pub consumed: usize,
    /// Bytes left after `value_bias` (optimizer state), skipped unread.
    pub trailing: usize,
}

/// Parse a checkpoint from memory.
pub fn read_checkpoint(bytes: &[u8]) -> Result<Checkpoint, FormatError> {
    let mut c = Cursor::new(bytes);

    let magic = c.read_u32(F_MAGIC)?;
    if magic != MAGIC {
        return Err(FormatError::BadMagic {
            found: magic,
            expected: MAGIC,
        });
    }
    let version = c.read_u32(F_VERSION)?;
    let board_size = c.read_u32(F_BOARD_SIZE)?;
    let input_dim = c.read_u32(F_INPUT_DIM)?;
    let step = c.read_u64(F_STEP)?;

    let policy_weights = c.read_vec_f32(F_POLICY_WEIGHTS)?;
    let mut policy_bias = [0.0f32; POLICY_BIAS_LEN];
    for b in &mut policy_bias {
        *b = c.read_f32(F_POLICY_BIAS)?;
    }
    let value_weights = c.read_vec_f32(F_VALUE_WEIGHTS)?;
    let value_bias = c.read_f32(F_VALUE_BIAS)?;

    Ok(Checkpoint {
        header: CheckpointHeader {
            magic,
            version,
            board_size,
            input_dim,
            step,
        },
        raw: RawWeights {
            policy_weights,
            policy_bias,
            value_weights,
            value_bias,
        },
        consumed: c.off,
        trailing: bytes.len() - c.off,
    })
}

/// Read a checkpoint file fully into memory and parse it.
pub fn load_checkpoint(path: impl AsRef<Path>) -> Result<Checkpoint, CheckpointError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|source| CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(read_checkpoint(&bytes)?)
}

struct Cursor<'a> {
    bytes: &'a [u8],
    off: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, off: 0 }
    }

    fn take(&mut self, field: &'static str, n: u64) -> Result<&'a [u8], FormatError> {
        let available = self.bytes.len() - self.off;
        let n_usize = match usize::try_from(n) {
            Ok(v) if v <= available => v,
            _ => {
                return Err(FormatError::Truncated {
                    field,
                    offset: self.off,
                    needed: n,
                    available,
                })
            }
        };
        let s = &self.bytes[self.off..self.off + n_usize];
        self.off += n_usize;
        Ok(s)
    }

    fn read_u32(&mut self, field: &'static str) -> Result<u32, FormatError> {
        let b = self.take(field, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_u64(&mut self, field: &'static str) -> Result<u64, FormatError> {
        let b = self.take(field, 8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    fn read_f32(&mut self, field: &'static str) -> Result<f32, FormatError> {
        let b = self.take(field, 4)?;
        Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// u64 element count followed by that many f32.
    fn read_vec_f32(&mut self, field: &'static str) -> Result<Vec<f32>, FormatError> {
        let n = self.read_u64(field)?;
        // A length whose byte size overflows can never be satisfied.
        let byte_len = n.checked_mul(4).unwrap_or(u64::MAX);
        let b = self.take(field, byte_len)?;
        Ok(b.chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }
}
