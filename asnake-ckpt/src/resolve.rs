//! Shape resolution: raw vectors + header geometry (+ optional board override) into
//! [`PolicyValueWeights`].
//!
//! An override only changes the declared geometry. It never resamples or pads, so it
//! is accepted only when the stored flat lengths already match `4 * override^2`.
//! Whether the trained feature layout still means the same thing on the new board is
//! the caller's call.

use thiserror::Error;

use asnake_core::{input_dim_for, ACTIONS};

use crate::format::{F_POLICY_WEIGHTS, F_VALUE_WEIGHTS};
use crate::reader::{Checkpoint, FormatError};
use crate::weights::PolicyValueWeights;

#[derive(Debug, Error, PartialEq)]
#[error(
    "board_size override {override_board_size} does not match checkpoint: \
     checkpoint input_dim={checkpoint_input_dim} vs override input_dim={} \
     (policy_weights len={policy_len}, value_weights len={value_len})",
    fmt_override_dim(.override_input_dim)
)]
pub struct ShapeMismatchError {
    pub override_board_size: u32,
    pub checkpoint_input_dim: usize,
    /// `None` when `4 * override^2` does not fit in `usize`.
    pub override_input_dim: Option<usize>,
    pub policy_len: usize,
    pub value_len: usize,
}

fn fmt_override_dim(dim: &Option<usize>) -> String {
    match dim {
        Some(d) => d.to_string(),
        None => "overflow".to_string(),
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ResolveError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    ShapeMismatch(#[from] ShapeMismatchError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedModel {
    /// Board edge used for the exported graph.
    pub board_size: u32,
    /// `4 * board_size^2`.
    pub input_dim: usize,
    /// Training step from the header, carried for reporting.
    pub step: u64,
    /// True when a board override different from the header was applied.
    pub overridden: bool,
    pub weights: PolicyValueWeights,
}

/// Consume a parsed checkpoint and produce typed tensors.
pub fn resolve(
    ckpt: Checkpoint,
    board_size_override: Option<u32>,
) -> Result<ResolvedModel, ResolveError> {
    let header = ckpt.header;
    let raw = ckpt.raw;
    let policy_len = raw.policy_weights.len();
    let value_len = raw.value_weights.len();

    let (board_size, input_dim, overridden) = match board_size_override {
        Some(b) if b != header.board_size => {
            let mismatch = |override_input_dim: Option<usize>| ShapeMismatchError {
                override_board_size: b,
                checkpoint_input_dim: header.input_dim as usize,
                override_input_dim,
                policy_len,
                value_len,
            };
            let override_dim = match input_dim_for(b) {
                Some(d) if b > 0 => d,
                other => return Err(mismatch(other).into()),
            };
            if ACTIONS.checked_mul(override_dim) != Some(policy_len) || value_len != override_dim
            {
                return Err(mismatch(Some(override_dim)).into());
            }
            (b, override_dim, true)
        }
        _ => {
            if header.board_size == 0 {
                return Err(FormatError::BadBoardSize(header.board_size).into());
            }
            let expected = input_dim_for(header.board_size)
                .ok_or(FormatError::BadBoardSize(header.board_size))?;
            if header.input_dim as usize != expected {
                return Err(FormatError::BadInputDim {
                    board_size: header.board_size,
                    input_dim: header.input_dim,
                    expected,
                }
                .into());
            }
            let expected_policy = ACTIONS
                .checked_mul(expected)
                .ok_or(FormatError::BadBoardSize(header.board_size))?;
            if policy_len != expected_policy {
                return Err(FormatError::BadVectorLen {
                    field: F_POLICY_WEIGHTS,
                    got: policy_len,
                    expected: expected_policy,
                }
                .into());
            }
            if value_len != expected {
                return Err(FormatError::BadVectorLen {
                    field: F_VALUE_WEIGHTS,
                    got: value_len,
                    expected,
                }
                .into());
            }
            (header.board_size, expected, false)
        }
    };

    Ok(ResolvedModel {
        board_size,
        input_dim,
        step: header.step,
        overridden,
        weights: PolicyValueWeights::from_raw_unchecked(input_dim, raw),
    })
}
