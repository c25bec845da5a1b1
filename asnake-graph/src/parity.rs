//! Advisory numeric self-check of a written model.
//!
//! Reads the file back, decodes it, runs it on seeded standard-normal states and
//! compares against the checkpoint weights evaluated directly.

use std::path::Path;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};
use serde::Serialize;
use thiserror::Error;

use asnake_ckpt::PolicyValueWeights;
use asnake_core::{PolicyValue, ACTIONS, CHANNELS};

use crate::import::{decode_model, ImportError};
use crate::runtime::{GraphSession, RuntimeError};
use crate::validate::{validate, GraphValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParityOptions {
    pub seed: u64,
    pub batch: usize,
}

impl Default for ParityOptions {
    fn default() -> Self {
        Self { seed: 0, batch: 2 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParityReport {
    pub batch: usize,
    pub seed: u64,
    pub policy_max_abs_diff: f32,
    pub value_max_abs_diff: f32,
}

impl ParityReport {
    /// Both diffs at or under `tol`.
    pub fn within(&self, tol: f32) -> bool {
        self.policy_max_abs_diff <= tol && self.value_max_abs_diff <= tol
    }
}

#[derive(Debug, Error)]
pub enum ParityError {
    #[error("failed to read back {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error("decoded graph is invalid: {0}")]
    Validation(#[from] GraphValidationError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("model input_dim {model} does not match weights input_dim {weights}")]
    Geometry { model: usize, weights: usize },
    #[error("parity batch {batch} overflows the state buffer size")]
    BatchTooLarge { batch: usize },
}

/// Number of floats in `batch` flattened `[4, B, B]` states; `None` on overflow.
pub fn batch_len(board_size: usize, batch: usize) -> Option<usize> {
    batch
        .checked_mul(CHANNELS)?
        .checked_mul(board_size)?
        .checked_mul(board_size)
}

/// `batch` flattened `[4, B, B]` states drawn from N(0, 1); `None` when the
/// element count overflows.
pub fn synthetic_states(board_size: usize, batch: usize, seed: u64) -> Option<Vec<f32>> {
    let n = batch_len(board_size, batch)?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    Some(
        (0..n)
            .map(|_| -> f32 { StandardNormal.sample(&mut rng) })
            .collect(),
    )
}

pub fn parity_check(
    path: &Path,
    weights: &PolicyValueWeights,
    opts: ParityOptions,
) -> Result<ParityReport, ParityError> {
    let bytes = std::fs::read(path).map_err(|source| ParityError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let graph = decode_model(&bytes)?;
    validate(&graph)?;
    let session = GraphSession::new(graph)?;
    if session.input_dim() != weights.input_dim() {
        return Err(ParityError::Geometry {
            model: session.input_dim(),
            weights: weights.input_dim(),
        });
    }

    let d = weights.input_dim();
    let states = synthetic_states(session.board_size(), opts.batch, opts.seed)
        .ok_or(ParityError::BatchTooLarge { batch: opts.batch })?;
    let got = session.run_batch(&states, opts.batch)?;

    let mut report = ParityReport {
        batch: opts.batch,
        seed: opts.seed,
        policy_max_abs_diff: 0.0,
        value_max_abs_diff: 0.0,
    };
    for (row, pred) in states.chunks_exact(d).zip(&got) {
        let want = weights.predict(row);
        for a in 0..ACTIONS {
            report.policy_max_abs_diff = report
                .policy_max_abs_diff
                .max(abs_diff(pred.policy[a], want.policy[a]));
        }
        report.value_max_abs_diff = report
            .value_max_abs_diff
            .max(abs_diff(pred.value, want.value));
    }
    Ok(report)
}

/// `|a - b|`, with a NaN difference counted as unbounded.
fn abs_diff(a: f32, b: f32) -> f32 {
    let d = (a - b).abs();
    if d.is_nan() {
        f32::INFINITY
    } else {
        d
    }
}
