//! Linear policy/value model geometry and the evaluation interface.
//!
//! The network sees a `[CHANNELS, board, board]` state plane stack, flattened
//! channel-major then row-major, and produces a distribution over `ACTIONS`
//! moves plus a scalar value in [-1, 1].

/// Fixed action space (up, right, down, left).
pub const ACTIONS: usize = 4;

/// Feature planes per board cell.
pub const CHANNELS: usize = 4;

/// Flattened input length for a square board: `CHANNELS * board_size^2`.
///
/// Returns `None` on overflow.
pub fn input_dim_for(board_size: u32) -> Option<usize> {
    let b = usize::try_from(board_size).ok()?;
    b.checked_mul(b)?.checked_mul(CHANNELS)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub policy: [f32; ACTIONS],
    pub value: f32,
}

impl Default for Prediction {
    /// Uniform policy + zero value.
    fn default() -> Self {
        Self {
            policy: [1.0 / ACTIONS as f32; ACTIONS],
            value: 0.0,
        }
    }
}

/// Anything that maps one flattened state to a policy/value prediction.
///
/// - `state.len()` must equal `input_dim()`
/// - `policy` sums to 1, `value` is in [-1, 1]
pub trait PolicyValue {
    fn input_dim(&self) -> usize;
    fn predict(&self, state: &[f32]) -> Prediction;
}

/// Max-subtracted softmax over the action logits.
///
/// Falls back to uniform when the exponent sum is not positive (all `-inf` logits).
pub fn softmax(logits: &[f32; ACTIONS]) -> [f32; ACTIONS] {
    let mx = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut ex = [0.0f32; ACTIONS];
    let mut sum = 0.0f32;
    for (e, &z) in ex.iter_mut().zip(logits) {
        *e = (z - mx).exp();
        sum += *e;
    }
    if !(sum > 0.0) {
        return Prediction::default().policy;
    }
    for e in &mut ex {
        *e /= sum;
    }
    ex
}
