//! Resolved policy/value tensors and the direct forward pass.

use asnake_core::{softmax, PolicyValue, Prediction, ACTIONS};

use crate::reader::RawWeights;

/// Weights with validated geometry.
///
/// `policy_weights` is row-major `[ACTIONS, input_dim]`: row = action, column = flattened
/// feature index (channel, then row, then column of the board).
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyValueWeights {
    input_dim: usize,
    policy_weights: Vec<f32>,
    policy_bias: [f32; ACTIONS],
    value_weights: Vec<f32>,
    value_bias: f32,
}

impl PolicyValueWeights {
    /// Callers (the resolver) guarantee the lengths; this only moves the buffers.
    pub(crate) fn from_raw_unchecked(input_dim: usize, raw: RawWeights) -> Self {
        debug_assert_eq!(raw.policy_weights.len(), ACTIONS * input_dim);
        debug_assert_eq!(raw.value_weights.len(), input_dim);
        Self {
            input_dim,
            policy_weights: raw.policy_weights,
            policy_bias: raw.policy_bias,
            value_weights: raw.value_weights,
            value_bias: raw.value_bias,
        }
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    /// Policy matrix, row-major `[ACTIONS, input_dim]`.
    pub fn policy_weights(&self) -> &[f32] {
        &self.policy_weights
    }

    /// Weights of action `a` over all input features.
    pub fn policy_row(&self, a: usize) -> &[f32] {
        &self.policy_weights[a * self.input_dim..(a + 1) * self.input_dim]
    }

    pub fn policy_bias(&self) -> &[f32; ACTIONS] {
        &self.policy_bias
    }

    pub fn value_weights(&self) -> &[f32] {
        &self.value_weights
    }

    pub fn value_bias(&self) -> f32 {
        self.value_bias
    }

    /// Policy matrix transposed to `[input_dim, ACTIONS]` (feature-major).
    pub fn policy_weights_transposed(&self) -> Vec<f32> {
        let mut out = vec![0.0f32; self.policy_weights.len()];
        for a in 0..ACTIONS {
            for (i, &w) in self.policy_row(a).iter().enumerate() {
                out[i * ACTIONS + a] = w;
            }
        }
        out
    }

    pub fn policy_logits(&self, state: &[f32]) -> [f32; ACTIONS] {
        let mut out = [0.0f32; ACTIONS];
        for (a, z) in out.iter_mut().enumerate() {
            *z = self.policy_bias[a] + dot(self.policy_row(a), state);
        }
        out
    }

    pub fn value_linear(&self, state: &[f32]) -> f32 {
        self.value_bias + dot(&self.value_weights, state)
    }

    /// Give the buffers back in checkpoint layout.
    pub fn into_raw(self) -> RawWeights {
        RawWeights {
            policy_weights: self.policy_weights,
            policy_bias: self.policy_bias,
            value_weights: self.value_weights,
            value_bias: self.value_bias,
        }
    }
}

impl PolicyValue for PolicyValueWeights {
    fn input_dim(&self) -> usize {
        self.input_dim
    }

    /// Wrong-length input yields the uniform/zero prediction.
    fn predict(&self, state: &[f32]) -> Prediction {
        if state.len() != self.input_dim {
            return Prediction::default();
        }
        Prediction {
            policy: softmax(&self.policy_logits(state)),
            value: self.value_linear(state).tanh(),
        }
    }
}

fn dot(w: &[f32], x: &[f32]) -> f32 {
    w.iter().zip(x).map(|(a, b)| a * b).sum()
}
