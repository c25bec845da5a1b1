//! Fixture builders shared by the crate's tests.

use asnake_ckpt::{
    encode_checkpoint, header_for, read_checkpoint, resolve, AdamMoments, RawWeights,
    ResolvedModel,
};

pub fn zeros(input_dim: usize) -> RawWeights {
    RawWeights {
        policy_weights: vec![0.0; 4 * input_dim],
        policy_bias: [0.0; 4],
        value_weights: vec![0.0; input_dim],
        value_bias: 0.0,
    }
}

/// Small deterministic non-trivial weights.
pub fn patterned(input_dim: usize) -> RawWeights {
    RawWeights {
        policy_weights: (0..4 * input_dim)
            .map(|i| ((i * 7 % 13) as f32 - 6.0) * 0.01)
            .collect(),
        policy_bias: [0.1, -0.2, 0.05, 0.0],
        value_weights: (0..input_dim)
            .map(|i| ((i * 5 % 11) as f32 - 5.0) * 0.02)
            .collect(),
        value_bias: 0.3,
    }
}

pub fn checkpoint_bytes(board_size: u32, raw: &RawWeights) -> Vec<u8> {
    let d = 4 * board_size * board_size;
    let moments = AdamMoments::zeros(d as usize);
    encode_checkpoint(&header_for(board_size, d, 42), raw, Some(&moments))
}

pub fn model(board_size: u32, raw: &RawWeights) -> ResolvedModel {
    let bytes = checkpoint_bytes(board_size, raw);
    resolve(read_checkpoint(&bytes).unwrap(), None).unwrap()
}
