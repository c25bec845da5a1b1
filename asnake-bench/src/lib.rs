//! asnake-bench: fixtures for the export benchmarks.

use asnake_ckpt::{encode_checkpoint, header_for, AdamMoments, RawWeights};

/// Trainer-layout checkpoint bytes (with optimizer state) for a `board_size` board.
pub fn checkpoint_fixture(board_size: u32) -> Vec<u8> {
    let d = 4 * board_size * board_size;
    let n = d as usize;
    let raw = RawWeights {
        policy_weights: (0..4 * n).map(|i| ((i % 17) as f32 - 8.0) * 0.01).collect(),
        policy_bias: [0.0, 0.1, -0.1, 0.05],
        value_weights: (0..n).map(|i| ((i % 5) as f32 - 2.0) * 0.02).collect(),
        value_bias: 0.0,
    };
    encode_checkpoint(&header_for(board_size, d, 1000), &raw, Some(&AdamMoments::zeros(n)))
}
