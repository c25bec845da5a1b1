//! Checkpoint writer using the trainer's save layout.
//!
//! Mostly used to produce fixtures: the exporter itself only reads.

use std::fs;
use std::path::Path;

use crate::format::{FORMAT_VERSION, HEADER_LEN, MAGIC, POLICY_BIAS_LEN};
use crate::reader::{CheckpointHeader, RawWeights};

/// Adam first/second moments, appended after the weights by the trainer.
#[derive(Debug, Clone, PartialEq)]
pub struct AdamMoments {
    pub m_wp: Vec<f32>,
    pub v_wp: Vec<f32>,
    pub m_bp: [f32; POLICY_BIAS_LEN],
    pub v_bp: [f32; POLICY_BIAS_LEN],
    pub m_wv: Vec<f32>,
    pub v_wv: Vec<f32>,
    pub m_bv: f32,
    pub v_bv: f32,
}

impl AdamMoments {
    /// Fresh optimizer state for a model with `input_dim` features.
    pub fn zeros(input_dim: usize) -> Self {
        Self {
            m_wp: vec![0.0; POLICY_BIAS_LEN * input_dim],
            v_wp: vec![0.0; POLICY_BIAS_LEN * input_dim],
            m_bp: [0.0; POLICY_BIAS_LEN],
            v_bp: [0.0; POLICY_BIAS_LEN],
            m_wv: vec![0.0; input_dim],
            v_wv: vec![0.0; input_dim],
            m_bv: 0.0,
            v_bv: 0.0,
        }
    }

    fn encoded_len(&self) -> usize {
        4 * 8
            + 4 * (self.m_wp.len() + self.v_wp.len() + self.m_wv.len() + self.v_wv.len())
            + 2 * 4 * POLICY_BIAS_LEN
            + 2 * 4
    }
}

/// Header for a fresh checkpoint at `step`.
pub fn header_for(board_size: u32, input_dim: u32, step: u64) -> CheckpointHeader {
    CheckpointHeader {
        magic: MAGIC,
        version: FORMAT_VERSION,
        board_size,
        input_dim,
        step,
    }
}

pub fn encode_checkpoint_len(raw: &RawWeights, moments: Option<&AdamMoments>) -> usize {
    HEADER_LEN
        + 8
        + 4 * raw.policy_weights.len()
        + 4 * POLICY_BIAS_LEN
        + 8
        + 4 * raw.value_weights.len()
        + 4
        + moments.map_or(0, AdamMoments::encoded_len)
}

pub fn encode_checkpoint(
    header: &CheckpointHeader,
    raw: &RawWeights,
    moments: Option<&AdamMoments>,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(encode_checkpoint_len(raw, moments));

    out.extend_from_slice(&header.magic.to_le_bytes());
    out.extend_from_slice(&header.version.to_le_bytes());
    out.extend_from_slice(&header.board_size.to_le_bytes());
    out.extend_from_slice(&header.input_dim.to_le_bytes());
    out.extend_from_slice(&header.step.to_le_bytes());

    put_vec_f32(&mut out, &raw.policy_weights);
    put_f32s(&mut out, &raw.policy_bias);
    put_vec_f32(&mut out, &raw.value_weights);
    out.extend_from_slice(&raw.value_bias.to_le_bytes());

    if let Some(m) = moments {
        put_vec_f32(&mut out, &m.m_wp);
        put_vec_f32(&mut out, &m.v_wp);
        put_f32s(&mut out, &m.m_bp);
        put_f32s(&mut out, &m.v_bp);
        put_vec_f32(&mut out, &m.m_wv);
        put_vec_f32(&mut out, &m.v_wv);
        out.extend_from_slice(&m.m_bv.to_le_bytes());
        out.extend_from_slice(&m.v_bv.to_le_bytes());
    }

    out
}

/// Encode and write via `<path>.tmp` + rename.
pub fn write_checkpoint(
    path: impl AsRef<Path>,
    header: &CheckpointHeader,
    raw: &RawWeights,
    moments: Option<&AdamMoments>,
) -> std::io::Result<()> {
    let path = path.as_ref();
    let tmp = path.with_extension("bin.tmp");
    fs::write(&tmp, encode_checkpoint(header, raw, moments))?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn put_vec_f32(out: &mut Vec<u8>, v: &[f32]) {
    out.extend_from_slice(&(v.len() as u64).to_le_bytes());
    put_f32s(out, v);
}

fn put_f32s(out: &mut Vec<u8>, v: &[f32]) {
    for &f in v {
        out.extend_from_slice(&f.to_le_bytes());
    }
}
