//! End-to-end conversion: checkpoint bytes → resolved weights → graph → `.onnx` file.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use asnake_ckpt::{
    load_checkpoint, read_checkpoint, resolve, Checkpoint, CheckpointError, FormatError,
    ResolveError, ShapeMismatchError,
};
use asnake_logging::debug;

use crate::compile::compile;
use crate::parity::{parity_check, ParityOptions, ParityReport};
use crate::validate::GraphValidationError;
use crate::writer::{write_graph, WriteError};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("checkpoint format error: {0}")]
    Format(#[from] FormatError),
    #[error("shape mismatch: {0}")]
    ShapeMismatch(#[from] ShapeMismatchError),
    #[error("graph validation error: {0}")]
    GraphValidation(#[from] GraphValidationError),
}

impl ExportError {
    /// Stable short name for logs and exit messages.
    pub fn kind(&self) -> &'static str {
        match self {
            ExportError::Io { .. } => "io",
            ExportError::Format(_) => "format",
            ExportError::ShapeMismatch(_) => "shape_mismatch",
            ExportError::GraphValidation(_) => "graph_validation",
        }
    }
}

impl From<ResolveError> for ExportError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::Format(e) => ExportError::Format(e),
            ResolveError::ShapeMismatch(e) => ExportError::ShapeMismatch(e),
        }
    }
}

impl From<WriteError> for ExportError {
    fn from(e: WriteError) -> Self {
        match e {
            WriteError::Validation(e) => ExportError::GraphValidation(e),
            WriteError::Io { path, source } => ExportError::Io { path, source },
        }
    }
}

impl From<CheckpointError> for ExportError {
    fn from(e: CheckpointError) -> Self {
        match e {
            CheckpointError::Io { path, source } => ExportError::Io { path, source },
            CheckpointError::Format(e) => ExportError::Format(e),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportOptions {
    /// Board edge to declare instead of the checkpoint header's.
    pub board_size_override: Option<u32>,
    /// `None` skips the read-back check.
    pub parity: Option<ParityOptions>,
}

/// Result of the read-back check. Never turns a successful export into an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ParityOutcome {
    Skipped,
    Checked(ParityReport),
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub bytes: u64,
    pub board_size: u32,
    pub input_dim: usize,
    pub step: u64,
    pub overridden: bool,
    pub parity: ParityOutcome,
}

/// Convert an in-memory checkpoint and write the model to `out`.
pub fn export_bytes(
    bytes: &[u8],
    out: &Path,
    opts: ExportOptions,
) -> Result<ExportSummary, ExportError> {
    export_parsed(read_checkpoint(bytes)?, out, opts)
}

/// Read `checkpoint` from disk and export it to `out`.
pub fn export_checkpoint(
    checkpoint: &Path,
    out: &Path,
    opts: ExportOptions,
) -> Result<ExportSummary, ExportError> {
    export_parsed(load_checkpoint(checkpoint)?, out, opts)
}

fn export_parsed(
    ckpt: Checkpoint,
    out: &Path,
    opts: ExportOptions,
) -> Result<ExportSummary, ExportError> {
    debug(
        "export",
        "checkpoint parsed",
        json!({
            "board_size": ckpt.header.board_size,
            "input_dim": ckpt.header.input_dim,
            "step": ckpt.header.step,
            "trailing": ckpt.trailing,
        }),
    );

    let model = resolve(ckpt, opts.board_size_override)?;
    let graph = compile(&model);
    debug(
        "export",
        "graph compiled",
        json!({
            "nodes": graph.nodes.len(),
            "initializers": graph.initializers.len(),
            "overridden": model.overridden,
        }),
    );

    let written = write_graph(&graph, out)?;

    let parity = match opts.parity {
        None => ParityOutcome::Skipped,
        Some(p) => match parity_check(&written.path, &model.weights, p) {
            Ok(report) => ParityOutcome::Checked(report),
            Err(e) => ParityOutcome::Failed {
                reason: e.to_string(),
            },
        },
    };
    debug("export", "written", json!({ "bytes": written.bytes }));

    Ok(ExportSummary {
        path: written.path,
        bytes: written.bytes,
        board_size: model.board_size,
        input_dim: model.input_dim,
        step: model.step,
        overridden: model.overridden,
        parity,
    })
}
