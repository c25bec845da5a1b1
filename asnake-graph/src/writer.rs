//! Validate, serialize and atomically write a graph as `.onnx`.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::ir::Graph;
use crate::onnx::encode_model;
use crate::validate::{validate, GraphValidationError};

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("graph validation failed: {0}")]
    Validation(#[from] GraphValidationError),
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteReport {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Sibling temp file: `<file name>.tmp` in the same directory, so the final rename
/// never crosses a file system.
pub fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("model.onnx"));
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `graph` to `path`.
///
/// Nothing touches the file system until validation has passed. On any failure the
/// destination is left as it was (absent or the previous file).
pub fn write_graph(graph: &Graph, path: &Path) -> Result<WriteReport, WriteError> {
    validate(graph)?;
    let bytes = encode_model(graph);

    let io_err = |p: &Path| {
        let p = p.to_path_buf();
        move |source| WriteError::Io { path: p, source }
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }

    let tmp = tmp_path(path);
    if let Err(e) = fs::write(&tmp, &bytes) {
        let _ = fs::remove_file(&tmp);
        return Err(io_err(&tmp)(e));
    }
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(io_err(path)(e));
    }

    Ok(WriteReport {
        path: path.to_path_buf(),
        bytes: bytes.len() as u64,
    })
}
