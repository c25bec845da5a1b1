use std::fs;

use asnake_ckpt::{FormatError, ShapeMismatchError};

use crate::test_support::{checkpoint_bytes, patterned, zeros};
use crate::writer::tmp_path;
use crate::{
    compile, decode_model, export_bytes, export_checkpoint, write_graph, ExportError,
    ExportOptions, GraphValidationError, ParityOptions, ParityOutcome, WriteError,
};

fn with_parity() -> ExportOptions {
    ExportOptions {
        board_size_override: None,
        parity: Some(ParityOptions::default()),
    }
}

#[test]
fn export_writes_a_decodable_model() {
    let dir = tempfile::tempdir().unwrap();
    let ckpt = dir.path().join("best_model.bin");
    fs::write(&ckpt, checkpoint_bytes(5, &patterned(100))).unwrap();
    let out = dir.path().join("nested/alphasnake.onnx");

    let summary = export_checkpoint(&ckpt, &out, with_parity()).unwrap();
    assert_eq!(summary.path, out);
    assert_eq!(summary.board_size, 5);
    assert_eq!(summary.input_dim, 100);
    assert_eq!(summary.step, 42);
    assert!(!summary.overridden);
    assert_eq!(summary.bytes, fs::metadata(&out).unwrap().len());
    assert!(!tmp_path(&out).exists());

    match &summary.parity {
        ParityOutcome::Checked(r) => {
            assert_eq!(r.batch, 2);
            assert!(r.within(1e-5), "{r:?}");
        }
        other => panic!("unexpected parity outcome {other:?}"),
    }

    let g = decode_model(&fs::read(&out).unwrap()).unwrap();
    assert_eq!(g.nodes.len(), 5);
}

#[test]
fn zero_checkpoint_has_exact_parity() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("m.onnx");
    let summary = export_bytes(&checkpoint_bytes(5, &zeros(100)), &out, with_parity()).unwrap();
    let ParityOutcome::Checked(r) = summary.parity else {
        panic!("parity should run");
    };
    assert_eq!(r.policy_max_abs_diff, 0.0);
    assert_eq!(r.value_max_abs_diff, 0.0);
}

#[test]
fn parity_can_be_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("m.onnx");
    let summary =
        export_bytes(&checkpoint_bytes(2, &patterned(16)), &out, ExportOptions::default())
            .unwrap();
    assert_eq!(summary.parity, ParityOutcome::Skipped);
    assert!(out.exists());
}

#[test]
fn incompatible_override_fails_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("m.onnx");
    let opts = ExportOptions {
        board_size_override: Some(7),
        parity: None,
    };
    let err = export_bytes(&checkpoint_bytes(5, &zeros(100)), &out, opts).unwrap_err();
    assert_eq!(err.kind(), "shape_mismatch");
    match err {
        ExportError::ShapeMismatch(ShapeMismatchError {
            checkpoint_input_dim,
            override_input_dim,
            ..
        }) => {
            assert_eq!(checkpoint_input_dim, 100);
            assert_eq!(override_input_dim, Some(196));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(!out.exists());
    assert!(!tmp_path(&out).exists());
}

#[test]
fn zero_length_checkpoint_is_a_format_error() {
    let dir = tempfile::tempdir().unwrap();
    let ckpt = dir.path().join("empty.bin");
    fs::write(&ckpt, b"").unwrap();
    let out = dir.path().join("m.onnx");

    let err = export_checkpoint(&ckpt, &out, with_parity()).unwrap_err();
    assert!(matches!(
        err,
        ExportError::Format(FormatError::Truncated { field: "magic", .. })
    ));
    assert_eq!(err.kind(), "format");
    assert!(!out.exists());
}

#[test]
fn missing_checkpoint_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let ckpt = dir.path().join("nope.bin");
    let err = export_checkpoint(&ckpt, &dir.path().join("m.onnx"), ExportOptions::default())
        .unwrap_err();
    match err {
        ExportError::Io { path, .. } => assert_eq!(path, ckpt),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn failed_export_leaves_previous_model_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("m.onnx");
    fs::write(&out, b"previous").unwrap();

    let mut bad = checkpoint_bytes(5, &zeros(100));
    bad[0] ^= 0xff;
    let err = export_bytes(&bad, &out, ExportOptions::default()).unwrap_err();
    assert!(matches!(err, ExportError::Format(FormatError::BadMagic { .. })));
    assert_eq!(fs::read(&out).unwrap(), b"previous");
}

#[test]
fn successful_export_replaces_previous_model() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("m.onnx");
    fs::write(&out, b"previous").unwrap();
    export_bytes(&checkpoint_bytes(1, &patterned(4)), &out, ExportOptions::default()).unwrap();
    assert!(decode_model(&fs::read(&out).unwrap()).is_ok());
}

#[test]
fn invalid_graph_is_never_written() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("m.onnx");
    let m = crate::test_support::model(2, &patterned(16));
    let mut g = compile(&m);
    g.nodes.pop();

    let err = write_graph(&g, &out).unwrap_err();
    assert!(matches!(
        err,
        WriteError::Validation(GraphValidationError::UnproducedOutput(_))
    ));
    assert!(!out.exists());
    let err: ExportError = err.into();
    assert_eq!(err.kind(), "graph_validation");
}

#[test]
fn unwritable_destination_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    // A regular file where a parent directory is needed.
    let blocker = dir.path().join("file");
    fs::write(&blocker, b"x").unwrap();
    let out = blocker.join("m.onnx");
    let err = export_bytes(&checkpoint_bytes(1, &patterned(4)), &out, ExportOptions::default())
        .unwrap_err();
    assert_eq!(err.kind(), "io");
}

#[test]
fn override_equal_to_header_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("m.onnx");
    let opts = ExportOptions {
        board_size_override: Some(5),
        parity: None,
    };
    let summary = export_bytes(&checkpoint_bytes(5, &zeros(100)), &out, opts).unwrap();
    assert!(!summary.overridden);
}

#[test]
fn summary_serializes_parity_status() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("m.onnx");
    let summary =
        export_bytes(&checkpoint_bytes(1, &patterned(4)), &out, with_parity()).unwrap();
    let v = serde_json::to_value(&summary).unwrap();
    assert_eq!(v["parity"]["status"], "checked");
    assert_eq!(v["parity"]["batch"], 2);
    assert_eq!(v["input_dim"], 4);
}

#[test]
fn non_finite_outputs_fail_parity() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("m.onnx");
    let mut raw = zeros(100);
    raw.policy_weights[0] = f32::NAN;
    raw.value_bias = f32::NAN;

    let summary = export_bytes(&checkpoint_bytes(5, &raw), &out, with_parity()).unwrap();
    let ParityOutcome::Checked(r) = summary.parity else {
        panic!("parity should run");
    };
    assert!(!r.within(1e-4), "{r:?}");
    assert_eq!(r.policy_max_abs_diff, f32::INFINITY);
    assert_eq!(r.value_max_abs_diff, f32::INFINITY);
}

#[test]
fn oversized_parity_batch_is_reported_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("m.onnx");
    let opts = ExportOptions {
        board_size_override: None,
        parity: Some(ParityOptions {
            seed: 0,
            batch: usize::MAX / 2,
        }),
    };
    let summary = export_bytes(&checkpoint_bytes(2, &zeros(16)), &out, opts).unwrap();
    match summary.parity {
        ParityOutcome::Failed { reason } => assert!(reason.contains("overflows"), "{reason}"),
        other => panic!("unexpected {other:?}"),
    }
    assert!(out.exists());
}
