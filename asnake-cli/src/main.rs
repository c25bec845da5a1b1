//! asnake: CLI binary for exporting AlphaSnake checkpoints to ONNX.
//!
//! Subcommands:
//! - export
//! - inspect
//! - forward

use std::env;
use std::path::{Path, PathBuf};
use std::process;
use std::str::FromStr;
use std::time::Instant;

use asnake_ckpt::{read_checkpoint, FORMAT_VERSION, MAGIC};
use asnake_core::{validate_config, Config};
use asnake_graph::schema::{IR_VERSION, OPSET_VERSION};
use asnake_graph::{
    batch_len, decode_model, export_bytes, synthetic_states, validate, ExportError,
    ExportOptions, ExportSummary, GraphSession, ParityOptions, ParityOutcome,
};
use asnake_logging::{ExportEventV1, NdjsonWriter, ParitySummaryV1, VersionInfoV1};

/// Max abs diff above which the parity line is flagged.
const PARITY_WARN_TOL: f32 = 1e-4;

fn print_help() {
    eprintln!(
        r#"asnake - AlphaSnake checkpoint exporter

USAGE:
    asnake <COMMAND> [OPTIONS]

COMMANDS:
    export      Convert a linear policy/value checkpoint to ONNX
    inspect     Print checkpoint header and tensor sizes
    forward     Evaluate an exported ONNX model on a synthetic state

OPTIONS:
    -h, --help          Print this help message
    -V, --version       Print version

Run `asnake <COMMAND> --help` for command options.
"#
    );
}

fn print_version() {
    println!("asnake {}", env!("CARGO_PKG_VERSION"));
}

/// Parse the value following `args[i]` or exit with a usage error.
fn flag_value<T: FromStr>(args: &[String], i: usize) -> T {
    let flag = &args[i];
    let Some(raw) = args.get(i + 1) else {
        eprintln!("Missing value for {flag}");
        process::exit(1);
    };
    raw.parse().unwrap_or_else(|_| {
        eprintln!("Invalid {flag} value: {raw}");
        process::exit(1);
    })
}

fn load_config(path: Option<&str>) -> Config {
    let cfg = match path {
        None => Config::default(),
        Some(p) => Config::load(p).unwrap_or_else(|e| {
            eprintln!("Failed to load config {p}: {e}");
            process::exit(1);
        }),
    };
    if let Err(msg) = validate_config(&cfg) {
        eprintln!("Invalid config: {msg}");
        process::exit(1);
    }
    cfg
}

fn cmd_export(args: &[String]) {
    let mut config_path: Option<String> = None;
    let mut checkpoint: Option<PathBuf> = None;
    let mut out: Option<PathBuf> = None;
    let mut board_size: Option<u32> = None;
    let mut board_size_from_config = false;
    let mut no_parity = false;
    let mut parity_seed: Option<u64> = None;
    let mut parity_batch: Option<usize> = None;
    let mut report: Option<PathBuf> = None;
    let mut log: Option<PathBuf> = None;

    let mut i = 0usize;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                println!(
                    r#"asnake export

USAGE:
    asnake export [--config cfg.yaml] [--checkpoint PATH] [--out PATH] [OPTIONS]

OPTIONS:
    --config PATH              YAML config (env.board_size, save_dir, export.*)
    --checkpoint PATH          Checkpoint file (default: <save_dir>/best_model.bin)
    --out PATH                 Output .onnx file (default: <save_dir>/alphasnake.onnx)
    --board-size N             Declare board size N instead of the checkpoint's
    --board-size-from-config   Use env.board_size from the config as the override
    --no-parity                Skip the read-back parity check
    --parity-seed S            Seed for the parity input (default: export.parity_seed)
    --parity-batch N           Parity batch rows (default: export.parity_batch)
    --report PATH              Write the export summary as JSON
    --log PATH                 Append one NDJSON export event
"#
                );
                return;
            }
            "--config" => {
                config_path = Some(flag_value(args, i));
                i += 2;
            }
            "--checkpoint" => {
                checkpoint = Some(flag_value(args, i));
                i += 2;
            }
            "--out" => {
                out = Some(flag_value(args, i));
                i += 2;
            }
            "--board-size" => {
                board_size = Some(flag_value(args, i));
                i += 2;
            }
            "--board-size-from-config" => {
                board_size_from_config = true;
                i += 1;
            }
            "--no-parity" => {
                no_parity = true;
                i += 1;
            }
            "--parity-seed" => {
                parity_seed = Some(flag_value(args, i));
                i += 2;
            }
            "--parity-batch" => {
                parity_batch = Some(flag_value(args, i));
                i += 2;
            }
            "--report" => {
                report = Some(flag_value(args, i));
                i += 2;
            }
            "--log" => {
                log = Some(flag_value(args, i));
                i += 2;
            }
            other => {
                eprintln!("Unknown option for `asnake export`: {}", other);
                eprintln!("Run `asnake export --help` for usage.");
                process::exit(1);
            }
        }
    }

    if board_size.is_some() && board_size_from_config {
        eprintln!("--board-size and --board-size-from-config are mutually exclusive");
        process::exit(1);
    }
    if parity_batch == Some(0) {
        eprintln!("--parity-batch must be >= 1");
        process::exit(1);
    }

    let cfg = load_config(config_path.as_deref());
    let checkpoint = checkpoint.unwrap_or_else(|| cfg.checkpoint_path());
    let out = out.unwrap_or_else(|| cfg.onnx_path());
    let board_size_override = if board_size_from_config {
        Some(cfg.env.board_size)
    } else {
        board_size
    };
    let parity = (cfg.export.parity_check && !no_parity).then(|| ParityOptions {
        seed: parity_seed.unwrap_or(cfg.export.parity_seed),
        batch: parity_batch.unwrap_or(cfg.export.parity_batch as usize),
    });
    let opts = ExportOptions {
        board_size_override,
        parity,
    };

    println!(
        "Exporting {} -> {}",
        checkpoint.display(),
        out.display()
    );

    let t0 = Instant::now();
    let bytes = std::fs::read(&checkpoint);
    let checkpoint_hash = bytes.as_ref().ok().map(|b| asnake_logging::hash_bytes(b));
    let result = match bytes {
        Ok(b) => export_bytes(&b, &out, opts),
        Err(source) => Err(ExportError::Io {
            path: checkpoint.clone(),
            source,
        }),
    };

    if let Some(path) = &log {
        let event = export_event(
            &checkpoint,
            &out,
            checkpoint_hash,
            board_size_override,
            &result,
            t0.elapsed().as_millis() as u64,
        );
        let written = NdjsonWriter::open_append(path).and_then(|mut w| {
            w.write_event(&event)?;
            w.flush()
        });
        if let Err(e) = written {
            eprintln!("Warning: failed to append export log {}: {e}", path.display());
        }
    }

    let summary = match result {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Export failed [{}]: {e}", e.kind());
            process::exit(1);
        }
    };

    println!(
        "Exported ONNX model: {} ({} bytes)",
        summary.path.display(),
        summary.bytes
    );
    println!(
        "  - board_size={} input_dim={} step={}{}",
        summary.board_size,
        summary.input_dim,
        summary.step,
        if summary.overridden {
            " (board size overridden)"
        } else {
            ""
        }
    );
    match &summary.parity {
        ParityOutcome::Skipped => println!("  - Parity check: skipped"),
        ParityOutcome::Checked(r) => {
            println!(
                "  - Parity check max|diff|: policy={:.3e} value={:.3e}",
                r.policy_max_abs_diff, r.value_max_abs_diff
            );
            if !r.within(PARITY_WARN_TOL) {
                eprintln!("Warning: parity diff above {PARITY_WARN_TOL:e}");
            }
        }
        ParityOutcome::Failed { reason } => {
            eprintln!("Warning: parity check could not run: {reason}");
        }
    }

    if let Some(path) = &report {
        if let Err(e) = asnake_logging::write_json_atomic(path, &summary) {
            eprintln!("Failed to write report {}: {e}", path.display());
            process::exit(1);
        }
        println!("  - Report: {}", path.display());
    }
}

fn export_event(
    checkpoint: &Path,
    out: &Path,
    checkpoint_hash: Option<String>,
    board_size_override: Option<u32>,
    result: &Result<ExportSummary, ExportError>,
    duration_ms: u64,
) -> ExportEventV1 {
    let ok = result.as_ref().ok();
    ExportEventV1 {
        event: "export".to_string(),
        event_version: asnake_logging::EXPORT_EVENT_VERSION,
        ts_ms: asnake_logging::now_ms(),
        v: VersionInfoV1 {
            checkpoint_magic: MAGIC,
            checkpoint_format_version: FORMAT_VERSION,
            onnx_ir_version: IR_VERSION,
            onnx_opset: OPSET_VERSION,
        },
        checkpoint: checkpoint.display().to_string(),
        checkpoint_hash,
        output: out.display().to_string(),
        git_hash: asnake_logging::try_git_hash(),
        board_size_override,
        board_size: ok.map(|s| s.board_size),
        input_dim: ok.map(|s| s.input_dim),
        step: ok.map(|s| s.step),
        bytes: ok.map(|s| s.bytes),
        status: (if ok.is_some() { "ok" } else { "error" }).to_string(),
        error_kind: result.as_ref().err().map(|e| e.kind().to_string()),
        error: result.as_ref().err().map(|e| e.to_string()),
        parity: ok.and_then(|s| match &s.parity {
            ParityOutcome::Checked(r) => Some(ParitySummaryV1 {
                batch: r.batch,
                seed: r.seed,
                policy_max_abs_diff: r.policy_max_abs_diff,
                value_max_abs_diff: r.value_max_abs_diff,
            }),
            _ => None,
        }),
        duration_ms,
    }
}

fn cmd_inspect(args: &[String]) {
    let mut config_path: Option<String> = None;
    let mut checkpoint: Option<PathBuf> = None;

    let mut i = 0usize;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                println!(
                    r#"asnake inspect

USAGE:
    asnake inspect [--config cfg.yaml] [--checkpoint PATH]

OPTIONS:
    --config PATH        YAML config (for the default checkpoint path)
    --checkpoint PATH    Checkpoint file (default: <save_dir>/best_model.bin)
"#
                );
                return;
            }
            "--config" => {
                config_path = Some(flag_value(args, i));
                i += 2;
            }
            "--checkpoint" => {
                checkpoint = Some(flag_value(args, i));
                i += 2;
            }
            other => {
                eprintln!("Unknown option for `asnake inspect`: {}", other);
                eprintln!("Run `asnake inspect --help` for usage.");
                process::exit(1);
            }
        }
    }

    let checkpoint =
        checkpoint.unwrap_or_else(|| load_config(config_path.as_deref()).checkpoint_path());
    let bytes = std::fs::read(&checkpoint).unwrap_or_else(|e| {
        eprintln!("Failed to read {}: {e}", checkpoint.display());
        process::exit(1);
    });
    let ckpt = read_checkpoint(&bytes).unwrap_or_else(|e| {
        eprintln!("Invalid checkpoint {}: {e}", checkpoint.display());
        process::exit(1);
    });

    let h = ckpt.header;
    println!("Checkpoint: {}", checkpoint.display());
    println!("  - magic=0x{:08X} version={}", h.magic, h.version);
    println!(
        "  - board_size={} input_dim={} step={}",
        h.board_size, h.input_dim, h.step
    );
    println!(
        "  - policy_weights={} policy_bias={} value_weights={} value_bias=1",
        ckpt.raw.policy_weights.len(),
        ckpt.raw.policy_bias.len(),
        ckpt.raw.value_weights.len()
    );
    println!(
        "  - bytes={} parsed={} trailing={}",
        bytes.len(),
        ckpt.consumed,
        ckpt.trailing
    );
    println!("  - blake3={}", asnake_logging::hash_bytes(&bytes));
}

fn cmd_forward(args: &[String]) {
    let mut model: Option<PathBuf> = None;
    let mut seed: Option<u64> = None;
    let mut batch: usize = 1;

    let mut i = 0usize;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                println!(
                    r#"asnake forward

USAGE:
    asnake forward --model PATH [--seed S] [--batch N]

OPTIONS:
    --model PATH    Exported .onnx file
    --seed S        Use seeded N(0,1) states instead of all-zero states
    --batch N       Number of states (default: 1)
"#
                );
                return;
            }
            "--model" => {
                model = Some(flag_value(args, i));
                i += 2;
            }
            "--seed" => {
                seed = Some(flag_value(args, i));
                i += 2;
            }
            "--batch" => {
                batch = flag_value(args, i);
                i += 2;
            }
            other => {
                eprintln!("Unknown option for `asnake forward`: {}", other);
                eprintln!("Run `asnake forward --help` for usage.");
                process::exit(1);
            }
        }
    }

    let model = model.unwrap_or_else(|| {
        eprintln!("Missing --model");
        process::exit(1);
    });
    let bytes = std::fs::read(&model).unwrap_or_else(|e| {
        eprintln!("Failed to read {}: {e}", model.display());
        process::exit(1);
    });
    let graph = decode_model(&bytes).unwrap_or_else(|e| {
        eprintln!("Failed to decode {}: {e}", model.display());
        process::exit(1);
    });
    if let Err(e) = validate(&graph) {
        eprintln!("Invalid graph in {}: {e}", model.display());
        process::exit(1);
    }
    let session = GraphSession::new(graph).unwrap_or_else(|e| {
        eprintln!("Unsupported graph: {e}");
        process::exit(1);
    });

    let Some(len) = batch_len(session.board_size(), batch) else {
        eprintln!("--batch {batch} is too large for board_size={}", session.board_size());
        process::exit(1);
    };
    let states = match seed {
        Some(s) => synthetic_states(session.board_size(), batch, s).unwrap_or_default(),
        None => vec![0.0; len],
    };
    let preds = session.run_batch(&states, batch).unwrap_or_else(|e| {
        eprintln!("Forward pass failed: {e}");
        process::exit(1);
    });

    println!(
        "Model: {} (board_size={})",
        model.display(),
        session.board_size()
    );
    for (row, p) in preds.iter().enumerate() {
        println!(
            "  [{row}] policy=[{:.6}, {:.6}, {:.6}, {:.6}] value={:.6}",
            p.policy[0], p.policy[1], p.policy[2], p.policy[3], p.value
        );
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_help();
        process::exit(0);
    }

    match args[1].as_str() {
        "-h" | "--help" | "help" => {
            print_help();
        }
        "-V" | "--version" => {
            print_version();
        }
        "export" => {
            cmd_export(&args[2..]);
        }
        "inspect" => {
            cmd_inspect(&args[2..]);
        }
        "forward" => {
            cmd_forward(&args[2..]);
        }
        cmd => {
            eprintln!("Unknown command: {}", cmd);
            eprintln!("Run `asnake --help` for usage.");
            process::exit(1);
        }
    }
}
