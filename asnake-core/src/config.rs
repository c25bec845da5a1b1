//! Export configuration.
//!
//! The exporter reads the same YAML file as the trainer; only the keys it needs are
//! modelled here and every other section (mcts, train, selfplay, ...) is ignored.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Environment geometry.
    #[serde(default)]
    pub env: EnvConfig,
    /// Run directory holding checkpoints and exported models.
    #[serde(default = "default_save_dir")]
    pub save_dir: String,
    /// Export settings.
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EnvConfig {
    /// Square board edge length.
    #[serde(default = "default_board_size")]
    pub board_size: u32,
}

fn default_board_size() -> u32 {
    10
}

fn default_save_dir() -> String {
    "runs/alphasnake".to_string()
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            board_size: default_board_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExportConfig {
    /// Checkpoint file name under `save_dir`.
    #[serde(default = "default_checkpoint_name")]
    pub checkpoint_name: String,
    /// ONNX file name under `save_dir`.
    #[serde(default = "default_onnx_name")]
    pub onnx_name: String,
    /// Re-load the written graph and compare it against the checkpoint weights.
    #[serde(default = "default_parity_check")]
    pub parity_check: bool,
    /// Seed for the synthetic parity input.
    #[serde(default)]
    pub parity_seed: u64,
    /// Rows in the synthetic parity batch.
    #[serde(default = "default_parity_batch")]
    pub parity_batch: u32,
}

fn default_checkpoint_name() -> String {
    "best_model.bin".to_string()
}

fn default_onnx_name() -> String {
    "alphasnake.onnx".to_string()
}

fn default_parity_check() -> bool {
    true
}

fn default_parity_batch() -> u32 {
    2
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            checkpoint_name: default_checkpoint_name(),
            onnx_name: default_onnx_name(),
            parity_check: default_parity_check(),
            parity_seed: 0,
            parity_batch: default_parity_batch(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            env: EnvConfig::default(),
            save_dir: default_save_dir(),
            export: ExportConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Default checkpoint location: `<save_dir>/<checkpoint_name>`.
    pub fn checkpoint_path(&self) -> PathBuf {
        Path::new(&self.save_dir).join(&self.export.checkpoint_name)
    }

    /// Default export location: `<save_dir>/<onnx_name>`.
    pub fn onnx_path(&self) -> PathBuf {
        Path::new(&self.save_dir).join(&self.export.onnx_name)
    }
}

pub fn validate_config(cfg: &Config) -> Result<(), String> {
    if cfg.env.board_size < 1 {
        return Err("env.board_size must be >= 1".to_string());
    }
    if crate::input_dim_for(cfg.env.board_size).is_none() {
        return Err("env.board_size is too large".to_string());
    }
    if cfg.save_dir.trim().is_empty() {
        return Err("save_dir must be non-empty".to_string());
    }
    if cfg.export.checkpoint_name.trim().is_empty() {
        return Err("export.checkpoint_name must be non-empty".to_string());
    }
    if cfg.export.onnx_name.trim().is_empty() {
        return Err("export.onnx_name must be non-empty".to_string());
    }
    if cfg.export.parity_batch < 1 {
        return Err("export.parity_batch must be >= 1".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = Config::default();
        assert_eq!(cfg.env.board_size, 10);
        assert!(cfg.export.parity_check);
        assert_eq!(cfg.export.parity_batch, 2);
        assert!(validate_config(&cfg).is_ok());
        assert_eq!(
            cfg.checkpoint_path(),
            Path::new("runs/alphasnake").join("best_model.bin")
        );
        assert_eq!(
            cfg.onnx_path(),
            Path::new("runs/alphasnake").join("alphasnake.onnx")
        );
    }

    #[test]
    fn test_training_sections_are_ignored() {
        let yaml = r#"
env:
  board_size: 20
  max_steps: 1000
model:
  channels: 64
  blocks: 6
mcts:
  simulations: 400
  cpuct: 1.0
train:
  lr: 0.001
  batch_size: 128
seed: 42
save_dir: "/workspace/alphasnake_paper_20x20"
"#;
        let cfg = Config::from_yaml(yaml).expect("Failed to parse YAML");
        assert_eq!(cfg.env.board_size, 20);
        assert_eq!(cfg.save_dir, "/workspace/alphasnake_paper_20x20");
        // Export section absent: defaults apply.
        assert_eq!(cfg.export.onnx_name, "alphasnake.onnx");
        assert_eq!(
            cfg.onnx_path(),
            Path::new("/workspace/alphasnake_paper_20x20").join("alphasnake.onnx")
        );
    }

    #[test]
    fn test_export_section_overrides() {
        let yaml = r#"
save_dir: runs/x
export:
  checkpoint_name: ckpt_0042.bin
  parity_check: false
  parity_seed: 7
  parity_batch: 8
"#;
        let cfg = Config::from_yaml(yaml).unwrap();
        assert_eq!(cfg.env.board_size, 10);
        assert_eq!(cfg.export.checkpoint_name, "ckpt_0042.bin");
        assert!(!cfg.export.parity_check);
        assert_eq!(cfg.export.parity_seed, 7);
        assert_eq!(cfg.export.parity_batch, 8);
    }

    #[test]
    fn test_validate_rejects_zero_board_and_batch() {
        let mut cfg = Config::default();
        cfg.env.board_size = 0;
        assert!(validate_config(&cfg).unwrap_err().contains("env.board_size"));

        let mut cfg = Config::default();
        cfg.export.parity_batch = 0;
        assert!(validate_config(&cfg)
            .unwrap_err()
            .contains("export.parity_batch"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.yaml");
        std::fs::write(&path, "env:\n  board_size: 7\n").unwrap();
        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.env.board_size, 7);
    }

    #[test]
    fn test_invalid_yaml_fails() {
        let invalid_yaml = "this is not: valid: yaml: {{{}}}";
        assert!(Config::from_yaml(invalid_yaml).is_err());
    }
}
