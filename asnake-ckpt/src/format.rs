//! Checkpoint binary layout (little-endian).
//!
//! ```text
//! magic        u32          0x314D5341 ("ASM1")
//! version      u32
//! board_size   u32
//! input_dim    u32          4 * board_size^2
//! step         u64
//! wp           u64 n + f32[n]   policy weights, row-major [4, input_dim]
//! bp           f32[4]           policy bias, no length prefix
//! wv           u64 n + f32[n]   value weights [input_dim]
//! bv           f32              value bias
//! ...          optimizer state, never read by the exporter
//! ```

use asnake_core::ACTIONS;

/// Format identifier ("ASM1" read as a little-endian u32).
pub const MAGIC: u32 = 0x314D_5341;

/// Version written by the trainer.
pub const FORMAT_VERSION: u32 = 1;

/// Fixed-size header: magic + version + board_size + input_dim + step.
pub const HEADER_LEN: usize = 4 + 4 + 4 + 4 + 8;

/// Policy bias is stored inline without a length prefix.
pub const POLICY_BIAS_LEN: usize = ACTIONS;

/// Field names used in error messages.
pub const F_MAGIC: &str = "magic";
pub const F_VERSION: &str = "version";
pub const F_BOARD_SIZE: &str = "board_size";
pub const F_INPUT_DIM: &str = "input_dim";
pub const F_STEP: &str = "step";
pub const F_POLICY_WEIGHTS: &str = "policy_weights";
pub const F_POLICY_BIAS: &str = "policy_bias";
pub const F_VALUE_WEIGHTS: &str = "value_weights";
pub const F_VALUE_BIAS: &str = "value_bias";
