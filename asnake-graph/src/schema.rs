//! Frozen names and version pins of the exported graph.
//!
//! Downstream consumers match on these names and on the five-node sequence, so they
//! are part of the output contract.

/// ONNX IR version written into `ModelProto.ir_version` (pairs with opset 17).
pub const IR_VERSION: i64 = 8;

/// Default-domain opset.
pub const OPSET_VERSION: i64 = 17;

pub const PRODUCER_NAME: &str = "alphasnake_rust_export";
pub const GRAPH_NAME: &str = "AlphaSnakeLinearPV";

/// Symbolic batch dimension.
pub const DIM_BATCH: &str = "batch";

/// Graph input/output tensors.
pub const T_STATE: &str = "state";
pub const T_POLICY: &str = "policy";
pub const T_VALUE: &str = "value";

/// Initializers.
pub const T_SHAPE_FLAT: &str = "shape_flat";
pub const T_W_POLICY: &str = "W_policy";
pub const T_B_POLICY: &str = "B_policy";
pub const T_W_VALUE: &str = "W_value";
pub const T_B_VALUE: &str = "B_value";

/// Intermediates.
pub const T_STATE_FLAT: &str = "state_flat";
pub const T_POLICY_LOGITS: &str = "policy_logits";
pub const T_VALUE_LINEAR: &str = "value_linear";

/// Nodes, in emission order.
pub const N_RESHAPE: &str = "reshape_flat";
pub const N_POLICY_GEMM: &str = "policy_gemm";
pub const N_POLICY_SOFTMAX: &str = "policy_softmax";
pub const N_VALUE_GEMM: &str = "value_gemm";
pub const N_VALUE_TANH: &str = "value_tanh";
