//! Resolved checkpoint → graph IR.
//!
//! ```text
//! state[batch,4,B,B] ─Reshape(shape_flat)─> state_flat[batch,D]
//!   state_flat ─Gemm(W_policy[D,4], B_policy[4])─> policy_logits ─Softmax(axis=1)─> policy
//!   state_flat ─Gemm(W_value[D,1],  B_value[1])──> value_linear  ─Tanh──────────> value
//! ```
//!
//! Gemm runs with `transB=0`, i.e. `Y = X·W + b`, so weight initializers are stored
//! feature-major (`[D, out]`). Reshape keeps the row-major (channel, row, column)
//! order the trainer flattened states with.

use asnake_ckpt::ResolvedModel;
use asnake_core::{ACTIONS, CHANNELS};

use crate::ir::{AttrValue, Dim, Graph, Initializer, Node, OpKind, TensorSpec};
use crate::schema::{
    DIM_BATCH, GRAPH_NAME, N_POLICY_GEMM, N_POLICY_SOFTMAX, N_RESHAPE, N_VALUE_GEMM,
    N_VALUE_TANH, T_B_POLICY, T_B_VALUE, T_POLICY, T_POLICY_LOGITS, T_SHAPE_FLAT, T_STATE,
    T_STATE_FLAT, T_VALUE, T_VALUE_LINEAR, T_W_POLICY, T_W_VALUE,
};

pub fn compile(model: &ResolvedModel) -> Graph {
    let board = model.board_size as usize;
    let input_dim = model.input_dim;
    let w = &model.weights;

    let inputs = vec![TensorSpec::f32(
        T_STATE,
        vec![
            Dim::sym(DIM_BATCH),
            Dim::Fixed(CHANNELS),
            Dim::Fixed(board),
            Dim::Fixed(board),
        ],
    )];
    let outputs = vec![
        TensorSpec::f32(T_POLICY, vec![Dim::sym(DIM_BATCH), Dim::Fixed(ACTIONS)]),
        TensorSpec::f32(T_VALUE, vec![Dim::sym(DIM_BATCH), Dim::Fixed(1)]),
    ];

    let initializers = vec![
        Initializer::i64(T_SHAPE_FLAT, vec![2], vec![-1, input_dim as i64]),
        Initializer::f32(
            T_W_POLICY,
            vec![input_dim, ACTIONS],
            w.policy_weights_transposed(),
        ),
        Initializer::f32(T_B_POLICY, vec![ACTIONS], w.policy_bias().to_vec()),
        // [D] read as a [D, 1] column: same element order.
        Initializer::f32(T_W_VALUE, vec![input_dim, 1], w.value_weights().to_vec()),
        Initializer::f32(T_B_VALUE, vec![1], vec![w.value_bias()]),
    ];

    let nodes = vec![
        Node::new(N_RESHAPE, OpKind::Reshape, &[T_STATE, T_SHAPE_FLAT], &[T_STATE_FLAT]),
        affine(N_POLICY_GEMM, T_W_POLICY, T_B_POLICY, T_POLICY_LOGITS),
        Node::new(
            N_POLICY_SOFTMAX,
            OpKind::Softmax,
            &[T_POLICY_LOGITS],
            &[T_POLICY],
        )
        .with_attr("axis", AttrValue::Int(1)),
        affine(N_VALUE_GEMM, T_W_VALUE, T_B_VALUE, T_VALUE_LINEAR),
        Node::new(N_VALUE_TANH, OpKind::Tanh, &[T_VALUE_LINEAR], &[T_VALUE]),
    ];

    Graph {
        name: GRAPH_NAME.to_string(),
        inputs,
        outputs,
        initializers,
        nodes,
    }
}

/// `state_flat · weight + bias`
fn affine(name: &str, weight: &str, bias: &str, out: &str) -> Node {
    Node::new(name, OpKind::Gemm, &[T_STATE_FLAT, weight, bias], &[out])
        .with_attr("alpha", AttrValue::Float(1.0))
        .with_attr("beta", AttrValue::Float(1.0))
        .with_attr("transB", AttrValue::Int(0))
}
