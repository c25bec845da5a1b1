use crate::ir::{AttrValue, Dim, Graph, Initializer, Node, OpKind, TensorSpec};
use crate::schema::*;
use crate::test_support::{model, patterned};
use crate::{compile, validate, GraphValidationError};

fn graph() -> Graph {
    compile(&model(3, &patterned(36)))
}

fn node_error(g: &Graph) -> (String, String) {
    match validate(g) {
        Err(GraphValidationError::Node { node, reason }) => (node, reason),
        other => panic!("expected node error, got {other:?}"),
    }
}

#[test]
fn compiled_graph_is_valid() {
    validate(&graph()).unwrap();
}

#[test]
fn initializer_element_count_must_match_dims() {
    let mut g = graph();
    g.initializers[1] = Initializer::f32(T_W_POLICY, vec![36, 4], vec![0.0; 143]);
    assert_eq!(
        validate(&g).unwrap_err(),
        GraphValidationError::InitializerShape {
            name: T_W_POLICY.to_string(),
            declared: vec![36, 4],
            actual: 143,
        }
    );
}

#[test]
fn dangling_input_names_node_and_tensor() {
    let mut g = graph();
    g.nodes[3].inputs[1] = "W_missing".to_string();
    assert_eq!(
        validate(&g).unwrap_err(),
        GraphValidationError::DanglingInput {
            node: N_VALUE_GEMM.to_string(),
            input: "W_missing".to_string(),
        }
    );
}

#[test]
fn use_before_definition_is_dangling() {
    let mut g = graph();
    // Softmax before the Gemm that feeds it.
    g.nodes.swap(1, 2);
    assert!(matches!(
        validate(&g).unwrap_err(),
        GraphValidationError::DanglingInput { node, input }
            if node == N_POLICY_SOFTMAX && input == T_POLICY_LOGITS
    ));
}

#[test]
fn tensor_defined_twice_is_rejected() {
    let mut g = graph();
    g.nodes[3].outputs[0] = T_POLICY_LOGITS.to_string();
    assert_eq!(
        validate(&g).unwrap_err(),
        GraphValidationError::DuplicateName(T_POLICY_LOGITS.to_string())
    );

    let mut g = graph();
    g.nodes[4].name = N_RESHAPE.to_string();
    assert_eq!(
        validate(&g).unwrap_err(),
        GraphValidationError::DuplicateName(N_RESHAPE.to_string())
    );
}

#[test]
fn interface_arity_is_checked() {
    let mut g = graph();
    g.outputs.pop();
    assert_eq!(
        validate(&g).unwrap_err(),
        GraphValidationError::Arity {
            kind: "output",
            expected: 2,
            found: 1,
        }
    );

    let mut g = graph();
    g.inputs.push(TensorSpec::f32("extra", vec![Dim::Fixed(1)]));
    assert!(matches!(
        validate(&g).unwrap_err(),
        GraphValidationError::Arity { kind: "input", .. }
    ));
}

#[test]
fn input_shape_must_be_square_with_four_channels() {
    let mut g = graph();
    g.inputs[0].dims[3] = Dim::Fixed(4);
    assert!(matches!(
        validate(&g).unwrap_err(),
        GraphValidationError::Tensor { tensor, .. } if tensor == T_STATE
    ));
}

#[test]
fn declared_output_shape_must_match_inference() {
    let mut g = graph();
    // Consistent interface, but the policy Gemm now produces one column.
    g.initializers[1] = Initializer::f32(T_W_POLICY, vec![36, 1], vec![0.0; 36]);
    g.initializers[2] = Initializer::f32(T_B_POLICY, vec![1], vec![0.0]);
    match validate(&g).unwrap_err() {
        GraphValidationError::Tensor { tensor, reason } => {
            assert_eq!(tensor, T_POLICY);
            assert!(reason.contains("[batch, 1]"), "{reason}");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn gemm_inner_dimension_mismatch() {
    let mut g = graph();
    g.initializers[3] = Initializer::f32(T_W_VALUE, vec![35, 1], vec![0.0; 35]);
    let (node, reason) = node_error(&g);
    assert_eq!(node, N_VALUE_GEMM);
    assert!(reason.contains("inner dimensions"), "{reason}");
}

#[test]
fn gemm_bias_must_broadcast() {
    let mut g = graph();
    g.initializers[2] = Initializer::f32(T_B_POLICY, vec![3], vec![0.0; 3]);
    let (node, reason) = node_error(&g);
    assert_eq!(node, N_POLICY_GEMM);
    assert!(reason.contains("broadcast"), "{reason}");
}

#[test]
fn gemm_flags_must_be_boolean_ints() {
    let mut g = graph();
    g.nodes[1].attrs.retain(|(n, _)| n != "transB");
    g.nodes[1].attrs.push(("transB".to_string(), AttrValue::Int(2)));
    let (node, reason) = node_error(&g);
    assert_eq!(node, N_POLICY_GEMM);
    assert!(reason.contains("transB"), "{reason}");

    let mut g = graph();
    g.nodes[3].attrs[0] = ("alpha".to_string(), AttrValue::Int(1));
    let (_, reason) = node_error(&g);
    assert!(reason.contains("alpha"), "{reason}");
}

#[test]
fn softmax_axis_out_of_range() {
    let mut g = graph();
    g.nodes[2].attrs[0] = ("axis".to_string(), AttrValue::Int(2));
    let (node, reason) = node_error(&g);
    assert_eq!(node, N_POLICY_SOFTMAX);
    assert!(reason.contains("axis 2"), "{reason}");
}

#[test]
fn softmax_default_axis_is_accepted() {
    let mut g = graph();
    g.nodes[2].attrs.clear();
    validate(&g).unwrap();
}

#[test]
fn reshape_target_must_cover_input() {
    let mut g = graph();
    g.initializers[0] = Initializer::i64(T_SHAPE_FLAT, vec![2], vec![-1, 35]);
    let (node, _) = node_error(&g);
    assert_eq!(node, N_RESHAPE);

    let mut g = graph();
    g.initializers[0] = Initializer::i64(T_SHAPE_FLAT, vec![2], vec![-1, -1]);
    let (_, reason) = node_error(&g);
    assert!(reason.contains("more than one -1"), "{reason}");
}

#[test]
fn output_without_producer_is_reported() {
    let mut g = graph();
    g.nodes.pop();
    assert_eq!(
        validate(&g).unwrap_err(),
        GraphValidationError::UnproducedOutput(T_VALUE.to_string())
    );
}

#[test]
fn node_with_two_outputs_is_rejected() {
    let mut g = graph();
    g.nodes.push(Node::new(
        "extra",
        OpKind::Tanh,
        &[T_VALUE_LINEAR],
        &["a", "b"],
    ));
    let (node, reason) = node_error(&g);
    assert_eq!(node, "extra");
    assert!(reason.contains("expected 1 output"), "{reason}");
}
