use asnake_core::ACTIONS;

use crate::ir::{AttrValue, Dim, ElemType, OpKind, TensorData};
use crate::schema::*;
use crate::test_support::{model, patterned, zeros};
use crate::{compile, validate};

#[test]
fn emits_five_nodes_in_fixed_order() {
    let g = compile(&model(5, &zeros(100)));
    assert_eq!(
        g.op_sequence(),
        vec![
            OpKind::Reshape,
            OpKind::Gemm,
            OpKind::Softmax,
            OpKind::Gemm,
            OpKind::Tanh
        ]
    );
    let names: Vec<&str> = g.nodes.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(
        names,
        [N_RESHAPE, N_POLICY_GEMM, N_POLICY_SOFTMAX, N_VALUE_GEMM, N_VALUE_TANH]
    );
    assert_eq!(g.name, GRAPH_NAME);
}

#[test]
fn declares_one_input_and_two_outputs() {
    let g = compile(&model(5, &zeros(100)));
    assert_eq!(g.inputs.len(), 1);
    assert_eq!(g.inputs[0].name, T_STATE);
    assert_eq!(g.inputs[0].elem, ElemType::F32);
    assert_eq!(
        g.inputs[0].dims,
        vec![Dim::sym("batch"), Dim::Fixed(4), Dim::Fixed(5), Dim::Fixed(5)]
    );

    assert_eq!(g.outputs.len(), 2);
    assert_eq!(g.outputs[0].name, T_POLICY);
    assert_eq!(g.outputs[0].dims, vec![Dim::sym("batch"), Dim::Fixed(4)]);
    assert_eq!(g.outputs[1].name, T_VALUE);
    assert_eq!(g.outputs[1].dims, vec![Dim::sym("batch"), Dim::Fixed(1)]);
}

#[test]
fn initializers_have_expected_order_and_shapes() {
    let g = compile(&model(3, &zeros(36)));
    let got: Vec<(&str, &[usize])> = g
        .initializers
        .iter()
        .map(|i| (i.name.as_str(), i.dims.as_slice()))
        .collect();
    assert_eq!(
        got,
        vec![
            (T_SHAPE_FLAT, &[2usize][..]),
            (T_W_POLICY, &[36, 4][..]),
            (T_B_POLICY, &[4][..]),
            (T_W_VALUE, &[36, 1][..]),
            (T_B_VALUE, &[1][..]),
        ]
    );
    assert_eq!(
        g.initializer(T_SHAPE_FLAT).unwrap().data,
        TensorData::I64(vec![-1, 36])
    );
}

#[test]
fn policy_weights_are_stored_feature_major() {
    let raw = patterned(36);
    let g = compile(&model(3, &raw));

    let TensorData::F32(w) = &g.initializer(T_W_POLICY).unwrap().data else {
        panic!("W_policy must be float");
    };
    for i in 0..36 {
        for a in 0..ACTIONS {
            assert_eq!(w[i * ACTIONS + a], raw.policy_weights[a * 36 + i]);
        }
    }

    let TensorData::F32(wv) = &g.initializer(T_W_VALUE).unwrap().data else {
        panic!("W_value must be float");
    };
    assert_eq!(wv, &raw.value_weights);
    assert_eq!(
        g.initializer(T_B_POLICY).unwrap().data,
        TensorData::F32(raw.policy_bias.to_vec())
    );
    assert_eq!(
        g.initializer(T_B_VALUE).unwrap().data,
        TensorData::F32(vec![raw.value_bias])
    );
}

#[test]
fn gemm_and_softmax_attributes() {
    let g = compile(&model(2, &zeros(16)));
    for name in [N_POLICY_GEMM, N_VALUE_GEMM] {
        let n = g.node(name).unwrap();
        assert_eq!(n.attr("alpha"), Some(AttrValue::Float(1.0)));
        assert_eq!(n.attr("beta"), Some(AttrValue::Float(1.0)));
        assert_eq!(n.attr("transB"), Some(AttrValue::Int(0)));
        assert_eq!(n.inputs[0], T_STATE_FLAT);
    }
    let sm = g.node(N_POLICY_SOFTMAX).unwrap();
    assert_eq!(sm.attr("axis"), Some(AttrValue::Int(1)));
    assert_eq!(sm.outputs, vec![T_POLICY.to_string()]);
    assert_eq!(g.node(N_VALUE_TANH).unwrap().outputs, vec![T_VALUE.to_string()]);
}

#[test]
fn compiled_graphs_validate_for_several_boards() {
    for b in [1u32, 2, 5, 10] {
        let d = (4 * b * b) as usize;
        validate(&compile(&model(b, &patterned(d)))).unwrap();
    }
}
