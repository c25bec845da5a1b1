use prost::Message;

use crate::proto::{
    tensor_shape_proto::dimension, type_proto, AttributeType, ModelProto, TensorProto,
};
use crate::schema::*;
use crate::test_support::{model, patterned};
use crate::{compile, decode_model, encode_model, to_model_proto, ImportError, TensorData};

#[test]
fn model_header_pins_versions_and_producer() {
    let m = to_model_proto(&compile(&model(2, &patterned(16))));
    assert_eq!(m.ir_version, 8);
    assert_eq!(m.producer_name, "alphasnake_rust_export");
    assert_eq!(m.opset_import.len(), 1);
    assert_eq!(m.opset_import[0].domain, "");
    assert_eq!(m.opset_import[0].version, 17);
    let g = m.graph.unwrap();
    assert_eq!(g.name, "AlphaSnakeLinearPV");
    assert_eq!(g.node.len(), 5);
    assert_eq!(g.initializer.len(), 5);
}

#[test]
fn nodes_carry_op_types_and_typed_attributes() {
    let g = to_model_proto(&compile(&model(2, &patterned(16))))
        .graph
        .unwrap();
    let ops: Vec<&str> = g.node.iter().map(|n| n.op_type.as_str()).collect();
    assert_eq!(ops, ["Reshape", "Gemm", "Softmax", "Gemm", "Tanh"]);

    let gemm = &g.node[1];
    assert_eq!(gemm.name, N_POLICY_GEMM);
    assert_eq!(gemm.input, [T_STATE_FLAT, T_W_POLICY, T_B_POLICY]);
    let alpha = gemm.attribute.iter().find(|a| a.name == "alpha").unwrap();
    assert_eq!(alpha.r#type, AttributeType::Float as i32);
    assert_eq!(alpha.f, 1.0);
    let trans_b = gemm.attribute.iter().find(|a| a.name == "transB").unwrap();
    assert_eq!(trans_b.r#type, AttributeType::Int as i32);
    assert_eq!(trans_b.i, 0);

    let axis = &g.node[2].attribute[0];
    assert_eq!((axis.name.as_str(), axis.i), ("axis", 1));
}

#[test]
fn input_declares_symbolic_batch() {
    let g = to_model_proto(&compile(&model(5, &patterned(100))))
        .graph
        .unwrap();
    assert_eq!(g.input.len(), 1);
    let Some(type_proto::Value::TensorType(t)) =
        g.input[0].r#type.as_ref().and_then(|t| t.value.clone())
    else {
        panic!("state must be a tensor");
    };
    assert_eq!(t.elem_type, 1);
    let dims: Vec<_> = t.shape.unwrap().dim.into_iter().map(|d| d.value).collect();
    assert_eq!(
        dims,
        vec![
            Some(dimension::Value::DimParam("batch".to_string())),
            Some(dimension::Value::DimValue(4)),
            Some(dimension::Value::DimValue(5)),
            Some(dimension::Value::DimValue(5)),
        ]
    );
}

#[test]
fn weights_are_little_endian_raw_data() {
    let raw = patterned(16);
    let g = to_model_proto(&compile(&model(2, &raw))).graph.unwrap();

    let wv = g.initializer.iter().find(|t| t.name == T_W_VALUE).unwrap();
    assert_eq!(wv.dims, [16, 1]);
    assert_eq!(wv.data_type, 1);
    assert!(wv.float_data.is_empty());
    let expect: Vec<u8> = raw
        .value_weights
        .iter()
        .flat_map(|f| f.to_le_bytes())
        .collect();
    assert_eq!(wv.raw_data, expect);

    let shape = g.initializer.iter().find(|t| t.name == T_SHAPE_FLAT).unwrap();
    assert_eq!(shape.data_type, 7);
    assert_eq!(shape.int64_data, [-1, 16]);
}

#[test]
fn encoded_model_decodes_to_the_same_graph() {
    let g = compile(&model(3, &patterned(36)));
    let bytes = encode_model(&g);
    assert_eq!(ModelProto::decode(bytes.as_slice()).unwrap(), to_model_proto(&g));
    assert_eq!(decode_model(&bytes).unwrap(), g);
}

#[test]
fn import_accepts_typed_float_data() {
    let g = compile(&model(1, &patterned(4)));
    let mut m = to_model_proto(&g);
    let graph = m.graph.as_mut().unwrap();
    for t in graph.initializer.iter_mut().filter(|t| t.data_type == 1) {
        t.float_data = bytemuck::pod_collect_to_vec(&t.raw_data);
        t.raw_data.clear();
    }
    let back = crate::from_model_proto(&m).unwrap();
    assert_eq!(back, g);
}

#[test]
fn import_skips_initializers_listed_as_inputs() {
    let g = compile(&model(1, &patterned(4)));
    let mut m = to_model_proto(&g);
    let graph = m.graph.as_mut().unwrap();
    let extra = graph.output[1].clone();
    let mut as_input = extra;
    as_input.name = T_B_VALUE.to_string();
    graph.input.push(as_input);
    assert_eq!(crate::from_model_proto(&m).unwrap().inputs, g.inputs);
}

#[test]
fn import_rejects_foreign_content() {
    assert!(matches!(
        decode_model(&[0xff, 0xff, 0xff]),
        Err(ImportError::Decode(_))
    ));

    let g = compile(&model(1, &patterned(4)));
    let mut m = to_model_proto(&g);
    m.graph.as_mut().unwrap().node[4].op_type = "Relu".to_string();
    match crate::from_model_proto(&m) {
        Err(ImportError::Unsupported(msg)) => assert!(msg.contains("Relu"), "{msg}"),
        other => panic!("unexpected {other:?}"),
    }

    let mut m = to_model_proto(&g);
    m.graph.as_mut().unwrap().initializer[1] = TensorProto {
        name: T_W_POLICY.to_string(),
        data_type: 1,
        raw_data: vec![0; 7],
        ..Default::default()
    };
    assert!(matches!(
        crate::from_model_proto(&m),
        Err(ImportError::Unsupported(_))
    ));

    assert!(matches!(
        crate::from_model_proto(&ModelProto::default()),
        Err(ImportError::Unsupported(_))
    ));
}

#[test]
fn decoded_float_payload_matches() {
    let raw = patterned(4);
    let g = decode_model(&encode_model(&compile(&model(1, &raw)))).unwrap();
    assert_eq!(
        g.initializer(T_W_VALUE).unwrap().data,
        TensorData::F32(raw.value_weights)
    );
}
