//! Graph IR → ONNX `ModelProto`.

use prost::Message;

use crate::ir::{AttrValue, Dim, Graph, Initializer, Node, TensorData, TensorSpec};
use crate::proto::{
    tensor_shape_proto::{dimension, Dimension},
    type_proto, AttributeProto, AttributeType, GraphProto, ModelProto, NodeProto,
    OperatorSetIdProto, TensorProto, TensorShapeProto, TypeProto, ValueInfoProto,
};
use crate::schema::{IR_VERSION, OPSET_VERSION, PRODUCER_NAME};

pub fn to_model_proto(graph: &Graph) -> ModelProto {
    ModelProto {
        ir_version: IR_VERSION,
        producer_name: PRODUCER_NAME.to_string(),
        producer_version: env!("CARGO_PKG_VERSION").to_string(),
        opset_import: vec![OperatorSetIdProto {
            domain: String::new(),
            version: OPSET_VERSION,
        }],
        graph: Some(GraphProto {
            name: graph.name.clone(),
            node: graph.nodes.iter().map(node_proto).collect(),
            initializer: graph.initializers.iter().map(tensor_proto).collect(),
            input: graph.inputs.iter().map(value_info).collect(),
            output: graph.outputs.iter().map(value_info).collect(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Serialized `ModelProto` bytes.
pub fn encode_model(graph: &Graph) -> Vec<u8> {
    to_model_proto(graph).encode_to_vec()
}

fn node_proto(node: &Node) -> NodeProto {
    NodeProto {
        name: node.name.clone(),
        op_type: node.op.op_type().to_string(),
        input: node.inputs.clone(),
        output: node.outputs.clone(),
        attribute: node
            .attrs
            .iter()
            .map(|(name, value)| attribute(name, *value))
            .collect(),
        ..Default::default()
    }
}

fn attribute(name: &str, value: AttrValue) -> AttributeProto {
    let mut a = AttributeProto {
        name: name.to_string(),
        ..Default::default()
    };
    match value {
        AttrValue::Float(f) => {
            a.f = f;
            a.r#type = AttributeType::Float as i32;
        }
        AttrValue::Int(i) => {
            a.i = i;
            a.r#type = AttributeType::Int as i32;
        }
    }
    a
}

/// Weights go into `raw_data` as little-endian bytes; the tiny shape tensor uses
/// `int64_data`.
fn tensor_proto(init: &Initializer) -> TensorProto {
    let mut t = TensorProto {
        name: init.name.clone(),
        dims: init.dims.iter().map(|&d| d as i64).collect(),
        data_type: init.data.elem().onnx_code(),
        ..Default::default()
    };
    match &init.data {
        TensorData::F32(v) => t.raw_data = bytemuck::cast_slice::<f32, u8>(v).to_vec(),
        TensorData::I64(v) => t.int64_data = v.clone(),
    }
    t
}

fn value_info(spec: &TensorSpec) -> ValueInfoProto {
    let dim = spec
        .dims
        .iter()
        .map(|d| Dimension {
            value: Some(match d {
                Dim::Fixed(n) => dimension::Value::DimValue(*n as i64),
                Dim::Sym(s) => dimension::Value::DimParam(s.clone()),
            }),
            ..Default::default()
        })
        .collect();
    ValueInfoProto {
        name: spec.name.clone(),
        r#type: Some(TypeProto {
            value: Some(type_proto::Value::TensorType(type_proto::Tensor {
                elem_type: spec.elem.onnx_code(),
                shape: Some(TensorShapeProto { dim }),
            })),
            ..Default::default()
        }),
        ..Default::default()
    }
}
