//! ONNX `ModelProto` bytes → graph IR.
//!
//! Only the operator and tensor subset the exporter writes is accepted. Tensor payloads
//! may come from `raw_data` or from the typed repeated fields.

use prost::Message;
use thiserror::Error;

use crate::ir::{AttrValue, Dim, ElemType, Graph, Initializer, Node, OpKind, TensorData, TensorSpec};
use crate::proto::{
    tensor_shape_proto::dimension, type_proto, AttributeProto, AttributeType, ModelProto,
    NodeProto, TensorProto, ValueInfoProto,
};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),
    #[error("unsupported model: {0}")]
    Unsupported(String),
}

fn unsupported(msg: impl Into<String>) -> ImportError {
    ImportError::Unsupported(msg.into())
}

pub fn decode_model(bytes: &[u8]) -> Result<Graph, ImportError> {
    let model = ModelProto::decode(bytes)?;
    from_model_proto(&model)
}

pub fn from_model_proto(model: &ModelProto) -> Result<Graph, ImportError> {
    let graph = model
        .graph
        .as_ref()
        .ok_or_else(|| unsupported("model has no graph"))?;

    // Initializers may also be listed as inputs in older exporters; keep only true inputs.
    let inputs = graph
        .input
        .iter()
        .filter(|vi| !graph.initializer.iter().any(|t| t.name == vi.name))
        .map(tensor_spec)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Graph {
        name: graph.name.clone(),
        inputs,
        outputs: graph
            .output
            .iter()
            .map(tensor_spec)
            .collect::<Result<_, _>>()?,
        initializers: graph
            .initializer
            .iter()
            .map(initializer)
            .collect::<Result<_, _>>()?,
        nodes: graph.node.iter().map(node).collect::<Result<_, _>>()?,
    })
}

fn tensor_spec(vi: &ValueInfoProto) -> Result<TensorSpec, ImportError> {
    let tensor = match vi.r#type.as_ref().and_then(|t| t.value.as_ref()) {
        Some(type_proto::Value::TensorType(t)) => t,
        None => return Err(unsupported(format!("{}: missing tensor type", vi.name))),
    };
    let elem = ElemType::from_onnx_code(tensor.elem_type).ok_or_else(|| {
        unsupported(format!("{}: element type {}", vi.name, tensor.elem_type))
    })?;
    let shape = tensor
        .shape
        .as_ref()
        .ok_or_else(|| unsupported(format!("{}: missing shape", vi.name)))?;
    let dims = shape
        .dim
        .iter()
        .map(|d| match &d.value {
            Some(dimension::Value::DimValue(n)) if *n >= 0 => Ok(Dim::Fixed(*n as usize)),
            Some(dimension::Value::DimParam(s)) => Ok(Dim::Sym(s.clone())),
            _ => Err(unsupported(format!("{}: unknown dimension", vi.name))),
        })
        .collect::<Result<_, _>>()?;
    Ok(TensorSpec {
        name: vi.name.clone(),
        elem,
        dims,
    })
}

fn initializer(t: &TensorProto) -> Result<Initializer, ImportError> {
    let dims = t
        .dims
        .iter()
        .map(|&d| {
            usize::try_from(d).map_err(|_| unsupported(format!("{}: negative dim {d}", t.name)))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let data = match ElemType::from_onnx_code(t.data_type) {
        Some(ElemType::F32) if !t.raw_data.is_empty() => {
            if t.raw_data.len() % 4 != 0 {
                return Err(unsupported(format!("{}: ragged float raw_data", t.name)));
            }
            TensorData::F32(bytemuck::pod_collect_to_vec(&t.raw_data))
        }
        Some(ElemType::F32) => TensorData::F32(t.float_data.clone()),
        Some(ElemType::I64) if !t.raw_data.is_empty() => {
            if t.raw_data.len() % 8 != 0 {
                return Err(unsupported(format!("{}: ragged int64 raw_data", t.name)));
            }
            TensorData::I64(bytemuck::pod_collect_to_vec(&t.raw_data))
        }
        Some(ElemType::I64) => TensorData::I64(t.int64_data.clone()),
        None => {
            return Err(unsupported(format!("{}: element type {}", t.name, t.data_type)));
        }
    };
    Ok(Initializer {
        name: t.name.clone(),
        dims,
        data,
    })
}

fn node(n: &NodeProto) -> Result<Node, ImportError> {
    if !n.domain.is_empty() && n.domain != "ai.onnx" {
        return Err(unsupported(format!("{}: domain {}", n.name, n.domain)));
    }
    let op = OpKind::from_op_type(&n.op_type)
        .ok_or_else(|| unsupported(format!("{}: operator {}", n.name, n.op_type)))?;
    let attrs = n
        .attribute
        .iter()
        .map(|a| attr_value(&n.name, a).map(|v| (a.name.clone(), v)))
        .collect::<Result<_, _>>()?;
    Ok(Node {
        name: n.name.clone(),
        op,
        inputs: n.input.clone(),
        outputs: n.output.clone(),
        attrs,
    })
}

fn attr_value(node: &str, a: &AttributeProto) -> Result<AttrValue, ImportError> {
    match AttributeType::try_from(a.r#type) {
        Ok(AttributeType::Float) => Ok(AttrValue::Float(a.f)),
        Ok(AttributeType::Int) => Ok(AttrValue::Int(a.i)),
        _ => Err(unsupported(format!(
            "{node}: attribute {} has type {}",
            a.name, a.r#type
        ))),
    }
}
