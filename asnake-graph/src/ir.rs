//! In-memory graph IR: tensor specs, constant initializers and ordered operator nodes.
//!
//! The IR mirrors the subset of ONNX the exporter emits. Node order is execution
//! order; every node input must be a graph input, an initializer or the output of an
//! earlier node (checked by [`crate::validate`]).

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ElemType {
    F32,
    I64,
}

impl ElemType {
    /// `TensorProto.DataType` code.
    pub fn onnx_code(self) -> i32 {
        match self {
            ElemType::F32 => 1,
            ElemType::I64 => 7,
        }
    }

    pub fn from_onnx_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(ElemType::F32),
            7 => Some(ElemType::I64),
            _ => None,
        }
    }
}

/// One tensor dimension: a fixed size or a named symbolic size (e.g. `batch`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Dim {
    Fixed(usize),
    Sym(String),
}

impl Dim {
    pub fn sym(name: &str) -> Self {
        Dim::Sym(name.to_string())
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dim::Fixed(n) => write!(f, "{n}"),
            Dim::Sym(s) => f.write_str(s),
        }
    }
}

/// Render dims as `[batch, 4, 5, 5]`.
pub fn fmt_dims(dims: &[Dim]) -> String {
    let parts: Vec<String> = dims.iter().map(Dim::to_string).collect();
    format!("[{}]", parts.join(", "))
}

/// Declared graph input or output.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorSpec {
    pub name: String,
    pub elem: ElemType,
    pub dims: Vec<Dim>,
}

impl TensorSpec {
    pub fn f32(name: &str, dims: Vec<Dim>) -> Self {
        Self {
            name: name.to_string(),
            elem: ElemType::F32,
            dims,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    F32(Vec<f32>),
    I64(Vec<i64>),
}

impl TensorData {
    pub fn elem(&self) -> ElemType {
        match self {
            TensorData::F32(_) => ElemType::F32,
            TensorData::I64(_) => ElemType::I64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TensorData::F32(v) => v.len(),
            TensorData::I64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Constant tensor embedded in the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Initializer {
    pub name: String,
    pub dims: Vec<usize>,
    pub data: TensorData,
}

impl Initializer {
    pub fn f32(name: &str, dims: Vec<usize>, data: Vec<f32>) -> Self {
        Self {
            name: name.to_string(),
            dims,
            data: TensorData::F32(data),
        }
    }

    pub fn i64(name: &str, dims: Vec<usize>, data: Vec<i64>) -> Self {
        Self {
            name: name.to_string(),
            dims,
            data: TensorData::I64(data),
        }
    }

    /// Element count implied by `dims`; `None` on overflow.
    pub fn numel(&self) -> Option<usize> {
        self.dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OpKind {
    Reshape,
    Gemm,
    Softmax,
    Tanh,
}

impl OpKind {
    pub fn op_type(self) -> &'static str {
        match self {
            OpKind::Reshape => "Reshape",
            OpKind::Gemm => "Gemm",
            OpKind::Softmax => "Softmax",
            OpKind::Tanh => "Tanh",
        }
    }

    pub fn from_op_type(s: &str) -> Option<Self> {
        match s {
            "Reshape" => Some(OpKind::Reshape),
            "Gemm" => Some(OpKind::Gemm),
            "Softmax" => Some(OpKind::Softmax),
            "Tanh" => Some(OpKind::Tanh),
            _ => None,
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.op_type())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttrValue {
    Float(f32),
    Int(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub op: OpKind,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    /// Attributes in declaration order.
    pub attrs: Vec<(String, AttrValue)>,
}

impl Node {
    pub fn new(name: &str, op: OpKind, inputs: &[&str], outputs: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            op,
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
            attrs: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: &str, value: AttrValue) -> Self {
        self.attrs.push((name.to_string(), value));
        self
    }

    pub fn attr(&self, name: &str) -> Option<AttrValue> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    /// Integer attribute or `default` when absent; `Err` when present with another type.
    pub fn int_attr(&self, name: &str, default: i64) -> Result<i64, String> {
        match self.attr(name) {
            None => Ok(default),
            Some(AttrValue::Int(v)) => Ok(v),
            Some(AttrValue::Float(_)) => Err(format!("attribute {name} must be an int")),
        }
    }

    /// Float attribute or `default` when absent; `Err` when present with another type.
    pub fn float_attr(&self, name: &str, default: f32) -> Result<f32, String> {
        match self.attr(name) {
            None => Ok(default),
            Some(AttrValue::Float(v)) => Ok(v),
            Some(AttrValue::Int(_)) => Err(format!("attribute {name} must be a float")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Graph {
    pub name: String,
    pub inputs: Vec<TensorSpec>,
    pub outputs: Vec<TensorSpec>,
    pub initializers: Vec<Initializer>,
    pub nodes: Vec<Node>,
}

impl Graph {
    pub fn initializer(&self, name: &str) -> Option<&Initializer> {
        self.initializers.iter().find(|i| i.name == name)
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Operator kinds in execution order.
    pub fn op_sequence(&self) -> Vec<OpKind> {
        self.nodes.iter().map(|n| n.op).collect()
    }
}
