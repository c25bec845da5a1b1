//! Minimal reference executor for the graph IR.
//!
//! Interprets the four operators the exporter emits, in node order, on plain `Vec<f32>`
//! buffers. It exists to check exported files against the checkpoint weights, not to
//! be fast.

use std::collections::HashMap;

use thiserror::Error;

use asnake_core::{PolicyValue, Prediction, ACTIONS, CHANNELS};

use crate::ir::{Dim, Graph, Node, OpKind, TensorData};
use crate::schema::{T_POLICY, T_STATE, T_VALUE};

#[derive(Debug, Error, PartialEq)]
pub enum RuntimeError {
    #[error("missing feed for graph input {0}")]
    MissingInput(String),
    #[error("feed {name}: {reason}")]
    BadFeed { name: String, reason: String },
    #[error("initializer {name}: {reason}")]
    BadInitializer { name: String, reason: String },
    #[error("tensor {0} is not defined")]
    UnknownTensor(String),
    #[error("node {node}: {reason}")]
    Node { node: String, reason: String },
}

/// Dense row-major f32 tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    pub dims: Vec<usize>,
    pub data: Vec<f32>,
}

impl Tensor {
    pub fn new(dims: Vec<usize>, data: Vec<f32>) -> Option<Self> {
        let n = dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))?;
        (n == data.len()).then_some(Self { dims, data })
    }

    pub fn zeros(dims: Vec<usize>) -> Self {
        let n = dims.iter().product();
        Self {
            dims,
            data: vec![0.0; n],
        }
    }
}

#[derive(Debug, Clone)]
enum Value {
    F32(Tensor),
    I64(Vec<i64>),
}

/// Execute `graph` on `feeds`; returns the graph outputs in declaration order.
pub fn run(graph: &Graph, feeds: &[(&str, Tensor)]) -> Result<Vec<Tensor>, RuntimeError> {
    let mut env: HashMap<&str, Value> = HashMap::new();

    for spec in &graph.inputs {
        let (_, t) = feeds
            .iter()
            .find(|(n, _)| *n == spec.name)
            .ok_or_else(|| RuntimeError::MissingInput(spec.name.clone()))?;
        check_feed(&spec.name, &spec.dims, t)?;
        env.insert(spec.name.as_str(), Value::F32(t.clone()));
    }
    for init in &graph.initializers {
        if init.numel() != Some(init.data.len()) {
            return Err(RuntimeError::BadInitializer {
                name: init.name.clone(),
                reason: format!(
                    "dims {:?} do not match {} data elements",
                    init.dims,
                    init.data.len()
                ),
            });
        }
        let v = match &init.data {
            TensorData::F32(d) => Value::F32(Tensor {
                dims: init.dims.clone(),
                data: d.clone(),
            }),
            TensorData::I64(d) => Value::I64(d.clone()),
        };
        env.insert(init.name.as_str(), v);
    }

    for node in &graph.nodes {
        let ins = node
            .inputs
            .iter()
            .map(|n| {
                env.get(n.as_str())
                    .ok_or_else(|| RuntimeError::UnknownTensor(n.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let out = eval(node, &ins).map_err(|reason| RuntimeError::Node {
            node: node.name.clone(),
            reason,
        })?;
        let Some(name) = node.outputs.first() else {
            return Err(RuntimeError::Node {
                node: node.name.clone(),
                reason: "node has no output".to_string(),
            });
        };
        env.insert(name.as_str(), Value::F32(out));
    }

    graph
        .outputs
        .iter()
        .map(|spec| match env.remove(spec.name.as_str()) {
            Some(Value::F32(t)) => Ok(t),
            _ => Err(RuntimeError::UnknownTensor(spec.name.clone())),
        })
        .collect()
}

fn check_feed(name: &str, declared: &[Dim], t: &Tensor) -> Result<(), RuntimeError> {
    let bad = |reason: String| RuntimeError::BadFeed {
        name: name.to_string(),
        reason,
    };
    if t.dims.len() != declared.len() {
        return Err(bad(format!("rank {} vs declared {}", t.dims.len(), declared.len())));
    }
    for (i, (d, want)) in t.dims.iter().zip(declared).enumerate() {
        if let Dim::Fixed(w) = want {
            if d != w {
                return Err(bad(format!("dim {i} is {d}, expected {w}")));
            }
        }
    }
    if t.dims.iter().product::<usize>() != t.data.len() {
        return Err(bad("data length does not match dims".to_string()));
    }
    Ok(())
}

fn eval(node: &Node, ins: &[&Value]) -> Result<Tensor, String> {
    match node.op {
        OpKind::Reshape => match ins {
            [Value::F32(x), Value::I64(shape)] => reshape(x, shape),
            _ => Err("Reshape expects (float data, int64 shape)".to_string()),
        },
        OpKind::Gemm => {
            let f = |i: usize| match ins.get(i) {
                Some(Value::F32(t)) => Ok(Some(t)),
                None if i == 2 => Ok(None),
                _ => Err(format!("Gemm input {i} must be float")),
            };
            let a = f(0)?.ok_or("Gemm needs A")?;
            let b = f(1)?.ok_or("Gemm needs B")?;
            gemm(
                a,
                b,
                f(2)?,
                node.float_attr("alpha", 1.0)?,
                node.float_attr("beta", 1.0)?,
                node.int_attr("transA", 0)? != 0,
                node.int_attr("transB", 0)? != 0,
            )
        }
        OpKind::Softmax => match ins {
            [Value::F32(x)] => softmax(x, node.int_attr("axis", -1)?),
            _ => Err("Softmax expects one float input".to_string()),
        },
        OpKind::Tanh => match ins {
            [Value::F32(x)] => Ok(Tensor {
                dims: x.dims.clone(),
                data: x.data.iter().map(|v| v.tanh()).collect(),
            }),
            _ => Err("Tanh expects one float input".to_string()),
        },
    }
}

fn reshape(x: &Tensor, shape: &[i64]) -> Result<Tensor, String> {
    let total = x.data.len();
    let mut dims = Vec::with_capacity(shape.len());
    let mut hole = None;
    for (i, &s) in shape.iter().enumerate() {
        match s {
            -1 if hole.is_none() => {
                hole = Some(i);
                dims.push(1);
            }
            0 => dims.push(*x.dims.get(i).ok_or("shape 0 past input rank")?),
            s if s > 0 => dims.push(s as usize),
            s => return Err(format!("invalid shape entry {s}")),
        }
    }
    let known: usize = dims.iter().product();
    if let Some(i) = hole {
        if known == 0 || total % known != 0 {
            return Err(format!("cannot reshape {total} elements to {shape:?}"));
        }
        dims[i] = total / known;
    } else if known != total {
        return Err(format!("cannot reshape {total} elements to {shape:?}"));
    }
    Ok(Tensor {
        dims,
        data: x.data.clone(),
    })
}

fn gemm(
    a: &Tensor,
    b: &Tensor,
    c: Option<&Tensor>,
    alpha: f32,
    beta: f32,
    trans_a: bool,
    trans_b: bool,
) -> Result<Tensor, String> {
    let (&[ar, ac], &[br, bc]) = (a.dims.as_slice(), b.dims.as_slice()) else {
        return Err("Gemm A and B must be rank 2".to_string());
    };
    let (m, k) = if trans_a { (ac, ar) } else { (ar, ac) };
    let (k2, n) = if trans_b { (bc, br) } else { (br, bc) };
    if k != k2 {
        return Err(format!("inner dimensions differ: {k} vs {k2}"));
    }
    let at = |i: usize, p: usize| if trans_a { a.data[p * ac + i] } else { a.data[i * ac + p] };
    let bt = |p: usize, j: usize| if trans_b { b.data[j * bc + p] } else { b.data[p * bc + j] };

    let bias = match c {
        None => None,
        Some(c) => Some(broadcast_index(&c.dims, m, n)?),
    };

    let mut out = vec![0.0f32; m * n];
    for i in 0..m {
        for j in 0..n {
            let mut acc = 0.0f32;
            for p in 0..k {
                acc += at(i, p) * bt(p, j);
            }
            let mut y = alpha * acc;
            if let (Some(c), Some(idx)) = (c, &bias) {
                y += beta * c.data[idx(i, j)];
            }
            out[i * n + j] = y;
        }
    }
    Ok(Tensor {
        dims: vec![m, n],
        data: out,
    })
}

/// Index function mapping output `(i, j)` into a unidirectionally broadcast `C`.
fn broadcast_index(
    c: &[usize],
    m: usize,
    n: usize,
) -> Result<impl Fn(usize, usize) -> usize, String> {
    let (cm, cn) = match *c {
        [] => (1, 1),
        [cn] => (1, cn),
        [cm, cn] => (cm, cn),
        _ => return Err(format!("C of rank {} cannot broadcast", c.len())),
    };
    if (cm != 1 && cm != m) || (cn != 1 && cn != n) {
        return Err(format!("C {c:?} cannot broadcast to [{m}, {n}]"));
    }
    Ok(move |i: usize, j: usize| {
        let r = if cm == 1 { 0 } else { i };
        let col = if cn == 1 { 0 } else { j };
        r * cn + col
    })
}

/// Softmax along one axis (opset 13+ semantics), max-subtracted.
fn softmax(x: &Tensor, axis: i64) -> Result<Tensor, String> {
    let rank = x.dims.len() as i64;
    if axis < -rank || axis >= rank {
        return Err(format!("axis {axis} out of range for rank {rank}"));
    }
    let axis = (if axis < 0 { axis + rank } else { axis }) as usize;
    let width = x.dims[axis];
    let inner: usize = x.dims[axis + 1..].iter().product();
    let outer: usize = x.dims[..axis].iter().product();

    let mut out = x.data.clone();
    for o in 0..outer {
        for q in 0..inner {
            let idx = |k: usize| (o * width + k) * inner + q;
            let max = (0..width)
                .map(|k| x.data[idx(k)])
                .fold(f32::NEG_INFINITY, f32::max);
            let mut sum = 0.0f32;
            for k in 0..width {
                let e = (x.data[idx(k)] - max).exp();
                out[idx(k)] = e;
                sum += e;
            }
            for k in 0..width {
                out[idx(k)] /= sum;
            }
        }
    }
    Ok(Tensor {
        dims: x.dims.clone(),
        data: out,
    })
}

/// An exported (or decoded) policy/value graph bound to its board geometry.
#[derive(Debug, Clone)]
pub struct GraphSession {
    graph: Graph,
    board_size: usize,
}

impl GraphSession {
    /// Reads the board edge from the `state` input declaration.
    pub fn new(graph: Graph) -> Result<Self, RuntimeError> {
        let spec = graph
            .inputs
            .iter()
            .find(|s| s.name == T_STATE)
            .ok_or_else(|| RuntimeError::MissingInput(T_STATE.to_string()))?;
        let board_size = match spec.dims.as_slice() {
            [_, Dim::Fixed(c), Dim::Fixed(h), Dim::Fixed(w)] if *c == CHANNELS && h == w => *h,
            _ => {
                return Err(RuntimeError::BadFeed {
                    name: T_STATE.to_string(),
                    reason: "declared shape is not [batch, 4, B, B]".to_string(),
                });
            }
        };
        Ok(Self { graph, board_size })
    }

    pub fn board_size(&self) -> usize {
        self.board_size
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Evaluate `batch` flattened states laid out back to back.
    pub fn run_batch(
        &self,
        states: &[f32],
        batch: usize,
    ) -> Result<Vec<Prediction>, RuntimeError> {
        let b = self.board_size;
        let state = Tensor::new(vec![batch, CHANNELS, b, b], states.to_vec()).ok_or_else(|| {
            RuntimeError::BadFeed {
                name: T_STATE.to_string(),
                reason: format!(
                    "{} values for batch {batch} of {}",
                    states.len(),
                    self.input_dim()
                ),
            }
        })?;
        let outs = run(&self.graph, &[(T_STATE, state)])?;

        let output = |name: &str| -> Result<&Tensor, RuntimeError> {
            self.graph
                .outputs
                .iter()
                .position(|s| s.name == name)
                .and_then(|i| outs.get(i))
                .ok_or_else(|| RuntimeError::UnknownTensor(name.to_string()))
        };
        let policy = output(T_POLICY)?;
        let value = output(T_VALUE)?;
        if policy.dims != [batch, ACTIONS] || value.dims != [batch, 1] {
            return Err(RuntimeError::UnknownTensor(format!(
                "outputs have shapes {:?} and {:?}",
                policy.dims, value.dims
            )));
        }

        Ok((0..batch)
            .map(|r| {
                let mut p = [0.0f32; ACTIONS];
                p.copy_from_slice(&policy.data[r * ACTIONS..(r + 1) * ACTIONS]);
                Prediction {
                    policy: p,
                    value: value.data[r],
                }
            })
            .collect())
    }
}

impl PolicyValue for GraphSession {
    fn input_dim(&self) -> usize {
        CHANNELS * self.board_size * self.board_size
    }

    /// Runtime failures yield the uniform/zero prediction.
    fn predict(&self, state: &[f32]) -> Prediction {
        if state.len() != self.input_dim() {
            return Prediction::default();
        }
        self.run_batch(state, 1)
            .ok()
            .and_then(|mut v| v.pop())
            .unwrap_or_default()
    }
}
