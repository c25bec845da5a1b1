//! Structural and shape validation of the graph IR.
//!
//! Runs before anything is serialized. A failure here means the compiler produced an
//! inconsistent graph, never that the checkpoint was bad.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use asnake_core::{ACTIONS, CHANNELS};

use crate::ir::{fmt_dims, Dim, ElemType, Graph, Initializer, Node, OpKind, TensorData};
use crate::schema::{T_POLICY, T_STATE, T_VALUE};

#[derive(Debug, Error, PartialEq)]
pub enum GraphValidationError {
    #[error("graph must declare exactly {expected} {kind}(s), found {found}")]
    Arity {
        kind: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("tensor {tensor}: {reason}")]
    Tensor { tensor: String, reason: String },
    #[error("initializer {name}: declared shape {declared:?} does not match {actual} data elements")]
    InitializerShape {
        name: String,
        declared: Vec<usize>,
        actual: usize,
    },
    #[error("name {0} is defined more than once")]
    DuplicateName(String),
    #[error("node {node}: input {input} is not a graph input, initializer or earlier node output")]
    DanglingInput { node: String, input: String },
    #[error("node {node}: {reason}")]
    Node { node: String, reason: String },
    #[error("graph output {0} is never produced")]
    UnproducedOutput(String),
}

type Shapes = HashMap<String, (ElemType, Vec<Dim>)>;

/// Validate `graph` against the policy/value export contract.
///
/// Checks: one `state` input and `policy`/`value` outputs with the exported shapes,
/// initializer shapes vs data, name uniqueness, every node input resolvable in
/// declaration order (which also rules out cycles), and shape inference through every
/// node agreeing with the declared outputs.
pub fn validate(graph: &Graph) -> Result<(), GraphValidationError> {
    check_interface(graph)?;

    let mut shapes: Shapes = HashMap::new();
    let mut consts: HashMap<&str, &Initializer> = HashMap::new();

    for input in &graph.inputs {
        define(&mut shapes, &input.name, input.elem, input.dims.clone())?;
    }
    for init in &graph.initializers {
        let actual = init.data.len();
        if init.numel() != Some(actual) {
            return Err(GraphValidationError::InitializerShape {
                name: init.name.clone(),
                declared: init.dims.clone(),
                actual,
            });
        }
        let dims = init.dims.iter().map(|&d| Dim::Fixed(d)).collect();
        define(&mut shapes, &init.name, init.data.elem(), dims)?;
        consts.insert(init.name.as_str(), init);
    }

    let mut node_names = HashSet::new();
    for node in &graph.nodes {
        if !node_names.insert(node.name.as_str()) {
            return Err(GraphValidationError::DuplicateName(node.name.clone()));
        }
        let mut ins = Vec::with_capacity(node.inputs.len());
        for name in &node.inputs {
            match shapes.get(name) {
                Some(s) => ins.push(s),
                None => {
                    return Err(GraphValidationError::DanglingInput {
                        node: node.name.clone(),
                        input: name.clone(),
                    })
                }
            }
        }
        if node.outputs.len() != 1 {
            return Err(node_err(
                node,
                format!("expected 1 output, found {}", node.outputs.len()),
            ));
        }
        let out = infer(node, &ins, &consts).map_err(|reason| node_err(node, reason))?;
        define(&mut shapes, &node.outputs[0], ElemType::F32, out)?;
    }

    for spec in &graph.outputs {
        let Some((elem, dims)) = shapes.get(&spec.name) else {
            return Err(GraphValidationError::UnproducedOutput(spec.name.clone()));
        };
        if graph.inputs.iter().any(|i| i.name == spec.name)
            || consts.contains_key(spec.name.as_str())
        {
            return Err(GraphValidationError::UnproducedOutput(spec.name.clone()));
        }
        if *elem != spec.elem || *dims != spec.dims {
            return Err(tensor_err(
                &spec.name,
                format!(
                    "declared {:?}{} but graph computes {:?}{}",
                    spec.elem,
                    fmt_dims(&spec.dims),
                    elem,
                    fmt_dims(dims)
                ),
            ));
        }
    }

    Ok(())
}

fn check_interface(graph: &Graph) -> Result<(), GraphValidationError> {
    if graph.inputs.len() != 1 {
        return Err(GraphValidationError::Arity {
            kind: "input",
            expected: 1,
            found: graph.inputs.len(),
        });
    }
    if graph.outputs.len() != 2 {
        return Err(GraphValidationError::Arity {
            kind: "output",
            expected: 2,
            found: graph.outputs.len(),
        });
    }

    let state = &graph.inputs[0];
    if state.name != T_STATE {
        return Err(tensor_err(&state.name, format!("graph input must be named {T_STATE}")));
    }
    if state.elem != ElemType::F32 {
        return Err(tensor_err(T_STATE, "must be float32".to_string()));
    }
    let batch = match state.dims.as_slice() {
        [b @ Dim::Sym(_), Dim::Fixed(c), Dim::Fixed(h), Dim::Fixed(w)]
            if *c == CHANNELS && h == w && *h > 0 =>
        {
            b
        }
        _ => {
            return Err(tensor_err(
                T_STATE,
                format!(
                    "expected [batch, {CHANNELS}, B, B] with B > 0, found {}",
                    fmt_dims(&state.dims)
                ),
            ))
        }
    };

    for (spec, name, width) in [
        (&graph.outputs[0], T_POLICY, ACTIONS),
        (&graph.outputs[1], T_VALUE, 1),
    ] {
        if spec.name != name {
            return Err(tensor_err(
                &spec.name,
                format!("graph output must be named {name}"),
            ));
        }
        let expected = vec![batch.clone(), Dim::Fixed(width)];
        if spec.elem != ElemType::F32 || spec.dims != expected {
            return Err(tensor_err(
                name,
                format!(
                    "expected float32{}, found {:?}{}",
                    fmt_dims(&expected),
                    spec.elem,
                    fmt_dims(&spec.dims)
                ),
            ));
        }
    }
    Ok(())
}

fn define(
    shapes: &mut Shapes,
    name: &str,
    elem: ElemType,
    dims: Vec<Dim>,
) -> Result<(), GraphValidationError> {
    if shapes.insert(name.to_string(), (elem, dims)).is_some() {
        return Err(GraphValidationError::DuplicateName(name.to_string()));
    }
    Ok(())
}

fn infer(
    node: &Node,
    ins: &[&(ElemType, Vec<Dim>)],
    consts: &HashMap<&str, &Initializer>,
) -> Result<Vec<Dim>, String> {
    match node.op {
        OpKind::Reshape => {
            expect_inputs(ins, 2, 2)?;
            expect_f32(ins[0], "data")?;
            let target = match consts.get(node.inputs[1].as_str()) {
                Some(Initializer {
                    dims,
                    data: TensorData::I64(v),
                    ..
                }) if dims.len() == 1 => v,
                _ => return Err("shape must be a rank-1 int64 initializer".to_string()),
            };
            infer_reshape(&ins[0].1, target)
        }
        OpKind::Gemm => {
            expect_inputs(ins, 2, 3)?;
            for (i, t) in ins.iter().enumerate() {
                expect_f32(t, ["A", "B", "C"][i])?;
            }
            let trans_a = flag(node, "transA")?;
            let trans_b = flag(node, "transB")?;
            for attr in ["alpha", "beta"] {
                let v = node.float_attr(attr, 1.0)?;
                if !v.is_finite() {
                    return Err(format!("attribute {attr} must be finite"));
                }
            }
            let (a, b) = (&ins[0].1, &ins[1].1);
            if a.len() != 2 || b.len() != 2 {
                return Err(format!(
                    "A and B must be rank 2, found {} and {}",
                    fmt_dims(a),
                    fmt_dims(b)
                ));
            }
            let (m, k) = if trans_a { (&a[1], &a[0]) } else { (&a[0], &a[1]) };
            let (k2, n) = if trans_b { (&b[1], &b[0]) } else { (&b[0], &b[1]) };
            if k != k2 {
                return Err(format!("inner dimensions differ: {k} vs {k2}"));
            }
            let out = vec![m.clone(), n.clone()];
            if let Some(c) = ins.get(2) {
                check_broadcast(&c.1, &out)?;
            }
            Ok(out)
        }
        OpKind::Softmax => {
            expect_inputs(ins, 1, 1)?;
            expect_f32(ins[0], "input")?;
            let rank = ins[0].1.len() as i64;
            let axis = node.int_attr("axis", -1)?;
            if axis < -rank || axis >= rank {
                return Err(format!("axis {axis} out of range for rank {rank}"));
            }
            Ok(ins[0].1.clone())
        }
        OpKind::Tanh => {
            expect_inputs(ins, 1, 1)?;
            expect_f32(ins[0], "input")?;
            Ok(ins[0].1.clone())
        }
    }
}

/// ONNX Reshape semantics (`allowzero=0`): `0` copies the input dim, one `-1` is inferred.
fn infer_reshape(input: &[Dim], target: &[i64]) -> Result<Vec<Dim>, String> {
    if target.iter().filter(|&&t| t == -1).count() > 1 {
        return Err("shape has more than one -1".to_string());
    }

    let mut out: Vec<Option<Dim>> = Vec::with_capacity(target.len());
    for (i, &t) in target.iter().enumerate() {
        out.push(match t {
            -1 => None,
            0 => Some(
                input
                    .get(i)
                    .cloned()
                    .ok_or_else(|| format!("shape[{i}]=0 has no matching input dim"))?,
            ),
            t if t > 0 => Some(Dim::Fixed(t as usize)),
            t => return Err(format!("invalid shape entry {t}")),
        });
    }

    let (known_in, mut syms_in) = split_dims(input.iter())?;
    let (known_out, syms_out) = split_dims(out.iter().flatten())?;
    for s in &syms_out {
        match syms_in.iter().position(|x| x == s) {
            Some(p) => {
                syms_in.remove(p);
            }
            None => return Err(format!("symbolic dim {s} does not come from the input")),
        }
    }

    let hole = out.iter().position(Option::is_none);
    let fill = match (hole, syms_in.as_slice()) {
        (None, []) if known_in == known_out => None,
        (Some(_), []) if known_out > 0 && known_in % known_out == 0 => {
            Some(Dim::Fixed(known_in / known_out))
        }
        (Some(_), [s]) if known_in == known_out => Some(Dim::Sym(s.clone())),
        _ => {
            return Err(format!(
                "cannot reshape {} to {:?}",
                fmt_dims(input),
                target
            ))
        }
    };

    Ok(out
        .into_iter()
        .map(|d| d.or_else(|| fill.clone()))
        .collect::<Option<Vec<_>>>()
        .unwrap_or_default())
}

/// Product of fixed dims + list of symbolic names.
fn split_dims<'a>(dims: impl Iterator<Item = &'a Dim>) -> Result<(usize, Vec<String>), String> {
    let mut known = 1usize;
    let mut syms = Vec::new();
    for d in dims {
        match d {
            Dim::Fixed(n) => {
                known = known
                    .checked_mul(*n)
                    .ok_or_else(|| "element count overflows".to_string())?
            }
            Dim::Sym(s) => syms.push(s.clone()),
        }
    }
    Ok((known, syms))
}

/// Unidirectional broadcast of `c` to `target` (trailing-aligned, dims equal or 1).
fn check_broadcast(c: &[Dim], target: &[Dim]) -> Result<(), String> {
    if c.len() > target.len() {
        return Err(format!(
            "C {} cannot broadcast to {}",
            fmt_dims(c),
            fmt_dims(target)
        ));
    }
    let off = target.len() - c.len();
    for (i, d) in c.iter().enumerate() {
        if *d != Dim::Fixed(1) && *d != target[off + i] {
            return Err(format!(
                "C {} cannot broadcast to {}",
                fmt_dims(c),
                fmt_dims(target)
            ));
        }
    }
    Ok(())
}

fn flag(node: &Node, name: &str) -> Result<bool, String> {
    match node.int_attr(name, 0)? {
        0 => Ok(false),
        1 => Ok(true),
        v => Err(format!("attribute {name} must be 0 or 1, found {v}")),
    }
}

fn expect_inputs(ins: &[&(ElemType, Vec<Dim>)], min: usize, max: usize) -> Result<(), String> {
    if ins.len() < min || ins.len() > max {
        return Err(format!(
            "expected {min}..={max} inputs, found {}",
            ins.len()
        ));
    }
    Ok(())
}

fn expect_f32(t: &(ElemType, Vec<Dim>), what: &str) -> Result<(), String> {
    if t.0 != ElemType::F32 {
        return Err(format!("{what} must be float32, found {:?}", t.0));
    }
    Ok(())
}

fn node_err(node: &Node, reason: String) -> GraphValidationError {
    GraphValidationError::Node {
        node: node.name.clone(),
        reason,
    }
}

fn tensor_err(tensor: &str, reason: String) -> GraphValidationError {
    GraphValidationError::Tensor {
        tensor: tensor.to_string(),
        reason,
    }
}
