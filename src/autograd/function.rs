//! Differentiable functions recorded on the tape and their gradient rules

use crate::{
    error::KgeResult,
    tensor::{Shape, Tensor},
};
use super::graph::{ComputationGraph, NodeId};

/// How a node was produced. Binary functions broadcast their operands, so
/// their gradients are summed back down to each operand's shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Function {
    Leaf,
    Add(NodeId, NodeId),
    Sub(NodeId, NodeId),
    Mul(NodeId, NodeId),
    /// `scale * x + shift`; the shift does not affect the gradient
    Affine { input: NodeId, scale: f32 },
    Relu(NodeId),
    Sigmoid(NodeId),
    LogSigmoid(NodeId),
    Log(NodeId),
    Reshape(NodeId),
    Mean(NodeId),
    SumAxis { input: NodeId, axis: usize },
    MeanAxis { input: NodeId, axis: usize },
}

impl Function {
    pub fn name(&self) -> &'static str {
        match self {
            Function::Leaf => "leaf",
            Function::Add(..) => "add",
            Function::Sub(..) => "sub",
            Function::Mul(..) => "mul",
            Function::Affine { .. } => "affine",
            Function::Relu(_) => "relu",
            Function::Sigmoid(_) => "sigmoid",
            Function::LogSigmoid(_) => "log_sigmoid",
            Function::Log(_) => "log",
            Function::Reshape(_) => "reshape",
            Function::Mean(_) => "mean",
            Function::SumAxis { .. } => "sum_axis",
            Function::MeanAxis { .. } => "mean_axis",
        }
    }

    pub fn parents(&self) -> Vec<NodeId> {
        match *self {
            Function::Leaf => Vec::new(),
            Function::Add(a, b) | Function::Sub(a, b) | Function::Mul(a, b) => vec![a, b],
            Function::Affine { input, .. }
            | Function::SumAxis { input, .. }
            | Function::MeanAxis { input, .. } => vec![input],
            Function::Relu(x)
            | Function::Sigmoid(x)
            | Function::LogSigmoid(x)
            | Function::Log(x)
            | Function::Reshape(x)
            | Function::Mean(x) => vec![x],
        }
    }

    /// Gradients with respect to each parent, given the gradient `grad` of
    /// node `output`.
    pub fn backward(
        &self,
        graph: &ComputationGraph,
        output: NodeId,
        grad: &Tensor,
    ) -> KgeResult<Vec<(NodeId, Tensor)>> {
        let grads = match *self {
            Function::Leaf => Vec::new(),
            Function::Add(a, b) => vec![
                (a, grad.sum_to(graph.shape(a)?)?),
                (b, grad.sum_to(graph.shape(b)?)?),
            ],
            Function::Sub(a, b) => vec![
                (a, grad.sum_to(graph.shape(a)?)?),
                (b, grad.scale(-1.0).sum_to(graph.shape(b)?)?),
            ],
            Function::Mul(a, b) => {
                let lhs = graph.value(a)?;
                let rhs = graph.value(b)?;
                vec![
                    (a, grad.mul(rhs)?.sum_to(lhs.shape())?),
                    (b, grad.mul(lhs)?.sum_to(rhs.shape())?),
                ]
            }
            Function::Affine { input, scale } => vec![(input, grad.scale(scale))],
            Function::Relu(x) => {
                let input = graph.value(x)?;
                vec![(x, grad.zip_with(input, |g, v| if v > 0.0 { g } else { 0.0 })?)]
            }
            Function::Sigmoid(x) => {
                let y = graph.value(output)?;
                vec![(x, grad.zip_with(y, |g, s| g * s * (1.0 - s))?)]
            }
            Function::LogSigmoid(x) => {
                let input = graph.value(x)?;
                vec![(x, grad.zip_with(input, |g, v| g * sigmoid(-v))?)]
            }
            Function::Log(x) => {
                let input = graph.value(x)?;
                vec![(x, grad.div(input)?)]
            }
            Function::Reshape(x) => vec![(x, grad.reshape(graph.shape(x)?.clone())?)],
            Function::Mean(x) => {
                let shape = graph.shape(x)?;
                let share = grad.item()? / shape.total_elements() as f32;
                vec![(x, Tensor::full(shape.clone(), share))]
            }
            Function::SumAxis { input, axis } => {
                vec![(input, spread_along(grad, axis, graph.shape(input)?)?)]
            }
            Function::MeanAxis { input, axis } => {
                let shape = graph.shape(input)?;
                let len = shape.dims[axis] as f32;
                vec![(input, spread_along(grad, axis, shape)?.scale(1.0 / len))]
            }
        };
        Ok(grads)
    }
}

/// Re-insert a reduced axis and broadcast back to the input shape.
fn spread_along(grad: &Tensor, axis: usize, shape: &Shape) -> KgeResult<Tensor> {
    grad.unsqueeze(axis as isize)?.broadcast_to(shape)
}

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// `log(sigmoid(x))` without overflowing `exp` for large `|x|`.
pub fn log_sigmoid(x: f32) -> f32 {
    x.min(0.0) - (-x.abs()).exp().ln_1p()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parents() {
        assert!(Function::Leaf.parents().is_empty());
        assert_eq!(Function::Sub(3, 1).parents(), vec![3, 1]);
        assert_eq!(Function::MeanAxis { input: 4, axis: 1 }.parents(), vec![4]);
        assert_eq!(Function::LogSigmoid(2).name(), "log_sigmoid");
    }

    #[test]
    fn test_scalar_kernels() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-7);
        assert!((log_sigmoid(2.0) - sigmoid(2.0).ln()).abs() < 1e-6);
        assert!((log_sigmoid(-3.0) - sigmoid(-3.0).ln()).abs() < 1e-6);
        assert!(log_sigmoid(-200.0).is_finite());
        assert!((log_sigmoid(-200.0) + 200.0).abs() < 1e-3);
        assert!(log_sigmoid(200.0) <= 0.0);
    }
}
