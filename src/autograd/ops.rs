//! High-level operations that integrate with automatic differentiation

use crate::error::{ErrorContext, KgeResult, WithContext};
use super::{
    function::{log_sigmoid as log_sigmoid_scalar, sigmoid as sigmoid_scalar, Function},
    variable::Variable,
};

fn binary_context(operation: &str, a: &Variable, b: &Variable) -> ErrorContext {
    ErrorContext::new(operation)
        .with_shape(&a.shape().to_string())
        .with_shape(&b.shape().to_string())
}

/// Add two variables with broadcasting
pub fn add(a: &Variable, b: &Variable) -> KgeResult<Variable> {
    a.ensure_same_graph(b)?;
    let value = a.value().add(b.value()).with_context(|| binary_context("add", a, b))?;
    a.record(value, Function::Add(a.node_id(), b.node_id()))
}

/// Subtract two variables with broadcasting
pub fn sub(a: &Variable, b: &Variable) -> KgeResult<Variable> {
    a.ensure_same_graph(b)?;
    let value = a.value().sub(b.value()).with_context(|| binary_context("sub", a, b))?;
    a.record(value, Function::Sub(a.node_id(), b.node_id()))
}

/// Multiply two variables element-wise with broadcasting
pub fn mul(a: &Variable, b: &Variable) -> KgeResult<Variable> {
    a.ensure_same_graph(b)?;
    let value = a.value().mul(b.value()).with_context(|| binary_context("mul", a, b))?;
    a.record(value, Function::Mul(a.node_id(), b.node_id()))
}

/// `scale * input + shift`
pub fn affine(input: &Variable, scale: f32, shift: f32) -> KgeResult<Variable> {
    let value = input.value().map(|x| scale * x + shift);
    input.record(value, Function::Affine { input: input.node_id(), scale })
}

/// ReLU activation function with automatic differentiation
pub fn relu(input: &Variable) -> KgeResult<Variable> {
    let value = input.value().map(|x| x.max(0.0));
    input.record(value, Function::Relu(input.node_id()))
}

pub fn sigmoid(input: &Variable) -> KgeResult<Variable> {
    let value = input.value().map(sigmoid_scalar);
    input.record(value, Function::Sigmoid(input.node_id()))
}

pub fn log_sigmoid(input: &Variable) -> KgeResult<Variable> {
    let value = input.value().map(log_sigmoid_scalar);
    input.record(value, Function::LogSigmoid(input.node_id()))
}

/// Natural logarithm. Non-positive inputs give `-inf`/NaN, unguarded.
pub fn log(input: &Variable) -> KgeResult<Variable> {
    let value = input.value().map(f32::ln);
    input.record(value, Function::Log(input.node_id()))
}

/// Insert a length-1 axis at `axis`
pub fn unsqueeze(input: &Variable, axis: isize) -> KgeResult<Variable> {
    let value = input.value().unsqueeze(axis)?;
    input.record(value, Function::Reshape(input.node_id()))
}

/// Mean over all elements, producing a scalar
pub fn mean(input: &Variable) -> KgeResult<Variable> {
    let value = input.value().mean();
    input.record(value, Function::Mean(input.node_id()))
}

pub fn sum_axis(input: &Variable, axis: isize) -> KgeResult<Variable> {
    let resolved = input.shape().normalize_axis(axis)?;
    let value = input.value().sum_axis(axis)?;
    input.record(value, Function::SumAxis { input: input.node_id(), axis: resolved })
}

pub fn mean_axis(input: &Variable, axis: isize) -> KgeResult<Variable> {
    let resolved = input.shape().normalize_axis(axis)?;
    let value = input.value().mean_axis(axis)?;
    input.record(value, Function::MeanAxis { input: input.node_id(), axis: resolved })
}

impl Variable {
    pub fn add(&self, other: &Variable) -> KgeResult<Variable> {
        add(self, other)
    }

    pub fn sub(&self, other: &Variable) -> KgeResult<Variable> {
        sub(self, other)
    }

    pub fn mul(&self, other: &Variable) -> KgeResult<Variable> {
        mul(self, other)
    }

    pub fn affine(&self, scale: f32, shift: f32) -> KgeResult<Variable> {
        affine(self, scale, shift)
    }

    pub fn scale(&self, factor: f32) -> KgeResult<Variable> {
        affine(self, factor, 0.0)
    }

    pub fn neg(&self) -> KgeResult<Variable> {
        affine(self, -1.0, 0.0)
    }

    /// `value - self`
    pub fn rsub_scalar(&self, value: f32) -> KgeResult<Variable> {
        affine(self, -1.0, value)
    }

    pub fn relu(&self) -> KgeResult<Variable> {
        relu(self)
    }

    pub fn sigmoid(&self) -> KgeResult<Variable> {
        sigmoid(self)
    }

    pub fn log_sigmoid(&self) -> KgeResult<Variable> {
        log_sigmoid(self)
    }

    pub fn log(&self) -> KgeResult<Variable> {
        log(self)
    }

    pub fn unsqueeze(&self, axis: isize) -> KgeResult<Variable> {
        unsqueeze(self, axis)
    }

    pub fn mean(&self) -> KgeResult<Variable> {
        mean(self)
    }

    pub fn sum_axis(&self, axis: isize) -> KgeResult<Variable> {
        sum_axis(self, axis)
    }

    pub fn mean_axis(&self, axis: isize) -> KgeResult<Variable> {
        mean_axis(self, axis)
    }
}
