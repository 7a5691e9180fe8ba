//! Variable wrapper for tensors in the computation graph

use std::{fmt, sync::Arc};

use crate::{
    error::{KgeError, KgeResult},
    tensor::{Shape, Tensor},
};
use super::{function::Function, graph::NodeId, SharedGraph};

/// A tensor recorded on an autograd tape.
///
/// The forward value is cached on the handle, so reading it never touches the
/// tape. Cloning a variable clones the handle, not the node. A handle is tied
/// to the tape generation it was created in and goes stale when the tape is
/// cleared.
#[derive(Clone)]
pub struct Variable {
    graph: SharedGraph,
    generation: u64,
    node_id: NodeId,
    value: Tensor,
    requires_grad: bool,
}

impl Variable {
    fn new(
        graph: SharedGraph,
        generation: u64,
        node_id: NodeId,
        value: Tensor,
        requires_grad: bool,
    ) -> Self {
        Self {
            graph,
            generation,
            node_id,
            value,
            requires_grad,
        }
    }

    /// Create a leaf on `graph`.
    pub(crate) fn leaf(graph: &SharedGraph, value: Tensor, requires_grad: bool) -> Self {
        let (generation, node_id) = {
            let mut tape = graph.lock();
            (tape.generation(), tape.create_leaf_node(value.clone(), requires_grad))
        };
        Self::new(graph.clone(), generation, node_id, value, requires_grad)
    }

    /// Record `value` as the output of `function` on this variable's tape.
    pub(crate) fn record(&self, value: Tensor, function: Function) -> KgeResult<Variable> {
        let (node_id, requires_grad) = {
            let mut tape = self.graph.lock();
            tape.ensure_generation(self.generation)?;
            tape.record(value.clone(), function)?
        };
        Ok(Self::new(self.graph.clone(), self.generation, node_id, value, requires_grad))
    }

    pub(crate) fn graph(&self) -> &SharedGraph {
        &self.graph
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn ensure_same_graph(&self, other: &Variable) -> KgeResult<()> {
        if !Arc::ptr_eq(&self.graph, &other.graph) {
            return Err(KgeError::InvalidInput(
                "variables belong to different autograd engines".to_string(),
            ));
        }
        self.graph.lock().ensure_generation(other.generation)
    }

    /// Get node ID in computation graph
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Get the forward value
    pub fn value(&self) -> &Tensor {
        &self.value
    }

    pub fn shape(&self) -> &Shape {
        self.value.shape()
    }

    pub fn dims(&self) -> &[usize] {
        self.value.dims()
    }

    pub fn item(&self) -> KgeResult<f32> {
        self.value.item()
    }

    /// Check if variable requires gradients
    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    /// Whether this variable was created directly rather than computed. Stale
    /// handles report `true`.
    pub fn is_leaf(&self) -> bool {
        let tape = self.graph.lock();
        if tape.ensure_generation(self.generation).is_err() {
            return true;
        }
        tape.node(self.node_id).map(|node| node.is_leaf()).unwrap_or(true)
    }

    /// Accumulated gradient, if a backward pass reached this variable
    pub fn grad(&self) -> Option<Tensor> {
        let tape = self.graph.lock();
        tape.ensure_generation(self.generation).ok()?;
        tape.get_gradient(self.node_id).cloned()
    }

    /// Run a backward pass from this (single-element) variable
    pub fn backward(&self) -> KgeResult<()> {
        let mut tape = self.graph.lock();
        tape.ensure_generation(self.generation)?;
        tape.backward(self.node_id)
    }

    /// Same value as a new constant on the same tape. Nothing computed from the
    /// result propagates gradients back into `self`.
    pub fn detach(&self) -> Variable {
        Self::leaf(&self.graph, self.value.clone(), false)
    }

    /// Wrap `value` as a constant on this variable's tape
    pub fn constant_like(&self, value: Tensor) -> Variable {
        Self::leaf(&self.graph, value, false)
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable")
            .field("node_id", &self.node_id)
            .field("generation", &self.generation)
            .field("shape", self.value.shape())
            .field("requires_grad", &self.requires_grad)
            .finish()
    }
}
