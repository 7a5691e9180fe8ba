//! Automatic differentiation system with computation graph
//!
//! Reverse-mode autograd over an append-only tape. Every [`Variable`] holds a
//! handle to the tape of the [`AutogradEngine`] that created it; operations on
//! variables record a node, and [`AutogradEngine::backward`] walks the tape
//! from a scalar output.

pub mod function;
pub mod graph;
pub mod ops;
pub mod variable;

pub use function::Function;
pub use graph::{ComputationGraph, GraphNode, NodeId};
pub use variable::Variable;

use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
    error::{KgeError, KgeResult},
    tensor::Tensor,
};

/// Tape shared by all variables of one engine
pub type SharedGraph = Arc<Mutex<ComputationGraph>>;

/// Main autograd engine that owns a computation graph
#[derive(Debug, Clone, Default)]
pub struct AutogradEngine {
    graph: SharedGraph,
}

impl AutogradEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a variable (leaf node)
    pub fn variable(&self, tensor: Tensor, requires_grad: bool) -> Variable {
        Variable::leaf(&self.graph, tensor, requires_grad)
    }

    /// Create a leaf that never receives gradients
    pub fn constant(&self, tensor: Tensor) -> Variable {
        Variable::leaf(&self.graph, tensor, false)
    }

    /// Run backward pass from a scalar loss
    pub fn backward(&self, loss: &Variable) -> KgeResult<()> {
        self.ensure_owns(loss)?;
        let mut graph = self.graph.lock();
        graph.ensure_generation(loss.generation())?;
        graph.backward(loss.node_id())
    }

    /// Get accumulated gradients for a variable
    pub fn gradients(&self, var: &Variable) -> Option<Tensor> {
        if !Arc::ptr_eq(&self.graph, var.graph()) {
            return None;
        }
        let graph = self.graph.lock();
        graph.ensure_generation(var.generation()).ok()?;
        graph.get_gradient(var.node_id()).cloned()
    }

    /// Zero all gradients in the computation graph
    pub fn zero_grad(&self) {
        self.graph.lock().zero_gradients();
    }

    /// Clear the computation graph. Variables created before the clear become
    /// stale and every tape operation on them returns `InvalidState`.
    pub fn clear_graph(&self) {
        self.graph.lock().clear();
    }

    pub fn num_nodes(&self) -> usize {
        self.graph.lock().len()
    }

    fn ensure_owns(&self, var: &Variable) -> KgeResult<()> {
        if Arc::ptr_eq(&self.graph, var.graph()) {
            Ok(())
        } else {
            Err(KgeError::InvalidInput(
                "variable was created by a different autograd engine".to_string(),
            ))
        }
    }
}
