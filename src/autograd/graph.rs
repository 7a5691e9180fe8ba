//! Computation graph for automatic differentiation

use crate::{
    error::{KgeError, KgeResult},
    tensor::{Shape, Tensor},
};
use super::function::Function;

pub type NodeId = usize;

/// A node in the computation graph: a forward value plus how it was produced
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub value: Tensor,
    pub function: Function,
    pub requires_grad: bool,
    pub gradient: Option<Tensor>,
}

impl GraphNode {
    pub fn is_leaf(&self) -> bool {
        matches!(self.function, Function::Leaf)
    }
}

/// Append-only tape. Node ids are positions in the tape, so every node's
/// parents have smaller ids and a reverse walk is a valid topological order.
///
/// `generation` counts calls to [`ComputationGraph::clear`]. Ids are reused
/// after a clear, so a handle is only valid for the generation it was
/// created in.
#[derive(Debug, Default)]
pub struct ComputationGraph {
    nodes: Vec<GraphNode>,
    generation: u64,
}

impl ComputationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Fail with `InvalidState` unless `generation` is the current one
    pub fn ensure_generation(&self, generation: u64) -> KgeResult<()> {
        if generation == self.generation {
            Ok(())
        } else {
            Err(KgeError::InvalidState(format!(
                "handle from graph generation {} used after clear (current generation {})",
                generation, self.generation
            )))
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Create a leaf node (variable or constant)
    pub fn create_leaf_node(&mut self, value: Tensor, requires_grad: bool) -> NodeId {
        self.push(value, Function::Leaf, requires_grad)
    }

    /// Record the result of an operation. Results that do not depend on any
    /// gradient-requiring input are stored as constants.
    pub fn record(&mut self, value: Tensor, function: Function) -> KgeResult<(NodeId, bool)> {
        let mut requires_grad = false;
        for parent in function.parents() {
            requires_grad |= self.node(parent)?.requires_grad;
        }
        let function = if requires_grad { function } else { Function::Leaf };
        Ok((self.push(value, function, requires_grad), requires_grad))
    }

    fn push(&mut self, value: Tensor, function: Function, requires_grad: bool) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(GraphNode {
            value,
            function,
            requires_grad,
            gradient: None,
        });
        id
    }

    pub fn node(&self, id: NodeId) -> KgeResult<&GraphNode> {
        self.nodes.get(id).ok_or_else(|| {
            KgeError::InvalidState(format!(
                "node {} is not in the computation graph ({} nodes)",
                id,
                self.nodes.len()
            ))
        })
    }

    pub fn value(&self, id: NodeId) -> KgeResult<&Tensor> {
        Ok(&self.node(id)?.value)
    }

    pub fn shape(&self, id: NodeId) -> KgeResult<&Shape> {
        Ok(self.node(id)?.value.shape())
    }

    pub fn get_gradient(&self, id: NodeId) -> Option<&Tensor> {
        self.nodes.get(id)?.gradient.as_ref()
    }

    pub fn zero_gradients(&mut self) {
        for node in &mut self.nodes {
            node.gradient = None;
        }
    }

    /// Drop every node and start a new generation
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.generation += 1;
    }

    /// Reverse-mode pass from a single-element output. Gradients accumulate
    /// into every gradient-requiring node reached from `root`.
    pub fn backward(&mut self, root: NodeId) -> KgeResult<()> {
        let root_node = self.node(root)?;
        if root_node.value.numel() != 1 {
            return Err(KgeError::shape_error(
                "a single-element output for backward",
                &root_node.value.shape().to_string(),
                Some("Reduce the loss to a scalar first"),
            ));
        }
        if !root_node.requires_grad {
            return Err(KgeError::operation_error(
                "backward",
                "output does not depend on any variable that requires gradients",
            ));
        }

        let mut pending: Vec<Option<Tensor>> = vec![None; root + 1];
        pending[root] = Some(Tensor::full(root_node.value.shape().clone(), 1.0));

        for id in (0..=root).rev() {
            let Some(grad) = pending[id].take() else {
                continue;
            };

            tracing::trace!(
                node = id,
                function = self.nodes[id].function.name(),
                "propagating gradient"
            );
            for (parent, parent_grad) in self.nodes[id].function.backward(self, id, &grad)? {
                if self.nodes[parent].requires_grad {
                    accumulate(&mut pending[parent], parent_grad)?;
                }
            }
            accumulate(&mut self.nodes[id].gradient, grad)?;
        }

        tracing::debug!(root, nodes = self.nodes.len(), "backward pass complete");
        Ok(())
    }
}

fn accumulate(slot: &mut Option<Tensor>, grad: Tensor) -> KgeResult<()> {
    *slot = Some(match slot.take() {
        Some(existing) => existing.add(&grad)?,
        None => grad,
    });
    Ok(())
}
