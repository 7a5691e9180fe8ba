//! Dense `f32` tensors with numpy-style broadcasting
//!
//! Just enough numeric machinery for scoring losses: elementwise kernels,
//! axis reductions, softmax, and the broadcast/sum-to pair that the autograd
//! tape uses to route gradients back to broadcast operands.

pub mod core;
pub mod ops;

// Re-export main types for convenience
pub use self::core::{Shape, Tensor};
