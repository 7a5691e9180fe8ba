//! kge-loss - loss functions for knowledge-graph embedding training
//!
//! Features:
//! - Hinge, log-sigmoid and binary cross-entropy criteria selected from configuration
//! - Self-adversarial negative sampling with gradient-free softmax weights
//! - Pairwise scoring of positive/negative differences
//! - A small dense tensor type and tape-based reverse-mode autograd
//!
//! ```no_run
//! use kge_loss::{AutogradEngine, KgeLoss, LossConfig, LossType, Tensor};
//!
//! # fn main() -> kge_loss::KgeResult<()> {
//! let loss = KgeLoss::new(LossConfig::new(LossType::Hinge).with_adversarial_sampling(1.0))?;
//! let engine = AutogradEngine::new();
//! let pos = engine.variable(Tensor::from_vec(vec![0.5, 1.2], &[2])?, true);
//! let neg = engine.variable(Tensor::from_vec(vec![0.1, -0.3, 0.9, 0.0], &[2, 2])?, true);
//! let total = loss.total_loss(&pos, &neg)?;
//! total.backward()?;
//! # Ok(())
//! # }
//! ```

pub mod autograd;
pub mod config;
pub mod error;
pub mod nn;
pub mod tensor;

pub use autograd::{AutogradEngine, Variable};
pub use config::LossConfig;
pub use error::{KgeError, KgeResult};
pub use nn::losses::{
    adversarial_weight, BceLoss, ElementwiseLoss, HingeLoss, KgeLoss, LogSigmoidLoss, Loss,
    LossCriterion, LossType, NegativeReduction,
};
pub use tensor::{Shape, Tensor};

/// Install a `tracing_subscriber` formatter for the process. A subscriber that
/// is already installed is left in place.
pub fn init() {
    if tracing_subscriber::fmt().try_init().is_err() {
        tracing::debug!("global tracing subscriber already installed");
    }
    tracing::info!("kge-loss {} initialized", version());
}

/// Get the current crate version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
