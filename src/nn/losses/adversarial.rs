//! Self-adversarial weighting of negative samples

use crate::{
    autograd::Variable,
    error::KgeResult,
    tensor::Tensor,
};

/// `softmax(temperature * neg_score)` along the last axis.
///
/// Works on plain tensors, so the weights never enter the autograd tape as
/// anything but constants.
pub fn adversarial_weight(neg_score: &Tensor, temperature: f32) -> KgeResult<Tensor> {
    neg_score.scale(temperature).softmax(-1)
}

/// How per-negative losses collapse along the negatives axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NegativeReduction {
    /// Plain mean over the negatives of each example
    Mean,
    /// Weighted sum with [`adversarial_weight`] at the given temperature
    Adversarial { temperature: f32 },
}

impl NegativeReduction {
    pub fn new(neg_adv_sampling: bool, adv_temp_value: f32) -> Self {
        if neg_adv_sampling {
            NegativeReduction::Adversarial {
                temperature: adv_temp_value,
            }
        } else {
            NegativeReduction::Mean
        }
    }

    /// Collapse `neg_loss` (`[batch, n]`) to `[batch]`. `neg_score` supplies the
    /// adversarial weights and is not differentiated through.
    pub fn reduce(&self, neg_loss: &Variable, neg_score: &Variable) -> KgeResult<Variable> {
        match *self {
            NegativeReduction::Mean => neg_loss.mean_axis(-1),
            NegativeReduction::Adversarial { temperature } => {
                let weight = adversarial_weight(neg_score.value(), temperature)?;
                let weight = neg_score.constant_like(weight);
                neg_loss.mul(&weight)?.sum_axis(-1)
            }
        }
    }
}
