//! Margin-based ranking losses

use crate::{autograd::Variable, error::KgeResult};
use super::ElementwiseLoss;

/// Hinge loss `relu(margin - label * score)`, with negatives labelled -1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HingeLoss {
    margin: f32,
}

impl HingeLoss {
    pub fn new(margin: f32) -> Self {
        Self { margin }
    }

    pub fn margin(&self) -> f32 {
        self.margin
    }
}

impl ElementwiseLoss for HingeLoss {
    fn compute(&self, score: &Variable, label: f32) -> KgeResult<Variable> {
        score.affine(-label, self.margin)?.relu()
    }

    fn neg_label(&self) -> f32 {
        -1.0
    }

    fn name(&self) -> &'static str {
        "HingeLoss"
    }
}

/// `pos_score` with a trailing axis appended, minus `neg_score`. A `[batch]`
/// positive against `[batch, n]` negatives gives `[batch, n]` differences.
pub fn pairwise_difference(pos_score: &Variable, neg_score: &Variable) -> KgeResult<Variable> {
    pos_score.unsqueeze(-1)?.sub(neg_score)
}
