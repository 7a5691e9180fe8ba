//! Logistic losses over triple scores

use crate::{autograd::Variable, error::KgeResult};
use super::ElementwiseLoss;

/// `-log_sigmoid(label * score)`, with negatives labelled -1
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LogSigmoidLoss;

impl ElementwiseLoss for LogSigmoidLoss {
    fn compute(&self, score: &Variable, label: f32) -> KgeResult<Variable> {
        score.scale(label)?.log_sigmoid()?.neg()
    }

    fn neg_label(&self) -> f32 {
        -1.0
    }

    fn name(&self) -> &'static str {
        "LogSigmoidLoss"
    }
}

/// Binary cross-entropy on `sigmoid(score)`, with negatives labelled 0.
///
/// `-(label * log(sigmoid(score)) + (1 - label) * log(1 - sigmoid(score)))`.
/// Saturated scores are not clamped, so `log(0)` surfaces as `inf`/NaN.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BceLoss;

impl ElementwiseLoss for BceLoss {
    fn compute(&self, score: &Variable, label: f32) -> KgeResult<Variable> {
        let prob = score.sigmoid()?;
        let positive = prob.log()?.scale(label)?;
        let negative = prob.rsub_scalar(1.0)?.log()?.scale(1.0 - label)?;
        positive.add(&negative)?.neg()
    }

    fn neg_label(&self) -> f32 {
        0.0
    }

    fn name(&self) -> &'static str {
        "BCELoss"
    }
}
