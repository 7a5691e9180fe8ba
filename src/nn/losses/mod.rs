//! Knowledge-graph embedding losses with automatic differentiation support
//!
//! A [`LossCriterion`] is an elementwise `(score, label) -> loss` formula. A
//! [`KgeLoss`] binds one criterion from a [`crate::config::LossConfig`] and
//! reduces positive and negative triple scores to a single training signal.

pub mod adversarial;
pub mod classification;
pub mod kge;
pub mod ranking;

pub use adversarial::{adversarial_weight, NegativeReduction};
pub use classification::{BceLoss, LogSigmoidLoss};
pub use kge::KgeLoss;
pub use ranking::HingeLoss;

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    autograd::Variable,
    error::{KgeError, KgeResult},
};

/// Label the criteria use for positive triples
pub const POSITIVE_LABEL: f32 = 1.0;

/// Base trait for losses over positive and negative triple scores
pub trait Loss: Send + Sync {
    /// Reduce the scores to a scalar loss
    fn forward(&self, pos_score: &Variable, neg_score: &Variable) -> KgeResult<Variable>;

    /// Get the name of the loss function
    fn name(&self) -> &'static str;
}

/// An elementwise loss formula applied to scores against a scalar label
pub trait ElementwiseLoss: Send + Sync {
    fn compute(&self, score: &Variable, label: f32) -> KgeResult<Variable>;

    /// Label this formula expects for negative examples
    fn neg_label(&self) -> f32;

    fn name(&self) -> &'static str;
}

/// Loss formula tag, as written in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LossType {
    #[serde(rename = "Hinge")]
    Hinge,
    #[default]
    #[serde(rename = "Logsigmoid", alias = "LogSigmoid")]
    LogSigmoid,
    #[serde(rename = "BCE")]
    Bce,
}

impl LossType {
    pub fn tag(&self) -> &'static str {
        match self {
            LossType::Hinge => "Hinge",
            LossType::LogSigmoid => "Logsigmoid",
            LossType::Bce => "BCE",
        }
    }

    pub fn neg_label(&self) -> f32 {
        match self {
            LossType::Hinge | LossType::LogSigmoid => -1.0,
            LossType::Bce => 0.0,
        }
    }

    pub fn all() -> [LossType; 3] {
        [LossType::Hinge, LossType::LogSigmoid, LossType::Bce]
    }
}

impl FromStr for LossType {
    type Err = KgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Hinge" => Ok(LossType::Hinge),
            "Logsigmoid" | "LogSigmoid" => Ok(LossType::LogSigmoid),
            "BCE" => Ok(LossType::Bce),
            _ => Err(KgeError::ConfigurationError(format!(
                "Unknown loss type '{}', expected one of Hinge, Logsigmoid, BCE",
                s
            ))),
        }
    }
}

impl fmt::Display for LossType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// The bound loss formula
#[derive(Debug, Clone, PartialEq)]
pub enum LossCriterion {
    Hinge(HingeLoss),
    LogSigmoid(LogSigmoidLoss),
    Bce(BceLoss),
}

impl LossCriterion {
    pub fn new(loss_type: LossType, margin: f32) -> Self {
        match loss_type {
            LossType::Hinge => LossCriterion::Hinge(HingeLoss::new(margin)),
            LossType::LogSigmoid => LossCriterion::LogSigmoid(LogSigmoidLoss),
            LossType::Bce => LossCriterion::Bce(BceLoss),
        }
    }

    pub fn loss_type(&self) -> LossType {
        match self {
            LossCriterion::Hinge(_) => LossType::Hinge,
            LossCriterion::LogSigmoid(_) => LossType::LogSigmoid,
            LossCriterion::Bce(_) => LossType::Bce,
        }
    }

    fn inner(&self) -> &dyn ElementwiseLoss {
        match self {
            LossCriterion::Hinge(loss) => loss,
            LossCriterion::LogSigmoid(loss) => loss,
            LossCriterion::Bce(loss) => loss,
        }
    }
}

impl ElementwiseLoss for LossCriterion {
    fn compute(&self, score: &Variable, label: f32) -> KgeResult<Variable> {
        self.inner().compute(score, label)
    }

    fn neg_label(&self) -> f32 {
        self.inner().neg_label()
    }

    fn name(&self) -> &'static str {
        self.inner().name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loss_type_tags() {
        for loss_type in LossType::all() {
            assert_eq!(loss_type.tag().parse::<LossType>().unwrap(), loss_type);
            assert_eq!(loss_type.to_string(), loss_type.tag());
        }
        assert_eq!("LogSigmoid".parse::<LossType>().unwrap(), LossType::LogSigmoid);
    }

    #[test]
    fn test_unknown_loss_type() {
        let err = "hinge".parse::<LossType>().unwrap_err();
        assert!(matches!(err, KgeError::ConfigurationError(_)));
        assert!(err.to_string().contains("'hinge'"));
    }

    #[test]
    fn test_neg_label_convention() {
        assert_eq!(LossType::Hinge.neg_label(), -1.0);
        assert_eq!(LossType::LogSigmoid.neg_label(), -1.0);
        assert_eq!(LossType::Bce.neg_label(), 0.0);
    }

    #[test]
    fn test_criterion_binding() {
        for loss_type in LossType::all() {
            let criterion = LossCriterion::new(loss_type, 2.0);
            assert_eq!(criterion.loss_type(), loss_type);
            assert_eq!(criterion.neg_label(), loss_type.neg_label());
        }
        assert_eq!(LossCriterion::new(LossType::Hinge, 2.0), LossCriterion::Hinge(HingeLoss::new(2.0)));
        assert_eq!(LossCriterion::new(LossType::Bce, 0.0).name(), "BCELoss");
    }
}
