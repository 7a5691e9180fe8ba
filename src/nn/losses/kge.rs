//! Total loss over positive and sampled negative triple scores

use crate::{
    autograd::{AutogradEngine, Variable},
    config::LossConfig,
    error::{ErrorContext, KgeResult, WithContext},
    tensor::Tensor,
};
use super::{
    ranking::pairwise_difference, ElementwiseLoss, Loss, LossCriterion, NegativeReduction,
    POSITIVE_LABEL,
};

/// Configured knowledge-graph embedding loss.
///
/// In the standard mode the result is `(mean(pos_loss) + mean(neg_loss)) / 2`,
/// where each negative row is first collapsed by the [`NegativeReduction`]. In
/// pairwise mode the criterion scores `pos - neg` against the positive label
/// and the adversarial flag and negative label are not used.
#[derive(Debug, Clone)]
pub struct KgeLoss {
    config: LossConfig,
    criterion: LossCriterion,
    negatives: NegativeReduction,
}

impl KgeLoss {
    pub fn new(config: LossConfig) -> KgeResult<Self> {
        config.validate()?;
        let criterion = LossCriterion::new(config.loss_type, config.margin);
        let negatives = NegativeReduction::new(config.neg_adv_sampling, config.adv_temp_value);

        tracing::info!(
            loss = criterion.name(),
            margin = config.margin,
            neg_label = criterion.neg_label(),
            pairwise = config.pairwise,
            ?negatives,
            "Loss function configured"
        );

        Ok(Self {
            config,
            criterion,
            negatives,
        })
    }

    pub fn config(&self) -> &LossConfig {
        &self.config
    }

    pub fn criterion(&self) -> &LossCriterion {
        &self.criterion
    }

    pub fn negative_reduction(&self) -> NegativeReduction {
        self.negatives
    }

    pub fn neg_label(&self) -> f32 {
        self.criterion.neg_label()
    }

    pub fn is_pairwise(&self) -> bool {
        self.config.pairwise
    }

    /// Scalar training loss for `pos_score` (`[batch]` or `[batch, 1]`) and
    /// `neg_score` (`[batch, num_negatives]`).
    pub fn total_loss(&self, pos_score: &Variable, neg_score: &Variable) -> KgeResult<Variable> {
        let loss = if self.config.pairwise {
            self.pairwise_loss(pos_score, neg_score)
        } else {
            self.standard_loss(pos_score, neg_score)
        };
        let loss = loss.with_context(|| {
            ErrorContext::new("total_loss")
                .with_shape(&pos_score.shape().to_string())
                .with_shape(&neg_score.shape().to_string())
                .with_suggestion("Pass positive scores as [batch] and negative scores as [batch, num_negatives]")
        })?;

        tracing::trace!(
            pos = %pos_score.shape(),
            neg = %neg_score.shape(),
            loss = loss.value().as_slice().first().copied().unwrap_or(f32::NAN),
            "Computed total loss"
        );
        Ok(loss)
    }

    /// [`KgeLoss::total_loss`] on plain tensors, for evaluation without gradients
    pub fn total_loss_value(&self, pos_score: &Tensor, neg_score: &Tensor) -> KgeResult<f32> {
        let engine = AutogradEngine::new();
        let pos = engine.constant(pos_score.clone());
        let neg = engine.constant(neg_score.clone());
        self.total_loss(&pos, &neg)?.item()
    }

    fn pairwise_loss(&self, pos_score: &Variable, neg_score: &Variable) -> KgeResult<Variable> {
        let diff = pairwise_difference(pos_score, neg_score)?;
        self.criterion.compute(&diff, POSITIVE_LABEL)?.mean()
    }

    fn standard_loss(&self, pos_score: &Variable, neg_score: &Variable) -> KgeResult<Variable> {
        let pos_loss = self.criterion.compute(pos_score, POSITIVE_LABEL)?.mean()?;

        let neg_loss = self.criterion.compute(neg_score, self.criterion.neg_label())?;
        let neg_loss = self.negatives.reduce(&neg_loss, neg_score)?.mean()?;

        pos_loss.add(&neg_loss)?.scale(0.5)
    }
}

impl Loss for KgeLoss {
    fn forward(&self, pos_score: &Variable, neg_score: &Variable) -> KgeResult<Variable> {
        self.total_loss(pos_score, neg_score)
    }

    fn name(&self) -> &'static str {
        "KgeLoss"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::KgeError,
        nn::losses::{adversarial_weight, LossType},
        tensor::Shape,
    };
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn tensor(values: &[f32], dims: &[usize]) -> Tensor {
        Tensor::from_vec(values.to_vec(), dims).unwrap()
    }

    fn random_tensor(rng: &mut StdRng, dims: &[usize]) -> Tensor {
        let n: usize = dims.iter().product();
        let values = (0..n).map(|_| rng.gen_range(-3.0f32..3.0)).collect();
        Tensor::from_vec(values, dims).unwrap()
    }

    fn assert_close(actual: f32, expected: f32) {
        assert!((actual - expected).abs() < 1e-4, "{} != {}", actual, expected);
    }

    fn softplus(x: f32) -> f32 {
        (1.0 + x.exp()).ln()
    }

    #[test]
    fn test_log_sigmoid_example() {
        let loss = KgeLoss::new(LossConfig::new(LossType::LogSigmoid)).unwrap();
        let value = loss
            .total_loss_value(&tensor(&[2.0], &[1]), &tensor(&[-1.0], &[1, 1]))
            .unwrap();
        assert_close(value, 0.2201);
    }

    #[test]
    fn test_hinge_example() {
        let loss = KgeLoss::new(LossConfig::new(LossType::Hinge).with_margin(1.0)).unwrap();
        let value = loss
            .total_loss_value(&tensor(&[0.5], &[1]), &tensor(&[0.5], &[1, 1]))
            .unwrap();
        assert_close(value, 1.0);
    }

    #[test]
    fn test_bce_standard_mode() {
        let loss = KgeLoss::new(LossConfig::new(LossType::Bce)).unwrap();
        assert_eq!(loss.neg_label(), 0.0);
        let value = loss
            .total_loss_value(&tensor(&[1.0, -0.5], &[2]), &tensor(&[0.2, -1.0, 0.0, 0.7], &[2, 2]))
            .unwrap();
        // -log(sigmoid(s)) = softplus(-s); -log(1 - sigmoid(s)) = softplus(s)
        let pos = (softplus(-1.0) + softplus(0.5)) / 2.0;
        let row0 = (softplus(0.2) + softplus(-1.0)) / 2.0;
        let row1 = (softplus(0.0) + softplus(0.7)) / 2.0;
        assert_close(value, (pos + (row0 + row1) / 2.0) / 2.0);
    }

    #[test]
    fn test_positive_scores_as_column() {
        let loss = KgeLoss::new(LossConfig::new(LossType::LogSigmoid)).unwrap();
        let neg = tensor(&[0.3, -0.2, 1.1, 0.0], &[2, 2]);
        let flat = loss.total_loss_value(&tensor(&[0.4, 1.5], &[2]), &neg).unwrap();
        let column = loss.total_loss_value(&tensor(&[0.4, 1.5], &[2, 1]), &neg).unwrap();
        assert_close(flat, column);
    }

    #[test]
    fn test_zero_temperature_matches_mean_with_one_negative() {
        let mut rng = StdRng::seed_from_u64(11);
        for loss_type in LossType::all() {
            let pos = random_tensor(&mut rng, &[6]);
            let neg = random_tensor(&mut rng, &[6, 1]);
            let plain = KgeLoss::new(LossConfig::new(loss_type)).unwrap();
            let adversarial =
                KgeLoss::new(LossConfig::new(loss_type).with_adversarial_sampling(0.0)).unwrap();
            assert_close(
                adversarial.total_loss_value(&pos, &neg).unwrap(),
                plain.total_loss_value(&pos, &neg).unwrap(),
            );
        }
    }

    #[test]
    fn test_zero_temperature_matches_mean_with_many_negatives() {
        let mut rng = StdRng::seed_from_u64(12);
        let pos = random_tensor(&mut rng, &[4]);
        let neg = random_tensor(&mut rng, &[4, 5]);
        let plain = KgeLoss::new(LossConfig::new(LossType::Hinge)).unwrap();
        let adversarial =
            KgeLoss::new(LossConfig::new(LossType::Hinge).with_adversarial_sampling(0.0)).unwrap();
        assert_close(
            adversarial.total_loss_value(&pos, &neg).unwrap(),
            plain.total_loss_value(&pos, &neg).unwrap(),
        );
    }

    #[test]
    fn test_adversarial_weights_emphasize_hard_negatives() {
        let pos = tensor(&[0.0], &[1]);
        let neg = tensor(&[3.0, -3.0], &[1, 2]);
        let plain = KgeLoss::new(LossConfig::new(LossType::LogSigmoid)).unwrap();
        let adversarial =
            KgeLoss::new(LossConfig::new(LossType::LogSigmoid).with_adversarial_sampling(1.0)).unwrap();
        // the high-scoring negative carries the larger loss and the larger weight
        assert!(
            adversarial.total_loss_value(&pos, &neg).unwrap()
                > plain.total_loss_value(&pos, &neg).unwrap()
        );
    }

    #[test]
    fn test_pairwise_matches_manual_formula() {
        let mut rng = StdRng::seed_from_u64(13);
        for loss_type in LossType::all() {
            let pos = random_tensor(&mut rng, &[5]);
            let neg = random_tensor(&mut rng, &[5, 1]);
            let config = LossConfig::new(loss_type).with_margin(0.7).with_pairwise(true);
            let loss = KgeLoss::new(config).unwrap();
            let value = loss.total_loss_value(&pos, &neg).unwrap();

            let engine = AutogradEngine::new();
            let diff = pos.unsqueeze(-1).unwrap().sub(&neg).unwrap();
            let elementwise = loss.criterion().compute(&engine.constant(diff), 1.0).unwrap();
            assert_close(value, elementwise.value().mean().item().unwrap());
        }
    }

    #[test]
    fn test_pairwise_ignores_adversarial_sampling() {
        let pos = tensor(&[0.2, 1.0], &[2]);
        let neg = tensor(&[0.5, -1.0, 2.0, 0.1], &[2, 2]);
        let base = LossConfig::new(LossType::LogSigmoid).with_pairwise(true);
        let plain = KgeLoss::new(base.clone()).unwrap();
        let adversarial = KgeLoss::new(base.with_adversarial_sampling(3.0)).unwrap();
        assert_close(
            plain.total_loss_value(&pos, &neg).unwrap(),
            adversarial.total_loss_value(&pos, &neg).unwrap(),
        );
    }

    #[test]
    fn test_adversarial_gradient_treats_weights_as_constant() {
        let engine = AutogradEngine::new();
        let pos = engine.variable(tensor(&[0.0], &[1]), true);
        let neg = engine.variable(tensor(&[0.5, -1.0], &[1, 2]), true);
        let loss = KgeLoss::new(LossConfig::new(LossType::LogSigmoid).with_adversarial_sampling(1.0))
            .unwrap();

        let total = loss.total_loss(&pos, &neg).unwrap();
        total.backward().unwrap();

        // per negative: -log_sigmoid(-s) has derivative sigmoid(s); halved by the final average
        let weight = adversarial_weight(&tensor(&[0.5, -1.0], &[1, 2]), 1.0).unwrap();
        let sigmoid = |x: f32| 1.0 / (1.0 + (-x).exp());
        let grad = neg.grad().unwrap();
        for ((g, w), s) in grad.as_slice().iter().zip(weight.as_slice()).zip([0.5f32, -1.0]) {
            assert_close(*g, 0.5 * w * sigmoid(s));
        }
        // -log_sigmoid(s) at s = 0 has derivative -0.5
        assert_close(pos.grad().unwrap().item().unwrap(), -0.25);
    }

    #[test]
    fn test_unknown_loss_type_fails_at_configuration() {
        let err = "Square".parse::<LossType>().unwrap_err();
        assert!(matches!(err, KgeError::ConfigurationError(_)));
        let err = LossConfig::from_json_str(r#"{"loss_type": "Square"}"#).unwrap_err();
        assert!(matches!(err, KgeError::ConfigurationError(_)));
    }

    #[test]
    fn test_non_finite_margin_is_rejected() {
        for margin in [f32::INFINITY, f32::NEG_INFINITY, f32::NAN] {
            let err = KgeLoss::new(LossConfig::new(LossType::Hinge).with_margin(margin)).unwrap_err();
            assert!(matches!(err, KgeError::ConfigurationError(_)));
        }
    }

    #[test]
    fn test_shape_mismatch_propagates_with_context() {
        let pairwise = KgeLoss::new(LossConfig::default().with_pairwise(true)).unwrap();
        let err = pairwise
            .total_loss_value(&tensor(&[0.1, 0.2, 0.3], &[3]), &tensor(&[0.0; 4], &[2, 2]))
            .unwrap_err();
        match err {
            KgeError::ShapeError(msg) => {
                assert!(msg.contains("Operation: sub"));
                assert!(msg.contains("Operation: total_loss"));
            }
            other => panic!("expected shape error, got {:?}", other),
        }
    }

    #[test]
    fn test_standard_mode_reduces_sides_independently() {
        // positive and negative losses only meet as scalars
        let loss = KgeLoss::new(LossConfig::default()).unwrap();
        assert!(loss
            .total_loss_value(&tensor(&[0.1, 0.2, 0.3], &[3]), &tensor(&[0.0; 4], &[2, 2]))
            .is_ok());
    }

    #[test]
    fn test_scalar_negatives_have_no_negatives_axis() {
        let loss = KgeLoss::new(LossConfig::default()).unwrap();
        let err = loss
            .total_loss_value(&tensor(&[0.1], &[1]), &Tensor::zeros(Shape::scalar()))
            .unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::ShapeMismatch);
    }

    #[test]
    fn test_usable_as_trait_object() {
        let loss: Box<dyn Loss> = Box::new(KgeLoss::new(LossConfig::new(LossType::Hinge)).unwrap());
        let engine = AutogradEngine::new();
        let pos = engine.constant(tensor(&[0.5], &[1]));
        let neg = engine.constant(tensor(&[0.5], &[1, 1]));
        assert_eq!(loss.name(), "KgeLoss");
        assert_close(loss.forward(&pos, &neg).unwrap().item().unwrap(), 1.0);
    }
}
