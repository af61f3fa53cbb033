//! Multinomial logistic regression over face embeddings.
//!
//! Trained by full-batch gradient descent with L2 regularization, starting
//! from zero weights. The objective is convex and the procedure has no
//! randomness, so fitting the same corpus always yields the same model.

use std::collections::BTreeSet;

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::classification::domain::labeled_sample::LabeledSample;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingParams {
    pub learning_rate: f64,
    pub epochs: usize,
    pub l2: f64,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.5,
            epochs: 300,
            l2: 1e-4,
        }
    }
}

/// A label with the model's probability for it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub label: i32,
    pub confidence: f64,
}

#[derive(Debug, Clone)]
pub struct SoftmaxModel {
    labels: Vec<i32>,
    /// `classes × features`
    weights: Array2<f64>,
    bias: Array1<f64>,
}

impl SoftmaxModel {
    /// Fits a model to every sample. `None` when `samples` is empty.
    pub fn fit(samples: &[LabeledSample], params: &TrainingParams) -> Option<SoftmaxModel> {
        let first = samples.first()?;
        let labels: Vec<i32> = samples
            .iter()
            .map(|s| s.label)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let n = samples.len();
        let d = first.embedding.values().len();
        let k = labels.len();

        let mut weights = Array2::<f64>::zeros((k, d));
        let mut bias = Array1::<f64>::zeros(k);

        // A single class needs no optimisation: softmax over one logit is 1.
        if k == 1 {
            return Some(SoftmaxModel {
                labels,
                weights,
                bias,
            });
        }

        let x = Array2::from_shape_fn((n, d), |(i, j)| samples[i].embedding.values()[j] as f64);
        let mut y = Array2::<f64>::zeros((n, k));
        for (i, s) in samples.iter().enumerate() {
            if let Ok(c) = labels.binary_search(&s.label) {
                y[[i, c]] = 1.0;
            }
        }

        let scale = 1.0 / n as f64;
        for _ in 0..params.epochs {
            let mut probs = x.dot(&weights.t()) + &bias;
            softmax_rows(&mut probs);

            let residual = (probs - &y) * scale;
            let grad_w = residual.t().dot(&x) + &weights * params.l2;
            let grad_b = residual.sum_axis(Axis(0));

            weights.scaled_add(-params.learning_rate, &grad_w);
            bias.scaled_add(-params.learning_rate, &grad_b);
        }

        Some(SoftmaxModel {
            labels,
            weights,
            bias,
        })
    }

    pub fn labels(&self) -> &[i32] {
        &self.labels
    }

    /// Most probable label; `confidence` is its probability in `[0, 1]`.
    pub fn predict(&self, features: &[f32]) -> Prediction {
        let x = Array1::from_iter(features.iter().map(|v| *v as f64));
        let mut logits = (self.weights.dot(&x) + &self.bias).insert_axis(Axis(0));
        softmax_rows(&mut logits);

        let (best, prob) = logits
            .row(0)
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::MIN), |acc, (i, p)| if p > acc.1 { (i, p) } else { acc });

        Prediction {
            label: self.labels[best],
            confidence: if prob.is_finite() {
                prob.clamp(0.0, 1.0)
            } else {
                0.0
            },
        }
    }
}

fn softmax_rows(m: &mut Array2<f64>) {
    for mut row in m.rows_mut() {
        let max = row.iter().copied().fold(f64::MIN, f64::max);
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        if sum > 0.0 {
            row.mapv_inplace(|v| v / sum);
        }
    }
}
