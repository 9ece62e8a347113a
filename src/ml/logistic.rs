use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ModelError, SparseRow};
use crate::config::ClassifierConfig;

/// L2-regularised logistic regression fitted by full-batch gradient descent.
///
/// Two classes fit a single weight vector for the larger class label; more
/// classes fit one-vs-rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    c: f64,
    max_iter: usize,
    learning_rate: f64,
    tol: f64,
    n_features: usize,
    classes: Vec<usize>,
    coef: Vec<Vec<f64>>,
    intercept: Vec<f64>,
    n_iter: Vec<usize>,
}

impl LogisticRegression {
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            c: config.c,
            max_iter: config.max_iter,
            learning_rate: config.learning_rate,
            tol: config.tol,
            n_features: 0,
            classes: Vec::new(),
            coef: Vec::new(),
            intercept: Vec::new(),
            n_iter: Vec::new(),
        }
    }

    pub fn classes(&self) -> &[usize] {
        &self.classes
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Iterations used per fitted weight vector.
    pub fn n_iter(&self) -> &[usize] {
        &self.n_iter
    }

    pub fn is_fitted(&self) -> bool {
        !self.coef.is_empty()
    }

    /// Checks weight shapes against the class list and feature count.
    pub fn check_consistency(&self) -> Result<(), ModelError> {
        let inconsistent =
            |detail: String| Err(ModelError::Inconsistent("LogisticRegression", detail));
        if !self.is_fitted() {
            return Ok(());
        }
        if self.classes.len() < 2 {
            return inconsistent(format!("{} classes", self.classes.len()));
        }
        let expected = if self.classes.len() == 2 {
            1
        } else {
            self.classes.len()
        };
        if self.coef.len() != expected || self.intercept.len() != expected {
            return inconsistent(format!(
                "{} weight vectors and {} intercepts for {} classes",
                self.coef.len(),
                self.intercept.len(),
                self.classes.len()
            ));
        }
        if let Some(weights) = self.coef.iter().find(|w| w.len() != self.n_features) {
            return inconsistent(format!(
                "weight vector of length {} for {} features",
                weights.len(),
                self.n_features
            ));
        }
        Ok(())
    }

    pub fn fit(&mut self, x: &[SparseRow], y: &[usize], n_features: usize) -> Result<(), ModelError> {
        if x.is_empty() {
            return Err(ModelError::NoSamples);
        }
        if x.len() != y.len() {
            return Err(ModelError::LengthMismatch {
                samples: x.len(),
                targets: y.len(),
            });
        }

        let mut classes = y.to_vec();
        classes.sort_unstable();
        classes.dedup();
        if classes.len() < 2 {
            return Err(ModelError::SingleClass(classes.len()));
        }

        self.n_features = n_features;
        self.coef.clear();
        self.intercept.clear();
        self.n_iter.clear();

        let positives: Vec<usize> = if classes.len() == 2 {
            vec![classes[1]]
        } else {
            classes.clone()
        };
        for positive in positives {
            let labels: Vec<f64> = y
                .iter()
                .map(|&target| if target == positive { 1.0 } else { 0.0 })
                .collect();
            let (weights, bias, iterations) = self.fit_binary(x, &labels);
            debug!(class = positive, iterations, "Fitted binary classifier");
            self.coef.push(weights);
            self.intercept.push(bias);
            self.n_iter.push(iterations);
        }
        self.classes = classes;
        Ok(())
    }

    // Minimises mean log loss + ||w||^2 / (2 * C * n).
    fn fit_binary(&self, x: &[SparseRow], labels: &[f64]) -> (Vec<f64>, f64, usize) {
        let n = x.len() as f64;
        let alpha = 1.0 / (self.c * n);
        let mut weights = vec![0.0; self.n_features];
        let mut bias = 0.0;
        let mut gradient = vec![0.0; self.n_features];

        for iteration in 1..=self.max_iter {
            gradient.iter_mut().for_each(|g| *g = 0.0);
            let mut bias_gradient = 0.0;
            for (row, &label) in x.iter().zip(labels) {
                let error = sigmoid(dot(&weights, row) + bias) - label;
                for &(index, value) in row {
                    if let Some(g) = gradient.get_mut(index) {
                        *g += error * value;
                    }
                }
                bias_gradient += error;
            }

            let mut largest: f64 = (bias_gradient / n).abs();
            for (g, w) in gradient.iter_mut().zip(&weights) {
                *g = *g / n + alpha * w;
                largest = largest.max(g.abs());
            }
            if largest < self.tol {
                return (weights, bias, iteration);
            }

            for (w, g) in weights.iter_mut().zip(&gradient) {
                *w -= self.learning_rate * g;
            }
            bias -= self.learning_rate * bias_gradient / n;
        }

        (weights, bias, self.max_iter)
    }

    /// Class probabilities per row, columns ordered as [`classes`](Self::classes).
    pub fn predict_proba(&self, x: &[SparseRow]) -> Result<Vec<Vec<f64>>, ModelError> {
        if !self.is_fitted() {
            return Err(ModelError::NotFitted("LogisticRegression"));
        }

        Ok(x
            .iter()
            .map(|row| {
                let scores: Vec<f64> = self
                    .coef
                    .iter()
                    .zip(&self.intercept)
                    .map(|(weights, bias)| sigmoid(dot(weights, row) + bias))
                    .collect();
                if scores.len() == 1 {
                    vec![1.0 - scores[0], scores[0]]
                } else {
                    let total: f64 = scores.iter().sum();
                    if total > 0.0 {
                        scores.iter().map(|s| s / total).collect()
                    } else {
                        vec![1.0 / scores.len() as f64; scores.len()]
                    }
                }
            })
            .collect())
    }

    pub fn predict(&self, x: &[SparseRow]) -> Result<Vec<usize>, ModelError> {
        let probabilities = self.predict_proba(x)?;
        Ok(probabilities
            .iter()
            .map(|row| self.classes[argmax(row)])
            .collect())
    }
}

pub(crate) fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (index, &value)| {
            if value > best.1 { (index, value) } else { best }
        })
        .0
}

fn dot(weights: &[f64], row: &SparseRow) -> f64 {
    row.iter()
        .map(|&(index, value)| weights.get(index).copied().unwrap_or(0.0) * value)
        .sum()
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Vec<SparseRow>, Vec<usize>) {
        let x = vec![
            vec![(0, 1.0)],
            vec![(0, 0.8), (2, 0.6)],
            vec![(1, 1.0)],
            vec![(1, 0.8), (2, 0.6)],
        ];
        (x, vec![0, 0, 1, 1])
    }

    #[test]
    fn binary_fit_separates_classes() {
        let (x, y) = separable();
        let mut model = LogisticRegression::new(&ClassifierConfig::default());
        model.fit(&x, &y, 3).unwrap();
        assert_eq!(model.predict(&x).unwrap(), y);
        for row in model.predict_proba(&x).unwrap() {
            assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn one_vs_rest_for_three_classes() {
        let x = vec![
            vec![(0, 1.0)],
            vec![(0, 1.0)],
            vec![(1, 1.0)],
            vec![(1, 1.0)],
            vec![(2, 1.0)],
            vec![(2, 1.0)],
        ];
        let y = vec![0, 0, 1, 1, 2, 2];
        let config = ClassifierConfig {
            max_iter: 300,
            ..ClassifierConfig::default()
        };
        let mut model = LogisticRegression::new(&config);
        model.fit(&x, &y, 3).unwrap();
        assert_eq!(model.classes(), &[0, 1, 2]);
        assert_eq!(model.predict(&x).unwrap(), y);
    }

    #[test]
    fn single_class_is_rejected() {
        let mut model = LogisticRegression::new(&ClassifierConfig::default());
        let err = model.fit(&[vec![(0, 1.0)]], &[3], 1).unwrap_err();
        assert_eq!(err, ModelError::SingleClass(1));
    }
}
