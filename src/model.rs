//! Classifier boundary and accuracy evaluation.
//!
//! The classifier itself is opaque: anything that maps (N, 3, T, H, W) clips to
//! (N, 7) logits. [`OnnxClassifier`] runs an ONNX export of the 3D-CNN.

use crate::constants::NUM_CLASSES;
use crate::loader::ClipLoader;
use crate::{Error, Result};
use log::info;
use ndarray::{Array2, Array5, CowArray, Ix2};
use ort::{Environment, Session, Value};
use std::path::Path;
use std::sync::Arc;

/// A video classifier over clip batches
pub trait ClipClassifier: Send {
    /// Map (N, 3, T, H, W) inputs to (N, 7) logits
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails or the output has the wrong shape.
    fn forward(&mut self, inputs: &Array5<f32>) -> Result<Array2<f32>>;
}

/// Clip classifier using `ONNX` Runtime
pub struct OnnxClassifier {
    session: Session,
}

impl OnnxClassifier {
    /// Load a classifier from an `ONNX` model file
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be loaded or has no inputs/outputs.
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        info!("Initializing OnnxClassifier with model: {}", model_path.as_ref().display());
        let environment = Arc::new(
            Environment::builder()
                .with_name("clip_classifier")
                .with_log_level(ort::LoggingLevel::Warning)
                .build()?,
        );

        let session = ort::SessionBuilder::new(&environment)?
            .with_optimization_level(ort::GraphOptimizationLevel::Level3)?
            .with_model_from_file(model_path)?;

        if session.inputs.is_empty() {
            return Err(Error::ModelInputError("Model has no inputs".to_string()));
        }
        if session.outputs.is_empty() {
            return Err(Error::ModelOutputError("Model has no outputs".to_string()));
        }

        Ok(Self { session })
    }
}

impl ClipClassifier for OnnxClassifier {
    fn forward(&mut self, inputs: &Array5<f32>) -> Result<Array2<f32>> {
        let batch = inputs.shape()[0];
        let cow_array = CowArray::from(inputs.view().into_dyn());
        let input_tensor = Value::from_array(self.session.allocator(), &cow_array)?;

        let outputs = self.session.run(vec![input_tensor])?;
        let logits_output = outputs
            .into_iter()
            .next()
            .ok_or_else(|| Error::ModelOutputError("No output from model".to_string()))?;

        let logits_tensor = logits_output.try_extract::<f32>()?;
        let logits = logits_tensor
            .view()
            .to_owned()
            .into_dimensionality::<Ix2>()
            .map_err(|e| Error::ModelOutputError(format!("Expected 2-D logits: {e}")))?;
        check_logits(&logits, batch)?;
        Ok(logits)
    }
}

/// Verify logits are (batch, NUM_CLASSES)
///
/// # Errors
///
/// Returns [`Error::ModelOutputError`] on any other shape.
pub fn check_logits(logits: &Array2<f32>, batch: usize) -> Result<()> {
    if logits.dim() != (batch, NUM_CLASSES) {
        return Err(Error::ModelOutputError(format!(
            "Expected logits of shape ({batch}, {NUM_CLASSES}), got {:?}",
            logits.shape()
        )));
    }
    Ok(())
}

/// Index of the largest logit of every row (first one on ties)
#[must_use]
pub fn predict(logits: &Array2<f32>) -> Vec<usize> {
    logits
        .rows()
        .into_iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
                .0
        })
        .collect()
}

/// Number of predictions that equal their label
///
/// Labels without a class (`-1`) never match.
#[must_use]
pub fn count_correct(predictions: &[usize], labels: &[i64]) -> usize {
    predictions
        .iter()
        .zip(labels)
        .filter(|(p, l)| i64::try_from(**p).map_or(false, |p| p == **l))
        .count()
}

/// Fraction of correct predictions, 0.0 when there are none
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn accuracy(predictions: &[usize], labels: &[i64]) -> f64 {
    let total = predictions.len().min(labels.len());
    if total == 0 {
        return 0.0;
    }
    count_correct(predictions, labels) as f64 / total as f64
}

/// Accuracy over one pass of a loader
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub correct: usize,
    pub total: usize,
    pub accuracy: f64,
}

/// Run `classifier` over every batch of one epoch and measure accuracy
///
/// # Errors
///
/// Returns the first loader or classifier error.
#[allow(clippy::cast_precision_loss)]
pub fn evaluate(loader: &mut ClipLoader<'_>, classifier: &mut dyn ClipClassifier) -> Result<Evaluation> {
    let mut correct = 0;
    let mut total = 0;
    for batch in loader.iter_batches() {
        let batch = batch?;
        let logits = classifier.forward(&batch.inputs)?;
        check_logits(&logits, batch.len())?;
        let predictions = predict(&logits);
        let labels = batch.labels.to_vec();
        correct += count_correct(&predictions, &labels);
        total += labels.len();
        log::debug!("Evaluated batch of {}: running accuracy {correct}/{total}", labels.len());
    }

    let accuracy = if total == 0 { 0.0 } else { correct as f64 / total as f64 };
    info!("Accuracy: {correct}/{total} = {accuracy:.4}");
    Ok(Evaluation {
        correct,
        total,
        accuracy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_predict_argmax() {
        let logits = array![[0.1, 0.9, 0.0], [2.0, -1.0, 2.0], [-3.0, -2.0, -1.0]];
        assert_eq!(predict(&logits), vec![1, 0, 2]);
    }

    #[test]
    fn test_accuracy() {
        assert!((accuracy(&[1, 2, 3, 4], &[1, 2, 0, 0]) - 0.5).abs() < 1e-12);
        assert_eq!(accuracy(&[], &[]), 0.0);
    }

    #[test]
    fn test_unlabeled_counts_as_wrong() {
        assert_eq!(count_correct(&[0, 1], &[-1, 1]), 1);
    }

    #[test]
    fn test_check_logits() {
        assert!(check_logits(&Array2::zeros((2, NUM_CLASSES)), 2).is_ok());
        assert!(matches!(
            check_logits(&Array2::zeros((2, 5)), 2),
            Err(Error::ModelOutputError(_))
        ));
    }
}
