//! Stacking labeled clips into batch tensors.

use crate::dataset::LabeledClip;
use crate::{Error, Result};
use ndarray::{Array1, Array5, ArrayView4, Axis};

/// A batch of clips and their labels
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Shape (N, C, T, H, W)
    pub inputs: Array5<f32>,
    /// Shape (N)
    pub labels: Array1<i64>,
}

impl Batch {
    /// Number of clips in the batch
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Stack clips along a new leading axis, preserving order
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for an empty list and
/// [`Error::ShapeMismatch`] naming the first clip whose shape differs from
/// the first one.
pub fn collate(items: Vec<LabeledClip>) -> Result<Batch> {
    let first = items
        .first()
        .ok_or_else(|| Error::InvalidInput("Cannot collate an empty batch".to_string()))?;
    let expected = first.clip.shape().to_vec();

    if let Some((index, item)) = items
        .iter()
        .enumerate()
        .find(|(_, item)| item.clip.shape() != expected.as_slice())
    {
        return Err(Error::ShapeMismatch(format!(
            "Clip {index} has shape {:?}, expected {expected:?}",
            item.clip.shape()
        )));
    }

    let views: Vec<ArrayView4<'_, f32>> = items.iter().map(|item| item.clip.view()).collect();
    let inputs =
        ndarray::stack(Axis(0), &views).map_err(|e| Error::ShapeMismatch(format!("Failed to stack clips: {e}")))?;
    let labels = items.iter().map(|item| item.label).collect();

    Ok(Batch { inputs, labels })
}
