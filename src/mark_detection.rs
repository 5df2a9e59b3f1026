use crate::{constants::NUM_FACIAL_LANDMARKS, Error, Result};
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::{Array1, Array4, CowArray};
use ort::{Environment, Session, Value};
use std::path::Path;
use std::sync::Arc;

/// Default landmark detector input size
const DEFAULT_LANDMARK_INPUT_SIZE: u32 = 128;

/// A facial landmark in pixel coordinates of the image it was detected on
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
}

/// A facial landmark detection capability
pub trait LandmarkDetector: Send {
    /// Detect landmarks on a (face-framed) RGB image
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails.
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<Landmark>>;
}

/// 68-point facial landmark detector using `ONNX` Runtime
pub struct OnnxLandmarkDetector {
    session: Session,
    input_size: u32,
}

impl OnnxLandmarkDetector {
    /// Create a new landmark detector from an `ONNX` model file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The ONNX model file cannot be loaded
    /// - The model has no inputs or outputs
    /// - The ONNX runtime environment cannot be created
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        log::info!(
            "Initializing OnnxLandmarkDetector with model: {}",
            model_path.as_ref().display()
        );
        let environment = Arc::new(
            Environment::builder()
                .with_name("mark_detector")
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

        Ok(Self {
            session,
            input_size: DEFAULT_LANDMARK_INPUT_SIZE,
        })
    }

    /// Resize to the model input and lay out as NHWC in [0, 1]
    fn preprocess(&self, image: &RgbImage) -> Array4<f32> {
        let size = self.input_size;
        let resized = imageops::resize(image, size, size, FilterType::Triangle);
        Array4::from_shape_fn((1, size as usize, size as usize, 3), |(_, row, col, ch)| {
            f32::from(resized.get_pixel(col as u32, row as u32)[ch]) / 255.0
        })
    }

    /// Run forward pass through the model
    fn forward(&self, inputs: Array4<f32>) -> Result<Array1<f32>> {
        let cow_array = CowArray::from(inputs.into_dyn());
        let input_tensor = Value::from_array(self.session.allocator(), &cow_array)?;

        let outputs = self.session.run(vec![input_tensor])?;

        let marks_output = outputs
            .into_iter()
            .next()
            .ok_or_else(|| Error::ModelOutputError("No output from model".to_string()))?;

        let marks_tensor = marks_output.try_extract::<f32>()?;
        let marks_view = marks_tensor.view();
        Ok(marks_view.iter().copied().collect())
    }
}

impl LandmarkDetector for OnnxLandmarkDetector {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<Landmark>> {
        let marks = self.forward(self.preprocess(image))?;
        Ok(scale_marks(&marks, image.width(), image.height(), self.input_size))
    }
}

/// Convert flat `[x0, y0, x1, y1, ...]` model output (in input-size units) into
/// landmarks in pixel units of a `width`×`height` image
#[allow(clippy::cast_precision_loss)] // Precision loss acceptable for pixel coordinates
fn scale_marks(marks: &Array1<f32>, width: u32, height: u32, input_size: u32) -> Vec<Landmark> {
    let sx = width as f32 / input_size as f32;
    let sy = height as f32 / input_size as f32;
    marks
        .as_slice()
        .unwrap_or(&[])
        .chunks_exact(2)
        .take(NUM_FACIAL_LANDMARKS)
        .map(|xy| Landmark {
            x: xy[0] * sx,
            y: xy[1] * sy,
        })
        .collect()
}
