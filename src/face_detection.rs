use crate::constants::{IMAGE_NORMALIZATION_OFFSET, IMAGE_NORMALIZATION_SCALE};
use crate::utils::safe_cast::{i64_to_u32_clamp, scale_trunc};
use crate::{Error, Result};
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::{Array2, Array4, CowArray};
use ort::{Environment, Session, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Face bounding box in relative image units (0.0..=1.0 of width/height)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelativeBox {
    pub xmin: f32,
    pub ymin: f32,
    pub width: f32,
    pub height: f32,
}

/// Face detection result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    /// Bounding box relative to the detector's input image
    pub bbox: RelativeBox,
    /// Confidence score of the detection
    pub score: f32,
}

/// Face crop region in absolute pixels, always inside the image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// A face detection capability.
///
/// Implementations may keep internal caches, so detection takes `&mut self`;
/// every worker owns its own instance.
pub trait FaceDetector: Send {
    /// Detect zero or more faces in an RGB image
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails.
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>>;
}

/// Detector that never finds a face; every frame takes the full-frame path
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDetector;

impl FaceDetector for NullDetector {
    fn detect(&mut self, _image: &RgbImage) -> Result<Vec<Detection>> {
        Ok(Vec::new())
    }
}

/// Turn detections into an expanded face crop region
///
/// The last detection in the list is used. Its box is converted to pixels
/// (truncating toward zero), grown by `expansion` of its own width/height on
/// every margin and clamped to the image. Returns `None` when nothing was
/// detected or the clamped box is empty.
#[must_use]
pub fn locate_face(detections: &[Detection], width: u32, height: u32, expansion: f32) -> Option<FaceBox> {
    let bbox = detections.last()?.bbox;

    let x_min = scale_trunc(bbox.xmin, width);
    let y_min = scale_trunc(bbox.ymin, height);
    let x_max = scale_trunc(bbox.xmin + bbox.width, width);
    let y_max = scale_trunc(bbox.ymin + bbox.height, height);

    #[allow(clippy::cast_precision_loss)] // Pixel extents are far below 2^24
    let margin = |extent: i64| (expansion * extent as f32).trunc() as i64;
    let dx = margin(x_max - x_min);
    let dy = margin(y_max - y_min);

    let x0 = i64_to_u32_clamp(x_min - dx, width);
    let y0 = i64_to_u32_clamp(y_min - dy, height);
    let x1 = i64_to_u32_clamp(x_max + dx, width);
    let y1 = i64_to_u32_clamp(y_max + dy, height);

    if x1 <= x0 || y1 <= y0 {
        log::debug!("Discarding degenerate face box {bbox:?} on {width}x{height} image");
        return None;
    }

    Some(FaceBox {
        x: x0,
        y: y0,
        width: x1 - x0,
        height: y1 - y0,
    })
}

/// SCRFD Face Detector using ONNX Runtime
pub struct ScrfdDetector {
    session: Session,
    input_size: (u32, u32),
    conf_threshold: f32,
    nms_threshold: f32,
    num_anchors: usize,
    strides: Vec<u32>,
    offset: usize,
    center_cache: HashMap<(u32, u32, u32), Array2<f32>>,
}

impl ScrfdDetector {
    /// Create a new face detector from an ONNX model file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The ONNX model file cannot be loaded
    /// - The model has no inputs
    pub fn new<P: AsRef<Path>>(model_path: P, conf_threshold: f32, nms_threshold: f32) -> Result<Self> {
        log::info!("Initializing ScrfdDetector with model: {}", model_path.as_ref().display());
        let environment = Arc::new(
            Environment::builder()
                .with_name("face_detector")
                .with_log_level(ort::LoggingLevel::Warning)
                .build()?,
        );

        let session = ort::SessionBuilder::new(&environment)?
            .with_optimization_level(ort::GraphOptimizationLevel::Level3)?
            .with_model_from_file(model_path)?;

        let input_meta = session
            .inputs
            .first()
            .ok_or_else(|| Error::ModelInputError("Model has no inputs".to_string()))?;

        // Input shape is [batch, channels, height, width]; dynamic axes fall back to 640
        let dims = &input_meta.dimensions;
        let input_size = if dims.len() >= 4 {
            (dims[3].unwrap_or(640), dims[2].unwrap_or(640))
        } else {
            (640, 640)
        };

        // Output layout depends on the SCRFD variant
        let (offset, strides, num_anchors) = match session.outputs.len() {
            6 | 9 => (3, vec![8, 16, 32], 2),
            10 | 15 => (5, vec![8, 16, 32, 64, 128], 1),
            n => {
                log::warn!("Unknown model configuration with {} outputs, using defaults", n);
                (3, vec![8, 16, 32], 2)
            }
        };

        Ok(Self {
            session,
            input_size,
            conf_threshold,
            nms_threshold,
            num_anchors,
            strides,
            offset,
            center_cache: HashMap::new(),
        })
    }

    /// Letterbox the image into the model input and return the tensor and scale
    #[allow(clippy::cast_possible_truncation)] // Scaled sizes are bounded by the input size
    #[allow(clippy::cast_sign_loss)]
    #[allow(clippy::cast_precision_loss)]
    fn preprocess(&self, image: &RgbImage) -> (Array4<f32>, f32) {
        let (img_width, img_height) = image.dimensions();
        let (input_width, input_height) = self.input_size;

        let ratio_img = img_height as f32 / img_width as f32;
        let ratio_model = input_height as f32 / input_width as f32;
        let (new_width, new_height) = if ratio_img > ratio_model {
            ((input_height as f32 / ratio_img) as u32, input_height)
        } else {
            (input_width, (input_width as f32 * ratio_img) as u32)
        };
        let (new_width, new_height) = (new_width.max(1), new_height.max(1));
        let det_scale = new_height as f32 / img_height as f32;

        let resized = imageops::resize(image, new_width, new_height, FilterType::Triangle);

        // Zero padding right/bottom, normalized NCHW
        let mut array = Array4::<f32>::from_elem(
            (1, 3, input_height as usize, input_width as usize),
            -IMAGE_NORMALIZATION_OFFSET / IMAGE_NORMALIZATION_SCALE,
        );
        for (x, y, pixel) in resized.enumerate_pixels() {
            for ch in 0..3 {
                array[[0, ch, y as usize, x as usize]] =
                    (f32::from(pixel[ch]) - IMAGE_NORMALIZATION_OFFSET) / IMAGE_NORMALIZATION_SCALE;
            }
        }
        (array, det_scale)
    }

    /// Run the model and return candidate boxes `[x1, y1, x2, y2]` with scores,
    /// in letterboxed input pixels
    fn forward(&mut self, inputs: Array4<f32>) -> Result<Vec<([f32; 4], f32)>> {
        let input_height = inputs.shape()[2] as u32;
        let input_width = inputs.shape()[3] as u32;

        let cow_array = CowArray::from(inputs.into_dyn());
        let input_tensor = Value::from_array(self.session.allocator(), &cow_array)?;
        let outputs = self.session.run(vec![input_tensor])?;

        if outputs.len() < self.offset * 2 {
            return Err(Error::ModelOutputError(format!(
                "Expected at least {} outputs, got {}",
                self.offset * 2,
                outputs.len()
            )));
        }

        let mut candidates = Vec::new();
        for (idx, &stride) in self.strides.clone().iter().enumerate() {
            let scores_tensor = outputs[idx].try_extract::<f32>()?;
            let scores_view = scores_tensor.view();
            let scores: Vec<f32> = scores_view.iter().copied().collect();

            let bbox_tensor = outputs[idx + self.offset].try_extract::<f32>()?;
            let bbox_view = bbox_tensor.view();
            let distances: Vec<f32> = bbox_view.iter().map(|&d| d * stride as f32).collect();

            let key = (input_height / stride, input_width / stride, stride);
            let centers = self
                .center_cache
                .entry(key)
                .or_insert_with(|| generate_anchor_centers(key.0, key.1, stride, self.num_anchors));

            if distances.len() < centers.nrows() * 4 || scores.len() < centers.nrows() {
                return Err(Error::ModelDataFormatError(format!(
                    "Stride {stride}: {} anchors but {} scores and {} box values",
                    centers.nrows(),
                    scores.len(),
                    distances.len()
                )));
            }

            for (i, &score) in scores.iter().enumerate().take(centers.nrows()) {
                if score < self.conf_threshold {
                    continue;
                }
                let (cx, cy) = (centers[[i, 0]], centers[[i, 1]]);
                let d = &distances[i * 4..i * 4 + 4];
                candidates.push(([cx - d[0], cy - d[1], cx + d[2], cy + d[3]], score));
            }
        }

        Ok(candidates)
    }
}

impl FaceDetector for ScrfdDetector {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>> {
        let (img_width, img_height) = image.dimensions();
        if img_width == 0 || img_height == 0 {
            return Err(Error::InvalidInput("Cannot detect faces in an empty image".to_string()));
        }

        let (inputs, det_scale) = self.preprocess(image);
        let mut candidates = self.forward(inputs)?;

        // Back to original pixels, then highest score first
        for (bbox, _) in &mut candidates {
            for v in bbox.iter_mut() {
                *v /= det_scale;
            }
        }
        candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        let kept = nms(&candidates, self.nms_threshold);

        #[allow(clippy::cast_precision_loss)]
        let (w, h) = (img_width as f32, img_height as f32);
        Ok(kept
            .into_iter()
            .map(|i| {
                let ([x1, y1, x2, y2], score) = candidates[i];
                Detection {
                    bbox: RelativeBox {
                        xmin: x1 / w,
                        ymin: y1 / h,
                        width: (x2 - x1) / w,
                        height: (y2 - y1) / h,
                    },
                    score,
                }
            })
            .collect())
    }
}

/// Generate anchor centers for a given stride
#[allow(clippy::cast_precision_loss)]
fn generate_anchor_centers(height: u32, width: u32, stride: u32, num_anchors: usize) -> Array2<f32> {
    let n_points = (height * width) as usize * num_anchors;
    let mut centers = Array2::zeros((n_points, 2));
    let mut row = 0;
    for y in 0..height {
        for x in 0..width {
            for _ in 0..num_anchors {
                centers[[row, 0]] = (x * stride) as f32;
                centers[[row, 1]] = (y * stride) as f32;
                row += 1;
            }
        }
    }
    centers
}

/// Non-Maximum Suppression over score-sorted candidates; returns kept indices
/// in descending score order
fn nms(candidates: &[([f32; 4], f32)], threshold: f32) -> Vec<usize> {
    let area = |b: &[f32; 4]| (b[2] - b[0] + 1.0) * (b[3] - b[1] + 1.0);

    let mut keep = Vec::new();
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    while let Some((&i, rest)) = order.split_first() {
        keep.push(i);
        let a = &candidates[i].0;
        let area_a = area(a);
        order = rest
            .iter()
            .copied()
            .filter(|&j| {
                let b = &candidates[j].0;
                let w = (a[2].min(b[2]) - a[0].max(b[0]) + 1.0).max(0.0);
                let h = (a[3].min(b[3]) - a[1].max(b[1]) + 1.0).max(0.0);
                let inter = w * h;
                inter / (area_a + area(b) - inter) <= threshold
            })
            .collect();
    }
    keep
}
