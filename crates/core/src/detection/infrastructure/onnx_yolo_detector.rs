use std::path::Path;

use ndarray::Array4;

use crate::detection::domain::face_detector::{sort_by_confidence, Detection, FaceDetector};
use crate::shared::frame::Frame;
use crate::shared::region::Region;
use crate::shared::transform::AffineTransform;

/// Used when the model's input shape is dynamic.
const DEFAULT_INPUT_SIZE: u32 = 640;

pub const DEFAULT_CONFIDENCE: f64 = 0.5;

const NMS_IOU_THRESH: f64 = 0.45;

/// Letterbox fill, 114/255 gray.
const PAD_VALUE: f32 = 114.0 / 255.0;

/// Single-class YOLO face detector on an ONNX Runtime session.
///
/// Each row of the model output starts with `[cx, cy, w, h, score]` in
/// input-tensor pixels; pose variants append landmarks, which are ignored.
/// Regions come back in the coordinates of the frame passed to `detect`.
pub struct OnnxYoloDetector {
    session: Option<ort::session::Session>,
    confidence: f64,
    input_size: u32,
}

impl OnnxYoloDetector {
    /// Loads the model. The square input size is read from its NCHW input
    /// shape when static.
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?.commit_from_file(model_path)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| match input.dtype() {
                ort::value::ValueType::Tensor { shape, .. } if shape.len() == 4 && shape[2] > 0 => {
                    Some(shape[2] as u32)
                }
                _ => None,
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        log::info!(
            "Loaded face detector {} ({input_size}px input, min confidence {confidence})",
            model_path.display()
        );

        Ok(Self {
            session: Some(session),
            confidence,
            input_size,
        })
    }
}

impl FaceDetector for OnnxYoloDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
        let session = self
            .session
            .as_mut()
            .ok_or("face detector has been released")?;

        let to_input = letterbox_transform(frame.width(), frame.height(), self.input_size);
        let to_frame = to_input
            .inverse()
            .ok_or("letterbox transform is not invertible")?;
        let input = input_tensor(frame, &to_frame, self.input_size);

        let outputs = session.run(ort::inputs![ort::value::Tensor::from_array(input)?])?;
        if outputs.len() == 0 {
            return Err("face detector produced no outputs".into());
        }
        let output = outputs[0].try_extract_array::<f32>()?;
        let data = output.as_slice().ok_or("face detector output is not contiguous")?;
        let candidates = decode_output(data, output.shape(), self.confidence)?;

        let mut detections: Vec<Detection> = candidates
            .into_iter()
            .filter_map(|d| {
                let region = to_frame
                    .map_region(&d.region)
                    .clamp(frame.width(), frame.height());
                (!region.is_empty()).then_some(Detection { region, ..d })
            })
            .collect();

        suppress_overlaps(&mut detections, NMS_IOU_THRESH);
        Ok(detections)
    }

    fn release(&mut self) {
        if self.session.take().is_some() {
            log::debug!("Face detector released");
        }
    }
}

/// Frame → input transform: uniform scale to fit `size`, centered.
fn letterbox_transform(width: u32, height: u32, size: u32) -> AffineTransform {
    let (w, h, s) = (width as f64, height as f64, size as f64);
    let scale = (s / w).min(s / h);
    let pad_x = ((s - w * scale) / 2.0).floor();
    let pad_y = ((s - h * scale) / 2.0).floor();
    AffineTransform::scale(scale, scale).then(&AffineTransform::translation(pad_x, pad_y))
}

/// NCHW RGB tensor in `[0, 1]`, sampled through `to_frame`. Pixels that
/// fall outside the frame get the pad value.
fn input_tensor(frame: &Frame, to_frame: &AffineTransform, size: u32) -> Array4<f32> {
    let size = size as usize;
    let mut tensor = Array4::<f32>::from_elem((1, 3, size, size), PAD_VALUE);
    let src = frame.as_ndarray();
    let (fw, fh) = (frame.width() as f64, frame.height() as f64);

    for y in 0..size {
        for x in 0..size {
            let (sx, sy) = to_frame.map_point(x as f64 + 0.5, y as f64 + 0.5);
            if sx < 0.0 || sy < 0.0 || sx >= fw || sy >= fh {
                continue;
            }
            let (sx, sy) = (sx as usize, sy as usize);
            for c in 0..3 {
                tensor[[0, c, y, x]] = src[[sy, sx, c]] as f32 / 255.0;
            }
        }
    }
    tensor
}

/// Parses a `[1, rows, features]` or `[1, features, rows]` output into
/// candidates at or above `min_confidence`, in input-tensor coordinates.
fn decode_output(
    data: &[f32],
    shape: &[usize],
    min_confidence: f64,
) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
    let &[_, a, b] = shape else {
        return Err(format!("unexpected face detector output shape {shape:?}").into());
    };
    // Rows always outnumber features.
    let features_first = a < b;
    let (rows, features) = if features_first { (b, a) } else { (a, b) };
    if features < 5 {
        return Err(format!("face detector output has {features} features, need 5").into());
    }
    if data.len() < rows * features {
        return Err("face detector output is truncated".into());
    }

    let at = |row: usize, feature: usize| -> f64 {
        let i = if features_first {
            feature * rows + row
        } else {
            row * features + feature
        };
        data[i] as f64
    };

    Ok((0..rows)
        .filter(|&row| at(row, 4) >= min_confidence)
        .map(|row| {
            let (cx, cy, w, h) = (at(row, 0), at(row, 1), at(row, 2), at(row, 3));
            Detection {
                region: Region::from_xywh(cx - w / 2.0, cy - h / 2.0, w, h),
                confidence: at(row, 4),
            }
        })
        .collect())
}

/// Greedy non-maximum suppression. Leaves `detections` sorted by
/// descending confidence.
fn suppress_overlaps(detections: &mut Vec<Detection>, iou_thresh: f64) {
    sort_by_confidence(detections);
    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
    for d in detections.drain(..) {
        if kept.iter().all(|k| k.region.iou(&d.region) <= iou_thresh) {
            kept.push(d);
        }
    }
    *detections = kept;
}
