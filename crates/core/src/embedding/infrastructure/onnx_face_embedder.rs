/// ArcFace-style face embedder using ONNX Runtime.
///
/// Crops the rounded face region, resizes it to the model's square input,
/// and L2-normalizes the output so dot products are cosine similarities.
use std::path::Path;
use std::time::Instant;

use crate::embedding::domain::embedding::Embedding;
use crate::embedding::domain::face_embedder::{crop_face, EmbedError, FaceEmbedder};
use crate::shared::constants::FACE_SIZE;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

const NORM_MEAN: f32 = 127.5;
const NORM_STD: f32 = 127.5;

pub struct OnnxFaceEmbedder {
    session: Option<ort::session::Session>,
    input_size: usize,
    inferences: u64,
    total_ms: f64,
    last_ms: f64,
}

impl OnnxFaceEmbedder {
    pub fn new(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let intra_threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let session = ort::session::Session::builder()?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
            .with_inter_threads(1)?
            .with_intra_threads(intra_threads)?
            .commit_from_file(model_path)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| match input.dtype() {
                ort::value::ValueType::Tensor { shape, .. } if shape.len() >= 4 && shape[2] > 0 => {
                    Some(shape[2] as usize)
                }
                _ => None,
            })
            .unwrap_or(FACE_SIZE as usize);

        log::info!(
            "Loaded face embedder {} (input {input_size}px)",
            model_path.display()
        );

        Ok(Self {
            session: Some(session),
            input_size,
            inferences: 0,
            total_ms: 0.0,
            last_ms: 0.0,
        })
    }

    fn run(&mut self, face: &Frame) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
        let tensor = preprocess(face, self.input_size);
        let session = self.session.as_mut().ok_or("released")?;
        let input_value = ort::value::Tensor::from_array(tensor)?;
        let outputs = session.run(ort::inputs![input_value])?;
        let embedding_array = outputs[0].try_extract_array::<f32>()?;
        let embedding_slice = embedding_array
            .as_slice()
            .ok_or("Cannot get embedding slice")?;
        Ok(embedding_slice.to_vec())
    }
}

impl FaceEmbedder for OnnxFaceEmbedder {
    fn embed(&mut self, frame: &Frame, region: &Region) -> Result<Embedding, EmbedError> {
        if self.session.is_none() {
            return Err(EmbedError::Released);
        }
        let face = crop_face(frame, region)?;

        let start = Instant::now();
        let raw = self
            .run(&face)
            .map_err(|e| EmbedError::Inference(e.to_string()))?;
        self.last_ms = start.elapsed().as_secs_f64() * 1000.0;
        self.total_ms += self.last_ms;
        self.inferences += 1;

        Ok(Embedding::normalized(raw)?)
    }

    fn stats(&self) -> String {
        let avg = if self.inferences == 0 {
            0.0
        } else {
            self.total_ms / self.inferences as f64
        };
        format!(
            "Embedder input: {0}x{0}\nEmbeddings: {1}\nLast embed: {2:.1}ms\nAvg embed: {3:.1}ms",
            self.input_size, self.inferences, self.last_ms, avg
        )
    }

    fn release(&mut self) {
        if self.session.take().is_some() {
            log::debug!("Face embedder released");
        }
    }
}

/// Resize crop to `size`×`size`, normalize, NCHW layout.
fn preprocess(face: &Frame, size: usize) -> ndarray::Array4<f32> {
    let src_w = face.width() as usize;
    let src_h = face.height() as usize;
    let src = face.as_ndarray();

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, size, size));

    for y in 0..size {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / size as f64) as usize).min(src_h - 1);
        for x in 0..size {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / size as f64) as usize).min(src_w - 1);
            for c in 0..3 {
                tensor[[0, c, y, x]] = (src[[src_y, src_x, c]] as f32 - NORM_MEAN) / NORM_STD;
            }
        }
    }

    tensor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(w: u32, h: u32, value: u8) -> Frame {
        Frame::new(vec![value; (w * h * 3) as usize], w, h, 3, 0)
    }

    #[test]
    fn test_preprocess_shape() {
        let tensor = preprocess(&face(50, 50, 128), 112);
        assert_eq!(tensor.shape(), &[1, 3, 112, 112]);
    }

    #[test]
    fn test_preprocess_normalization_range() {
        let white = preprocess(&face(10, 10, 255), 16);
        let black = preprocess(&face(10, 10, 0), 16);
        assert!((white[[0, 0, 0, 0]] - 1.0).abs() < 0.01);
        assert!((black[[0, 2, 15, 15]] + 1.0).abs() < 0.01);
    }

    #[test]
    fn test_preprocess_non_square_crop() {
        let tensor = preprocess(&face(30, 10, 127), 8);
        assert_eq!(tensor.shape(), &[1, 3, 8, 8]);
        assert!((tensor[[0, 1, 7, 7]] - (127.0 - 127.5) / 127.5).abs() < 0.01);
    }
}
