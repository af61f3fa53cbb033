use thiserror::Error;

use crate::embedding::domain::embedding::{DimensionMismatch, Embedding};
use crate::shared::frame::Frame;
use crate::shared::region::{PixelBounds, Region};

#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("face region {bounds:?} lies outside the {frame_w}x{frame_h} image")]
    RegionOutOfBounds {
        bounds: PixelBounds,
        frame_w: u32,
        frame_h: u32,
    },
    #[error(transparent)]
    Dimension(#[from] DimensionMismatch),
    #[error("face embedder has been released")]
    Released,
    #[error("embedding inference failed: {0}")]
    Inference(String),
}

/// Domain interface for turning a face region into an identity embedding.
pub trait FaceEmbedder: Send {
    /// `region` is rounded to integer pixels before the crop; it must lie
    /// fully inside `frame`.
    fn embed(&mut self, frame: &Frame, region: &Region) -> Result<Embedding, EmbedError>;

    /// Human-readable, multi-line diagnostic counters.
    fn stats(&self) -> String {
        String::new()
    }

    /// Frees the underlying model. Later `embed` calls fail.
    fn release(&mut self) {}
}

/// Rounds `region` and crops it out of `frame`, or reports why it can't.
pub fn crop_face(frame: &Frame, region: &Region) -> Result<Frame, EmbedError> {
    let bounds = region.round();
    frame
        .crop(&bounds)
        .ok_or(EmbedError::RegionOutOfBounds {
            bounds,
            frame_w: frame.width(),
            frame_h: frame.height(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crop_face_inside_frame() {
        let frame = Frame::new(vec![0u8; 20 * 20 * 3], 20, 20, 3, 0);
        let crop = crop_face(&frame, &Region::new(2.2, 3.7, 12.4, 13.6)).unwrap();
        assert_eq!(crop.width(), 10);
        assert_eq!(crop.height(), 10);
    }

    #[test]
    fn test_crop_face_outside_frame_is_error() {
        let frame = Frame::new(vec![0u8; 20 * 20 * 3], 20, 20, 3, 0);
        let err = crop_face(&frame, &Region::new(15.0, 15.0, 25.0, 25.0)).unwrap_err();
        assert!(matches!(err, EmbedError::RegionOutOfBounds { .. }));
    }

    #[test]
    fn test_crop_face_huge_region_is_error() {
        let frame = Frame::new(vec![0u8; 20 * 20 * 3], 20, 20, 3, 0);
        let err = crop_face(&frame, &Region::new(-3e9, 0.0, 3e9, 10.0)).unwrap_err();
        assert!(matches!(err, EmbedError::RegionOutOfBounds { .. }));
    }
}
