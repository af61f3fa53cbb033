use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// A candidate face with the detector's confidence in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    pub region: Region,
    pub confidence: f64,
}

/// Domain interface for face detection.
///
/// Implementations own their model state, hence `&mut self`. Results are
/// ordered by descending confidence; the order is stable for a fixed input.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>>;

    /// Frees the underlying model. Later `detect` calls fail.
    fn release(&mut self) {}
}

/// Picks the highest-confidence detection, if any.
pub fn best_detection(detections: &[Detection]) -> Option<&Detection> {
    detections.iter().max_by(|a, b| {
        a.confidence
            .partial_cmp(&b.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    })
}

/// Stable descending sort by confidence.
pub fn sort_by_confidence(detections: &mut [Detection]) {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
