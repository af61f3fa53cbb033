use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::capture::domain::captured_frame::CapturedFrame;
use crate::classification::face_classifier::{Classifier, ClassifierError};
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::recognition_context::{
    lock_models, EmbedderStats, FaceModels, RecognitionContext,
};
use crate::shared::constants::{CROP_SIZE, UNKNOWN_TITLE};
use crate::shared::recognition::Recognition;
use crate::shared::transform::AffineTransform;

/// Label reported for faces seen before any identity has been trained.
pub const UNTRAINED_LABEL: i32 = -1;

/// Detect → embed → classify for one captured frame.
///
/// The frame is rendered upright into a square crop before detection, and
/// every face location is mapped back into frame coordinates.
pub struct RecognizeFacesUseCase {
    models: Arc<Mutex<FaceModels>>,
    embedder_stats: EmbedderStats,
    classifier: Arc<Classifier>,
}

impl RecognizeFacesUseCase {
    pub fn new(context: &RecognitionContext) -> Self {
        Self {
            models: context.models().clone(),
            embedder_stats: context.embedder_stats().clone(),
            classifier: context.classifier().clone(),
        }
    }

    /// Recognizes every face in `captured`. A face whose embedding fails is
    /// skipped; a detector failure fails the whole frame.
    pub fn execute(
        &self,
        captured: &CapturedFrame,
        logger: &mut dyn PipelineLogger,
    ) -> Result<Vec<Recognition>, Box<dyn std::error::Error>> {
        let frame = &captured.frame;
        let to_crop = AffineTransform::frame_to_crop(
            frame.width(),
            frame.height(),
            CROP_SIZE,
            CROP_SIZE,
            captured.rotation,
            true,
        );
        let to_frame = to_crop
            .inverse()
            .ok_or("frame to crop transform is not invertible")?;

        let t0 = Instant::now();
        let crop = frame.warp(&to_crop, CROP_SIZE, CROP_SIZE);
        logger.timing("crop", elapsed_ms(t0));

        let mut models = lock_models(&self.models)?;

        let t0 = Instant::now();
        let detections = models.detector.detect(&crop)?;
        logger.timing("detect", elapsed_ms(t0));
        logger.metric("faces", detections.len() as f64);

        let mut results = Vec::with_capacity(detections.len());
        for detection in &detections {
            let t0 = Instant::now();
            let embedding = match models.embedder.embed(&crop, &detection.region) {
                Ok(e) => e,
                Err(e) => {
                    log::warn!("Skipping face {}: {e}", detection.region);
                    continue;
                }
            };
            logger.timing("embed", elapsed_ms(t0));

            let location = to_frame
                .map_region(&detection.region)
                .clamp(frame.width(), frame.height());

            let t0 = Instant::now();
            let recognition = match self.classifier.predict(&embedding) {
                Ok(p) => Recognition::new(
                    p.label,
                    self.classifier.title_for(p.label),
                    p.confidence,
                    location,
                ),
                Err(ClassifierError::NotTrained) => Recognition::new(
                    UNTRAINED_LABEL,
                    UNKNOWN_TITLE,
                    detection.confidence,
                    location,
                ),
                Err(e) => return Err(e.into()),
            };
            logger.timing("classify", elapsed_ms(t0));
            results.push(recognition);
        }
        if !detections.is_empty() {
            self.embedder_stats.refresh(&models);
        }

        log::debug!(
            "Frame {} at {}: {} faces, {} recognized",
            frame.index(),
            captured.timestamp,
            detections.len(),
            results.len()
        );
        Ok(results)
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
