use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::capture::domain::image_reader::ImageReader;
use crate::classification::face_classifier::{Classifier, ClassifierError};
use crate::detection::domain::face_detector::best_detection;
use crate::embedding::domain::embedding::Embedding;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::recognition_context::{
    lock_models, EmbedderStats, FaceModels, RecognitionContext,
};

/// What happened to one enrollment batch.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrollmentReport {
    pub label: i32,
    /// Images that contributed a training sample.
    pub accepted: usize,
    /// Images that did not, with the reason.
    pub skipped: Vec<(PathBuf, String)>,
}

/// Turns labeled images into training samples: the most confident face of
/// each image is embedded, then the whole batch is trained at once.
pub struct EnrollIdentityUseCase {
    models: Arc<Mutex<FaceModels>>,
    embedder_stats: EmbedderStats,
    classifier: Arc<Classifier>,
    reader: Arc<dyn ImageReader>,
}

impl EnrollIdentityUseCase {
    pub fn new(context: &RecognitionContext, reader: Arc<dyn ImageReader>) -> Self {
        Self {
            models: context.models().clone(),
            embedder_stats: context.embedder_stats().clone(),
            classifier: context.classifier().clone(),
            reader,
        }
    }

    /// Unreadable images and images without a usable face are skipped and
    /// reported. Only classifier failures abort the batch.
    pub fn execute(
        &self,
        label: i32,
        images: &[PathBuf],
        logger: &mut dyn PipelineLogger,
    ) -> Result<EnrollmentReport, ClassifierError> {
        let mut embeddings = Vec::with_capacity(images.len());
        let mut skipped = Vec::new();

        for (index, path) in images.iter().enumerate() {
            match self.embed_image(path, index) {
                Ok(embedding) => embeddings.push(embedding),
                Err(reason) => {
                    log::warn!("Skipping {}: {reason}", path.display());
                    skipped.push((path.clone(), reason));
                }
            }
        }

        let accepted = embeddings.len();
        let t0 = Instant::now();
        self.classifier.train(label, embeddings)?;
        logger.timing("train", t0.elapsed().as_secs_f64() * 1000.0);
        logger.info(&format!(
            "Enrolled {accepted} of {} images for {}",
            images.len(),
            self.classifier.title_for(label)
        ));

        Ok(EnrollmentReport {
            label,
            accepted,
            skipped,
        })
    }

    fn embed_image(&self, path: &Path, index: usize) -> Result<Embedding, String> {
        let frame = self.reader.read(path, index).map_err(|e| e.to_string())?;

        let mut models = lock_models(&self.models).map_err(|e| e.to_string())?;
        let detections = models.detector.detect(&frame).map_err(|e| e.to_string())?;
        let best = best_detection(&detections).ok_or("no face found")?;
        let embedding = models.embedder.embed(&frame, &best.region);
        self.embedder_stats.refresh(&models);
        embedding.map_err(|e| e.to_string())
    }
}
