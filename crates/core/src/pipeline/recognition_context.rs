use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::classification::domain::training_store::StoreError;
use crate::classification::face_classifier::{Classifier, ClassifierError};
use crate::classification::infrastructure::text_file_store::TextFileStore;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::infrastructure::onnx_yolo_detector::OnnxYoloDetector;
use crate::embedding::domain::face_embedder::FaceEmbedder;
use crate::embedding::infrastructure::onnx_face_embedder::OnnxFaceEmbedder;
use crate::shared::model_resolver::{self, ModelResolveError, ModelSpec, ProgressFn};
use crate::shared::settings::RecognitionSettings;

#[derive(Error, Debug)]
pub enum ContextError {
    #[error("could not determine a data directory")]
    NoDataRoot,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
    #[error(transparent)]
    Model(#[from] ModelResolveError),
    #[error("failed to load model {name}: {message}")]
    ModelLoad { name: String, message: String },
}

/// The detector and embedder, used together and never concurrently.
pub struct FaceModels {
    pub detector: Box<dyn FaceDetector>,
    pub embedder: Box<dyn FaceEmbedder>,
}

/// Last embedder diagnostics, readable while the models are busy.
#[derive(Clone, Default)]
pub struct EmbedderStats(Arc<Mutex<String>>);

impl EmbedderStats {
    /// Re-reads the embedder's counters. Call with the models lock held.
    pub fn refresh(&self, models: &FaceModels) {
        let text = models.embedder.stats();
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = text;
    }

    pub fn get(&self) -> String {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Owns every model-backed collaborator of the pipeline for one session.
///
/// Both pipeline workers share the same models and classifier through the
/// context; `shutdown` releases the models explicitly.
pub struct RecognitionContext {
    models: Arc<Mutex<FaceModels>>,
    embedder_stats: EmbedderStats,
    classifier: Arc<Classifier>,
}

impl RecognitionContext {
    pub fn new(
        detector: Box<dyn FaceDetector>,
        embedder: Box<dyn FaceEmbedder>,
        classifier: Classifier,
    ) -> Self {
        let models = FaceModels { detector, embedder };
        let embedder_stats = EmbedderStats::default();
        embedder_stats.refresh(&models);
        Self {
            models: Arc::new(Mutex::new(models)),
            embedder_stats,
            classifier: Arc::new(classifier),
        }
    }

    /// Resolves and loads both models and opens the classifier over the
    /// configured data root. Unreadable training data is fatal.
    pub fn open(
        settings: &RecognitionSettings,
        progress: Option<ProgressFn>,
    ) -> Result<Self, ContextError> {
        let classifier = Self::open_classifier(settings)?;

        let detector_path =
            resolve_model(settings, model_resolver::DETECTOR_MODEL, progress.as_ref())?;
        let detector = OnnxYoloDetector::new(&detector_path, settings.detector_confidence)
            .map_err(|e| load_err(model_resolver::DETECTOR_MODEL, e))?;

        let embedder_path =
            resolve_model(settings, model_resolver::EMBEDDER_MODEL, progress.as_ref())?;
        let embedder = OnnxFaceEmbedder::new(&embedder_path)
            .map_err(|e| load_err(model_resolver::EMBEDDER_MODEL, e))?;

        Ok(Self::new(Box::new(detector), Box::new(embedder), classifier))
    }

    /// Opens only the classifier, for callers that never run the models.
    pub fn open_classifier(settings: &RecognitionSettings) -> Result<Classifier, ContextError> {
        let root = settings.data_root().ok_or(ContextError::NoDataRoot)?;
        let store = TextFileStore::open(&root, settings.bundled_dir.as_deref())?;
        Ok(Classifier::open(Box::new(store), settings.training)?)
    }

    pub fn classifier(&self) -> &Arc<Classifier> {
        &self.classifier
    }

    pub fn models(&self) -> &Arc<Mutex<FaceModels>> {
        &self.models
    }

    pub fn embedder_stats(&self) -> &EmbedderStats {
        &self.embedder_stats
    }

    /// Embedder and classifier diagnostics. Never waits for an inference
    /// in flight.
    pub fn stats(&self) -> String {
        [self.embedder_stats.get(), self.classifier.stats()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Frees both models. Later detections and embeddings fail.
    pub fn shutdown(&self) {
        if let Ok(mut models) = self.models.lock() {
            models.detector.release();
            models.embedder.release();
            log::info!("Recognition models released");
        }
    }
}

/// Locks the shared models, mapping poisoning to an error message.
pub fn lock_models(
    models: &Mutex<FaceModels>,
) -> Result<MutexGuard<'_, FaceModels>, Box<dyn std::error::Error>> {
    models
        .lock()
        .map_err(|_| "face models lock poisoned".into())
}

fn resolve_model(
    settings: &RecognitionSettings,
    spec: ModelSpec,
    progress: Option<&ProgressFn>,
) -> Result<std::path::PathBuf, ModelResolveError> {
    model_resolver::resolve(
        spec,
        settings.bundled_dir.as_deref(),
        settings.allow_model_download,
        progress,
    )
}

fn load_err(spec: ModelSpec, e: Box<dyn std::error::Error>) -> ContextError {
    ContextError::ModelLoad {
        name: spec.name.to_string(),
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::domain::softmax_model::TrainingParams;
    use crate::detection::domain::face_detector::Detection;
    use crate::embedding::domain::embedding::Embedding;
    use crate::embedding::domain::face_embedder::EmbedError;
    use crate::shared::frame::Frame;
    use crate::shared::region::Region;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;

    struct ReleaseFlag(Arc<AtomicBool>);

    impl FaceDetector for ReleaseFlag {
        fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
            Ok(Vec::new())
        }

        fn release(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    impl FaceEmbedder for ReleaseFlag {
        fn embed(&mut self, _frame: &Frame, _region: &Region) -> Result<Embedding, EmbedError> {
            Err(EmbedError::Released)
        }

        fn stats(&self) -> String {
            "Embeddings: 0".to_string()
        }

        fn release(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    fn classifier(dir: &TempDir) -> Classifier {
        let store = TextFileStore::open(dir.path(), None).unwrap();
        Classifier::open(Box::new(store), TrainingParams::default()).unwrap()
    }

    #[test]
    fn test_shutdown_releases_both_models() {
        let tmp = TempDir::new().unwrap();
        let detector_released = Arc::new(AtomicBool::new(false));
        let embedder_released = Arc::new(AtomicBool::new(false));
        let context = RecognitionContext::new(
            Box::new(ReleaseFlag(detector_released.clone())),
            Box::new(ReleaseFlag(embedder_released.clone())),
            classifier(&tmp),
        );

        context.shutdown();
        assert!(detector_released.load(Ordering::SeqCst));
        assert!(embedder_released.load(Ordering::SeqCst));
    }

    #[test]
    fn test_stats_combines_embedder_and_classifier() {
        let tmp = TempDir::new().unwrap();
        let flag = Arc::new(AtomicBool::new(false));
        let context = RecognitionContext::new(
            Box::new(ReleaseFlag(flag.clone())),
            Box::new(ReleaseFlag(flag)),
            classifier(&tmp),
        );
        let stats = context.stats();
        assert!(stats.contains("Embeddings: 0"));
        assert!(stats.contains("Samples: 0"));
    }

    #[test]
    fn test_stats_readable_while_models_locked() {
        let tmp = TempDir::new().unwrap();
        let flag = Arc::new(AtomicBool::new(false));
        let context = RecognitionContext::new(
            Box::new(ReleaseFlag(flag.clone())),
            Box::new(ReleaseFlag(flag)),
            classifier(&tmp),
        );
        let _in_use = context.models().lock().unwrap();
        assert!(context.stats().contains("Embeddings: 0"));
    }

    #[test]
    fn test_open_classifier_uses_configured_root() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("label.txt"), "Alice\n").unwrap();
        let settings = RecognitionSettings {
            data_root: Some(tmp.path().to_path_buf()),
            ..RecognitionSettings::default()
        };
        let classifier = RecognitionContext::open_classifier(&settings).unwrap();
        assert_eq!(classifier.identity_count(), 1);
    }

    #[test]
    fn test_open_classifier_fails_on_malformed_corpus() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("data.txt"), "garbage\n").unwrap();
        let settings = RecognitionSettings {
            data_root: Some(tmp.path().to_path_buf()),
            ..RecognitionSettings::default()
        };
        assert!(matches!(
            RecognitionContext::open_classifier(&settings),
            Err(ContextError::Classifier(ClassifierError::Store(_)))
        ));
    }
}
