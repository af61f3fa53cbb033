use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use thiserror::Error;

use crate::classification::domain::identity::Identity;
use crate::classification::domain::labeled_sample::LabeledSample;
use crate::classification::domain::softmax_model::{Prediction, SoftmaxModel, TrainingParams};
use crate::classification::domain::training_store::{StoreError, TrainingStore};
use crate::embedding::domain::embedding::Embedding;
use crate::shared::constants::UNKNOWN_TITLE;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("classifier has not been trained yet")]
    NotTrained,
    #[error("invalid identity name {0:?}")]
    InvalidName(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("classifier lock poisoned")]
    Poisoned,
}

struct ClassifierState {
    store: Box<dyn TrainingStore>,
    samples: Vec<LabeledSample>,
    names: Vec<String>,
    model: Option<SoftmaxModel>,
    last_train_ms: f64,
    /// Set when `samples` may differ from the store after a failed append.
    needs_reload: bool,
}

/// Incrementally trainable identity classifier.
///
/// Every `train` appends to the durable corpus and refits the model on the
/// whole corpus. `train`, `enroll` and `predict` share one lock, so a
/// prediction sees either the old model or the new one, never a mix.
pub struct Classifier {
    state: Mutex<ClassifierState>,
    params: TrainingParams,
}

impl Classifier {
    /// Loads corpus and names from `store`, fitting a model when the corpus
    /// is non-empty. Load failures are fatal.
    pub fn open(
        store: Box<dyn TrainingStore>,
        params: TrainingParams,
    ) -> Result<Self, ClassifierError> {
        let samples = store.load_samples()?;
        let names = store.load_names()?;

        let mut state = ClassifierState {
            store,
            samples,
            names,
            model: None,
            last_train_ms: 0.0,
            needs_reload: false,
        };
        refit(&mut state, &params);

        log::info!(
            "Classifier loaded: {} samples, {} identities",
            state.samples.len(),
            state.names.len()
        );

        Ok(Self {
            state: Mutex::new(state),
            params,
        })
    }

    /// Registers a display name and returns the new identity count. The
    /// new identity's label is `count - 1`. Does not retrain.
    pub fn enroll(&self, name: &str) -> Result<usize, ClassifierError> {
        let name = name.trim();
        if name.is_empty() || name.contains(['\n', '\r']) {
            return Err(ClassifierError::InvalidName(name.to_string()));
        }

        let mut state = self.lock()?;
        state.store.append_name(name)?;
        state.names.push(name.to_string());
        log::info!("Enrolled identity {:?} as label {}", name, state.names.len() - 1);
        Ok(state.names.len())
    }

    /// Appends `embeddings` under `label` and refits on the whole corpus.
    /// An empty batch is a no-op.
    ///
    /// After a failed append the in-memory corpus is re-read from the
    /// store. If that also fails, the next `train` retries the reload and
    /// fails without appending until it succeeds.
    pub fn train(&self, label: i32, embeddings: Vec<Embedding>) -> Result<(), ClassifierError> {
        if embeddings.is_empty() {
            return Ok(());
        }
        let batch: Vec<LabeledSample> = embeddings
            .into_iter()
            .map(|e| LabeledSample::new(label, e))
            .collect();

        let mut state = self.lock()?;
        if state.needs_reload {
            reload(&mut state, &self.params)?;
        }
        if let Err(e) = state.store.append_samples(&batch) {
            // Part of the batch may have reached disk; mirror whatever did.
            if let Err(reload_err) = reload(&mut state, &self.params) {
                log::warn!("Corpus reload after failed append failed: {reload_err}");
                state.needs_reload = true;
            }
            return Err(e.into());
        }
        state.samples.extend(batch);
        refit(&mut state, &self.params);
        Ok(())
    }

    pub fn predict(&self, embedding: &Embedding) -> Result<Prediction, ClassifierError> {
        let state = self.lock()?;
        let model = state.model.as_ref().ok_or(ClassifierError::NotTrained)?;
        Ok(model.predict(embedding.values()))
    }

    pub fn is_trained(&self) -> bool {
        self.lock().map(|s| s.model.is_some()).unwrap_or(false)
    }

    pub fn sample_count(&self) -> usize {
        self.lock().map(|s| s.samples.len()).unwrap_or(0)
    }

    pub fn identity_count(&self) -> usize {
        self.lock().map(|s| s.names.len()).unwrap_or(0)
    }

    pub fn identities(&self) -> Vec<Identity> {
        self.lock()
            .map(|s| Identity::from_names(&s.names))
            .unwrap_or_default()
    }

    /// Display name for `label`, or `"Unknown"` when none is registered.
    pub fn title_for(&self, label: i32) -> String {
        self.lock()
            .ok()
            .and_then(|s| usize::try_from(label).ok().and_then(|i| s.names.get(i).cloned()))
            .unwrap_or_else(|| UNKNOWN_TITLE.to_string())
    }

    pub fn stats(&self) -> String {
        match self.lock() {
            Ok(s) => format!(
                "Samples: {}\nClasses: {}\nIdentities: {}\nLast train: {:.1}ms",
                s.samples.len(),
                s.model.as_ref().map_or(0, |m| m.labels().len()),
                s.names.len(),
                s.last_train_ms
            ),
            Err(_) => "Classifier unavailable".to_string(),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, ClassifierState>, ClassifierError> {
        self.state.lock().map_err(|_| ClassifierError::Poisoned)
    }
}

/// Replaces the in-memory corpus with the store's and refits.
fn reload(state: &mut ClassifierState, params: &TrainingParams) -> Result<(), StoreError> {
    state.samples = state.store.load_samples()?;
    state.needs_reload = false;
    refit(state, params);
    Ok(())
}

fn refit(state: &mut ClassifierState, params: &TrainingParams) {
    let start = Instant::now();
    state.model = SoftmaxModel::fit(&state.samples, params);
    if state.model.is_some() {
        state.last_train_ms = start.elapsed().as_secs_f64() * 1000.0;
        log::info!(
            "Trained classifier on {} samples in {:.1}ms",
            state.samples.len(),
            state.last_train_ms
        );
    }
}
