use crate::shared::constants::EMBEDDING_SIZE;

/// Fixed-length facial identity vector.
///
/// Only comparable with embeddings produced by the same embedder
/// configuration. The length is checked on construction, so every
/// `Embedding` in the system has exactly [`EMBEDDING_SIZE`] elements.
#[derive(Clone, Debug, PartialEq)]
pub struct Embedding(Vec<f32>);

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("embedding must have {expected} elements, got {0}", expected = EMBEDDING_SIZE)]
pub struct DimensionMismatch(pub usize);

impl Embedding {
    pub fn new(values: Vec<f32>) -> Result<Self, DimensionMismatch> {
        if values.len() != EMBEDDING_SIZE {
            return Err(DimensionMismatch(values.len()));
        }
        Ok(Self(values))
    }

    /// Builds an L2-normalized embedding.
    pub fn normalized(mut values: Vec<f32>) -> Result<Self, DimensionMismatch> {
        l2_normalize(&mut values);
        Self::new(values)
    }

    pub fn values(&self) -> &[f32] {
        &self.0
    }
}

pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
