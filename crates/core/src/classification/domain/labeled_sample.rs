//! One training sample and its text record format.
//!
//! A record is a single line: the integer label followed by
//! whitespace-separated `index:value` pairs with 0-based indices, e.g.
//! `3 0:0.12 1:-0.4 ...`. Parsing accepts sparse records; indices that are
//! absent are zero.

use thiserror::Error;

use crate::embedding::domain::embedding::Embedding;
use crate::shared::constants::EMBEDDING_SIZE;

#[derive(Clone, Debug, PartialEq)]
pub struct LabeledSample {
    pub label: i32,
    pub embedding: Embedding,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RecordError {
    #[error("empty record")]
    Empty,
    #[error("invalid label {0:?}")]
    Label(String),
    #[error("invalid feature {0:?}, expected index:value")]
    Feature(String),
    #[error("feature index {0} out of range")]
    IndexOutOfRange(usize),
}

impl LabeledSample {
    pub fn new(label: i32, embedding: Embedding) -> Self {
        Self { label, embedding }
    }

    /// Dense record without a trailing newline.
    pub fn to_record(&self) -> String {
        let mut line = self.label.to_string();
        for (i, v) in self.embedding.values().iter().enumerate() {
            line.push(' ');
            line.push_str(&i.to_string());
            line.push(':');
            line.push_str(&v.to_string());
        }
        line
    }

    pub fn parse_record(line: &str) -> Result<Self, RecordError> {
        let mut tokens = line.split_whitespace();
        let label_token = tokens.next().ok_or(RecordError::Empty)?;
        let label = label_token
            .parse::<i32>()
            .map_err(|_| RecordError::Label(label_token.to_string()))?;

        let mut values = vec![0.0f32; EMBEDDING_SIZE];
        for token in tokens {
            let (idx, val) = token
                .split_once(':')
                .ok_or_else(|| RecordError::Feature(token.to_string()))?;
            let idx: usize = idx
                .parse()
                .map_err(|_| RecordError::Feature(token.to_string()))?;
            let val: f32 = val
                .parse()
                .map_err(|_| RecordError::Feature(token.to_string()))?;
            let slot = values
                .get_mut(idx)
                .ok_or(RecordError::IndexOutOfRange(idx))?;
            *slot = val;
        }

        let embedding = Embedding::new(values).map_err(|_| RecordError::Empty)?;
        Ok(Self { label, embedding })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn embedding_with(first: f32) -> Embedding {
        let mut v = vec![0.0; EMBEDDING_SIZE];
        v[0] = first;
        v[EMBEDDING_SIZE - 1] = -0.25;
        Embedding::new(v).unwrap()
    }

    #[test]
    fn test_record_is_dense_and_parses_back_exactly() {
        let sample = LabeledSample::new(4, embedding_with(0.5));
        let line = sample.to_record();
        assert!(line.starts_with("4 0:0.5 1:0 "));
        assert_eq!(line.split_whitespace().count(), EMBEDDING_SIZE + 1);
        assert_eq!(LabeledSample::parse_record(&line).unwrap(), sample);
    }

    #[test]
    fn test_sparse_record_fills_zeros() {
        let sample = LabeledSample::parse_record("2 5:1.5 511:-2").unwrap();
        assert_eq!(sample.label, 2);
        let v = sample.embedding.values();
        assert_eq!(v[5], 1.5);
        assert_eq!(v[511], -2.0);
        assert_eq!(v[0], 0.0);
    }

    #[rstest]
    #[case::empty("", RecordError::Empty)]
    #[case::bad_label("x 0:1", RecordError::Label("x".into()))]
    #[case::missing_colon("1 0=1", RecordError::Feature("0=1".into()))]
    #[case::bad_value("1 0:abc", RecordError::Feature("0:abc".into()))]
    #[case::index_too_large("1 512:1", RecordError::IndexOutOfRange(512))]
    fn test_malformed_records(#[case] line: &str, #[case] expected: RecordError) {
        assert_eq!(LabeledSample::parse_record(line).unwrap_err(), expected);
    }
}
