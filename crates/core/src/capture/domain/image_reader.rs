use std::path::Path;

use crate::shared::frame::Frame;

/// Decodes a still image into an RGB frame.
pub trait ImageReader: Send + Sync {
    fn read(&self, path: &Path, index: usize) -> Result<Frame, Box<dyn std::error::Error>>;
}
