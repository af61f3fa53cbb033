use std::path::Path;

use crate::capture::domain::image_reader::ImageReader;
use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;

/// Decodes image files with the `image` crate, converting to 8-bit RGB.
#[derive(Default)]
pub struct ImageFileReader;

impl ImageFileReader {
    pub fn new() -> Self {
        Self
    }
}

impl ImageReader for ImageFileReader {
    fn read(&self, path: &Path, index: usize) -> Result<Frame, Box<dyn std::error::Error>> {
        let img = image::open(path)?.to_rgb8();
        log::debug!(
            "Decoded {} ({}x{})",
            path.display(),
            img.width(),
            img.height()
        );
        Ok(Frame::from_rgb_image(img, index))
    }
}

/// Whether `path` has a known still-image extension.
pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::path::PathBuf;

    fn write_test_image(dir: &Path, width: u32, height: u32) -> PathBuf {
        let path = dir.join("test.png");
        let mut img = image::RgbImage::new(width, height);
        for pixel in img.pixels_mut() {
            *pixel = image::Rgb([50, 100, 200]);
        }
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn test_read_dimensions_and_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_image(dir.path(), 100, 80);
        let frame = ImageFileReader::new().read(&path, 3).unwrap();
        assert_eq!(frame.width(), 100);
        assert_eq!(frame.height(), 80);
        assert_eq!(frame.index(), 3);
    }

    #[test]
    fn test_frame_is_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_image(dir.path(), 10, 8);
        let frame = ImageFileReader::new().read(&path, 0).unwrap();
        assert_eq!(frame.channels(), 3);
        assert_eq!(&frame.data()[..3], &[50, 100, 200]);
    }

    #[test]
    fn test_read_nonexistent_fails() {
        assert!(ImageFileReader::new()
            .read(Path::new("/nonexistent/test.png"), 0)
            .is_err());
    }

    #[test]
    fn test_read_garbage_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"not an image").unwrap();
        assert!(ImageFileReader::new().read(&path, 0).is_err());
    }

    #[rstest]
    #[case("face.jpg", true)]
    #[case("face.JPEG", true)]
    #[case("face.png", true)]
    #[case("notes.txt", false)]
    #[case("noext", false)]
    fn test_is_image(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_image(Path::new(name)), expected);
    }
}
