use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::{
    APP_DIR_NAME, DETECTOR_MODEL_NAME, DETECTOR_MODEL_URL, EMBEDDER_MODEL_NAME,
    EMBEDDER_MODEL_URL,
};

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
    #[error("model {0} not found locally and downloads are disabled")]
    NotAvailable(String),
}

/// Download progress: `(model_name, bytes_so_far, total_bytes)`, with
/// `total_bytes` 0 when the server sends no Content-Length.
pub type ProgressFn = Box<dyn Fn(&str, u64, u64) + Send + Sync>;

const CHUNK_SIZE: usize = 256 * 1024;

/// A downloadable model artifact.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: &'static str,
    pub url: &'static str,
}

pub const DETECTOR_MODEL: ModelSpec = ModelSpec {
    name: DETECTOR_MODEL_NAME,
    url: DETECTOR_MODEL_URL,
};

pub const EMBEDDER_MODEL: ModelSpec = ModelSpec {
    name: EMBEDDER_MODEL_NAME,
    url: EMBEDDER_MODEL_URL,
};

/// Finds a model file, checking the user cache, then the bundled
/// directory, then downloading into the cache (when `allow_download`).
pub fn resolve(
    spec: ModelSpec,
    bundled_dir: Option<&Path>,
    allow_download: bool,
    progress: Option<&ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    let cache_dir = model_cache_dir()?;
    if let Some(found) = find_local(spec.name, &cache_dir, bundled_dir) {
        log::debug!("Using model {} at {}", spec.name, found.display());
        return Ok(found);
    }

    if !allow_download {
        return Err(ModelResolveError::NotAvailable(spec.name.to_string()));
    }

    log::info!("Downloading model {} from {}", spec.name, spec.url);
    fs::create_dir_all(&cache_dir).map_err(ModelResolveError::CacheDir)?;
    let cached_path = cache_dir.join(spec.name);
    download(spec, &cached_path, progress)?;
    Ok(cached_path)
}

fn find_local(name: &str, cache_dir: &Path, bundled_dir: Option<&Path>) -> Option<PathBuf> {
    let cached = cache_dir.join(name);
    if cached.exists() {
        return Some(cached);
    }
    bundled_dir
        .map(|dir| dir.join(name))
        .filter(|path| path.exists())
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/DriverRecognition/models/`
/// - Linux: `$XDG_CACHE_HOME/DriverRecognition/models/` or `~/.cache/DriverRecognition/models/`
/// - Windows: `%LOCALAPPDATA%/DriverRecognition/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir()
            .map(|d| d.join(APP_DIR_NAME).join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::cache_dir()
            .map(|d| d.join(APP_DIR_NAME).join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
}

/// Streams `spec.url` into `dest` through a sibling `.part` file, so a
/// failed download never leaves a truncated model at `dest`.
fn download(
    spec: ModelSpec,
    dest: &Path,
    progress: Option<&ProgressFn>,
) -> Result<(), ModelResolveError> {
    let download_err = |source| ModelResolveError::Download {
        url: spec.url.to_string(),
        source,
    };
    let mut response = reqwest::blocking::get(spec.url)
        .and_then(|r| r.error_for_status())
        .map_err(download_err)?;
    let total = response.content_length().unwrap_or(0);

    let part_path = dest.with_extension("part");
    let write_err = |source| ModelResolveError::Write {
        path: part_path.clone(),
        source,
    };
    let result = (|| {
        let mut file = fs::File::create(&part_path).map_err(write_err)?;
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut downloaded = 0u64;
        loop {
            let n = response.read(&mut buf).map_err(write_err)?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n]).map_err(write_err)?;
            downloaded += n as u64;
            if let Some(cb) = progress {
                cb(spec.name, downloaded, total);
            }
        }
        file.flush().map_err(write_err)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&part_path);
        return Err(e);
    }

    fs::rename(&part_path, dest).map_err(|source| ModelResolveError::Write {
        path: dest.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_find_local_prefers_cache() {
        let tmp = TempDir::new().unwrap();
        let cache = tmp.path().join("cache");
        let bundled = tmp.path().join("bundled");
        fs::create_dir_all(&cache).unwrap();
        fs::create_dir_all(&bundled).unwrap();
        fs::write(cache.join("m.onnx"), b"cached").unwrap();
        fs::write(bundled.join("m.onnx"), b"bundled").unwrap();

        let found = find_local("m.onnx", &cache, Some(&bundled)).unwrap();
        assert_eq!(found, cache.join("m.onnx"));
    }

    #[test]
    fn test_find_local_falls_back_to_bundled() {
        let tmp = TempDir::new().unwrap();
        let bundled = tmp.path().join("bundled");
        fs::create_dir_all(&bundled).unwrap();
        fs::write(bundled.join("m.onnx"), b"bundled").unwrap();

        let found = find_local("m.onnx", &tmp.path().join("cache"), Some(&bundled)).unwrap();
        assert_eq!(found, bundled.join("m.onnx"));
    }

    #[test]
    fn test_find_local_missing_everywhere() {
        let tmp = TempDir::new().unwrap();
        assert!(find_local("m.onnx", tmp.path(), None).is_none());
    }

    #[test]
    fn test_model_cache_dir_is_app_scoped() {
        let path = model_cache_dir().unwrap();
        assert!(path.to_string_lossy().contains(APP_DIR_NAME));
        assert!(path.ends_with("models"));
    }

    #[test]
    fn test_download_invalid_url_leaves_no_partial_file() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("model.onnx");
        let spec = ModelSpec {
            name: "model.onnx",
            url: "http://invalid.nonexistent.example.com/model",
        };
        let result = download(spec, &dest, None);
        assert!(result.is_err());
        assert!(!dest.exists());
        assert!(!dest.with_extension("part").exists());
    }
}
