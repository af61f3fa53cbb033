use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::classification::domain::softmax_model::TrainingParams;
use crate::shared::constants::APP_DIR_NAME;
use crate::tracking::domain::tracker_config::TrackerConfig;

/// User-tunable pipeline configuration, persisted as JSON.
///
/// Every field has a default, so a partial or missing settings file still
/// loads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionSettings {
    /// Directory holding the training corpus and identity names.
    pub data_root: Option<PathBuf>,
    /// Directory with bundled default data/model files, copied on first run.
    pub bundled_dir: Option<PathBuf>,
    pub detector_confidence: f64,
    pub allow_model_download: bool,
    pub tracker: TrackerConfig,
    pub training: TrainingParams,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            data_root: None,
            bundled_dir: None,
            detector_confidence: 0.5,
            allow_model_download: true,
            tracker: TrackerConfig::default(),
            training: TrainingParams::default(),
        }
    }
}

impl RecognitionSettings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("settings.json"))
    }

    /// Loads from the platform config path, falling back to defaults.
    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Loads from `path`; unreadable or malformed files yield defaults.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                log::warn!("Ignoring malformed settings at {}: {e}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Resolved data root: the configured one, or the platform data dir.
    pub fn data_root(&self) -> Option<PathBuf> {
        self.data_root
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join(APP_DIR_NAME)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let tmp = TempDir::new().unwrap();
        let settings = RecognitionSettings::load_from(&tmp.path().join("nope.json"));
        assert_eq!(settings, RecognitionSettings::default());
    }

    #[test]
    fn test_malformed_file_yields_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(
            RecognitionSettings::load_from(&path),
            RecognitionSettings::default()
        );
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.json");
        fs::write(&path, r#"{ "detector_confidence": 0.7 }"#).unwrap();
        let settings = RecognitionSettings::load_from(&path);
        assert!((settings.detector_confidence - 0.7).abs() < f64::EPSILON);
        assert_eq!(settings.tracker, TrackerConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("settings.json");
        let settings = RecognitionSettings {
            data_root: Some(tmp.path().to_path_buf()),
            detector_confidence: 0.3,
            ..Default::default()
        };
        settings.save_to(&path).unwrap();
        assert_eq!(RecognitionSettings::load_from(&path), settings);
    }

    #[test]
    fn test_configured_data_root_wins() {
        let settings = RecognitionSettings {
            data_root: Some(PathBuf::from("/tmp/drv")),
            ..Default::default()
        };
        assert_eq!(settings.data_root(), Some(PathBuf::from("/tmp/drv")));
    }
}
