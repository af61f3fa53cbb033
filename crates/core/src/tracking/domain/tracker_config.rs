use serde::{Deserialize, Serialize};

/// Association and aging parameters for the multi-face tracker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Minimum IoU between a track and a recognition to associate them.
    pub match_iou: f64,
    /// A track is dropped once it has gone unmatched for more calls than this.
    pub max_missed: u32,
    /// EMA weight of the newest position (1.0 disables smoothing).
    pub smoothing_alpha: f64,
    /// Recognitions narrower or shorter than this many pixels are ignored.
    pub min_size: f64,
    pub max_tracks: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            match_iou: 0.3,
            max_missed: 5,
            smoothing_alpha: 0.6,
            min_size: 16.0,
            max_tracks: 10,
        }
    }
}
