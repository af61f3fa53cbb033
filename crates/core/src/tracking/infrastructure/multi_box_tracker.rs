/// Greedy IoU multi-face tracker.
///
/// Each `track_results` call associates recognitions with live tracks
/// best-IoU-first, so every track takes at most one recognition and no
/// recognition is claimed twice. Unmatched recognitions spawn tracks,
/// unmatched tracks age and are dropped once they exceed the staleness
/// bound. Positions are EMA-smoothed per track.
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::shared::recognition::Recognition;
use crate::shared::region::Region;
use crate::tracking::domain::face_tracker::FaceTracker;
use crate::tracking::domain::frame_geometry::FrameGeometry;
use crate::tracking::domain::region_smoother::RegionSmoother;
use crate::tracking::domain::tracked_object::{palette_color, TrackedObject};
use crate::tracking::domain::tracker_config::TrackerConfig;

struct TrackerState {
    tracks: Vec<TrackedObject>,
    smoother: RegionSmoother,
    next_id: u32,
    geometry: FrameGeometry,
    frame_timestamp: u64,
    luminance: Option<Arc<[u8]>>,
}

pub struct MultiBoxTracker {
    config: TrackerConfig,
    state: Mutex<TrackerState>,
}

impl MultiBoxTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            state: Mutex::new(TrackerState {
                tracks: Vec::new(),
                smoother: RegionSmoother::new(config.smoothing_alpha),
                next_id: 1,
                geometry: FrameGeometry::default(),
                frame_timestamp: 0,
                luminance: None,
            }),
            config,
        }
    }

    pub fn frame_geometry(&self) -> FrameGeometry {
        self.lock().geometry
    }

    /// Luminance of the most recent `on_frame` or `track_results` call.
    pub fn last_luminance(&self) -> Option<Arc<[u8]>> {
        self.lock().luminance.clone()
    }

    /// Timestamp of the newest frame registered with `on_frame`.
    pub fn frame_timestamp(&self) -> u64 {
        self.lock().frame_timestamp
    }

    // A panic mid-update cannot leave a track half-written: every mutation
    // below is a plain field store, so the state is safe to keep using.
    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_trackable(&self, region: &Region) -> bool {
        region.width() >= self.config.min_size && region.height() >= self.config.min_size
    }
}

impl Default for MultiBoxTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

impl FaceTracker for MultiBoxTracker {
    fn on_frame(&self, geometry: FrameGeometry, luminance: Arc<[u8]>, timestamp: u64) {
        let mut state = self.lock();
        state.geometry = geometry;
        state.frame_timestamp = timestamp;
        state.luminance = Some(luminance);
    }

    fn track_results(&self, recognitions: &[Recognition], luminance: Arc<[u8]>, timestamp: u64) {
        let candidates: Vec<(usize, &Recognition)> = recognitions
            .iter()
            .enumerate()
            .filter(|(_, r)| self.is_trackable(&r.location))
            .collect();

        let mut state = self.lock();
        let state = &mut *state;
        state.luminance = Some(luminance);

        let track_refs: Vec<(usize, Region)> = state
            .tracks
            .iter()
            .enumerate()
            .map(|(i, t)| (i, t.location))
            .collect();

        let matches = greedy_match(&track_refs, &candidates, self.config.match_iou);

        let mut matched_tracks = HashSet::new();
        let mut claimed = HashSet::new();
        for (ti, ri) in matches {
            let recognition = &recognitions[ri];
            let track = &mut state.tracks[ti];
            track.location = state.smoother.smooth(track.track_id, recognition.location);
            track.recognition = recognition.clone();
            track.last_seen = timestamp;
            track.frames_missed = 0;
            matched_tracks.insert(ti);
            claimed.insert(ri);
        }

        for (i, track) in state.tracks.iter_mut().enumerate() {
            if !matched_tracks.contains(&i) {
                track.frames_missed += 1;
            }
        }
        let max_missed = self.config.max_missed;
        state.tracks.retain(|t| {
            if t.frames_missed > max_missed {
                log::debug!("Track {} ({}) expired", t.track_id, t.recognition.title);
                false
            } else {
                true
            }
        });

        let mut unclaimed: Vec<&(usize, &Recognition)> = candidates
            .iter()
            .filter(|(ri, _)| !claimed.contains(ri))
            .collect();
        unclaimed.sort_by(|a, b| {
            b.1.confidence
                .partial_cmp(&a.1.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        for (_, recognition) in unclaimed {
            if state.tracks.len() >= self.config.max_tracks {
                log::debug!("Track limit reached, ignoring {recognition}");
                continue;
            }
            let track_id = state.next_id;
            state.next_id += 1;
            let location = state.smoother.smooth(track_id, recognition.location);
            log::debug!("New track {track_id}: {recognition}");
            state.tracks.push(TrackedObject {
                track_id,
                location,
                recognition: (*recognition).clone(),
                last_seen: timestamp,
                frames_missed: 0,
                color: palette_color(track_id),
            });
        }

        let tracks = &state.tracks;
        state
            .smoother
            .retain(|id| tracks.iter().any(|t| t.track_id == id));
    }

    fn current_tracks(&self) -> Vec<TrackedObject> {
        self.lock().tracks.clone()
    }
}

/// Greedy IoU matching: pairs sorted by descending IoU, each track and
/// recognition used at most once.
fn greedy_match(
    tracks: &[(usize, Region)],
    candidates: &[(usize, &Recognition)],
    thresh: f64,
) -> Vec<(usize, usize)> {
    let mut pairs: Vec<(usize, usize, f64)> = Vec::new();
    for (ti, region) in tracks {
        for (ri, recognition) in candidates {
            let score = region.iou(&recognition.location);
            if score > 0.0 && score >= thresh {
                pairs.push((*ti, *ri, score));
            }
        }
    }
    pairs.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

    let mut used_tracks = HashSet::new();
    let mut used_candidates = HashSet::new();
    let mut matches = Vec::new();

    for (ti, ri, _) in &pairs {
        if !used_tracks.contains(ti) && !used_candidates.contains(ri) {
            used_tracks.insert(*ti);
            used_candidates.insert(*ri);
            matches.push((*ti, *ri));
        }
    }
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn rec(label: i32, x1: f64, y1: f64, x2: f64, y2: f64, confidence: f64) -> Recognition {
        Recognition::new(label, format!("id{label}"), confidence, Region::new(x1, y1, x2, y2))
    }

    fn lum() -> Arc<[u8]> {
        Arc::from(vec![0u8; 4])
    }

    fn tracker() -> MultiBoxTracker {
        MultiBoxTracker::new(TrackerConfig {
            smoothing_alpha: 1.0,
            ..TrackerConfig::default()
        })
    }

    #[test]
    fn test_new_recognitions_get_unique_ids_from_one() {
        let tracker = tracker();
        tracker.track_results(
            &[rec(0, 0.0, 0.0, 50.0, 50.0, 0.9), rec(1, 100.0, 100.0, 150.0, 150.0, 0.8)],
            lum(),
            1,
        );
        let ids: Vec<u32> = tracker.current_tracks().iter().map(|t| t.track_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_overlapping_result_updates_same_track() {
        let tracker = tracker();
        tracker.track_results(&[rec(0, 10.0, 10.0, 60.0, 60.0, 0.9)], lum(), 1);
        tracker.track_results(&[rec(0, 12.0, 12.0, 62.0, 62.0, 0.7)], lum(), 2);

        let tracks = tracker.current_tracks();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].track_id, 1);
        assert_eq!(tracks[0].last_seen, 2);
        assert_relative_eq!(tracks[0].confidence(), 0.7);
    }

    #[test]
    fn test_each_result_claimed_once() {
        let tracker = tracker();
        tracker.track_results(
            &[rec(0, 0.0, 0.0, 50.0, 50.0, 0.9), rec(1, 5.0, 5.0, 55.0, 55.0, 0.9)],
            lum(),
            1,
        );
        // One result overlapping both tracks goes to the better match only.
        tracker.track_results(&[rec(1, 5.0, 5.0, 55.0, 55.0, 0.9)], lum(), 2);

        let tracks = tracker.current_tracks();
        assert_eq!(tracks.len(), 2);
        let updated: Vec<_> = tracks.iter().filter(|t| t.frames_missed == 0).collect();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].track_id, 2);
    }

    #[test]
    fn test_stale_track_removed_after_bound() {
        let tracker = MultiBoxTracker::new(TrackerConfig {
            max_missed: 2,
            ..TrackerConfig::default()
        });
        tracker.track_results(&[rec(0, 10.0, 10.0, 60.0, 60.0, 0.9)], lum(), 1);

        tracker.track_results(&[], lum(), 2);
        tracker.track_results(&[], lum(), 3);
        assert_eq!(tracker.current_tracks().len(), 1);
        assert_eq!(tracker.current_tracks()[0].frames_missed, 2);

        tracker.track_results(&[], lum(), 4);
        assert!(tracker.current_tracks().is_empty());
    }

    #[test]
    fn test_ids_never_reused() {
        let tracker = MultiBoxTracker::new(TrackerConfig {
            max_missed: 0,
            ..TrackerConfig::default()
        });
        tracker.track_results(&[rec(0, 10.0, 10.0, 60.0, 60.0, 0.9)], lum(), 1);
        tracker.track_results(&[], lum(), 2);
        tracker.track_results(&[rec(0, 10.0, 10.0, 60.0, 60.0, 0.9)], lum(), 3);
        assert_eq!(tracker.current_tracks()[0].track_id, 2);
    }

    #[test]
    fn test_small_recognitions_ignored() {
        let tracker = tracker();
        tracker.track_results(&[rec(0, 0.0, 0.0, 10.0, 40.0, 0.9)], lum(), 1);
        assert!(tracker.current_tracks().is_empty());
    }

    #[test]
    fn test_track_limit_keeps_most_confident() {
        let tracker = MultiBoxTracker::new(TrackerConfig {
            max_tracks: 1,
            ..TrackerConfig::default()
        });
        tracker.track_results(
            &[rec(0, 0.0, 0.0, 50.0, 50.0, 0.4), rec(1, 200.0, 200.0, 250.0, 250.0, 0.9)],
            lum(),
            1,
        );
        let tracks = tracker.current_tracks();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].recognition.label, 1);
    }

    #[test]
    fn test_location_is_smoothed() {
        let tracker = MultiBoxTracker::new(TrackerConfig {
            smoothing_alpha: 0.5,
            ..TrackerConfig::default()
        });
        tracker.track_results(&[rec(0, 0.0, 0.0, 100.0, 100.0, 0.9)], lum(), 1);
        tracker.track_results(&[rec(0, 10.0, 10.0, 110.0, 110.0, 0.9)], lum(), 2);

        let track = &tracker.current_tracks()[0];
        assert_relative_eq!(track.location.x1, 5.0);
        assert_relative_eq!(track.location.x2, 105.0);
        assert_relative_eq!(track.recognition.location.x1, 10.0);
    }

    #[test]
    fn test_on_frame_records_geometry_without_tracking() {
        let tracker = tracker();
        tracker.on_frame(FrameGeometry::new(640, 480, 90), Arc::from(vec![7u8; 3]), 42);

        assert_eq!(tracker.frame_geometry(), FrameGeometry::new(640, 480, 90));
        assert_eq!(tracker.frame_timestamp(), 42);
        assert_eq!(tracker.last_luminance().as_deref(), Some(&[7u8, 7, 7][..]));
        assert!(tracker.current_tracks().is_empty());
    }

    #[test]
    fn test_colors_follow_palette() {
        let tracker = tracker();
        tracker.track_results(
            &[rec(0, 0.0, 0.0, 50.0, 50.0, 0.9), rec(1, 100.0, 100.0, 150.0, 150.0, 0.8)],
            lum(),
            1,
        );
        let tracks = tracker.current_tracks();
        assert_eq!(tracks[0].color, palette_color(1));
        assert_eq!(tracks[1].color, palette_color(2));
        assert_ne!(tracks[0].color, tracks[1].color);
    }

    #[test]
    fn test_snapshot_never_torn_under_concurrent_updates() {
        let tracker = Arc::new(tracker());
        let writer = {
            let tracker = tracker.clone();
            std::thread::spawn(move || {
                for ts in 0..200u64 {
                    let shift = (ts % 3) as f64;
                    tracker.track_results(
                        &[
                            rec(0, shift, 0.0, 50.0 + shift, 50.0, 0.9),
                            rec(1, 200.0 + shift, 0.0, 250.0 + shift, 50.0, 0.9),
                        ],
                        lum(),
                        ts,
                    );
                }
            })
        };
        for _ in 0..200 {
            let tracks = tracker.current_tracks();
            assert!(tracks.is_empty() || tracks.len() == 2);
            if tracks.len() == 2 {
                assert_eq!(tracks[0].last_seen, tracks[1].last_seen);
            }
        }
        writer.join().unwrap();
    }

    #[test]
    fn test_greedy_match_prefers_highest_iou() {
        let r_a = rec(0, 0.0, 0.0, 100.0, 100.0, 0.9);
        let r_b = rec(1, 40.0, 0.0, 140.0, 100.0, 0.9);
        let tracks = vec![(0, Region::new(35.0, 0.0, 135.0, 100.0))];
        let candidates = vec![(0, &r_a), (1, &r_b)];
        assert_eq!(greedy_match(&tracks, &candidates, 0.3), vec![(0, 1)]);
    }
}
