use std::sync::Arc;

use crate::shared::recognition::Recognition;
use crate::tracking::domain::frame_geometry::FrameGeometry;
use crate::tracking::domain::tracked_object::TrackedObject;

/// Reconciles per-frame recognitions into persistent tracks.
///
/// Implementations synchronise internally: `on_frame` and `track_results`
/// may be called from different threads while a renderer polls
/// `current_tracks`.
pub trait FaceTracker: Send + Sync {
    /// Records the geometry of the newest captured frame. Never recognizes.
    fn on_frame(&self, geometry: FrameGeometry, luminance: Arc<[u8]>, timestamp: u64);

    /// Associates recognitions computed for the frame at `timestamp` with
    /// existing tracks, spawning and aging tracks as needed.
    fn track_results(&self, recognitions: &[Recognition], luminance: Arc<[u8]>, timestamp: u64);

    /// A consistent snapshot of every live track, ordered by track id.
    fn current_tracks(&self) -> Vec<TrackedObject>;
}
