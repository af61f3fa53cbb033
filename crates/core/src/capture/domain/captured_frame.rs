use std::sync::Arc;

use crate::shared::frame::Frame;
use crate::tracking::domain::frame_geometry::FrameGeometry;

/// A frame as delivered by the capture source.
#[derive(Clone, Debug)]
pub struct CapturedFrame {
    pub frame: Arc<Frame>,
    /// Clockwise sensor rotation in degrees, a multiple of 90.
    pub rotation: i32,
    pub timestamp: u64,
    pub luminance: Arc<[u8]>,
}

impl CapturedFrame {
    /// Wraps `frame`, taking its luminance snapshot.
    pub fn new(frame: Frame, rotation: i32, timestamp: u64) -> Self {
        let luminance: Arc<[u8]> = Arc::from(frame.luminance());
        Self {
            frame: Arc::new(frame),
            rotation,
            timestamp,
            luminance,
        }
    }

    pub fn geometry(&self) -> FrameGeometry {
        FrameGeometry::new(self.frame.width(), self.frame.height(), self.rotation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_snapshots_luminance() {
        let frame = Frame::new(vec![255u8; 4 * 2 * 3], 4, 2, 3, 0);
        let captured = CapturedFrame::new(frame, 90, 7);
        assert_eq!(captured.luminance.len(), 8);
        assert!(captured.luminance.iter().all(|&y| y == 255));
        assert_eq!(captured.geometry(), FrameGeometry::new(4, 2, 90));
    }
}
