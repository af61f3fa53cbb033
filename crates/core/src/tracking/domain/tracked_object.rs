use crate::shared::recognition::Recognition;
use crate::shared::region::Region;

/// RGB display color of a track.
pub type TrackColor = [u8; 3];

/// Box colors, assigned to tracks in id order.
pub const PALETTE: [TrackColor; 12] = [
    [0, 0, 255],
    [255, 0, 0],
    [0, 255, 0],
    [255, 255, 0],
    [0, 255, 255],
    [255, 0, 255],
    [255, 255, 255],
    [170, 255, 170],
    [255, 170, 170],
    [255, 255, 170],
    [170, 170, 255],
    [170, 170, 170],
];

pub fn palette_color(track_id: u32) -> TrackColor {
    PALETTE[track_id.saturating_sub(1) as usize % PALETTE.len()]
}

/// A face followed across frames.
///
/// `location` is the smoothed position; `recognition` is the latest result
/// associated with the track, with its raw location.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackedObject {
    pub track_id: u32,
    pub location: Region,
    pub recognition: Recognition,
    /// Timestamp of the frame the latest recognition came from.
    pub last_seen: u64,
    /// Consecutive `track_results` calls without a match.
    pub frames_missed: u32,
    pub color: TrackColor,
}

impl TrackedObject {
    pub fn title(&self) -> &str {
        &self.recognition.title
    }

    pub fn confidence(&self) -> f64 {
        self.recognition.confidence
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_cycles_from_first_id() {
        assert_eq!(palette_color(1), PALETTE[0]);
        assert_eq!(palette_color(2), PALETTE[1]);
        assert_eq!(palette_color(PALETTE.len() as u32 + 1), PALETTE[0]);
        assert_eq!(palette_color(0), PALETTE[0]);
    }
}
