use std::collections::HashMap;

use crate::shared::region::Region;

pub const DEFAULT_ALPHA: f64 = 0.6;

/// EMA smoother with per-track state.
///
/// Formula: `ema[t] = alpha * current + (1 - alpha) * ema[t-1]`, applied to
/// each corner coordinate. The first observation of a track passes through.
pub struct RegionSmoother {
    alpha: f64,
    state: HashMap<u32, Region>,
}

impl RegionSmoother {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            state: HashMap::new(),
        }
    }

    pub fn smooth(&mut self, track_id: u32, region: Region) -> Region {
        let smoothed = match self.state.get(&track_id) {
            None => region,
            Some(prev) => region.blend(prev, self.alpha),
        };
        self.state.insert(track_id, smoothed);
        smoothed
    }

    /// Drops the state of every track not in `live`.
    pub fn retain(&mut self, live: impl Fn(u32) -> bool) {
        self.state.retain(|id, _| live(*id));
    }

    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }
}

impl Default for RegionSmoother {
    fn default() -> Self {
        Self::new(DEFAULT_ALPHA)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_first_observation_returns_unchanged() {
        let mut smoother = RegionSmoother::default();
        let r = Region::new(100.0, 200.0, 150.0, 260.0);
        assert_eq!(smoother.smooth(1, r), r);
    }

    #[test]
    fn test_second_observation_applies_ema() {
        let mut smoother = RegionSmoother::new(0.6);
        smoother.smooth(1, Region::new(100.0, 200.0, 150.0, 260.0));
        let result = smoother.smooth(1, Region::new(110.0, 210.0, 160.0, 270.0));

        assert_relative_eq!(result.x1, 0.6 * 110.0 + 0.4 * 100.0);
        assert_relative_eq!(result.y1, 0.6 * 210.0 + 0.4 * 200.0);
        assert_relative_eq!(result.x2, 0.6 * 160.0 + 0.4 * 150.0);
        assert_relative_eq!(result.y2, 0.6 * 270.0 + 0.4 * 260.0);
    }

    #[test]
    fn test_convergence() {
        let mut smoother = RegionSmoother::new(0.6);
        let target = Region::new(500.0, 500.0, 600.0, 600.0);
        smoother.smooth(1, Region::new(0.0, 0.0, 1.0, 1.0));

        let mut result = target;
        for _ in 0..50 {
            result = smoother.smooth(1, target);
        }
        assert_relative_eq!(result.x1, target.x1, epsilon = 0.01);
        assert_relative_eq!(result.y2, target.y2, epsilon = 0.01);
    }

    #[test]
    fn test_tracks_independent() {
        let mut smoother = RegionSmoother::new(0.6);
        smoother.smooth(1, Region::new(100.0, 100.0, 150.0, 150.0));
        smoother.smooth(2, Region::new(500.0, 500.0, 580.0, 580.0));

        let a = smoother.smooth(1, Region::new(110.0, 110.0, 160.0, 160.0));
        let b = smoother.smooth(2, Region::new(510.0, 510.0, 590.0, 590.0));
        assert_relative_eq!(a.x1, 0.6 * 110.0 + 0.4 * 100.0);
        assert_relative_eq!(b.x1, 0.6 * 510.0 + 0.4 * 500.0);
    }

    #[test]
    fn test_alpha_one_uses_current() {
        let mut smoother = RegionSmoother::new(1.0);
        smoother.smooth(1, Region::new(100.0, 200.0, 150.0, 260.0));
        let second = Region::new(999.0, 888.0, 1000.0, 900.0);
        assert_eq!(smoother.smooth(1, second), second);
    }

    #[test]
    fn test_retain_forgets_dead_tracks() {
        let mut smoother = RegionSmoother::default();
        smoother.smooth(1, Region::new(0.0, 0.0, 10.0, 10.0));
        smoother.smooth(2, Region::new(0.0, 0.0, 10.0, 10.0));
        smoother.retain(|id| id == 2);
        assert_eq!(smoother.len(), 1);

        // Track 1's history is gone, so its next observation passes through.
        let fresh = Region::new(50.0, 50.0, 60.0, 60.0);
        assert_eq!(smoother.smooth(1, fresh), fresh);
    }
}
