//! Bounded trailing window of trusted humidity readings.

use heapless::Deque;

/// Hard capacity of the window storage.
pub const MAX_TREND_WINDOW: usize = 16;

#[derive(Debug, Clone)]
pub struct TrendWindow {
    points: Deque<(u64, f32), MAX_TREND_WINDOW>,
    len: usize,
}

impl TrendWindow {
    /// `len` is clamped to `2..=MAX_TREND_WINDOW`.
    pub fn new(len: usize) -> Self {
        Self {
            points: Deque::new(),
            len: len.clamp(2, MAX_TREND_WINDOW),
        }
    }

    /// Insert a reading, evicting the oldest when full.
    pub fn push(&mut self, at_ms: u64, value: f32) {
        while self.points.len() >= self.len {
            self.points.pop_front();
        }
        // Capacity was just made available above.
        let _ = self.points.push_back((at_ms, value));
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn latest(&self) -> Option<f32> {
        self.points.back().map(|&(_, v)| v)
    }

    /// Rate of change in units per second, oldest to newest.  `None` with
    /// fewer than two points or no elapsed time.
    pub fn rate_per_sec(&self) -> Option<f32> {
        let &(t0, v0) = self.points.front()?;
        let &(t1, v1) = self.points.back()?;
        if self.points.len() < 2 || t1 <= t0 {
            return None;
        }
        let dt = (t1 - t0) as f32 / 1000.0;
        Some((v1 - v0) / dt)
    }

    /// Projected value `lookahead_secs` ahead of the newest reading, only
    /// when the trend is rising.  A flat or falling trend cannot overshoot.
    pub fn predict_rising(&self, lookahead_secs: f32) -> Option<f32> {
        let rate = self.rate_per_sec()?;
        if rate <= 0.0 || rate.is_nan() {
            return None;
        }
        Some(self.latest()? + rate * lookahead_secs)
    }
}
