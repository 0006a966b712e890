//! Planar geometry and per-hand velocity history.

use std::collections::VecDeque;

/// Default number of samples kept per hand slot.
pub const HISTORY_LEN: usize = 10;

// ── Points ─────────────────────────────────────────────────

/// A 2D position, in whatever space the caller works in (normalized
/// landmark space, screen pixels, or arena units).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Point2) -> f64 {
        distance(*self, *other)
    }

    /// Bearing from `self` towards `other`, in radians (`atan2(dy, dx)`).
    pub fn bearing_to(&self, other: &Point2) -> f64 {
        (other.y - self.y).atan2(other.x - self.x)
    }

    pub fn midpoint(&self, other: &Point2) -> Point2 {
        Point2::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// A landmark point as delivered by the tracking provider.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Drop the depth component.
    pub fn xy(&self) -> Point2 {
        Point2::new(self.x, self.y)
    }
}

/// Euclidean distance between two planar points.
pub fn distance(a: Point2, b: Point2) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    (dx * dx + dy * dy).sqrt()
}

// ── Velocity ───────────────────────────────────────────────

/// Instantaneous velocity in units per second.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Velocity {
    pub x: f64,
    pub y: f64,
    pub speed: f64,
}

/// One timestamped position sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocitySample {
    pub position: Point2,
    pub timestamp_ms: u64,
}

/// Bounded FIFO of position samples for one hand slot.
///
/// Samples are kept in ascending timestamp order; a sample older than the
/// newest one is dropped.  Only the two most recent samples feed the
/// velocity estimate.
#[derive(Debug, Clone)]
pub struct VelocityHistory {
    samples: VecDeque<VelocitySample>,
    capacity: usize,
}

impl VelocityHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            samples: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest past capacity.
    pub fn push(&mut self, position: Point2, timestamp_ms: u64) {
        if let Some(last) = self.samples.back() {
            if timestamp_ms < last.timestamp_ms {
                return;
            }
        }
        self.samples.push_back(VelocitySample {
            position,
            timestamp_ms,
        });
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// Velocity between the two most recent samples.
    ///
    /// Zero when fewer than two samples exist or both share a timestamp.
    pub fn velocity(&self) -> Velocity {
        let n = self.samples.len();
        if n < 2 {
            return Velocity::default();
        }
        let recent = &self.samples[n - 1];
        let previous = &self.samples[n - 2];
        let dt_ms = recent.timestamp_ms - previous.timestamp_ms;
        if dt_ms == 0 {
            return Velocity::default();
        }
        let dt = dt_ms as f64 / 1000.0;
        let vx = (recent.position.x - previous.position.x) / dt;
        let vy = (recent.position.y - previous.position.y) / dt;
        Velocity {
            x: vx,
            y: vy,
            speed: (vx * vx + vy * vy).sqrt(),
        }
    }

    pub fn latest(&self) -> Option<&VelocitySample> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VelocitySample> {
        self.samples.iter()
    }
}

impl Default for VelocityHistory {
    fn default() -> Self {
        Self::new(HISTORY_LEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance() {
        let d = distance(Point2::new(0.0, 0.0), Point2::new(3.0, 4.0));
        assert!((d - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_velocity_from_two_samples() {
        let mut h = VelocityHistory::default();
        h.push(Point2::new(0.0, 0.0), 1000);
        h.push(Point2::new(10.0, 0.0), 1100);
        let v = h.velocity();
        assert!((v.speed - 100.0).abs() < 1e-9, "expected 100, got {}", v.speed);
        assert!((v.x - 100.0).abs() < 1e-9);
        assert!(v.y.abs() < 1e-9);
    }

    #[test]
    fn test_velocity_duplicate_timestamp_is_zero() {
        let mut h = VelocityHistory::default();
        h.push(Point2::new(0.0, 0.0), 500);
        h.push(Point2::new(50.0, 50.0), 500);
        let v = h.velocity();
        assert_eq!(v, Velocity::default());
        assert!(v.speed.is_finite());
    }

    #[test]
    fn test_velocity_single_sample_is_zero() {
        let mut h = VelocityHistory::default();
        h.push(Point2::new(3.0, 4.0), 10);
        assert_eq!(h.velocity().speed, 0.0);
    }

    #[test]
    fn test_history_evicts_oldest() {
        let mut h = VelocityHistory::new(10);
        for i in 0..15u64 {
            h.push(Point2::new(i as f64, 0.0), i * 10);
        }
        assert_eq!(h.len(), 10);
        assert_eq!(h.iter().next().map(|s| s.timestamp_ms), Some(50));
        assert_eq!(h.latest().map(|s| s.timestamp_ms), Some(140));
    }

    #[test]
    fn test_history_rejects_out_of_order_sample() {
        let mut h = VelocityHistory::default();
        h.push(Point2::new(0.0, 0.0), 200);
        h.push(Point2::new(5.0, 0.0), 100);
        assert_eq!(h.len(), 1);
        let stamps: Vec<u64> = h.iter().map(|s| s.timestamp_ms).collect();
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_bearing_and_midpoint() {
        let a = Point2::new(0.0, 0.0);
        let b = Point2::new(0.0, 10.0);
        assert!((a.bearing_to(&b) - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
        assert_eq!(a.midpoint(&b), Point2::new(0.0, 5.0));
    }
}
