//! Synthetic hand poses for scripted input and tests.
//!
//! All poses are upright hands in normalized landmark space, centered on
//! (`cx`, `cy`), with the wrist below the knuckles.

use super::hand_tracking::{
    palm_center, HandLandmark, Handedness, Landmarks, RawHand, LANDMARK_COUNT,
};
use crate::geometry::{Point2, Point3};

/// Knuckle x offsets for index, middle, ring, pinky.
const FINGER_X: [f64; 4] = [-0.04, -0.01, 0.02, 0.05];

/// First landmark index (MCP) of each non-thumb finger.
const FINGER_BASE: [usize; 4] = [5, 9, 13, 17];

fn curl_finger(lm: &mut Landmarks, finger: usize, cx: f64, cy: f64) {
    let x = cx + FINGER_X[finger];
    let base = FINGER_BASE[finger];
    lm[base + 1] = Point3::new(x, cy - 0.03, 0.0);
    lm[base + 2] = Point3::new(x, cy - 0.01, 0.0);
    lm[base + 3] = Point3::new(x, cy + 0.01, 0.0);
}

/// All five fingers extended.
pub fn open_hand(cx: f64, cy: f64) -> Landmarks {
    let mut lm = [Point3::new(cx, cy, 0.0); LANDMARK_COUNT];
    let mut set = |j: HandLandmark, x: f64, y: f64| {
        lm[j.index()] = Point3::new(cx + x, cy + y, 0.0);
    };
    set(HandLandmark::Wrist, 0.0, 0.10);
    set(HandLandmark::ThumbCmc, -0.03, 0.08);
    set(HandLandmark::ThumbMcp, -0.05, 0.06);
    set(HandLandmark::ThumbIp, -0.08, 0.03);
    set(HandLandmark::ThumbTip, -0.12, 0.00);
    for (x, base) in FINGER_X.iter().zip(FINGER_BASE) {
        lm[base] = Point3::new(cx + x, cy, 0.0);
        lm[base + 1] = Point3::new(cx + x, cy - 0.04, 0.0);
        lm[base + 2] = Point3::new(cx + x, cy - 0.07, 0.0);
        lm[base + 3] = Point3::new(cx + x, cy - 0.10, 0.0);
    }
    lm
}

/// Fingertips curled below their mid-joints, thumb folded near its base
/// and clear of the fingertips.
pub fn fist(cx: f64, cy: f64) -> Landmarks {
    let mut lm = open_hand(cx, cy);
    lm[HandLandmark::ThumbTip.index()] = Point3::new(cx - 0.09, cy + 0.09, 0.0);
    for finger in 0..4 {
        curl_finger(&mut lm, finger, cx, cy);
    }
    lm
}

/// Thumb, index and middle extended, ring and pinky curled: neither a fist
/// nor an open palm.
pub fn blade(cx: f64, cy: f64) -> Landmarks {
    let mut lm = open_hand(cx, cy);
    curl_finger(&mut lm, 2, cx, cy);
    curl_finger(&mut lm, 3, cx, cy);
    lm
}

/// Open hand with the thumb tip touching the index tip.
pub fn pinch(cx: f64, cy: f64) -> Landmarks {
    let mut lm = open_hand(cx, cy);
    let index = lm[HandLandmark::IndexTip.index()];
    lm[HandLandmark::ThumbTip.index()] = Point3::new(index.x - 0.01, index.y, 0.0);
    lm
}

/// Pose center (`cx`, `cy`) that puts the palm center of any pose here at
/// `palm`.  Wrist and middle knuckle are the same in every pose.
pub fn center_for_palm(palm: Point2) -> (f64, f64) {
    (palm.x + 0.005, palm.y - 0.05)
}

/// Wrap a pose as a confident provider detection.
pub fn raw_hand(landmarks: Landmarks, handedness: Handedness) -> RawHand {
    RawHand {
        landmarks: landmarks.to_vec(),
        handedness,
        score: 0.95,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_for_palm_places_palm() {
        let target = Point2::new(0.3, 0.6);
        let (cx, cy) = center_for_palm(target);
        for lm in [open_hand(cx, cy), fist(cx, cy), blade(cx, cy), pinch(cx, cy)] {
            let p = palm_center(&lm);
            assert!(p.distance(&target) < 1e-12, "palm at {:?}", p);
        }
    }

    #[test]
    fn test_raw_hand_carries_all_landmarks() {
        let raw = raw_hand(open_hand(0.5, 0.5), Handedness::Left);
        assert_eq!(raw.landmarks.len(), LANDMARK_COUNT);
        assert!(raw.score > 0.7);
    }
}
