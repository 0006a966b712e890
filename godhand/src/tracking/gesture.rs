//! Gesture recognition from hand landmark streams.
//!
//! Turns per-frame `HandSample`s into discrete, cooldown-gated combat
//! gestures (chop, punch, slap, two-hand clap) and a separate pinch-drag
//! lifecycle.  Each hand slot carries two independent state dimensions:
//! pinch (idle/pinching) and discrete-gesture cooldown (ready/cooling).

use tracing::debug;

use super::hand_tracking::{
    palm_center, HandLandmark, HandSample, HandSlot, Landmarks, PlayerId, SlotPair, SLOT_COUNT,
};
use crate::clock::{Clock, MonotonicClock};
use crate::geometry::{distance, Point2, Velocity, VelocityHistory};

// ── Gesture types ──────────────────────────────────────────

/// Discrete combat gestures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GestureType {
    /// Fast motion of any hand that is neither a fist nor pinching.
    Chop,
    /// Fast motion of a closed fist.
    Punch,
    /// Fast motion of an open palm too slow to chop.
    Slap,
    /// Both open palms of one player brought together.
    Clap,
}

impl GestureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chop => "chop",
            Self::Punch => "punch",
            Self::Slap => "slap",
            Self::Clap => "clap",
        }
    }
}

/// Static hand shape for the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandShape {
    Pinch,
    Fist,
    Open,
    Unknown,
}

impl HandShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pinch => "pinch",
            Self::Fist => "fist",
            Self::Open => "open",
            Self::Unknown => "unknown",
        }
    }
}

// ── Events ─────────────────────────────────────────────────

/// Where a discrete gesture came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureOrigin {
    Slot(HandSlot),
    Pair(SlotPair),
}

impl GestureOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Slot(slot) => slot.as_str(),
            Self::Pair(pair) => pair.as_str(),
        }
    }
}

/// Screen-space landmarks of the hand(s) that produced a gesture.
#[derive(Debug, Clone, PartialEq)]
pub enum GesturePayload {
    Hand(Box<Landmarks>),
    Pair {
        left: Box<Landmarks>,
        right: Box<Landmarks>,
    },
}

/// A fired discrete gesture.
#[derive(Debug, Clone, PartialEq)]
pub struct Gesture {
    pub kind: GestureType,
    pub origin: GestureOrigin,
    pub payload: GesturePayload,
    pub timestamp_ms: u64,
    pub player: Option<PlayerId>,
    /// Palm velocity at firing time (zero for claps).
    pub velocity: Velocity,
}

impl Gesture {
    /// Screen-space palm center of the originating hand; the midpoint of
    /// both palms for a clap.
    pub fn palm_center(&self) -> Point2 {
        match &self.payload {
            GesturePayload::Hand(lm) => palm_center(lm),
            GesturePayload::Pair { left, right } => {
                palm_center(left).midpoint(&palm_center(right))
            }
        }
    }
}

/// Events emitted by gesture recognition.
#[derive(Debug, Clone, PartialEq)]
pub enum GestureEvent {
    /// A discrete gesture fired.
    Gesture(Gesture),
    /// A pinch began at `position`.
    PinchStart { slot: HandSlot, position: Point2 },
    /// A pinch is held; `position` is live, `start` is where it began.
    PinchMove {
        slot: HandSlot,
        position: Point2,
        start: Point2,
    },
    /// A pinch ended.  Carries the start position, not the last position.
    PinchEnd { slot: HandSlot, start: Point2 },
    /// Hands appeared after a frame without any.
    HandsDetected,
    /// The last tracked hand disappeared.
    HandsLost,
}

// ── Config ─────────────────────────────────────────────────

/// Thresholds for gesture recognition.  Distances are in normalized
/// landmark units, speeds in screen pixels per second.
#[derive(Debug, Clone)]
pub struct GestureConfig {
    pub enabled: bool,
    /// Maximum thumb-to-index tip distance for a pinch.
    pub pinch_threshold: f64,
    /// Multiplier on `pinch_threshold` for the thumb-to-middle fallback.
    pub pinch_relaxed_factor: f64,
    /// Minimum thumb-tip to thumb-base distance for an extended thumb.
    pub thumb_extension: f64,
    /// Per-slot cooldown after any discrete gesture (ms).
    pub gesture_cooldown_ms: u64,
    /// Per-pair cooldown after a clap (ms).
    pub clap_cooldown_ms: u64,
    /// Maximum palm-to-palm distance for a clap.
    pub clap_distance: f64,
    /// Palm speed below which no discrete gesture is considered.
    pub min_speed: f64,
    pub chop_speed: f64,
    pub punch_speed: f64,
    pub slap_speed: f64,
    /// Velocity samples kept per slot.
    pub history_len: usize,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pinch_threshold: 0.08,
            pinch_relaxed_factor: 1.2,
            thumb_extension: 0.06,
            gesture_cooldown_ms: 300,
            clap_cooldown_ms: 900,
            clap_distance: 0.15,
            min_speed: 150.0,
            chop_speed: 200.0,
            punch_speed: 250.0,
            slap_speed: 200.0,
            history_len: 10,
        }
    }
}

// ── Per-slot tracking ──────────────────────────────────────

/// Pinch-drag state for one slot.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PinchState {
    pub active: bool,
    pub start_pos: Option<Point2>,
}

/// What the classifier last saw on a slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandSnapshot {
    pub shape: HandShape,
    pub velocity: Velocity,
    /// Screen-space palm center.
    pub palm_center: Point2,
    pub is_pinching: bool,
}

#[derive(Debug, Clone)]
struct SlotState {
    history: VelocityHistory,
    pinch: PinchState,
    /// When this slot last fired a discrete gesture.
    last_fired_ms: Option<u64>,
    /// Present only while the slot is tracked.
    snapshot: Option<HandSnapshot>,
}

impl SlotState {
    fn new(history_len: usize) -> Self {
        Self {
            history: VelocityHistory::new(history_len),
            pinch: PinchState::default(),
            last_fired_ms: None,
            snapshot: None,
        }
    }
}

// ── Shape tests ────────────────────────────────────────────

/// Per-finger extension, thumb first.
///
/// The thumb counts as extended when its tip is far from its base joint.
/// The other four use "tip above mid-joint", which assumes an upright hand.
pub fn extended_fingers(landmarks: &Landmarks, thumb_extension: f64) -> [bool; 5] {
    let mut out = [false; 5];
    for (i, tip) in HandLandmark::fingertips().iter().enumerate() {
        let tip_pos = landmarks[tip.index()];
        out[i] = match tip.extension_reference() {
            Some(reference) => tip_pos.y < landmarks[reference.index()].y,
            None => {
                let base = landmarks[HandLandmark::ThumbMcp.index()];
                distance(tip_pos.xy(), base.xy()) > thumb_extension
            }
        };
    }
    out
}

fn extended_count(landmarks: &Landmarks, thumb_extension: f64) -> usize {
    extended_fingers(landmarks, thumb_extension)
        .iter()
        .filter(|e| **e)
        .count()
}

/// At least four fingers extended.
pub fn is_open_palm(landmarks: &Landmarks, thumb_extension: f64) -> bool {
    extended_count(landmarks, thumb_extension) >= 4
}

/// At most one finger extended.
pub fn is_fist(landmarks: &Landmarks, thumb_extension: f64) -> bool {
    extended_count(landmarks, thumb_extension) <= 1
}

/// The finger pinched against the thumb, if any.  Index is tested first,
/// then middle against a relaxed threshold.
pub fn pinch_finger(landmarks: &Landmarks, config: &GestureConfig) -> Option<HandLandmark> {
    let thumb = landmarks[HandLandmark::ThumbTip.index()].xy();
    let index = landmarks[HandLandmark::IndexTip.index()].xy();
    if distance(thumb, index) < config.pinch_threshold {
        return Some(HandLandmark::IndexTip);
    }
    let middle = landmarks[HandLandmark::MiddleTip.index()].xy();
    if distance(thumb, middle) < config.pinch_threshold * config.pinch_relaxed_factor {
        return Some(HandLandmark::MiddleTip);
    }
    None
}

// ── Classifier ─────────────────────────────────────────────

/// Central gesture recognition state, one instance per game session.
pub struct GestureClassifier {
    pub config: GestureConfig,
    clock: Box<dyn Clock>,
    slots: [SlotState; SLOT_COUNT],
    /// Last clap per slot pair, indexed by `SlotPair::index`.
    last_clap_ms: [Option<u64>; 3],
    /// Whether the previous frame carried any hands.
    had_hands: bool,
    hand_count: usize,
}

impl GestureClassifier {
    /// Create a classifier on the real monotonic clock.
    pub fn new(config: GestureConfig) -> Self {
        Self::with_clock(config, Box::new(MonotonicClock::new()))
    }

    pub fn with_clock(config: GestureConfig, clock: Box<dyn Clock>) -> Self {
        let history_len = config.history_len;
        Self {
            config,
            clock,
            slots: std::array::from_fn(|_| SlotState::new(history_len)),
            last_clap_ms: [None; 3],
            had_hands: false,
            hand_count: 0,
        }
    }

    /// Process one frame of slot-assigned hands and return its events.
    ///
    /// Slots absent from `samples` lose their snapshot; an active pinch on
    /// such a slot is force-ended with its original start position.  While
    /// disabled, every slot is released and nothing is emitted.
    pub fn process_frame(&mut self, samples: &[HandSample]) -> Vec<GestureEvent> {
        if !self.config.enabled {
            if self.had_hands || self.hand_count > 0 {
                debug!("Gesture recognition disabled, releasing all slots");
            }
            self.reset();
            return Vec::new();
        }

        let now = self.clock.now_ms();
        let mut events = Vec::new();

        let mut present: [Option<&HandSample>; SLOT_COUNT] = [None; SLOT_COUNT];
        for sample in samples {
            present[sample.slot.index()] = Some(sample);
        }
        let has_hands = present.iter().any(Option::is_some);

        if has_hands && !self.had_hands {
            debug!("Hands detected");
            events.push(GestureEvent::HandsDetected);
        }

        for slot in HandSlot::ALL {
            match present[slot.index()] {
                Some(sample) => self.analyze_hand(slot, sample, now, &mut events),
                None => self.release_slot(slot, &mut events),
            }
        }

        for pair in SlotPair::ALL {
            let (l, r) = pair.slots();
            if let (Some(left), Some(right)) = (present[l.index()], present[r.index()]) {
                if let Some(evt) = self.detect_clap(pair, left, right, now) {
                    events.push(evt);
                }
            }
        }

        if !has_hands && self.had_hands {
            debug!("Hands lost");
            events.push(GestureEvent::HandsLost);
        }
        self.had_hands = has_hands;
        self.hand_count = present.iter().filter(|p| p.is_some()).count();

        events
    }

    /// Update history, pinch lifecycle, and discrete gestures for one hand.
    fn analyze_hand(
        &mut self,
        slot: HandSlot,
        sample: &HandSample,
        now: u64,
        events: &mut Vec<GestureEvent>,
    ) {
        let screen_palm = sample.screen_palm_center();
        let pinch = pinch_finger(&sample.landmarks, &self.config);
        let fist = is_fist(&sample.landmarks, self.config.thumb_extension);
        let open = is_open_palm(&sample.landmarks, self.config.thumb_extension);
        let cooldown = self.config.gesture_cooldown_ms;

        let st = &mut self.slots[slot.index()];
        st.history.push(screen_palm, now);
        let velocity = st.history.velocity();

        // Pinch lifecycle
        match pinch {
            Some(finger) => {
                let thumb = sample.screen_landmarks[HandLandmark::ThumbTip.index()].xy();
                let tip = sample.screen_landmarks[finger.index()].xy();
                let position = thumb.midpoint(&tip);
                match st.pinch.start_pos {
                    Some(start) if st.pinch.active => {
                        events.push(GestureEvent::PinchMove {
                            slot,
                            position,
                            start,
                        });
                    }
                    _ => {
                        st.pinch = PinchState {
                            active: true,
                            start_pos: Some(position),
                        };
                        debug!("Pinch started on {} at ({:.0}, {:.0})", slot.as_str(), position.x, position.y);
                        events.push(GestureEvent::PinchStart { slot, position });
                    }
                }
            }
            None => {
                if let Some(evt) = end_pinch(slot, &mut st.pinch) {
                    events.push(evt);
                }
            }
        }

        // Discrete gestures: first matching rule wins
        let ready = st
            .last_fired_ms
            .map_or(true, |t| now.saturating_sub(t) > cooldown);
        let speed = velocity.speed;
        let kind = if ready && speed > self.config.min_speed {
            if fist && speed > self.config.punch_speed {
                Some(GestureType::Punch)
            } else if !fist && pinch.is_none() && speed > self.config.chop_speed {
                Some(GestureType::Chop)
            } else if open && speed > self.config.slap_speed {
                Some(GestureType::Slap)
            } else {
                None
            }
        } else {
            None
        };

        if let Some(kind) = kind {
            st.last_fired_ms = Some(now);
            debug!(
                "Gesture {} on {}, speed={:.0}",
                kind.as_str(),
                slot.as_str(),
                speed
            );
            events.push(GestureEvent::Gesture(Gesture {
                kind,
                origin: GestureOrigin::Slot(slot),
                payload: GesturePayload::Hand(Box::new(sample.screen_landmarks)),
                timestamp_ms: now,
                player: sample.player,
                velocity,
            }));
        }

        let shape = if pinch.is_some() {
            HandShape::Pinch
        } else if fist {
            HandShape::Fist
        } else if open {
            HandShape::Open
        } else {
            HandShape::Unknown
        };
        st.snapshot = Some(HandSnapshot {
            shape,
            velocity,
            palm_center: screen_palm,
            is_pinching: st.pinch.active,
        });
    }

    /// Slot has no hand this frame.
    fn release_slot(&mut self, slot: HandSlot, events: &mut Vec<GestureEvent>) {
        let st = &mut self.slots[slot.index()];
        st.snapshot = None;
        if let Some(evt) = end_pinch(slot, &mut st.pinch) {
            debug!("Pinch force-ended on {} (hand lost)", slot.as_str());
            events.push(evt);
        }
    }

    /// Two open palms of one pair close together, outside the clap cooldown.
    fn detect_clap(
        &mut self,
        pair: SlotPair,
        left: &HandSample,
        right: &HandSample,
        now: u64,
    ) -> Option<GestureEvent> {
        let dist = distance(palm_center(&left.landmarks), palm_center(&right.landmarks));
        if dist >= self.config.clap_distance {
            return None;
        }
        let ready = self.last_clap_ms[pair.index()]
            .map_or(true, |t| now.saturating_sub(t) > self.config.clap_cooldown_ms);
        if !ready {
            return None;
        }
        let thumb = self.config.thumb_extension;
        if !is_open_palm(&left.landmarks, thumb) || !is_open_palm(&right.landmarks, thumb) {
            return None;
        }

        self.last_clap_ms[pair.index()] = Some(now);
        debug!("Clap on {}, distance={:.3}", pair.as_str(), dist);
        Some(GestureEvent::Gesture(Gesture {
            kind: GestureType::Clap,
            origin: GestureOrigin::Pair(pair),
            payload: GesturePayload::Pair {
                left: Box::new(left.screen_landmarks),
                right: Box::new(right.screen_landmarks),
            },
            timestamp_ms: now,
            player: pair.player(),
            velocity: Velocity::default(),
        }))
    }

    /// Snapshot of a tracked slot, `None` while the slot is empty.
    pub fn hand_snapshot(&self, slot: HandSlot) -> Option<&HandSnapshot> {
        self.slots[slot.index()].snapshot.as_ref()
    }

    /// All tracked slots with their snapshots.
    pub fn tracked_hands(&self) -> Vec<(HandSlot, HandSnapshot)> {
        HandSlot::ALL
            .iter()
            .filter_map(|slot| self.hand_snapshot(*slot).map(|s| (*slot, *s)))
            .collect()
    }

    pub fn pinch_state(&self, slot: HandSlot) -> PinchState {
        self.slots[slot.index()].pinch
    }

    /// Velocity between the two most recent samples of a slot.
    pub fn velocity(&self, slot: HandSlot) -> Velocity {
        self.slots[slot.index()].history.velocity()
    }

    /// Whether a slot can fire a discrete gesture right now.
    pub fn is_ready(&self, slot: HandSlot) -> bool {
        let now = self.clock.now_ms();
        self.slots[slot.index()]
            .last_fired_ms
            .map_or(true, |t| now.saturating_sub(t) > self.config.gesture_cooldown_ms)
    }

    /// Hands present in the last processed frame.
    pub fn hand_count(&self) -> usize {
        self.hand_count
    }

    /// Abandon all state without emitting events, as when tracking stops.
    pub fn reset(&mut self) {
        let history_len = self.config.history_len;
        self.slots = std::array::from_fn(|_| SlotState::new(history_len));
        self.last_clap_ms = [None; 3];
        self.had_hands = false;
        self.hand_count = 0;
    }

    /// Generate s-expression for status reporting.
    pub fn status_sexp(&self) -> String {
        let mut s = format!(
            "(:enabled {} :hands {}",
            if self.config.enabled { "t" } else { "nil" },
            self.hand_count,
        );
        for (slot, snap) in self.tracked_hands() {
            s.push_str(&format!(
                " :{} (:shape {} :speed {:.0} :pinching {})",
                slot.as_str(),
                snap.shape.as_str(),
                snap.velocity.speed,
                if snap.is_pinching { "t" } else { "nil" },
            ));
        }
        s.push(')');
        s
    }

    /// Generate s-expression for the active configuration.
    pub fn config_sexp(&self) -> String {
        format!(
            "(:enabled {} :pinch-threshold {:.3} :thumb-extension {:.3} :cooldown-ms {} :clap-cooldown-ms {} :clap-distance {:.2} :min-speed {:.0} :chop-speed {:.0} :punch-speed {:.0} :slap-speed {:.0})",
            if self.config.enabled { "t" } else { "nil" },
            self.config.pinch_threshold,
            self.config.thumb_extension,
            self.config.gesture_cooldown_ms,
            self.config.clap_cooldown_ms,
            self.config.clap_distance,
            self.config.min_speed,
            self.config.chop_speed,
            self.config.punch_speed,
            self.config.slap_speed,
        )
    }
}

impl Default for GestureClassifier {
    fn default() -> Self {
        Self::new(GestureConfig::default())
    }
}

/// Close an active pinch, returning the end event with its start position.
fn end_pinch(slot: HandSlot, pinch: &mut PinchState) -> Option<GestureEvent> {
    let ended = match (pinch.active, pinch.start_pos) {
        (true, Some(start)) => Some(GestureEvent::PinchEnd { slot, start }),
        _ => None,
    };
    *pinch = PinchState::default();
    ended
}

// ── Test helpers ───────────────────────────────────────────

#[cfg(test)]
use super::hand_tracking::{HandTracker, Handedness, TrackingConfig, TrackingMode};
#[cfg(test)]
use super::synthetic::{blade, fist, open_hand, pinch, raw_hand};
#[cfg(test)]
use crate::clock::ManualClock;
#[cfg(test)]
use crate::geometry::Point3;

#[cfg(test)]
fn make_classifier() -> (GestureClassifier, ManualClock, HandTracker) {
    let clock = ManualClock::new(1_000);
    let classifier = GestureClassifier::with_clock(GestureConfig::default(), Box::new(clock.clone()));
    (classifier, clock, HandTracker::default())
}

/// One user-left hand (provider label "Right") in solo mode.
#[cfg(test)]
fn left_frame(tracker: &mut HandTracker, lm: Landmarks) -> Vec<HandSample> {
    tracker.map_frame(&[raw_hand(lm, Handedness::Right)])
}

#[cfg(test)]
fn gestures(events: &[GestureEvent]) -> Vec<GestureType> {
    events
        .iter()
        .filter_map(|e| match e {
            GestureEvent::Gesture(g) => Some(g.kind),
            _ => None,
        })
        .collect()
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fist_vs_open_palm_shape() {
        let t = GestureConfig::default().thumb_extension;
        let fist = fist(0.5, 0.5);
        assert_eq!(extended_fingers(&fist, t), [false; 5]);
        assert!(is_fist(&fist, t));
        assert!(!is_open_palm(&fist, t));

        let open = open_hand(0.5, 0.5);
        assert_eq!(extended_fingers(&open, t), [true; 5]);
        assert!(is_open_palm(&open, t));
        assert!(!is_fist(&open, t));

        let blade = blade(0.5, 0.5);
        assert!(!is_fist(&blade, t));
        assert!(!is_open_palm(&blade, t));
    }

    #[test]
    fn test_pinch_finger_fallback_to_middle() {
        let config = GestureConfig::default();
        assert_eq!(
            pinch_finger(&pinch(0.5, 0.5), &config),
            Some(HandLandmark::IndexTip)
        );
        assert_eq!(pinch_finger(&open_hand(0.5, 0.5), &config), None);

        // Thumb 0.09 from the middle tip: outside 0.08, inside 0.096.
        let mut lm = open_hand(0.5, 0.5);
        let middle = lm[HandLandmark::MiddleTip.index()];
        lm[HandLandmark::ThumbTip.index()] = Point3::new(middle.x, middle.y + 0.09, 0.0);
        assert_eq!(pinch_finger(&lm, &config), Some(HandLandmark::MiddleTip));
    }

    #[test]
    fn test_stationary_hand_fires_nothing() {
        let (mut c, clock, mut tracker) = make_classifier();
        for _ in 0..5 {
            let frame = left_frame(&mut tracker, fist(0.5, 0.5));
            let events = c.process_frame(&frame);
            assert!(gestures(&events).is_empty(), "got {:?}", events);
            clock.advance(50);
        }
        let snap = c.hand_snapshot(HandSlot::Left).copied();
        assert_eq!(snap.map(|s| s.shape), Some(HandShape::Fist));
    }

    #[test]
    fn test_fast_fist_fires_punch() {
        let (mut c, clock, mut tracker) = make_classifier();
        c.process_frame(&left_frame(&mut tracker, fist(0.5, 0.5)));
        clock.advance(50);
        // 0.02 normalized * 1280 px over 50 ms = 512 px/s
        let events = c.process_frame(&left_frame(&mut tracker, fist(0.48, 0.5)));
        assert_eq!(gestures(&events), vec![GestureType::Punch]);
        let v = c.velocity(HandSlot::Left);
        assert!((v.speed - 512.0).abs() < 1e-6, "speed {}", v.speed);
        assert!(v.x > 0.0, "mirrored motion should be +x on screen");
    }

    #[test]
    fn test_fast_blade_and_fast_open_palm_both_chop() {
        let (mut c, clock, mut tracker) = make_classifier();
        c.process_frame(&left_frame(&mut tracker, blade(0.5, 0.5)));
        clock.advance(50);
        let events = c.process_frame(&left_frame(&mut tracker, blade(0.5, 0.55)));
        assert_eq!(gestures(&events), vec![GestureType::Chop]);

        clock.advance(350);
        c.process_frame(&left_frame(&mut tracker, open_hand(0.5, 0.5)));
        clock.advance(50);
        // 0.04 * 1280 / 0.05 s = 1024 px/s: chop wins over slap
        let events = c.process_frame(&left_frame(&mut tracker, open_hand(0.46, 0.5)));
        assert_eq!(gestures(&events), vec![GestureType::Chop]);
    }

    #[test]
    fn test_open_palm_slaps_when_chop_threshold_is_higher() {
        let clock = ManualClock::new(1_000);
        let config = GestureConfig {
            chop_speed: 600.0,
            ..Default::default()
        };
        let mut c = GestureClassifier::with_clock(config, Box::new(clock.clone()));
        let mut tracker = HandTracker::default();
        c.process_frame(&left_frame(&mut tracker, open_hand(0.5, 0.5)));
        clock.advance(50);
        // 512 px/s: over slap speed, under the raised chop speed
        let events = c.process_frame(&left_frame(&mut tracker, open_hand(0.48, 0.5)));
        assert_eq!(gestures(&events), vec![GestureType::Slap]);

        // A blade at the same speed is under the chop threshold.
        clock.advance(350);
        c.process_frame(&left_frame(&mut tracker, blade(0.5, 0.5)));
        clock.advance(50);
        let events = c.process_frame(&left_frame(&mut tracker, blade(0.48, 0.5)));
        assert!(gestures(&events).is_empty(), "got {:?}", events);
    }

    #[test]
    fn test_slow_motion_below_floor() {
        let (mut c, clock, mut tracker) = make_classifier();
        c.process_frame(&left_frame(&mut tracker, fist(0.5, 0.5)));
        clock.advance(100);
        // 0.01 * 1280 / 0.1 s = 128 px/s, under the 150 floor
        let events = c.process_frame(&left_frame(&mut tracker, fist(0.49, 0.5)));
        assert!(gestures(&events).is_empty());
    }

    #[test]
    fn test_fist_between_floor_and_punch_speed_fires_nothing() {
        let (mut c, clock, mut tracker) = make_classifier();
        c.process_frame(&left_frame(&mut tracker, fist(0.5, 0.5)));
        clock.advance(100);
        // 0.019 * 1280 / 0.1 s = 243.2 px/s: above the floor, under punch speed
        let events = c.process_frame(&left_frame(&mut tracker, fist(0.481, 0.5)));
        assert!(gestures(&events).is_empty(), "got {:?}", events);
    }

    #[test]
    fn test_cooldown_blocks_then_releases() {
        let (mut c, clock, mut tracker) = make_classifier();
        let mut x = 0.6;
        c.process_frame(&left_frame(&mut tracker, blade(x, 0.5)));
        clock.advance(50);
        x -= 0.02;
        let events = c.process_frame(&left_frame(&mut tracker, blade(x, 0.5)));
        assert_eq!(gestures(&events), vec![GestureType::Chop]);
        assert!(!c.is_ready(HandSlot::Left));

        // Fast fist frames inside the 300 ms window stay silent.
        for _ in 0..5 {
            clock.advance(50);
            x -= 0.02;
            let events = c.process_frame(&left_frame(&mut tracker, fist(x, 0.5)));
            assert!(gestures(&events).is_empty(), "cooldown violated: {:?}", events);
        }

        // Exactly 300 ms after the chop: still cooling.
        clock.advance(50);
        x -= 0.02;
        let events = c.process_frame(&left_frame(&mut tracker, fist(x, 0.5)));
        assert!(gestures(&events).is_empty(), "fired at the boundary: {:?}", events);

        clock.advance(50);
        x -= 0.02;
        let events = c.process_frame(&left_frame(&mut tracker, fist(x, 0.5)));
        assert_eq!(gestures(&events), vec![GestureType::Punch]);
    }

    #[test]
    fn test_cooldown_is_per_slot() {
        let (mut c, clock, mut tracker) = make_classifier();
        let frame = |tracker: &mut HandTracker, lx: f64, rx: f64| {
            tracker.map_frame(&[
                raw_hand(fist(lx, 0.3), Handedness::Right),
                raw_hand(fist(rx, 0.7), Handedness::Left),
            ])
        };
        c.process_frame(&frame(&mut tracker, 0.8, 0.2));
        clock.advance(50);
        // Only the left hand moves.
        let events = c.process_frame(&frame(&mut tracker, 0.78, 0.2));
        assert_eq!(gestures(&events), vec![GestureType::Punch]);
        clock.advance(50);
        // Now the right hand moves; its slot is still ready.
        let events = c.process_frame(&frame(&mut tracker, 0.76, 0.18));
        let fired: Vec<GestureOrigin> = events
            .iter()
            .filter_map(|e| match e {
                GestureEvent::Gesture(g) => Some(g.origin),
                _ => None,
            })
            .collect();
        assert_eq!(fired, vec![GestureOrigin::Slot(HandSlot::Right)]);
    }

    #[test]
    fn test_pinch_lifecycle_preserves_start() {
        let (mut c, clock, mut tracker) = make_classifier();
        let events = c.process_frame(&left_frame(&mut tracker, pinch(0.5, 0.5)));
        let start = events
            .iter()
            .find_map(|e| match e {
                GestureEvent::PinchStart { position, .. } => Some(*position),
                _ => None,
            })
            .expect("pinch start");
        assert!(c.pinch_state(HandSlot::Left).active);

        let mut moves = 0;
        for i in 1..=4 {
            clock.advance(100);
            let lm = pinch(0.5 - 0.01 * i as f64, 0.5);
            for e in c.process_frame(&left_frame(&mut tracker, lm)) {
                if let GestureEvent::PinchMove { start: s, position, .. } = e {
                    assert_eq!(s, start);
                    assert_ne!(position, start);
                    moves += 1;
                }
            }
        }
        assert_eq!(moves, 4);

        clock.advance(100);
        let events = c.process_frame(&left_frame(&mut tracker, open_hand(0.4, 0.5)));
        assert!(
            events.contains(&GestureEvent::PinchEnd {
                slot: HandSlot::Left,
                start
            }),
            "expected end at start position, got {:?}",
            events
        );
        assert!(!c.pinch_state(HandSlot::Left).active);
    }

    #[test]
    fn test_pinch_force_ended_when_hand_lost() {
        let (mut c, clock, mut tracker) = make_classifier();
        let events = c.process_frame(&left_frame(&mut tracker, pinch(0.5, 0.5)));
        assert!(events.contains(&GestureEvent::HandsDetected));
        clock.advance(30);

        let events = c.process_frame(&[]);
        assert!(events
            .iter()
            .any(|e| matches!(e, GestureEvent::PinchEnd { slot: HandSlot::Left, .. })));
        assert!(events.contains(&GestureEvent::HandsLost));
        assert!(c.hand_snapshot(HandSlot::Left).is_none());
        assert_eq!(c.pinch_state(HandSlot::Left), PinchState::default());

        // No second end event on the next empty frame.
        let events = c.process_frame(&[]);
        assert!(events.is_empty(), "got {:?}", events);
    }

    #[test]
    fn test_pinching_hand_can_still_punch_independently() {
        let (mut c, clock, mut tracker) = make_classifier();
        // Curled fingers with the thumb resting on the index tip.
        let pinched_fist = |cx: f64| {
            let mut lm = fist(cx, 0.5);
            let index = lm[HandLandmark::IndexTip.index()];
            lm[HandLandmark::ThumbTip.index()] = Point3::new(index.x - 0.01, index.y, 0.0);
            lm
        };
        c.process_frame(&left_frame(&mut tracker, pinched_fist(0.5)));
        clock.advance(50);
        let events = c.process_frame(&left_frame(&mut tracker, pinched_fist(0.47)));
        assert_eq!(gestures(&events), vec![GestureType::Punch]);
        assert!(events
            .iter()
            .any(|e| matches!(e, GestureEvent::PinchMove { .. })));
    }

    #[test]
    fn test_clap_detection_and_cooldown() {
        let (mut c, clock, mut tracker) = make_classifier();
        let clap_frame = |tracker: &mut HandTracker| {
            tracker.map_frame(&[
                raw_hand(open_hand(0.45, 0.5), Handedness::Right),
                raw_hand(open_hand(0.55, 0.5), Handedness::Left),
            ])
        };
        let events = c.process_frame(&clap_frame(&mut tracker));
        let claps: Vec<&Gesture> = events
            .iter()
            .filter_map(|e| match e {
                GestureEvent::Gesture(g) if g.kind == GestureType::Clap => Some(g),
                _ => None,
            })
            .collect();
        assert_eq!(claps.len(), 1);
        assert_eq!(claps[0].origin, GestureOrigin::Pair(SlotPair::Solo));
        assert!(claps[0].player.is_none());

        clock.advance(500);
        let events = c.process_frame(&clap_frame(&mut tracker));
        assert!(!gestures(&events).contains(&GestureType::Clap));

        // Exactly 900 ms: still cooling.
        clock.advance(400);
        let events = c.process_frame(&clap_frame(&mut tracker));
        assert!(!gestures(&events).contains(&GestureType::Clap));

        clock.advance(30);
        let events = c.process_frame(&clap_frame(&mut tracker));
        assert!(gestures(&events).contains(&GestureType::Clap));
    }

    #[test]
    fn test_no_clap_when_far_apart_or_fists() {
        let (mut c, _clock, mut tracker) = make_classifier();
        let far = tracker.map_frame(&[
            raw_hand(open_hand(0.2, 0.5), Handedness::Right),
            raw_hand(open_hand(0.8, 0.5), Handedness::Left),
        ]);
        assert!(!gestures(&c.process_frame(&far)).contains(&GestureType::Clap));

        let fists = tracker.map_frame(&[
            raw_hand(fist(0.45, 0.5), Handedness::Right),
            raw_hand(fist(0.55, 0.5), Handedness::Left),
        ]);
        assert!(!gestures(&c.process_frame(&fists)).contains(&GestureType::Clap));
    }

    #[test]
    fn test_coop_clap_per_player() {
        let clock = ManualClock::new(0);
        let mut c = GestureClassifier::with_clock(GestureConfig::default(), Box::new(clock.clone()));
        let mut tracker = HandTracker::new(TrackingConfig {
            mode: TrackingMode::Coop,
            ..Default::default()
        });
        // Normalized x near 0.85 lands on the left screen half: player one.
        let frame = tracker.map_frame(&[
            raw_hand(open_hand(0.80, 0.5), Handedness::Right),
            raw_hand(open_hand(0.90, 0.5), Handedness::Left),
            raw_hand(open_hand(0.10, 0.5), Handedness::Right),
        ]);
        let events = c.process_frame(&frame);
        let claps: Vec<(GestureOrigin, Option<PlayerId>)> = events
            .iter()
            .filter_map(|e| match e {
                GestureEvent::Gesture(g) if g.kind == GestureType::Clap => Some((g.origin, g.player)),
                _ => None,
            })
            .collect();
        assert_eq!(
            claps,
            vec![(
                GestureOrigin::Pair(SlotPair::Player(PlayerId::One)),
                Some(PlayerId::One)
            )]
        );
    }

    #[test]
    fn test_gesture_palm_center_payload() {
        let (mut c, clock, mut tracker) = make_classifier();
        c.process_frame(&left_frame(&mut tracker, fist(0.5, 0.5)));
        clock.advance(50);
        let frame = left_frame(&mut tracker, fist(0.47, 0.5));
        let expected = frame[0].screen_palm_center();
        let events = c.process_frame(&frame);
        let g = events
            .iter()
            .find_map(|e| match e {
                GestureEvent::Gesture(g) => Some(g.clone()),
                _ => None,
            })
            .expect("gesture");
        assert_eq!(g.palm_center(), expected);
        assert_eq!(g.timestamp_ms, 1_050);
    }

    #[test]
    fn test_reset_abandons_state_silently() {
        let (mut c, _clock, mut tracker) = make_classifier();
        c.process_frame(&left_frame(&mut tracker, pinch(0.5, 0.5)));
        assert!(c.pinch_state(HandSlot::Left).active);
        c.reset();
        assert!(!c.pinch_state(HandSlot::Left).active);
        assert_eq!(c.hand_count(), 0);
        // Next empty frame emits nothing: no pinch end, no hands lost.
        assert!(c.process_frame(&[]).is_empty());
    }

    #[test]
    fn test_disabled_no_events() {
        let (mut c, _clock, mut tracker) = make_classifier();
        c.config.enabled = false;
        let events = c.process_frame(&left_frame(&mut tracker, pinch(0.5, 0.5)));
        assert!(events.is_empty());
    }

    #[test]
    fn test_disabling_mid_pinch_releases_slots() {
        let (mut c, clock, mut tracker) = make_classifier();
        c.process_frame(&left_frame(&mut tracker, pinch(0.5, 0.5)));
        assert!(c.pinch_state(HandSlot::Left).active);
        assert!(c.hand_snapshot(HandSlot::Left).is_some());

        c.config.enabled = false;
        clock.advance(30);
        let events = c.process_frame(&left_frame(&mut tracker, pinch(0.49, 0.5)));
        assert!(events.is_empty(), "got {:?}", events);
        assert_eq!(c.pinch_state(HandSlot::Left), PinchState::default());
        assert!(c.tracked_hands().is_empty());
        assert_eq!(c.hand_count(), 0);

        // Re-enabled: the pinch starts fresh.
        c.config.enabled = true;
        clock.advance(30);
        let events = c.process_frame(&left_frame(&mut tracker, pinch(0.48, 0.5)));
        assert!(events.contains(&GestureEvent::HandsDetected));
        assert!(events
            .iter()
            .any(|e| matches!(e, GestureEvent::PinchStart { slot: HandSlot::Left, .. })));
    }

    #[test]
    fn test_status_and_config_sexp() {
        let (mut c, _clock, mut tracker) = make_classifier();
        c.process_frame(&left_frame(&mut tracker, fist(0.5, 0.5)));
        let status = c.status_sexp();
        assert!(status.contains(":enabled t"));
        assert!(status.contains(":hands 1"));
        assert!(status.contains(":left (:shape fist"));
        let config = c.config_sexp();
        assert!(config.contains(":pinch-threshold 0.080"));
        assert!(config.contains(":cooldown-ms 300"));
        assert!(config.contains(":clap-cooldown-ms 900"));
    }

    #[test]
    fn test_gesture_type_as_str() {
        assert_eq!(GestureType::Chop.as_str(), "chop");
        assert_eq!(GestureType::Punch.as_str(), "punch");
        assert_eq!(GestureType::Slap.as_str(), "slap");
        assert_eq!(GestureType::Clap.as_str(), "clap");
        assert_eq!(GestureOrigin::Pair(SlotPair::Solo).as_str(), "both");
    }
}
