//! Hand landmark data structures and per-frame slot assignment.
//!
//! Models the 21 landmarks per hand delivered by the landmark provider,
//! maps them into mirrored screen space, remaps the provider's handedness
//! label to the user's own hand, and assigns each detected hand to a
//! gesture slot (per player in co-op mode).

use tracing::debug;

use crate::geometry::{Point2, Point3};

// ── Landmark definitions ───────────────────────────────────

/// The 21 hand landmarks reported by the provider, in index order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandLandmark {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexMcp,
    IndexPip,
    IndexDip,
    IndexTip,
    MiddleMcp,
    MiddlePip,
    MiddleDip,
    MiddleTip,
    RingMcp,
    RingPip,
    RingDip,
    RingTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

/// Total number of landmarks per hand.
pub const LANDMARK_COUNT: usize = 21;

/// One hand's landmark array.
pub type Landmarks = [Point3; LANDMARK_COUNT];

impl HandLandmark {
    /// Convert landmark enum to array index (0-20).
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wrist => "wrist",
            Self::ThumbCmc => "thumb-cmc",
            Self::ThumbMcp => "thumb-mcp",
            Self::ThumbIp => "thumb-ip",
            Self::ThumbTip => "thumb-tip",
            Self::IndexMcp => "index-mcp",
            Self::IndexPip => "index-pip",
            Self::IndexDip => "index-dip",
            Self::IndexTip => "index-tip",
            Self::MiddleMcp => "middle-mcp",
            Self::MiddlePip => "middle-pip",
            Self::MiddleDip => "middle-dip",
            Self::MiddleTip => "middle-tip",
            Self::RingMcp => "ring-mcp",
            Self::RingPip => "ring-pip",
            Self::RingDip => "ring-dip",
            Self::RingTip => "ring-tip",
            Self::PinkyMcp => "pinky-mcp",
            Self::PinkyPip => "pinky-pip",
            Self::PinkyDip => "pinky-dip",
            Self::PinkyTip => "pinky-tip",
        }
    }

    /// Fingertip landmarks, thumb first.
    pub fn fingertips() -> [HandLandmark; 5] {
        [
            Self::ThumbTip,
            Self::IndexTip,
            Self::MiddleTip,
            Self::RingTip,
            Self::PinkyTip,
        ]
    }

    /// Mid-joint each non-thumb fingertip is compared against for the
    /// upright extension test.
    pub fn extension_reference(&self) -> Option<HandLandmark> {
        match self {
            Self::IndexTip => Some(Self::IndexPip),
            Self::MiddleTip => Some(Self::MiddlePip),
            Self::RingTip => Some(Self::RingPip),
            Self::PinkyTip => Some(Self::PinkyPip),
            _ => None,
        }
    }
}

/// Palm center: midpoint of the wrist and the middle-finger base.
pub fn palm_center(landmarks: &Landmarks) -> Point2 {
    let wrist = landmarks[HandLandmark::Wrist.index()].xy();
    let middle = landmarks[HandLandmark::MiddleMcp.index()].xy();
    wrist.midpoint(&middle)
}

// ── Hands, players, slots ──────────────────────────────────

/// Handedness label exactly as the provider reports it.
///
/// The provider labels hands as seen by the camera, which is mirrored
/// relative to the user: its `Left` is the user's right hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    /// The user's own hand for this provider label.
    pub fn user_hand(&self) -> Hand {
        match self {
            Self::Left => Hand::Right,
            Self::Right => Hand::Left,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Left" | "left" => Some(Self::Left),
            "Right" | "right" => Some(Self::Right),
            _ => None,
        }
    }
}

/// Which of the user's hands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hand {
    Left,
    Right,
}

impl Hand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

/// Player in two-player mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerId {
    One,
    Two,
}

/// Logical hand identity whose cooldown and pinch state persist across
/// frames, independent of which physical detection fills it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandSlot {
    Left,
    Right,
    P1Left,
    P1Right,
    P2Left,
    P2Right,
}

/// Number of distinct slots.
pub const SLOT_COUNT: usize = 6;

impl HandSlot {
    pub const ALL: [HandSlot; SLOT_COUNT] = [
        Self::Left,
        Self::Right,
        Self::P1Left,
        Self::P1Right,
        Self::P2Left,
        Self::P2Right,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::P1Left => "p1left",
            Self::P1Right => "p1right",
            Self::P2Left => "p2left",
            Self::P2Right => "p2right",
        }
    }

    /// Slot for a hand, with an optional owning player.
    pub fn for_hand(hand: Hand, player: Option<PlayerId>) -> Self {
        match (player, hand) {
            (None, Hand::Left) => Self::Left,
            (None, Hand::Right) => Self::Right,
            (Some(PlayerId::One), Hand::Left) => Self::P1Left,
            (Some(PlayerId::One), Hand::Right) => Self::P1Right,
            (Some(PlayerId::Two), Hand::Left) => Self::P2Left,
            (Some(PlayerId::Two), Hand::Right) => Self::P2Right,
        }
    }

    pub fn hand(&self) -> Hand {
        match self {
            Self::Left | Self::P1Left | Self::P2Left => Hand::Left,
            Self::Right | Self::P1Right | Self::P2Right => Hand::Right,
        }
    }

    pub fn player(&self) -> Option<PlayerId> {
        match self {
            Self::Left | Self::Right => None,
            Self::P1Left | Self::P1Right => Some(PlayerId::One),
            Self::P2Left | Self::P2Right => Some(PlayerId::Two),
        }
    }
}

/// A left+right slot pair evaluated together for claps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotPair {
    Solo,
    Player(PlayerId),
}

impl SlotPair {
    pub const ALL: [SlotPair; 3] = [
        SlotPair::Solo,
        SlotPair::Player(PlayerId::One),
        SlotPair::Player(PlayerId::Two),
    ];

    pub fn slots(&self) -> (HandSlot, HandSlot) {
        match self {
            Self::Solo => (HandSlot::Left, HandSlot::Right),
            Self::Player(PlayerId::One) => (HandSlot::P1Left, HandSlot::P1Right),
            Self::Player(PlayerId::Two) => (HandSlot::P2Left, HandSlot::P2Right),
        }
    }

    pub fn player(&self) -> Option<PlayerId> {
        match self {
            Self::Solo => None,
            Self::Player(p) => Some(*p),
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Self::Solo => 0,
            Self::Player(PlayerId::One) => 1,
            Self::Player(PlayerId::Two) => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Solo => "both",
            Self::Player(PlayerId::One) => "p1both",
            Self::Player(PlayerId::Two) => "p2both",
        }
    }
}

// ── Samples ────────────────────────────────────────────────

/// One detected hand as the provider delivers it.
#[derive(Debug, Clone)]
pub struct RawHand {
    /// Normalized landmarks, roughly in [0, 1].
    pub landmarks: Vec<Point3>,
    /// Provider handedness label (camera-mirrored).
    pub handedness: Handedness,
    /// Provider detection score (0.0-1.0).
    pub score: f64,
}

/// One hand's pose in a single frame, after mapping.
#[derive(Debug, Clone)]
pub struct HandSample {
    /// Slot this detection fills.
    pub slot: HandSlot,
    /// Provider handedness label.
    pub handedness: Handedness,
    /// Owning player in co-op mode.
    pub player: Option<PlayerId>,
    /// Normalized landmarks, for scale-invariant shape tests.
    pub landmarks: Landmarks,
    /// Landmarks mirrored horizontally and scaled to the viewport.
    pub screen_landmarks: Landmarks,
}

impl HandSample {
    /// Palm center in screen space.
    pub fn screen_palm_center(&self) -> Point2 {
        palm_center(&self.screen_landmarks)
    }
}

// ── Config ─────────────────────────────────────────────────

/// How many hands a frame may carry and how they map to slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingMode {
    /// One player, up to two hands.
    Solo,
    /// Two players, up to four hands, split by screen half.
    Coop,
}

impl TrackingMode {
    pub fn max_hands(&self) -> usize {
        match self {
            Self::Solo => 2,
            Self::Coop => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Solo => "solo",
            Self::Coop => "coop",
        }
    }
}

/// Configuration for hand tracking.
#[derive(Debug, Clone)]
pub struct TrackingConfig {
    pub mode: TrackingMode,
    /// Viewport width in pixels.
    pub viewport_width: f64,
    /// Viewport height in pixels.
    pub viewport_height: f64,
    /// Minimum provider score to accept a detection.
    pub min_confidence: f64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            mode: TrackingMode::Solo,
            viewport_width: 1280.0,
            viewport_height: 720.0,
            min_confidence: 0.7,
        }
    }
}

// ── Tracker ────────────────────────────────────────────────

/// Maps raw provider output into slot-assigned `HandSample`s.
pub struct HandTracker {
    pub config: TrackingConfig,
    /// Hands accepted in the last frame.
    hand_count: usize,
    /// Detections dropped (bad landmark count or low score) since start.
    rejected: u64,
}

impl HandTracker {
    pub fn new(config: TrackingConfig) -> Self {
        Self {
            config,
            hand_count: 0,
            rejected: 0,
        }
    }

    /// Mirror and scale normalized landmarks to the viewport.
    pub fn to_screen(&self, landmarks: &Landmarks) -> Landmarks {
        let mut out = [Point3::default(); LANDMARK_COUNT];
        for (dst, lm) in out.iter_mut().zip(landmarks.iter()) {
            *dst = Point3::new(
                (1.0 - lm.x) * self.config.viewport_width,
                lm.y * self.config.viewport_height,
                lm.z,
            );
        }
        out
    }

    /// Convert one frame of provider output into samples.
    ///
    /// At most `mode.max_hands()` detections are considered.  If two
    /// detections resolve to the same slot, the later one wins.
    pub fn map_frame(&mut self, raw: &[RawHand]) -> Vec<HandSample> {
        let mut by_slot: [Option<HandSample>; SLOT_COUNT] = Default::default();

        for hand in raw.iter().take(self.config.mode.max_hands()) {
            if hand.landmarks.len() != LANDMARK_COUNT {
                debug!(
                    "Hand tracking: expected {} landmarks, got {}",
                    LANDMARK_COUNT,
                    hand.landmarks.len(),
                );
                self.rejected += 1;
                continue;
            }
            if hand.score < self.config.min_confidence {
                self.rejected += 1;
                continue;
            }

            let mut landmarks = [Point3::default(); LANDMARK_COUNT];
            landmarks.copy_from_slice(&hand.landmarks);
            let screen_landmarks = self.to_screen(&landmarks);

            let player = match self.config.mode {
                TrackingMode::Solo => None,
                TrackingMode::Coop => {
                    let x = palm_center(&screen_landmarks).x / self.config.viewport_width;
                    Some(if x < 0.5 { PlayerId::One } else { PlayerId::Two })
                }
            };
            let slot = HandSlot::for_hand(hand.handedness.user_hand(), player);

            by_slot[slot.index()] = Some(HandSample {
                slot,
                handedness: hand.handedness,
                player,
                landmarks,
                screen_landmarks,
            });
        }

        let samples: Vec<HandSample> = by_slot.into_iter().flatten().collect();
        self.hand_count = samples.len();
        samples
    }

    /// Hands accepted in the most recent frame.
    pub fn hand_count(&self) -> usize {
        self.hand_count
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    pub fn reset(&mut self) {
        self.hand_count = 0;
    }

    /// Generate s-expression for status reporting.
    pub fn status_sexp(&self) -> String {
        format!(
            "(:mode {} :viewport ({:.0} {:.0}) :min-confidence {:.2} :hands {} :rejected {})",
            self.config.mode.as_str(),
            self.config.viewport_width,
            self.config.viewport_height,
            self.config.min_confidence,
            self.hand_count,
            self.rejected,
        )
    }
}

impl Default for HandTracker {
    fn default() -> Self {
        Self::new(TrackingConfig::default())
    }
}

// ── Tests ──────────────────────────────────────────────────
