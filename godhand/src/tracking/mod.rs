//! Hand tracking subsystem: landmark mapping and gesture recognition.
//!
//! Provides:
//! - `hand_tracking`: landmark indices, screen mapping, slot assignment
//! - `gesture`: cooldown-gated combat gestures, pinch drags, claps
//! - `synthetic`: scripted hand poses
//!
//! The landmark provider itself (camera capture, model inference) is
//! external; this module starts from per-frame `RawHand` detections.

pub mod gesture;
pub mod hand_tracking;
pub mod synthetic;

pub use gesture::{
    Gesture, GestureClassifier, GestureConfig, GestureEvent, GestureOrigin, GesturePayload,
    GestureType, HandShape, HandSnapshot, PinchState,
};
pub use hand_tracking::{
    palm_center, Hand, HandLandmark, HandSample, HandSlot, HandTracker, Handedness, Landmarks,
    PlayerId, RawHand, SlotPair, TrackingConfig, TrackingMode, LANDMARK_COUNT,
};
