//! Hand landmark types
//!
//! A [`KeypointSnapshot`] is what the pose estimator hands over for one
//! video frame. It is consumed once and dropped; hands carry no identity
//! from one frame to the next.

use serde::{Deserialize, Serialize};

/// Number of landmarks in a complete hand
pub const LANDMARKS_PER_HAND: usize = 21;

pub const WRIST: usize = 0;
pub const THUMB_CMC: usize = 1;
pub const THUMB_MCP: usize = 2;
pub const THUMB_IP: usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_PIP: usize = 6;
pub const INDEX_DIP: usize = 7;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_DIP: usize = 11;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP: usize = 13;
pub const RING_PIP: usize = 14;
pub const RING_DIP: usize = 15;
pub const RING_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_PIP: usize = 18;
pub const PINKY_DIP: usize = 19;
pub const PINKY_TIP: usize = 20;

/// One tracked point in frame coordinates (origin top-left, y grows down)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    /// Relative depth, when the estimator provides it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f32>,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: None }
    }

    pub fn with_depth(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z: Some(z) }
    }
}

/// Landmarks of one detected hand, in fixed index order
///
/// The estimator may deliver a partial set; completeness is checked by the
/// classifier, not here.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Hand {
    pub keypoints: Vec<Landmark>,
}

impl Hand {
    pub fn new(keypoints: Vec<Landmark>) -> Self {
        Self { keypoints }
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.keypoints.len() >= LANDMARKS_PER_HAND
    }

    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.keypoints.get(index)
    }
}

/// All hands detected in a single frame
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct KeypointSnapshot {
    #[serde(default)]
    pub hands: Vec<Hand>,
}

impl KeypointSnapshot {
    pub fn new(hands: Vec<Hand>) -> Self {
        Self { hands }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_from_estimator_json() {
        let json = r#"{"hands":[{"keypoints":[{"x":1.5,"y":2.0,"z":-0.1,"name":"wrist"},{"x":3.0,"y":4.0}]}]}"#;
        let snapshot: KeypointSnapshot = serde_json::from_str(json).expect("valid snapshot");

        assert_eq!(snapshot.hands.len(), 1);
        let hand = &snapshot.hands[0];
        assert_eq!(hand.len(), 2);
        assert_eq!(hand.keypoints[0], Landmark::with_depth(1.5, 2.0, -0.1));
        assert_eq!(hand.keypoints[1].z, None);
        assert!(!hand.is_complete());
    }

    #[test]
    fn test_snapshot_without_hands() {
        let snapshot: KeypointSnapshot = serde_json::from_str("{}").expect("valid snapshot");
        assert!(snapshot.hands.is_empty());
    }

    #[test]
    fn test_complete_hand() {
        let hand = Hand::new(vec![Landmark::default(); LANDMARKS_PER_HAND]);
        assert!(hand.is_complete());
        assert!(hand.get(PINKY_TIP).is_some());
        assert!(hand.get(LANDMARKS_PER_HAND).is_none());
    }
}
