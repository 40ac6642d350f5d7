//! Gesture classifier
//!
//! Reduces one hand's landmarks to a [`GestureVector`]: which of the five
//! digits are extended. Pure and frame-local; nothing is carried between
//! calls.

use std::fmt;
use std::ops::Index;
use thiserror::Error;

use crate::landmarks::{
    Hand, INDEX_MCP, INDEX_TIP, LANDMARKS_PER_HAND, MIDDLE_MCP, MIDDLE_TIP, PINKY_MCP, PINKY_TIP,
    RING_MCP, RING_TIP, THUMB_MCP, THUMB_TIP,
};

/// Tip landmark index per digit, thumb first
pub const FINGER_TIPS: [usize; 5] = [THUMB_TIP, INDEX_TIP, MIDDLE_TIP, RING_TIP, PINKY_TIP];

/// Base landmark index per digit, thumb first
pub const FINGER_BASES: [usize; 5] = [THUMB_MCP, INDEX_MCP, MIDDLE_MCP, RING_MCP, PINKY_MCP];

/// Errors raised while classifying a hand
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassifyError {
    #[error("Incomplete hand: {found} of {expected} landmarks")]
    IncompleteHand { found: usize, expected: usize },
}

/// The five digits in wire order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Digit {
    Thumb = 0,
    Index = 1,
    Middle = 2,
    Ring = 3,
    Little = 4,
}

impl Digit {
    pub const ALL: [Digit; 5] = [
        Digit::Thumb,
        Digit::Index,
        Digit::Middle,
        Digit::Ring,
        Digit::Little,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn tip(self) -> usize {
        FINGER_TIPS[self.index()]
    }

    pub fn base(self) -> usize {
        FINGER_BASES[self.index()]
    }
}

impl fmt::Display for Digit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Finger {}", self.index() + 1)
    }
}

/// Extended/curled state of each digit, indexed by [`Digit`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GestureVector([bool; 5]);

impl GestureVector {
    pub fn new(states: [bool; 5]) -> Self {
        Self(states)
    }

    pub fn is_extended(&self, digit: Digit) -> bool {
        self.0[digit.index()]
    }

    pub fn as_array(&self) -> [bool; 5] {
        self.0
    }

    /// Digits paired with their state, thumb first
    pub fn iter(&self) -> impl Iterator<Item = (Digit, bool)> + '_ {
        Digit::ALL
            .into_iter()
            .map(move |d| (d, self.is_extended(d)))
    }

    pub fn extended_count(&self) -> usize {
        self.0.iter().filter(|&&up| up).count()
    }
}

impl Index<Digit> for GestureVector {
    type Output = bool;

    fn index(&self, digit: Digit) -> &bool {
        &self.0[digit.index()]
    }
}

impl From<[bool; 5]> for GestureVector {
    fn from(states: [bool; 5]) -> Self {
        Self(states)
    }
}

/// Classify which digits of `hand` are extended.
///
/// The thumb is extended when its tip lies right of its base (larger x).
/// This assumes one handedness and camera orientation; a mirrored hand
/// reads inverted. The other digits are extended when the tip lies above
/// the base, i.e. has the smaller y since the frame's y axis points down.
pub fn classify(hand: &Hand) -> Result<GestureVector, ClassifyError> {
    if !hand.is_complete() {
        return Err(ClassifyError::IncompleteHand {
            found: hand.len(),
            expected: LANDMARKS_PER_HAND,
        });
    }

    let keypoints = &hand.keypoints;
    let mut states = [false; 5];

    for digit in Digit::ALL {
        let tip = keypoints[digit.tip()];
        let base = keypoints[digit.base()];

        states[digit.index()] = match digit {
            Digit::Thumb => tip.x > base.x,
            _ => tip.y < base.y,
        };
    }

    Ok(GestureVector(states))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::Landmark;

    /// Every digit curled: tips below their bases, thumb tip left of its base
    fn fist() -> Vec<Landmark> {
        let mut keypoints = vec![Landmark::new(100.0, 300.0); LANDMARKS_PER_HAND];
        keypoints[THUMB_MCP] = Landmark::new(80.0, 250.0);
        keypoints[THUMB_TIP] = Landmark::new(60.0, 250.0);
        for digit in &Digit::ALL[1..] {
            keypoints[digit.base()] = Landmark::new(100.0, 200.0);
            keypoints[digit.tip()] = Landmark::new(100.0, 250.0);
        }
        keypoints
    }

    #[test]
    fn test_fist_is_all_curled() {
        let vector = classify(&Hand::new(fist())).unwrap();
        assert_eq!(vector, GestureVector::new([false; 5]));
        assert_eq!(vector.extended_count(), 0);
    }

    #[test]
    fn test_thumb_uses_horizontal_axis() {
        let mut keypoints = fist();
        keypoints[THUMB_MCP] = Landmark::new(80.0, 10.0);
        keypoints[THUMB_TIP] = Landmark::new(100.0, 500.0);
        assert!(classify(&Hand::new(keypoints.clone())).unwrap()[Digit::Thumb]);

        keypoints[THUMB_TIP] = Landmark::new(60.0, 0.0);
        assert!(!classify(&Hand::new(keypoints)).unwrap()[Digit::Thumb]);
    }

    #[test]
    fn test_index_uses_inverted_vertical_axis() {
        let mut keypoints = fist();
        keypoints[INDEX_MCP] = Landmark::new(100.0, 200.0);
        keypoints[INDEX_TIP] = Landmark::new(100.0, 150.0);
        assert!(classify(&Hand::new(keypoints.clone())).unwrap()[Digit::Index]);

        keypoints[INDEX_TIP] = Landmark::new(100.0, 250.0);
        assert!(!classify(&Hand::new(keypoints)).unwrap()[Digit::Index]);
    }

    #[test]
    fn test_tip_level_with_base_is_curled() {
        let mut keypoints = fist();
        keypoints[MIDDLE_MCP] = Landmark::new(100.0, 200.0);
        keypoints[MIDDLE_TIP] = Landmark::new(100.0, 200.0);
        assert!(!classify(&Hand::new(keypoints)).unwrap()[Digit::Middle]);
    }

    #[test]
    fn test_open_hand() {
        let mut keypoints = fist();
        keypoints[THUMB_TIP] = Landmark::new(120.0, 250.0);
        for digit in &Digit::ALL[1..] {
            keypoints[digit.tip()] = Landmark::new(100.0, 120.0);
        }
        let vector = classify(&Hand::new(keypoints)).unwrap();
        assert_eq!(vector, GestureVector::new([true; 5]));
    }

    #[test]
    fn test_classify_is_deterministic() {
        let mut keypoints = fist();
        keypoints[RING_TIP] = Landmark::new(90.0, 100.0);
        let hand = Hand::new(keypoints);

        let first = classify(&hand).unwrap();
        for _ in 0..10 {
            assert_eq!(classify(&hand).unwrap(), first);
        }
        assert_eq!(first.as_array(), [false, false, false, true, false]);
    }

    #[test]
    fn test_incomplete_hand() {
        let mut keypoints = fist();
        keypoints.truncate(18);

        let result = classify(&Hand::new(keypoints));
        assert_eq!(
            result,
            Err(ClassifyError::IncompleteHand {
                found: 18,
                expected: LANDMARKS_PER_HAND
            })
        );
    }

    #[test]
    fn test_digit_labels() {
        assert_eq!(Digit::Thumb.to_string(), "Finger 1");
        assert_eq!(Digit::Little.to_string(), "Finger 5");
        assert_eq!(Digit::Index.tip(), INDEX_TIP);
        assert_eq!(Digit::Little.base(), PINKY_MCP);
    }
}
