//! Per-frame pipeline: classify each hand, encode, send

use handsignal_shared::{
    classify, codec, ClassifyError, CommandMessage, GestureVector, KeypointSnapshot, SessionError,
};
use tracing::{debug, trace};

use crate::connection::SessionManager;
use crate::transport::SerialConnector;

/// Where encoded commands go
pub trait CommandSink {
    fn send(&mut self, message: &CommandMessage) -> Result<(), SessionError>;
}

impl<C: SerialConnector> CommandSink for SessionManager<C> {
    fn send(&mut self, message: &CommandMessage) -> Result<(), SessionError> {
        SessionManager::send(self, message)
    }
}

/// Outcome for one hand of a frame
#[derive(Debug, Clone, PartialEq)]
pub enum HandOutcome {
    Classified {
        gesture: GestureVector,
        command: CommandMessage,
        delivered: bool,
    },
    Skipped(ClassifyError),
}

/// What happened to each hand of a frame, in detection order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrameReport {
    pub hands: Vec<HandOutcome>,
}

impl FrameReport {
    pub fn delivered(&self) -> usize {
        self.hands
            .iter()
            .filter(|h| matches!(h, HandOutcome::Classified { delivered: true, .. }))
            .count()
    }
}

/// Classify every hand independently and send one line per classified hand.
///
/// A malformed hand is skipped without affecting the others.
pub fn process_snapshot<S: CommandSink>(snapshot: KeypointSnapshot, sink: &mut S) -> FrameReport {
    let hands = snapshot
        .hands
        .iter()
        .enumerate()
        .map(|(i, hand)| match classify(hand) {
            Ok(gesture) => {
                let command = codec::encode(gesture);
                let delivered = match sink.send(&command) {
                    Ok(()) => true,
                    Err(e) if e.is_silent_drop() => {
                        trace!("[FRAME] hand {} command {} dropped: {}", i, command, e);
                        false
                    }
                    Err(e) => {
                        debug!("[FRAME] hand {} command {} not sent: {}", i, command, e);
                        false
                    }
                };
                HandOutcome::Classified {
                    gesture,
                    command,
                    delivered,
                }
            }
            Err(e) => {
                debug!("[FRAME] hand {} skipped: {}", i, e);
                HandOutcome::Skipped(e)
            }
        })
        .collect();

    FrameReport { hands }
}

#[cfg(test)]
mod tests {
    use super::*;
    use handsignal_shared::landmarks::{self, LANDMARKS_PER_HAND};
    use handsignal_shared::{Hand, Landmark};

    #[derive(Default)]
    struct RecordingSink {
        open: bool,
        sent: Vec<CommandMessage>,
    }

    impl CommandSink for RecordingSink {
        fn send(&mut self, message: &CommandMessage) -> Result<(), SessionError> {
            if !self.open {
                return Err(SessionError::TransportUnavailable);
            }
            self.sent.push(*message);
            Ok(())
        }
    }

    fn pointing_hand() -> Hand {
        let mut keypoints = vec![Landmark::new(100.0, 300.0); LANDMARKS_PER_HAND];
        keypoints[landmarks::THUMB_MCP] = Landmark::new(80.0, 250.0);
        keypoints[landmarks::THUMB_TIP] = Landmark::new(60.0, 250.0);
        keypoints[landmarks::INDEX_MCP] = Landmark::new(100.0, 200.0);
        keypoints[landmarks::INDEX_TIP] = Landmark::new(100.0, 150.0);
        Hand::new(keypoints)
    }

    #[test]
    fn test_incomplete_hand_does_not_block_others() {
        let mut partial = pointing_hand();
        partial.keypoints.truncate(18);
        let snapshot = KeypointSnapshot::new(vec![partial, pointing_hand()]);
        let mut sink = RecordingSink {
            open: true,
            ..Default::default()
        };

        let report = process_snapshot(snapshot, &mut sink);

        assert_eq!(report.hands.len(), 2);
        assert_eq!(
            report.hands[0],
            HandOutcome::Skipped(ClassifyError::IncompleteHand {
                found: 18,
                expected: LANDMARKS_PER_HAND
            })
        );
        assert!(matches!(
            report.hands[1],
            HandOutcome::Classified { delivered: true, .. }
        ));
        assert_eq!(sink.sent.len(), 1);
        assert_eq!(sink.sent[0].as_str(), "01000");
    }

    #[test]
    fn test_one_line_per_hand_in_order() {
        let mut open_hand = pointing_hand();
        for tip in [landmarks::MIDDLE_TIP, landmarks::RING_TIP, landmarks::PINKY_TIP] {
            open_hand.keypoints[tip] = Landmark::new(100.0, 100.0);
        }
        let snapshot = KeypointSnapshot::new(vec![pointing_hand(), open_hand]);
        let mut sink = RecordingSink {
            open: true,
            ..Default::default()
        };

        let report = process_snapshot(snapshot, &mut sink);
        assert_eq!(report.delivered(), 2);
        let sent: Vec<&str> = sink.sent.iter().map(|m| m.as_str()).collect();
        assert_eq!(sent, vec!["01000", "01111"]);
    }

    #[test]
    fn test_closed_sink_still_classifies() {
        let snapshot = KeypointSnapshot::new(vec![pointing_hand()]);
        let mut sink = RecordingSink::default();

        let report = process_snapshot(snapshot, &mut sink);
        assert_eq!(report.delivered(), 0);
        assert!(matches!(
            report.hands[0],
            HandOutcome::Classified { delivered: false, .. }
        ));
        assert!(sink.sent.is_empty());
    }

    #[test]
    fn test_empty_frame() {
        let mut sink = RecordingSink::default();
        let report = process_snapshot(KeypointSnapshot::default(), &mut sink);
        assert!(report.hands.is_empty());
    }
}
