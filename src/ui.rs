//! UI collaborator: renders session state and finger states
//!
//! Display only. The session never waits on it; if it falls behind or
//! goes away, nothing upstream notices.

use handsignal_shared::{CommandMessage, GestureVector, Phase};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::connection::SessionNotice;
use crate::frame::{FrameReport, HandOutcome};

/// Display state carried between frames
#[derive(Debug, Default)]
pub struct Display {
    phase: Option<Phase>,
    /// Last command shown per hand slot
    last_commands: Vec<Option<CommandMessage>>,
}

impl Display {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Option<Phase> {
        self.phase
    }

    pub fn render_notice(&mut self, notice: &SessionNotice) {
        match notice {
            SessionNotice::PhaseChanged { to, port, .. } => {
                self.phase = Some(*to);
                match (to, port) {
                    (Phase::Open, Some(port)) => info!("[UI] Port open: {}", port),
                    (Phase::Opening, Some(port)) => info!("[UI] Connecting to {}...", port),
                    (phase, _) => info!("[UI] Serial: {}", phase),
                }
            }
            SessionNotice::SelectionRequired { available } => {
                if available.is_empty() {
                    info!("[UI] No serial ports found; plug in a device or send select_port");
                } else {
                    info!("[UI] Choose a port:");
                    for port in available {
                        match port.description() {
                            Some(desc) => info!("[UI]   {}  {}", port.path(), desc),
                            None => info!("[UI]   {}", port.path()),
                        }
                    }
                }
            }
            SessionNotice::Error(e) => warn!("[UI] Serial port error: {}", e),
        }
    }

    /// Render a frame; returns the hand slots whose command changed
    pub fn render_frame(&mut self, report: &FrameReport) -> Vec<usize> {
        let mut changed = Vec::new();
        self.last_commands.resize(report.hands.len(), None);

        for (slot, outcome) in report.hands.iter().enumerate() {
            let HandOutcome::Classified {
                gesture, command, ..
            } = outcome
            else {
                continue;
            };

            // Full finger state at info only when the command changes
            let is_change = self.last_commands[slot] != Some(*command);
            for line in finger_states(gesture) {
                if is_change {
                    info!("[UI] hand {} {}", slot, line);
                } else {
                    debug!("[UI] hand {} {}", slot, line);
                }
            }

            if is_change {
                info!("[UI] hand {} -> {}", slot, command);
                self.last_commands[slot] = Some(*command);
                changed.push(slot);
            }
        }

        changed
    }
}

/// "Finger N: Up" / "Finger N: Down", thumb first
pub fn finger_states(gesture: &GestureVector) -> Vec<String> {
    gesture
        .iter()
        .map(|(digit, up)| format!("{}: {}", digit, if up { "Up" } else { "Down" }))
        .collect()
}

/// Render notices and frame reports until both channels close
pub async fn run(
    mut notices: mpsc::UnboundedReceiver<SessionNotice>,
    mut frames: mpsc::UnboundedReceiver<FrameReport>,
) {
    let mut display = Display::new();
    let mut notices_open = true;
    let mut frames_open = true;

    while notices_open || frames_open {
        tokio::select! {
            notice = notices.recv(), if notices_open => match notice {
                Some(notice) => display.render_notice(&notice),
                None => notices_open = false,
            },
            report = frames.recv(), if frames_open => match report {
                Some(report) => {
                    display.render_frame(&report);
                }
                None => frames_open = false,
            },
        }
    }

    debug!("[UI] Stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use handsignal_shared::{codec, ClassifyError, PortHandle};

    fn classified(bits: [bool; 5]) -> HandOutcome {
        let gesture = GestureVector::new(bits);
        HandOutcome::Classified {
            gesture,
            command: codec::encode(gesture),
            delivered: true,
        }
    }

    #[test]
    fn test_finger_states() {
        let lines = finger_states(&GestureVector::new([true, false, false, true, false]));
        assert_eq!(
            lines,
            vec![
                "Finger 1: Up",
                "Finger 2: Down",
                "Finger 3: Down",
                "Finger 4: Up",
                "Finger 5: Down",
            ]
        );
    }

    #[test]
    fn test_tracks_phase() {
        let mut display = Display::new();
        assert_eq!(display.phase(), None);

        display.render_notice(&SessionNotice::PhaseChanged {
            from: Phase::Opening,
            to: Phase::Open,
            port: Some(PortHandle::new("/dev/ttyACM0")),
        });
        assert_eq!(display.phase(), Some(Phase::Open));
    }

    #[test]
    fn test_reports_changed_commands_only() {
        let mut display = Display::new();
        let frame = FrameReport {
            hands: vec![classified([true; 5]), classified([false; 5])],
        };

        assert_eq!(display.render_frame(&frame), vec![0, 1]);
        assert!(display.render_frame(&frame).is_empty());

        let next = FrameReport {
            hands: vec![
                classified([true; 5]),
                HandOutcome::Skipped(ClassifyError::IncompleteHand {
                    found: 3,
                    expected: 21,
                }),
            ],
        };
        assert!(display.render_frame(&next).is_empty());

        let next = FrameReport {
            hands: vec![classified([false, true, false, false, false])],
        };
        assert_eq!(display.render_frame(&next), vec![0]);
    }

    #[tokio::test]
    async fn test_run_stops_when_channels_close() {
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();

        notice_tx
            .send(SessionNotice::SelectionRequired { available: vec![] })
            .unwrap();
        frame_tx.send(FrameReport::default()).unwrap();
        drop(notice_tx);
        drop(frame_tx);

        run(notice_rx, frame_rx).await;
    }
}
