//! Serial Session State Machine
//!
//! Defines valid session transitions as a pure function of
//! (phase, event) -> (phase, effects). The runtime performs the effects
//! (opening and releasing transports, notifying the UI); nothing here
//! touches a device.

use std::fmt;
use thiserror::Error;

/// Lifecycle phase of the serial session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// No port known
    Idle,
    /// Ports enumerated, waiting for the UI to pick one
    AwaitingSelection,
    /// Open requested, waiting for the transport
    Opening,
    /// Ready to send
    Open,
    /// Explicitly closed
    Closed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => write!(f, "idle"),
            Phase::AwaitingSelection => write!(f, "awaiting selection"),
            Phase::Opening => write!(f, "opening"),
            Phase::Open => write!(f, "open"),
            Phase::Closed => write!(f, "closed"),
        }
    }
}

/// A discovered serial device, identified by its path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PortHandle {
    path: String,
    description: Option<String>,
}

impl PortHandle {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            description: None,
        }
    }

    pub fn with_description(path: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            description: Some(description.into()),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Same device, ignoring the description
    pub fn same_device(&self, other: &PortHandle) -> bool {
        self.path == other.path
    }
}

impl fmt::Display for PortHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.description {
            Some(desc) => write!(f, "{} ({})", self.path, desc),
            None => write!(f, "{}", self.path),
        }
    }
}

/// Identity of one open attempt
///
/// Results and link events carry the ticket of the attempt they belong to;
/// anything carrying a ticket other than the current one is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpenTicket(u64);

impl fmt::Display for OpenTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Session errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("Session busy: an open attempt is already {0}")]
    SessionBusy(Phase),

    #[error("Failed to open {port}: {reason}")]
    PortOpen { port: PortHandle, reason: String },

    #[error("Port selection not expected while {phase}")]
    NotAwaitingSelection { phase: Phase },

    #[error("Transport unavailable")]
    TransportUnavailable,

    #[error("Transport not ready for writing")]
    WouldBlock,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Port discovery failed: {0}")]
    Discovery(String),
}

impl SessionError {
    /// Drops expected during reconnection windows; never shown to the user
    pub fn is_silent_drop(&self) -> bool {
        matches!(self, SessionError::TransportUnavailable | SessionError::WouldBlock)
    }
}

/// Events that can trigger state transitions
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Session (re)started with a fresh port enumeration
    Start { available: Vec<PortHandle> },
    /// User picked a port
    SelectPort(PortHandle),
    /// Transport confirmed open
    OpenSucceeded(OpenTicket),
    /// Transport open failed
    OpenFailed { ticket: OpenTicket, reason: String },
    /// A device was plugged in; carries the new enumeration
    DeviceConnected { available: Vec<PortHandle> },
    /// A device was unplugged (or its link broke)
    DeviceDisconnected { port: PortHandle },
    /// Explicit close
    Close,
}

/// Work the runtime must do after a transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Begin opening `port`; report the result with `ticket`
    OpenPort { port: PortHandle, ticket: OpenTicket },
    /// Keep the transport produced by this attempt
    AttachTransport { ticket: OpenTicket },
    /// Close and drop the transport of this attempt, if one exists
    ReleaseTransport { ticket: OpenTicket },
    /// Ask the UI to offer a port chooser
    PromptSelection { available: Vec<PortHandle> },
    /// Phase changed
    PhaseChanged { from: Phase, to: Phase },
    /// Surface an error to the UI
    ReportError(SessionError),
}

#[derive(Debug, Clone)]
struct Attempt {
    port: PortHandle,
    ticket: OpenTicket,
}

/// The serial session state machine
#[derive(Debug)]
pub struct SessionStateMachine {
    phase: Phase,
    /// Port being opened or held open
    active: Option<Attempt>,
    /// Last port that reached `Open`
    last_used: Option<PortHandle>,
    /// Port configured up front, opened automatically when present
    preferred: Option<PortHandle>,
    /// Open any available port when nothing better is known
    auto_open_any: bool,
    available: Vec<PortHandle>,
    next_ticket: u64,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStateMachine {
    /// Create a new state machine in Idle state
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            active: None,
            last_used: None,
            preferred: None,
            auto_open_any: true,
            available: Vec::new(),
            next_ticket: 0,
        }
    }

    pub fn with_preferred_port(mut self, port: Option<PortHandle>) -> Self {
        self.preferred = port;
        self
    }

    pub fn with_auto_open_any(mut self, enabled: bool) -> Self {
        self.auto_open_any = enabled;
        self
    }

    /// Get current phase
    pub fn state(&self) -> Phase {
        self.phase
    }

    /// Port being opened or held open
    pub fn active_port(&self) -> Option<&PortHandle> {
        self.active.as_ref().map(|a| &a.port)
    }

    /// Ticket of the current open attempt
    pub fn active_ticket(&self) -> Option<OpenTicket> {
        self.active.as_ref().map(|a| a.ticket)
    }

    pub fn last_used(&self) -> Option<&PortHandle> {
        self.last_used.as_ref()
    }

    /// Ports seen by the latest enumeration
    pub fn available(&self) -> &[PortHandle] {
        &self.available
    }

    pub fn can_send(&self) -> bool {
        self.phase == Phase::Open
    }

    /// Process an event and return the effects to perform
    ///
    /// An `Err` means the event was rejected and the machine is unchanged.
    pub fn process_event(&mut self, event: SessionEvent) -> Result<Vec<Effect>, SessionError> {
        let mut effects = Vec::new();

        match event {
            SessionEvent::Start { available } => {
                if matches!(self.phase, Phase::Opening | Phase::Open) {
                    return Err(SessionError::SessionBusy(self.phase));
                }
                if self.phase == Phase::Closed {
                    self.set_phase(Phase::Idle, &mut effects);
                }
                self.enumerated(available, &mut effects);
            }

            SessionEvent::SelectPort(port) => match self.phase {
                Phase::AwaitingSelection => self.begin_open(port, &mut effects),
                Phase::Opening | Phase::Open => {
                    return Err(SessionError::SessionBusy(self.phase));
                }
                phase @ (Phase::Idle | Phase::Closed) => {
                    return Err(SessionError::NotAwaitingSelection { phase });
                }
            },

            SessionEvent::OpenSucceeded(ticket) => {
                if self.phase == Phase::Opening && self.is_current(ticket) {
                    self.last_used = self.active.as_ref().map(|a| a.port.clone());
                    effects.push(Effect::AttachTransport { ticket });
                    self.set_phase(Phase::Open, &mut effects);
                } else {
                    // Attempt was abandoned (close, disconnect); drop what it produced
                    effects.push(Effect::ReleaseTransport { ticket });
                }
            }

            SessionEvent::OpenFailed { ticket, reason } => {
                if self.phase == Phase::Opening && self.is_current(ticket) {
                    if let Some(attempt) = self.active.take() {
                        effects.push(Effect::ReportError(SessionError::PortOpen {
                            port: attempt.port,
                            reason,
                        }));
                    }
                    self.await_selection(&mut effects);
                }
            }

            SessionEvent::DeviceConnected { available } => {
                if matches!(self.phase, Phase::Idle | Phase::AwaitingSelection) {
                    self.enumerated(available, &mut effects);
                }
            }

            SessionEvent::DeviceDisconnected { port } => {
                let affects_active = self
                    .active
                    .as_ref()
                    .is_some_and(|a| a.port.same_device(&port));

                self.available.retain(|p| !p.same_device(&port));

                if matches!(self.phase, Phase::Opening | Phase::Open) && affects_active {
                    if let Some(attempt) = self.active.take() {
                        effects.push(Effect::ReleaseTransport {
                            ticket: attempt.ticket,
                        });
                    }
                    self.set_phase(Phase::Idle, &mut effects);
                }
            }

            SessionEvent::Close => {
                if let Some(attempt) = self.active.take() {
                    effects.push(Effect::ReleaseTransport {
                        ticket: attempt.ticket,
                    });
                }
                self.set_phase(Phase::Closed, &mut effects);
            }
        }

        Ok(effects)
    }

    fn is_current(&self, ticket: OpenTicket) -> bool {
        self.active.as_ref().is_some_and(|a| a.ticket == ticket)
    }

    /// Pick a port from a fresh enumeration, or wait for the user
    fn enumerated(&mut self, available: Vec<PortHandle>, effects: &mut Vec<Effect>) {
        self.available = available;

        match self.auto_candidate() {
            Some(port) => self.begin_open(port, effects),
            None => self.await_selection(effects),
        }
    }

    /// Previously used port first, then the preferred one, then any
    fn auto_candidate(&self) -> Option<PortHandle> {
        let find = |wanted: &PortHandle| {
            self.available
                .iter()
                .find(|p| p.same_device(wanted))
                .cloned()
        };

        self.last_used
            .as_ref()
            .and_then(find)
            .or_else(|| self.preferred.as_ref().and_then(find))
            .or_else(|| {
                if self.auto_open_any {
                    self.available.first().cloned()
                } else {
                    None
                }
            })
    }

    fn begin_open(&mut self, port: PortHandle, effects: &mut Vec<Effect>) {
        self.next_ticket += 1;
        let ticket = OpenTicket(self.next_ticket);

        self.active = Some(Attempt {
            port: port.clone(),
            ticket,
        });
        self.set_phase(Phase::Opening, effects);
        effects.push(Effect::OpenPort { port, ticket });
    }

    fn await_selection(&mut self, effects: &mut Vec<Effect>) {
        self.set_phase(Phase::AwaitingSelection, effects);
        effects.push(Effect::PromptSelection {
            available: self.available.clone(),
        });
    }

    fn set_phase(&mut self, to: Phase, effects: &mut Vec<Effect>) {
        let from = self.phase;
        if from != to {
            self.phase = to;
            effects.push(Effect::PhaseChanged { from, to });
        }
    }
}
