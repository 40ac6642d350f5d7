//! Serial session manager: owns the one device connection
//!
//! Drives the pure [`SessionStateMachine`] and performs its effects: open
//! attempts run as background tasks whose results come back as
//! [`LinkEvent`]s, and the held transport is written without ever waiting.

use anyhow::anyhow;
use bytes::{Buf, Bytes, BytesMut};
use futures::FutureExt;
use handsignal_shared::{
    codec::LineDecoder, link, CommandMessage, Effect, LineEnding, OpenTicket, Phase, PortHandle,
    SessionError, SessionEvent, SessionStateMachine,
};
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio::task::{unconstrained, JoinHandle};
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::transport::{DeviceEvent, SerialConnector, TransportStream};

/// Notifications for the UI collaborator
#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotice {
    /// Session phase changed
    PhaseChanged {
        from: Phase,
        to: Phase,
        port: Option<PortHandle>,
    },
    /// No port could be chosen automatically; offer a chooser
    SelectionRequired { available: Vec<PortHandle> },
    /// Something the user may need to act on
    Error(SessionError),
}

/// Events from open attempts and the held transport
pub enum LinkEvent<S> {
    Opened { ticket: OpenTicket, stream: S },
    OpenFailed { ticket: OpenTicket, reason: String },
    /// A line received from the device
    Line { ticket: OpenTicket, line: Bytes },
    /// The transport broke (EOF or read error)
    Lost { ticket: OpenTicket, reason: String },
}

impl<S> fmt::Debug for LinkEvent<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkEvent::Opened { ticket, .. } => write!(f, "Opened({})", ticket),
            LinkEvent::OpenFailed { ticket, reason } => {
                write!(f, "OpenFailed({}, {})", ticket, reason)
            }
            LinkEvent::Line { ticket, line } => write!(f, "Line({}, {:?})", ticket, line),
            LinkEvent::Lost { ticket, reason } => write!(f, "Lost({}, {})", ticket, reason),
        }
    }
}

/// Configuration for the session manager
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Baud rate used for every open
    pub baud_rate: u32,
    /// Delimiter appended to each command
    pub line_ending: LineEnding,
    /// Port to open automatically whenever it is present
    pub preferred_port: Option<String>,
    /// Open the first available port when no known port is present
    pub auto_open_any: bool,
    /// Give up on an open attempt after this long
    pub open_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            baud_rate: link::DEFAULT_BAUD_RATE,
            line_ending: LineEnding::Lf,
            preferred_port: None,
            auto_open_any: true,
            open_timeout: None,
        }
    }
}

/// Held transport of the current `Open` session
struct ActiveLink<S: TransportStream> {
    ticket: OpenTicket,
    port: PortHandle,
    writer: WriteHalf<S>,
    /// Unwritten tail of a partially written line
    pending: BytesMut,
    reader: JoinHandle<()>,
}

impl<S: TransportStream> ActiveLink<S> {
    /// Write one line without waiting.
    ///
    /// Returns `Ok(false)` when the transport is not ready and nothing of
    /// `line` was written. A partial write keeps the rest in `pending`, which
    /// must drain before another line may start.
    fn try_write(&mut self, line: &[u8]) -> io::Result<bool> {
        if !self.flush_pending()? {
            return Ok(false);
        }

        // A spent coop budget is not backpressure
        match unconstrained(self.writer.write(line)).now_or_never() {
            None => Ok(false),
            Some(Ok(0)) => Err(io::ErrorKind::WriteZero.into()),
            Some(Ok(n)) => {
                if n < line.len() {
                    self.pending.extend_from_slice(&line[n..]);
                }
                Ok(true)
            }
            Some(Err(e)) => Err(e),
        }
    }

    fn flush_pending(&mut self) -> io::Result<bool> {
        while !self.pending.is_empty() {
            match unconstrained(self.writer.write(&self.pending)).now_or_never() {
                None => return Ok(false),
                Some(Ok(0)) => return Err(io::ErrorKind::WriteZero.into()),
                Some(Ok(n)) => self.pending.advance(n),
                Some(Err(e)) => return Err(e),
            }
        }
        Ok(true)
    }
}

impl<S: TransportStream> Drop for ActiveLink<S> {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Owns the serial session; single owner, driven from one event loop
pub struct SessionManager<C: SerialConnector> {
    config: SessionConfig,
    connector: Arc<C>,
    machine: SessionStateMachine,
    link: Option<ActiveLink<C::Stream>>,
    /// In-flight open attempt
    opening: Option<(OpenTicket, JoinHandle<()>)>,
    /// Stream from an open result, waiting for the machine's verdict
    staged: Option<(OpenTicket, C::Stream)>,
    link_tx: mpsc::UnboundedSender<LinkEvent<C::Stream>>,
    link_rx: mpsc::UnboundedReceiver<LinkEvent<C::Stream>>,
    notice_tx: mpsc::UnboundedSender<SessionNotice>,
}

impl<C: SerialConnector> SessionManager<C> {
    /// Create a new session manager in `Idle`
    pub fn new(
        config: SessionConfig,
        connector: Arc<C>,
        notice_tx: mpsc::UnboundedSender<SessionNotice>,
    ) -> Self {
        let (link_tx, link_rx) = mpsc::unbounded_channel();
        let machine = SessionStateMachine::new()
            .with_preferred_port(config.preferred_port.as_deref().map(PortHandle::new))
            .with_auto_open_any(config.auto_open_any);

        Self {
            config,
            connector,
            machine,
            link: None,
            opening: None,
            staged: None,
            link_tx,
            link_rx,
            notice_tx,
        }
    }

    pub fn phase(&self) -> Phase {
        self.machine.state()
    }

    pub fn active_port(&self) -> Option<&PortHandle> {
        self.machine.active_port()
    }

    /// Enumerate ports and open one if a known or any port is present
    pub fn start(&mut self) -> Result<(), SessionError> {
        let available = match self.connector.list_ports() {
            Ok(ports) => ports,
            Err(e) => {
                let err = SessionError::Discovery(e.to_string());
                self.report(err.clone());
                return Err(err);
            }
        };
        info!("[SERIAL] Found {} port(s)", available.len());

        self.apply(SessionEvent::Start { available })
    }

    /// Open the port the user picked
    pub fn select_port(&mut self, port: PortHandle) -> Result<(), SessionError> {
        self.apply(SessionEvent::SelectPort(port))
    }

    /// Release the transport and end the session
    pub fn close(&mut self) {
        if let Err(e) = self.apply(SessionEvent::Close) {
            warn!("[SERIAL] Close rejected: {}", e);
        }
    }

    /// Send one command line. Never waits.
    ///
    /// Outside `Open`, or when the transport is not ready, the message is
    /// dropped and the error says why; callers treat those as silent.
    pub fn send(&mut self, message: &CommandMessage) -> Result<(), SessionError> {
        if !self.machine.can_send() {
            return Err(SessionError::TransportUnavailable);
        }
        let Some(link) = self.link.as_mut() else {
            return Err(SessionError::TransportUnavailable);
        };

        match link.try_write(&message.to_wire(self.config.line_ending)) {
            Ok(true) => {
                trace!("[SERIAL] -> {}", message);
                Ok(())
            }
            Ok(false) => Err(SessionError::WouldBlock),
            Err(e) => {
                let port = link.port.clone();
                warn!("[SERIAL] Write to {} failed: {}", port, e);
                self.apply_logged(SessionEvent::DeviceDisconnected { port });
                Err(SessionError::Transport(e.to_string()))
            }
        }
    }

    /// Feed a hot-plug notification
    pub fn handle_device_event(&mut self, event: DeviceEvent) {
        match event {
            DeviceEvent::Connected { available } => {
                info!("[SERIAL] Port connected ({} available)", available.len());
                self.apply_logged(SessionEvent::DeviceConnected { available });
            }
            DeviceEvent::Disconnected { port } => {
                info!("[SERIAL] Port disconnected: {}", port);
                self.apply_logged(SessionEvent::DeviceDisconnected { port });
            }
        }
    }

    /// Wait for the next open result or link event
    pub async fn recv_link(&mut self) -> Option<LinkEvent<C::Stream>> {
        self.link_rx.recv().await
    }

    /// Apply an open result or link event
    pub fn handle_link_event(&mut self, event: LinkEvent<C::Stream>) {
        match event {
            LinkEvent::Opened { ticket, stream } => {
                self.finish_opening(ticket);
                self.staged = Some((ticket, stream));
                self.apply_logged(SessionEvent::OpenSucceeded(ticket));
                if let Some((ticket, _)) = self.staged.take() {
                    debug!("[SERIAL] Dropped unclaimed transport {}", ticket);
                }
            }
            LinkEvent::OpenFailed { ticket, reason } => {
                self.finish_opening(ticket);
                self.apply_logged(SessionEvent::OpenFailed { ticket, reason });
            }
            LinkEvent::Line { ticket, line } => {
                if let Some(link) = self.link.as_ref().filter(|l| l.ticket == ticket) {
                    debug!(
                        "[SERIAL] {} <- {}",
                        link.port.path(),
                        String::from_utf8_lossy(&line)
                    );
                }
            }
            LinkEvent::Lost { ticket, reason } => {
                let Some(port) = self
                    .link
                    .as_ref()
                    .filter(|l| l.ticket == ticket)
                    .map(|l| l.port.clone())
                else {
                    return;
                };
                warn!("[SERIAL] Lost {}: {}", port, reason);
                self.apply_logged(SessionEvent::DeviceDisconnected { port });
            }
        }
    }

    fn finish_opening(&mut self, ticket: OpenTicket) {
        if self.opening.as_ref().is_some_and(|(t, _)| *t == ticket) {
            self.opening = None;
        }
    }

    fn apply_logged(&mut self, event: SessionEvent) {
        if let Err(e) = self.apply(event) {
            debug!("[SERIAL] Event rejected: {}", e);
        }
    }

    /// Run an event through the state machine and perform its effects
    fn apply(&mut self, event: SessionEvent) -> Result<(), SessionError> {
        let effects = match self.machine.process_event(event) {
            Ok(effects) => effects,
            Err(e) => {
                warn!("[SERIAL] {}", e);
                self.notify(SessionNotice::Error(e.clone()));
                return Err(e);
            }
        };

        for effect in effects {
            self.perform(effect);
        }
        Ok(())
    }

    fn perform(&mut self, effect: Effect) {
        match effect {
            Effect::OpenPort { port, ticket } => self.spawn_open(port, ticket),
            Effect::AttachTransport { ticket } => self.attach(ticket),
            Effect::ReleaseTransport { ticket } => self.release(ticket),
            Effect::PromptSelection { available } => {
                info!("[SERIAL] Waiting for port selection");
                self.notify(SessionNotice::SelectionRequired { available });
            }
            Effect::PhaseChanged { from, to } => {
                let port = self.machine.active_port().cloned();
                match &port {
                    Some(port) => info!("[SERIAL] {} -> {} ({})", from, to, port),
                    None => info!("[SERIAL] {} -> {}", from, to),
                }
                self.notify(SessionNotice::PhaseChanged { from, to, port });
            }
            Effect::ReportError(e) => self.report(e),
        }
    }

    fn spawn_open(&mut self, port: PortHandle, ticket: OpenTicket) {
        let connector = self.connector.clone();
        let link_tx = self.link_tx.clone();
        let baud_rate = self.config.baud_rate;
        let open_timeout = self.config.open_timeout;

        info!("[SERIAL] Opening {} (attempt {})", port, ticket);

        let task = tokio::spawn(async move {
            let result = match open_timeout {
                Some(limit) => timeout(limit, connector.open(&port, baud_rate))
                    .await
                    .unwrap_or_else(|_| Err(anyhow!("timed out after {:?}", limit))),
                None => connector.open(&port, baud_rate).await,
            };

            let event = match result {
                Ok(stream) => LinkEvent::Opened { ticket, stream },
                Err(e) => LinkEvent::OpenFailed {
                    ticket,
                    reason: e.to_string(),
                },
            };
            let _ = link_tx.send(event);
        });

        self.opening = Some((ticket, task));
    }

    fn attach(&mut self, ticket: OpenTicket) {
        let Some((staged_ticket, stream)) = self.staged.take() else {
            return;
        };
        if staged_ticket != ticket {
            self.staged = Some((staged_ticket, stream));
            return;
        }
        let Some(port) = self.machine.active_port().cloned() else {
            return;
        };

        let (reader, writer) = tokio::io::split(stream);
        let reader = tokio::spawn(read_loop(ticket, reader, self.link_tx.clone()));

        self.link = Some(ActiveLink {
            ticket,
            port,
            writer,
            pending: BytesMut::new(),
            reader,
        });
    }

    fn release(&mut self, ticket: OpenTicket) {
        if self.link.as_ref().is_some_and(|l| l.ticket == ticket) {
            if let Some(link) = self.link.take() {
                info!("[SERIAL] Closed {}", link.port);
            }
        }
        if self.opening.as_ref().is_some_and(|(t, _)| *t == ticket) {
            if let Some((_, task)) = self.opening.take() {
                debug!("[SERIAL] Cancelled open attempt {}", ticket);
                task.abort();
            }
        }
        if self.staged.as_ref().is_some_and(|(t, _)| *t == ticket) {
            self.staged = None;
        }
    }

    fn report(&self, error: SessionError) {
        warn!("[SERIAL] {}", error);
        self.notify(SessionNotice::Error(error));
    }

    fn notify(&self, notice: SessionNotice) {
        // UI may already be gone during shutdown
        let _ = self.notice_tx.send(notice);
    }
}

/// Read device output until the transport breaks
async fn read_loop<S: TransportStream>(
    ticket: OpenTicket,
    mut reader: ReadHalf<S>,
    link_tx: mpsc::UnboundedSender<LinkEvent<S>>,
) {
    let mut decoder = LineDecoder::new();
    let mut read_buf = vec![0u8; 256];

    loop {
        let reason = match reader.read(&mut read_buf).await {
            Ok(0) => "device closed the port".to_string(),
            Ok(n) => {
                decoder.extend(&read_buf[..n]);
                loop {
                    match decoder.decode_next() {
                        Ok(Some(line)) => {
                            let _ = link_tx.send(LinkEvent::Line { ticket, line });
                        }
                        Ok(None) => break,
                        Err(e) => debug!("[SERIAL] Discarding device output: {}", e),
                    }
                }
                continue;
            }
            Err(e) => e.to_string(),
        };

        let _ = link_tx.send(LinkEvent::Lost { ticket, reason });
        return;
    }
}
