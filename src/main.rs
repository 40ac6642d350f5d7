mod cli;
mod connection;
mod frame;
mod input;
mod transport;
mod ui;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use connection::SessionManager;
use handsignal_shared::PortHandle;
use input::InputMessage;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use transport::{HotplugWatcher, SerialConnector, TokioSerialConnector};

use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_filter())),
        )
        .init();

    // Single-threaded: the session is owned by one event loop
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(run(cli));

    // Stdin reads park a blocking thread; don't wait on it
    runtime.shutdown_timeout(Duration::from_millis(100));
    result
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.session_config();
    info!("handsignal starting");
    info!("  Baud rate: {}", config.baud_rate);
    info!("  Line ending: {}", cli.line_ending);
    if let Some(port) = &config.preferred_port {
        info!("  Preferred port: {}", port);
    }

    let connector = Arc::new(TokioSerialConnector::new(cli.usb_only));

    // UI collaborator
    let (notice_tx, notice_rx) = mpsc::unbounded_channel();
    let (frame_tx, frame_rx) = mpsc::unbounded_channel();
    let ui_handle = tokio::spawn(ui::run(notice_rx, frame_rx));

    // Hot-plug watcher
    let (device_tx, mut device_rx) = mpsc::channel(16);
    let hotplug_handle =
        HotplugWatcher::new(connector.clone(), cli.hotplug_config()).spawn(device_tx);

    // Keypoint / UI input
    let (input_tx, mut input_rx) = mpsc::channel(64);
    let source = cli.input_source();
    let input_handle = tokio::spawn(async move {
        let reader = match source.open().await {
            Ok(reader) => reader,
            Err(e) => {
                error!("[INPUT] {:#}", e);
                return;
            }
        };
        if let Err(e) = input::read_input(reader, input_tx).await {
            error!("[INPUT] Read failed: {}", e);
        }
    });

    let mut session = SessionManager::new(config, connector.clone(), notice_tx);
    info!("[SERIAL] Using {} connector", connector.name());
    if let Err(e) = session.start() {
        warn!("[SERIAL] Start failed: {}", e);
    }

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    // Main event loop
    loop {
        tokio::select! {
            message = input_rx.recv() => match message {
                Some(message) => handle_input(message, &mut session, &frame_tx),
                None => {
                    info!("[MAIN] Input closed, shutting down");
                    break;
                }
            },
            Some(event) = device_rx.recv() => session.handle_device_event(event),
            Some(event) = session.recv_link() => session.handle_link_event(event),
            _ = &mut shutdown => {
                info!("[MAIN] Interrupted, shutting down");
                break;
            }
        }
    }

    session.close();
    hotplug_handle.abort();
    input_handle.abort();

    // Closing both channels ends the UI task
    drop(session);
    drop(frame_tx);
    if let Err(e) = ui_handle.await {
        debug!("[MAIN] UI task ended abnormally: {}", e);
    }

    info!("handsignal stopped");
    Ok(())
}

fn handle_input<C: SerialConnector>(
    message: InputMessage,
    session: &mut SessionManager<C>,
    frame_tx: &mpsc::UnboundedSender<frame::FrameReport>,
) {
    match message {
        InputMessage::Frame(snapshot) => {
            let report = frame::process_snapshot(snapshot, session);
            debug!(
                "[FRAME] {}/{} hand(s) delivered",
                report.delivered(),
                report.hands.len()
            );
            let _ = frame_tx.send(report);
        }
        InputMessage::SelectPort { path } => {
            if let Err(e) = session.select_port(PortHandle::new(path)) {
                warn!("[MAIN] Port selection rejected: {}", e);
            }
        }
        InputMessage::Start => {
            if let Err(e) = session.start() {
                warn!("[MAIN] Start rejected: {}", e);
            }
        }
        InputMessage::Close => session.close(),
    }
}
