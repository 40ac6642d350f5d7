//! Input from the pose estimator and the UI
//!
//! Newline-delimited JSON, one tagged message per line:
//! ```text
//! {"type":"frame","hands":[{"keypoints":[{"x":..,"y":..}, ...]}]}
//! {"type":"select_port","path":"/dev/ttyACM0"}
//! {"type":"start"}
//! {"type":"close"}
//! ```

use anyhow::{Context, Result};
use handsignal_shared::KeypointSnapshot;
use serde::Deserialize;
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// One input line
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputMessage {
    /// Keypoints for one video frame
    Frame(KeypointSnapshot),
    /// UI picked a port
    SelectPort { path: String },
    /// Re-run discovery (also reopens after close)
    Start,
    /// Close the session
    Close,
}

/// Where input lines come from
#[derive(Debug, Clone, PartialEq, Default)]
pub enum InputSource {
    #[default]
    Stdin,
    File(PathBuf),
}

impl InputSource {
    /// `-` means stdin
    pub fn from_arg(arg: &str) -> Self {
        if arg == "-" {
            InputSource::Stdin
        } else {
            InputSource::File(PathBuf::from(arg))
        }
    }

    pub async fn open(&self) -> Result<Box<dyn AsyncBufRead + Send + Unpin>> {
        match self {
            InputSource::Stdin => Ok(Box::new(BufReader::new(tokio::io::stdin()))),
            InputSource::File(path) => {
                let file = tokio::fs::File::open(path)
                    .await
                    .with_context(|| format!("opening input {}", path.display()))?;
                Ok(Box::new(BufReader::new(file)))
            }
        }
    }
}

/// Parse one line; blank lines yield `None`
pub fn parse_line(line: &str) -> Result<Option<InputMessage>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let message = serde_json::from_str(line).context("malformed input line")?;
    Ok(Some(message))
}

/// Forward parsed messages until end of input
///
/// Malformed lines are logged and skipped. Returns when the input ends or
/// the receiver is dropped.
pub async fn read_input<R>(reader: R, tx: mpsc::Sender<InputMessage>) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;

        let message = match parse_line(&line) {
            Ok(Some(message)) => message,
            Ok(None) => continue,
            Err(e) => {
                warn!("[INPUT] line {}: {:#}", line_no, e);
                continue;
            }
        };

        if tx.send(message).await.is_err() {
            debug!("[INPUT] Receiver gone, stopping");
            return Ok(());
        }
    }

    info!("[INPUT] End of input after {} lines", line_no);
    Ok(())
}
