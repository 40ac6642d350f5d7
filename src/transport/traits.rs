//! Transport trait abstraction for pluggable serial backends

use anyhow::Result;
use async_trait::async_trait;
use handsignal_shared::PortHandle;
use tokio::io::{AsyncRead, AsyncWrite};

/// A byte stream to the device that can be split into read and write halves
pub trait TransportStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> TransportStream for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Discovers serial devices and opens transports to them
#[async_trait]
pub trait SerialConnector: Send + Sync + 'static {
    /// The stream type this connector produces
    type Stream: TransportStream;

    /// Enumerate the ports currently present
    fn list_ports(&self) -> Result<Vec<PortHandle>>;

    /// Attempt to open `port`, returning a stream on success
    async fn open(&self, port: &PortHandle, baud_rate: u32) -> Result<Self::Stream>;

    /// Human-readable name for this backend
    fn name(&self) -> &'static str;
}
