//! In-memory connector for tests

use crate::transport::traits::SerialConnector;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use handsignal_shared::PortHandle;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::io::DuplexStream;

/// Hands out `tokio::io::duplex` pairs and keeps the device ends
pub struct MockConnector {
    ports: Mutex<Vec<PortHandle>>,
    devices: Mutex<Vec<DuplexStream>>,
    opens: AtomicUsize,
    fail_open: AtomicBool,
    buffer_size: usize,
}

impl MockConnector {
    pub fn new(ports: &[&str]) -> Self {
        Self::with_buffer(ports, 1024)
    }

    pub fn with_buffer(ports: &[&str], buffer_size: usize) -> Self {
        Self {
            ports: Mutex::new(ports.iter().map(|p| PortHandle::new(*p)).collect()),
            devices: Mutex::new(Vec::new()),
            opens: AtomicUsize::new(0),
            fail_open: AtomicBool::new(false),
            buffer_size,
        }
    }

    pub fn set_ports(&self, ports: &[&str]) {
        *self.ports.lock().unwrap() = ports.iter().map(|p| PortHandle::new(*p)).collect();
    }

    pub fn fail_opens(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Number of open calls made so far
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Take the device end of the most recently opened transport
    pub fn take_device(&self) -> Option<DuplexStream> {
        self.devices.lock().unwrap().pop()
    }
}

#[async_trait]
impl SerialConnector for MockConnector {
    type Stream = DuplexStream;

    fn list_ports(&self) -> Result<Vec<PortHandle>> {
        Ok(self.ports.lock().unwrap().clone())
    }

    async fn open(&self, port: &PortHandle, _baud_rate: u32) -> Result<Self::Stream> {
        self.opens.fetch_add(1, Ordering::SeqCst);

        if self.fail_open.load(Ordering::SeqCst) {
            return Err(anyhow!("cannot open {}", port.path()));
        }

        let (host, device) = tokio::io::duplex(self.buffer_size);
        self.devices.lock().unwrap().push(device);
        Ok(host)
    }

    fn name(&self) -> &'static str {
        "Mock"
    }
}
