//! Serial port backend built on tokio-serial

use crate::transport::traits::SerialConnector;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use handsignal_shared::PortHandle;
use tokio_serial::{SerialPortBuilderExt, SerialPortType, SerialStream};
use tracing::debug;

/// Connector for local serial devices
#[derive(Debug, Clone, Default)]
pub struct TokioSerialConnector {
    /// Only report USB serial adapters (skips built-in UARTs and PCI ports)
    usb_only: bool,
}

impl TokioSerialConnector {
    pub fn new(usb_only: bool) -> Self {
        Self { usb_only }
    }
}

#[async_trait]
impl SerialConnector for TokioSerialConnector {
    type Stream = SerialStream;

    fn list_ports(&self) -> Result<Vec<PortHandle>> {
        let ports = tokio_serial::available_ports()?;

        Ok(ports
            .into_iter()
            .filter_map(|info| match info.port_type {
                SerialPortType::UsbPort(usb) => Some(PortHandle::with_description(
                    info.port_name,
                    describe_usb(
                        usb.vid,
                        usb.pid,
                        usb.manufacturer.as_deref(),
                        usb.product.as_deref(),
                    ),
                )),
                _ if self.usb_only => None,
                _ => Some(PortHandle::new(info.port_name)),
            })
            .collect())
    }

    async fn open(&self, port: &PortHandle, baud_rate: u32) -> Result<Self::Stream> {
        debug!("[SERIAL] Opening {} at {} baud", port.path(), baud_rate);

        let stream = tokio_serial::new(port.path(), baud_rate)
            .open_native_async()
            .map_err(|e| anyhow!("{}", e))?;

        Ok(stream)
    }

    fn name(&self) -> &'static str {
        "Serial"
    }
}

fn describe_usb(vid: u16, pid: u16, manufacturer: Option<&str>, product: Option<&str>) -> String {
    let ids = format!("{:04x}:{:04x}", vid, pid);
    match (manufacturer, product) {
        (Some(maker), Some(product)) => format!("{} {} [{}]", maker, product, ids),
        (None, Some(product)) => format!("{} [{}]", product, ids),
        (Some(maker), None) => format!("{} [{}]", maker, ids),
        (None, None) => ids,
    }
}
