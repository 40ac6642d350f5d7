pub mod hotplug;
pub mod serial;
pub mod traits;

#[cfg(test)]
pub mod mock;

pub use hotplug::{DeviceEvent, HotplugConfig, HotplugWatcher};
pub use serial::TokioSerialConnector;
pub use traits::{SerialConnector, TransportStream};
