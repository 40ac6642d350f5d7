//! Hot-plug detection by polling the port list

use crate::transport::traits::SerialConnector;
use handsignal_shared::PortHandle;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Device arrival/removal notifications
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    /// One or more ports appeared; carries the full current list
    Connected { available: Vec<PortHandle> },
    /// A port vanished
    Disconnected { port: PortHandle },
}

/// Configuration for the hot-plug watcher
#[derive(Debug, Clone)]
pub struct HotplugConfig {
    /// How often to re-enumerate ports
    pub poll_interval: Duration,
}

impl Default for HotplugConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Compare two enumerations and describe what changed
pub fn diff_ports(previous: &[PortHandle], current: &[PortHandle]) -> Vec<DeviceEvent> {
    let mut events: Vec<DeviceEvent> = previous
        .iter()
        .filter(|old| !current.iter().any(|p| p.same_device(old)))
        .map(|old| DeviceEvent::Disconnected { port: old.clone() })
        .collect();

    let arrived = current
        .iter()
        .any(|new| !previous.iter().any(|p| p.same_device(new)));
    if arrived {
        events.push(DeviceEvent::Connected {
            available: current.to_vec(),
        });
    }

    events
}

/// Polls a connector and reports port changes
pub struct HotplugWatcher<C: SerialConnector> {
    connector: Arc<C>,
    config: HotplugConfig,
    /// Last enumeration; `None` until the first successful poll
    known: Option<Vec<PortHandle>>,
}

impl<C: SerialConnector> HotplugWatcher<C> {
    pub fn new(connector: Arc<C>, config: HotplugConfig) -> Self {
        Self {
            connector,
            config,
            known: None,
        }
    }

    /// Re-enumerate once. The first successful poll only sets the baseline.
    pub fn poll(&mut self) -> anyhow::Result<Vec<DeviceEvent>> {
        let current = self.connector.list_ports()?;
        let events = match &self.known {
            Some(previous) => diff_ports(previous, &current),
            None => Vec::new(),
        };
        self.known = Some(current);
        Ok(events)
    }

    /// Start polling in the background
    pub fn spawn(mut self, event_tx: mpsc::Sender<DeviceEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.config.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(
                "[HOTPLUG] Watching {} ports every {:?}",
                self.connector.name(),
                self.config.poll_interval
            );

            loop {
                ticker.tick().await;

                let events = match self.poll() {
                    Ok(events) => events,
                    Err(e) => {
                        warn!("[HOTPLUG] Port enumeration failed: {}", e);
                        continue;
                    }
                };

                for event in events {
                    debug!("[HOTPLUG] {:?}", event);
                    if event_tx.send(event).await.is_err() {
                        debug!("[HOTPLUG] Receiver gone, stopping");
                        return;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockConnector;

    fn ports(paths: &[&str]) -> Vec<PortHandle> {
        paths.iter().map(|p| PortHandle::new(*p)).collect()
    }

    #[test]
    fn test_diff_no_change() {
        let list = ports(&["/dev/ttyACM0"]);
        assert!(diff_ports(&list, &list).is_empty());
    }

    #[test]
    fn test_diff_arrival_and_removal() {
        let previous = ports(&["/dev/ttyACM0", "/dev/ttyUSB0"]);
        let current = ports(&["/dev/ttyUSB0", "/dev/ttyUSB1"]);

        let events = diff_ports(&previous, &current);
        assert_eq!(
            events,
            vec![
                DeviceEvent::Disconnected {
                    port: PortHandle::new("/dev/ttyACM0")
                },
                DeviceEvent::Connected { available: current },
            ]
        );
    }

    #[test]
    fn test_first_poll_sets_baseline() {
        let connector = Arc::new(MockConnector::new(&["/dev/ttyACM0"]));
        let mut watcher = HotplugWatcher::new(connector.clone(), HotplugConfig::default());

        assert!(watcher.poll().unwrap().is_empty());

        connector.set_ports(&[]);
        assert_eq!(
            watcher.poll().unwrap(),
            vec![DeviceEvent::Disconnected {
                port: PortHandle::new("/dev/ttyACM0")
            }]
        );

        connector.set_ports(&["/dev/ttyACM0"]);
        assert_eq!(
            watcher.poll().unwrap(),
            vec![DeviceEvent::Connected {
                available: ports(&["/dev/ttyACM0"])
            }]
        );
    }

    #[tokio::test]
    async fn test_spawned_watcher_reports_changes() {
        let connector = Arc::new(MockConnector::new(&[]));
        let config = HotplugConfig {
            poll_interval: Duration::from_millis(5),
        };
        let (tx, mut rx) = mpsc::channel(8);
        let handle = HotplugWatcher::new(connector.clone(), config).spawn(tx);

        // let the baseline poll happen
        tokio::time::sleep(Duration::from_millis(20)).await;
        connector.set_ports(&["/dev/ttyUSB0"]);

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("no hot-plug event")
            .expect("channel closed");
        assert_eq!(
            event,
            DeviceEvent::Connected {
                available: ports(&["/dev/ttyUSB0"])
            }
        );
        handle.abort();
    }
}
