//! Registry of connected switches
//!
//! The transport layer registers a switch when it completes its handshake and
//! unregisters it on disconnect. Registration hands back the receiving end of
//! a command channel; the transport drains it and translates each
//! [`SwitchCommand`] into its wire protocol.

use crate::core::error::DeviceError;
use crate::core::flows::{DatapathId, DeviceGateway};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info};

/// Commands queued for a connected switch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchCommand {
    /// Delete every flow entry in every table
    DeleteAllFlows,
}

/// Thread-safe lookup of connected switches by datapath id.
#[derive(Debug, Default)]
pub struct SwitchRegistry {
    switches: RwLock<HashMap<DatapathId, mpsc::Sender<SwitchCommand>>>,
}

impl SwitchRegistry {
    /// Command channel depth per switch
    pub const COMMAND_QUEUE_DEPTH: usize = 32;

    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a switch that announced itself.
    ///
    /// A reconnecting switch replaces its previous entry; the old receiver
    /// then observes a closed channel.
    pub fn register(&self, datapath_id: DatapathId) -> mpsc::Receiver<SwitchCommand> {
        let (tx, rx) = mpsc::channel(Self::COMMAND_QUEUE_DEPTH);
        self.switches
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(datapath_id, tx);
        info!("Switch {} connected", datapath_id);
        rx
    }

    /// Unregisters a switch; returns whether it was connected.
    pub fn unregister(&self, datapath_id: DatapathId) -> bool {
        let removed = self
            .switches
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&datapath_id)
            .is_some();
        if removed {
            info!("Switch {} disconnected", datapath_id);
        }
        removed
    }

    /// Datapath ids of all connected switches, sorted
    pub fn connected(&self) -> Vec<DatapathId> {
        let mut ids: Vec<_> = self
            .switches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        ids.sort_unstable();
        ids
    }

    fn sender(&self, datapath_id: DatapathId) -> Option<mpsc::Sender<SwitchCommand>> {
        self.switches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&datapath_id)
            .cloned()
    }
}

#[async_trait]
impl DeviceGateway for SwitchRegistry {
    fn is_device_known(&self, device: DatapathId) -> bool {
        self.switches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&device)
    }

    /// Queues a purge without waiting on the transport.
    ///
    /// A full queue already holds undelivered commands, and a purge is
    /// queued behind every accepted change, so the request is coalesced.
    async fn remove_all_flow_records(&self, device: DatapathId) -> Result<(), DeviceError> {
        let sender = self
            .sender(device)
            .ok_or_else(|| DeviceError::NotFound(device.to_string()))?;

        match sender.try_send(SwitchCommand::DeleteAllFlows) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                debug!("Command queue for {} full, purge already pending", device);
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(DeviceError::Unreachable(format!(
                "command channel for {device} closed"
            ))),
        }
    }
}
