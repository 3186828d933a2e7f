//! Flow invalidation
//!
//! Every accepted policy change purges all forwarding entries on the managed
//! switch, so the next packet of every flow is re-evaluated against the new
//! policy. The switch itself is reached through a [`DeviceGateway`].

use crate::core::error::DeviceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// OpenFlow datapath identifier of a switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatapathId(pub u64);

impl fmt::Display for DatapathId {
    /// Formats as eight colon-separated hex octets, e.g. `00:00:00:00:00:00:00:01`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0.to_be_bytes();
        for (i, byte) in bytes.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl FromStr for DatapathId {
    type Err = String;

    /// Accepts the colon-separated form, a `0x` hex literal or a decimal number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parsed = if s.contains(':') {
            let hex: String = s.split(':').collect();
            if hex.len() > 16 {
                return Err(format!("Datapath id too long: {s}"));
            }
            u64::from_str_radix(&hex, 16)
        } else if let Some(hex) = s.strip_prefix("0x") {
            u64::from_str_radix(hex, 16)
        } else {
            s.parse::<u64>()
        };
        parsed
            .map(DatapathId)
            .map_err(|_| format!("Invalid datapath id: {s}"))
    }
}

/// Access to the switches currently connected to the controller
#[async_trait]
pub trait DeviceGateway: Send + Sync {
    /// Whether the switch has announced itself and is still connected
    fn is_device_known(&self, device: DatapathId) -> bool;

    /// Deletes every flow entry installed on the switch
    async fn remove_all_flow_records(&self, device: DatapathId) -> Result<(), DeviceError>;
}

/// Result of a single invalidation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationOutcome {
    /// Flow records were removed from the switch
    Purged,
    /// The switch is not connected; nothing to invalidate
    DeviceAbsent,
    /// The switch is known but the request failed
    Failed(DeviceError),
}

/// Dispatches "remove all flow records" to the managed switch.
///
/// Holds no state beyond the target datapath id.
#[derive(Clone)]
pub struct FlowInvalidator {
    device: DatapathId,
    gateway: Arc<dyn DeviceGateway>,
}

impl FlowInvalidator {
    pub fn new(device: DatapathId, gateway: Arc<dyn DeviceGateway>) -> Self {
        Self { device, gateway }
    }

    pub fn device(&self) -> DatapathId {
        self.device
    }

    /// Purges all active flow records on the managed switch.
    ///
    /// Never fails: a disconnected switch has nothing installed worth purging,
    /// and an unreachable one is logged and left alone.
    pub async fn invalidate_all(&self) -> InvalidationOutcome {
        if !self.gateway.is_device_known(self.device) {
            debug!("Switch {} not connected, skipping flow invalidation", self.device);
            return InvalidationOutcome::DeviceAbsent;
        }

        info!("Removing all active flow records from switch {}", self.device);
        match self.gateway.remove_all_flow_records(self.device).await {
            Ok(()) => InvalidationOutcome::Purged,
            // Disconnected between the lookup and the request
            Err(DeviceError::NotFound(_)) => {
                debug!("Switch {} disconnected during invalidation", self.device);
                InvalidationOutcome::DeviceAbsent
            }
            Err(e) => {
                warn!("Failed to remove flow records from switch {}: {}", self.device, e);
                InvalidationOutcome::Failed(e)
            }
        }
    }
}

impl fmt::Debug for FlowInvalidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowInvalidator")
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}
