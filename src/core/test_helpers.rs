//! Shared test utilities for core module tests
//!
//! Provides recording doubles for the persistence and device gateways. Both
//! write into one [`CallJournal`] so tests can assert the order of side
//! effects across collaborators. This module is only compiled in test mode.

use crate::config::{ConfigStore, ControllerConfig};
use crate::core::controller::FirewallController;
use crate::core::error::{DeviceError, Error, Result};
use crate::core::firewall::{Mode, PortRange, Protocol, Rule};
use crate::core::flows::{DatapathId, DeviceGateway};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// A side effect observed by a recording double
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Save(ControllerConfig),
    Invalidate(DatapathId),
}

/// Ordered log of calls shared between doubles
#[derive(Debug, Clone, Default)]
pub struct CallJournal(Arc<Mutex<Vec<Call>>>);

impl CallJournal {
    pub fn push(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }

    /// Call kinds only, for order assertions
    pub fn kinds(&self) -> Vec<&'static str> {
        self.calls()
            .iter()
            .map(|c| match c {
                Call::Save(_) => "save",
                Call::Invalidate(_) => "invalidate",
            })
            .collect()
    }
}

/// In-memory `ConfigStore` that records every save
#[derive(Debug)]
pub struct RecordingStore {
    journal: CallJournal,
    initial: std::result::Result<Option<ControllerConfig>, String>,
    failing: AtomicBool,
}

impl RecordingStore {
    /// Store with nothing saved yet
    pub fn empty(journal: CallJournal) -> Self {
        Self {
            journal,
            initial: Ok(None),
            failing: AtomicBool::new(false),
        }
    }

    pub fn with_config(journal: CallJournal, config: ControllerConfig) -> Self {
        Self {
            initial: Ok(Some(config)),
            ..Self::empty(journal)
        }
    }

    /// Store whose saved data fails to load
    pub fn corrupted(journal: CallJournal) -> Self {
        Self {
            initial: Err("checksum mismatch".to_string()),
            ..Self::empty(journal)
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConfigStore for RecordingStore {
    async fn load(&self) -> Result<Option<ControllerConfig>> {
        self.initial.clone().map_err(Error::Corrupted)
    }

    async fn save(&self, config: &ControllerConfig) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::StorageFull,
                "disk full",
            )));
        }
        self.journal.push(Call::Save(config.clone()));
        Ok(())
    }
}

/// `DeviceGateway` double that records invalidation requests
#[derive(Debug)]
pub struct RecordingGateway {
    journal: CallJournal,
    known: AtomicBool,
    failing: bool,
}

impl RecordingGateway {
    pub fn connected(journal: CallJournal) -> Self {
        Self {
            journal,
            known: AtomicBool::new(true),
            failing: false,
        }
    }

    pub fn disconnected(journal: CallJournal) -> Self {
        Self {
            journal,
            known: AtomicBool::new(false),
            failing: false,
        }
    }

    /// Known to the controller, but every request fails
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn set_connected(&self, connected: bool) {
        self.known.store(connected, Ordering::SeqCst);
    }
}

#[async_trait]
impl DeviceGateway for RecordingGateway {
    fn is_device_known(&self, _device: DatapathId) -> bool {
        self.known.load(Ordering::SeqCst)
    }

    async fn remove_all_flow_records(&self, device: DatapathId) -> std::result::Result<(), DeviceError> {
        self.journal.push(Call::Invalidate(device));
        if self.failing {
            return Err(DeviceError::Unreachable("connection reset".to_string()));
        }
        Ok(())
    }
}

/// Controller wired to recording doubles
pub struct TestController {
    pub controller: FirewallController,
    pub journal: CallJournal,
    pub store: Arc<RecordingStore>,
    pub gateway: Arc<RecordingGateway>,
}

/// Starts a controller in `mode` with empty lists and a connected switch.
///
/// The journal is empty when this returns.
pub async fn controller_in(mode: Mode) -> TestController {
    let config = ControllerConfig {
        mode,
        ..ControllerConfig::default()
    };
    controller_with(config).await
}

pub async fn controller_with(config: ControllerConfig) -> TestController {
    let journal = CallJournal::default();
    let store = Arc::new(RecordingStore::with_config(journal.clone(), config));
    let gateway = Arc::new(RecordingGateway::connected(journal.clone()));
    let controller = FirewallController::start(store.clone(), gateway.clone(), None).await;
    TestController {
        controller,
        journal,
        store,
        gateway,
    }
}

/// Creates a TCP test rule with customizable label and port.
///
/// # Arguments
///
/// * `label` - The rule label
/// * `port` - Optional destination port (None for no port filtering)
pub fn create_test_rule(label: &str, port: Option<u16>) -> Rule {
    Rule {
        id: Uuid::new_v4(),
        label: label.to_string(),
        protocol: Protocol::Tcp,
        source: None,
        destination: None,
        ports: port.map(PortRange::single),
        created_at: Utc::now(),
    }
}

/// Creates a rule matching traffic from `source`
pub fn create_source_rule(label: &str, source: &str) -> Rule {
    Rule {
        source: Some(source.parse().unwrap()),
        protocol: Protocol::Any,
        ..create_test_rule(label, None)
    }
}
