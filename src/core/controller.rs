//! The firewall policy authority
//!
//! [`FirewallController`] owns the mode and both rule lists. Every mutation
//! runs through one pipeline:
//!
//! 1. check the request against the current mode
//! 2. apply it to a staged copy of the state
//! 3. persist the staged copy (abort on failure, state untouched)
//! 4. commit the staged copy
//! 5. append an audit event
//! 6. purge all flow records on the managed switch
//!
//! The write lock is held for the whole pipeline, so mutations are serialized
//! and readers never observe a change that is not yet persisted.

use crate::audit::{AuditEvent, AuditLog, EventType, Severity};
use crate::config::{ConfigStore, ControllerConfig, Topology};
use crate::core::error::{Error, Result};
use crate::core::firewall::{ListKind, Mode, Rule, RuleList};
use crate::core::flows::{DeviceGateway, FlowInvalidator};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

pub struct FirewallController {
    state: RwLock<ControllerConfig>,
    store: Arc<dyn ConfigStore>,
    invalidator: FlowInvalidator,
    audit: Option<AuditLog>,
}

impl FirewallController {
    /// Builds the controller from the last persisted configuration.
    ///
    /// A missing or corrupted configuration falls back to the defaults
    /// (pass-through, both lists empty); startup itself never fails.
    pub async fn start(
        store: Arc<dyn ConfigStore>,
        gateway: Arc<dyn DeviceGateway>,
        audit: Option<AuditLog>,
    ) -> Self {
        let (config, severity) = match store.load().await {
            Ok(Some(config)) => (config, Severity::Info),
            Ok(None) => {
                info!("No saved configuration, starting with defaults");
                (ControllerConfig::default(), Severity::Info)
            }
            Err(e) => {
                warn!("Saved configuration unusable, starting with defaults: {}", e);
                (ControllerConfig::default(), Severity::Warning)
            }
        };

        info!("Firewall started, initial mode: {}", config.mode);
        if let Some(audit) = &audit {
            let event = AuditEvent::info(
                EventType::ControllerStarted,
                format!("Firewall started, initial mode: {}", config.mode),
                json!({
                    "blacklist": config.blacklist.len(),
                    "whitelist": config.whitelist.len(),
                    "datapath_id": config.topology.datapath_id.to_string(),
                }),
            )
            .with_severity(severity);
            audit.record(event).await;
        }

        Self {
            invalidator: FlowInvalidator::new(config.topology.datapath_id, gateway),
            state: RwLock::new(config),
            store,
            audit,
        }
    }

    pub async fn mode(&self) -> Mode {
        self.state.read().await.mode
    }

    /// Copy of one rule list, regardless of the current mode
    pub async fn rules(&self, kind: ListKind) -> RuleList {
        self.state.read().await.list(kind).clone()
    }

    /// Copy of the list the current mode evaluates; empty in pass-through
    pub async fn active_rules(&self) -> RuleList {
        let state = self.state.read().await;
        state
            .mode
            .writable_list()
            .map(|kind| state.list(kind).clone())
            .unwrap_or_default()
    }

    pub async fn topology(&self) -> Topology {
        self.state.read().await.topology
    }

    /// Copy of the complete state as it was last persisted
    pub async fn snapshot(&self) -> ControllerConfig {
        self.state.read().await.clone()
    }

    pub fn invalidator(&self) -> &FlowInvalidator {
        &self.invalidator
    }

    /// Switches the operating mode.
    ///
    /// Always accepted, including a switch to the current mode; installed
    /// flows are purged either way.
    pub async fn set_mode(&self, mode: Mode) -> Result<()> {
        self.apply(|state| {
            info!("Mode changed to: {}", mode);
            let previous = std::mem::replace(&mut state.mode, mode);
            let event = AuditEvent::info(
                EventType::ModeChanged,
                format!("Mode changed to: {mode}"),
                json!({ "from": previous, "to": mode }),
            );
            Ok(((), event))
        })
        .await
    }

    /// Appends a rule to the list of the current mode; returns its index.
    pub async fn add_rule(&self, rule: Rule) -> Result<usize> {
        self.apply(|state| {
            let (kind, list) = writable_list(state)?;
            let (text, rule_id) = (rule.to_string(), rule.id);
            let index = list.push(rule);
            info!("Adding new rule to the {} rules set: {}", kind, text);
            let event = AuditEvent::info(
                EventType::RuleAdded,
                format!("Adding new rule to the {kind} rules set: {text}"),
                json!({ "list": kind, "index": index, "rule_id": rule_id }),
            );
            Ok((index, event))
        })
        .await
    }

    /// Removes the rule at `index` from the list of the current mode.
    pub async fn remove_rule(&self, index: usize) -> Result<Rule> {
        self.apply(|state| {
            let (kind, list) = writable_list(state)?;
            let rule = list.remove(index)?;
            info!("Removing rule from the {} rules set: {}", kind, rule);
            let event = AuditEvent::info(
                EventType::RuleRemoved,
                format!("Removing rule from the {kind} rules set: {rule}"),
                json!({ "list": kind, "index": index, "rule_id": rule.id }),
            );
            Ok((rule, event))
        })
        .await
    }

    /// Replaces the rule at `index`; the new rule is appended at the end of
    /// the list rather than taking the old rule's position.
    pub async fn edit_rule(&self, index: usize, rule: Rule) -> Result<Rule> {
        self.apply(|state| {
            let (kind, list) = writable_list(state)?;
            let (text, new_id) = (rule.to_string(), rule.id);
            let old = list.replace(index, rule)?;
            info!(
                "Replaced rule from the {} rules set: old: {} new: {}",
                kind, old, text
            );
            let event = AuditEvent::info(
                EventType::RuleEdited,
                format!("Replaced rule from the {kind} rules set: old: {old} new: {text}"),
                json!({ "list": kind, "index": index, "old_rule_id": old.id, "new_rule_id": new_id }),
            );
            Ok((old, event))
        })
        .await
    }

    /// validate → mutate → persist → commit → audit → invalidate
    async fn apply<T, F>(&self, change: F) -> Result<T>
    where
        F: FnOnce(&mut ControllerConfig) -> Result<(T, AuditEvent)>,
    {
        let mut state = self.state.write().await;

        let mut staged = state.clone();
        let (output, event) = change(&mut staged)?;

        if let Err(e) = self.store.save(&staged).await {
            error!("Failed to persist configuration, change discarded: {}", e);
            return Err(match e {
                Error::Persistence(_) => e,
                other => Error::Persistence(other.to_string()),
            });
        }
        *state = staged;

        if let Some(audit) = &self.audit {
            audit.record(event).await;
        }
        self.invalidator.invalidate_all().await;

        Ok(output)
    }
}

/// Mode guard shared by every rule operation
fn writable_list(state: &mut ControllerConfig) -> Result<(ListKind, &mut RuleList)> {
    let kind = state
        .mode
        .writable_list()
        .ok_or(Error::InvalidModeOperation { mode: state.mode })?;
    Ok((kind, state.list_mut(kind)))
}

impl std::fmt::Debug for FirewallController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirewallController")
            .field("invalidator", &self.invalidator)
            .field("audit", &self.audit)
            .finish_non_exhaustive()
    }
}
