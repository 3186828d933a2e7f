//! Firewall modes, rules and rule lists
//!
//! # Modes
//!
//! The controller runs in exactly one [`Mode`]:
//! - `PassThrough` - all traffic is forwarded, no list is writable
//! - `BlackList` - matching traffic is dropped, the blacklist is writable
//! - `WhiteList` - only matching traffic is forwarded, the whitelist is writable
//!
//! Both lists are kept in memory regardless of mode; switching modes never
//! discards the inactive list.
//!
//! # Example
//!
//! ```
//! use sdnfw::core::firewall::{Mode, Protocol, Rule, RuleDraft};
//!
//! let rule = Rule::from_draft(RuleDraft {
//!     label: "Block telnet".to_string(),
//!     protocol: Protocol::Tcp,
//!     source: None,
//!     destination: Some("10.0.0.0/8".parse().unwrap()),
//!     ports: Some((23, 23)),
//! })
//! .unwrap();
//!
//! assert_eq!(rule.to_string(), "\"Block telnet\" tcp any -> 10.0.0.0/8 dport 23");
//! assert!(Mode::PassThrough.writable_list().is_none());
//! ```

use crate::core::error::{Error, Result};
use crate::validators;
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Firewall operating mode
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    Default,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum Mode {
    /// Forward everything; rules are not evaluated
    #[default]
    #[strum(serialize = "passthrough")]
    PassThrough,
    /// Drop traffic matching the blacklist
    #[strum(serialize = "blacklist")]
    BlackList,
    /// Forward only traffic matching the whitelist
    #[strum(serialize = "whitelist")]
    WhiteList,
}

impl Mode {
    /// Which rule list, if any, may be edited in this mode.
    pub const fn writable_list(self) -> Option<ListKind> {
        match self {
            Mode::PassThrough => None,
            Mode::BlackList => Some(ListKind::Blacklist),
            Mode::WhiteList => Some(ListKind::Whitelist),
        }
    }
}

/// Identifies one of the two rule lists
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum ListKind {
    #[strum(to_string = "blacklist", serialize = "black")]
    Blacklist,
    #[strum(to_string = "whitelist", serialize = "white")]
    Whitelist,
}

/// Network protocol matched by a rule
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Default,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum Protocol {
    /// Match all protocols
    #[default]
    #[strum(serialize = "any")]
    Any,
    #[strum(serialize = "tcp")]
    Tcp,
    #[strum(serialize = "udp")]
    Udp,
    #[strum(serialize = "icmp")]
    Icmp,
}

impl Protocol {
    /// Whether transport ports are meaningful for this protocol
    pub const fn has_ports(self) -> bool {
        matches!(self, Protocol::Tcp | Protocol::Udp)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    pub fn single(port: u16) -> Self {
        Self {
            start: port,
            end: port,
        }
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// A single match descriptor stored in a rule list.
///
/// The action is implied by the list the rule lives in: blacklist rules drop,
/// whitelist rules forward. Rules are addressed by position, the `id` only
/// identifies a rule in logs and audit entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rule {
    pub id: Uuid,
    pub label: String,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default)]
    pub source: Option<IpNetwork>,
    #[serde(default)]
    pub destination: Option<IpNetwork>,
    /// Destination port range, only for TCP/UDP
    #[serde(default)]
    pub ports: Option<PortRange>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Unvalidated rule input, as collected from the CLI or an API caller
#[derive(Debug, Clone, Default)]
pub struct RuleDraft {
    pub label: String,
    pub protocol: Protocol,
    pub source: Option<IpNetwork>,
    pub destination: Option<IpNetwork>,
    pub ports: Option<(u16, u16)>,
}

impl Rule {
    /// Builds a rule from raw input, sanitizing the label and checking ports.
    pub fn from_draft(draft: RuleDraft) -> Result<Self> {
        let label = validators::validate_label(&draft.label)
            .map_err(|message| Error::validation("label", message))?;

        let ports = match draft.ports {
            Some((start, end)) => {
                if !draft.protocol.has_ports() {
                    return Err(Error::validation(
                        "ports",
                        format!("Ports require tcp or udp, got {}", draft.protocol),
                    ));
                }
                let (start, end) = validators::validate_port_range(start, end)
                    .map_err(|message| Error::validation("ports", message))?;
                Some(PortRange { start, end })
            }
            None => None,
        };

        Ok(Self {
            id: Uuid::new_v4(),
            label,
            protocol: draft.protocol,
            source: draft.source,
            destination: draft.destination,
            ports,
            created_at: chrono::Utc::now(),
        })
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" {}", self.label, self.protocol)?;
        match self.source {
            Some(src) => write!(f, " {src}")?,
            None => f.write_str(" any")?,
        }
        match self.destination {
            Some(dst) => write!(f, " -> {dst}")?,
            None => f.write_str(" -> any")?,
        }
        if let Some(ports) = self.ports {
            write!(f, " dport {ports}")?;
        }
        Ok(())
    }
}

/// Ordered list of rules; indices are dense and zero-based.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct RuleList {
    rules: Vec<Rule>,
}

impl RuleList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Rule> {
        self.rules.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    pub fn as_slice(&self) -> &[Rule] {
        &self.rules
    }

    /// Appends a rule; the new rule's index is the old length.
    pub fn push(&mut self, rule: Rule) -> usize {
        self.rules.push(rule);
        self.rules.len() - 1
    }

    /// Removes the rule at `index`, shifting later rules down by one.
    pub fn remove(&mut self, index: usize) -> Result<Rule> {
        if index >= self.rules.len() {
            return Err(Error::RuleNotFound {
                index,
                len: self.rules.len(),
            });
        }
        Ok(self.rules.remove(index))
    }

    /// Removes the rule at `index` and appends `rule` at the end of the
    /// shortened list. The edited rule therefore moves to the tail.
    pub fn replace(&mut self, index: usize, rule: Rule) -> Result<Rule> {
        let old = self.remove(index)?;
        self.rules.push(rule);
        Ok(old)
    }
}

impl From<Vec<Rule>> for RuleList {
    fn from(rules: Vec<Rule>) -> Self {
        Self { rules }
    }
}

impl<'a> IntoIterator for &'a RuleList {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}
