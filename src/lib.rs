//! SDNFW - SDN firewall controller
//!
//! The policy core of a software-defined-network firewall: it holds the
//! operating mode and the blacklist/whitelist rule sets, and makes every
//! change durable and effective on the managed switch immediately.
//!
//! # Architecture
//!
//! - [`core`] - Mode state machine, rule store and flow invalidation
//! - [`config`] - Configuration persistence
//! - [`audit`] - Event log of every accepted policy change
//! - [`validators`] - Input validation and sanitization
//! - [`utils`] - Utility functions (XDG directories)
//!
//! # Guarantees
//!
//! - Rule edits are rejected in pass-through mode
//! - Every accepted change is persisted before it takes effect
//! - A failed save leaves the controller state untouched
//! - Installed flows are purged after every accepted change

// Allow pedantic clippy warnings that are not worth fixing for this codebase
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_errors_doc)]

pub mod audit;
pub mod config;
pub mod core;
pub mod utils;
pub mod validators;

// Re-export commonly used types
pub use crate::core::controller::FirewallController;
pub use crate::core::error::{Error, Result};
pub use crate::core::firewall::{ListKind, Mode, Rule, RuleList};
