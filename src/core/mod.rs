//! Core firewall policy functionality
//!
//! This module contains the policy authority and the pieces it coordinates:
//!
//! - [`firewall`]: Modes, rules and rule lists
//! - [`controller`]: The mode state machine and rule store behind one mutation pipeline
//! - [`flows`]: Flow invalidation on the managed switch
//! - [`switches`]: Registry of connected switches, the default device gateway
//! - [`error`]: Error types for controller operations

pub mod controller;
pub mod error;
pub mod firewall;
pub mod flows;
pub mod switches;

#[cfg(test)]
pub mod test_helpers;
