//! # Link Module
//!
//! Link protocol layer binding the packet codec to a transceiver.
//!
//! This module handles:
//! - Sequence continuity and missed-packet accounting
//! - Link timeout and loss-threshold detection (Active / Lost)
//! - Link statistics and link quality
//! - Role-specific send/receive for ground station and aircraft
//! - Failsafe command substitution on the aircraft side

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod session;
pub mod state;
pub mod stats;

pub use session::{LinkEvent, LinkSession, ReceivedCommand};
pub use state::{LinkState, LinkTransition, LossReason};
pub use stats::{LinkStats, RejectionKind};

/// Which end of the link a session serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Sends commands, receives telemetry
    #[default]
    Ground,
    /// Receives commands (with failsafe), sends telemetry
    Aircraft,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Ground => write!(f, "ground"),
            Role::Aircraft => write!(f, "aircraft"),
        }
    }
}
