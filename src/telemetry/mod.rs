//! # Telemetry Module
//!
//! Records link state and statistics to JSONL files with rotation.
//!
//! This module handles:
//! - Capturing link snapshots from a session
//! - Formatting as JSONL (JSON Lines)
//! - Writing to rotating log files
//! - Managing file rotation (max N records per file)
//! - Retaining only last M files

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::clock::Clock;
use crate::link::{LinkSession, LinkStats, Role};
use crate::radio::Transceiver;

pub mod logger;

pub use logger::TelemetryLogger;

/// One telemetry record: link state at a point in time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkSnapshot {
    /// RFC 3339 wall-clock time of capture
    pub timestamp: String,
    pub role: Role,
    pub link_active: bool,
    pub failsafe_active: bool,
    pub consecutive_missed: u16,
    pub time_since_rx_ms: Option<u32>,
    pub tx_sequence: u8,
    /// Absent when statistics are disabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<LinkStats>,
}

impl LinkSnapshot {
    /// Capture the current state of a session
    pub fn capture<R: Transceiver, C: Clock>(session: &LinkSession<R, C>) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            role: session.role(),
            link_active: session.is_link_active(),
            failsafe_active: session.is_failsafe_active(),
            consecutive_missed: session.consecutive_missed(),
            time_since_rx_ms: session.time_since_rx(),
            tx_sequence: session.tx_sequence(),
            stats: session.statistics(),
        }
    }
}
