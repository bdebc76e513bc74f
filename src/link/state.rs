//! # Link State Tracker
//!
//! Pure state machine classifying the link as Active or Lost.
//!
//! Two independent triggers are evaluated on every update tick and every
//! accepted frame:
//!
//! - **Timeout**: more than `link_timeout_ms` since the last accepted frame
//!   (or since start, before anything was received).
//! - **Loss threshold**: `consecutive_missed`, inferred from sequence gaps,
//!   has reached `loss_threshold`.
//!
//! The link is Active iff neither trigger holds. Entering Active from Lost
//! resets `consecutive_missed`. The tracker never blocks or retries.
//!
//! Sequence gaps are read in a half window: gaps below `STALE_GAP` are loss,
//! larger wrapped gaps are duplicates or late frames and are ignored.

use tracing::debug;

use super::stats::{LinkStats, RejectionKind};
use crate::config::LinkConfig;
use crate::error::RcLinkError;

/// Smallest wrapped gap treated as a stale (duplicate or reordered) frame
pub const STALE_GAP: u8 = 128;

/// Why the link was declared lost
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossReason {
    /// Nothing accepted for longer than the link timeout
    Timeout { elapsed_ms: u32 },
    /// Missed-packet count reached the loss threshold
    MissedPackets { count: u16 },
}

/// Observable Active/Lost transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkTransition {
    Lost(LossReason),
    Restored,
}

/// Per-session link state
#[derive(Debug, Clone)]
pub struct LinkState {
    link_timeout_ms: u32,
    loss_threshold: u16,
    started_at_ms: u32,
    tx_sequence: u8,
    rx_sequence_last: Option<u8>,
    last_rx_time_ms: Option<u32>,
    consecutive_missed: u16,
    link_active: bool,
    failsafe_active: bool,
    stats: Option<LinkStats>,
}

impl LinkState {
    /// Fresh state: counters zero, link optimistically Active
    pub fn new(config: &LinkConfig, now_ms: u32) -> Self {
        Self {
            link_timeout_ms: config.link_timeout_ms,
            loss_threshold: config.loss_threshold.max(1),
            started_at_ms: now_ms,
            tx_sequence: 0,
            rx_sequence_last: None,
            last_rx_time_ms: None,
            consecutive_missed: 0,
            link_active: true,
            failsafe_active: false,
            stats: config.enable_statistics.then(LinkStats::default),
        }
    }

    /// Sequence number for the next outgoing frame
    pub fn tx_sequence(&self) -> u8 {
        self.tx_sequence
    }

    /// Account for a frame the transceiver accepted
    pub fn record_sent(&mut self) {
        self.tx_sequence = self.tx_sequence.wrapping_add(1);
        if let Some(stats) = &mut self.stats {
            stats.packets_sent = stats.packets_sent.saturating_add(1);
        }
    }

    /// Account for an accepted (validated) frame
    ///
    /// A forward gap adds at most `loss_threshold` missed frames. A frame at
    /// or behind the last sequence (wrapped gap of `STALE_GAP` or more) is a
    /// duplicate or reordered frame: it counts as reception but neither adds
    /// missed frames nor moves the sequence baseline.
    pub fn observe(&mut self, sequence: u8, now_ms: u32) -> Option<LinkTransition> {
        match self.rx_sequence_last {
            Some(last) => {
                let gap = sequence.wrapping_sub(last.wrapping_add(1));

                if gap >= STALE_GAP {
                    debug!("Stale sequence {} (last {}), not counted as loss", sequence, last);
                } else if gap > 0 {
                    let counted = u16::from(gap).min(self.loss_threshold);
                    self.consecutive_missed = self.consecutive_missed.saturating_add(counted);

                    if let Some(stats) = &mut self.stats {
                        stats.packets_missed = stats.packets_missed.saturating_add(u32::from(counted));
                    }

                    debug!(
                        "Sequence gap: expected {}, got {} (counted {} missed)",
                        last.wrapping_add(1),
                        sequence,
                        counted
                    );
                    self.rx_sequence_last = Some(sequence);
                } else {
                    self.consecutive_missed = 0;
                    self.rx_sequence_last = Some(sequence);
                }
            }
            None => self.rx_sequence_last = Some(sequence),
        }

        self.last_rx_time_ms = Some(now_ms);
        self.failsafe_active = false;

        if let Some(stats) = &mut self.stats {
            stats.packets_received = stats.packets_received.saturating_add(1);
        }

        self.evaluate(now_ms)
    }

    /// Periodic tick: time-based transitions and link quality
    pub fn update(&mut self, now_ms: u32) -> Option<LinkTransition> {
        let transition = self.evaluate(now_ms);

        if let Some(stats) = &mut self.stats {
            stats.update_link_quality();
        }

        transition
    }

    /// Count a rejected frame; returns its kind, or `None` for non-frame errors
    ///
    /// Sequence and timeout state are never touched here.
    pub fn record_rejection(&mut self, err: &RcLinkError) -> Option<RejectionKind> {
        let kind = RejectionKind::classify(err)?;
        if let Some(stats) = &mut self.stats {
            stats.record_rejection(kind);
        }
        Some(kind)
    }

    /// Mark failsafe as engaged; `true` only on the first call while lost
    pub fn engage_failsafe(&mut self) -> bool {
        if self.failsafe_active {
            return false;
        }

        self.failsafe_active = true;
        if let Some(stats) = &mut self.stats {
            stats.failsafe_activations = stats.failsafe_activations.saturating_add(1);
        }
        true
    }

    pub fn is_active(&self) -> bool {
        self.link_active
    }

    pub fn is_failsafe_active(&self) -> bool {
        self.failsafe_active
    }

    pub fn consecutive_missed(&self) -> u16 {
        self.consecutive_missed
    }

    pub fn rx_sequence_last(&self) -> Option<u8> {
        self.rx_sequence_last
    }

    pub fn last_rx_time_ms(&self) -> Option<u32> {
        self.last_rx_time_ms
    }

    /// Milliseconds since the last accepted frame, `None` if nothing yet
    pub fn time_since_rx(&self, now_ms: u32) -> Option<u32> {
        self.last_rx_time_ms.map(|last| now_ms.wrapping_sub(last))
    }

    /// Statistics, `None` when disabled
    pub fn stats(&self) -> Option<&LinkStats> {
        self.stats.as_ref()
    }

    /// Zero all statistics counters (no-op when disabled)
    pub fn reset_stats(&mut self) {
        if let Some(stats) = &mut self.stats {
            *stats = LinkStats::default();
        }
    }

    fn evaluate(&mut self, now_ms: u32) -> Option<LinkTransition> {
        let reference = self.last_rx_time_ms.unwrap_or(self.started_at_ms);
        let elapsed_ms = now_ms.wrapping_sub(reference);

        let timed_out = elapsed_ms > self.link_timeout_ms;
        let threshold_reached = self.consecutive_missed >= self.loss_threshold;

        let was_active = self.link_active;
        self.link_active = !timed_out && !threshold_reached;

        match (was_active, self.link_active) {
            (true, false) if timed_out => Some(LinkTransition::Lost(LossReason::Timeout { elapsed_ms })),
            (true, false) => Some(LinkTransition::Lost(LossReason::MissedPackets {
                count: self.consecutive_missed,
            })),
            (false, true) => {
                self.consecutive_missed = 0;
                Some(LinkTransition::Restored)
            }
            _ => None,
        }
    }
}
