//! # Link Session
//!
//! One owned session per radio link, binding the packet codec and the link
//! state tracker to a transceiver and a clock.
//!
//! The session reuses one TX and one RX frame buffer in place and performs
//! at most one transceiver attempt per call. Retry policy belongs to the
//! caller's control loop, which should call [`LinkSession::update`] at a
//! steady rate regardless of send/receive outcomes.

use std::fmt;

use tracing::{debug, info, warn};

use super::state::{LinkState, LinkTransition, LossReason};
use super::stats::{LinkStats, RejectionKind};
use super::Role;
use crate::clock::Clock;
use crate::config::LinkConfig;
use crate::error::{RcLinkError, Result};
use crate::packet::decoder::decode_frame;
use crate::packet::encoder::{encode_emergency, encode_heartbeat, encode_into, encode_payload_into};
use crate::packet::frame::{Frame, FrameBytes, PacketFlags, PacketType, FRAME_SIZE};
use crate::packet::payload::{CommandPayload, TelemetryPayload, WirePayload, CHANNEL_VALUE_MAX};
use crate::radio::Transceiver;

/// Observable link events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    LinkLost(LossReason),
    LinkRestored,
    /// Aircraft switched to failsafe values (once per outage)
    FailsafeActivated,
    FrameRejected(RejectionKind),
}

/// Command delivered to the aircraft application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceivedCommand {
    /// Freshly received from the ground station
    Live(CommandPayload),
    /// Substituted because the link is lost
    Failsafe(CommandPayload),
}

impl ReceivedCommand {
    pub fn command(&self) -> &CommandPayload {
        match self {
            ReceivedCommand::Live(command) | ReceivedCommand::Failsafe(command) => command,
        }
    }

    pub fn is_failsafe(&self) -> bool {
        matches!(self, ReceivedCommand::Failsafe(_))
    }
}

type EventHook = Box<dyn FnMut(&LinkEvent) + Send>;

/// Link session for one end of the link
pub struct LinkSession<R, C> {
    role: Role,
    radio: R,
    clock: C,
    state: LinkState,
    failsafe: CommandPayload,
    tx_frame: Frame,
    tx_buf: FrameBytes,
    rx_buf: FrameBytes,
    rx_frame: Frame,
    initialized: bool,
    event_hook: Option<EventHook>,
}

impl<R, C> fmt::Debug for LinkSession<R, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkSession")
            .field("role", &self.role)
            .field("state", &self.state)
            .field("failsafe", &self.failsafe)
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}

fn check_channels(command: &CommandPayload) -> Result<()> {
    match command.channels.iter().find(|&&v| v > CHANNEL_VALUE_MAX) {
        Some(value) => Err(RcLinkError::InvalidParameter(format!(
            "channel value {} exceeds {}",
            value, CHANNEL_VALUE_MAX
        ))),
        None => Ok(()),
    }
}

impl<R: Transceiver, C: Clock> LinkSession<R, C> {
    /// Create a session
    ///
    /// # Arguments
    ///
    /// * `role` - Which end of the link this session serves
    /// * `radio` - Transceiver owned by this session
    /// * `clock` - Monotonic millisecond clock
    /// * `config` - Timeout, loss threshold and statistics switch
    ///
    /// # Examples
    ///
    /// ```
    /// use rc_link::clock::ManualClock;
    /// use rc_link::config::LinkConfig;
    /// use rc_link::link::LinkSession;
    /// use rc_link::packet::payload::CommandPayload;
    /// use rc_link::radio::LoopbackTransceiver;
    ///
    /// let (ground_radio, aircraft_radio) = LoopbackTransceiver::pair();
    /// let clock = ManualClock::new(0);
    /// let config = LinkConfig::default();
    ///
    /// let mut ground = LinkSession::ground(ground_radio, clock.clone(), &config);
    /// let mut aircraft = LinkSession::aircraft(aircraft_radio, clock, &config);
    ///
    /// ground.send_command(&CommandPayload::neutral()).unwrap();
    /// let received = aircraft.receive_command().unwrap();
    /// assert!(!received.is_failsafe());
    /// ```
    pub fn new(role: Role, radio: R, clock: C, config: &LinkConfig) -> Self {
        let state = LinkState::new(config, clock.now_ms());

        Self {
            role,
            radio,
            clock,
            state,
            failsafe: CommandPayload::neutral(),
            tx_frame: Frame::default(),
            tx_buf: [0u8; FRAME_SIZE],
            rx_buf: [0u8; FRAME_SIZE],
            rx_frame: Frame::default(),
            initialized: true,
            event_hook: None,
        }
    }

    /// Ground station session: sends commands, receives telemetry
    pub fn ground(radio: R, clock: C, config: &LinkConfig) -> Self {
        Self::new(Role::Ground, radio, clock, config)
    }

    /// Aircraft session: receives commands with failsafe, sends telemetry
    pub fn aircraft(radio: R, clock: C, config: &LinkConfig) -> Self {
        Self::new(Role::Aircraft, radio, clock, config)
    }

    /// Replace the default (neutral) failsafe command
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if a channel value exceeds `CHANNEL_VALUE_MAX`
    pub fn with_failsafe(mut self, failsafe: CommandPayload) -> Result<Self> {
        check_channels(&failsafe)?;
        self.failsafe = failsafe;
        Ok(self)
    }

    /// Register an observer for link events
    pub fn set_event_hook<F>(&mut self, hook: F)
    where
        F: FnMut(&LinkEvent) + Send + 'static,
    {
        self.event_hook = Some(Box::new(hook));
    }

    pub fn role(&self) -> Role {
        self.role
    }

    // ---- Transmit ----

    /// Encode and transmit an application-defined payload
    ///
    /// `tx_sequence` advances only when the transceiver accepts the frame.
    ///
    /// # Errors
    ///
    /// - `PacketTooLarge` if `payload` exceeds `MAX_PAYLOAD`
    /// - any transceiver error, unchanged
    pub fn send_packet(&mut self, packet_type: PacketType, flags: PacketFlags, payload: &[u8]) -> Result<()> {
        self.ensure_initialized()?;
        encode_into(&mut self.tx_frame, packet_type, flags, self.state.tx_sequence(), payload)?;
        self.transmit_frame()
    }

    /// Send an RC command (ground only)
    pub fn send_command(&mut self, command: &CommandPayload) -> Result<()> {
        self.require_role(Role::Ground, "send_command")?;
        self.send_payload(PacketType::Command, command)
    }

    /// Send a telemetry report (aircraft only)
    pub fn send_telemetry(&mut self, telemetry: &TelemetryPayload) -> Result<()> {
        self.require_role(Role::Aircraft, "send_telemetry")?;
        self.send_payload(PacketType::Telemetry, telemetry)
    }

    /// Send an empty keep-alive frame
    pub fn send_heartbeat(&mut self) -> Result<()> {
        self.ensure_initialized()?;
        self.tx_frame = encode_heartbeat(self.state.tx_sequence());
        self.transmit_frame()
    }

    /// Send an empty emergency frame with the emergency flag set
    pub fn send_emergency(&mut self) -> Result<()> {
        self.ensure_initialized()?;
        self.tx_frame = encode_emergency(self.state.tx_sequence());
        warn!("Sending emergency frame (seq {})", self.state.tx_sequence());
        self.transmit_frame()
    }

    fn send_payload<P: WirePayload>(&mut self, packet_type: PacketType, payload: &P) -> Result<()> {
        self.ensure_initialized()?;
        encode_payload_into(
            &mut self.tx_frame,
            packet_type,
            PacketFlags::NONE,
            self.state.tx_sequence(),
            payload,
        )?;
        self.transmit_frame()
    }

    fn transmit_frame(&mut self) -> Result<()> {
        self.tx_frame.write_to(&mut self.tx_buf);

        if let Err(e) = self.radio.transmit(&self.tx_buf) {
            warn!("Failed to transmit frame (seq {}): {}", self.tx_frame.sequence, e);
            return Err(e);
        }

        debug!(
            "Sent frame type 0x{:02X} seq {} ({} bytes)",
            self.tx_frame.packet_type,
            self.tx_frame.sequence,
            self.tx_frame.wire_len()
        );
        self.state.record_sent();
        Ok(())
    }

    // ---- Receive ----

    /// Receive an application-defined payload of a given type and length
    ///
    /// # Returns
    ///
    /// * `Result<&[u8]>` - Validated payload, borrowed from the RX buffer
    ///
    /// # Errors
    ///
    /// - `NoData` if nothing is pending (normal polling outcome)
    /// - any frame validation or decoding error; the frame is counted and
    ///   the link state is left untouched
    /// - any transceiver error, unchanged
    pub fn receive_packet(&mut self, packet_type: PacketType, expected_len: usize) -> Result<&[u8]> {
        self.receive_frame(packet_type, expected_len)?;
        Ok(self.rx_frame.payload())
    }

    /// Receive a telemetry report (ground only)
    pub fn receive_telemetry(&mut self) -> Result<TelemetryPayload> {
        self.require_role(Role::Ground, "receive_telemetry")?;
        self.receive_frame(PacketType::Telemetry, TelemetryPayload::SIZE)?;
        TelemetryPayload::decode(self.rx_frame.payload())
    }

    /// Receive an RC command (aircraft only)
    ///
    /// While the link tracker reports the link as lost, any receive failure
    /// (including `NoData`) yields the stored failsafe command instead. A
    /// failed poll while the link is still active is returned as-is.
    ///
    /// A repeated or late command is still delivered as live and never counts
    /// toward the loss threshold.
    pub fn receive_command(&mut self) -> Result<ReceivedCommand> {
        self.require_role(Role::Aircraft, "receive_command")?;

        let result = self
            .receive_frame(PacketType::Command, CommandPayload::SIZE)
            .and_then(|()| CommandPayload::decode(self.rx_frame.payload()));

        match result {
            Ok(command) => Ok(ReceivedCommand::Live(command)),
            Err(_) if !self.state.is_active() => Ok(self.apply_failsafe()),
            Err(e) => Err(e),
        }
    }

    fn receive_frame(&mut self, packet_type: PacketType, expected_len: usize) -> Result<()> {
        self.ensure_initialized()?;

        if !self.radio.is_data_available()? {
            return Err(RcLinkError::NoData);
        }
        self.radio.receive(&mut self.rx_buf)?;
        self.rx_frame = Frame::from_bytes(&self.rx_buf);

        if let Err(e) = decode_frame(&self.rx_frame, packet_type, expected_len).map(|_| ()) {
            self.reject(&e);
            return Err(e);
        }

        debug!(
            "Received frame type 0x{:02X} seq {}",
            self.rx_frame.packet_type, self.rx_frame.sequence
        );

        let now = self.clock.now_ms();
        let transition = self.state.observe(self.rx_frame.sequence, now);
        self.handle_transition(transition);
        Ok(())
    }

    fn reject(&mut self, err: &RcLinkError) {
        if let Some(kind) = self.state.record_rejection(err) {
            warn!("Rejected frame: {}", err);
            self.emit(LinkEvent::FrameRejected(kind));
        }
    }

    fn apply_failsafe(&mut self) -> ReceivedCommand {
        if self.state.engage_failsafe() {
            warn!("Link lost, applying failsafe command: {:?}", self.failsafe.channels);
            self.emit(LinkEvent::FailsafeActivated);
        }
        ReceivedCommand::Failsafe(self.failsafe)
    }

    // ---- Link state ----

    /// Advance time-based link transitions and recompute link quality
    ///
    /// Performs no I/O.
    pub fn update(&mut self) -> Result<()> {
        self.ensure_initialized()?;
        let transition = self.state.update(self.clock.now_ms());
        self.handle_transition(transition);
        Ok(())
    }

    fn handle_transition(&mut self, transition: Option<LinkTransition>) {
        let event = match transition {
            Some(LinkTransition::Lost(reason)) => {
                match reason {
                    LossReason::Timeout { elapsed_ms } => {
                        warn!("Link lost: no valid frame for {} ms", elapsed_ms)
                    }
                    LossReason::MissedPackets { count } => {
                        warn!("Link lost: {} consecutive packets missed", count)
                    }
                }
                LinkEvent::LinkLost(reason)
            }
            Some(LinkTransition::Restored) => {
                info!("Link restored");
                LinkEvent::LinkRestored
            }
            None => return,
        };
        self.emit(event);
    }

    fn emit(&mut self, event: LinkEvent) {
        if let Some(hook) = self.event_hook.as_mut() {
            hook(&event);
        }
    }

    pub fn is_link_active(&self) -> bool {
        self.state.is_active()
    }

    pub fn is_failsafe_active(&self) -> bool {
        self.state.is_failsafe_active()
    }

    /// Milliseconds since the last accepted frame, `None` before the first
    pub fn time_since_rx(&self) -> Option<u32> {
        self.state.time_since_rx(self.clock.now_ms())
    }

    pub fn consecutive_missed(&self) -> u16 {
        self.state.consecutive_missed()
    }

    /// Sequence number the next transmitted frame will carry
    pub fn tx_sequence(&self) -> u8 {
        self.state.tx_sequence()
    }

    /// Snapshot of the statistics, `None` when disabled
    pub fn statistics(&self) -> Option<LinkStats> {
        self.state.stats().copied()
    }

    pub fn reset_statistics(&mut self) {
        self.state.reset_stats();
        info!("Link statistics reset");
    }

    // ---- Failsafe ----

    /// Replace the failsafe command; applies from the next lost-link receive
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if a channel value exceeds `CHANNEL_VALUE_MAX`
    pub fn set_failsafe(&mut self, failsafe: CommandPayload) -> Result<()> {
        check_channels(&failsafe)?;
        self.failsafe = failsafe;
        info!("Failsafe updated: {:?}", failsafe.channels);
        Ok(())
    }

    pub fn failsafe(&self) -> &CommandPayload {
        &self.failsafe
    }

    // ---- Lifecycle ----

    /// Power the transceiver down; every later call returns `NotInitialized`
    pub fn deinit(&mut self) -> Result<()> {
        self.ensure_initialized()?;
        self.initialized = false;
        self.radio.power_down()?;
        info!("Link session ({}) shut down", self.role);
        Ok(())
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(RcLinkError::NotInitialized)
        }
    }

    fn require_role(&self, role: Role, operation: &str) -> Result<()> {
        self.ensure_initialized()?;
        if self.role != role {
            return Err(RcLinkError::InvalidParameter(format!(
                "{} is not available on the {} side",
                operation, self.role
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::packet::decoder::validate_frame;
    use crate::packet::encoder::encode_payload;
    use crate::packet::frame::PAYLOAD_OFFSET;
    use crate::radio::{LoopbackTransceiver, MockTransceiver};
    use std::sync::{Arc, Mutex};

    type TestSession = LinkSession<LoopbackTransceiver, ManualClock>;

    struct Harness {
        ground: TestSession,
        aircraft: TestSession,
        ground_radio: LoopbackTransceiver,
        aircraft_radio: LoopbackTransceiver,
        clock: ManualClock,
    }

    fn harness(config: &LinkConfig) -> Harness {
        let (ground_radio, aircraft_radio) = LoopbackTransceiver::pair();
        let clock = ManualClock::new(0);

        Harness {
            ground: LinkSession::ground(ground_radio.clone(), clock.clone(), config),
            aircraft: LinkSession::aircraft(aircraft_radio.clone(), clock.clone(), config),
            ground_radio,
            aircraft_radio,
            clock,
        }
    }

    fn record_events(session: &mut TestSession) -> Arc<Mutex<Vec<LinkEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        session.set_event_hook(move |event| sink.lock().unwrap().push(*event));
        events
    }

    fn command_frame(sequence: u8) -> FrameBytes {
        let command = CommandPayload {
            channels: [1500, 1500, 1100, 1500, 2000, 1000, 1024, 1024],
            switches: 0b0000_0101,
            mode: 2,
        };
        encode_payload(PacketType::Command, sequence, &command).unwrap().to_bytes()
    }

    #[test]
    fn test_command_round_trip() {
        let mut h = harness(&LinkConfig::default());
        let mut command = CommandPayload::neutral();
        command.channels[0] = 1800;
        command.set_switch(3, true);

        h.ground.send_command(&command).unwrap();
        h.clock.advance(5);

        let received = h.aircraft.receive_command().unwrap();
        assert_eq!(received, ReceivedCommand::Live(command));
        assert_eq!(h.aircraft.time_since_rx(), Some(0));

        assert_eq!(h.ground.tx_sequence(), 1);
        assert_eq!(h.ground.statistics().unwrap().packets_sent, 1);
        assert_eq!(h.aircraft.statistics().unwrap().packets_received, 1);
    }

    #[test]
    fn test_telemetry_round_trip() {
        let mut h = harness(&LinkConfig::default());
        let telemetry = TelemetryPayload {
            gps_lat: 473_977_420,
            gps_lon: 85_455_940,
            battery_mv: 11_800,
            rssi: 87,
            ..TelemetryPayload::default()
        };

        h.aircraft.send_telemetry(&telemetry).unwrap();
        assert_eq!(h.ground.receive_telemetry().unwrap(), telemetry);
    }

    #[test]
    fn test_role_checks() {
        let mut h = harness(&LinkConfig::default());

        assert!(matches!(h.ground.receive_command(), Err(RcLinkError::InvalidParameter(_))));
        assert!(matches!(
            h.ground.send_telemetry(&TelemetryPayload::default()),
            Err(RcLinkError::InvalidParameter(_))
        ));
        assert!(matches!(
            h.aircraft.send_command(&CommandPayload::neutral()),
            Err(RcLinkError::InvalidParameter(_))
        ));
        assert!(matches!(h.aircraft.receive_telemetry(), Err(RcLinkError::InvalidParameter(_))));

        // Nothing went out
        assert_eq!(h.aircraft_radio.pending(), 0);
        assert_eq!(h.ground_radio.pending(), 0);
    }

    #[test]
    fn test_no_data_while_active_propagates() {
        let mut h = harness(&LinkConfig::default());

        assert!(matches!(h.aircraft.receive_command(), Err(RcLinkError::NoData)));
        assert!(!h.aircraft.is_failsafe_active());
        assert_eq!(h.aircraft.statistics().unwrap(), LinkStats::default());
    }

    #[test]
    fn test_failsafe_after_timeout_is_idempotent() {
        let mut h = harness(&LinkConfig::default());
        let events = record_events(&mut h.aircraft);

        h.ground.send_command(&CommandPayload::neutral()).unwrap();
        h.aircraft.receive_command().unwrap();

        h.clock.advance(1001);
        h.aircraft.update().unwrap();
        assert!(!h.aircraft.is_link_active());

        let failsafe = *h.aircraft.failsafe();
        for _ in 0..3 {
            let received = h.aircraft.receive_command().unwrap();
            assert_eq!(received, ReceivedCommand::Failsafe(failsafe));
        }

        let stats = h.aircraft.statistics().unwrap();
        assert_eq!(stats.failsafe_activations, 1);
        assert_eq!(stats.crc_errors, 0);
        assert_eq!(stats.version_mismatches, 0);
        assert!(h.aircraft.is_failsafe_active());

        assert_eq!(
            *events.lock().unwrap(),
            vec![
                LinkEvent::LinkLost(LossReason::Timeout { elapsed_ms: 1001 }),
                LinkEvent::FailsafeActivated,
            ]
        );
    }

    #[test]
    fn test_link_restored_after_failsafe() {
        let mut h = harness(&LinkConfig::default());
        let events = record_events(&mut h.aircraft);

        h.clock.advance(1500);
        h.aircraft.update().unwrap();
        assert!(h.aircraft.receive_command().unwrap().is_failsafe());

        h.ground.send_command(&CommandPayload::neutral()).unwrap();
        let received = h.aircraft.receive_command().unwrap();

        assert!(!received.is_failsafe());
        assert!(h.aircraft.is_link_active());
        assert!(!h.aircraft.is_failsafe_active());
        assert_eq!(events.lock().unwrap().last(), Some(&LinkEvent::LinkRestored));
    }

    #[test]
    fn test_failsafe_uses_configured_values() {
        let config = LinkConfig::default();
        let (_, aircraft_radio) = LoopbackTransceiver::pair();
        let clock = ManualClock::new(0);

        let mut custom = CommandPayload::neutral();
        custom.channels[4] = 2000;
        let mut aircraft = LinkSession::aircraft(aircraft_radio, clock.clone(), &config)
            .with_failsafe(custom)
            .unwrap();

        clock.advance(2000);
        aircraft.update().unwrap();
        assert_eq!(*aircraft.receive_command().unwrap().command(), custom);

        let mut replaced = custom;
        replaced.channels[4] = 1000;
        aircraft.set_failsafe(replaced).unwrap();
        assert_eq!(*aircraft.receive_command().unwrap().command(), replaced);
    }

    #[test]
    fn test_set_failsafe_rejects_out_of_range() {
        let mut h = harness(&LinkConfig::default());
        let mut bad = CommandPayload::neutral();
        bad.channels[7] = 2048;

        assert!(matches!(h.aircraft.set_failsafe(bad), Err(RcLinkError::InvalidParameter(_))));
        assert_eq!(*h.aircraft.failsafe(), CommandPayload::neutral());
    }

    #[test]
    fn test_corrupted_frame_rejected_without_touching_link_state() {
        let mut h = harness(&LinkConfig::default());
        let events = record_events(&mut h.aircraft);

        h.ground_radio.corrupt_next(PAYLOAD_OFFSET + 5, 0x10);
        h.ground.send_command(&CommandPayload::neutral()).unwrap();

        assert!(matches!(
            h.aircraft.receive_command(),
            Err(RcLinkError::ChecksumFailure { .. })
        ));
        assert_eq!(h.aircraft.time_since_rx(), None);

        let stats = h.aircraft.statistics().unwrap();
        assert_eq!(stats.crc_errors, 1);
        assert_eq!(stats.packets_received, 0);
        assert_eq!(
            *events.lock().unwrap(),
            vec![LinkEvent::FrameRejected(RejectionKind::Checksum)]
        );
    }

    #[test]
    fn test_version_mismatch_counted() {
        let mut h = harness(&LinkConfig::default());
        let mut frame = command_frame(1);
        frame[0] = 2;
        h.aircraft_radio.inject(frame);

        assert!(matches!(
            h.aircraft.receive_command(),
            Err(RcLinkError::VersionMismatch { expected: 1, actual: 2 })
        ));
        assert_eq!(h.aircraft.statistics().unwrap().version_mismatches, 1);
    }

    #[test]
    fn test_unexpected_type_rejected() {
        let mut h = harness(&LinkConfig::default());
        h.ground.send_heartbeat().unwrap();

        assert!(matches!(
            h.aircraft.receive_command(),
            Err(RcLinkError::UnexpectedPacketType { .. })
        ));
        let stats = h.aircraft.statistics().unwrap();
        assert_eq!(stats.type_mismatches, 1);
        assert_eq!(stats.packets_received, 0);
    }

    #[test]
    fn test_gap_after_corruption() {
        let mut h = harness(&LinkConfig::default());

        h.aircraft_radio.inject(command_frame(100));
        let mut corrupted = command_frame(101);
        corrupted[PAYLOAD_OFFSET] ^= 0xFF;
        h.aircraft_radio.inject(corrupted);
        let mut corrupted = command_frame(102);
        corrupted[PAYLOAD_OFFSET + 1] ^= 0x01;
        h.aircraft_radio.inject(corrupted);
        h.aircraft_radio.inject(command_frame(103));

        assert!(h.aircraft.receive_command().is_ok());
        assert!(h.aircraft.receive_command().is_err());
        assert!(h.aircraft.receive_command().is_err());
        assert!(h.aircraft.receive_command().is_ok());

        assert_eq!(h.aircraft.consecutive_missed(), 2);
        let stats = h.aircraft.statistics().unwrap();
        assert_eq!(stats.packets_missed, 2);
        assert_eq!(stats.crc_errors, 2);
        assert!(h.aircraft.is_link_active());
    }

    #[test]
    fn test_repeated_command_keeps_link() {
        let mut h = harness(&LinkConfig::default());

        h.aircraft_radio.inject(command_frame(10));
        h.aircraft_radio.inject(command_frame(10));

        assert!(matches!(h.aircraft.receive_command(), Ok(ReceivedCommand::Live(_))));
        assert!(matches!(h.aircraft.receive_command(), Ok(ReceivedCommand::Live(_))));
        assert!(h.aircraft.is_link_active());
        assert_eq!(h.aircraft.consecutive_missed(), 0);

        // Next empty poll is plain NoData, not failsafe
        assert!(matches!(h.aircraft.receive_command(), Err(RcLinkError::NoData)));
        assert!(!h.aircraft.is_failsafe_active());
        assert_eq!(h.aircraft.statistics().unwrap().packets_missed, 0);
    }

    #[test]
    fn test_dropped_frames_trip_loss_threshold() {
        let config = LinkConfig {
            loss_threshold: 3,
            ..LinkConfig::default()
        };
        let mut h = harness(&config);
        let events = record_events(&mut h.aircraft);

        h.ground.send_command(&CommandPayload::neutral()).unwrap();
        h.aircraft.receive_command().unwrap();

        h.ground_radio.drop_next(3);
        for _ in 0..4 {
            h.ground.send_command(&CommandPayload::neutral()).unwrap();
        }

        // The frame that reveals the gap is still delivered
        assert!(!h.aircraft.receive_command().unwrap().is_failsafe());
        assert!(!h.aircraft.is_link_active());
        assert_eq!(
            events.lock().unwrap().first(),
            Some(&LinkEvent::LinkLost(LossReason::MissedPackets { count: 3 }))
        );

        // Next empty poll falls back to failsafe
        assert!(h.aircraft.receive_command().unwrap().is_failsafe());
    }

    #[test]
    fn test_link_lost_after_silent_ticks() {
        let config = LinkConfig {
            link_timeout_ms: 1000,
            loss_threshold: 10,
            ..LinkConfig::default()
        };
        let mut h = harness(&config);

        for tick in 1..=12 {
            h.clock.advance(100);
            h.aircraft.update().unwrap();
            assert_eq!(h.aircraft.is_link_active(), tick <= 10, "tick {}", tick);
        }
        assert!(!h.aircraft.is_link_active());
    }

    #[test]
    fn test_heartbeat_and_emergency_frames() {
        let radio = LoopbackTransceiver::new();
        let mut ground = LinkSession::ground(radio.clone(), ManualClock::new(0), &LinkConfig::default());

        ground.send_heartbeat().unwrap();
        ground.send_emergency().unwrap();

        let sent = radio.take_sent();
        assert_eq!(sent.len(), 2);

        let heartbeat = Frame::from_bytes(&sent[0]);
        assert!(validate_frame(&heartbeat).is_ok());
        assert_eq!(heartbeat.kind().unwrap(), PacketType::Heartbeat);
        assert_eq!(heartbeat.sequence, 0);
        assert!(!heartbeat.is_emergency());

        let emergency = Frame::from_bytes(&sent[1]);
        assert!(validate_frame(&emergency).is_ok());
        assert_eq!(emergency.kind().unwrap(), PacketType::Emergency);
        assert_eq!(emergency.sequence, 1);
        assert!(emergency.flags.contains(PacketFlags::EMERGENCY));
    }

    #[test]
    fn test_generic_packet_round_trip() {
        let mut h = harness(&LinkConfig::default());

        h.ground
            .send_packet(PacketType::Telemetry, PacketFlags::ACK_REQUESTED, b"hello")
            .unwrap();
        let payload = h.aircraft.receive_packet(PacketType::Telemetry, 5).unwrap();
        assert_eq!(payload, b"hello");

        assert!(matches!(
            h.ground.send_packet(PacketType::Command, PacketFlags::NONE, &[0u8; 27]),
            Err(RcLinkError::PacketTooLarge { len: 27, max: 26 })
        ));
        assert_eq!(h.ground.tx_sequence(), 1);
    }

    #[test]
    fn test_tx_sequence_wraps_across_sends() {
        let radio = LoopbackTransceiver::new();
        let mut ground = LinkSession::ground(radio.clone(), ManualClock::new(0), &LinkConfig::default());

        for _ in 0..257 {
            ground.send_heartbeat().unwrap();
        }

        let sent = radio.take_sent();
        // Queue keeps the newest frames only
        let last = Frame::from_bytes(sent.last().unwrap());
        assert_eq!(last.sequence, 0);
        assert_eq!(ground.tx_sequence(), 1);
        assert_eq!(ground.statistics().unwrap().packets_sent, 257);
    }

    #[test]
    fn test_statistics_disabled() {
        let config = LinkConfig {
            enable_statistics: false,
            ..LinkConfig::default()
        };
        let mut h = harness(&config);

        h.ground.send_command(&CommandPayload::neutral()).unwrap();
        h.aircraft.receive_command().unwrap();

        assert!(h.ground.statistics().is_none());
        assert!(h.aircraft.statistics().is_none());
        assert_eq!(h.ground.tx_sequence(), 1);
    }

    #[test]
    fn test_reset_statistics_and_quality() {
        let mut h = harness(&LinkConfig::default());
        for _ in 0..4 {
            h.ground.send_command(&CommandPayload::neutral()).unwrap();
        }
        h.ground.update().unwrap();
        assert_eq!(h.ground.statistics().unwrap().link_quality, 100);

        h.ground.reset_statistics();
        assert_eq!(h.ground.statistics().unwrap(), LinkStats::default());
        assert_eq!(h.ground.tx_sequence(), 4);
    }

    #[test]
    fn test_transmit_failure_not_retried() {
        let mut radio = MockTransceiver::new();
        radio
            .expect_transmit()
            .times(1)
            .returning(|_| Err(RcLinkError::Hardware("SPI timeout".to_string())));

        let mut ground = LinkSession::ground(radio, ManualClock::new(0), &LinkConfig::default());

        match ground.send_command(&CommandPayload::neutral()) {
            Err(RcLinkError::Hardware(msg)) => assert_eq!(msg, "SPI timeout"),
            other => panic!("Expected Hardware error, got {:?}", other),
        }
        assert_eq!(ground.tx_sequence(), 0);
        assert_eq!(ground.statistics().unwrap().packets_sent, 0);
    }

    #[test]
    fn test_transmit_hands_over_whole_frame() {
        let mut radio = MockTransceiver::new();
        radio
            .expect_transmit()
            .withf(|frame: &FrameBytes| {
                let parsed = Frame::from_bytes(frame);
                validate_frame(&parsed).is_ok() && parsed.sequence == 0 && parsed.payload_len == 18
            })
            .times(1)
            .returning(|_| Ok(()));

        let mut ground = LinkSession::ground(radio, ManualClock::new(0), &LinkConfig::default());
        ground.send_command(&CommandPayload::neutral()).unwrap();
        assert_eq!(ground.tx_sequence(), 1);
    }

    #[test]
    fn test_availability_error_propagates() {
        let mut radio = MockTransceiver::new();
        radio
            .expect_is_data_available()
            .times(1)
            .returning(|| Err(RcLinkError::Hardware("bus fault".to_string())));
        radio.expect_receive().never();

        let mut aircraft = LinkSession::aircraft(radio, ManualClock::new(0), &LinkConfig::default());
        assert!(matches!(aircraft.receive_command(), Err(RcLinkError::Hardware(_))));
    }

    #[test]
    fn test_no_data_skips_receive() {
        let mut radio = MockTransceiver::new();
        radio.expect_is_data_available().times(1).returning(|| Ok(false));
        radio.expect_receive().never();

        let mut ground = LinkSession::ground(radio, ManualClock::new(0), &LinkConfig::default());
        assert!(matches!(ground.receive_telemetry(), Err(RcLinkError::NoData)));
    }

    #[test]
    fn test_deinit_powers_down() {
        let mut radio = MockTransceiver::new();
        radio.expect_power_down().times(1).returning(|| Ok(()));
        radio.expect_transmit().never();

        let mut ground = LinkSession::ground(radio, ManualClock::new(0), &LinkConfig::default());
        ground.deinit().unwrap();

        assert!(matches!(ground.send_heartbeat(), Err(RcLinkError::NotInitialized)));
        assert!(matches!(ground.update(), Err(RcLinkError::NotInitialized)));
        assert!(matches!(ground.deinit(), Err(RcLinkError::NotInitialized)));
    }

    #[test]
    fn test_receive_command_not_initialized_skips_failsafe() {
        let mut h = harness(&LinkConfig::default());
        h.clock.advance(5000);
        h.aircraft.update().unwrap();
        h.aircraft.deinit().unwrap();

        assert!(h.aircraft_radio.is_powered_down());
        assert!(matches!(h.aircraft.receive_command(), Err(RcLinkError::NotInitialized)));
    }
}
