//! # Serial Transceiver
//!
//! Drives a USB radio bridge that forwards fixed-size link frames verbatim.
//!
//! The bridge (a microcontroller attached to the 2.4 GHz radio) exposes a
//! CDC serial port. Every frame written to the port is sent over the air as
//! one datagram, and every datagram received is written back as exactly
//! `FRAME_SIZE` bytes. Reads and writes block at most for the configured
//! port timeout.
//!
//! Bytes pass through a [`FrameSync`] so a stray, lost or leftover byte costs
//! at most a frame or two instead of misaligning every later read.

use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::sync::{FrameSync, SYNC_CAPACITY};
use super::transceiver::Transceiver;
use crate::config::RadioConfig;
use crate::error::{RcLinkError, Result};
use crate::packet::frame::FrameBytes;

/// Device paths tried when the configured port cannot be opened
const FALLBACK_DEVICE_PATHS: &[&str] = &[
    "/dev/ttyACM0", // USB CDC devices (most common for bridge firmware)
    "/dev/ttyUSB0", // USB-to-serial adapters
];

/// Serial port transceiver
pub struct SerialTransceiver {
    port: Box<dyn tokio_serial::SerialPort>,
    device_path: String,
    sync: FrameSync,
}

impl std::fmt::Debug for SerialTransceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransceiver")
            .field("device_path", &self.device_path)
            .field("resyncs", &self.sync.resyncs())
            .finish_non_exhaustive()
    }
}

impl SerialTransceiver {
    /// Open the bridge described by the radio configuration
    ///
    /// The configured port is tried first, then the usual USB device paths.
    ///
    /// # Errors
    ///
    /// Returns `SerialPortNotFound` listing every path tried if none opens
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rc_link::config::RadioConfig;
    /// use rc_link::radio::SerialTransceiver;
    ///
    /// let radio = SerialTransceiver::open(&RadioConfig::default())?;
    /// println!("Connected to: {}", radio.device_path());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(config: &RadioConfig) -> Result<Self> {
        let mut paths = vec![config.port.as_str()];
        paths.extend(FALLBACK_DEVICE_PATHS.iter().copied().filter(|p| *p != config.port));

        Self::open_with_paths(&paths, config.baud_rate, Duration::from_millis(config.timeout_ms))
    }

    /// Open the first path in `paths` that succeeds
    ///
    /// # Arguments
    ///
    /// * `paths` - Device paths to try, in order
    /// * `baud_rate` - Line rate of the bridge
    /// * `timeout` - Bound for every read and write
    pub fn open_with_paths(paths: &[&str], baud_rate: u32, timeout: Duration) -> Result<Self> {
        for path in paths {
            debug!("Trying to open serial port: {}", path);

            match Self::open_port(path, baud_rate, timeout) {
                Ok(port) => {
                    info!("Opened radio bridge at {} ({} baud)", path, baud_rate);
                    // Drop whatever the bridge sent before we were listening
                    if let Err(e) = port.clear(tokio_serial::ClearBuffer::All) {
                        warn!("Failed to clear {}: {}", path, e);
                    }
                    return Ok(Self {
                        port,
                        device_path: path.to_string(),
                        sync: FrameSync::new(),
                    });
                }
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                    continue;
                }
            }
        }

        Err(RcLinkError::SerialPortNotFound(paths.join(", ")))
    }

    // 8N1, no flow control
    fn open_port(path: &str, baud_rate: u32, timeout: Duration) -> Result<Box<dyn tokio_serial::SerialPort>> {
        tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(timeout)
            .open()
            .map_err(|e| RcLinkError::Serial(format!("Failed to open {}: {}", path, e)))
    }

    /// Path of the opened device (e.g. "/dev/ttyACM0")
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Times the byte stream had to be realigned to a frame boundary
    pub fn resyncs(&self) -> u32 {
        self.sync.resyncs()
    }
}

fn io_error(context: &str, err: std::io::Error) -> RcLinkError {
    match err.kind() {
        ErrorKind::TimedOut | ErrorKind::WouldBlock => RcLinkError::Timeout,
        _ => RcLinkError::Hardware(format!("{}: {}", context, err)),
    }
}

impl Transceiver for SerialTransceiver {
    fn transmit(&mut self, frame: &FrameBytes) -> Result<()> {
        self.port
            .write_all(frame)
            .map_err(|e| io_error("Failed to write frame", e))?;
        self.port
            .flush()
            .map_err(|e| io_error("Failed to flush serial port", e))?;
        Ok(())
    }

    fn is_data_available(&mut self) -> Result<bool> {
        if self.sync.has_frame() {
            return Ok(true);
        }

        let waiting = self
            .port
            .bytes_to_read()
            .map_err(|e| RcLinkError::Hardware(format!("Failed to query serial port: {}", e)))?;
        if waiting > 0 {
            self.sync
                .read_from(&mut self.port, (waiting as usize).min(SYNC_CAPACITY))
                .map_err(|e| io_error("Failed to read serial port", e))?;
        }

        Ok(self.sync.has_frame())
    }

    fn receive(&mut self, out: &mut FrameBytes) -> Result<()> {
        read_frame(&mut self.sync, &mut self.port, out)
    }
}

/// Read until the synchronizer yields a frame
///
/// Bytes of a partial frame stay buffered across a timeout.
fn read_frame<R: Read + ?Sized>(sync: &mut FrameSync, reader: &mut R, out: &mut FrameBytes) -> Result<()> {
    loop {
        if let Some(frame) = sync.next_frame() {
            *out = frame;
            return Ok(());
        }

        let wanted = sync.missing().max(1);
        match sync.read_from(reader, wanted) {
            Ok(0) => return Err(RcLinkError::Timeout),
            Ok(_) => {}
            Err(e) => return Err(io_error("Failed to read frame", e)),
        }
    }
}
