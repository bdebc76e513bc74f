//! Transceiver abstraction to decouple the link from radio hardware

use crate::error::Result;
use crate::packet::frame::FrameBytes;

/// Unreliable datagram transport for whole frames
///
/// Implementations may block inside `transmit` and `receive` only up to their
/// own bounded hardware timeout. Frames are not reordered in flight.
#[cfg_attr(test, mockall::automock)]
pub trait Transceiver {
    /// Send one frame
    fn transmit(&mut self, frame: &FrameBytes) -> Result<()>;

    /// `true` if a complete frame is waiting; never blocks
    fn is_data_available(&mut self) -> Result<bool>;

    /// Read one complete frame into `out`
    fn receive(&mut self, out: &mut FrameBytes) -> Result<()>;

    /// Put the radio into its low-power state
    fn power_down(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<T: Transceiver + ?Sized> Transceiver for Box<T> {
    fn transmit(&mut self, frame: &FrameBytes) -> Result<()> {
        (**self).transmit(frame)
    }

    fn is_data_available(&mut self) -> Result<bool> {
        (**self).is_data_available()
    }

    fn receive(&mut self, out: &mut FrameBytes) -> Result<()> {
        (**self).receive(out)
    }

    fn power_down(&mut self) -> Result<()> {
        (**self).power_down()
    }
}
