#[cfg(test)]
#[macro_use]
extern crate assert_matches;
#[macro_use]
extern crate log;

pub mod core;

#[cfg(target_os = "linux")]
pub mod linux;

use crate::core::dev::Error as DevError;
use crate::core::repr::Icmpv4DestinationUnreachable;

#[derive(Debug)]
pub enum Error {
    /// Indicates an error where a buffer is too small or has no room left.
    Exhausted,
    /// Indicates an error where a packet or frame is malformed.
    Malformed,
    /// Indicates an error where a checksum is invalid.
    Checksum,
    /// Indicates a well formed packet which is not addressed to or handled by
    /// the interface.
    Ignored,
    /// Indicates an upper layer rejected a datagram and the sender should be
    /// notified via ICMP.
    Unreachable(Icmpv4DestinationUnreachable),
    /// Indicates an error with the underlying device.
    Device(DevError),
}

impl From<DevError> for Error {
    fn from(err: DevError) -> Self {
        Error::Device(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
