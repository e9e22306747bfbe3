//! Byte and packet storage shared by the protocol layers.

mod buffer;
mod ring;

pub use self::buffer::PacketBuffer;
pub use self::ring::Ring;
