use byteorder::{
    NetworkEndian,
    ReadBytesExt,
    WriteBytesExt,
};

use crate::core::check::{
    internet_checksum,
    is_valid,
};
use crate::{
    Error,
    Result,
};

/// Safe representation of an ICMP header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Repr {
    EchoReply {
        id: u16,
        seq: u16,
    },
    EchoRequest {
        id: u16,
        seq: u16,
    },
    /// Carries the offending IPv4 header plus up to 8 bytes of its payload,
    /// embedded_len bytes in total.
    DestinationUnreachable {
        reason: DestinationUnreachable,
        embedded_len: usize,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DestinationUnreachable {
    NetUnreachable = 0,
    HostUnreachable = 1,
    ProtocolUnreachable = 2,
    PortUnreachable = 3,
}

impl DestinationUnreachable {
    fn from_code(code: u8) -> Option<DestinationUnreachable> {
        match code {
            0 => Some(DestinationUnreachable::NetUnreachable),
            1 => Some(DestinationUnreachable::HostUnreachable),
            2 => Some(DestinationUnreachable::ProtocolUnreachable),
            3 => Some(DestinationUnreachable::PortUnreachable),
            _ => None,
        }
    }
}

/// ICMP message types.
pub mod types {
    pub const ECHO_REPLY: u8 = 0;

    pub const DESTINATION_UNREACHABLE: u8 = 3;

    pub const ECHO_REQUEST: u8 = 8;
}

impl Repr {
    /// Returns the ICMP packet size needed to serialize this ICMP
    /// representation, excluding any echo payload.
    pub fn buffer_len(&self) -> usize {
        match *self {
            Repr::DestinationUnreachable { embedded_len, .. } => {
                Packet::<&[u8]>::HEADER_LEN + embedded_len
            }
            _ => Packet::<&[u8]>::HEADER_LEN,
        }
    }

    /// Tries to deserialize a packet into an ICMP representation.
    pub fn deserialize<T>(packet: &Packet<T>) -> Result<Repr>
    where
        T: AsRef<[u8]>,
    {
        let echo_id_seq = || {
            let header = packet.header();
            (
                (&header[0 .. 2]).read_u16::<NetworkEndian>().unwrap(),
                (&header[2 .. 4]).read_u16::<NetworkEndian>().unwrap(),
            )
        };

        match (packet._type(), packet.code()) {
            (types::ECHO_REPLY, 0) => {
                let (id, seq) = echo_id_seq();
                Ok(Repr::EchoReply { id, seq })
            }
            (types::ECHO_REQUEST, 0) => {
                let (id, seq) = echo_id_seq();
                Ok(Repr::EchoRequest { id, seq })
            }
            (types::DESTINATION_UNREACHABLE, code) => {
                // IP header (20 bytes) minimum!
                if packet.payload().len() < 20 {
                    return Err(Error::Malformed);
                }
                match DestinationUnreachable::from_code(code) {
                    Some(reason) => Ok(Repr::DestinationUnreachable {
                        reason,
                        embedded_len: packet.payload().len(),
                    }),
                    None => Err(Error::Ignored),
                }
            }
            _ => Err(Error::Ignored),
        }
    }

    /// Serializes the ICMP header into a packet and fills in the checksum.
    ///
    /// The payload (echo data, or the embedded datagram) must be written
    /// before calling this, since the checksum covers it.
    pub fn serialize<T>(&self, packet: &mut Packet<T>) -> Result<()>
    where
        T: AsRef<[u8]> + AsMut<[u8]>,
    {
        if packet.as_ref().len() < self.buffer_len() {
            return Err(Error::Exhausted);
        }

        let (type_of, code, id, seq) = match *self {
            Repr::EchoReply { id, seq } => (types::ECHO_REPLY, 0, id, seq),
            Repr::EchoRequest { id, seq } => (types::ECHO_REQUEST, 0, id, seq),
            Repr::DestinationUnreachable { reason, .. } => {
                (types::DESTINATION_UNREACHABLE, reason as u8, 0, 0)
            }
        };

        packet.set_type(type_of);
        packet.set_code(code);
        (&mut packet.header_mut()[0 .. 2])
            .write_u16::<NetworkEndian>(id)
            .unwrap();
        (&mut packet.header_mut()[2 .. 4])
            .write_u16::<NetworkEndian>(seq)
            .unwrap();
        packet.fill_checksum();

        Ok(())
    }
}

/// [https://en.wikipedia.org/wiki/Internet_Control_Message_Protocol](https://en.wikipedia.org/wiki/Internet_Control_Message_Protocol)
mod fields {
    use std::ops::{
        Range,
        RangeFrom,
    };

    pub const TYPE: usize = 0;

    pub const CODE: usize = 1;

    pub const CHECKSUM: Range<usize> = 2 .. 4;

    pub const HEADER: Range<usize> = 4 .. 8;

    pub const PAYLOAD: RangeFrom<usize> = 8 ..;
}

/// View of a byte buffer as an ICMP packet.
#[derive(Debug)]
pub struct Packet<T: AsRef<[u8]>> {
    buffer: T,
}

impl<T: AsRef<[u8]>> AsRef<[u8]> for Packet<T> {
    fn as_ref(&self) -> &[u8] {
        self.buffer.as_ref()
    }
}

impl<T: AsRef<[u8]>> Packet<T> {
    pub const HEADER_LEN: usize = 8;

    /// Tries to create an ICMP packet view over a byte buffer.
    pub fn try_new(buffer: T) -> Result<Packet<T>> {
        if buffer.as_ref().len() < Self::HEADER_LEN {
            Err(Error::Exhausted)
        } else {
            Ok(Packet { buffer })
        }
    }

    /// Returns the length of an ICMP packet with the specified payload size.
    pub fn buffer_len(payload_len: usize) -> usize {
        Self::HEADER_LEN + payload_len
    }

    /// Checks if the packet has a valid checksum.
    pub fn check_encoding(&self) -> Result<()> {
        if !is_valid(self.buffer.as_ref()) {
            Err(Error::Checksum)
        } else {
            Ok(())
        }
    }

    /// Calculates the packet checksum, including the checksum field.
    pub fn gen_packet_checksum(&self) -> u16 {
        internet_checksum(self.buffer.as_ref())
    }

    pub fn _type(&self) -> u8 {
        self.buffer.as_ref()[fields::TYPE]
    }

    pub fn code(&self) -> u8 {
        self.buffer.as_ref()[fields::CODE]
    }

    pub fn checksum(&self) -> u16 {
        (&self.buffer.as_ref()[fields::CHECKSUM])
            .read_u16::<NetworkEndian>()
            .unwrap()
    }

    pub fn header(&self) -> &[u8] {
        &self.buffer.as_ref()[fields::HEADER]
    }

    pub fn payload(&self) -> &[u8] {
        &self.buffer.as_ref()[fields::PAYLOAD]
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Packet<T> {
    pub fn set_type(&mut self, type_of: u8) {
        self.buffer.as_mut()[fields::TYPE] = type_of
    }

    pub fn set_code(&mut self, code: u8) {
        self.buffer.as_mut()[fields::CODE] = code;
    }

    pub fn set_checksum(&mut self, checksum: u16) {
        (&mut self.buffer.as_mut()[fields::CHECKSUM])
            .write_u16::<NetworkEndian>(checksum)
            .unwrap()
    }

    /// Zeroes the checksum field, then fills in the checksum over the whole
    /// message.
    pub fn fill_checksum(&mut self) {
        self.set_checksum(0);
        let checksum = self.gen_packet_checksum();
        self.set_checksum(checksum);
    }

    pub fn header_mut(&mut self) -> &mut [u8] {
        &mut self.buffer.as_mut()[fields::HEADER]
    }

    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.buffer.as_mut()[fields::PAYLOAD]
    }
}
