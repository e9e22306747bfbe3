use std::io::{
    Cursor,
    Write,
};

use byteorder::{
    NetworkEndian,
    ReadBytesExt,
    WriteBytesExt,
};

use crate::core::repr::{
    EthernetAddress,
    Ipv4Address,
};
use crate::{
    Error,
    Result,
};

#[repr(u16)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
// https://www.iana.org/assignments/arp-parameters/arp-parameters.xhtml#arp-parameters-1
pub enum Op {
    Request = 0x0001,
    Reply = 0x0002,
}

/// https://www.iana.org/assignments/arp-parameters/arp-parameters.xhtml#arp-parameters-2
pub mod hw_types {
    pub const ETHERNET: u16 = 0x0001;
}

/// https://www.iana.org/assignments/arp-parameters/arp-parameters.xhtml#arp-parameters-3
pub mod proto_types {
    pub const IPV4: u16 = 0x0800;
}

/// [ARP](https://en.wikipedia.org/wiki/Address_Resolution_Protocol) packet for
/// IPv4 over Ethernet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Arp {
    pub op: Op,
    pub source_hw_addr: EthernetAddress,
    pub source_proto_addr: Ipv4Address,
    pub target_hw_addr: EthernetAddress,
    pub target_proto_addr: Ipv4Address,
}

impl Arp {
    pub const BUFFER_LEN: usize = 28;

    /// Returns the size of the ARP packet when serialized to a buffer.
    pub fn buffer_len(&self) -> usize {
        Self::BUFFER_LEN
    }

    /// Attempts to deserialize a buffer into an ARP packet. Trailing bytes,
    /// such as Ethernet padding, are ignored.
    pub fn deserialize(buffer: &[u8]) -> Result<Arp> {
        if buffer.len() < Self::BUFFER_LEN {
            return Err(Error::Exhausted);
        }

        let mut reader = Cursor::new(buffer);
        let hw_type = reader.read_u16::<NetworkEndian>().unwrap();
        let proto_type = reader.read_u16::<NetworkEndian>().unwrap();
        let hw_len = reader.read_u8().unwrap();
        let proto_len = reader.read_u8().unwrap();
        let op = reader.read_u16::<NetworkEndian>().unwrap();

        if hw_type != hw_types::ETHERNET || proto_type != proto_types::IPV4 || hw_len != 6
            || proto_len != 4
        {
            return Err(Error::Malformed);
        }

        let op = match op {
            0x0001 => Op::Request,
            0x0002 => Op::Reply,
            _ => return Err(Error::Malformed),
        };

        Ok(Arp {
            op,
            source_hw_addr: EthernetAddress::try_new(&buffer[8 .. 14])?,
            source_proto_addr: Ipv4Address::try_new(&buffer[14 .. 18])?,
            target_hw_addr: EthernetAddress::try_new(&buffer[18 .. 24])?,
            target_proto_addr: Ipv4Address::try_new(&buffer[24 .. 28])?,
        })
    }

    /// Serializes the ARP packet into a buffer.
    ///
    /// You should ensure buffer has at least buffer_len() bytes to avoid errors.
    pub fn serialize(&self, buffer: &mut [u8]) -> Result<()> {
        if self.buffer_len() > buffer.len() {
            return Err(Error::Exhausted);
        }

        let mut writer = Cursor::new(buffer);
        writer
            .write_u16::<NetworkEndian>(hw_types::ETHERNET)
            .unwrap();
        writer
            .write_u16::<NetworkEndian>(proto_types::IPV4)
            .unwrap();
        writer.write_u8(6).unwrap();
        writer.write_u8(4).unwrap();
        writer.write_u16::<NetworkEndian>(self.op as u16).unwrap();
        writer.write_all(self.source_hw_addr.as_bytes()).unwrap();
        writer.write_all(self.source_proto_addr.as_bytes()).unwrap();
        writer.write_all(self.target_hw_addr.as_bytes()).unwrap();
        writer.write_all(self.target_proto_addr.as_bytes()).unwrap();

        Ok(())
    }
}
