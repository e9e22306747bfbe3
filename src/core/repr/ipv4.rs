use std::fmt::{
    Display,
    Formatter,
    Result as FmtResult,
};
use std::io::Write;
use std::result::Result as StdResult;
use std::str::FromStr;

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

/// [IPv4 address](https://en.wikipedia.org/wiki/IPv4) in network byte order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Address([u8; 4]);

impl Address {
    /// Creates an IPv4 address from a network byte order buffer.
    pub const fn new(addr: [u8; 4]) -> Address {
        Address(addr)
    }

    /// Tries to create an IPv4 address from a network byte order slice.
    pub fn try_new(addr: &[u8]) -> Result<Address> {
        if addr.len() != 4 {
            return Err(Error::Exhausted);
        }

        let mut _addr: [u8; 4] = [0; 4];
        _addr.clone_from_slice(addr);
        Ok(Address(_addr))
    }

    /// Returns a reference to the network byte order representation of the
    /// address.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{}.{}.{}.{}", self.0[0], self.0[1], self.0[2], self.0[3])
    }
}

impl FromStr for Address {
    type Err = ();

    /// Parses an IPv4 address from an A.B.C.D style string.
    fn from_str(addr: &str) -> StdResult<Address, Self::Err> {
        let bytes = addr.split('.')
            .map(|token| token.parse::<u8>())
            .collect::<StdResult<Vec<_>, _>>()
            .map_err(|_| ())?;

        if bytes.len() != 4 {
            return Err(());
        }

        let mut ipv4: [u8; 4] = [0; 4];
        ipv4.clone_from_slice(&bytes);

        Ok(Address::new(ipv4))
    }
}

/// [https://en.wikipedia.org/wiki/List_of_IP_protocol_numbers](https://en.wikipedia.org/wiki/List_of_IP_protocol_numbers)
pub mod protocols {
    pub const ICMP: u8 = 1;

    pub const TCP: u8 = 6;

    pub const UDP: u8 = 17;
}

pub mod flags {
    pub const DONT_FRAGMENT: u8 = 0b0100_0000;

    pub const MORE_FRAGMENTS: u8 = 0b0010_0000;
}

mod fields {
    use std::ops::Range;

    pub const VERSION_AND_HEADER_LEN: usize = 0;

    pub const TYPE_OF_SERVICE: usize = 1;

    pub const PACKET_LEN: Range<usize> = 2 .. 4;

    pub const IDENTIFICATION: Range<usize> = 4 .. 6;

    pub const FLAGS_AND_FRAGMENT_OFFSET: Range<usize> = 6 .. 8;

    pub const TTL: usize = 8;

    pub const PROTOCOL: usize = 9;

    pub const CHECKSUM: Range<usize> = 10 .. 12;

    pub const SRC_ADDR: Range<usize> = 12 .. 16;

    pub const DST_ADDR: Range<usize> = 16 .. 20;
}

/// Safe representation of an IPv4 header without options.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Repr {
    pub src_addr: Address,
    pub dst_addr: Address,
    pub protocol: u8,
    pub ident: u16,
    pub more_fragments: bool,
    /// Fragment offset in units of 8 bytes.
    pub fragment_offset: u16,
    pub ttl: u8,
    pub payload_len: usize,
}

impl Repr {
    /// Returns the buffer size needed to serialize the header and payload.
    pub fn buffer_len(&self) -> usize {
        Packet::<&[u8]>::MIN_HEADER_LEN + self.payload_len
    }

    /// Deserializes a packet which passed check_encoding(...).
    pub fn deserialize<T>(packet: &Packet<T>) -> Repr
    where
        T: AsRef<[u8]>,
    {
        Repr {
            src_addr: packet.src_addr(),
            dst_addr: packet.dst_addr(),
            protocol: packet.protocol(),
            ident: packet.identification(),
            more_fragments: packet.flags() & flags::MORE_FRAGMENTS != 0,
            fragment_offset: packet.fragment_offset(),
            ttl: packet.ttl(),
            payload_len: packet.packet_len() as usize - packet.header_len() as usize,
        }
    }

    /// Serializes the header, including a checksum, into a packet with room
    /// for at least buffer_len() bytes.
    pub fn serialize<T>(&self, packet: &mut Packet<T>) -> Result<()>
    where
        T: AsRef<[u8]> + AsMut<[u8]>,
    {
        if packet.as_ref().len() < self.buffer_len() || self.buffer_len() > 0xFFFF {
            return Err(Error::Exhausted);
        }

        let flags = if self.more_fragments {
            flags::MORE_FRAGMENTS
        } else {
            0
        };

        packet.set_ip_version(4);
        packet.set_header_len(Packet::<&[u8]>::MIN_HEADER_LEN as u8);
        packet.set_type_of_service(0);
        packet.set_packet_len(self.buffer_len() as u16);
        packet.set_identification(self.ident);
        packet.set_flags_and_fragment_offset(flags, self.fragment_offset);
        packet.set_ttl(self.ttl);
        packet.set_protocol(self.protocol);
        packet.set_src_addr(self.src_addr);
        packet.set_dst_addr(self.dst_addr);
        packet.fill_checksum();

        Ok(())
    }
}

/// View of a byte buffer as an IPv4 packet.
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
    pub const MIN_HEADER_LEN: usize = 20;

    /// Tries to create an IPv4 packet view over a byte buffer. Only the
    /// length of the buffer is checked, see check_encoding(...) for the rest.
    pub fn try_new(buffer: T) -> Result<Packet<T>> {
        if buffer.as_ref().len() < Self::MIN_HEADER_LEN {
            Err(Error::Exhausted)
        } else {
            Ok(Packet { buffer })
        }
    }

    /// Checks if the packet has a valid encoding: version, header and packet
    /// lengths consistent with the buffer, and a valid header checksum. The
    /// buffer may extend past packet_len() (e.g. link layer padding).
    pub fn check_encoding(&self) -> Result<()> {
        let buffer_len = self.buffer.as_ref().len();
        let header_len = self.header_len() as usize;
        let packet_len = self.packet_len() as usize;

        if self.ip_version() != 4 || packet_len > buffer_len {
            return Err(Error::Malformed);
        }

        if header_len < Self::MIN_HEADER_LEN || header_len > packet_len {
            return Err(Error::Malformed);
        }

        if !is_valid(self.header()) {
            return Err(Error::Checksum);
        }

        Ok(())
    }

    /// Calculates the header checksum, including the checksum field.
    pub fn gen_header_checksum(&self) -> u16 {
        internet_checksum(self.header())
    }

    pub fn ip_version(&self) -> u8 {
        (self.buffer.as_ref()[fields::VERSION_AND_HEADER_LEN] & 0xF0) >> 4
    }

    /// Returns the header length in bytes.
    pub fn header_len(&self) -> u8 {
        (self.buffer.as_ref()[fields::VERSION_AND_HEADER_LEN] & 0x0F) * 4
    }

    pub fn type_of_service(&self) -> u8 {
        self.buffer.as_ref()[fields::TYPE_OF_SERVICE]
    }

    pub fn packet_len(&self) -> u16 {
        (&self.buffer.as_ref()[fields::PACKET_LEN])
            .read_u16::<NetworkEndian>()
            .unwrap()
    }

    pub fn identification(&self) -> u16 {
        (&self.buffer.as_ref()[fields::IDENTIFICATION])
            .read_u16::<NetworkEndian>()
            .unwrap()
    }

    pub fn flags(&self) -> u8 {
        self.buffer.as_ref()[fields::FLAGS_AND_FRAGMENT_OFFSET.start] & 0xE0
    }

    /// Returns the fragment offset in units of 8 bytes.
    pub fn fragment_offset(&self) -> u16 {
        (&self.buffer.as_ref()[fields::FLAGS_AND_FRAGMENT_OFFSET])
            .read_u16::<NetworkEndian>()
            .unwrap() & 0x1FFF
    }

    pub fn ttl(&self) -> u8 {
        self.buffer.as_ref()[fields::TTL]
    }

    pub fn protocol(&self) -> u8 {
        self.buffer.as_ref()[fields::PROTOCOL]
    }

    pub fn header_checksum(&self) -> u16 {
        (&self.buffer.as_ref()[fields::CHECKSUM])
            .read_u16::<NetworkEndian>()
            .unwrap()
    }

    pub fn src_addr(&self) -> Address {
        Address::try_new(&self.buffer.as_ref()[fields::SRC_ADDR]).unwrap()
    }

    pub fn dst_addr(&self) -> Address {
        Address::try_new(&self.buffer.as_ref()[fields::DST_ADDR]).unwrap()
    }

    /// Returns the header, options included.
    pub fn header(&self) -> &[u8] {
        let header_len = (self.header_len() as usize).min(self.buffer.as_ref().len());
        &self.buffer.as_ref()[.. header_len]
    }

    /// Returns the payload, excluding any bytes past packet_len().
    pub fn payload(&self) -> &[u8] {
        let buffer = self.buffer.as_ref();
        let end = (self.packet_len() as usize).min(buffer.len());
        let start = (self.header_len() as usize).min(end);
        &buffer[start .. end]
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Packet<T> {
    pub fn set_ip_version(&mut self, version: u8) {
        let byte = &mut self.buffer.as_mut()[fields::VERSION_AND_HEADER_LEN];
        *byte = (*byte & 0x0F) | (version << 4);
    }

    /// Sets the header length in bytes, which must be a multiple of 4.
    pub fn set_header_len(&mut self, header_len: u8) {
        let byte = &mut self.buffer.as_mut()[fields::VERSION_AND_HEADER_LEN];
        *byte = (*byte & 0xF0) | ((header_len / 4) & 0x0F);
    }

    pub fn set_type_of_service(&mut self, type_of_service: u8) {
        self.buffer.as_mut()[fields::TYPE_OF_SERVICE] = type_of_service;
    }

    pub fn set_packet_len(&mut self, packet_len: u16) {
        (&mut self.buffer.as_mut()[fields::PACKET_LEN])
            .write_u16::<NetworkEndian>(packet_len)
            .unwrap();
    }

    pub fn set_identification(&mut self, identification: u16) {
        (&mut self.buffer.as_mut()[fields::IDENTIFICATION])
            .write_u16::<NetworkEndian>(identification)
            .unwrap();
    }

    /// Sets the flags and the fragment offset in units of 8 bytes.
    pub fn set_flags_and_fragment_offset(&mut self, flags: u8, fragment_offset: u16) {
        let value = ((flags as u16 & 0xE0) << 8) | (fragment_offset & 0x1FFF);
        (&mut self.buffer.as_mut()[fields::FLAGS_AND_FRAGMENT_OFFSET])
            .write_u16::<NetworkEndian>(value)
            .unwrap();
    }

    pub fn set_ttl(&mut self, ttl: u8) {
        self.buffer.as_mut()[fields::TTL] = ttl;
    }

    pub fn set_protocol(&mut self, protocol: u8) {
        self.buffer.as_mut()[fields::PROTOCOL] = protocol;
    }

    pub fn set_header_checksum(&mut self, header_checksum: u16) {
        (&mut self.buffer.as_mut()[fields::CHECKSUM])
            .write_u16::<NetworkEndian>(header_checksum)
            .unwrap();
    }

    pub fn set_src_addr(&mut self, addr: Address) {
        (&mut self.buffer.as_mut()[fields::SRC_ADDR])
            .write_all(addr.as_bytes())
            .unwrap();
    }

    pub fn set_dst_addr(&mut self, addr: Address) {
        (&mut self.buffer.as_mut()[fields::DST_ADDR])
            .write_all(addr.as_bytes())
            .unwrap();
    }

    /// Zeroes the checksum field, then fills in the header checksum.
    pub fn fill_checksum(&mut self) {
        self.set_header_checksum(0);
        let checksum = self.gen_header_checksum();
        self.set_header_checksum(checksum);
    }

    pub fn payload_mut(&mut self) -> &mut [u8] {
        let header_len = self.header_len() as usize;
        &mut self.buffer.as_mut()[header_len ..]
    }
}
