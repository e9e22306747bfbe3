//! Reassembly of fragmented IPv4 datagrams.

use std::collections::BTreeMap;

use crate::core::repr::{
    Ipv4Packet,
    Ipv4Repr,
};
use crate::core::storage::PacketBuffer;
use crate::{
    Error,
    Result,
};

const MAX_PACKET_LEN: usize = 0xFFFF;

/// Fragments of a single datagram, keyed by their byte offset.
#[derive(Clone, Debug, Default)]
pub struct Reassembly {
    header: Option<Vec<u8>>,
    fragments: BTreeMap<usize, Vec<u8>>,
    payload_len: Option<usize>,
}

impl Reassembly {
    pub fn new() -> Reassembly {
        Reassembly::default()
    }

    /// Adds a fragment. header is the fragment's IPv4 header and payload the
    /// bytes it carries; data overlapping an earlier fragment replaces it.
    pub fn add(&mut self, header: &[u8], repr: &Ipv4Repr, payload: &[u8]) -> Result<()> {
        let offset = repr.fragment_offset as usize * 8;
        let end = offset + payload.len();

        if header.len() + end > MAX_PACKET_LEN {
            return Err(Error::Malformed);
        }

        if let Some(payload_len) = self.payload_len {
            if end > payload_len || (!repr.more_fragments && end != payload_len) {
                return Err(Error::Malformed);
            }
        }

        if !repr.more_fragments {
            if self.fragments.iter().any(|(start, data)| start + data.len() > end) {
                return Err(Error::Malformed);
            }
            self.payload_len = Some(end);
        }

        if offset == 0 {
            self.header = Some(header.to_vec());
        }

        self.fragments.insert(offset, payload.to_vec());
        Ok(())
    }

    /// Checks if the first and last fragment arrived with no holes between.
    pub fn is_complete(&self) -> bool {
        let payload_len = match (&self.header, self.payload_len) {
            (Some(_), Some(payload_len)) => payload_len,
            _ => return false,
        };

        let mut covered = 0;
        for (start, data) in self.fragments.iter() {
            if *start > covered {
                return false;
            }
            covered = covered.max(start + data.len());
        }

        covered >= payload_len
    }

    /// Builds the whole datagram from the first fragment's header, with the
    /// length, flags and checksum rewritten.
    pub fn assemble(&self) -> Result<PacketBuffer> {
        if !self.is_complete() {
            return Err(Error::Exhausted);
        }

        let header = self.header.as_ref().ok_or(Error::Exhausted)?;
        let payload_len = self.payload_len.ok_or(Error::Exhausted)?;
        let packet_len = header.len() + payload_len;

        let mut capacity = PacketBuffer::DEFAULT_CAPACITY;
        if PacketBuffer::HEADROOM + packet_len > capacity {
            capacity = PacketBuffer::HEADROOM + packet_len;
        }

        let mut buffer = PacketBuffer::new(capacity);
        buffer.init(packet_len)?;
        buffer[.. header.len()].copy_from_slice(header);

        for (start, data) in self.fragments.iter() {
            let from = header.len() + start;
            buffer[from .. from + data.len()].copy_from_slice(data);
        }

        {
            let mut packet = Ipv4Packet::try_new(&mut buffer[..])?;
            packet.set_packet_len(packet_len as u16);
            packet.set_flags_and_fragment_offset(0, 0);
            packet.fill_checksum();
        }

        Ok(buffer)
    }
}
