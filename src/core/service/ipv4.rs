use crate::core::reassembly::Reassembly;
use crate::core::repr::{
    EthernetAddress,
    Icmpv4DestinationUnreachable,
    Ipv4Address,
    Ipv4Packet,
    Ipv4Repr,
};
use crate::core::service::{
    arp,
    icmpv4,
    Interface,
};
use crate::core::storage::PacketBuffer;
use crate::core::time::Env;
use crate::{
    Error,
    Result,
};

const HEADER_LEN: usize = Ipv4Packet::<&[u8]>::MIN_HEADER_LEN;

/// Sends a single IPv4 fragment.
///
/// Prepends a header to the buffer, which must hold the fragment payload,
/// and hands it to ARP for delivery. fragment_offset is in units of 8 bytes.
pub fn send_fragment<T: Env>(
    interface: &mut Interface<T>,
    buffer: &mut PacketBuffer,
    dst_addr: Ipv4Address,
    protocol: u8,
    ident: u16,
    fragment_offset: u16,
    more_fragments: bool,
) -> Result<()> {
    let ipv4_repr = Ipv4Repr {
        src_addr: interface.ipv4_addr(),
        dst_addr,
        protocol,
        ident,
        more_fragments,
        fragment_offset,
        ttl: interface.config.ttl,
        payload_len: buffer.len(),
    };

    buffer.add_header(HEADER_LEN)?;

    {
        let mut ipv4_packet = Ipv4Packet::try_new(&mut buffer[..])?;
        ipv4_repr.serialize(&mut ipv4_packet)?;
    }

    arp::send_ipv4(interface, buffer, dst_addr)
}

/// Sends an IPv4 datagram carrying the buffer as its payload.
///
/// Payloads which do not fit the link MTU are split into fragments sharing
/// one identification, sent in ascending offset order.
pub fn send_packet<T: Env>(
    interface: &mut Interface<T>,
    buffer: &mut PacketBuffer,
    dst_addr: Ipv4Address,
    protocol: u8,
) -> Result<()> {
    let mtu_payload_len = interface
        .config
        .mtu
        .checked_sub(HEADER_LEN)
        .ok_or(Error::Exhausted)?;

    if buffer.len() <= mtu_payload_len {
        let ident = interface.next_ipv4_ident();
        return send_fragment(interface, buffer, dst_addr, protocol, ident, 0, false);
    }

    // Fragment offsets count 8 byte units, so every fragment but the last
    // must carry a multiple of 8 bytes.
    let max_payload_len = mtu_payload_len & !7;
    if max_payload_len == 0 {
        return Err(Error::Exhausted);
    }

    let ident = interface.next_ipv4_ident();

    debug!(
        "Fragmenting {} byte IPv4 payload for {} into {} byte fragments.",
        buffer.len(),
        dst_addr,
        max_payload_len
    );

    let mut offset = 0;
    while offset < buffer.len() {
        let fragment_len = max_payload_len.min(buffer.len() - offset);
        let more_fragments = offset + fragment_len < buffer.len();
        let mut fragment = PacketBuffer::from_payload(&buffer[offset .. offset + fragment_len])?;

        send_fragment(
            interface,
            &mut fragment,
            dst_addr,
            protocol,
            ident,
            (offset / 8) as u16,
            more_fragments,
        )?;

        offset += fragment_len;
    }

    Ok(())
}

/// Receives an IPv4 packet from an interface.
///
/// The packet is validated, stripped of padding and its header, reassembled
/// if it is a fragment, and handed to the handler registered for its
/// protocol. Unknown protocols are answered with an ICMP protocol
/// unreachable message.
pub fn recv_packet<T: Env>(
    interface: &mut Interface<T>,
    buffer: &mut PacketBuffer,
    _src_addr: EthernetAddress,
) -> Result<()> {
    let ipv4_repr = {
        let ipv4_packet = Ipv4Packet::try_new(&buffer[..])?;
        ipv4_packet.check_encoding()?;
        Ipv4Repr::deserialize(&ipv4_packet)
    };

    if ipv4_repr.dst_addr != interface.ipv4_addr() {
        debug!(
            "Ignoring IPv4 packet with destination {}.",
            ipv4_repr.dst_addr
        );
        return Err(Error::Ignored);
    }

    let packet_len = Ipv4Packet::try_new(&buffer[..])?.packet_len() as usize;
    if buffer.len() > packet_len {
        let padding_len = buffer.len() - packet_len;
        buffer.remove_padding(padding_len)?;
    }

    let is_fragment = ipv4_repr.more_fragments || ipv4_repr.fragment_offset != 0;
    if is_fragment && interface.config.ipv4_reassembly {
        return match reassemble(interface, buffer, &ipv4_repr)? {
            Some(mut datagram) => dispatch(interface, &mut datagram, &ipv4_repr),
            None => Ok(()),
        };
    }

    dispatch(interface, buffer, &ipv4_repr)
}

/// Adds a fragment to its datagram and returns the datagram once complete.
fn reassemble<T: Env>(
    interface: &mut Interface<T>,
    buffer: &PacketBuffer,
    ipv4_repr: &Ipv4Repr,
) -> Result<Option<PacketBuffer>> {
    let key = (ipv4_repr.src_addr, ipv4_repr.ident);
    let ipv4_packet = Ipv4Packet::try_new(&buffer[..])?;

    interface.ipv4_fragments.purge();

    if !interface.ipv4_fragments.contains(&key) {
        if interface.ipv4_fragments.len() >= interface.config.ipv4_reassembly_limit {
            debug!(
                "Dropping IPv4 fragment from {}, {} datagrams already in reassembly.",
                ipv4_repr.src_addr,
                interface.ipv4_fragments.len()
            );
            return Err(Error::Exhausted);
        }
        interface.ipv4_fragments.set(key, Reassembly::new());
    }

    let complete = match interface.ipv4_fragments.get_mut(&key) {
        Some(reassembly) => {
            if let Err(err) = reassembly.add(
                ipv4_packet.header(),
                ipv4_repr,
                ipv4_packet.payload(),
            ) {
                interface.ipv4_fragments.remove(&key);
                return Err(err);
            }
            reassembly.is_complete()
        }
        None => false,
    };

    if !complete {
        debug!(
            "Buffered IPv4 fragment {} of datagram {} from {}.",
            ipv4_repr.fragment_offset, ipv4_repr.ident, ipv4_repr.src_addr
        );
        return Ok(None);
    }

    match interface.ipv4_fragments.remove(&key) {
        Some(reassembly) => Ok(Some(reassembly.assemble()?)),
        None => Ok(None),
    }
}

/// Strips the header of a validated datagram and passes the payload to the
/// handler for its protocol.
fn dispatch<T: Env>(
    interface: &mut Interface<T>,
    buffer: &mut PacketBuffer,
    ipv4_repr: &Ipv4Repr,
) -> Result<()> {
    let header_len = Ipv4Packet::try_new(&buffer[..])?.header_len() as usize;
    buffer.remove_header(header_len)?;

    let reason = match interface.dispatch_protocol(ipv4_repr.protocol, ipv4_repr.src_addr, buffer)
    {
        Some(Err(Error::Unreachable(reason))) => reason,
        Some(res) => return res,
        None => {
            debug!(
                "Ignoring IPv4 packet with protocol {} from {}.",
                ipv4_repr.protocol, ipv4_repr.src_addr
            );
            Icmpv4DestinationUnreachable::ProtocolUnreachable
        }
    };

    buffer.add_header(header_len)?;
    icmpv4::send_unreachable(interface, &buffer[..], ipv4_repr.src_addr, reason)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::core::dev::MemoryDevice;
    use crate::core::repr::{
        ipv4_protocols,
        EthernetFrame,
    };
    use crate::core::service::Config;
    use crate::core::time::MockEnv;

    fn interface() -> (Interface<MockEnv>, MemoryDevice) {
        let dev = MemoryDevice::new(1500);
        let config = Config::new(
            EthernetAddress::new([0x02, 0, 0, 0, 0, 1]),
            Ipv4Address::new([10, 0, 0, 1]),
        );
        let mut interface = Interface::new(Box::new(dev.clone()), config, MockEnv::new());
        interface.arp_cache.set(
            Ipv4Address::new([10, 0, 0, 5]),
            EthernetAddress::new([0xAA; 6]),
        );
        (interface, dev)
    }

    fn sent_ipv4(frame: &[u8]) -> Ipv4Packet<&[u8]> {
        let eth_frame = EthernetFrame::try_new(frame).unwrap();
        let payload = &frame[EthernetFrame::<&[u8]>::HEADER_LEN ..];
        assert_eq!(eth_frame.dst_addr(), EthernetAddress::new([0xAA; 6]));
        Ipv4Packet::try_new(payload).unwrap()
    }

    #[test]
    fn test_send_unfragmented() {
        let (mut interface, dev) = interface();
        let mut buffer = PacketBuffer::from_payload(&[7; 1480]).unwrap();

        send_packet(
            &mut interface,
            &mut buffer,
            Ipv4Address::new([10, 0, 0, 5]),
            ipv4_protocols::UDP,
        ).unwrap();

        let frames = dev.drain_sent();
        assert_eq!(frames.len(), 1);
        let packet = sent_ipv4(&frames[0]);
        assert_matches!(packet.check_encoding(), Ok(()));
        assert_eq!(packet.packet_len(), 1500);
        assert_eq!(packet.flags(), 0);
        assert_eq!(packet.fragment_offset(), 0);
        assert_eq!(packet.ttl(), 64);
        assert_eq!(packet.protocol(), ipv4_protocols::UDP);
        assert_eq!(packet.src_addr(), Ipv4Address::new([10, 0, 0, 1]));
    }

    #[test]
    fn test_ident_increments_per_datagram() {
        let (mut interface, dev) = interface();

        for _ in 0 .. 2 {
            let mut buffer = PacketBuffer::from_payload(&[7; 8]).unwrap();
            send_packet(
                &mut interface,
                &mut buffer,
                Ipv4Address::new([10, 0, 0, 5]),
                ipv4_protocols::UDP,
            ).unwrap();
        }

        let frames = dev.drain_sent();
        let first = sent_ipv4(&frames[0]).identification();
        let second = sent_ipv4(&frames[1]).identification();
        assert_eq!(second, first.wrapping_add(1));
    }

    #[test]
    fn test_fragment_unaligned_mtu() {
        let (mut interface, dev) = interface();
        interface.config.mtu = 1006;
        let mut buffer = PacketBuffer::from_payload(&[7; 2000]).unwrap();

        send_packet(
            &mut interface,
            &mut buffer,
            Ipv4Address::new([10, 0, 0, 5]),
            ipv4_protocols::UDP,
        ).unwrap();

        let frames = dev.drain_sent();
        let lens: Vec<_> = frames
            .iter()
            .map(|frame| sent_ipv4(frame).payload().len())
            .collect();
        let offsets: Vec<_> = frames
            .iter()
            .map(|frame| sent_ipv4(frame).fragment_offset())
            .collect();
        assert_eq!(lens, vec![984, 984, 32]);
        assert_eq!(offsets, vec![0, 123, 246]);
    }

    #[test]
    fn test_mtu_too_small() {
        let (mut interface, dev) = interface();

        // Fits unfragmented, so a tiny MTU is still usable.
        interface.config.mtu = 24;
        let mut buffer = PacketBuffer::from_payload(&[7; 4]).unwrap();
        send_packet(
            &mut interface,
            &mut buffer,
            Ipv4Address::new([10, 0, 0, 5]),
            ipv4_protocols::UDP,
        ).unwrap();
        assert_eq!(dev.drain_sent().len(), 1);

        // Fragments could carry no 8 byte unit.
        let mut buffer = PacketBuffer::from_payload(&[7; 16]).unwrap();
        assert_matches!(
            send_packet(
                &mut interface,
                &mut buffer,
                Ipv4Address::new([10, 0, 0, 5]),
                ipv4_protocols::UDP,
            ),
            Err(Error::Exhausted)
        );

        // No room for the header at all.
        interface.config.mtu = 10;
        let mut buffer = PacketBuffer::from_payload(&[7; 4]).unwrap();
        assert_matches!(
            send_packet(
                &mut interface,
                &mut buffer,
                Ipv4Address::new([10, 0, 0, 5]),
                ipv4_protocols::UDP,
            ),
            Err(Error::Exhausted)
        );

        assert!(dev.drain_sent().is_empty());
    }

    #[test]
    fn test_reassembly_expires() {
        let env = MockEnv::new();
        let dev = MemoryDevice::new(1500);
        let config = Config::new(
            EthernetAddress::new([0x02, 0, 0, 0, 0, 1]),
            Ipv4Address::new([10, 0, 0, 1]),
        );
        let mut interface = Interface::new(Box::new(dev), config, env.clone());
        interface
            .ipv4_fragments
            .set((Ipv4Address::new([10, 0, 0, 5]), 1), Reassembly::new());

        env.advance(Duration::from_secs(31));
        assert!(!interface
            .ipv4_fragments
            .contains(&(Ipv4Address::new([10, 0, 0, 5]), 1)));
    }
}
