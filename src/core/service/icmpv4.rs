use crate::core::repr::{
    ipv4_protocols,
    Icmpv4DestinationUnreachable,
    Icmpv4Packet,
    Icmpv4Repr,
    Ipv4Address,
    Ipv4Packet,
};
use crate::core::service::{
    ipv4,
    Interface,
};
use crate::core::storage::PacketBuffer;
use crate::core::time::Env;
use crate::{
    Error,
    Result,
};

/// Sends an ICMP echo request carrying payload to an IPv4 address.
pub fn send_echo_request<T: Env>(
    interface: &mut Interface<T>,
    dst_addr: Ipv4Address,
    id: u16,
    seq: u16,
    payload: &[u8],
) -> Result<()> {
    let icmp_repr = Icmpv4Repr::EchoRequest { id, seq };

    let icmp_len = icmp_repr.buffer_len() + payload.len();

    let mut buffer = PacketBuffer::new(
        PacketBuffer::DEFAULT_CAPACITY.max(PacketBuffer::HEADROOM + icmp_len),
    );
    buffer.init(icmp_len)?;

    {
        let mut icmp_packet = Icmpv4Packet::try_new(&mut buffer[..])?;
        icmp_packet.payload_mut().copy_from_slice(payload);
        icmp_repr.serialize(&mut icmp_packet)?;
    }

    ipv4::send_packet(interface, &mut buffer, dst_addr, ipv4_protocols::ICMP)
}

/// Sends an ICMP destination unreachable message about a datagram.
///
/// The message embeds the datagram's IPv4 header and the first 8 bytes of its
/// payload.
pub fn send_unreachable<T: Env>(
    interface: &mut Interface<T>,
    datagram: &[u8],
    dst_addr: Ipv4Address,
    reason: Icmpv4DestinationUnreachable,
) -> Result<()> {
    let header_len = Ipv4Packet::try_new(datagram)?.header_len() as usize;
    let embedded_len = datagram.len().min(header_len + 8);

    let icmp_repr = Icmpv4Repr::DestinationUnreachable {
        reason,
        embedded_len,
    };

    let mut buffer = PacketBuffer::new(PacketBuffer::DEFAULT_CAPACITY);
    buffer.init(icmp_repr.buffer_len())?;

    {
        let mut icmp_packet = Icmpv4Packet::try_new(&mut buffer[..])?;
        icmp_packet
            .payload_mut()
            .copy_from_slice(&datagram[.. embedded_len]);
        icmp_repr.serialize(&mut icmp_packet)?;
    }

    debug!("Sending ICMP {:?} to {}.", reason, dst_addr);
    ipv4::send_packet(interface, &mut buffer, dst_addr, ipv4_protocols::ICMP)
}

/// Receives an ICMP packet from an interface.
///
/// Echo requests are answered with an echo reply carrying the same
/// identifier, sequence number and data. Other messages are logged.
pub fn recv_packet<T: Env>(
    interface: &mut Interface<T>,
    src_addr: Ipv4Address,
    buffer: &PacketBuffer,
) -> Result<()> {
    let icmp_repr = {
        let icmp_packet = Icmpv4Packet::try_new(&buffer[..])?;
        icmp_packet.check_encoding()?;
        Icmpv4Repr::deserialize(&icmp_packet)?
    };

    match icmp_repr {
        Icmpv4Repr::EchoRequest { id, seq } => {
            debug!("Got ping {}/{} from {}, replying.", id, seq, src_addr);
            let mut reply = buffer.clone();
            {
                let mut icmp_packet = Icmpv4Packet::try_new(&mut reply[..])?;
                Icmpv4Repr::EchoReply { id, seq }.serialize(&mut icmp_packet)?;
            }
            ipv4::send_packet(interface, &mut reply, src_addr, ipv4_protocols::ICMP)
        }
        Icmpv4Repr::EchoReply { id, seq } => {
            debug!("Got ping reply {}/{} from {}.", id, seq, src_addr);
            Ok(())
        }
        Icmpv4Repr::DestinationUnreachable { reason, .. } => {
            debug!("Got ICMP {:?} from {}.", reason, src_addr);
            Err(Error::Ignored)
        }
    }
}
