use std::time::Instant;

use crate::core::repr::{
    eth_types,
    Arp,
    ArpOp,
    EthernetAddress,
    Ipv4Address,
};
use crate::core::service::{
    ethernet,
    Interface,
};
use crate::core::storage::PacketBuffer;
use crate::core::time::Env;
use crate::Result;

/// Sends an ARP packet via an interface.
pub fn send_packet<T: Env>(
    interface: &mut Interface<T>,
    arp_repr: &Arp,
    dst_addr: EthernetAddress,
) -> Result<()> {
    let mut buffer = PacketBuffer::new(PacketBuffer::DEFAULT_CAPACITY);
    buffer.init(arp_repr.buffer_len())?;
    arp_repr.serialize(&mut buffer[..])?;
    ethernet::send_frame(interface, &mut buffer, dst_addr, eth_types::ARP)
}

/// Broadcasts an ARP request for an IPv4 address.
pub fn send_request<T: Env>(interface: &mut Interface<T>, ipv4_addr: Ipv4Address) -> Result<()> {
    let arp_repr = Arp {
        op: ArpOp::Request,
        source_hw_addr: interface.ethernet_addr(),
        source_proto_addr: interface.ipv4_addr(),
        target_hw_addr: EthernetAddress::UNSPECIFIED,
        target_proto_addr: ipv4_addr,
    };

    debug!("Sending ARP request for {}.", ipv4_addr);
    send_packet(interface, &arp_repr, EthernetAddress::BROADCAST)
}

/// Announces the interface on the link by requesting its own address.
pub fn announce<T: Env>(interface: &mut Interface<T>) -> Result<()> {
    let ipv4_addr = interface.ipv4_addr();
    send_request(interface, ipv4_addr)
}

/// Sends an IPv4 datagram to the Ethernet address of ipv4_addr.
///
/// If the address is not in the ARP cache, a copy of the datagram waits for
/// the ARP reply and a request is broadcast, unless a request for the same
/// address is already outstanding. While waiting, further datagrams are
/// buffered or dropped according to the interface's PendingPolicy. Dropped
/// datagrams are not reported as errors.
pub fn send_ipv4<T: Env>(
    interface: &mut Interface<T>,
    buffer: &mut PacketBuffer,
    ipv4_addr: Ipv4Address,
) -> Result<()> {
    if let Some(eth_addr) = interface.arp_cache.get(&ipv4_addr).cloned() {
        return ethernet::send_frame(interface, buffer, eth_addr, eth_types::IPV4);
    }

    if let Some(pending) = interface.arp_pending.get_mut(&ipv4_addr) {
        if pending.enqueue(buffer.clone()).is_err() {
            debug!(
                "Dropping IPv4 packet for {} while its ARP request is pending.",
                ipv4_addr
            );
        }
        return Ok(());
    }

    interface.arp_pending.purge();

    let mut pending = interface.pending_ring();
    if pending.enqueue(buffer.clone()).is_err() {
        debug!("Dropping IPv4 packet for {}, no pending capacity.", ipv4_addr);
    }
    interface.arp_pending.set(ipv4_addr, pending);

    send_request(interface, ipv4_addr)
}

/// Receives an ARP packet from an interface.
///
/// Any valid ARP packet updates the ARP cache with the sender's address.
/// Packets waiting on the sender are then flushed; otherwise requests for the
/// interface address are answered. A failed flush still sends the remaining
/// packets and returns the first error.
pub fn recv_packet<T: Env>(
    interface: &mut Interface<T>,
    buffer: &PacketBuffer,
    src_addr: EthernetAddress,
) -> Result<()> {
    let arp_repr = Arp::deserialize(&buffer[..])?;

    debug!(
        "Received ARP, adding mapping from {} to {}.",
        arp_repr.source_proto_addr, src_addr
    );
    interface
        .arp_cache
        .set(arp_repr.source_proto_addr, src_addr);

    if let Some(mut pending) = interface.arp_pending.remove(&arp_repr.source_proto_addr) {
        debug!(
            "Flushing {} IPv4 packet(s) for {}.",
            pending.len(),
            arp_repr.source_proto_addr
        );
        let mut res = Ok(());
        while let Some(mut buffer) = pending.dequeue() {
            if let Err(err) = ethernet::send_frame(interface, &mut buffer, src_addr, eth_types::IPV4)
            {
                warn!(
                    "Failed to send pending IPv4 packet to {}: {:?}",
                    arp_repr.source_proto_addr, err
                );
                if res.is_ok() {
                    res = Err(err);
                }
            }
        }
        return res;
    }

    if arp_repr.op == ArpOp::Request && arp_repr.target_proto_addr == interface.ipv4_addr() {
        let arp_reply = Arp {
            op: ArpOp::Reply,
            source_hw_addr: interface.ethernet_addr(),
            source_proto_addr: interface.ipv4_addr(),
            target_hw_addr: arp_repr.source_hw_addr,
            target_proto_addr: arp_repr.source_proto_addr,
        };

        debug!(
            "Sending ARP reply to {}/{}.",
            arp_reply.target_proto_addr, arp_reply.target_hw_addr
        );

        return send_packet(interface, &arp_reply, src_addr);
    }

    Ok(())
}

/// Visits every live IPv4 -> Ethernet mapping along with when it was learned.
pub fn for_each_entry<T, F>(interface: &mut Interface<T>, f: F)
where
    T: Env,
    F: FnMut(&Ipv4Address, &EthernetAddress, Instant),
{
    interface.arp_cache.for_each(f);
}
