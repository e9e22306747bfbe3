//! Shared setup for tests driving an interface over an in memory device.

#![allow(dead_code)]

use std::time::Duration;

use lazy_static::lazy_static;

use lanstack::core::dev::MemoryDevice;
use lanstack::core::repr::{
    eth_types,
    Arp,
    ArpOp,
    EthernetAddress,
    EthernetFrame,
    Icmpv4Packet,
    Icmpv4Repr,
    Ipv4Address,
    Ipv4Packet,
    Ipv4Repr,
};
use lanstack::core::service::{
    self,
    Config,
    Interface,
};
use lanstack::core::time::MockEnv;

lazy_static! {
    pub static ref LOCAL_ETH_ADDR: EthernetAddress =
        EthernetAddress::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);

    pub static ref LOCAL_IPV4_ADDR: Ipv4Address = Ipv4Address::new([10, 0, 0, 1]);

    pub static ref PEER_ETH_ADDR: EthernetAddress = EthernetAddress::new([0xAA; 6]);

    pub static ref PEER_IPV4_ADDR: Ipv4Address = Ipv4Address::new([10, 0, 0, 5]);

    pub static ref MTU: usize = 1500;
}

pub struct Context {
    pub interface: Interface<MockEnv>,
    /// Handle sharing the interface's queues.
    pub dev: MemoryDevice,
    pub time_env: MockEnv,
}

impl Context {
    /// Moves the shared clock forward.
    pub fn advance(&self, duration: Duration) {
        self.time_env.advance(duration);
    }

    /// Delivers a frame to the interface and processes everything queued.
    pub fn deliver(&mut self, frame: &[u8]) -> usize {
        self.dev.inject(frame);
        service::ethernet::recv(&mut self.interface)
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.dev.drain_sent()
    }
}

/// Runs f against a freshly initialized interface with the default config.
pub fn run<F, R>(f: F) -> R
where
    F: FnOnce(&mut Context) -> R,
{
    run_with(|_| {}, f)
}

/// Runs f against a freshly initialized interface after configure(...) has
/// adjusted its config. The ARP announcement sent by init is discarded.
pub fn run_with<C, F, R>(configure: C, f: F) -> R
where
    C: FnOnce(&mut Config),
    F: FnOnce(&mut Context) -> R,
{
    let _ = env_logger::builder().is_test(true).try_init();

    let mut config = Config::new(*LOCAL_ETH_ADDR, *LOCAL_IPV4_ADDR);
    configure(&mut config);

    let dev = MemoryDevice::new(config.mtu);
    let time_env = MockEnv::new();
    let mut interface = Interface::new(Box::new(dev.clone()), config, time_env.clone());
    service::init(&mut interface).unwrap();
    dev.drain_sent();

    f(&mut Context {
        interface,
        dev,
        time_env,
    })
}

/// Builds an Ethernet frame around payload, without padding.
pub fn eth_frame(
    dst_addr: EthernetAddress,
    src_addr: EthernetAddress,
    payload_type: u16,
    payload: &[u8],
) -> Vec<u8> {
    let mut buffer = vec![0; EthernetFrame::<&[u8]>::buffer_len(payload.len())];
    {
        let mut frame = EthernetFrame::try_new(&mut buffer[..]).unwrap();
        frame.set_dst_addr(dst_addr);
        frame.set_src_addr(src_addr);
        frame.set_payload_type(payload_type);
        frame.payload_mut().copy_from_slice(payload);
    }
    buffer
}

/// Builds an ARP frame from the peer.
pub fn arp_frame(op: ArpOp, target_proto_addr: Ipv4Address, eth_dst: EthernetAddress) -> Vec<u8> {
    arp_frame_from(op, *PEER_ETH_ADDR, *PEER_IPV4_ADDR, target_proto_addr, eth_dst)
}

pub fn arp_frame_from(
    op: ArpOp,
    source_hw_addr: EthernetAddress,
    source_proto_addr: Ipv4Address,
    target_proto_addr: Ipv4Address,
    eth_dst: EthernetAddress,
) -> Vec<u8> {
    let arp = Arp {
        op,
        source_hw_addr,
        source_proto_addr,
        target_hw_addr: match op {
            ArpOp::Request => EthernetAddress::UNSPECIFIED,
            ArpOp::Reply => *LOCAL_ETH_ADDR,
        },
        target_proto_addr,
    };

    let mut payload = vec![0; arp.buffer_len()];
    arp.serialize(&mut payload[..]).unwrap();
    eth_frame(eth_dst, source_hw_addr, eth_types::ARP, &payload)
}

/// Builds an IPv4 datagram from the peer to the interface.
pub fn ipv4_packet(protocol: u8, payload: &[u8]) -> Vec<u8> {
    ipv4_packet_with(
        Ipv4Repr {
            src_addr: *PEER_IPV4_ADDR,
            dst_addr: *LOCAL_IPV4_ADDR,
            protocol,
            ident: 1,
            more_fragments: false,
            fragment_offset: 0,
            ttl: 64,
            payload_len: payload.len(),
        },
        payload,
    )
}

pub fn ipv4_packet_with(repr: Ipv4Repr, payload: &[u8]) -> Vec<u8> {
    let mut buffer = vec![0; repr.buffer_len()];
    {
        let mut packet = Ipv4Packet::try_new(&mut buffer[..]).unwrap();
        repr.serialize(&mut packet).unwrap();
        packet.payload_mut().copy_from_slice(payload);
    }
    buffer
}

/// Wraps an IPv4 datagram in a frame from the peer to the interface.
pub fn ipv4_frame(packet: &[u8]) -> Vec<u8> {
    eth_frame(*LOCAL_ETH_ADDR, *PEER_ETH_ADDR, eth_types::IPV4, packet)
}

/// Builds an ICMP message with the given data.
pub fn icmpv4_packet(repr: Icmpv4Repr, data: &[u8]) -> Vec<u8> {
    let mut buffer = vec![0; repr.buffer_len() + data.len()];
    {
        let mut packet = Icmpv4Packet::try_new(&mut buffer[..]).unwrap();
        packet.payload_mut().copy_from_slice(data);
        repr.serialize(&mut packet).unwrap();
    }
    buffer
}

/// Splits a sent frame into its Ethernet header fields and payload.
pub fn parse_eth(frame: &[u8]) -> (EthernetAddress, EthernetAddress, u16, Vec<u8>) {
    let frame = EthernetFrame::try_new(frame).unwrap();
    (
        frame.dst_addr(),
        frame.src_addr(),
        frame.payload_type(),
        frame.payload().to_vec(),
    )
}

/// Parses a sent frame as ARP.
pub fn parse_arp(frame: &[u8]) -> Arp {
    let (_, _, payload_type, payload) = parse_eth(frame);
    assert_eq!(payload_type, eth_types::ARP);
    Arp::deserialize(&payload).unwrap()
}

/// Parses a sent frame as IPv4, returning the header and the payload without
/// link layer padding.
pub fn parse_ipv4(frame: &[u8]) -> (Ipv4Repr, Vec<u8>) {
    let (_, _, payload_type, payload) = parse_eth(frame);
    assert_eq!(payload_type, eth_types::IPV4);
    let packet = Ipv4Packet::try_new(&payload[..]).unwrap();
    packet.check_encoding().unwrap();
    (Ipv4Repr::deserialize(&packet), packet.payload().to_vec())
}
