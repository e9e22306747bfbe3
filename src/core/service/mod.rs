//! Packet processing services for different network layers.
//!
//! The `service` module deals with packet transmission and reception logic at
//! different layers of the network stack. Each layer is a set of functions
//! operating on an `Interface`, which owns all of the state for one stack
//! instance.

pub mod arp;
pub mod ethernet;
pub mod icmpv4;
pub mod ipv4;

use std::collections::HashMap;
use std::time::Duration;

use crate::core::cache::TimedCache;
use crate::core::dev::Device;
use crate::core::reassembly::Reassembly;
use crate::core::repr::{
    ipv4_protocols,
    EthernetAddress,
    EthernetFrame,
    Ipv4Address,
};
use crate::core::storage::{
    PacketBuffer,
    Ring,
};
use crate::core::time::{
    Env,
    SystemEnv,
};
use crate::Result;

/// What to do with outbound packets for a destination whose Ethernet address
/// is still being resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PendingPolicy {
    /// Buffer the first packet and drop any others until resolution finishes.
    DropNewest,
    /// Buffer up to n packets, dropping any past that.
    BoundedQueue(usize),
}

impl PendingPolicy {
    fn depth(&self) -> usize {
        match *self {
            PendingPolicy::DropNewest => 1,
            PendingPolicy::BoundedQueue(depth) => depth,
        }
    }
}

/// Identity and tunables for an interface.
#[derive(Clone, Debug)]
pub struct Config {
    /// Ethernet address for the interface.
    pub ethernet_addr: EthernetAddress,
    /// IPv4 address for the interface.
    pub ipv4_addr: Ipv4Address,
    /// Largest Ethernet payload the link carries. Interface::new(...) lowers
    /// it to the device MTU if larger.
    pub mtu: usize,
    /// TTL for outbound IPv4 datagrams.
    pub ttl: u8,
    /// How long an IPv4 -> Ethernet mapping stays valid after it was learned.
    pub arp_cache_timeout: Duration,
    /// How long packets wait for an ARP reply before being dropped.
    pub arp_pending_timeout: Duration,
    pub pending_policy: PendingPolicy,
    /// Reassemble inbound fragments, otherwise each fragment is processed as
    /// a complete datagram.
    pub ipv4_reassembly: bool,
    pub ipv4_reassembly_timeout: Duration,
    /// Most datagrams kept in reassembly at once, fragments of further
    /// datagrams are dropped.
    pub ipv4_reassembly_limit: usize,
}

impl Config {
    pub fn new(ethernet_addr: EthernetAddress, ipv4_addr: Ipv4Address) -> Config {
        Config {
            ethernet_addr,
            ipv4_addr,
            mtu: 1500,
            ttl: 64,
            arp_cache_timeout: Duration::from_secs(60),
            arp_pending_timeout: Duration::from_millis(500),
            pending_policy: PendingPolicy::DropNewest,
            ipv4_reassembly: true,
            ipv4_reassembly_timeout: Duration::from_secs(30),
            ipv4_reassembly_limit: 64,
        }
    }
}

/// Receives IPv4 payloads for a protocol number.
///
/// Returning Error::Unreachable makes the interface answer the sender with an
/// ICMP destination unreachable message.
pub trait ProtocolHandler<T: Env> {
    fn recv_packet(
        &mut self,
        interface: &mut Interface<T>,
        src_addr: Ipv4Address,
        buffer: &PacketBuffer,
    ) -> Result<()>;
}

impl<T, F> ProtocolHandler<T> for F
where
    T: Env,
    F: FnMut(&mut Interface<T>, Ipv4Address, &PacketBuffer) -> Result<()>,
{
    fn recv_packet(
        &mut self,
        interface: &mut Interface<T>,
        src_addr: Ipv4Address,
        buffer: &PacketBuffer,
    ) -> Result<()> {
        self(interface, src_addr, buffer)
    }
}

/// An interface for sending and receiving network packets.
pub struct Interface<T: Env = SystemEnv> {
    /// Device for sending and receiving raw Ethernet frames.
    pub dev: Box<dyn Device>,
    pub config: Config,
    /// Cache for IPv4/Ethernet address translations.
    pub arp_cache: TimedCache<Ipv4Address, EthernetAddress, T>,
    /// Packets waiting for an IPv4/Ethernet address translation.
    pub arp_pending: TimedCache<Ipv4Address, Ring<PacketBuffer>, T>,
    /// Partially received datagrams, keyed by source and identification.
    pub ipv4_fragments: TimedCache<(Ipv4Address, u16), Reassembly, T>,
    ipv4_ident: u16,
    handlers: HashMap<u8, Box<dyn ProtocolHandler<T>>>,
    rx_buffer: PacketBuffer,
}

impl<T: Env> Interface<T> {
    /// Creates an interface. Call service::init(...) before use.
    pub fn new(dev: Box<dyn Device>, mut config: Config, time_env: T) -> Interface<T> {
        let rx_capacity =
            PacketBuffer::HEADROOM + EthernetFrame::<&[u8]>::buffer_len(dev.max_transmission_unit());

        if config.mtu > dev.max_transmission_unit() {
            debug!(
                "Lowering MTU from {} to device MTU {}.",
                config.mtu,
                dev.max_transmission_unit()
            );
            config.mtu = dev.max_transmission_unit();
        }

        Interface {
            arp_cache: TimedCache::new(config.arp_cache_timeout, time_env.clone()),
            arp_pending: TimedCache::new(config.arp_pending_timeout, time_env.clone()),
            ipv4_fragments: TimedCache::new(config.ipv4_reassembly_timeout, time_env),
            ipv4_ident: rand::random::<u16>(),
            handlers: HashMap::new(),
            rx_buffer: PacketBuffer::new(rx_capacity),
            dev,
            config,
        }
    }

    pub fn ethernet_addr(&self) -> EthernetAddress {
        self.config.ethernet_addr
    }

    pub fn ipv4_addr(&self) -> Ipv4Address {
        self.config.ipv4_addr
    }

    /// Registers the handler for IPv4 payloads of a protocol, replacing any
    /// previous one.
    pub fn register_protocol_handler<H>(&mut self, protocol: u8, handler: H)
    where
        H: ProtocolHandler<T> + 'static,
    {
        self.handlers.insert(protocol, Box::new(handler));
    }

    /// Checks if a handler is registered for a protocol.
    pub fn handles_protocol(&self, protocol: u8) -> bool {
        self.handlers.contains_key(&protocol)
    }

    /// Returns a fresh identification for an outbound datagram.
    fn next_ipv4_ident(&mut self) -> u16 {
        let ident = self.ipv4_ident;
        self.ipv4_ident = self.ipv4_ident.wrapping_add(1);
        ident
    }

    fn pending_ring(&self) -> Ring<PacketBuffer> {
        Ring::with_capacity(self.config.pending_policy.depth())
    }

    /// Runs the handler for protocol, if any, with the handler temporarily
    /// taken out of the interface so it can use the interface itself.
    fn dispatch_protocol(
        &mut self,
        protocol: u8,
        src_addr: Ipv4Address,
        buffer: &PacketBuffer,
    ) -> Option<Result<()>> {
        let mut handler = self.handlers.remove(&protocol)?;
        let res = handler.recv_packet(self, src_addr, buffer);
        self.handlers.entry(protocol).or_insert(handler);
        Some(res)
    }
}

struct Icmpv4Handler;

impl<T: Env> ProtocolHandler<T> for Icmpv4Handler {
    fn recv_packet(
        &mut self,
        interface: &mut Interface<T>,
        src_addr: Ipv4Address,
        buffer: &PacketBuffer,
    ) -> Result<()> {
        icmpv4::recv_packet(interface, src_addr, buffer)
    }
}

/// Brings up an interface: registers ICMP with IPv4 and announces the
/// interface address over ARP.
pub fn init<T: Env>(interface: &mut Interface<T>) -> Result<()> {
    interface.register_protocol_handler(ipv4_protocols::ICMP, Icmpv4Handler);
    arp::announce(interface)
}
