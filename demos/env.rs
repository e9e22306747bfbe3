use std::net::IpAddr as StdIpAddr;
use std::time::Duration;

use clap::ArgMatches;

use lanstack::core::repr::{
    EthernetAddress,
    Ipv4Address,
};
use lanstack::core::service::{
    self,
    Config,
    Interface,
    PendingPolicy,
};
use lanstack::core::time::SystemEnv;

lazy_static! {
    /// How long to sleep between polls of an idle device.
    pub static ref POLL_INTERVAL: Duration = Duration::from_millis(1);
}

#[cfg(target_os = "linux")]
fn open_dev(ifr_name: &str) -> Box<dyn lanstack::core::dev::Device> {
    use lanstack::linux::dev::Tap;

    match Tap::new(ifr_name) {
        Ok(tap) => Box::new(tap),
        Err(err) => panic!("Opening TAP '{}': {:?}.", ifr_name, err),
    }
}

#[cfg(not(target_os = "linux"))]
fn open_dev(_: &str) -> Box<dyn lanstack::core::dev::Device> {
    panic!("Sorry, demos are only supported on Linux.");
}

/// Gets the IPv4 address the host assigned to an interface, i.e. the other
/// end of the TAP.
#[allow(dead_code)]
pub fn ifr_addr(ifr_name: &str) -> Option<Ipv4Address> {
    let interfaces = get_if_addrs::get_if_addrs().ok()?;

    interfaces
        .into_iter()
        .filter(|interface| interface.name == ifr_name)
        .filter_map(|interface| match interface.ip() {
            StdIpAddr::V4(ipv4_addr) => Some(Ipv4Address::new(ipv4_addr.octets())),
            _ => None,
        })
        .next()
}

/// Creates and initializes an interface from command line arguments.
pub fn interface(matches: &ArgMatches) -> Interface {
    let ifr_name = matches.value_of("tap").unwrap_or("tap0");

    let ethernet_addr = matches
        .value_of("dev-mac")
        .and_then(|addr| addr.parse::<EthernetAddress>().ok())
        .expect("Bad MAC address!");

    let ipv4_addr = matches
        .value_of("dev-ipv4")
        .and_then(|addr| addr.parse::<Ipv4Address>().ok())
        .expect("Bad IPv4 address!");

    let pending = matches
        .value_of("pending")
        .and_then(|pending| pending.parse::<usize>().ok())
        .expect("Bad pending queue depth!");

    let dev = open_dev(ifr_name);

    let mut config = Config::new(ethernet_addr, ipv4_addr);
    config.mtu = dev.max_transmission_unit();
    if pending > 1 {
        config.pending_policy = PendingPolicy::BoundedQueue(pending);
    }

    println!(
        "Interface: (TAP = {}, MTU = {}, MAC = {}, IPv4 = {})",
        ifr_name, config.mtu, config.ethernet_addr, config.ipv4_addr,
    );

    let mut interface = Interface::new(dev, config, SystemEnv::new());
    service::init(&mut interface).expect("Bringing up interface!");
    interface
}

/// Processes every ready frame, sleeping briefly if there were none.
pub fn tick(interface: &mut Interface) {
    if service::ethernet::recv(interface) == 0 {
        std::thread::sleep(*POLL_INTERVAL);
    }
}
