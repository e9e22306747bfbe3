#[macro_use]
extern crate lazy_static;

mod cli;
mod env;

use std::time::{
    Duration,
    Instant,
};

use clap::Arg;

use cli::App;
use lanstack::core::repr::Ipv4Address;
use lanstack::core::service::arp;

lazy_static! {
    static ref TIMEOUT: Duration = Duration::from_secs(1);
}

/// Resolves the Ethernet address for an IPv4 address and prints the ARP table.
fn main() {
    env_logger::init();

    let matches = clap::App::new("arping")
        .with_defaults()
        .arg(
            Arg::with_name("ADDR")
                .value_name("ADDR")
                .help("IPv4 address to resolve, defaults to the host end of the TAP")
                .takes_value(true),
        )
        .get_matches();

    let arping_addr = match matches.value_of("ADDR") {
        Some(addr) => addr.parse::<Ipv4Address>().expect("Bad IPv4 address!"),
        None => env::ifr_addr(matches.value_of("tap").unwrap_or("tap0"))
            .expect("No IPv4 address on the TAP!"),
    };

    let mut interface = env::interface(&matches);

    arp::send_request(&mut interface, arping_addr).expect("Sending ARP request!");
    let send_at = Instant::now();

    while !interface.arp_cache.contains(&arping_addr) {
        if send_at.elapsed() >= *TIMEOUT {
            eprintln!("Timeout!");
            std::process::exit(1);
        }
        env::tick(&mut interface);
    }

    println!("{} resolved in {:?}.", arping_addr, send_at.elapsed());

    arp::for_each_entry(&mut interface, |ipv4_addr, eth_addr, since| {
        println!(
            "{:>15} -> {} ({:?} ago)",
            ipv4_addr.to_string(),
            eth_addr,
            since.elapsed()
        );
    });
}
