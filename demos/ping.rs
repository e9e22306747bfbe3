#[macro_use]
extern crate lazy_static;

mod cli;
mod env;

use std::cell::Cell;
use std::rc::Rc;
use std::time::{
    Duration,
    Instant,
};

use clap::Arg;

use cli::App;
use lanstack::core::repr::{
    ipv4_protocols,
    Icmpv4Packet,
    Icmpv4Repr,
    Ipv4Address,
};
use lanstack::core::service::{
    icmpv4,
    Interface,
};
use lanstack::core::storage::PacketBuffer;

lazy_static! {
    static ref TIMEOUT: Duration = Duration::from_secs(1);
}

const PING_ID: u16 = 42;

/// Sends ICMP echo requests to an IPv4 address and reports the replies.
fn main() {
    env_logger::init();

    let matches = clap::App::new("ping")
        .with_defaults()
        .arg(
            Arg::with_name("ADDR")
                .value_name("ADDR")
                .help("IPv4 address to ping, defaults to the host end of the TAP")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("count")
                .short("c")
                .value_name("COUNT")
                .default_value("4")
                .takes_value(true),
        )
        .get_matches();

    let ping_addr = match matches.value_of("ADDR") {
        Some(addr) => addr.parse::<Ipv4Address>().expect("Bad IPv4 address!"),
        None => env::ifr_addr(matches.value_of("tap").unwrap_or("tap0"))
            .expect("No IPv4 address on the TAP!"),
    };

    let count = matches
        .value_of("count")
        .and_then(|count| count.parse::<u16>().ok())
        .expect("Bad count!");

    let mut interface = env::interface(&matches);

    // Replaces the default ICMP handler to catch replies, passing everything
    // else through.
    let last_reply = Rc::new(Cell::new(None));
    let handler_reply = last_reply.clone();
    interface.register_protocol_handler(
        ipv4_protocols::ICMP,
        move |interface: &mut Interface, src_addr: Ipv4Address, buffer: &PacketBuffer| {
            let reply = Icmpv4Packet::try_new(&buffer[..])
                .and_then(|packet| Icmpv4Repr::deserialize(&packet));
            match reply {
                Ok(Icmpv4Repr::EchoReply { id: PING_ID, seq }) if src_addr == ping_addr => {
                    handler_reply.set(Some(seq));
                    Ok(())
                }
                _ => icmpv4::recv_packet(interface, src_addr, buffer),
            }
        },
    );

    let payload: Vec<u8> = (0 .. 56).collect();

    for seq in 0 .. count {
        icmpv4::send_echo_request(&mut interface, ping_addr, PING_ID, seq, &payload)
            .expect("Sending ping!");
        let send_at = Instant::now();

        loop {
            if last_reply.get() == Some(seq) {
                println!("Reply from {}: seq={} time={:?}", ping_addr, seq, send_at.elapsed());
                break;
            }
            if send_at.elapsed() >= *TIMEOUT {
                println!("Timeout for seq={}.", seq);
                break;
            }
            env::tick(&mut interface);
        }
    }
}
