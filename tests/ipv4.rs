mod context;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use assert_matches::assert_matches;

use lanstack::core::repr::{
    icmpv4_types,
    ipv4_protocols,
    EthernetAddress,
    Icmpv4DestinationUnreachable,
    Icmpv4Packet,
    Ipv4Address,
    Ipv4Repr,
};
use lanstack::core::service::{
    ipv4,
    Interface,
};
use lanstack::core::storage::PacketBuffer;
use lanstack::core::time::MockEnv;
use lanstack::{
    Error,
    Result,
};

use context::{
    LOCAL_IPV4_ADDR,
    PEER_ETH_ADDR,
    PEER_IPV4_ADDR,
};

const TEST_PROTOCOL: u8 = 253;

/// Registers a handler for TEST_PROTOCOL which records every payload.
fn record_payloads(context: &mut context::Context) -> Rc<RefCell<Vec<(Ipv4Address, Vec<u8>)>>> {
    let received = Rc::new(RefCell::new(vec![]));
    let handler_received = received.clone();

    context.interface.register_protocol_handler(
        TEST_PROTOCOL,
        move |_: &mut Interface<MockEnv>, src_addr: Ipv4Address, buffer: &PacketBuffer| -> Result<()> {
            handler_received
                .borrow_mut()
                .push((src_addr, buffer.to_vec()));
            Ok(())
        },
    );

    received
}

fn fragment(ident: u16, fragment_offset: u16, more_fragments: bool, payload: &[u8]) -> Vec<u8> {
    context::ipv4_frame(&context::ipv4_packet_with(
        Ipv4Repr {
            src_addr: *PEER_IPV4_ADDR,
            dst_addr: *LOCAL_IPV4_ADDR,
            protocol: TEST_PROTOCOL,
            ident,
            more_fragments,
            fragment_offset,
            ttl: 64,
            payload_len: payload.len(),
        },
        payload,
    ))
}

fn learn_peer(context: &mut context::Context) {
    context
        .interface
        .arp_cache
        .set(*PEER_IPV4_ADDR, *PEER_ETH_ADDR);
}

#[test]
fn fragment_large_payload() {
    context::run(|context| {
        learn_peer(context);

        let payload: Vec<u8> = (0 .. 3060).map(|i| i as u8).collect();
        let mut buffer = PacketBuffer::from_payload(&payload).unwrap();
        ipv4::send_packet(
            &mut context.interface,
            &mut buffer,
            *PEER_IPV4_ADDR,
            ipv4_protocols::UDP,
        ).unwrap();

        let fragments: Vec<_> = context
            .sent()
            .iter()
            .map(|frame| context::parse_ipv4(frame))
            .collect();
        assert_eq!(fragments.len(), 3);

        let ident = fragments[0].0.ident;
        assert!(fragments.iter().all(|(repr, _)| repr.ident == ident));

        let offsets: Vec<_> = fragments.iter().map(|(repr, _)| repr.fragment_offset).collect();
        assert_eq!(offsets, vec![0, 185, 370]);

        let more_fragments: Vec<_> = fragments.iter().map(|(repr, _)| repr.more_fragments).collect();
        assert_eq!(more_fragments, vec![true, true, false]);

        let lens: Vec<_> = fragments.iter().map(|(_, payload)| payload.len()).collect();
        assert_eq!(lens, vec![1480, 1480, 100]);

        let joined: Vec<u8> = fragments
            .into_iter()
            .flat_map(|(_, payload)| payload)
            .collect();
        assert_eq!(joined, payload);
    });
}

#[test]
fn fragments_wait_for_arp_together() {
    context::run_with(
        |config| config.pending_policy = lanstack::core::service::PendingPolicy::BoundedQueue(4),
        |context| {
            let mut buffer = PacketBuffer::from_payload(&[0; 2000]).unwrap();
            ipv4::send_packet(
                &mut context.interface,
                &mut buffer,
                *PEER_IPV4_ADDR,
                ipv4_protocols::UDP,
            ).unwrap();

            // One ARP request covers both fragments.
            assert_eq!(context.sent().len(), 1);

            context.deliver(&context::arp_frame(
                lanstack::core::repr::ArpOp::Reply,
                *LOCAL_IPV4_ADDR,
                *context::LOCAL_ETH_ADDR,
            ));

            let offsets: Vec<_> = context
                .sent()
                .iter()
                .map(|frame| context::parse_ipv4(frame).0.fragment_offset)
                .collect();
            assert_eq!(offsets, vec![0, 185]);
        },
    );
}

#[test]
fn dispatch_to_handler() {
    context::run(|context| {
        let received = record_payloads(context);

        context.deliver(&context::ipv4_frame(&context::ipv4_packet(
            TEST_PROTOCOL,
            &[1, 2, 3],
        )));

        assert_eq!(*received.borrow(), vec![(*PEER_IPV4_ADDR, vec![1, 2, 3])]);
        assert!(context.sent().is_empty());
    });
}

#[test]
fn strip_link_padding() {
    context::run(|context| {
        let received = record_payloads(context);

        let mut frame = context::ipv4_frame(&context::ipv4_packet(TEST_PROTOCOL, &[7; 4]));
        frame.resize(60, 0);

        context.deliver(&frame);

        assert_eq!(*received.borrow(), vec![(*PEER_IPV4_ADDR, vec![7; 4])]);
    });
}

#[test]
fn drop_foreign_destination() {
    context::run(|context| {
        let received = record_payloads(context);

        let mut repr = Ipv4Repr {
            src_addr: *PEER_IPV4_ADDR,
            dst_addr: Ipv4Address::new([10, 0, 0, 9]),
            protocol: TEST_PROTOCOL,
            ident: 1,
            more_fragments: false,
            fragment_offset: 0,
            ttl: 64,
            payload_len: 4,
        };
        context.deliver(&context::ipv4_frame(&context::ipv4_packet_with(repr, &[1; 4])));

        // Unknown protocols for foreign hosts are not reported either.
        repr.protocol = ipv4_protocols::UDP;
        context.deliver(&context::ipv4_frame(&context::ipv4_packet_with(repr, &[1; 4])));

        assert!(received.borrow().is_empty());
        assert!(context.sent().is_empty());
    });
}

#[test]
fn drop_bad_header_checksum() {
    context::run(|context| {
        let received = record_payloads(context);

        let mut packet = context::ipv4_packet(TEST_PROTOCOL, &[1; 4]);
        packet[8] = packet[8].wrapping_sub(1);
        context.deliver(&context::ipv4_frame(&packet));

        assert!(received.borrow().is_empty());
        assert!(context.sent().is_empty());
    });
}

#[test]
fn drop_truncated_packet() {
    context::run(|context| {
        let received = record_payloads(context);

        let mut packet = context::ipv4_packet(TEST_PROTOCOL, &[1; 40]);
        packet.truncate(30);
        context.deliver(&context::ipv4_frame(&packet));

        assert!(received.borrow().is_empty());
        assert!(context.sent().is_empty());
    });
}

#[test]
fn protocol_unreachable() {
    context::run(|context| {
        learn_peer(context);

        let packet = context::ipv4_packet(ipv4_protocols::UDP, &[9; 16]);
        context.deliver(&context::ipv4_frame(&packet));

        let frames = context.sent();
        assert_eq!(frames.len(), 1);

        let (ipv4_repr, icmp) = context::parse_ipv4(&frames[0]);
        assert_eq!(ipv4_repr.src_addr, *LOCAL_IPV4_ADDR);
        assert_eq!(ipv4_repr.dst_addr, *PEER_IPV4_ADDR);
        assert_eq!(ipv4_repr.protocol, ipv4_protocols::ICMP);

        let icmp_packet = Icmpv4Packet::try_new(&icmp[..]).unwrap();
        assert_matches!(icmp_packet.check_encoding(), Ok(()));
        assert_eq!(icmp_packet._type(), icmpv4_types::DESTINATION_UNREACHABLE);
        assert_eq!(
            icmp_packet.code(),
            Icmpv4DestinationUnreachable::ProtocolUnreachable as u8
        );
        assert_eq!(icmp_packet.payload(), &packet[.. 28]);
    });
}

#[test]
fn handler_reports_unreachable() {
    context::run(|context| {
        learn_peer(context);

        context.interface.register_protocol_handler(
            ipv4_protocols::UDP,
            |_: &mut Interface<MockEnv>, _: Ipv4Address, _: &PacketBuffer| -> Result<()> {
                Err(Error::Unreachable(
                    Icmpv4DestinationUnreachable::PortUnreachable,
                ))
            },
        );

        let packet = context::ipv4_packet(ipv4_protocols::UDP, &[9; 16]);
        context.deliver(&context::ipv4_frame(&packet));

        let frames = context.sent();
        assert_eq!(frames.len(), 1);

        let (_, icmp) = context::parse_ipv4(&frames[0]);
        let icmp_packet = Icmpv4Packet::try_new(&icmp[..]).unwrap();
        assert_eq!(icmp_packet._type(), icmpv4_types::DESTINATION_UNREACHABLE);
        assert_eq!(
            icmp_packet.code(),
            Icmpv4DestinationUnreachable::PortUnreachable as u8
        );
        assert_eq!(icmp_packet.payload(), &packet[.. 28]);
    });
}

#[test]
fn replace_handler() {
    context::run(|context| {
        let first = record_payloads(context);
        let second = record_payloads(context);

        assert!(context.interface.handles_protocol(TEST_PROTOCOL));
        context.deliver(&context::ipv4_frame(&context::ipv4_packet(TEST_PROTOCOL, &[1])));

        assert!(first.borrow().is_empty());
        assert_eq!(second.borrow().len(), 1);
    });
}

#[test]
fn reassemble_out_of_order() {
    context::run(|context| {
        let received = record_payloads(context);

        context.deliver(&fragment(7, 2, false, &[3; 4]));
        context.deliver(&fragment(7, 0, true, &[1; 8]));
        assert!(received.borrow().is_empty());

        context.deliver(&fragment(7, 1, true, &[2; 8]));

        let expected: Vec<u8> = [&[1u8; 8][..], &[2; 8][..], &[3; 4][..]].concat();
        assert_eq!(*received.borrow(), vec![(*PEER_IPV4_ADDR, expected)]);
        assert!(context.interface.ipv4_fragments.is_empty());
    });
}

#[test]
fn stale_reassemblies_purged() {
    context::run(|context| {
        record_payloads(context);

        for ident in 0 .. 40 {
            context.deliver(&fragment(ident, 0, true, &[1; 8]));
        }
        assert_eq!(context.interface.ipv4_fragments.len(), 40);

        context.advance(Duration::from_secs(3600));

        // Any fragment evicts every expired datagram, not just its own.
        for ident in 100 .. 140 {
            context.deliver(&fragment(ident, 0, true, &[1; 8]));
        }
        assert_eq!(context.interface.ipv4_fragments.len(), 40);
        assert!(!context.interface.ipv4_fragments.contains(&(*PEER_IPV4_ADDR, 0)));
    });
}

#[test]
fn reassembly_limit() {
    context::run_with(
        |config| config.ipv4_reassembly_limit = 4,
        |context| {
            let received = record_payloads(context);

            for ident in 0 .. 6 {
                context.deliver(&fragment(ident, 0, true, &[1; 8]));
            }
            assert_eq!(context.interface.ipv4_fragments.len(), 4);
            assert!(!context.interface.ipv4_fragments.contains(&(*PEER_IPV4_ADDR, 5)));

            // Datagrams already in reassembly still complete.
            context.deliver(&fragment(3, 1, false, &[2; 4]));
            let expected: Vec<u8> = [&[1u8; 8][..], &[2; 4][..]].concat();
            assert_eq!(*received.borrow(), vec![(*PEER_IPV4_ADDR, expected)]);
            assert_eq!(context.interface.ipv4_fragments.len(), 3);
        },
    );
}

#[test]
fn reassembly_disabled() {
    context::run_with(
        |config| config.ipv4_reassembly = false,
        |context| {
            let received = record_payloads(context);

            context.deliver(&fragment(7, 0, true, &[1; 8]));
            context.deliver(&fragment(7, 1, false, &[2; 4]));

            assert_eq!(
                *received.borrow(),
                vec![(*PEER_IPV4_ADDR, vec![1; 8]), (*PEER_IPV4_ADDR, vec![2; 4])]
            );
        },
    );
}

#[test]
fn device_failure_reported() {
    context::run(|context| {
        learn_peer(context);
        context.dev.set_fail_send(true);

        let mut buffer = PacketBuffer::from_payload(&[1; 4]).unwrap();
        assert_matches!(
            ipv4::send_packet(
                &mut context.interface,
                &mut buffer,
                *PEER_IPV4_ADDR,
                ipv4_protocols::UDP,
            ),
            Err(Error::Device(_))
        );

        context.dev.set_fail_send(false);
        assert!(context.sent().is_empty());
    });
}

#[test]
fn unresolved_send_succeeds() {
    context::run(|context| {
        let mut buffer = PacketBuffer::from_payload(&[1; 4]).unwrap();
        assert_matches!(
            ipv4::send_packet(
                &mut context.interface,
                &mut buffer,
                Ipv4Address::new([10, 0, 0, 77]),
                ipv4_protocols::UDP,
            ),
            Ok(())
        );

        let frames = context.sent();
        assert_eq!(frames.len(), 1);
        let (dst_addr, _, _, _) = context::parse_eth(&frames[0]);
        assert_eq!(dst_addr, EthernetAddress::BROADCAST);
    });
}
