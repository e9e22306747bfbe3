use crate::core::dev::Error as DevError;
use crate::core::repr::{
    eth_types,
    EthernetAddress,
    EthernetFrame,
};
use crate::core::service::{
    arp,
    ipv4,
    Interface,
};
use crate::core::storage::PacketBuffer;
use crate::core::time::Env;
use crate::{
    Error,
    Result,
};

/// Frames the buffer and sends it via the interface.
///
/// Payloads shorter than the Ethernet minimum are zero padded. The buffer is
/// left holding the whole frame.
pub fn send_frame<T: Env>(
    interface: &mut Interface<T>,
    buffer: &mut PacketBuffer,
    dst_addr: EthernetAddress,
    payload_type: u16,
) -> Result<()> {
    let min_payload_len = EthernetFrame::<&[u8]>::MIN_PAYLOAD_LEN;
    if buffer.len() < min_payload_len {
        let padding_len = min_payload_len - buffer.len();
        buffer.add_padding(padding_len)?;
    }

    buffer.add_header(EthernetFrame::<&[u8]>::HEADER_LEN)?;

    {
        let mut eth_frame = EthernetFrame::try_new(&mut buffer[..])?;
        eth_frame.set_dst_addr(dst_addr);
        eth_frame.set_src_addr(interface.ethernet_addr());
        eth_frame.set_payload_type(payload_type);
    }

    interface.dev.send(&buffer[..])?;
    Ok(())
}

/// Receives an Ethernet frame from an interface.
///
/// The Ethernet frame is parsed, filtered by destination, stripped of its
/// header and propagated up the network stack.
pub fn recv_frame<T: Env>(interface: &mut Interface<T>, buffer: &mut PacketBuffer) -> Result<()> {
    let (dst_addr, src_addr, payload_type) = {
        let eth_frame = EthernetFrame::try_new(&buffer[..])?;
        (
            eth_frame.dst_addr(),
            eth_frame.src_addr(),
            eth_frame.payload_type(),
        )
    };

    if dst_addr != interface.ethernet_addr() && !dst_addr.is_broadcast() {
        debug!("Ignoring ethernet frame with destination {}.", dst_addr);
        return Err(Error::Ignored);
    }

    buffer.remove_header(EthernetFrame::<&[u8]>::HEADER_LEN)?;

    match payload_type {
        eth_types::ARP => arp::recv_packet(interface, buffer, src_addr),
        eth_types::IPV4 => ipv4::recv_packet(interface, buffer, src_addr),
        i => {
            debug!("Ignoring ethernet frame with type 0x{:04X}.", i);
            Err(Error::Ignored)
        }
    }
}

/// Reads and processes a single frame from the device.
///
/// Returns false without blocking if no frame was ready. Errors processing
/// the frame are logged rather than returned, since dropping bad frames is
/// the expected outcome on a shared link.
pub fn poll<T: Env>(interface: &mut Interface<T>) -> bool {
    let mut buffer = std::mem::take(&mut interface.rx_buffer);

    let received = {
        let dev = &mut interface.dev;
        buffer.fill_with(|frame| dev.recv(frame))
    };

    let polled = match received {
        Ok(_) => {
            if let Err(err) = recv_frame(interface, &mut buffer) {
                match err {
                    Error::Device(err) => warn!("Device::send(...) failed with {:?}.", err),
                    err => debug!("Dropped frame with {:?}.", err),
                }
            }
            true
        }
        Err(DevError::Nothing) => false,
        Err(err) => {
            warn!("Device::recv(...) failed with {:?}.", err);
            false
        }
    };

    interface.rx_buffer = buffer;
    polled
}

/// Processes frames until the device has none ready. Returns the number of
/// frames processed.
pub fn recv<T: Env>(interface: &mut Interface<T>) -> usize {
    let mut count = 0;
    while poll(interface) {
        count += 1;
    }
    count
}
