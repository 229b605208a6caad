//! Synthetic IPv4/UDP datagrams carried inside the tunnel
//!
//! The peer expects a full IP packet as transport plaintext, so the caller's
//! payload is wrapped in a 20-byte IPv4 header and an 8-byte UDP header
//! before sealing, and the same 28 bytes are stripped from the reply.

use std::net::Ipv4Addr;

use rand::Rng;

use crate::error::ProtocolError;

/// IPv4 header without options (IHL = 5)
pub const IPV4_HEADER_LEN: usize = 20;

pub const UDP_HEADER_LEN: usize = 8;

/// Bytes prepended to the payload, and stripped from the reply
pub const DATAGRAM_HEADER_LEN: usize = IPV4_HEADER_LEN + UDP_HEADER_LEN;

/// Transport plaintext is zero-padded to a multiple of this
pub const PADDING_MULTIPLE: usize = 16;

/// Largest payload whose IPv4 total length still fits in 16 bits
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize - DATAGRAM_HEADER_LEN;

const IP_PROTOCOL_UDP: u8 = 17;

const DEFAULT_TTL: u8 = 64;

/// Addressing for one synthetic datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatagramHeader {
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
    pub source_port: u16,
    pub destination_port: u16,
    pub identification: u16,
}

impl DatagramHeader {
    /// Random identification and ephemeral source port (49152..=65535)
    pub fn new(source: Ipv4Addr, destination: Ipv4Addr, destination_port: u16) -> Self {
        let mut rng = rand::thread_rng();
        Self {
            source,
            destination,
            source_port: rng.gen_range(49152..=u16::MAX),
            destination_port,
            identification: rng.gen(),
        }
    }
}

/// Add big-endian 16-bit words of `data` to `sum`
///
/// An odd trailing byte is the high byte of a final zero-padded word.
pub fn ones_complement_sum(mut sum: u32, data: &[u8]) -> u32 {
    let mut chunks = data.chunks_exact(2);
    for word in &mut chunks {
        sum += u32::from(u16::from_be_bytes([word[0], word[1]]));
    }
    if let [last] = chunks.remainder() {
        sum += u32::from(*last) << 8;
    }
    sum
}

/// Fold carries back into 16 bits and complement
pub fn finish_checksum(mut sum: u32) -> u16 {
    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

/// Header checksum over a header whose checksum field is zero
pub fn ipv4_checksum(header: &[u8]) -> u16 {
    finish_checksum(ones_complement_sum(0, header))
}

/// UDP checksum over the IPv4 pseudo-header, the UDP header and the payload
///
/// `udp_header` must carry a zero checksum field. A computed value of zero is
/// sent as 0xffff, since zero means "no checksum" on the wire.
pub fn udp_checksum(
    source: Ipv4Addr,
    destination: Ipv4Addr,
    udp_header: &[u8; UDP_HEADER_LEN],
    payload: &[u8],
) -> u16 {
    let udp_len = (UDP_HEADER_LEN + payload.len()) as u32;

    let mut sum = ones_complement_sum(0, &source.octets());
    sum = ones_complement_sum(sum, &destination.octets());
    sum += u32::from(IP_PROTOCOL_UDP);
    sum += udp_len;
    sum = ones_complement_sum(sum, udp_header);
    sum = ones_complement_sum(sum, payload);

    match finish_checksum(sum) {
        0 => 0xffff,
        csum => csum,
    }
}

/// Build `IPv4 header || UDP header || payload`
pub fn build_datagram(header: &DatagramHeader, payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(ProtocolError::PayloadTooLarge {
            len: payload.len(),
            max: MAX_PAYLOAD_LEN,
        });
    }

    let udp_len = (UDP_HEADER_LEN + payload.len()) as u16;
    let total_len = (DATAGRAM_HEADER_LEN + payload.len()) as u16;

    let mut udp = [0u8; UDP_HEADER_LEN];
    udp[0..2].copy_from_slice(&header.source_port.to_be_bytes());
    udp[2..4].copy_from_slice(&header.destination_port.to_be_bytes());
    udp[4..6].copy_from_slice(&udp_len.to_be_bytes());
    let udp_csum = udp_checksum(header.source, header.destination, &udp, payload);
    udp[6..8].copy_from_slice(&udp_csum.to_be_bytes());

    let mut ip = [0u8; IPV4_HEADER_LEN];
    ip[0] = 0x45; // version 4, IHL 5
    ip[2..4].copy_from_slice(&total_len.to_be_bytes());
    ip[4..6].copy_from_slice(&header.identification.to_be_bytes());
    // ip[6..8]: flags and fragment offset stay zero
    ip[8] = DEFAULT_TTL;
    ip[9] = IP_PROTOCOL_UDP;
    ip[12..16].copy_from_slice(&header.source.octets());
    ip[16..20].copy_from_slice(&header.destination.octets());
    let ip_csum = ipv4_checksum(&ip);
    ip[10..12].copy_from_slice(&ip_csum.to_be_bytes());

    let mut packet = Vec::with_capacity(padded_len(total_len as usize));
    packet.extend_from_slice(&ip);
    packet.extend_from_slice(&udp);
    packet.extend_from_slice(payload);
    Ok(packet)
}

/// Length after padding to the next multiple of 16
pub fn padded_len(len: usize) -> usize {
    len.div_ceil(PADDING_MULTIPLE) * PADDING_MULTIPLE
}

/// Zero-pad `packet` in place to a multiple of 16 bytes
pub fn pad_to_block(packet: &mut Vec<u8>) {
    packet.resize(padded_len(packet.len()), 0);
}

/// Return the UDP payload of a decrypted reply packet
///
/// The leading 28 bytes are the peer's IPv4 and UDP headers. When the IPv4
/// total length is consistent with the buffer, trailing padding is dropped too.
pub fn strip_datagram(packet: &[u8]) -> Result<&[u8], ProtocolError> {
    if packet.len() < DATAGRAM_HEADER_LEN {
        return Err(ProtocolError::MalformedPacket {
            reason: format!(
                "reply of {} bytes is shorter than the {}-byte IP/UDP header",
                packet.len(),
                DATAGRAM_HEADER_LEN
            ),
        });
    }

    let total_len = usize::from(u16::from_be_bytes([packet[2], packet[3]]));
    let end = if packet[0] >> 4 == 4 && (DATAGRAM_HEADER_LEN..=packet.len()).contains(&total_len) {
        total_len
    } else {
        packet.len()
    };

    Ok(&packet[DATAGRAM_HEADER_LEN..end])
}
