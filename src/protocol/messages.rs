//! WireGuard message wire formats
//!
//! Explicit little-endian encode/decode for:
//! - Type 1: Handshake Initiation (148 bytes)
//! - Type 2: Handshake Response (92 bytes)
//! - Type 3: Cookie Reply (64 bytes, recognised only)
//! - Type 4: Transport Data (16-byte header + sealed payload)

use crate::crypto::aead::TAG_LEN;
use crate::error::ProtocolError;

/// WireGuard message types (encoded as a little-endian u32)
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    HandshakeInitiation = 1,
    HandshakeResponse = 2,
    CookieReply = 3,
    TransportData = 4,
}

impl TryFrom<u32> for MessageType {
    type Error = ProtocolError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::HandshakeInitiation),
            2 => Ok(Self::HandshakeResponse),
            3 => Ok(Self::CookieReply),
            4 => Ok(Self::TransportData),
            _ => Err(ProtocolError::InvalidMessageType { msg_type: value }),
        }
    }
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&data[offset..offset + 4]);
    u32::from_le_bytes(buf)
}

fn read_u64(data: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(buf)
}

fn read_array<const N: usize>(data: &[u8], offset: usize) -> [u8; N] {
    let mut buf = [0u8; N];
    buf.copy_from_slice(&data[offset..offset + N]);
    buf
}

fn expect_type(data: &[u8], expected: MessageType) -> Result<(), ProtocolError> {
    let msg_type = read_u32(data, 0);
    if msg_type != expected as u32 {
        return Err(ProtocolError::InvalidMessageType { msg_type });
    }
    Ok(())
}

/// Handshake Initiation message (148 bytes)
///
/// ```text
/// type(4) | sender(4) | ephemeral(32) | encrypted_static(48) |
/// encrypted_timestamp(28) | mac1(16) | mac2(16)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageInitiation {
    pub sender: u32,
    pub ephemeral: [u8; 32],
    pub encrypted_static: [u8; 48],    // 32 bytes static + 16 bytes tag
    pub encrypted_timestamp: [u8; 28], // 12 bytes TAI64N + 16 bytes tag
    pub mac1: [u8; 16],
    pub mac2: [u8; 16],
}

impl MessageInitiation {
    pub const SIZE: usize = 148;

    /// Offset of the mac1 field; everything before it is covered by mac1
    pub const MAC1_OFFSET: usize = 116;

    /// Offset of the mac2 field; everything before it is covered by mac2
    pub const MAC2_OFFSET: usize = 132;

    /// Create a new initiation (MACs are zeroed and filled in by the cookie generator)
    pub fn new(
        sender: u32,
        ephemeral: [u8; 32],
        encrypted_static: [u8; 48],
        encrypted_timestamp: [u8; 28],
    ) -> Self {
        Self {
            sender,
            ephemeral,
            encrypted_static,
            encrypted_timestamp,
            mac1: [0u8; 16],
            mac2: [0u8; 16],
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];

        buf[0..4].copy_from_slice(&(MessageType::HandshakeInitiation as u32).to_le_bytes());
        buf[4..8].copy_from_slice(&self.sender.to_le_bytes());
        buf[8..40].copy_from_slice(&self.ephemeral);
        buf[40..88].copy_from_slice(&self.encrypted_static);
        buf[88..116].copy_from_slice(&self.encrypted_timestamp);
        buf[116..132].copy_from_slice(&self.mac1);
        buf[132..148].copy_from_slice(&self.mac2);

        buf
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() != Self::SIZE {
            return Err(ProtocolError::InvalidMessageLength {
                expected: Self::SIZE,
                got: data.len(),
            });
        }
        expect_type(data, MessageType::HandshakeInitiation)?;

        Ok(Self {
            sender: read_u32(data, 4),
            ephemeral: read_array(data, 8),
            encrypted_static: read_array(data, 40),
            encrypted_timestamp: read_array(data, 88),
            mac1: read_array(data, 116),
            mac2: read_array(data, 132),
        })
    }
}

/// Handshake Response message (92 bytes)
///
/// ```text
/// type(4) | sender(4) | receiver(4) | ephemeral(32) |
/// encrypted_empty(16) | mac1(16) | mac2(16)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageResponse {
    pub sender: u32,
    pub receiver: u32,
    pub ephemeral: [u8; 32],
    pub encrypted_empty: [u8; TAG_LEN], // Just the auth tag
    pub mac1: [u8; 16],
    pub mac2: [u8; 16],
}

impl MessageResponse {
    pub const SIZE: usize = 92;

    pub const MAC1_OFFSET: usize = 60;

    pub const MAC2_OFFSET: usize = 76;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];

        buf[0..4].copy_from_slice(&(MessageType::HandshakeResponse as u32).to_le_bytes());
        buf[4..8].copy_from_slice(&self.sender.to_le_bytes());
        buf[8..12].copy_from_slice(&self.receiver.to_le_bytes());
        buf[12..44].copy_from_slice(&self.ephemeral);
        buf[44..60].copy_from_slice(&self.encrypted_empty);
        buf[60..76].copy_from_slice(&self.mac1);
        buf[76..92].copy_from_slice(&self.mac2);

        buf
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() != Self::SIZE {
            return Err(ProtocolError::InvalidMessageLength {
                expected: Self::SIZE,
                got: data.len(),
            });
        }
        expect_type(data, MessageType::HandshakeResponse)?;

        Ok(Self {
            sender: read_u32(data, 4),
            receiver: read_u32(data, 8),
            ephemeral: read_array(data, 12),
            encrypted_empty: read_array(data, 44),
            mac1: read_array(data, 60),
            mac2: read_array(data, 76),
        })
    }
}

/// Size of a Cookie Reply message; only its type is ever inspected
pub const COOKIE_REPLY_SIZE: usize = 64;

/// Transport Data message header (16 bytes, followed by the sealed packet)
///
/// ```text
/// type(4) | receiver(4) | counter(8) | encrypted_packet(n+16)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportHeader {
    pub receiver: u32,
    pub counter: u64,
}

impl TransportHeader {
    pub const SIZE: usize = 16;

    pub const OFFSET_RECEIVER: usize = 4;

    pub const OFFSET_COUNTER: usize = 8;

    /// Smallest valid transport message: header plus an empty sealed payload
    pub const MIN_SIZE: usize = Self::SIZE + TAG_LEN;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&(MessageType::TransportData as u32).to_le_bytes());
        buf[4..8].copy_from_slice(&self.receiver.to_le_bytes());
        buf[8..16].copy_from_slice(&self.counter.to_le_bytes());
        buf
    }

    /// Build a complete transport message around an already sealed payload
    pub fn build_message(&self, sealed: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE + sealed.len());
        buf.extend_from_slice(&self.to_bytes());
        buf.extend_from_slice(sealed);
        buf
    }

    /// Parse the header of a transport message
    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() < Self::MIN_SIZE {
            return Err(ProtocolError::InvalidMessageLength {
                expected: Self::MIN_SIZE,
                got: data.len(),
            });
        }
        expect_type(data, MessageType::TransportData)?;

        Ok(Self {
            receiver: read_u32(data, Self::OFFSET_RECEIVER),
            counter: read_u64(data, Self::OFFSET_COUNTER),
        })
    }

    /// The sealed payload of a transport message
    pub fn payload(data: &[u8]) -> &[u8] {
        &data[Self::SIZE..]
    }
}

/// Get the message type from a packet
pub fn message_type(data: &[u8]) -> Result<MessageType, ProtocolError> {
    if data.len() < 4 {
        return Err(ProtocolError::InvalidMessageLength {
            expected: 4,
            got: data.len(),
        });
    }
    MessageType::try_from(read_u32(data, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initiation_layout() {
        let init = MessageInitiation {
            sender: 0x12345678,
            ephemeral: [1u8; 32],
            encrypted_static: [2u8; 48],
            encrypted_timestamp: [3u8; 28],
            mac1: [4u8; 16],
            mac2: [5u8; 16],
        };

        let bytes = init.to_bytes();
        assert_eq!(&bytes[0..4], &[1, 0, 0, 0]);
        assert_eq!(&bytes[4..8], &[0x78, 0x56, 0x34, 0x12]);
        assert!(bytes[8..40].iter().all(|&b| b == 1));
        assert!(bytes[40..88].iter().all(|&b| b == 2));
        assert!(bytes[88..116].iter().all(|&b| b == 3));
        assert!(bytes[116..132].iter().all(|&b| b == 4));
        assert!(bytes[132..148].iter().all(|&b| b == 5));

        assert_eq!(MessageInitiation::from_bytes(&bytes).unwrap(), init);
    }

    #[test]
    fn test_response_parse() {
        let mut data = [0u8; MessageResponse::SIZE];
        data[0] = 2;
        data[4..8].copy_from_slice(&0x11223344u32.to_le_bytes());
        data[8..12].copy_from_slice(&0x55667788u32.to_le_bytes());
        data[12..44].copy_from_slice(&[9u8; 32]);
        data[44..60].copy_from_slice(&[8u8; 16]);

        let parsed = MessageResponse::from_bytes(&data).unwrap();
        assert_eq!(parsed.sender, 0x11223344);
        assert_eq!(parsed.receiver, 0x55667788);
        assert_eq!(parsed.ephemeral, [9u8; 32]);
        assert_eq!(parsed.encrypted_empty, [8u8; 16]);
        assert_eq!(parsed.to_bytes(), data);
    }

    #[test]
    fn test_response_wrong_size() {
        let data = [2u8; MessageResponse::SIZE - 1];
        assert!(matches!(
            MessageResponse::from_bytes(&data),
            Err(ProtocolError::InvalidMessageLength { expected: 92, got: 91 })
        ));
    }

    #[test]
    fn test_response_reserved_bytes_must_be_zero() {
        let mut data = [0u8; MessageResponse::SIZE];
        data[0] = 2;
        data[1] = 1;
        assert!(matches!(
            MessageResponse::from_bytes(&data),
            Err(ProtocolError::InvalidMessageType { msg_type: 0x0102 })
        ));
    }

    #[test]
    fn test_transport_build() {
        let header = TransportHeader {
            receiver: 42,
            counter: 1234,
        };
        let payload = vec![0xAA; 100];
        let msg = header.build_message(&payload);

        assert_eq!(&msg[0..4], &[4, 0, 0, 0]);
        assert_eq!(msg.len(), TransportHeader::SIZE + payload.len());
        assert_eq!(TransportHeader::from_bytes(&msg).unwrap(), header);
        assert_eq!(TransportHeader::payload(&msg), &payload[..]);
    }

    #[test]
    fn test_transport_too_short() {
        let msg = TransportHeader {
            receiver: 1,
            counter: 0,
        }
        .build_message(&[0u8; TAG_LEN - 1]);
        assert!(TransportHeader::from_bytes(&msg).is_err());
    }

    #[test]
    fn test_message_type() {
        assert_eq!(message_type(&[3, 0, 0, 0]).unwrap(), MessageType::CookieReply);
        assert!(message_type(&[99u8; 100]).is_err());
        assert!(message_type(&[1, 0]).is_err());
    }
}
