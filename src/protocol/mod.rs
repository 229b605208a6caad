//! WireGuard protocol implementation
//!
//! This module contains the core protocol components:
//! - Message wire formats
//! - MAC1/MAC2 generation
//! - Handshake logic (Noise IKpsk2, initiator only)
//! - Synthetic IPv4/UDP packets
//! - Transport encryption for one exchange

pub mod cookie;
pub mod handshake;
pub mod messages;
pub mod packet;
pub mod timestamp;
pub mod transport;

pub use cookie::CookieGenerator;
pub use handshake::{HandshakePhase, InitiatorHandshake};
pub use messages::{MessageInitiation, MessageResponse, MessageType, TransportHeader};
pub use transport::{KeyPair, TransportCipher};
