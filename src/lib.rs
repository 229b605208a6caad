//! wireguard-oneshot - a single WireGuard round trip
//!
//! A client-only WireGuard implementation that does exactly one thing: perform
//! a Noise IKpsk2 handshake with a peer, tunnel one UDP datagram to a
//! destination behind it, and return the one reply.
//!
//! # Features
//!
//! - Noise_IKpsk2_25519_ChaChaPoly_BLAKE2s initiator handshake
//! - Synthetic IPv4/UDP encapsulation with correct checksums
//! - Bounded waits with a distinct, retryable timeout error
//! - Secret key material wiped on success and on failure
//!
//! # Usage
//!
//! ```no_run
//! use wireguard_oneshot::{run_session, Configuration};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Configuration::from_file("wg0.conf")?;
//!     let reply = run_session(&config, b"ping", "10.0.0.1", 7).await?;
//!     println!("{}", String::from_utf8_lossy(&reply));
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod crypto;
pub mod error;
pub mod protocol;
pub mod session;

pub use config::{Configuration, ResolvedConfig, SessionOptions};
pub use error::OneshotError;
pub use protocol::KeyPair;
pub use session::{run_session, run_session_with};
