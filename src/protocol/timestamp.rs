//! TAI64N timestamps for handshake initiations
//!
//! The responder uses the timestamp to reject replayed initiations. The low
//! 24 bits of the nanosecond field are cleared so the value cannot be used to
//! fingerprint the sender's clock.

use std::time::SystemTime;

use tai64::Tai64N;

/// Encoded TAI64N length: 8 bytes seconds + 4 bytes nanoseconds, big-endian
pub const TIMESTAMP_LEN: usize = 12;

/// Nanosecond bits dropped before encoding
const WHITENER_MASK: u32 = 0x0100_0000 - 1;

/// Encode `time` as a whitened TAI64N label
pub fn stamp(time: SystemTime) -> [u8; TIMESTAMP_LEN] {
    let tai = Tai64N::from_system_time(&time);
    Tai64N(tai.0, tai.1 & !WHITENER_MASK).to_bytes()
}

/// Encode the current time
pub fn now() -> [u8; TIMESTAMP_LEN] {
    stamp(SystemTime::now())
}
