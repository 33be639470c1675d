//! Additive frame checksum
//!
//! Single-byte sum of the payload modulo 256. The transmit and receive paths
//! must call these same functions; the checksum never covers the length byte.
//!
//! Known blind spot of an additive sum: it is order-independent, so payloads
//! that are byte permutations of each other share a checksum. Single-bit
//! flips in the payload are always detected, since flipping bit k changes the
//! sum by ±2^k modulo 256, which is never zero for k < 8.

/// Compute the checksum of a payload
pub fn compute(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |sum, &byte| sum.wrapping_add(byte))
}

/// Check a claimed checksum against the payload
pub fn verify(payload: &[u8], claimed: u8) -> bool {
    compute(payload) == claimed
}
