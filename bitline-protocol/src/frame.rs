//! Logical frame construction
//!
//! A frame is the unit exchanged over one channel: length byte, payload,
//! additive checksum. Electrical encoding is handled separately by
//! [`crate::encoder`].

use heapless::Vec;

use crate::checksum;

/// Maximum payload size in bytes
pub const MAX_PAYLOAD_SIZE: usize = 126;

/// Maximum complete frame size (LENGTH + MAX_PAYLOAD + CHECKSUM)
pub const MAX_FRAME_SIZE: usize = 1 + MAX_PAYLOAD_SIZE + 1;

/// Errors that can occur during frame construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Payload exceeds maximum allowed size
    PayloadTooLarge,
}

/// A frame ready for transmission
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Frame {
    payload: Vec<u8, MAX_PAYLOAD_SIZE>,
}

impl Frame {
    /// Create a frame around a payload
    pub fn new(payload: &[u8]) -> Result<Self, FrameError> {
        let mut payload_vec = Vec::new();
        payload_vec
            .extend_from_slice(payload)
            .map_err(|_| FrameError::PayloadTooLarge)?;

        Ok(Self {
            payload: payload_vec,
        })
    }

    /// The payload carried by this frame
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// The checksum that will terminate this frame on the wire
    pub fn checksum(&self) -> u8 {
        checksum::compute(&self.payload)
    }

    /// Encode the logical frame bytes: `[length, payload.., checksum]`
    pub fn encode(&self) -> Vec<u8, MAX_FRAME_SIZE> {
        let mut bytes = Vec::new();
        // Capacity is MAX_PAYLOAD_SIZE + 2, so these cannot fail
        let _ = bytes.push(self.payload.len() as u8);
        let _ = bytes.extend_from_slice(&self.payload);
        let _ = bytes.push(self.checksum());
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_payload_frame() {
        let frame = Frame::new(&[]).unwrap();
        assert_eq!(frame.encode().as_slice(), &[0, 0]);
    }

    #[test]
    fn test_hello_frame() {
        let frame = Frame::new(b"HELLO").unwrap();
        assert_eq!(
            frame.encode().as_slice(),
            &[5, 0x48, 0x45, 0x4C, 0x4C, 0x4F, 0xD4]
        );
    }

    #[test]
    fn test_max_payload_accepted() {
        let payload = [0xAB; MAX_PAYLOAD_SIZE];
        let frame = Frame::new(&payload).unwrap();
        let bytes = frame.encode();
        assert_eq!(bytes.len(), MAX_FRAME_SIZE);
        assert_eq!(bytes[0], MAX_PAYLOAD_SIZE as u8);
    }

    #[test]
    fn test_payload_too_large() {
        let payload = [0u8; MAX_PAYLOAD_SIZE + 1];
        assert_eq!(Frame::new(&payload), Err(FrameError::PayloadTooLarge));
    }
}
