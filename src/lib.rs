//! Multi-channel framed message protocol core: a send-path framer and a
//! receive-path parser/ring-buffer/dispatch engine for unreliable
//! byte-oriented serial links.
//!
//! Ported from the reference firmware's `msg_protocol.c`/`.h`
//! (`message_send_data`, `message_data_enqueue`, `message_polling_data`),
//! restructured around `heapless` fixed-capacity buffers and a typed
//! [`Error`] in place of `malloc`/`realloc` and the flat `msg_status_t`.
//! The UART/DMA driver, CRC primitive, board bring-up, and demo tasks are
//! external collaborators and live outside this crate's core modules.

#![cfg_attr(not(test), no_std)]

pub mod callback;
pub mod channel;
pub mod codec;
pub mod error;
pub mod fifo;
pub mod registry;
pub mod transport;

pub use callback::RecvCallback;
pub use channel::{ChannelInstance, Stats};
pub use codec::{EOF, ESC, MAX_PAYLOAD_LEN};
pub use error::Error;
pub use registry::Registry;
pub use transport::{LoopbackTransport, Transport, TransportError};

/// Channel identifier. Occupies the high nibble of the wire header byte,
/// so only `0..=15` is valid (`RESERVE_LEN` in the reference headers).
#[derive(Copy, Clone, Debug, Eq, PartialEq, defmt::Format)]
pub struct ChannelId(u8);

impl ChannelId {
    /// Largest valid channel id, inclusive: the CID nibble is 4 bits wide.
    pub const MAX: u8 = 15;

    pub fn new(id: u8) -> Result<Self, Error> {
        if id > Self::MAX {
            Err(Error::ChannelIdOutOfRange)
        } else {
            Ok(Self(id))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

/// Payload-type tag: a 4-bit value carried as-is in the low nibble of the
/// wire header byte. The core never interprets it, so this is a newtype
/// around the raw nibble rather than a closed enum — an unrecognized
/// value received over the wire still round-trips to the callback
/// instead of being rejected.
#[derive(Copy, Clone, Debug, Eq, PartialEq, defmt::Format)]
pub struct PayloadType(u8);

impl PayloadType {
    pub const UINT8: PayloadType = PayloadType(0x0);
    pub const INT8: PayloadType = PayloadType(0x1);
    pub const UINT16: PayloadType = PayloadType(0x2);
    pub const INT16: PayloadType = PayloadType(0x3);
    pub const UINT32: PayloadType = PayloadType(0x4);
    pub const INT32: PayloadType = PayloadType(0x5);
    pub const UINT64: PayloadType = PayloadType(0x6);
    pub const INT64: PayloadType = PayloadType(0x7);
    pub const FLOAT32: PayloadType = PayloadType(0x8);
    pub const FLOAT64: PayloadType = PayloadType(0x9);
    pub const STRING: PayloadType = PayloadType(0xA);
    pub const CUSTOM: PayloadType = PayloadType(0xF);

    /// Constructs a tag from a raw nibble, masking off any bits above bit 3.
    pub fn new(raw: u8) -> Self {
        Self(raw & 0x0F)
    }

    pub fn nibble(self) -> u8 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_id_rejects_out_of_range() {
        assert!(ChannelId::new(15).is_ok());
        assert_eq!(
            ChannelId::new(16).unwrap_err(),
            Error::ChannelIdOutOfRange
        );
    }

    #[test]
    fn payload_type_masks_to_low_nibble() {
        assert_eq!(PayloadType::new(0xFF).nibble(), 0x0F);
        assert_eq!(PayloadType::new(0x03).nibble(), 0x03);
    }
}
