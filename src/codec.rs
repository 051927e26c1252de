//! codec.rs
//!
//! Frame codec: stateless `encode` (payload -> wire bytes) and the
//! streaming, stateful `Decoder` (wire bytes -> ring FIFO entries) plus
//! `validate_and_extract`, which turns one dequeued FIFO entry into a
//! verified `(id_type, payload)` pair.
//!
//! Grounded on `message_send_data` and `message_data_enqueue` in the
//! reference firmware's `msg_protocol.c`, generalized from its
//! `(cid << 4) | ptt`, length-byte, CRC-nibble, EOF layout. The stream
//! parser shape (push bytes, rescan for a terminator, escape-aware)
//! mirrors `Parser`/`build_frame` in this crate's own `protocol.rs`.

use heapless::Vec;

use crate::error::Error;
use crate::fifo::RingFifo;
use crate::{ChannelId, PayloadType};

/// Frame terminator. Chosen, like the reference firmware's `MSG_EOF`,
/// above the length field's useful range so a stray length byte can never
/// be confused with it.
pub const EOF: u8 = 0x7F;
/// Escape byte. Any payload byte equal to [`EOF`] or [`ESC`] is preceded
/// by one literal `ESC` byte on the wire.
pub const ESC: u8 = 0x8F;

/// Largest payload length accepted by [`encode`]. Capped at `0x7E` so the
/// length byte itself never collides with [`EOF`] (`0x7F`), per the wire
/// format's external interface contract.
pub const MAX_PAYLOAD_LEN: usize = 0x7E;

/// Bytes of framing overhead around the payload when CRC is disabled:
/// entry-len prefix, id-type header, length byte, EOF.
const OVERHEAD_NO_CRC: u8 = 4;
/// As above, plus two CRC nibbles.
const OVERHEAD_CRC: u8 = 6;

/// CRC-8/MAXIM (poly 0x31 reflected to 0x8C, init 0x00), computed the same
/// bit-reflected, LSB-first way this module's sibling `protocol.rs`
/// computes CRC-16/Modbus. The specific polynomial is not part of the
/// wire contract (the CRC primitive is an external collaborator per the
/// spec) — callers only rely on `crc8` being a deterministic function of
/// its input.
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc: u8 = 0x00;
    for &b in data {
        crc ^= b;
        for _ in 0..8 {
            if crc & 0x01 != 0 {
                crc = (crc >> 1) ^ 0x8C;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// Encodes one payload into wire bytes, writing into a fixed-capacity
/// `heapless::Vec`. Fails with [`Error::EmptyPayload`]/[`Error::PayloadTooLarge`]
/// on invalid inputs, or if the escaped-and-CRC'd frame does not fit `CAP`.
pub fn encode<const CAP: usize>(
    cid: ChannelId,
    ptt: PayloadType,
    payload: &[u8],
    crc_enabled: bool,
) -> Result<Vec<u8, CAP>, Error> {
    if payload.is_empty() {
        return Err(Error::EmptyPayload);
    }
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(Error::PayloadTooLarge);
    }

    let mut out = Vec::<u8, CAP>::new();
    let too_large = |_| Error::PayloadTooLarge;

    out.push((cid.get() << 4) | ptt.nibble()).map_err(too_large)?;
    out.push(payload.len() as u8).map_err(too_large)?;

    for &b in payload {
        if b == ESC || b == EOF {
            out.push(ESC).map_err(too_large)?;
        }
        out.push(b).map_err(too_large)?;
    }

    if crc_enabled {
        let crc = crc8(payload);
        out.push((crc >> 4) & 0x0F).map_err(too_large)?;
        out.push(crc & 0x0F).map_err(too_large)?;
    }

    out.push(EOF).map_err(too_large)?;
    Ok(out)
}

/// Streaming decoder state. Owns only the one-bit escape parity; the
/// assembled bytes live in the caller's [`RingFifo`].
///
/// State machine: `Normal --ESC--> AfterEscape` (no emit), `Normal
/// --other--> Normal` (emit, terminate on EOF), `AfterEscape --any-->
/// Normal` (emit literal, never terminate). `escape` is `false` at every
/// frame boundary by construction.
#[derive(Default)]
pub struct Decoder {
    escape: bool,
}

impl Decoder {
    pub const fn new() -> Self {
        Self { escape: false }
    }

    /// True between frames (not mid-escape-sequence).
    pub fn at_frame_boundary(&self) -> bool {
        !self.escape
    }

    /// Feeds one raw wire byte, appending it (or consuming it as an escape
    /// marker) into `fifo`.
    pub fn feed_byte<const SIZE: usize>(&mut self, b: u8, fifo: &mut RingFifo<SIZE>) {
        if !self.escape && b == ESC {
            self.escape = true;
            return;
        }
        let was_escaped = self.escape;
        self.escape = false;
        let is_eof = !was_escaped && b == EOF;
        fifo.write_byte(b, is_eof);
    }

    /// Feeds a chunk of raw wire bytes, in order. Safe to call with
    /// arbitrarily-sized chunks — a frame torn across two chunks decodes
    /// identically to one fed as a single chunk.
    pub fn feed<const SIZE: usize>(&mut self, bytes: &[u8], fifo: &mut RingFifo<SIZE>) {
        for &b in bytes {
            self.feed_byte(b, fifo);
        }
    }
}

/// One validated, dequeued frame: the raw `(cid << 4) | ptt` header byte
/// and a reference to its unescaped payload.
pub struct Delivered<'a> {
    pub id_type: u8,
    pub payload: &'a [u8],
}

/// Why a dequeued entry failed validation. Kept distinct from
/// [`Error`](crate::error::Error) because the receive path folds these
/// into the channel's `recv_error`/`crc_error` counters rather than
/// surfacing a `Result` to the caller (§7 of the error taxonomy).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FrameError {
    /// The length byte does not match the number of bytes actually
    /// received before EOF (includes entries too short to hold a header).
    LengthMismatch,
    /// The two transmitted CRC nibbles do not match `crc8(payload)`.
    CrcMismatch,
}

/// Validates one linearized FIFO entry (`[entry_len, id_type, length,
/// payload..., crc_hi, crc_lo, EOF]` with the CRC nibbles present only
/// when `crc_enabled`) and returns the `(id_type, payload)` pair on
/// success.
///
/// Mirrors the length-byte and CRC checks in `message_data_dequeue`.
pub fn validate_and_extract(
    entry: &[u8],
    crc_enabled: bool,
) -> Result<Delivered<'_>, FrameError> {
    let overhead = if crc_enabled { OVERHEAD_CRC } else { OVERHEAD_NO_CRC };
    if entry.len() < overhead as usize {
        return Err(FrameError::LengthMismatch);
    }

    let entry_len = entry.len() as u8;
    let expected_payload_len = entry_len.saturating_sub(overhead);
    let length_byte = entry[2];
    if length_byte != expected_payload_len {
        return Err(FrameError::LengthMismatch);
    }

    let payload_start = 3;
    let payload_end = payload_start + expected_payload_len as usize;
    let payload = &entry[payload_start..payload_end];

    if crc_enabled {
        let hi = entry[payload_end];
        let lo = entry[payload_end + 1];
        let received = (hi << 4) | lo;
        if crc8(payload) != received {
            return Err(FrameError::CrcMismatch);
        }
    }

    Ok(Delivered {
        id_type: entry[1],
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChannelId;

    fn cid(n: u8) -> ChannelId {
        ChannelId::new(n).unwrap()
    }

    #[test]
    fn encode_single_frame_no_escape_no_crc() {
        let wire = encode::<32>(cid(1), PayloadType::UINT8, &[0x01, 0x02, 0x03], false).unwrap();
        assert_eq!(&wire[..], &[0x10, 0x03, 0x01, 0x02, 0x03, EOF]);
    }

    #[test]
    fn encode_stuffs_esc_and_eof_bytes() {
        let wire = encode::<32>(cid(2), PayloadType::UINT8, &[0x7F, 0x8F], false).unwrap();
        assert_eq!(&wire[..], &[0x20, 0x02, ESC, 0x7F, ESC, 0x8F, EOF]);
    }

    #[test]
    fn encode_with_crc_appends_two_nibbles() {
        let payload = [0xAAu8];
        let crc = crc8(&payload);
        let wire = encode::<32>(cid(0), PayloadType::UINT8, &payload, true).unwrap();
        assert_eq!(
            &wire[..],
            &[0x00, 0x01, 0xAA, (crc >> 4) & 0x0F, crc & 0x0F, EOF]
        );
    }

    #[test]
    fn encode_rejects_empty_payload() {
        assert_eq!(
            encode::<32>(cid(0), PayloadType::UINT8, &[], false).unwrap_err(),
            Error::EmptyPayload
        );
    }

    #[test]
    fn stuffing_law_no_unescaped_sentinel_before_terminator() {
        let payload = [0x00, ESC, 0x10, EOF, 0xFF];
        let wire = encode::<64>(cid(5), PayloadType::UINT8, &payload, false).unwrap();
        // Every ESC/EOF byte before the final terminator is itself preceded
        // by an ESC.
        for i in 0..wire.len() - 1 {
            if wire[i] == ESC || wire[i] == EOF {
                // ESC at this position must be the escape marker, i.e. the
                // byte following any ESC at `i-1` is allowed to be raw.
                if i == 0 || wire[i - 1] != ESC {
                    panic!("unescaped sentinel at {i} in {wire:?}");
                }
            }
        }
        assert_eq!(*wire.last().unwrap(), EOF);
    }

    fn decode_one(wire: &[u8]) -> (u8, heapless::Vec<u8, 64>) {
        let mut fifo = RingFifo::<64>::try_new().unwrap();
        let mut decoder = Decoder::new();
        decoder.feed(wire, &mut fifo);
        let entry_len = fifo.peek_entry_len();
        assert!(entry_len > 0, "frame did not complete");
        let mut scratch = [0u8; 64];
        let entry = fifo.linearize(&mut scratch, entry_len).unwrap();
        let delivered = validate_and_extract(entry, false).unwrap();
        let mut payload = heapless::Vec::<u8, 64>::new();
        payload.extend_from_slice(delivered.payload).unwrap();
        (delivered.id_type, payload)
    }

    #[test]
    fn round_trip_law() {
        for cid_n in 0..16u8 {
            for ptt_n in 0..16u8 {
                let payload = [cid_n, ptt_n, 0x00, 0xFF, 0x7F, 0x8F];
                let wire = encode::<64>(
                    ChannelId::new(cid_n).unwrap(),
                    PayloadType::new(ptt_n),
                    &payload,
                    false,
                )
                .unwrap();
                let (id_type, decoded) = decode_one(&wire);
                assert_eq!(id_type, (cid_n << 4) | ptt_n);
                assert_eq!(&decoded[..], &payload[..]);
            }
        }
    }

    #[test]
    fn torn_read_decodes_identically_to_single_read() {
        let mut fifo_single = RingFifo::<64>::try_new().unwrap();
        let mut dec_single = Decoder::new();
        let wire = [0x10u8, 0x03, 0x01, 0x02, 0x03, EOF];
        dec_single.feed(&wire, &mut fifo_single);

        let mut fifo_torn = RingFifo::<64>::try_new().unwrap();
        let mut dec_torn = Decoder::new();
        dec_torn.feed(&wire[..4], &mut fifo_torn);
        dec_torn.feed(&wire[4..], &mut fifo_torn);

        let len_single = fifo_single.peek_entry_len();
        let len_torn = fifo_torn.peek_entry_len();
        assert_eq!(len_single, len_torn);

        let mut a = [0u8; 64];
        let mut b = [0u8; 64];
        assert_eq!(
            fifo_single.linearize(&mut a, len_single).unwrap(),
            fifo_torn.linearize(&mut b, len_torn).unwrap()
        );
    }

    #[test]
    fn decoder_escape_state_clears_at_frame_boundary() {
        let mut fifo = RingFifo::<64>::try_new().unwrap();
        let mut decoder = Decoder::new();
        let wire = encode::<64>(cid(2), PayloadType::UINT8, &[0x7F, 0x8F], false).unwrap();
        decoder.feed(&wire, &mut fifo);
        assert!(decoder.at_frame_boundary());
    }

    #[test]
    fn length_field_forgery_is_rejected_by_validate() {
        // Claims len=5 but only 2 payload bytes actually arrived before EOF.
        let entry = [5u8, 0x10, 0x05, 0x01, 0x02]; // entry_len, id_type, len, data...
        assert_eq!(
            validate_and_extract(&entry, false).unwrap_err(),
            FrameError::LengthMismatch
        );
    }

    #[test]
    fn crc_mismatch_is_rejected_by_validate() {
        // [placeholder, header, length, payload byte, crc_hi, crc_lo, EOF]
        let wrong_crc_hi = 0x0;
        let wrong_crc_lo = 0x1;
        let entry = [7u8, 0x00, 0x01, 0xAA, wrong_crc_hi, wrong_crc_lo, EOF];
        assert_eq!(
            validate_and_extract(&entry, true).unwrap_err(),
            FrameError::CrcMismatch
        );
    }
}
