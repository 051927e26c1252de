//! error.rs
//!
//! Typed replacement for the reference firmware's flat `msg_status_t`
//! (`MSG_OK`, `MSG_ERROR`, `MSG_MEM_FAIL`, `MSG_BUF_OVERFLOW`, ...): every
//! fallible registration/send entry point returns one of these instead of
//! silently doing nothing.

use core::fmt;

/// Failure returned by a registration or send call.
///
/// The streaming receive path (decode + dequeue) does not use this type —
/// per-byte or per-frame failures there are folded into the channel's
/// [`Stats`](crate::channel::Stats) counters instead, matching the
/// reference firmware's behavior of never propagating an error out of
/// `message_polling_data`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, defmt::Format)]
pub enum Error {
    /// Channel id is outside `[0, N)` for this registry.
    ChannelIdOutOfRange,
    /// A ring FIFO capacity was requested that is not a power of two.
    FifoSizeNotPowerOfTwo,
    /// `send` was called before `register_send` for this channel.
    SendSinkNotRegistered,
    /// `poll_once` found a channel with no registered receive source.
    RecvSourceNotRegistered,
    /// Payload (plus framing overhead) does not fit the channel's
    /// fixed-capacity send buffer, or exceeds the wire length limit.
    PayloadTooLarge,
    /// `send` was called with a zero-length payload.
    EmptyPayload,
    /// A linearized FIFO entry does not fit the caller-provided scratch
    /// buffer.
    BufferTooSmall,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::ChannelIdOutOfRange => "channel id out of range",
            Error::FifoSizeNotPowerOfTwo => "fifo capacity is not a power of two",
            Error::SendSinkNotRegistered => "send sink not registered",
            Error::RecvSourceNotRegistered => "recv source not registered",
            Error::PayloadTooLarge => "payload too large for send buffer",
            Error::EmptyPayload => "payload is empty",
            Error::BufferTooSmall => "scratch buffer too small for entry",
        };
        f.write_str(msg)
    }
}

impl core::error::Error for Error {}
