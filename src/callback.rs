//! callback.rs
//!
//! Receive-side delivery callback, replacing the reference firmware's
//! `msg_recv_callback_t` function-pointer-plus-void-context pair
//! (`message_register_recv_callback` in `msg_protocol.c`) with a trait
//! object, following the teacher's preference for trait-based hardware
//! abstraction (e.g. its `embedded_hal::i2c::I2c` bounds) over raw
//! function pointers.

/// Receives one delivered message for a channel.
///
/// `id_type` is the raw `(cid << 4) | ptt` header byte; `payload` borrows
/// directly from the channel's FIFO linearization scratch buffer and is
/// only valid for the duration of the call.
pub trait RecvCallback {
    fn on_message(&mut self, len: u8, id_type: u8, payload: &[u8]);
}

impl<F> RecvCallback for F
where
    F: FnMut(u8, u8, &[u8]),
{
    fn on_message(&mut self, len: u8, id_type: u8, payload: &[u8]) {
        self(len, id_type, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closure_implements_recv_callback() {
        let mut seen = heapless::Vec::<(u8, u8, u8), 4>::new();
        let mut cb = |len: u8, id_type: u8, payload: &[u8]| {
            let _ = seen.push((len, id_type, payload.first().copied().unwrap_or(0)));
        };
        cb.on_message(3, 0x12, &[0xAA, 0xBB, 0xCC]);
        assert_eq!(seen[0], (3, 0x12, 0xAA));
    }
}
