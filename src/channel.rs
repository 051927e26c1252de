//! channel.rs
//!
//! Per-channel state, replacing the reference firmware's
//! `msg_channel_t` (send buffer pointer/capacity, receive staging
//! buffer, FIFO, callback pointer, UART handles, escape flag, and
//! statistics counters, all defined in `msg_protocol.h`). Capacities
//! that the reference grows/shrinks with `realloc` are const generics
//! here, fixed when the owning [`Registry`](crate::registry::Registry)
//! is constructed.
//!
//! The send path is guarded by a `blocking_mutex`, the same
//! synchronous, critical-section-backed interior mutability the teacher
//! uses for cross-task static state, so `Registry::send` can take `&self`
//! and be called concurrently from more than one sender task while
//! `poll_once` keeps exclusive, `&mut self` access to the receive side.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use heapless::Vec;

use crate::callback::RecvCallback;
use crate::codec::{self, Decoder, FrameError};
use crate::error::Error;
use crate::fifo::RingFifo;
use crate::transport::Transport;
use crate::PayloadType;

/// Per-channel counters, mirroring the reference's `send_count`,
/// `recv_success`, `recv_error`, `crc_error`, `fifo_overflow` and
/// `max_element_len` fields.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, defmt::Format)]
pub struct Stats {
    pub send_count: u32,
    pub recv_success: u32,
    pub recv_error: u32,
    pub crc_error: u32,
    pub fifo_overflow: u32,
    pub max_element_len: u8,
}

/// Increments a counter only when the `statistics` feature is enabled,
/// mirroring the reference's `MSG_ENABLE_STATISTICS` guard (§10.3).
fn bump(counter: &mut u32) {
    if cfg!(feature = "statistics") {
        *counter += 1;
    }
}

struct SendSlot<'a, const SEND_CAP: usize> {
    transport: &'a mut dyn Transport,
    send_count: u32,
}

struct RecvSlot<'a, const STAGING_CAP: usize, const FIFO_CAP: usize> {
    transport: &'a mut dyn Transport,
    staging: [u8; STAGING_CAP],
    decoder: Decoder,
    fifo: RingFifo<FIFO_CAP>,
    recv_success: u32,
    recv_error: u32,
    crc_error: u32,
}

/// One channel's full state: send sink, receive source, callback and
/// counters. `None` in `send`/`recv` means that half of the channel is
/// not yet registered, matching the reference's lazily-allocated
/// `msg_channel_t*` slots.
pub struct ChannelInstance<'a, const SEND_CAP: usize, const STAGING_CAP: usize, const FIFO_CAP: usize>
{
    send: Mutex<CriticalSectionRawMutex, RefCell<Option<SendSlot<'a, SEND_CAP>>>>,
    recv: Option<RecvSlot<'a, STAGING_CAP, FIFO_CAP>>,
    callback: Option<&'a mut dyn RecvCallback>,
    crc_enabled: bool,
}

impl<'a, const SEND_CAP: usize, const STAGING_CAP: usize, const FIFO_CAP: usize>
    ChannelInstance<'a, SEND_CAP, STAGING_CAP, FIFO_CAP>
{
    pub fn new(crc_enabled: bool) -> Self {
        Self {
            send: Mutex::new(RefCell::new(None)),
            recv: None,
            callback: None,
            crc_enabled,
        }
    }

    /// Binds a transport for outbound frames on this channel. Idempotent:
    /// replaces any previously registered sink.
    pub fn set_send_sink(&self, transport: &'a mut dyn Transport) {
        self.send.lock(|cell| {
            *cell.borrow_mut() = Some(SendSlot {
                transport,
                send_count: 0,
            });
        });
    }

    /// Binds a transport and constructs the FIFO for inbound frames on
    /// this channel. `FIFO_CAP` must be a power of two.
    pub fn set_recv_source(&mut self, transport: &'a mut dyn Transport) -> Result<(), Error> {
        let fifo = RingFifo::<FIFO_CAP>::try_new()?;
        self.recv = Some(RecvSlot {
            transport,
            staging: [0u8; STAGING_CAP],
            decoder: Decoder::new(),
            fifo,
            recv_success: 0,
            recv_error: 0,
            crc_error: 0,
        });
        Ok(())
    }

    /// Replaces (or clears, with `None`) the delivery callback.
    pub fn set_callback(&mut self, callback: Option<&'a mut dyn RecvCallback>) {
        self.callback = callback;
    }

    pub fn has_recv_source(&self) -> bool {
        self.recv.is_some()
    }

    /// Encodes `payload` and pushes it to the registered transport.
    pub fn send(&self, cid: crate::ChannelId, ptt: PayloadType, payload: &[u8]) -> Result<(), Error> {
        let wire: Vec<u8, SEND_CAP> = codec::encode(cid, ptt, payload, self.crc_enabled)?;

        self.send.lock(|cell| {
            let mut slot = cell.borrow_mut();
            let slot = slot.as_mut().ok_or(Error::SendSinkNotRegistered)?;
            slot.transport
                .write(&wire)
                .map_err(|_| Error::SendSinkNotRegistered)?;
            bump(&mut slot.send_count);
            Ok(())
        })
    }

    /// Drains complete FIFO entries to the callback, then reads and
    /// decodes any newly available transport bytes. Returns
    /// `RecvSourceNotRegistered` if this channel has no receive source.
    ///
    /// Order is drain-then-read (§4.5): each cycle empties the FIFO as
    /// far as possible before admitting new bytes, bounding the maximum
    /// observed element count.
    pub fn poll_once(&mut self) -> Result<(), Error> {
        let recv = self
            .recv
            .as_mut()
            .ok_or(Error::RecvSourceNotRegistered)?;

        let mut scratch = [0u8; FIFO_CAP];
        loop {
            let entry_len = recv.fifo.peek_entry_len();
            if entry_len == 0 {
                break;
            }
            let entry = match recv.fifo.linearize(&mut scratch, entry_len) {
                Ok(entry) => entry,
                Err(_) => {
                    recv.fifo.pop(entry_len);
                    bump(&mut recv.recv_error);
                    continue;
                }
            };
            match codec::validate_and_extract(entry, self.crc_enabled) {
                Ok(delivered) => {
                    bump(&mut recv.recv_success);
                    if let Some(cb) = self.callback.as_deref_mut() {
                        cb.on_message(
                            delivered.payload.len() as u8,
                            delivered.id_type,
                            delivered.payload,
                        );
                    }
                }
                Err(FrameError::LengthMismatch) => {
                    bump(&mut recv.recv_error);
                    #[cfg(not(test))]
                    defmt::warn!("frame length mismatch, discarding entry");
                }
                Err(FrameError::CrcMismatch) => {
                    bump(&mut recv.crc_error);
                    #[cfg(not(test))]
                    defmt::warn!("frame crc mismatch, discarding entry");
                }
            }
            recv.fifo.pop(entry_len);
        }

        let n = recv
            .transport
            .read_available(&mut recv.staging)
            .unwrap_or(0);
        if n > 0 {
            let staging = &recv.staging[..n];
            recv.decoder.feed(staging, &mut recv.fifo);
        }
        Ok(())
    }

    pub fn stats(&self) -> Stats {
        let send_count = self.send.lock(|cell| {
            cell.borrow()
                .as_ref()
                .map(|s| s.send_count)
                .unwrap_or(0)
        });
        match &self.recv {
            Some(recv) => Stats {
                send_count,
                recv_success: recv.recv_success,
                recv_error: recv.recv_error,
                crc_error: recv.crc_error,
                fifo_overflow: recv.fifo.overflow_count(),
                max_element_len: recv.fifo.max_element_len(),
            },
            None => Stats {
                send_count,
                ..Default::default()
            },
        }
    }
}
