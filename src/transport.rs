//! transport.rs
//!
//! The synchronous byte-transport seam, replacing the reference
//! firmware's `msg_transport_t` (a struct of raw `send`/`recv`
//! function pointers bound per channel in `message_register_send`).
//! Kept synchronous rather than `async` to match the original's
//! non-blocking, call-and-return semantics exactly: the registry's own
//! `poll_once` is what gets driven from an embassy task loop, not the
//! transport itself.

/// One attempted transport operation failed.
#[derive(Copy, Clone, Debug, Eq, PartialEq, defmt::Format)]
pub struct TransportError;

impl core::fmt::Display for TransportError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("transport error")
    }
}

impl core::error::Error for TransportError {}

/// A byte-oriented sink/source bound to one channel, e.g. a blocking
/// UART, a USB CDC-ACM endpoint, or (in tests) an in-memory loopback.
pub trait Transport {
    /// Writes `data` out, blocking until accepted by the underlying sink.
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Copies as many already-available bytes as fit into `buf` without
    /// blocking, returning how many were copied. Returning `0` means no
    /// bytes are currently available, not end-of-stream.
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;
}

/// A fixed-capacity in-memory transport used by tests and by the
/// loopback demo binary: bytes written are immediately available to be
/// read back.
pub struct LoopbackTransport<const CAP: usize> {
    buf: heapless::Deque<u8, CAP>,
}

impl<const CAP: usize> LoopbackTransport<CAP> {
    pub fn new() -> Self {
        Self {
            buf: heapless::Deque::new(),
        }
    }
}

impl<const CAP: usize> Default for LoopbackTransport<CAP> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CAP: usize> Transport for LoopbackTransport<CAP> {
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        for &b in data {
            self.buf.push_back(b).map_err(|_| TransportError)?;
        }
        Ok(())
    }

    fn read_available(&mut self, out: &mut [u8]) -> Result<usize, TransportError> {
        let mut n = 0;
        while n < out.len() {
            match self.buf.pop_front() {
                Some(b) => {
                    out[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }
}
