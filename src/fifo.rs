//! fifo.rs
//!
//! Power-of-two masked ring FIFO storing length-prefixed frames.
//!
//! Grounded on the reference firmware's `msg_fifo_t` / `message_data_enqueue`
//! (`msg_protocol.c`): `head`/`tail` are monotonically increasing counters
//! masked only on access, a placeholder length byte is reserved at the start
//! of each entry and back-patched once the terminating EOF is observed, and
//! a full ring with no complete entry resets rather than blocks. The
//! borrowed-vs-owned backing tradeoff follows `circq::CircQ`'s shape, but
//! here the backing is an owned const-generic array so a `ChannelInstance`
//! can hold its FIFO without a self-referential borrow.

use crate::error::Error;

/// A masked ring buffer of `SIZE` bytes (`SIZE` must be a power of two)
/// holding zero or more complete frame entries plus at most one
/// in-progress entry.
pub struct RingFifo<const SIZE: usize> {
    buf: [u8; SIZE],
    head: u32,
    tail: u32,
    frame_len_accum: u8,
    new_frame: bool,
    element_count: u32,
    max_element_len: u8,
    overflow_count: u32,
}

impl<const SIZE: usize> RingFifo<SIZE> {
    const MASK: u32 = (SIZE.saturating_sub(1)) as u32;

    /// Constructs an empty FIFO. Fails if `SIZE` is not a power of two.
    pub fn try_new() -> Result<Self, Error> {
        if !SIZE.is_power_of_two() {
            return Err(Error::FifoSizeNotPowerOfTwo);
        }
        Ok(Self {
            buf: [0; SIZE],
            head: 0,
            tail: 0,
            frame_len_accum: 0,
            new_frame: true,
            element_count: 0,
            max_element_len: 0,
            overflow_count: 0,
        })
    }

    /// Number of complete entries currently queued.
    pub fn element_count(&self) -> u32 {
        self.element_count
    }

    /// Number of times this FIFO has been reset due to overflow.
    pub fn overflow_count(&self) -> u32 {
        self.overflow_count
    }

    /// Largest `entry_len` seen so far.
    pub fn max_element_len(&self) -> u8 {
        self.max_element_len
    }

    /// `tail - head`, wrap-safe. Invariant: always `<= SIZE`.
    fn occupied(&self) -> u32 {
        self.tail.wrapping_sub(self.head)
    }

    #[cfg(test)]
    pub(crate) fn head(&self) -> u32 {
        self.head
    }

    #[cfg(test)]
    pub(crate) fn tail(&self) -> u32 {
        self.tail
    }

    /// Writes one already-unescaped wire byte into the ring, advancing the
    /// in-progress entry. `is_eof` must be true exactly when `b` is an
    /// unescaped EOF sentinel that terminates the frame.
    ///
    /// Mirrors the body of `message_data_enqueue`'s per-byte loop.
    pub fn write_byte(&mut self, b: u8, is_eof: bool) {
        if self.new_frame {
            self.buf[(self.tail & Self::MASK) as usize] = 0;
            self.tail = self.tail.wrapping_add(1);
            self.new_frame = false;
        }

        self.buf[(self.tail & Self::MASK) as usize] = b;
        self.tail = self.tail.wrapping_add(1);
        self.frame_len_accum = self.frame_len_accum.saturating_add(1);

        if !is_eof && self.occupied() == SIZE as u32 {
            self.reset_on_overflow();
            return;
        }

        if is_eof {
            let len_slot =
                (self.tail.wrapping_sub(self.frame_len_accum as u32).wrapping_sub(1)) & Self::MASK;
            let entry_len = self.frame_len_accum.saturating_add(1);
            self.buf[len_slot as usize] = entry_len;
            self.frame_len_accum = 0;
            self.new_frame = true;
            self.element_count += 1;
            if entry_len > self.max_element_len {
                self.max_element_len = entry_len;
            }
        }
    }

    fn reset_on_overflow(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.element_count = 0;
        self.frame_len_accum = 0;
        self.new_frame = true;
        self.overflow_count += 1;
        #[cfg(not(test))]
        defmt::warn!(
            "fifo overflow, resetting (size={}, overflow_count={})",
            SIZE,
            self.overflow_count
        );
    }

    /// Returns the `entry_len` stored at `head`, or 0 if the head entry is
    /// still being written (or the FIFO is empty).
    pub fn peek_entry_len(&self) -> u8 {
        if self.head == self.tail {
            return 0;
        }
        self.buf[(self.head & Self::MASK) as usize]
    }

    /// Advances `head` past one entry of `entry_len` slots.
    pub fn pop(&mut self, entry_len: u8) {
        self.head = self.head.wrapping_add(entry_len as u32);
        self.element_count = self.element_count.saturating_sub(1);
    }

    /// Copies the `entry_len` bytes starting at `head` into `out`,
    /// stitching together the two segments if the entry wraps past the
    /// end of the backing array.
    pub fn linearize<'o>(&self, out: &'o mut [u8], entry_len: u8) -> Result<&'o [u8], Error> {
        let entry_len = entry_len as usize;
        if out.len() < entry_len {
            return Err(Error::BufferTooSmall);
        }

        let head = (self.head & Self::MASK) as usize;
        let end = head + entry_len;
        if end <= SIZE {
            out[..entry_len].copy_from_slice(&self.buf[head..end]);
        } else {
            let first_len = SIZE - head;
            out[..first_len].copy_from_slice(&self.buf[head..]);
            out[first_len..entry_len].copy_from_slice(&self.buf[..entry_len - first_len]);
        }
        Ok(&out[..entry_len])
    }
}
