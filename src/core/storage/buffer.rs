use std::ops::{
    Deref,
    DerefMut,
};

use crate::{
    Error,
    Result,
};

/// Fixed capacity byte buffer with a movable window.
///
/// Headers are prepended and stripped by moving the start of the window, and
/// frames are padded by growing its tail, so a payload is never copied while
/// it travels up or down the stack.
///
/// ```text
/// |<-- headroom -->|<------ window ------>|<-- tailroom -->|
/// 0              start              start + len        capacity
/// ```
#[derive(Clone, Debug, Default)]
pub struct PacketBuffer {
    buffer: Vec<u8>,
    start: usize,
    len: usize,
}

impl PacketBuffer {
    /// Room reserved in front of a freshly initialized window, enough for an
    /// Ethernet, IPv4 (with options) and ICMP header.
    pub const HEADROOM: usize = 96;

    /// Capacity large enough for any frame plus headroom.
    pub const DEFAULT_CAPACITY: usize = 2048;

    /// Creates a buffer with an empty window.
    pub fn new(capacity: usize) -> PacketBuffer {
        PacketBuffer {
            buffer: vec![0; capacity],
            start: Self::HEADROOM.min(capacity),
            len: 0,
        }
    }

    /// Creates a buffer whose window holds a copy of payload.
    pub fn from_payload(payload: &[u8]) -> Result<PacketBuffer> {
        let capacity = Self::DEFAULT_CAPACITY.max(Self::HEADROOM + payload.len());
        let mut buffer = PacketBuffer::new(capacity);
        buffer.init(payload.len())?;
        buffer.copy_from_slice(payload);
        Ok(buffer)
    }

    /// Resets the window to buffer_len zeroed bytes, keeping as much headroom
    /// as the capacity allows.
    pub fn init(&mut self, buffer_len: usize) -> Result<()> {
        if buffer_len > self.buffer.len() {
            return Err(Error::Exhausted);
        }

        self.start = Self::HEADROOM.min(self.buffer.len() - buffer_len);
        self.len = buffer_len;

        for byte in self.buffer[self.start .. self.start + self.len].iter_mut() {
            *byte = 0;
        }

        Ok(())
    }

    /// Grows the window by header_len bytes at the front. The new bytes are
    /// left for the caller to fill in.
    pub fn add_header(&mut self, header_len: usize) -> Result<()> {
        if header_len > self.start {
            return Err(Error::Exhausted);
        }

        self.start -= header_len;
        self.len += header_len;
        Ok(())
    }

    /// Shrinks the window by header_len bytes at the front.
    pub fn remove_header(&mut self, header_len: usize) -> Result<()> {
        if header_len > self.len {
            return Err(Error::Exhausted);
        }

        self.start += header_len;
        self.len -= header_len;
        Ok(())
    }

    /// Grows the window by padding_len zero bytes at the tail.
    pub fn add_padding(&mut self, padding_len: usize) -> Result<()> {
        let end = self.start + self.len;

        if padding_len > self.buffer.len() - end {
            return Err(Error::Exhausted);
        }

        for byte in self.buffer[end .. end + padding_len].iter_mut() {
            *byte = 0;
        }

        self.len += padding_len;
        Ok(())
    }

    /// Shrinks the window by padding_len bytes at the tail.
    pub fn remove_padding(&mut self, padding_len: usize) -> Result<()> {
        if padding_len > self.len {
            return Err(Error::Exhausted);
        }

        self.len -= padding_len;
        Ok(())
    }

    /// Lets f write a frame behind the headroom and points the window at the
    /// bytes f reports as written. Used on the receive path.
    pub fn fill_with<F, E>(&mut self, f: F) -> std::result::Result<usize, E>
    where
        F: FnOnce(&mut [u8]) -> std::result::Result<usize, E>,
    {
        let headroom = Self::HEADROOM.min(self.buffer.len());
        let frame_len = f(&mut self.buffer[headroom ..])?;
        self.start = headroom;
        self.len = frame_len.min(self.buffer.len() - headroom);
        Ok(self.len)
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Bytes available in front of the window.
    pub fn headroom(&self) -> usize {
        self.start
    }

    /// Bytes available behind the window.
    pub fn tailroom(&self) -> usize {
        self.buffer.len() - self.start - self.len
    }
}

impl Deref for PacketBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.buffer[self.start .. self.start + self.len]
    }
}

impl DerefMut for PacketBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.buffer[self.start .. self.start + self.len]
    }
}
