use std::cell::{
    Cell,
    RefCell,
};
use std::collections::VecDeque;
use std::rc::Rc;

#[derive(Debug)]
pub enum Error {
    /// Indicates the device can not accept a frame right now.
    Busy,
    /// Indicates an error where a buffer was not large enough.
    Overflow,
    /// Indicates a situation with no frame ready to be received.
    Nothing,
    /// Indicates a generic IO error.
    IO(std::io::Error),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IO(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// A frame driver for sending and receiving raw Ethernet frames.
pub trait Device {
    /// Sends a frame across the link.
    fn send(&mut self, buffer: &[u8]) -> Result<()>;

    /// Reads a frame into the buffer and returns the size of the frame.
    ///
    /// Must not block; returns Error::Nothing when no frame is ready. You
    /// should ensure the buffer can hold a frame carrying an MTU sized
    /// payload.
    fn recv(&mut self, buffer: &mut [u8]) -> Result<usize>;

    /// Returns the [MTU](https://en.wikipedia.org/wiki/Maximum_transmission_unit)
    /// of the device.
    fn max_transmission_unit(&self) -> usize;
}

/// A Device backed by in memory queues.
///
/// Clones share the same queues, so a handle kept outside of an interface can
/// inject received frames and inspect sent ones.
#[derive(Clone, Debug)]
pub struct MemoryDevice {
    rx: Rc<RefCell<VecDeque<Vec<u8>>>>,
    tx: Rc<RefCell<VecDeque<Vec<u8>>>>,
    fail_send: Rc<Cell<bool>>,
    max_transmission_unit: usize,
}

impl MemoryDevice {
    pub fn new(max_transmission_unit: usize) -> MemoryDevice {
        MemoryDevice {
            rx: Rc::new(RefCell::new(VecDeque::new())),
            tx: Rc::new(RefCell::new(VecDeque::new())),
            fail_send: Rc::new(Cell::new(false)),
            max_transmission_unit,
        }
    }

    /// Queues a frame to be returned by recv(...).
    pub fn inject(&self, frame: &[u8]) {
        self.rx.borrow_mut().push_back(frame.to_vec());
    }

    /// Removes and returns the oldest sent frame.
    pub fn take_sent(&self) -> Option<Vec<u8>> {
        self.tx.borrow_mut().pop_front()
    }

    /// Removes and returns all sent frames, oldest first.
    pub fn drain_sent(&self) -> Vec<Vec<u8>> {
        self.tx.borrow_mut().drain(..).collect()
    }

    /// Makes subsequent send(...) calls fail with an IO error.
    pub fn set_fail_send(&self, fail: bool) {
        self.fail_send.set(fail);
    }
}

impl Device for MemoryDevice {
    fn send(&mut self, buffer: &[u8]) -> Result<()> {
        if self.fail_send.get() {
            return Err(Error::IO(std::io::Error::new(
                std::io::ErrorKind::Other,
                "send disabled",
            )));
        }

        self.tx.borrow_mut().push_back(buffer.to_vec());
        Ok(())
    }

    fn recv(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let frame = match self.rx.borrow_mut().pop_front() {
            Some(frame) => frame,
            None => return Err(Error::Nothing),
        };

        if frame.len() > buffer.len() {
            return Err(Error::Overflow);
        }

        buffer[.. frame.len()].copy_from_slice(&frame);
        Ok(frame.len())
    }

    fn max_transmission_unit(&self) -> usize {
        self.max_transmission_unit
    }
}
