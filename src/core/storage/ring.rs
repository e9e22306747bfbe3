use crate::{
    Error,
    Result,
};

/// Ring/bounded buffer of T's.
#[derive(Clone, Debug)]
pub struct Ring<T> {
    buffer: Vec<T>,
    begin: usize,
    len: usize,
}

impl<T> From<Vec<T>> for Ring<T> {
    fn from(buffer: Vec<T>) -> Ring<T> {
        Ring {
            buffer,
            begin: 0,
            len: 0,
        }
    }
}

impl<T: Default> Ring<T> {
    /// Creates an empty ring holding at most capacity items.
    pub fn with_capacity(capacity: usize) -> Ring<T> {
        Ring::from((0 .. capacity).map(|_| T::default()).collect::<Vec<_>>())
    }

    /// Moves item into the ring or returns an error if the ring is full.
    pub fn enqueue(&mut self, item: T) -> Result<()> {
        self.enqueue_with(|slot| *slot = item)
    }

    /// Moves the head out of the ring, leaving a default value behind.
    pub fn dequeue(&mut self) -> Option<T> {
        self.dequeue_with(std::mem::take).ok()
    }
}

impl<T> Ring<T> {
    /// Applies f on the head of the buffer or returns an error if the buffer
    /// is empty. Dequeue's the element f was applied on.
    pub fn dequeue_with<'a, F, R>(&'a mut self, f: F) -> Result<R>
    where
        F: FnOnce(&'a mut T) -> R,
    {
        if self.len == 0 {
            return Err(Error::Exhausted);
        }

        let buffer_len = self.buffer.len();
        let res = f(&mut self.buffer[self.begin]);
        self.begin = (self.begin + 1) % buffer_len;
        self.len -= 1;
        Ok(res)
    }

    /// Applies f on the next free slot (so that f can mutate the T as desired)
    /// or returns an error if the buffer is full. Enqueue's the element f was
    /// applied on.
    pub fn enqueue_with<'a, F, R>(&'a mut self, f: F) -> Result<R>
    where
        F: FnOnce(&'a mut T) -> R,
    {
        if self.len == self.buffer.len() {
            return Err(Error::Exhausted);
        }

        let idx = (self.begin + self.len) % self.buffer.len();
        let res = f(&mut self.buffer[idx]);
        self.len += 1;
        Ok(res)
    }

    /// Returns the current number of items in the ring.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.buffer.len()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }
}
