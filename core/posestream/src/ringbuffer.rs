use crate::error::{PoseStreamError, PsResult};

/// A fixed capacity sliding window.
///
/// Elements are indexed from the oldest (`0`) to the newest (`len() - 1`).
/// Once full, every `add` evicts the oldest element. Changing the capacity
/// goes through [`RingBuffer::reset`], which drops the content.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    items: Vec<T>,
    // Slot of the oldest element once the buffer has wrapped.
    head: usize,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize) -> PsResult<Self> {
        if capacity == 0 {
            return Err(PoseStreamError::invalid_config(
                "ring_buffer",
                "capacity must be at least 1",
            ));
        }
        Ok(Self {
            items: Vec::with_capacity(capacity),
            head: 0,
            capacity,
        })
    }

    /// Reallocates the window with a new capacity, dropping every element.
    pub fn reset(&mut self, capacity: usize) -> PsResult<()> {
        *self = Self::new(capacity)?;
        Ok(())
    }

    pub fn add(&mut self, item: T) {
        if self.items.len() < self.capacity {
            self.items.push(item);
        } else {
            self.items[self.head] = item;
            self.head = (self.head + 1) % self.capacity;
        }
    }

    #[inline]
    fn slot(&self, index: usize) -> Option<usize> {
        (index < self.items.len()).then(|| (self.head + index) % self.capacity)
    }

    /// Element `index` counted from the oldest.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.slot(index).map(|slot| &self.items[slot])
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.slot(index).map(move |slot| &mut self.items[slot])
    }

    /// Element `index` counted from the newest (`0` is the newest).
    pub fn get_from_end(&self, index: usize) -> Option<&T> {
        let len = self.items.len();
        if index >= len {
            return None;
        }
        self.get(len - 1 - index)
    }

    pub fn get_from_end_mut(&mut self, index: usize) -> Option<&mut T> {
        let len = self.items.len();
        if index >= len {
            return None;
        }
        self.get_mut(len - 1 - index)
    }

    pub fn first(&self) -> Option<&T> {
        self.get(0)
    }

    pub fn last(&self) -> Option<&T> {
        self.get_from_end(0)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() == self.capacity
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.head = 0;
    }

    /// Iterates from the oldest to the newest element.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        (0..self.items.len()).filter_map(move |i| self.get(i))
    }
}
