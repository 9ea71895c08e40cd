use rand::Rng;
use std::collections::VecDeque;

/// Fixed-capacity FIFO memory; pushing onto a full buffer drops the oldest entry.
pub struct ReplayBuffer<T> {
    buffer: VecDeque<T>,
    capacity: usize
}

impl<T> ReplayBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "replay buffer needs room for at least one entry");
        Self {
            buffer: VecDeque::with_capacity(capacity.min(4096)),
            capacity
        }
    }

    pub fn add(&mut self, experience: T) {
        if self.buffer.len() == self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(experience);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buffer.iter()
    }

    // up to `batch_size` distinct entries; everything, oldest first, when the buffer is not larger
    pub fn sample<R: Rng + ?Sized>(&self, batch_size: usize, rng: &mut R) -> Vec<&T> {
        if self.buffer.len() <= batch_size {
            return self.buffer.iter().collect();
        }

        rand::seq::index::sample(rng, self.buffer.len(), batch_size)
            .iter()
            .map(|index| &self.buffer[index])
            .collect()
    }
}
