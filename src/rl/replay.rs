//! Bounded replay memory shared by both agents.

use std::collections::VecDeque;

use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::Rng;

/// One experience tuple `(s, a, r, s', done)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: Array1<f64>,
    pub action: usize,
    pub reward: f64,
    pub next_state: Array1<f64>,
    pub done: bool,
}

/// FIFO buffer of transitions; the oldest entry is evicted once full.
#[derive(Debug, Clone)]
pub struct ReplayMemory {
    buffer: VecDeque<Transition>,
    capacity: usize,
}

impl ReplayMemory {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity.min(4096)),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, transition: Transition) {
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(transition);
    }

    /// Draw `batch_size` distinct transitions uniformly at random.
    ///
    /// Returns `None` while fewer than `batch_size` transitions are stored.
    pub fn sample<R: Rng + ?Sized>(&self, batch_size: usize, rng: &mut R) -> Option<Vec<Transition>> {
        if batch_size == 0 || self.buffer.len() < batch_size {
            return None;
        }
        let indices: Vec<usize> = (0..self.buffer.len()).collect();
        Some(
            indices
                .choose_multiple(rng, batch_size)
                .map(|&i| self.buffer[i].clone())
                .collect(),
        )
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
}
