//! Command Channel – thread-safe FIFO between connection handlers and the
//! simulation tick.
//!
//! Many producers (one per connection), exactly one consumer (the tick).
//! The lock is held only for the queue operation itself, never across I/O.

use crate::protocol::Command;
use parking_lot::Mutex;
use std::collections::VecDeque;

pub struct CommandChannel {
    queue: Mutex<VecDeque<Command>>,
}

impl CommandChannel {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Enqueue a parsed command. Never blocks beyond the critical section.
    pub fn push(&self, command: Command) {
        self.queue.lock().push_back(command);
    }

    /// Take every queued command in FIFO order. Tick-thread only.
    pub fn drain(&self) -> Vec<Command> {
        self.queue.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

impl Default for CommandChannel {
    fn default() -> Self {
        Self::new()
    }
}
