//! Fair queueing over inbound pipes.
//!
//! Pipes live in one vector; the first `active` entries are the pipes that
//! may have messages. Reading from a pipe that turns out empty swaps it into
//! the inactive tail until the owner reports it readable again.
//!
//! The round-robin cursor moves only after a final part, so the parts of one
//! multi-part message are always delivered back to back.

use crate::message::Msg;
use crate::pipe::PipeId;

#[derive(Debug, Default)]
pub struct FairQueue {
    pipes: Vec<PipeId>,
    active: usize,
    current: usize,
    more: bool,
    /// Pipe the last delivered part came from.
    last_in: Option<PipeId>,
}

impl FairQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pipe as active.
    pub fn attach(&mut self, pipe: PipeId) {
        self.pipes.push(pipe);
        let last = self.pipes.len() - 1;
        self.pipes.swap(self.active, last);
        self.active += 1;
    }

    /// Forget a pipe.
    ///
    /// A message the pipe was in the middle of delivering is abandoned.
    pub fn terminated(&mut self, pipe: PipeId) {
        let Some(index) = self.position(pipe) else {
            return;
        };
        if self.last_in == Some(pipe) {
            self.last_in = None;
            self.more = false;
        }

        let index = if index < self.active {
            self.active -= 1;
            self.pipes.swap(index, self.active);
            if self.current == self.active {
                self.current = 0;
            }
            self.active
        } else {
            index
        };
        self.pipes.swap_remove(index);
    }

    /// Move a pipe back into the active set after it became readable.
    pub fn activated(&mut self, pipe: PipeId) {
        match self.position(pipe) {
            Some(index) if index >= self.active => {
                self.pipes.swap(index, self.active);
                self.active += 1;
            }
            _ => {}
        }
    }

    /// Read the next part, round-robin across active pipes.
    ///
    /// `read` is asked for one message from the given pipe and returns
    /// `None` when it has none.
    pub fn recv<F>(&mut self, mut read: F) -> Option<(PipeId, Msg)>
    where
        F: FnMut(PipeId) -> Option<Msg>,
    {
        while self.active > 0 {
            let pipe = self.pipes[self.current];
            if let Some(msg) = read(pipe) {
                self.more = msg.has_more();
                self.last_in = Some(pipe);
                if !self.more {
                    self.current = (self.current + 1) % self.active;
                }
                return Some((pipe, msg));
            }

            // A pipe never goes dry in the middle of a message.
            debug_assert!(!self.more);
            self.active -= 1;
            self.pipes.swap(self.current, self.active);
            if self.current == self.active {
                self.current = 0;
            }
        }
        None
    }

    /// Whether the last part handed out had MORE set.
    pub fn in_message(&self) -> bool {
        self.more
    }

    /// Whether `pipe` is attached and in the active set.
    pub fn is_active(&self, pipe: PipeId) -> bool {
        self.position(pipe).is_some_and(|i| i < self.active)
    }

    pub fn len(&self) -> usize {
        self.pipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipes.is_empty()
    }

    fn position(&self, pipe: PipeId) -> Option<usize> {
        self.pipes.iter().position(|p| *p == pipe)
    }
}
