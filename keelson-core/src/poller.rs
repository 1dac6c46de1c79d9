//! Readiness registration.
//!
//! Engines never poll. They tell a [`Registrar`] which readiness events
//! they care about and an outer event loop calls back into them. One
//! registrar serves one connection.

/// Interest bookkeeping for one transport handle.
pub trait Registrar {
    /// Start watching the handle.
    fn register(&mut self);

    /// Stop watching the handle for good.
    fn deregister(&mut self);

    fn set_poll_in(&mut self);

    fn reset_poll_in(&mut self);

    fn set_poll_out(&mut self);

    fn reset_poll_out(&mut self);
}

/// Registrar that only records the current interest set.
///
/// An outer loop (or a test) reads the flags to decide which events to
/// deliver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Interest {
    pub registered: bool,
    pub readable: bool,
    pub writable: bool,
}

impl Interest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered and waiting for input.
    pub fn wants_read(&self) -> bool {
        self.registered && self.readable
    }

    /// Registered and waiting to write.
    pub fn wants_write(&self) -> bool {
        self.registered && self.writable
    }
}

impl Registrar for Interest {
    fn register(&mut self) {
        self.registered = true;
    }

    fn deregister(&mut self) {
        *self = Self::default();
    }

    fn set_poll_in(&mut self) {
        self.readable = true;
    }

    fn reset_poll_in(&mut self) {
        self.readable = false;
    }

    fn set_poll_out(&mut self) {
        self.writable = true;
    }

    fn reset_poll_out(&mut self) {
        self.writable = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interest_tracks_flags() {
        let mut interest = Interest::new();
        interest.set_poll_in();
        assert!(!interest.wants_read());

        interest.register();
        assert!(interest.wants_read());
        interest.set_poll_out();
        assert!(interest.wants_write());
        interest.reset_poll_out();
        assert!(!interest.wants_write());
    }

    #[test]
    fn deregister_clears_everything() {
        let mut interest = Interest::new();
        interest.register();
        interest.set_poll_in();
        interest.set_poll_out();
        interest.deregister();
        assert_eq!(interest, Interest::default());
    }
}
