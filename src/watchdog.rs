//! Missed-update watchdog.
//!
//! Counts consecutive updates that did not reach the server. Once the limit is
//! hit the main loop exits with an error and the service manager restarts the
//! process, which also brings the network stack back up from scratch.

#[derive(Debug, Clone)]
pub struct Watchdog {
    max_missed: u32,
    missed: u32,
}

impl Watchdog {
    /// `max_missed` of zero is treated as one: a single miss expires it.
    pub fn new(max_missed: u32) -> Self {
        Self {
            max_missed: max_missed.max(1),
            missed: 0,
        }
    }

    /// Successful update; resets the count.
    pub fn feed(&mut self) {
        self.missed = 0;
    }

    /// Failed update.
    pub fn miss(&mut self) {
        self.missed = self.missed.saturating_add(1);
    }

    pub fn missed(&self) -> u32 {
        self.missed
    }

    pub fn expired(&self) -> bool {
        self.missed >= self.max_missed
    }
}
