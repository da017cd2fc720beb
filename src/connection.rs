use log::trace;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    /// Disconnected, counting down to the next attempt.
    Waiting,
    /// Time to call reconnect. `attempt` starts at 1.
    Reconnect { attempt: u32 },
    /// Every attempt was used up. Stays this way until [`ConnectionMonitor::reset`].
    Unavailable,
}

/// Paces reconnection attempts to a tracking source, one `check` per frame.
#[derive(Clone, Debug)]
pub struct ConnectionMonitor {
    max_attempts: u32,
    interval: u32,
    frames: u32,
    attempts: u32,
    exhausted: bool,
}

impl ConnectionMonitor {
    pub fn new(max_attempts: u32, interval: u32) -> Self {
        Self {
            max_attempts,
            interval,
            frames: 0,
            attempts: 0,
            exhausted: false,
        }
    }

    pub fn check(&mut self, is_connected: bool) -> ConnectionStatus {
        if is_connected {
            self.reset();
            return ConnectionStatus::Connected;
        }
        if self.exhausted {
            return ConnectionStatus::Unavailable;
        }

        self.frames += 1;
        if self.frames <= self.interval {
            return ConnectionStatus::Waiting;
        }
        self.frames = 0;

        // The last attempt gets a full interval to succeed before giving up.
        if self.attempts >= self.max_attempts {
            self.exhausted = true;
            return ConnectionStatus::Unavailable;
        }
        self.attempts += 1;
        trace!(
            "reconnection attempt {}/{}",
            self.attempts,
            self.max_attempts
        );
        ConnectionStatus::Reconnect {
            attempt: self.attempts,
        }
    }

    pub fn reset(&mut self) {
        self.frames = 0;
        self.attempts = 0;
        self.exhausted = false;
    }

    #[inline]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}
