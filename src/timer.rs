/// Doubling retransmission timer with an upper bound.
///
/// Used for handshake flight resends and heartbeat request resends. Both
/// start at the configured initial value and never exceed `max_millis`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    start_millis: u32,
    max_millis: u32,
    millis: u32,
    attempts: usize,
}

impl ExponentialBackoff {
    pub fn new(start_millis: u32, max_millis: u32) -> Self {
        let start_millis = start_millis.clamp(1, max_millis.max(1));
        Self {
            start_millis,
            max_millis: max_millis.max(start_millis),
            millis: start_millis,
            attempts: 0,
        }
    }

    pub fn reset(&mut self) {
        self.millis = self.start_millis;
        self.attempts = 0;
    }

    /// Current timeout in milliseconds.
    pub fn millis(&self) -> u32 {
        self.millis
    }

    /// Record a resend and double the timeout.
    pub fn attempt(&mut self) {
        self.attempts += 1;
        self.millis = self.millis.saturating_mul(2).min(self.max_millis);
    }

    /// Resends since the last reset.
    pub fn attempts(&self) -> usize {
        self.attempts
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn attempts() {
        let mut exp = ExponentialBackoff::new(1000, 60_000);
        assert_eq!(exp.millis(), 1000);

        exp.attempt();
        assert_eq!(exp.millis(), 2000);

        exp.attempt();
        exp.attempt();
        assert_eq!(exp.millis(), 8000);
        assert_eq!(exp.attempts(), 3);

        for _ in 0..10 {
            exp.attempt();
        }
        assert_eq!(exp.millis(), 60_000);

        exp.reset();
        assert_eq!(exp.millis(), 1000);
        assert_eq!(exp.attempts(), 0);
    }

    #[test]
    fn start_above_cap_is_clamped() {
        let exp = ExponentialBackoff::new(90_000, 60_000);
        assert_eq!(exp.millis(), 60_000);
    }
}
