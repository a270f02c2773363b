//! Explicit debounce timers.
//!
//! A [`Debouncer`] holds at most one live [`TimerToken`]. Scheduling again
//! replaces the token (bumping its generation), so a timer that was armed
//! earlier can never fire once it has been superseded. The host owns the
//! clock and drives firing with [`Debouncer::fire`].

use std::time::{Duration, Instant};

/// Handle for one armed timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimerToken {
    pub generation: u64,
    pub deadline: Instant,
}

#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    generation: u64,
    pending: Option<TimerToken>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generation: 0,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Arm (or re-arm) the timer to fire `delay` after `now`.
    pub fn schedule(&mut self, now: Instant) -> TimerToken {
        self.generation += 1;
        let token = TimerToken {
            generation: self.generation,
            deadline: now + self.delay,
        };
        self.pending = Some(token);
        token
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn pending(&self) -> Option<TimerToken> {
        self.pending
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Whether `token` is still the live one.
    pub fn is_current(&self, token: TimerToken) -> bool {
        self.pending == Some(token)
    }

    /// Consume the live token if its deadline has passed.
    pub fn fire(&mut self, now: Instant) -> Option<TimerToken> {
        match self.pending {
            Some(token) if token.deadline <= now => {
                self.pending = None;
                Some(token)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_after_delay() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(Duration::from_millis(300));
        d.schedule(t0);
        assert!(d.fire(t0 + Duration::from_millis(299)).is_none());
        assert!(d.fire(t0 + Duration::from_millis(300)).is_some());
        assert!(d.fire(t0 + Duration::from_millis(900)).is_none());
    }

    #[test]
    fn test_reschedule_invalidates_old_token() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(Duration::from_millis(300));
        let first = d.schedule(t0);
        let second = d.schedule(t0 + Duration::from_millis(200));
        assert!(!d.is_current(first));
        assert!(d.is_current(second));
        // the first deadline passes without firing
        assert!(d.fire(t0 + Duration::from_millis(350)).is_none());
        assert_eq!(d.fire(t0 + Duration::from_millis(500)), Some(second));
    }

    #[test]
    fn test_cancel() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(Duration::from_millis(10));
        d.schedule(t0);
        d.cancel();
        assert!(!d.is_pending());
        assert!(d.fire(t0 + Duration::from_secs(1)).is_none());
    }
}
