use std::time::{Duration, Instant};

/// Delay used when neither the caller nor config.toml picks one.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone)]
struct Pending<V> {
    value: V,
    due: Instant,
}

/// Single-slot deferred value driven by a monotonic clock.
///
/// At most one value is pending at a time. Scheduling a new value replaces
/// (and thereby cancels) the pending one. The owner polls with the current
/// instant; once the deadline has passed the value is handed back exactly once.
/// After `dispose` nothing is ever handed back again.
#[derive(Debug, Clone)]
pub struct DebounceSlot<V> {
    delay: Duration,
    pending: Option<Pending<V>>,
    disposed: bool,
}

impl<V> DebounceSlot<V> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
            disposed: false,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `value` to come due `delay` after `now`.
    /// Returns true when a previously pending value was cancelled.
    pub fn schedule(&mut self, value: V, now: Instant) -> bool {
        if self.disposed {
            return false;
        }
        let replaced = self.pending.is_some();
        self.pending = Some(Pending {
            value,
            due: now + self.delay,
        });
        replaced
    }

    /// Drop the pending value, if any, and return it.
    pub fn cancel(&mut self) -> Option<V> {
        self.pending.take().map(|p| p.value)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// When the pending value comes due.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.due)
    }

    /// Take the pending value if its deadline is at or before `now`.
    pub fn poll(&mut self, now: Instant) -> Option<V> {
        if self.disposed {
            return None;
        }
        let due = self.pending.as_ref().is_some_and(|p| p.due <= now);
        if due {
            self.cancel()
        } else {
            None
        }
    }

    /// Cancel the pending value and refuse all further scheduling.
    pub fn dispose(&mut self) {
        self.pending = None;
        self.disposed = true;
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl<V> Default for DebounceSlot<V> {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn value_comes_due_after_delay() {
        let t0 = Instant::now();
        let mut slot = DebounceSlot::new(ms(300));
        assert!(!slot.schedule("a", t0));
        assert_eq!(slot.poll(t0 + ms(299)), None);
        assert_eq!(slot.poll(t0 + ms(300)), Some("a"));
        // handed back once
        assert_eq!(slot.poll(t0 + ms(900)), None);
        assert!(!slot.is_pending());
    }

    #[test]
    fn rescheduling_cancels_the_pending_value() {
        let t0 = Instant::now();
        let mut slot = DebounceSlot::new(ms(300));
        slot.schedule("f", t0);
        assert!(slot.schedule("fo", t0 + ms(100)));
        assert!(slot.schedule("foo", t0 + ms(200)));
        // the first deadline has passed but was replaced
        assert_eq!(slot.poll(t0 + ms(350)), None);
        assert_eq!(slot.deadline(), Some(t0 + ms(500)));
        assert_eq!(slot.poll(t0 + ms(500)), Some("foo"));
    }

    #[test]
    fn dispose_prevents_late_delivery() {
        let t0 = Instant::now();
        let mut slot = DebounceSlot::new(ms(300));
        slot.schedule(1, t0);
        slot.dispose();
        assert!(slot.is_disposed());
        assert_eq!(slot.poll(t0 + ms(1_000)), None);
        assert!(!slot.schedule(2, t0 + ms(1_000)));
        assert_eq!(slot.poll(t0 + ms(5_000)), None);
    }

    #[test]
    fn cancel_returns_pending_value() {
        let t0 = Instant::now();
        let mut slot: DebounceSlot<&str> = DebounceSlot::default();
        assert_eq!(slot.delay(), DEFAULT_DEBOUNCE);
        slot.schedule("x", t0);
        assert_eq!(slot.cancel(), Some("x"));
        assert_eq!(slot.deadline(), None);
    }
}
