/// Monotonic millisecond time source.
pub trait Clock {
    /// Get current timestamp in milliseconds.
    fn now_ms(&self) -> u64;
}

/// Milliseconds since the clock was created.
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy)]
pub struct StdClock {
    start: std::time::Instant,
}

#[cfg(feature = "std")]
impl StdClock {
    pub fn new() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl Clock for StdClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

#[cfg(test)]
pub(crate) mod test_clock {
    use std::{cell::Cell, rc::Rc};

    use embedded_hal::blocking::delay::DelayMs;

    use super::Clock;

    /// Clock whose time only moves when a test says so. Clones share time.
    #[derive(Debug, Clone)]
    pub struct FakeClock(Rc<Cell<u64>>);

    impl FakeClock {
        pub fn new(now_ms: u64) -> Self {
            Self(Rc::new(Cell::new(now_ms)))
        }

        pub fn set(&self, now_ms: u64) {
            self.0.set(now_ms);
        }

        pub fn advance(&self, ms: u64) {
            self.0.set(self.0.get() + ms);
        }
    }

    /// Delay that moves a `FakeClock` forward instead of sleeping.
    #[derive(Debug, Clone)]
    pub struct TickingDelay(pub FakeClock);

    impl DelayMs<u32> for TickingDelay {
        fn delay_ms(&mut self, ms: u32) {
            self.0.advance(ms as u64);
        }
    }

    impl Clock for FakeClock {
        fn now_ms(&self) -> u64 {
            self.0.get()
        }
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn std_clock_is_monotonic() {
        let clock = StdClock::new();
        let first = clock.now_ms();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(clock.now_ms() >= first + 5);
    }
}
