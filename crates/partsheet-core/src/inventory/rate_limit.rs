use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::info;

/// Sortly allows 1000 requests per 15 minutes.
pub const DEFAULT_MAX_REQUESTS: usize = 1000;
pub const DEFAULT_TIME_WINDOW: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_SAFETY_BUFFER: usize = 50;

/// Extra time slept past the end of the window.
const WAIT_MARGIN: Duration = Duration::from_secs(1);

/// Source of time for [`RateLimiter`].
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Sliding-window request limiter. Keeps at most
/// `max_requests - safety_buffer` requests inside any `time_window`.
pub struct RateLimiter<C: Clock = SystemClock> {
    max_requests: usize,
    time_window: Duration,
    requests: VecDeque<Instant>,
    clock: C,
}

impl RateLimiter<SystemClock> {
    pub fn new(max_requests: usize, time_window: Duration, safety_buffer: usize) -> Self {
        Self::with_clock(max_requests, time_window, safety_buffer, SystemClock)
    }
}

impl Default for RateLimiter<SystemClock> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, DEFAULT_TIME_WINDOW, DEFAULT_SAFETY_BUFFER)
    }
}

impl<C: Clock> RateLimiter<C> {
    pub fn with_clock(
        max_requests: usize,
        time_window: Duration,
        safety_buffer: usize,
        clock: C,
    ) -> Self {
        RateLimiter {
            max_requests: max_requests.saturating_sub(safety_buffer).max(1),
            time_window,
            requests: VecDeque::new(),
            clock,
        }
    }

    /// Effective request budget per window.
    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Requests recorded inside the current window.
    pub fn in_window(&self) -> usize {
        self.requests.len()
    }

    fn evict_expired(&mut self, now: Instant) {
        while let Some(oldest) = self.requests.front() {
            if now.duration_since(*oldest) >= self.time_window {
                self.requests.pop_front();
            } else {
                break;
            }
        }
    }

    /// Block until another request fits into the window. Returns how long
    /// it slept.
    pub fn wait_if_needed(&mut self) -> Duration {
        let now = self.clock.now();
        self.evict_expired(now);

        if self.requests.len() < self.max_requests {
            return Duration::ZERO;
        }
        let Some(oldest) = self.requests.front().copied() else {
            return Duration::ZERO;
        };

        let remaining = self.time_window.saturating_sub(now.duration_since(oldest));
        if remaining.is_zero() {
            return Duration::ZERO;
        }
        let wait = remaining + WAIT_MARGIN;
        info!(seconds = wait.as_secs_f32(), "rate limit reached, waiting");
        self.clock.sleep(wait);

        let now = self.clock.now();
        self.evict_expired(now);
        wait
    }

    pub fn record_request(&mut self) {
        let now = self.clock.now();
        self.requests.push_back(now);
    }
}

#[cfg(test)]
pub(crate) mod test_clock {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Clock that only moves when slept on or advanced by hand.
    #[derive(Clone)]
    pub struct ManualClock {
        now: Rc<Cell<Instant>>,
        slept: Rc<Cell<Duration>>,
    }

    impl ManualClock {
        pub fn new() -> Self {
            ManualClock {
                now: Rc::new(Cell::new(Instant::now())),
                slept: Rc::new(Cell::new(Duration::ZERO)),
            }
        }

        pub fn advance(&self, by: Duration) {
            self.now.set(self.now.get() + by);
        }

        pub fn slept(&self) -> Duration {
            self.slept.get()
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.now.get()
        }

        fn sleep(&self, duration: Duration) {
            self.slept.set(self.slept.get() + duration);
            self.advance(duration);
        }
    }
}
