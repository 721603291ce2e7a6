use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Controllable time for fixture timestamps and token generation.
///
/// Passed to `InMemorySite` and `TokenGenerator` via `with_time_provider()`,
/// so every token drawn while the clock stands still shares a timestamp and
/// only the random suffix tells them apart.
#[derive(Clone)]
pub struct MockClock {
    current: Arc<AtomicI64>,
}

impl MockClock {
    /// Creates a time provider function suitable for `with_time_provider()`.
    pub fn as_provider(&self) -> impl Fn() -> i64 + Send + Sync + 'static {
        let current = self.current.clone();
        move || current.load(Ordering::SeqCst)
    }
}

impl MockClock {
    /// Create a mock clock frozen at the given timestamp
    pub fn at(timestamp: i64) -> Self {
        Self {
            current: Arc::new(AtomicI64::new(timestamp)),
        }
    }

    /// Create a new mock clock starting at current time
    pub fn new() -> Self {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        Self::at(now)
    }

    /// Get current timestamp
    pub fn now(&self) -> i64 {
        self.current.load(Ordering::SeqCst)
    }

    /// Advance time by duration
    pub fn advance(&self, duration: Duration) {
        let seconds = duration.as_secs() as i64;
        self.current.fetch_add(seconds, Ordering::SeqCst);
    }

    /// Advance time by seconds
    pub fn advance_secs(&self, seconds: u64) {
        self.advance(Duration::from_secs(seconds));
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}
