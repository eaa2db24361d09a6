use chrono::Utc;

/// Source of client timestamps.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;
}

impl<T: Fn() -> i64 + Send + Sync> Clock for T {
    fn now_millis(&self) -> i64 {
        self()
    }
}

/// Wall clock. The default [`Clock`].
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}
