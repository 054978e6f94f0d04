//! When an order may still be cancelled, and what happens to its stock.

use chrono::{DateTime, Duration, Utc};

/// Default number of days after placement during which an order can be
/// cancelled.
pub const DEFAULT_CANCELLATION_WINDOW_DAYS: i64 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancellationPolicy {
    window: Duration,
    restock_on_cancel: bool,
}

impl CancellationPolicy {
    pub fn new(window: Duration, restock_on_cancel: bool) -> Self {
        Self {
            window,
            restock_on_cancel,
        }
    }

    /// Creates a policy with a window of `days` days.
    pub fn with_window_days(days: i64, restock_on_cancel: bool) -> Self {
        Self::new(Duration::days(days), restock_on_cancel)
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Whether cancelling returns the order's units to stock.
    pub fn restock_on_cancel(&self) -> bool {
        self.restock_on_cancel
    }

    /// Returns true if an order placed at `placed_at` can be cancelled at
    /// `now`. The window is inclusive: an order exactly `window` old still
    /// qualifies.
    pub fn permits(&self, placed_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(placed_at) <= self.window
    }
}

impl Default for CancellationPolicy {
    fn default() -> Self {
        Self::with_window_days(DEFAULT_CANCELLATION_WINDOW_DAYS, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_is_inclusive_at_fourteen_days() {
        let policy = CancellationPolicy::default();
        let placed_at = Utc::now();

        assert!(policy.permits(placed_at, placed_at));
        assert!(policy.permits(placed_at, placed_at + Duration::days(14)));
        assert!(!policy.permits(
            placed_at,
            placed_at + Duration::days(14) + Duration::seconds(1)
        ));
    }

    #[test]
    fn default_does_not_restock() {
        let policy = CancellationPolicy::default();
        assert!(!policy.restock_on_cancel());
        assert_eq!(policy.window(), Duration::days(14));
    }

    #[test]
    fn custom_window() {
        let policy = CancellationPolicy::with_window_days(1, true);
        let placed_at = Utc::now();

        assert!(policy.restock_on_cancel());
        assert!(policy.permits(placed_at, placed_at + Duration::hours(23)));
        assert!(!policy.permits(placed_at, placed_at + Duration::hours(25)));
    }
}
