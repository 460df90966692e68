//! Exponential backoff for transient sheet store failures

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

use super::{SheetRow, SheetStore};
use crate::error::SheetError;

/// How often and how patiently a remote call is retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff_base: u32,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, backoff_base: u32) -> Self {
        Self {
            max_attempts,
            backoff_base,
        }
    }

    /// Total calls made before giving up, including the first
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Pause after failed attempt `attempt` (0-based): base^attempt seconds
    pub fn delay_after(&self, attempt: u32) -> Duration {
        Duration::from_secs(u64::from(self.backoff_base).saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, 2)
    }
}

/// Blocking pause between attempts
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the calling thread
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Run `op`, retrying transient failures with exponential backoff.
///
/// Non-transient errors are returned immediately. Once the attempt budget is
/// spent the last transient error is returned without a further pause.
pub fn with_retry<T>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    label: &str,
    mut op: impl FnMut() -> Result<T, SheetError>,
) -> Result<T, SheetError> {
    let max_attempts = policy.max_attempts();
    let mut attempt = 0;

    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt + 1 < max_attempts => {
                let delay = policy.delay_after(attempt);
                warn!(
                    "{} failed on attempt {}/{}: {}; retrying in {:?}",
                    label,
                    attempt + 1,
                    max_attempts,
                    err,
                    delay
                );
                sleeper.sleep(delay);
                attempt += 1;
            }
            Err(err) => {
                if err.is_transient() {
                    error!("{} still failing after {} attempts: {}", label, max_attempts, err);
                }
                return Err(err);
            }
        }
    }
}

/// Store decorator applying [`with_retry`] to every operation
pub struct RetryingStore<S> {
    inner: S,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl<S: SheetStore> RetryingStore<S> {
    pub fn new(inner: S, policy: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            inner,
            policy,
            sleeper,
        }
    }
}

impl<S: SheetStore> SheetStore for RetryingStore<S> {
    fn read_range(&self, spreadsheet_id: &str, range: &str) -> Result<Vec<SheetRow>, SheetError> {
        with_retry(&self.policy, self.sleeper.as_ref(), "read_range", || {
            self.inner.read_range(spreadsheet_id, range)
        })
    }

    fn write_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: &[SheetRow],
    ) -> Result<(), SheetError> {
        with_retry(&self.policy, self.sleeper.as_ref(), "write_range", || {
            self.inner.write_range(spreadsheet_id, range, values)
        })
    }

    fn set_cell_color(
        &self,
        spreadsheet_id: &str,
        sheet_tab_id: i64,
        row: usize,
        column: usize,
        color_hex: &str,
    ) -> Result<(), SheetError> {
        with_retry(&self.policy, self.sleeper.as_ref(), "set_cell_color", || {
            self.inner
                .set_cell_color(spreadsheet_id, sheet_tab_id, row, column, color_hex)
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::cell::Cell;

    /// Records requested pauses instead of sleeping
    #[derive(Default)]
    pub(crate) struct RecordingSleeper {
        pub(crate) delays: Mutex<Vec<Duration>>,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.delays.lock().push(duration);
        }
    }

    fn rate_limited() -> SheetError {
        SheetError::Transient {
            status: 429,
            message: "quota exceeded".into(),
        }
    }

    #[test]
    fn test_delay_schedule() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (0..5).map(|a| policy.delay_after(a).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16]);
    }

    #[test]
    fn test_succeeds_on_third_call_after_two_retries() {
        let sleeper = RecordingSleeper::default();
        let calls = Cell::new(0);

        let result = with_retry(&RetryPolicy::default(), &sleeper, "read", || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(rate_limited())
            } else {
                Ok("rows")
            }
        });

        assert_eq!(result, Ok("rows"));
        assert_eq!(calls.get(), 3);
        assert_eq!(
            *sleeper.delays.lock(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[test]
    fn test_gives_up_after_five_transient_failures() {
        let sleeper = RecordingSleeper::default();
        let calls = Cell::new(0);

        let result: Result<(), _> = with_retry(&RetryPolicy::default(), &sleeper, "read", || {
            calls.set(calls.get() + 1);
            Err(SheetError::Transient {
                status: 503,
                message: format!("attempt {}", calls.get()),
            })
        });

        assert_eq!(calls.get(), 5);
        assert_eq!(
            result,
            Err(SheetError::Transient {
                status: 503,
                message: "attempt 5".into()
            })
        );
        let secs: Vec<u64> = sleeper.delays.lock().iter().map(|d| d.as_secs()).collect();
        assert_eq!(secs, vec![1, 2, 4, 8]);
    }

    #[test]
    fn test_permanent_error_is_not_retried() {
        let sleeper = RecordingSleeper::default();
        let calls = Cell::new(0);

        let result: Result<(), _> = with_retry(&RetryPolicy::default(), &sleeper, "color", || {
            calls.set(calls.get() + 1);
            Err(SheetError::Permanent {
                status: 404,
                message: "not found".into(),
            })
        });

        assert!(matches!(result, Err(SheetError::Permanent { status: 404, .. })));
        assert_eq!(calls.get(), 1);
        assert!(sleeper.delays.lock().is_empty());
    }

    #[test]
    fn test_single_attempt_policy_never_sleeps() {
        let sleeper = RecordingSleeper::default();
        let result: Result<(), _> =
            with_retry(&RetryPolicy::new(1, 2), &sleeper, "read", || Err(rate_limited()));

        assert!(result.is_err());
        assert!(sleeper.delays.lock().is_empty());
    }

    /// Fails the first `failures` reads transiently, then returns one row
    struct FlakyStore {
        failures: u32,
        reads: Mutex<u32>,
        colors: Mutex<u32>,
    }

    impl SheetStore for FlakyStore {
        fn read_range(&self, _: &str, _: &str) -> Result<Vec<SheetRow>, SheetError> {
            let mut reads = self.reads.lock();
            *reads += 1;
            if *reads <= self.failures {
                Err(rate_limited())
            } else {
                Ok(vec![vec!["ID001".into()]])
            }
        }

        fn write_range(&self, _: &str, _: &str, _: &[SheetRow]) -> Result<(), SheetError> {
            Err(SheetError::Permanent {
                status: 400,
                message: "bad range".into(),
            })
        }

        fn set_cell_color(&self, _: &str, _: i64, _: usize, _: usize, _: &str) -> Result<(), SheetError> {
            *self.colors.lock() += 1;
            Ok(())
        }
    }

    #[test]
    fn test_retrying_store_wraps_every_operation() {
        let sleeper = Arc::new(RecordingSleeper::default());
        let store = RetryingStore::new(
            FlakyStore {
                failures: 1,
                reads: Mutex::new(0),
                colors: Mutex::new(0),
            },
            RetryPolicy::default(),
            sleeper.clone(),
        );

        let rows = store.read_range("sheet", "Sheet1!A1:A").unwrap();
        assert_eq!(rows, vec![vec!["ID001".to_string()]]);
        assert_eq!(*store.inner.reads.lock(), 2);

        assert!(store.write_range("sheet", "Sheet1!A1", &[]).is_err());
        store.set_cell_color("sheet", 0, 0, 0, "#00FF00").unwrap();
        assert_eq!(*store.inner.colors.lock(), 1);

        assert_eq!(*sleeper.delays.lock(), vec![Duration::from_secs(1)]);
    }
}
