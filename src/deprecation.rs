//! Rate-limited warnings for deprecated functions.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::warn;

static GLOBAL: LazyLock<Arc<DeprecationLog>> =
    LazyLock::new(|| Arc::new(DeprecationLog::new(DeprecationLog::DEFAULT_INTERVAL)));

/// Emits at most one warning per function within `interval`.
#[derive(Debug)]
pub struct DeprecationLog {
    interval: Duration,
    last: Mutex<HashMap<String, Instant>>,
}

impl DeprecationLog {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

    pub fn new(interval: Duration) -> Self {
        DeprecationLog {
            interval,
            last: Mutex::new(HashMap::new()),
        }
    }

    /// Process-wide log used by contexts that were not given one.
    pub fn global() -> Arc<DeprecationLog> {
        Arc::clone(&GLOBAL)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Warns about a deprecated function, unless it was reported within the interval.
    ///
    /// Returns whether a warning was emitted.
    pub fn warn(&self, function: &str, rule: Option<&str>) -> bool {
        let now = Instant::now();
        {
            let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(previous) = last.get(function)
                && now.duration_since(*previous) < self.interval
            {
                return false;
            }
            last.insert(function.to_string(), now);
        }

        match rule {
            Some(rule) => warn!(function, rule, "deprecated function used in rule"),
            None => warn!(function, "deprecated function used"),
        }
        true
    }
}

impl Default for DeprecationLog {
    fn default() -> Self {
        DeprecationLog::new(DeprecationLog::DEFAULT_INTERVAL)
    }
}
