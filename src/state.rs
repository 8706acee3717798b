use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, NaiveDate, Utc};

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::db::Database;
use crate::error::Result;

/// Length of one rate-limit window.
pub const RATE_LIMIT_WINDOW_SECS: i64 = 60;

/// Fixed-window request counter keyed by endpoint scope and source address.
///
/// The window position is taken from the injected clock, never from the
/// wall clock, so ceilings and resets are testable without sleeping.
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<Mutex<HashMap<String, (DateTime<Utc>, u32)>>>,
}

impl RateLimiter {
    /// Creates a new `RateLimiter` with no recorded traffic.
    pub fn new() -> Self {
        Self { buckets: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// Counts one call against `key`, or returns `Err(retry_after_secs)`
    /// when the ceiling for the current window is exhausted.
    pub fn check(&self, key: &str, limit: u32, now: DateTime<Utc>) -> std::result::Result<(), i64> {
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = buckets.entry(key.to_string()).or_insert((now, 0));

        let elapsed = (now - entry.0).num_seconds();
        if !(0..RATE_LIMIT_WINDOW_SECS).contains(&elapsed) {
            *entry = (now, 0);
        }

        if entry.1 >= limit {
            let retry = RATE_LIMIT_WINDOW_SECS - (now - entry.0).num_seconds();
            return Err(retry.max(1));
        }

        entry.1 += 1;
        Ok(())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// The application's shared state: the store handle, configuration, clock,
/// rate-limit counters, and the rotation bookkeeping. Constructed once at
/// process start and passed explicitly to the gateway and the scheduler.
#[derive(Clone)]
pub struct AppState {
    /// The embedded database handle.
    pub db: Database,
    /// The application's configuration.
    pub config: Config,
    /// Time source for validity windows and rate-limit windows.
    pub clock: Arc<dyn Clock>,
    /// Per-source request counters.
    pub limiter: RateLimiter,
    /// Completion time of the most recent rotation pass.
    pub last_rotation: Arc<RwLock<Option<DateTime<Utc>>>>,
}

impl AppState {
    /// Creates a new `AppState` backed by the configured database file and
    /// the system clock.
    pub async fn new(config: &Config) -> Result<Self> {
        let db = Database::open(&config.database_path)?;
        tracing::info!("✅ SQLite database opened at {}", config.database_path);
        Ok(Self::with_database(config.clone(), db, Arc::new(SystemClock)))
    }

    /// Assembles state around an existing database handle and clock.
    pub fn with_database(config: Config, db: Database, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            config,
            clock,
            limiter: RateLimiter::new(),
            last_rotation: Arc::new(RwLock::new(None)),
        }
    }

    /// Current instant per the injected clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now_utc()
    }

    /// Current calendar date per the injected clock.
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Records the completion of a rotation pass.
    pub fn record_rotation(&self, at: DateTime<Utc>) {
        let mut guard = self.last_rotation.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(at);
    }
}
