//! Bounded lock acquisition shared by the config store and action queue.
//!
//! Nothing in the core may block indefinitely, so every `Mutex` is taken
//! through [`acquire`], which either fails fast or retries a fixed number of
//! times with a sleep in between.

use std::sync::{Mutex, MutexGuard, TryLockError};
use std::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};

/// How to behave when a lock is already held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockPolicy {
    /// Give up after a single `try_lock`.
    FailFast,
    /// Retry `attempts` times, sleeping `backoff_ms` between tries.
    Retry { attempts: u32, backoff_ms: u64 },
}

impl LockPolicy {
    /// Upper bound on time spent waiting for the lock.
    pub fn max_wait(self) -> Duration {
        match self {
            Self::FailFast => Duration::ZERO,
            Self::Retry {
                attempts,
                backoff_ms,
            } => Duration::from_millis(u64::from(attempts) * backoff_ms),
        }
    }
}

/// Try to lock `mutex` under `policy`.  Returns `None` once the budget is
/// exhausted.  A poisoned lock is recovered.
pub fn acquire<'a, T>(mutex: &'a Mutex<T>, policy: LockPolicy, what: &str) -> Option<MutexGuard<'a, T>> {
    let (attempts, backoff) = match policy {
        LockPolicy::FailFast => (1, Duration::ZERO),
        LockPolicy::Retry {
            attempts,
            backoff_ms,
        } => (attempts.max(1), Duration::from_millis(backoff_ms)),
    };

    for attempt in 0..attempts {
        match mutex.try_lock() {
            Ok(guard) => return Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => {
                warn!("{}: lock poisoned, recovering", what);
                return Some(poisoned.into_inner());
            }
            Err(TryLockError::WouldBlock) => {
                if attempt + 1 < attempts && !backoff.is_zero() {
                    std::thread::sleep(backoff);
                }
            }
        }
    }
    None
}
