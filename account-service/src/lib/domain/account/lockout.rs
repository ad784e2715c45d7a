//! Consecutive-failure lockout.
//!
//! The transitions here are pure; repositories apply them atomically against
//! their storage so concurrent failures for one account cannot lose updates.

use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;

/// Lockout thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    pub max_attempts: u32,
    pub window: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window: Duration::minutes(15),
        }
    }
}

/// Per-account failure counter and lock deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LockoutState {
    pub failed_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
}

/// Whether an account may currently attempt authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStatus {
    Unlocked,
    Locked {
        until: DateTime<Utc>,
        retry_after_secs: u64,
    },
}

/// Result of registering one failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Counter incremented, account still usable.
    Counted { attempts: u32 },
    /// This failure reached the threshold; counter reset and lock set.
    LockedOut { until: DateTime<Utc> },
    /// The account was already locked; nothing changed.
    AlreadyLocked { until: DateTime<Utc> },
}

/// Result of registering a successful authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuccessOutcome {
    /// Counter reset and any lapsed lock cleared.
    Recorded,
    /// A lock is in force; nothing changed.
    Locked { until: DateTime<Utc> },
}

impl LockoutPolicy {
    pub fn status(&self, state: &LockoutState, now: DateTime<Utc>) -> LockStatus {
        match state.locked_until {
            Some(until) if until > now => LockStatus::Locked {
                until,
                retry_after_secs: retry_after_secs(until, now),
            },
            _ => LockStatus::Unlocked,
        }
    }

    /// Apply one failed attempt.
    ///
    /// Reaching `max_attempts` sets the lock and resets the counter in the
    /// same transition. A locked account is left untouched.
    pub fn register_failure(
        &self,
        state: &LockoutState,
        now: DateTime<Utc>,
    ) -> (LockoutState, FailureOutcome) {
        if let LockStatus::Locked { until, .. } = self.status(state, now) {
            return (*state, FailureOutcome::AlreadyLocked { until });
        }

        let attempts = state.failed_attempts.saturating_add(1);
        if attempts >= self.max_attempts {
            let until = now + self.window;
            (
                LockoutState {
                    failed_attempts: 0,
                    locked_until: Some(until),
                },
                FailureOutcome::LockedOut { until },
            )
        } else {
            (
                LockoutState {
                    failed_attempts: attempts,
                    locked_until: state.locked_until,
                },
                FailureOutcome::Counted { attempts },
            )
        }
    }
}

impl LockoutState {
    /// State after a successful authentication.
    pub fn cleared() -> Self {
        Self::default()
    }

    /// Apply one successful authentication.
    ///
    /// A lock set after the caller last read this state still wins: the
    /// state is returned unchanged with `Locked`.
    pub fn register_success(&self, now: DateTime<Utc>) -> (LockoutState, SuccessOutcome) {
        match self.locked_until {
            Some(until) if until > now => (*self, SuccessOutcome::Locked { until }),
            _ => (Self::cleared(), SuccessOutcome::Recorded),
        }
    }
}

/// Whole seconds until `until`, rounded up, never below 1.
pub fn retry_after_secs(until: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let millis = (until - now).num_milliseconds().max(0) as u64;
    millis.div_ceil(1000).max(1)
}
