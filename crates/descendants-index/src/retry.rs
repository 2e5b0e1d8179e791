//! Retry of transient backend failures.

use std::thread;
use std::time::Duration;

use crate::config::RetrySettings;
use crate::error::{IndexError, Result};

/// Runs an action under a retry policy, surfacing only the final failure.
pub trait Retryer: Send + Sync {
    fn execute_no_result(&self, action: &mut dyn FnMut() -> Result<()>) -> Result<()>;
}

/// Fixed-interval retry of transient errors.
///
/// Non-transient errors are returned after the first attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    repeat_number: u32,
    interval: Duration,
}

impl RetryPolicy {
    /// `repeat_number` is the total number of attempts; zero is treated as one.
    pub fn new(repeat_number: u32, interval: Duration) -> Self {
        Self {
            repeat_number: repeat_number.max(1),
            interval,
        }
    }

    /// A policy that tries exactly once.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn repeat_number(&self) -> u32 {
        self.repeat_number
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self::new(settings.repeat_number, settings.interval())
    }
}

impl Retryer for RetryPolicy {
    fn execute_no_result(&self, action: &mut dyn FnMut() -> Result<()>) -> Result<()> {
        let mut attempt = 1;
        loop {
            match action() {
                Ok(()) => return Ok(()),
                Err(error) if error.is_transient() && attempt < self.repeat_number => {
                    log::warn!(
                        "descendants store attempt={} of {} failed, retrying in {}ms: {}",
                        attempt,
                        self.repeat_number,
                        self.interval.as_millis(),
                        error
                    );
                    if !self.interval.is_zero() {
                        thread::sleep(self.interval);
                    }
                    attempt += 1;
                }
                Err(error) if attempt > 1 => {
                    return Err(IndexError::RetriesExhausted {
                        attempts: attempt,
                        source: Box::new(error),
                    })
                }
                Err(error) => return Err(error),
            }
        }
    }
}
