//! Cooperative wall-clock deadline
//!
//! Evaluation code polls the deadline between units of work instead of being
//! interrupted asynchronously. Work already in flight when the deadline
//! passes runs to completion and is discarded by the caller.

use crate::error::{Result, SelectionError};
use std::time::{Duration, Instant};

/// A wall-clock deadline that can be armed, polled and disarmed
#[derive(Debug, Clone, Copy, Default)]
pub struct Deadline {
    expires_at: Option<Instant>,
}

impl Deadline {
    /// Arm a deadline `budget` from now; `None` leaves it unbounded
    pub fn arm(budget: Option<Duration>) -> Self {
        Self {
            expires_at: budget.map(|b| Instant::now() + b),
        }
    }

    /// Whether a deadline is currently armed
    pub fn is_armed(&self) -> bool {
        self.expires_at.is_some()
    }

    /// Whether the deadline has passed
    pub fn is_expired(&self) -> bool {
        self.expires_at.map_or(false, |t| Instant::now() >= t)
    }

    /// Time left before expiry; `None` when unbounded
    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|t| t.saturating_duration_since(Instant::now()))
    }

    /// Fail with [`SelectionError::TimeLimitExceeded`] once expired
    pub fn check(&self) -> Result<()> {
        if self.is_expired() {
            Err(SelectionError::TimeLimitExceeded)
        } else {
            Ok(())
        }
    }

    /// Disarm the deadline
    pub fn disarm(&mut self) {
        self.expires_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_never_expires() {
        let deadline = Deadline::arm(None);
        assert!(!deadline.is_armed());
        assert!(!deadline.is_expired());
        assert!(deadline.check().is_ok());
        assert!(deadline.remaining().is_none());
    }

    #[test]
    fn test_expired_deadline_fails_check() {
        let deadline = Deadline::arm(Some(Duration::from_nanos(1)));
        std::thread::sleep(Duration::from_millis(2));
        assert!(deadline.is_expired());
        assert!(matches!(deadline.check(), Err(SelectionError::TimeLimitExceeded)));
        assert_eq!(deadline.remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn test_disarm() {
        let mut deadline = Deadline::arm(Some(Duration::from_nanos(1)));
        std::thread::sleep(Duration::from_millis(1));
        deadline.disarm();
        assert!(!deadline.is_armed());
        assert!(deadline.check().is_ok());
    }

    #[test]
    fn test_generous_deadline_not_expired() {
        let deadline = Deadline::arm(Some(Duration::from_secs(3600)));
        assert!(deadline.is_armed());
        assert!(!deadline.is_expired());
    }
}
