use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum DeadlineError {
    #[error("deadline exceeded")]
    Expired,

    #[error("invocation cancelled")]
    Cancelled,
}

/// Bound on how long one handler invocation may run.
///
/// Checked cooperatively: by every accessor call, and on every traced line
/// when the bridge installs its trace hook.
#[derive(Debug, Clone, Default)]
pub struct Deadline {
    expires_at: Option<Instant>,
    cancel: Option<CancellationToken>,
}

impl Deadline {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn after(timeout: Duration) -> Self {
        Self::at(Instant::now() + timeout)
    }

    pub fn at(expires_at: Instant) -> Self {
        Self {
            expires_at: Some(expires_at),
            cancel: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Whether this deadline can ever fire.
    pub fn is_bounded(&self) -> bool {
        self.expires_at.is_some() || self.cancel.is_some()
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    pub fn check(&self) -> Result<(), DeadlineError> {
        if let Some(token) = &self.cancel {
            if token.is_cancelled() {
                return Err(DeadlineError::Cancelled);
            }
        }
        match self.expires_at {
            Some(at) if Instant::now() >= at => Err(DeadlineError::Expired),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_never_fires() {
        let deadline = Deadline::none();
        assert!(!deadline.is_bounded());
        assert_eq!(deadline.check(), Ok(()));
        assert_eq!(deadline.remaining(), None);
    }

    #[test]
    fn expires_after_instant() {
        let deadline = Deadline::at(Instant::now() - Duration::from_millis(1));
        assert!(deadline.is_bounded());
        assert_eq!(deadline.check(), Err(DeadlineError::Expired));
        assert_eq!(deadline.remaining(), Some(Duration::ZERO));

        let deadline = Deadline::after(Duration::from_secs(60));
        assert_eq!(deadline.check(), Ok(()));
    }

    #[test]
    fn cancellation_fires_immediately() {
        let token = CancellationToken::new();
        let deadline = Deadline::after(Duration::from_secs(60)).with_cancellation(token.clone());
        assert_eq!(deadline.check(), Ok(()));
        token.cancel();
        assert_eq!(deadline.check(), Err(DeadlineError::Cancelled));

        let deadline = Deadline::none().with_cancellation(CancellationToken::new());
        assert!(deadline.is_bounded());
    }
}
