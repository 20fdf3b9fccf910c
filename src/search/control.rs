//! Cancellation and deadlines for walks and single reads.

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::secrets::{Result, SecretsError};

/// Governs one top-level walk or one lazy read: a cancellation token plus an
/// optional absolute deadline.
///
/// Cloning shares the token, so cancelling any clone stops them all.
#[derive(Debug, Clone)]
pub struct WalkControl {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Default for WalkControl {
    fn default() -> Self {
        Self::new()
    }
}

impl WalkControl {
    /// No deadline, fresh token.
    pub fn new() -> Self {
        Self { token: CancellationToken::new(), deadline: None }
    }

    /// Deadline `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { token: CancellationToken::new(), deadline: Some(Instant::now() + timeout) }
    }

    /// Use an externally owned token (e.g. one cancelled when the consumer goes away).
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// A control for a sub-operation: cancelled with this one, and bounded by
    /// whichever deadline comes first.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let own = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(parent) if parent < own => parent,
            _ => own,
        };
        Self { token: self.token.child_token(), deadline: Some(deadline) }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fails with the matching error kind once cancelled or past the deadline.
    pub fn checkpoint(&self) -> Result<()> {
        if self.token.is_cancelled() {
            return Err(SecretsError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(SecretsError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Runs a remote call, abandoning it as soon as the control fires.
    pub async fn guard<T, F>(&self, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.checkpoint()?;
        let expired = async {
            match self.deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(SecretsError::Cancelled),
            _ = expired => Err(SecretsError::DeadlineExceeded),
            result = call => result,
        }
    }
}
