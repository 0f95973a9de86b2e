use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::classify::ErrorClass;

/// Why a [`CancelScope`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelCause {
    /// The run was aborted through [`CancelScope::cancel`].
    Canceled,
    /// The scope's deadline passed.
    DeadlineExceeded,
}

impl CancelCause {
    /// The class given to a target that never got to dial because of this cause.
    pub fn error_class(self) -> ErrorClass {
        match self {
            CancelCause::Canceled => ErrorClass::LocalError,
            CancelCause::DeadlineExceeded => ErrorClass::Timeout,
        }
    }
}

impl fmt::Display for CancelCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelCause::Canceled => write!(f, "run canceled"),
            CancelCause::DeadlineExceeded => write!(f, "run deadline exceeded"),
        }
    }
}

/// The cancellation signal shared by every task of a run.
///
/// Pairs a [`CancellationToken`] with an optional overall deadline. Whichever
/// ends the scope first is recorded as its cause and never changes afterwards.
/// Clones observe the same scope.
#[derive(Debug, Clone)]
pub struct CancelScope {
    token: CancellationToken,
    deadline: Option<Instant>,
    cause: Arc<OnceLock<CancelCause>>,
}

impl Default for CancelScope {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelScope {
    /// A scope that ends only when canceled.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
            cause: Arc::new(OnceLock::new()),
        }
    }

    /// A scope that also ends at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            ..Self::new()
        }
    }

    /// A scope that also ends once `budget` has elapsed from now.
    pub fn with_timeout(budget: Duration) -> Self {
        Self::with_deadline(Instant::now() + budget)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Aborts the run. Has no effect on the cause if the scope already ended,
    /// including a deadline that passed without anyone observing it.
    pub fn cancel(&self) {
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            self.expire();
            return;
        }
        let _ = self.cause.set(CancelCause::Canceled);
        self.token.cancel();
    }

    /// The cause the scope ended with, or `None` while it is still live.
    pub fn cause(&self) -> Option<CancelCause> {
        if let Some(cause) = self.cause.get() {
            return Some(*cause);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(self.expire()),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.cause().is_some()
    }

    /// Resolves once the scope ends.
    pub async fn done(&self) -> CancelCause {
        if let Some(cause) = self.cause() {
            return cause;
        }
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {
                        self.expire();
                    }
                }
            }
            None => self.token.cancelled().await,
        }
        self.cause().unwrap_or(CancelCause::Canceled)
    }

    /// The deadline for one dial attempt: `timeout` from now, or the scope's
    /// own deadline when that comes first.
    pub fn attempt_deadline(&self, timeout: Duration) -> Instant {
        let own = Instant::now() + timeout;
        match self.deadline {
            Some(deadline) => own.min(deadline),
            None => own,
        }
    }

    fn expire(&self) -> CancelCause {
        let _ = self.cause.set(CancelCause::DeadlineExceeded);
        self.token.cancel();
        self.cause
            .get()
            .copied()
            .unwrap_or(CancelCause::DeadlineExceeded)
    }
}
