use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::scope::{CancelCause, CancelScope};

/// Outcome class of a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Ok,
    DialError,
    Timeout,
    /// A connection that was established and then dropped by the peer.
    /// Dial-only probes never produce it.
    RemoteDisconnect,
    LocalError,
}

impl ErrorClass {
    pub const ALL: [ErrorClass; 5] = [
        ErrorClass::Ok,
        ErrorClass::DialError,
        ErrorClass::Timeout,
        ErrorClass::RemoteDisconnect,
        ErrorClass::LocalError,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorClass::Ok => "ok",
            ErrorClass::DialError => "dial_error",
            ErrorClass::Timeout => "timeout",
            ErrorClass::RemoteDisconnect => "remote_disconnect",
            ErrorClass::LocalError => "local_error",
        }
    }

    /// Transient dial-level failures worth another attempt.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorClass::DialError | ErrorClass::Timeout)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a single dial attempt failed.
#[derive(Debug, Error)]
pub enum DialFailure {
    #[error("dial tcp {endpoint}: {source}")]
    Io {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    /// The attempt's own deadline passed before the connection was established.
    #[error("dial tcp {endpoint}: i/o timeout")]
    TimedOut { endpoint: String },

    /// The run scope ended while the attempt was pending.
    #[error("dial tcp {endpoint}: {cause}")]
    Interrupted { endpoint: String, cause: CancelCause },
}

/// Maps a dial outcome to its [`ErrorClass`].
///
/// Conditions are checked in a fixed order: timeouts first (the attempt's own
/// deadline, an expired run deadline, or an I/O error that reports itself as a
/// timeout), then explicit cancellation of the run, then every other
/// connection failure. `None` means the dial succeeded.
pub fn classify(failure: Option<&DialFailure>, scope: &CancelScope) -> ErrorClass {
    let Some(failure) = failure else {
        return ErrorClass::Ok;
    };

    let scope_cause = scope.cause();
    let timed_out = match failure {
        DialFailure::TimedOut { .. } => true,
        DialFailure::Interrupted { cause, .. } => *cause == CancelCause::DeadlineExceeded,
        DialFailure::Io { source, .. } => source.kind() == io::ErrorKind::TimedOut,
    };
    if timed_out || scope_cause == Some(CancelCause::DeadlineExceeded) {
        return ErrorClass::Timeout;
    }

    let canceled = matches!(
        failure,
        DialFailure::Interrupted {
            cause: CancelCause::Canceled,
            ..
        }
    );
    if canceled || scope_cause == Some(CancelCause::Canceled) {
        return ErrorClass::LocalError;
    }

    ErrorClass::DialError
}
