use std::path::PathBuf;
use std::time::Duration;

use super::run_id::new_run_id;

/// Case identifier used when none is given.
pub const DEFAULT_CASE_ID: &str = "probe.tcp";

/// Per-attempt dial timeout used when none is given.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// A duration from a seconds value. Negative, non-finite and out of range
/// values give zero, which [`ProbeParams::normalized`] treats as unset.
pub fn duration_from_secs(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
}

/// Concurrency from a signed value; anything below one normalizes to one.
pub fn concurrency_from(value: i64) -> usize {
    usize::try_from(value).unwrap_or(0)
}

/// Retry count from a signed value, clamped to `0..=u32::MAX`.
pub fn retries_from(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

/// Settings shared by every probe of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeParams {
    /// Generated by [`ProbeParams::normalized`] when empty.
    pub run_id: String,
    pub case_id: String,
    /// Bound on each individual dial attempt.
    pub timeout: Duration,
    /// Maximum number of targets probed at the same time.
    pub concurrency: usize,
    /// Extra attempts after a transient failure.
    pub retries: u32,
    /// Root directory for per-target records. `None` disables persistence.
    pub record_dir: Option<PathBuf>,
}

impl ProbeParams {
    /// Fills in defaults for unset values.
    pub fn normalized(mut self) -> Self {
        if self.run_id.is_empty() {
            self.run_id = new_run_id();
        }
        if self.case_id.is_empty() {
            self.case_id = DEFAULT_CASE_ID.to_string();
        }
        if self.timeout.is_zero() {
            self.timeout = DEFAULT_TIMEOUT;
        }
        if self.concurrency == 0 {
            self.concurrency = 1;
        }
        if self
            .record_dir
            .as_ref()
            .is_some_and(|dir| dir.as_os_str().is_empty())
        {
            self.record_dir = None;
        }
        self
    }
}

/// A resolved probe destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    /// Stable identifier, also used as the record file name.
    pub id: String,
    /// The input the target was resolved from.
    pub raw: String,
    /// `host:port` to dial.
    pub endpoint: String,
}

impl ProbeTarget {
    pub fn new(id: impl Into<String>, raw: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            raw: raw.into(),
            endpoint: endpoint.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_fills_defaults() {
        let params = ProbeParams {
            record_dir: Some(PathBuf::new()),
            ..Default::default()
        }
        .normalized();

        assert!(!params.run_id.is_empty());
        assert_eq!(params.case_id, DEFAULT_CASE_ID);
        assert_eq!(params.timeout, DEFAULT_TIMEOUT);
        assert_eq!(params.concurrency, 1);
        assert_eq!(params.retries, 0);
        assert_eq!(params.record_dir, None);
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let params = ProbeParams {
            timeout: duration_from_secs(-1.0),
            concurrency: concurrency_from(-4),
            retries: retries_from(-2),
            ..Default::default()
        }
        .normalized();

        assert_eq!(params.timeout, DEFAULT_TIMEOUT);
        assert_eq!(params.concurrency, 1);
        assert_eq!(params.retries, 0);

        assert_eq!(duration_from_secs(f64::NAN), Duration::ZERO);
        assert_eq!(duration_from_secs(f64::INFINITY), Duration::ZERO);
        assert_eq!(duration_from_secs(0.25), Duration::from_millis(250));
        assert_eq!(concurrency_from(16), 16);
        assert_eq!(retries_from(i64::MAX), u32::MAX);
    }

    #[test]
    fn test_normalized_keeps_explicit_values() {
        let params = ProbeParams {
            run_id: "run".to_string(),
            case_id: "case".to_string(),
            timeout: Duration::from_millis(200),
            concurrency: 8,
            retries: 2,
            record_dir: Some(PathBuf::from("runs")),
        };

        assert_eq!(params.clone().normalized(), params);
    }
}
