use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::probe::{ErrorClass, ProbeParams, ProbeTarget};

/// The terminal outcome of probing one target.
///
/// One record is produced per target per run. It is built by the executor (or
/// synthesized by the scheduler when the run ends before the target gets a
/// slot) and is never modified after it has been handed to the record store
/// or the result callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub run_id: String,
    pub case_id: String,
    pub target_id: String,
    pub target_raw: String,
    pub endpoint: String,

    #[serde(with = "rfc3339_nanos")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "rfc3339_nanos")]
    pub dial_start: DateTime<Utc>,
    #[serde(with = "rfc3339_nanos")]
    pub dial_end: DateTime<Utc>,
    #[serde(with = "rfc3339_nanos")]
    pub end_time: DateTime<Utc>,

    /// Wall-clock time from `start_time` to `end_time`, across all attempts.
    pub latency_ms: u64,
    pub ok: bool,
    pub error_class: ErrorClass,

    /// Failure message, omitted on success.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl SessionRecord {
    /// Starts a record for `target`, optimistically classified `ok`.
    ///
    /// All four timestamps are set to `now`; the executor moves them forward
    /// as the attempt sequence progresses.
    pub fn begin(params: &ProbeParams, target: &ProbeTarget, now: DateTime<Utc>) -> Self {
        Self {
            run_id: params.run_id.clone(),
            case_id: params.case_id.clone(),
            target_id: target.id.clone(),
            target_raw: target.raw.clone(),
            endpoint: target.endpoint.clone(),
            start_time: now,
            dial_start: now,
            dial_end: now,
            end_time: now,
            latency_ms: 0,
            ok: false,
            error_class: ErrorClass::Ok,
            error: String::new(),
        }
    }

    /// A failure record for a target that was never dialed.
    ///
    /// Every timestamp collapses to the same instant and latency is zero.
    pub fn local_failure(
        run_id: &str,
        case_id: &str,
        target: &ProbeTarget,
        class: ErrorClass,
        message: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            run_id: run_id.to_string(),
            case_id: case_id.to_string(),
            target_id: target.id.clone(),
            target_raw: target.raw.clone(),
            endpoint: target.endpoint.clone(),
            start_time: now,
            dial_start: now,
            dial_end: now,
            end_time: now,
            latency_ms: 0,
            ok: false,
            error_class: class,
            error: message.into(),
        }
    }
}

/// Serde helper for RFC3339 timestamps with nanosecond precision in UTC.
mod rfc3339_nanos {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Nanos, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
