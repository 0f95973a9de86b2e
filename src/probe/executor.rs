use std::future::Future;
use std::io;
use std::time::Duration;

use chrono::Utc;
use tokio::net::TcpStream;
use tokio::time::Instant;

use super::classify::{DialFailure, ErrorClass, classify};
use super::params::{ProbeParams, ProbeTarget};
use super::scope::CancelScope;
use crate::record::SessionRecord;

/// Establishes a connection to an endpoint and closes it again.
///
/// [`TcpDialer`] is the implementation used for real runs.
pub trait Dialer: Send + Sync + 'static {
    fn dial(&self, endpoint: &str) -> impl Future<Output = io::Result<()>> + Send;
}

/// Plain TCP connect.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpDialer;

impl Dialer for TcpDialer {
    async fn dial(&self, endpoint: &str) -> io::Result<()> {
        // Only reachability is measured; the stream is dropped straight away.
        let _stream = TcpStream::connect(endpoint).await?;
        Ok(())
    }
}

/// One dial attempt, bounded by `timeout` and by the run scope.
async fn dial_once<D: Dialer>(
    scope: &CancelScope,
    timeout: Duration,
    endpoint: &str,
    dialer: &D,
) -> Result<(), DialFailure> {
    let deadline = scope.attempt_deadline(timeout);
    tokio::select! {
        biased;
        cause = scope.done() => Err(DialFailure::Interrupted {
            endpoint: endpoint.to_string(),
            cause,
        }),
        outcome = tokio::time::timeout_at(deadline, dialer.dial(endpoint)) => match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(DialFailure::Io {
                endpoint: endpoint.to_string(),
                source,
            }),
            Err(_) => Err(DialFailure::TimedOut {
                endpoint: endpoint.to_string(),
            }),
        },
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Probes a single target and returns its terminal record.
///
/// Makes at most `params.retries + 1` dial attempts. Only `dial_error` and
/// `timeout` failures are retried, and never once the run scope has ended.
/// The first successful connection ends the sequence. Latency covers the
/// whole sequence.
pub async fn probe_one<D: Dialer>(
    scope: &CancelScope,
    params: &ProbeParams,
    target: &ProbeTarget,
    dialer: &D,
) -> SessionRecord {
    let started = Instant::now();
    let mut record = SessionRecord::begin(params, target, Utc::now());

    let mut last_failure: Option<DialFailure> = None;
    let mut last_class = ErrorClass::LocalError;

    for attempt in 0..=params.retries {
        record.dial_start = Utc::now();
        let outcome = dial_once(scope, params.timeout, &target.endpoint, dialer).await;
        record.dial_end = Utc::now();

        match outcome {
            Ok(()) => {
                record.end_time = Utc::now();
                record.latency_ms = elapsed_ms(started);
                record.ok = true;
                record.error_class = ErrorClass::Ok;
                record.error.clear();
                return record;
            }
            Err(failure) => {
                let class = classify(Some(&failure), scope);
                log::debug!(
                    "{} attempt {}/{} failed ({}): {}",
                    target.id,
                    attempt + 1,
                    params.retries.saturating_add(1),
                    class,
                    failure
                );
                last_failure = Some(failure);
                last_class = class;
                if !class.is_retryable() || scope.is_done() {
                    break;
                }
            }
        }
    }

    record.end_time = Utc::now();
    record.latency_ms = elapsed_ms(started);
    record.ok = false;
    record.error_class = last_class;
    record.error = match last_failure {
        Some(failure) => failure.to_string(),
        None => "no dial attempted".to_string(),
    };
    record
}
