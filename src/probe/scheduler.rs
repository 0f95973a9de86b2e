use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::classify::ErrorClass;
use super::executor::{Dialer, TcpDialer, probe_one};
use super::params::{ProbeParams, ProbeTarget};
use super::scope::CancelScope;
use crate::record::{SessionRecord, write_tcp_record};

/// Run setup failures. Individual probe failures are reported in their records.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("concurrency {requested} exceeds the supported maximum of {max}")]
    ConcurrencyTooLarge { requested: usize, max: usize },
}

/// Probes every target over plain TCP.
///
/// See [`run_tcp_probe_with`].
pub async fn run_tcp_probe<F>(
    scope: &CancelScope,
    params: ProbeParams,
    targets: Vec<ProbeTarget>,
    on_result: F,
) -> Result<(), ProbeError>
where
    F: Fn(SessionRecord) + Send + Sync + 'static,
{
    run_tcp_probe_with(scope, params, targets, TcpDialer, on_result).await
}

/// Probes every target, at most `params.concurrency` at a time.
///
/// Each target runs in its own task and waits for a slot on the run's gate.
/// A target still waiting when `scope` ends is never dialed; it gets a
/// zero-latency record classified from the scope's cause. Every record is
/// written to `params.record_dir` (when set) and then passed to `on_result`,
/// exactly once per target and in completion order. `on_result` may be
/// called from several tasks at once.
///
/// Returns once every target has been delivered.
pub async fn run_tcp_probe_with<D, F>(
    scope: &CancelScope,
    params: ProbeParams,
    targets: Vec<ProbeTarget>,
    dialer: D,
    on_result: F,
) -> Result<(), ProbeError>
where
    D: Dialer,
    F: Fn(SessionRecord) + Send + Sync + 'static,
{
    let params = params.normalized();
    if params.concurrency > Semaphore::MAX_PERMITS {
        return Err(ProbeError::ConcurrencyTooLarge {
            requested: params.concurrency,
            max: Semaphore::MAX_PERMITS,
        });
    }

    log::info!(
        "run {} case {}: probing {} targets (concurrency {}, retries {}, timeout {:?})",
        params.run_id,
        params.case_id,
        targets.len(),
        params.concurrency,
        params.retries,
        params.timeout
    );

    let gate = Arc::new(Semaphore::new(params.concurrency));
    let params = Arc::new(params);
    let dialer = Arc::new(dialer);
    let on_result = Arc::new(on_result);

    let mut tasks = JoinSet::new();
    for target in targets {
        let scope = scope.clone();
        let params = Arc::clone(&params);
        let gate = Arc::clone(&gate);
        let dialer = Arc::clone(&dialer);
        let on_result = Arc::clone(&on_result);

        tasks.spawn(async move {
            let record = probe_target(&scope, &params, &target, gate, dialer.as_ref()).await;
            persist(&params, &record).await;
            on_result(record);
        });
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(err) = joined {
            log::error!("probe task for run {} failed: {}", params.run_id, err);
        }
    }

    log::info!("run {} case {}: finished", params.run_id, params.case_id);
    Ok(())
}

/// Waits for a gate slot, then probes. The slot is released before the record
/// is persisted or delivered.
async fn probe_target<D: Dialer>(
    scope: &CancelScope,
    params: &ProbeParams,
    target: &ProbeTarget,
    gate: Arc<Semaphore>,
    dialer: &D,
) -> SessionRecord {
    let acquired = tokio::select! {
        biased;
        cause = scope.done() => {
            return SessionRecord::local_failure(
                &params.run_id,
                &params.case_id,
                target,
                cause.error_class(),
                cause.to_string(),
            );
        }
        permit = gate.acquire_owned() => permit,
    };

    let Ok(_permit) = acquired else {
        return SessionRecord::local_failure(
            &params.run_id,
            &params.case_id,
            target,
            ErrorClass::LocalError,
            "concurrency gate closed",
        );
    };

    probe_one(scope, params, target, dialer).await
}

/// Best-effort write of `record`; failures are logged and otherwise ignored.
async fn persist(params: &ProbeParams, record: &SessionRecord) {
    let Some(dir) = params.record_dir.as_deref() else {
        return;
    };
    if let Err(err) =
        write_tcp_record(dir, &params.run_id, &params.case_id, &record.target_id, record).await
    {
        log::warn!("run {}: {}", params.run_id, err);
    }
}
