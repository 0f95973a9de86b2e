pub mod classify;
pub mod executor;
pub mod params;
pub mod run_id;
pub mod scheduler;
pub mod scope;

pub use classify::{DialFailure, ErrorClass, classify};
pub use executor::{Dialer, TcpDialer, probe_one};
pub use params::{
    DEFAULT_CASE_ID, DEFAULT_TIMEOUT, ProbeParams, ProbeTarget, concurrency_from, duration_from_secs,
    retries_from,
};
pub use run_id::new_run_id;
pub use scheduler::{ProbeError, run_tcp_probe, run_tcp_probe_with};
pub use scope::{CancelCause, CancelScope};

pub mod prelude {
    pub use super::{
        CancelCause, CancelScope, ErrorClass, ProbeParams, ProbeTarget, new_run_id, run_tcp_probe,
    };
    pub use crate::record::{SessionRecord, safe_path_component, write_tcp_record};
}
