//! Concurrent TCP reachability probing of peer-to-peer nodes.
//!
//! Targets are plain `host:port` endpoints or node descriptors (`enode://`
//! URLs and signed node records). Each target of a run yields exactly one
//! [`record::SessionRecord`], optionally persisted as JSON under
//! `<record_dir>/<run_id>/<case_id>/<target_id>.json`.

pub mod config;
pub mod output;
pub mod probe;
pub mod record;
pub mod targets;
