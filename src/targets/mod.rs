//! Target descriptors: plain `host:port` endpoints and peer-to-peer node
//! descriptors, resolved to the TCP endpoint the prober dials.

pub mod endpoint;
pub mod input;
pub mod node;

use thiserror::Error;

use crate::probe::{ErrorClass, ProbeParams, ProbeTarget};
use crate::record::{SessionRecord, safe_path_component};

pub use endpoint::parse_endpoint;
pub use input::{read_target_lines, split_targets};
pub use node::{Node, NodeRecordError, parse_node};

#[derive(Debug, Error)]
pub enum TargetError {
    #[error("invalid endpoint {0:?}")]
    InvalidEndpoint(String),

    #[error("invalid enode URL {input:?}: {reason}")]
    InvalidEnode { input: String, reason: String },

    #[error("invalid record {input:?}: {source}")]
    InvalidRecord {
        input: String,
        #[source]
        source: NodeRecordError,
    },

    #[error("node has no TCP endpoint")]
    NoTcpEndpoint,
}

/// A parsed target descriptor.
#[derive(Debug, Clone)]
pub struct Target {
    pub raw: String,
    /// Present for node descriptors, absent for plain endpoints.
    pub node: Option<Node>,
    pub target_id: String,
    /// Empty when the descriptor advertises no TCP endpoint.
    pub tcp_endpoint: String,
    pub udp_endpoint: String,
}

impl Target {
    /// The node's canonical descriptor, or an empty string for plain endpoints.
    pub fn node_string(&self) -> String {
        self.node.as_ref().map(Node::to_string).unwrap_or_default()
    }

    /// The target as handed to the prober, if it has something to dial.
    pub fn probe_target(&self) -> Option<ProbeTarget> {
        if self.tcp_endpoint.is_empty() {
            return None;
        }
        Some(ProbeTarget::new(
            &self.target_id,
            &self.raw,
            &self.tcp_endpoint,
        ))
    }
}

/// Parses a node descriptor (`enode://` URL or node record).
pub fn parse(input: &str) -> Result<Target, TargetError> {
    let node = parse_node(input)?;
    Ok(Target {
        raw: input.to_string(),
        target_id: format!("node_{}", node.id_hex()),
        tcp_endpoint: node
            .tcp_endpoint()
            .map(|addr| addr.to_string())
            .unwrap_or_default(),
        udp_endpoint: node
            .udp_endpoint()
            .map(|addr| addr.to_string())
            .unwrap_or_default(),
        node: Some(node),
    })
}

/// Parses a `host:port` endpoint, falling back to a node descriptor.
pub fn parse_any(input: &str) -> Result<Target, TargetError> {
    if let Ok(endpoint) = parse_endpoint(input) {
        return Ok(Target {
            raw: input.to_string(),
            node: None,
            target_id: format!("tcp_{}", safe_path_component(&endpoint)),
            tcp_endpoint: endpoint,
            udp_endpoint: String::new(),
        });
    }
    parse(input)
}

/// Resolves `input` straight to the TCP endpoint to dial.
pub fn resolve_tcp_endpoint(input: &str) -> Result<String, TargetError> {
    if let Ok(endpoint) = parse_endpoint(input) {
        return Ok(endpoint);
    }
    let target = parse(input)?;
    if target.tcp_endpoint.is_empty() {
        return Err(TargetError::NoTcpEndpoint);
    }
    Ok(target.tcp_endpoint)
}

/// Resolves every input, separating dialable targets from inputs that can
/// never be dialed.
///
/// Unparseable inputs get the target id `local_<input>`; nodes that advertise
/// no TCP endpoint keep their node id. Both become `local_error` records for
/// the run described by `params`, which should already be normalized.
pub fn split_resolved<S: AsRef<str>>(
    inputs: &[S],
    params: &ProbeParams,
) -> (Vec<ProbeTarget>, Vec<SessionRecord>) {
    let mut dialable = Vec::with_capacity(inputs.len());
    let mut failures = Vec::new();

    for raw in inputs.iter().map(AsRef::as_ref) {
        let (target, message) = match parse_any(raw) {
            Ok(target) => match target.probe_target() {
                Some(probe_target) => {
                    dialable.push(probe_target);
                    continue;
                }
                None => (
                    ProbeTarget::new(&target.target_id, raw, ""),
                    TargetError::NoTcpEndpoint.to_string(),
                ),
            },
            Err(err) => (
                ProbeTarget::new(format!("local_{}", safe_path_component(raw)), raw, ""),
                err.to_string(),
            ),
        };
        log::debug!("{}: not dialable: {}", target.id, message);
        failures.push(SessionRecord::local_failure(
            &params.run_id,
            &params.case_id,
            &target,
            ErrorClass::LocalError,
            message,
        ));
    }

    (dialable, failures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::targets::node::tests::{EXAMPLE_ENR, EXAMPLE_NODE_ID, EXAMPLE_PUBKEY};

    #[test]
    fn test_parse_any_endpoint() {
        let target = parse_any("127.0.0.1:30303").expect("endpoint");
        assert_eq!(target.target_id, "tcp_127.0.0.1_30303");
        assert_eq!(target.tcp_endpoint, "127.0.0.1:30303");
        assert!(target.node.is_none());
        assert_eq!(target.node_string(), "");

        let probe = target.probe_target().expect("dialable");
        assert_eq!(probe.id, "tcp_127.0.0.1_30303");
        assert_eq!(probe.raw, "127.0.0.1:30303");
    }

    #[test]
    fn test_parse_any_enode() {
        let url = format!("enode://{EXAMPLE_PUBKEY}@10.0.0.7:30303");
        let target = parse_any(&url).expect("enode");

        assert_eq!(target.target_id, format!("node_{EXAMPLE_NODE_ID}"));
        assert_eq!(target.tcp_endpoint, "10.0.0.7:30303");
        assert_eq!(target.udp_endpoint, "10.0.0.7:30303");
        assert_eq!(target.node_string(), url);
    }

    #[test]
    fn test_record_without_tcp_port() {
        let target = parse_any(EXAMPLE_ENR).expect("record");
        assert_eq!(target.target_id, format!("node_{EXAMPLE_NODE_ID}"));
        assert_eq!(target.tcp_endpoint, "");
        assert_eq!(target.udp_endpoint, "127.0.0.1:30303");
        assert!(target.probe_target().is_none());

        assert!(matches!(
            resolve_tcp_endpoint(EXAMPLE_ENR),
            Err(TargetError::NoTcpEndpoint)
        ));
        assert_eq!(
            TargetError::NoTcpEndpoint.to_string(),
            "node has no TCP endpoint"
        );
    }

    #[test]
    fn test_split_resolved() {
        let params = ProbeParams {
            run_id: "run".to_string(),
            ..Default::default()
        }
        .normalized();
        let inputs = ["10.0.0.1:30303", "garbage", EXAMPLE_ENR];

        let (dialable, failures) = split_resolved(&inputs, &params);

        assert_eq!(dialable.len(), 1);
        assert_eq!(dialable[0].id, "tcp_10.0.0.1_30303");
        assert_eq!(failures.len(), 2);

        let garbage = &failures[0];
        assert_eq!(garbage.target_id, "local_garbage");
        assert_eq!(garbage.target_raw, "garbage");
        assert_eq!(garbage.endpoint, "");
        assert_eq!(garbage.error_class, ErrorClass::LocalError);
        assert!(!garbage.ok);
        assert!(!garbage.error.is_empty());
        assert_eq!(garbage.latency_ms, 0);

        let no_tcp = &failures[1];
        assert_eq!(no_tcp.target_id, format!("node_{EXAMPLE_NODE_ID}"));
        assert_eq!(no_tcp.error, "node has no TCP endpoint");
        assert_eq!(no_tcp.error_class, ErrorClass::LocalError);
        assert_eq!(no_tcp.run_id, "run");
        assert_eq!(no_tcp.case_id, "probe.tcp");
        assert_eq!(no_tcp.start_time, no_tcp.end_time);
    }

    #[test]
    fn test_unparseable_input_id_is_sanitized() {
        let params = ProbeParams::default().normalized();
        let (dialable, failures) = split_resolved(&["not a/target"], &params);

        assert!(dialable.is_empty());
        assert_eq!(failures[0].target_id, "local_not_a_target");
    }

    #[test]
    fn test_resolve_tcp_endpoint() {
        assert_eq!(resolve_tcp_endpoint("[::1]:30303").expect("v6"), "[::1]:30303");
        let url = format!("enode://{EXAMPLE_PUBKEY}@10.0.0.7:30311");
        assert_eq!(resolve_tcp_endpoint(&url).expect("enode"), "10.0.0.7:30311");
        assert!(resolve_tcp_endpoint("garbage").is_err());
    }
}
