//! Node descriptors: `enode://` URLs and signed node records (ENR, v4 identity
//! scheme).

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use k256::PublicKey;
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{Signature, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rlp::{DecoderError, Rlp, RlpStream};
use sha3::{Digest, Keccak256};
use thiserror::Error;

use super::TargetError;
use super::endpoint::join_host_port;

/// Maximum encoded size of a node record.
pub const MAX_RECORD_SIZE: usize = 300;

const ENODE_PREFIX: &str = "enode://";
const ENR_PREFIX: &str = "enr:";

#[derive(Debug, Error)]
pub enum NodeRecordError {
    #[error("record larger than 300 bytes")]
    TooLarge,
    #[error("malformed RLP: {0}")]
    Rlp(#[from] DecoderError),
    #[error("record is not an RLP list")]
    NotAList,
    #[error("trailing bytes after record")]
    TrailingBytes,
    #[error("record has no signature or sequence number")]
    Truncated,
    #[error("odd number of key/value elements")]
    OddKeyValue,
    #[error("record keys are not sorted or contain duplicates")]
    KeysNotSorted,
    #[error("unknown identity scheme {0:?}")]
    UnknownScheme(String),
    #[error("missing secp256k1 public key")]
    MissingPublicKey,
    #[error("invalid secp256k1 public key")]
    InvalidPublicKey,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid {key} entry")]
    InvalidEntry { key: &'static str },
}

/// A peer identity with its advertised endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// keccak256 of the uncompressed public key.
    pub id: [u8; 32],
    pub public_key: PublicKey,
    pub seq: u64,
    pub ip: Option<Ipv4Addr>,
    pub ip6: Option<Ipv6Addr>,
    pub tcp: Option<u16>,
    pub udp: Option<u16>,
    pub tcp6: Option<u16>,
    pub udp6: Option<u16>,
    descriptor: String,
}

impl Node {
    fn new(public_key: PublicKey, descriptor: String) -> Self {
        Self {
            id: node_id(&public_key),
            public_key,
            seq: 0,
            ip: None,
            ip6: None,
            tcp: None,
            udp: None,
            tcp6: None,
            udp6: None,
            descriptor,
        }
    }

    pub fn id_hex(&self) -> String {
        hex::encode(self.id)
    }

    /// The TCP endpoint, preferring IPv4.
    pub fn tcp_endpoint(&self) -> Option<SocketAddr> {
        endpoint(self.ip, self.tcp, self.ip6, self.tcp6.or(self.tcp))
    }

    /// The UDP (discovery) endpoint, preferring IPv4.
    pub fn udp_endpoint(&self) -> Option<SocketAddr> {
        endpoint(self.ip, self.udp, self.ip6, self.udp6.or(self.udp))
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.descriptor)
    }
}

fn endpoint(
    ip: Option<Ipv4Addr>,
    port: Option<u16>,
    ip6: Option<Ipv6Addr>,
    port6: Option<u16>,
) -> Option<SocketAddr> {
    let nonzero = |port: Option<u16>| port.filter(|p| *p != 0);
    if let (Some(ip), Some(port)) = (ip, nonzero(port)) {
        return Some(SocketAddr::new(IpAddr::V4(ip), port));
    }
    if let (Some(ip6), Some(port)) = (ip6, nonzero(port6)) {
        return Some(SocketAddr::new(IpAddr::V6(ip6), port));
    }
    None
}

fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

fn node_id(public_key: &PublicKey) -> [u8; 32] {
    let point = public_key.to_encoded_point(false);
    keccak256(&point.as_bytes()[1..])
}

/// Parses an `enode://` URL or a node record.
pub fn parse_node(input: &str) -> Result<Node, TargetError> {
    if input.starts_with(ENODE_PREFIX) {
        parse_enode_url(input)
    } else {
        parse_record(input)
    }
}

/// Parses `enode://<hex public key>[@<ip>:<tcp port>[?discport=<udp port>]]`.
///
/// Without the `@` part the node has no endpoints.
pub fn parse_enode_url(input: &str) -> Result<Node, TargetError> {
    let invalid = |reason: &str| TargetError::InvalidEnode {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    let rest = input
        .strip_prefix(ENODE_PREFIX)
        .ok_or_else(|| invalid("missing enode:// scheme"))?;
    let (key_hex, location) = match rest.split_once('@') {
        Some((key, location)) => (key, Some(location)),
        None => (rest, None),
    };

    let key_bytes = hex::decode(key_hex).map_err(|_| invalid("invalid public key"))?;
    if key_bytes.len() != 64 {
        return Err(invalid("invalid public key"));
    }
    let mut sec1 = Vec::with_capacity(65);
    sec1.push(0x04);
    sec1.extend_from_slice(&key_bytes);
    let public_key =
        PublicKey::from_sec1_bytes(&sec1).map_err(|_| invalid("invalid public key"))?;

    let Some(location) = location else {
        return Ok(Node::new(public_key, format!("{ENODE_PREFIX}{key_hex}")));
    };

    let (host_port, query) = match location.split_once('?') {
        Some((host_port, query)) => (host_port, Some(query)),
        None => (location, None),
    };
    let (host, port) = host_port
        .rsplit_once(':')
        .ok_or_else(|| invalid("missing port"))?;
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    let ip: IpAddr = host.parse().map_err(|_| invalid("invalid IP address"))?;
    let tcp: u16 = port.parse().map_err(|_| invalid("invalid port"))?;

    let mut udp = tcp;
    if let Some(query) = query {
        for pair in query.split('&') {
            if let Some(value) = pair.strip_prefix("discport=") {
                udp = value.parse().map_err(|_| invalid("invalid discport in query"))?;
            }
        }
    }

    let key_hex = hex::encode(&key_bytes);
    let mut descriptor = format!(
        "{ENODE_PREFIX}{key_hex}@{}",
        join_host_port(&ip.to_string(), tcp)
    );
    if udp != tcp {
        descriptor.push_str(&format!("?discport={udp}"));
    }

    let mut node = Node::new(public_key, descriptor);
    match ip {
        IpAddr::V4(v4) => {
            node.ip = Some(v4);
            node.tcp = Some(tcp);
            node.udp = Some(udp);
        }
        IpAddr::V6(v6) => {
            node.ip6 = Some(v6);
            node.tcp6 = Some(tcp);
            node.udp6 = Some(udp);
        }
    }
    Ok(node)
}

/// Parses a node record given as hex (optionally `0x`-prefixed) or as
/// `enr:`-prefixed unpadded URL-safe base64.
pub fn parse_record(input: &str) -> Result<Node, TargetError> {
    let text = input.trim();
    let bytes = decode_hex(text)
        .or_else(|| decode_base64(text))
        .unwrap_or_else(|| text.as_bytes().to_vec());

    decode_record(&bytes).map_err(|source| TargetError::InvalidRecord {
        input: input.to_string(),
        source,
    })
}

fn decode_hex(text: &str) -> Option<Vec<u8>> {
    hex::decode(text.strip_prefix("0x").unwrap_or(text)).ok()
}

fn decode_base64(text: &str) -> Option<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(text.strip_prefix(ENR_PREFIX).unwrap_or(text))
        .ok()
}

fn port_entry(item: &Rlp<'_>, key: &'static str) -> Result<u16, NodeRecordError> {
    let value: u64 = item
        .as_val()
        .map_err(|_| NodeRecordError::InvalidEntry { key })?;
    u16::try_from(value).map_err(|_| NodeRecordError::InvalidEntry { key })
}

/// Decodes and verifies a binary node record.
pub fn decode_record(bytes: &[u8]) -> Result<Node, NodeRecordError> {
    if bytes.len() > MAX_RECORD_SIZE {
        return Err(NodeRecordError::TooLarge);
    }
    let rlp = Rlp::new(bytes);
    if rlp.payload_info()?.total() != bytes.len() {
        return Err(NodeRecordError::TrailingBytes);
    }
    if !rlp.is_list() {
        return Err(NodeRecordError::NotAList);
    }
    let count = rlp.item_count()?;
    if count < 2 {
        return Err(NodeRecordError::Truncated);
    }
    if count % 2 != 0 {
        return Err(NodeRecordError::OddKeyValue);
    }
    let signature = rlp.at(0)?.data()?;
    let seq: u64 = rlp.at(1)?.as_val()?;

    let mut scheme: Option<&[u8]> = None;
    let mut key_bytes: Option<&[u8]> = None;
    let mut ip = None;
    let mut ip6 = None;
    let mut ports = [None; 4];
    let mut previous: Option<&[u8]> = None;

    for index in (2..count).step_by(2) {
        let key = rlp.at(index)?.data()?;
        if previous.is_some_and(|prev| prev >= key) {
            return Err(NodeRecordError::KeysNotSorted);
        }
        previous = Some(key);

        let value = rlp.at(index + 1)?;
        match key {
            b"id" => scheme = Some(value.data()?),
            b"secp256k1" => key_bytes = Some(value.data()?),
            b"ip" => {
                let octets: [u8; 4] = value
                    .data()?
                    .try_into()
                    .map_err(|_| NodeRecordError::InvalidEntry { key: "ip" })?;
                ip = Some(Ipv4Addr::from(octets));
            }
            b"ip6" => {
                let octets: [u8; 16] = value
                    .data()?
                    .try_into()
                    .map_err(|_| NodeRecordError::InvalidEntry { key: "ip6" })?;
                ip6 = Some(Ipv6Addr::from(octets));
            }
            b"tcp" => ports[0] = Some(port_entry(&value, "tcp")?),
            b"udp" => ports[1] = Some(port_entry(&value, "udp")?),
            b"tcp6" => ports[2] = Some(port_entry(&value, "tcp6")?),
            b"udp6" => ports[3] = Some(port_entry(&value, "udp6")?),
            _ => {}
        }
    }

    match scheme {
        Some(b"v4") => {}
        Some(other) => {
            return Err(NodeRecordError::UnknownScheme(
                String::from_utf8_lossy(other).into_owned(),
            ));
        }
        None => return Err(NodeRecordError::UnknownScheme(String::new())),
    }

    let key_bytes = key_bytes.ok_or(NodeRecordError::MissingPublicKey)?;
    if key_bytes.len() != 33 {
        return Err(NodeRecordError::InvalidPublicKey);
    }
    let public_key =
        PublicKey::from_sec1_bytes(key_bytes).map_err(|_| NodeRecordError::InvalidPublicKey)?;

    // The signature covers rlp([seq, k1, v1, ...]).
    let mut content = RlpStream::new_list(count - 1);
    for index in 1..count {
        content.append_raw(rlp.at(index)?.as_raw(), 1);
    }
    let signature =
        Signature::from_slice(signature).map_err(|_| NodeRecordError::InvalidSignature)?;
    VerifyingKey::from(&public_key)
        .verify_prehash(&keccak256(content.as_raw()), &signature)
        .map_err(|_| NodeRecordError::InvalidSignature)?;

    let mut node = Node::new(
        public_key,
        format!("{ENR_PREFIX}{}", URL_SAFE_NO_PAD.encode(bytes)),
    );
    node.seq = seq;
    node.ip = ip;
    node.ip6 = ip6;
    [node.tcp, node.udp, node.tcp6, node.udp6] = ports;
    Ok(node)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Example record from EIP-778.
    pub(crate) const EXAMPLE_ENR: &str = "enr:-IS4QHCYrYZbAKWCBRlAy5zzaDZXJBGkcnh4MHcBFZntXNFrdvJjX04jRzjzCBOonrkTfj499SZuOh8R33Ls8RRcy5wBgmlkgnY0gmlwhH8AAAGJc2VjcDI1NmsxoQPKY0yuDUmstAHYpMa2_oxVtw0RW_QAdpzBQA8yWM0xOIN1ZHCCdl8";
    pub(crate) const EXAMPLE_NODE_ID: &str =
        "a448f24c6d18e575453db13171562b71999873db5b286df957af199ec94617f7";
    /// Uncompressed public key of the EIP-778 example record.
    pub(crate) const EXAMPLE_PUBKEY: &str = "ca634cae0d49acb401d8a4c6b6fe8c55b70d115bf400769cc1400f3258cd31387574077f301b421bc84df7266c44e9e6d569fc56be00812904767bf5ccd1fc7f";

    #[test]
    fn test_example_record() {
        let node = parse_record(EXAMPLE_ENR).expect("valid record");

        assert_eq!(node.id_hex(), EXAMPLE_NODE_ID);
        assert_eq!(node.seq, 1);
        assert_eq!(node.ip, Some(Ipv4Addr::new(127, 0, 0, 1)));
        assert_eq!(node.udp, Some(30303));
        assert_eq!(node.tcp, None);
        assert_eq!(node.tcp_endpoint(), None);
        assert_eq!(
            node.udp_endpoint(),
            Some("127.0.0.1:30303".parse().expect("addr"))
        );
        assert_eq!(node.to_string(), EXAMPLE_ENR);
    }

    #[test]
    fn test_hex_record_matches_base64() {
        let bytes = decode_base64(EXAMPLE_ENR).expect("base64");
        let from_hex = parse_record(&format!("0x{}", hex::encode(&bytes))).expect("hex record");
        assert_eq!(from_hex.id_hex(), EXAMPLE_NODE_ID);
    }

    #[test]
    fn test_tampered_record_fails_signature() {
        let bytes = decode_base64(EXAMPLE_ENR).expect("base64");
        let tampered = hex::encode(&bytes).replace("847f000001", "847f000002");
        let err = parse_record(&tampered).expect_err("signature must not verify");
        assert!(matches!(
            err,
            TargetError::InvalidRecord {
                source: NodeRecordError::InvalidSignature,
                ..
            }
        ));
    }

    #[test]
    fn test_garbage_record() {
        assert!(matches!(
            parse_record("enr:not-a-record"),
            Err(TargetError::InvalidRecord { .. })
        ));
        assert!(matches!(
            parse_record("hello world"),
            Err(TargetError::InvalidRecord { .. })
        ));
    }

    #[test]
    fn test_enode_url() {
        let url = format!("{ENODE_PREFIX}{EXAMPLE_PUBKEY}@10.3.58.6:30303?discport=30301");
        let node = parse_enode_url(&url).expect("valid enode");

        assert_eq!(node.id_hex(), EXAMPLE_NODE_ID);
        assert_eq!(
            node.tcp_endpoint(),
            Some("10.3.58.6:30303".parse().expect("addr"))
        );
        assert_eq!(
            node.udp_endpoint(),
            Some("10.3.58.6:30301".parse().expect("addr"))
        );
        assert_eq!(node.to_string(), url);
    }

    #[test]
    fn test_enode_url_ipv6_and_incomplete() {
        let url = format!("{ENODE_PREFIX}{EXAMPLE_PUBKEY}@[::1]:30303");
        let node = parse_node(&url).expect("ipv6 enode");
        assert_eq!(node.tcp_endpoint(), Some("[::1]:30303".parse().expect("addr")));

        let incomplete = parse_node(&format!("{ENODE_PREFIX}{EXAMPLE_PUBKEY}")).expect("id only");
        assert_eq!(incomplete.tcp_endpoint(), None);
        assert_eq!(incomplete.id_hex(), EXAMPLE_NODE_ID);
    }

    #[test]
    fn test_invalid_enode_urls() {
        for input in [
            "enode://1234@10.0.0.1:30303".to_string(),
            format!("{ENODE_PREFIX}{EXAMPLE_PUBKEY}@not-an-ip:30303"),
            format!("{ENODE_PREFIX}{EXAMPLE_PUBKEY}@10.0.0.1:port"),
            format!("{ENODE_PREFIX}{EXAMPLE_PUBKEY}@10.0.0.1:30303?discport=x"),
            format!("{ENODE_PREFIX}{}", "00".repeat(64)),
        ] {
            assert!(
                matches!(parse_enode_url(&input), Err(TargetError::InvalidEnode { .. })),
                "{input} should be rejected"
            );
        }
    }
}
