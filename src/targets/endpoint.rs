use super::TargetError;

/// Parses and normalizes a `host:port` endpoint.
///
/// IPv6 hosts must be bracketed. The port must be in `1..=65535` and the host
/// must not be empty. Hostnames are accepted as-is; they are resolved when
/// dialed.
pub fn parse_endpoint(input: &str) -> Result<String, TargetError> {
    let invalid = || TargetError::InvalidEndpoint(input.to_string());

    let (host, port) = input.rsplit_once(':').ok_or_else(invalid)?;
    let host = match host.strip_prefix('[') {
        Some(bracketed) => bracketed.strip_suffix(']').ok_or_else(invalid)?,
        None if host.contains(':') || host.contains(']') => return Err(invalid()),
        None => host,
    };
    if host.is_empty() || host.contains(|c: char| matches!(c, '[' | ']' | '/' | ' ')) {
        return Err(invalid());
    }

    let port: u16 = port.parse().map_err(|_| invalid())?;
    if port == 0 {
        return Err(invalid());
    }

    Ok(join_host_port(host, port))
}

/// Formats `host:port`, bracketing IPv6 hosts.
pub fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_endpoints() {
        assert_eq!(parse_endpoint("127.0.0.1:30303").expect("v4"), "127.0.0.1:30303");
        assert_eq!(parse_endpoint("[::1]:30303").expect("v6"), "[::1]:30303");
        assert_eq!(
            parse_endpoint("bootnode.example:30303").expect("name"),
            "bootnode.example:30303"
        );
        assert_eq!(parse_endpoint("10.0.0.1:030303").expect("padded"), "10.0.0.1:30303");
    }

    #[test]
    fn test_invalid_endpoints() {
        for input in [
            "127.0.0.1",
            ":30303",
            "127.0.0.1:0",
            "127.0.0.1:65536",
            "127.0.0.1:port",
            "::1:30303",
            "[::1:30303",
            "enode://abc@1.2.3.4:30303",
            "enr:-IS4QHCYrYZbAKWC",
        ] {
            assert!(
                matches!(parse_endpoint(input), Err(TargetError::InvalidEndpoint(_))),
                "{input} should be rejected"
            );
        }
    }
}
