#![forbid(unsafe_code)]

use std::net::SocketAddr;

/// Parse a bind endpoint of the form `quic://host:port` into a socket
/// address. Only IP literals are accepted; this is a listen address, not a
/// dial target.
pub fn parse_bind_endpoint(s: &str) -> Result<SocketAddr, String> {
	let s = s.trim();
	if s.is_empty() {
		return Err("endpoint must be non-empty (expected quic://host:port)".to_string());
	}

	let rest = s
		.strip_prefix("quic://")
		.ok_or_else(|| format!("invalid endpoint (expected quic://host:port): {s}"))?;

	if rest.contains('/') || rest.contains('?') || rest.contains('#') {
		return Err(format!(
			"invalid endpoint (expected quic://host:port without path/query/fragment): {s}"
		));
	}

	let addr: SocketAddr = rest
		.parse()
		.map_err(|_| format!("invalid listen address (expected quic://ip:port, IPv6 bracketed): {s}"))?;

	if addr.port() == 0 {
		return Err(format!("invalid endpoint port (expected 1..=65535): {s}"));
	}

	Ok(addr)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_ipv4() {
		let addr = parse_bind_endpoint("quic://127.0.0.1:3001").unwrap();
		assert_eq!(addr.to_string(), "127.0.0.1:3001");
	}

	#[test]
	fn parses_bracketed_ipv6() {
		let addr = parse_bind_endpoint("quic://[::1]:3001").unwrap();
		assert_eq!(addr.to_string(), "[::1]:3001");
	}

	#[test]
	fn rejects_missing_scheme_and_port() {
		assert!(parse_bind_endpoint("127.0.0.1:3001").is_err());
		assert!(parse_bind_endpoint("quic://127.0.0.1").is_err());
		assert!(parse_bind_endpoint("quic://127.0.0.1:0").is_err());
	}

	#[test]
	fn rejects_path_query_fragment() {
		assert!(parse_bind_endpoint("quic://127.0.0.1:3001/").is_err());
		assert!(parse_bind_endpoint("quic://127.0.0.1:3001?x=y").is_err());
		assert!(parse_bind_endpoint("quic://127.0.0.1:3001#frag").is_err());
	}

	#[test]
	fn rejects_dns_names() {
		assert!(parse_bind_endpoint("quic://relay.example.com:3001").is_err());
	}
}
