// Host/port parsing and IPv4 resolution helpers.

use std::net::{IpAddr, SocketAddr};

use crate::prober::ProbeError;

/// Split `host:port` when the string carries exactly one colon.
/// Anything else (bare host, IPv6 literal) comes back with no port.
pub fn parse_host_port(s: &str) -> (String, Option<u16>) {
    if s.matches(':').count() == 1 {
        if let Some((host, port)) = s.rsplit_once(':') {
            if let Ok(port) = port.parse::<u16>() {
                return (host.to_string(), Some(port));
            }
        }
    }
    (s.to_string(), None)
}

/// Resolve `host` to the first IPv4 socket address for `port`.
pub async fn resolve_ipv4(host: &str, port: u16) -> Result<SocketAddr, ProbeError> {
    // First try to parse as IP address
    if let Ok(ip) = host.parse::<IpAddr>() {
        return match ip {
            IpAddr::V4(_) => Ok(SocketAddr::new(ip, port)),
            IpAddr::V6(_) => Err(ProbeError::NoIpv4Address(host.to_string())),
        };
    }

    let mut addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|source| ProbeError::Resolve {
            host: host.to_string(),
            source,
        })?;
    addrs
        .find(SocketAddr::is_ipv4)
        .ok_or_else(|| ProbeError::NoIpv4Address(host.to_string()))
}
