//! Transport address formatting for tag values.

use std::net::SocketAddr;

/// Format an address as `ip:port` (IPv6 hosts are bracketed).
pub fn format_socket_address(addr: &SocketAddr) -> String {
    addr.to_string()
}

/// Drop the port from a formatted address.
///
/// Bracketed IPv6 hosts keep their brackets; input without a port is
/// returned unchanged.
pub fn host_only(formatted: &str) -> &str {
    if formatted.starts_with('[') {
        return match formatted.find(']') {
            Some(end) => &formatted[..=end],
            None => formatted,
        };
    }
    match formatted.split_once(':') {
        Some((host, _port)) => host,
        None => formatted,
    }
}
