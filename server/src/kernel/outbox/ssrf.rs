//! SSRF guard for outbox delivery (§4.F) — resolves the destination host and
//! rejects loopback, link-local, multicast, and unlisted private addresses.

use std::net::{IpAddr, Ipv4Addr};

use tokio::net::lookup_host;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardResult {
    Allowed,
    Blocked,
}

/// Resolves `host:port` and blocks the destination unless every resolved
/// address is public, or explicitly whitelisted via `allowed_cidrs`.
pub async fn check_destination(host: &str, port: u16, allowed_cidrs: &[String]) -> anyhow::Result<GuardResult> {
    let addrs = lookup_host((host, port)).await?;

    for addr in addrs {
        let ip = addr.ip();
        if is_blocked(ip, allowed_cidrs) {
            return Ok(GuardResult::Blocked);
        }
    }

    Ok(GuardResult::Allowed)
}

fn is_blocked(ip: IpAddr, allowed_cidrs: &[String]) -> bool {
    if allowed_cidrs.iter().any(|cidr| cidr_contains(cidr, ip)) {
        return false;
    }

    match ip {
        IpAddr::V4(v4) => v4.is_loopback() || v4.is_link_local() || v4.is_multicast() || v4.is_private() || v4.is_unspecified(),
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_multicast() || v6.is_unspecified() || is_unique_local_v6(v6),
    }
}

fn is_unique_local_v6(addr: std::net::Ipv6Addr) -> bool {
    (addr.segments()[0] & 0xfe00) == 0xfc00
}

/// Minimal IPv4 CIDR membership check (`a.b.c.d/n`); non-IPv4 entries never match.
fn cidr_contains(cidr: &str, ip: IpAddr) -> bool {
    let IpAddr::V4(ip) = ip else { return false };
    let Some((base, bits)) = cidr.split_once('/') else {
        return false;
    };
    let Ok(base_ip): Result<Ipv4Addr, _> = base.parse() else {
        return false;
    };
    let Ok(prefix_len): Result<u32, _> = bits.parse() else {
        return false;
    };
    if prefix_len > 32 {
        return false;
    }

    let mask = if prefix_len == 0 {
        0
    } else {
        u32::MAX << (32 - prefix_len)
    };
    (u32::from(base_ip) & mask) == (u32::from(ip) & mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_is_blocked_by_default() {
        assert!(is_blocked(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), &[]));
    }

    #[test]
    fn private_range_is_blocked_by_default() {
        assert!(is_blocked(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)), &[]));
    }

    #[test]
    fn public_address_is_allowed() {
        assert!(!is_blocked(IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34)), &[]));
    }

    #[test]
    fn whitelisted_cidr_overrides_block() {
        let cidrs = vec!["127.0.0.0/8".to_string()];
        assert!(!is_blocked(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), &cidrs));
    }

    #[test]
    fn cidr_match_respects_prefix_length() {
        assert!(cidr_contains(
            "10.0.0.0/8",
            IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3))
        ));
        assert!(!cidr_contains(
            "10.0.0.0/16",
            IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3))
        ));
    }
}
