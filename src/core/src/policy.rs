use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Decides whether an outbound connection to an address is forbidden.
///
/// Consulted for every candidate address right before it is dialed, so
/// implementations must be cheap and side-effect free.
pub trait BlockPolicy: Send + Sync + 'static {
    fn is_blocked(&self, ip: IpAddr) -> bool;

    /// Classifies a textual address. Anything that does not parse as an IP
    /// is blocked.
    fn is_blocked_str(&self, raw: &str) -> bool {
        match raw.trim().parse::<IpAddr>() {
            Ok(ip) => self.is_blocked(ip),
            Err(_) => true,
        }
    }
}

/// Blocks loopback, unspecified, multicast, link-local, RFC1918/ULA,
/// "this network", class D/E and carrier-grade NAT space.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrivateNetworkPolicy;

impl BlockPolicy for PrivateNetworkPolicy {
    fn is_blocked(&self, ip: IpAddr) -> bool {
        match ip {
            IpAddr::V4(v4) => v4_blocked(v4),
            IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
                Some(v4) => v4_blocked(v4),
                None => v6_blocked(v6),
            },
        }
    }
}

fn v4_blocked(ip: Ipv4Addr) -> bool {
    let [a, b, _, _] = ip.octets();
    ip.is_loopback()
        || ip.is_unspecified()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_multicast()
        // 0.0.0.0/8 and everything from 224.0.0.0 up
        || a == 0
        || a >= 224
        // 100.64.0.0/10
        || (a == 100 && (64..=127).contains(&b))
}

fn v6_blocked(ip: Ipv6Addr) -> bool {
    ip.is_loopback()
        || ip.is_unspecified()
        || ip.is_multicast()
        || ip.is_unique_local()
        || ip.is_unicast_link_local()
}
