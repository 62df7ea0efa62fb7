use std::net::IpAddr;

use url::{Host, Url};

use crate::error::FetchError;
use crate::policy::BlockPolicy;

/// Syntactic and policy check of a candidate URL. No DNS is performed here;
/// hostnames are vetted by the dialer when the connection is made.
pub fn validate_url(raw: &str, policy: &dyn BlockPolicy) -> Result<Url, FetchError> {
    let trimmed = raw.trim();
    let url = Url::parse(trimmed).map_err(|e| FetchError::invalid_url(trimmed, e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(FetchError::invalid_url(
            trimmed,
            format!(
                "scheme {:?} not allowed (only http/https are allowed)",
                url.scheme()
            ),
        ));
    }
    let ip = match url.host() {
        None => return Err(FetchError::invalid_url(trimmed, "missing hostname")),
        Some(Host::Domain(domain)) if domain.is_empty() => {
            return Err(FetchError::invalid_url(trimmed, "missing hostname"));
        }
        Some(Host::Domain(_)) => None,
        Some(Host::Ipv4(ip)) => Some(IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => Some(IpAddr::V6(ip)),
    };
    if let Some(ip) = ip {
        if policy.is_blocked(ip) {
            return Err(FetchError::BlockedAddress { ip });
        }
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PrivateNetworkPolicy;

    fn check(raw: &str) -> Result<Url, FetchError> {
        validate_url(raw, &PrivateNetworkPolicy)
    }

    #[test]
    fn accepts_public_http_and_https() {
        assert!(check("https://example.com/a?b=c").is_ok());
        assert!(check("  http://example.com  ").is_ok());
        assert!(check("http://93.184.216.34/").is_ok());
    }

    #[test]
    fn rejects_blocked_literal_ips_before_any_io() {
        for raw in [
            "http://127.0.0.1/",
            "http://169.254.1.1/latest/meta-data",
            "http://10.0.0.5:8080/",
            "https://192.168.1.1/",
            "http://100.64.0.5/",
            "http://0.0.0.0/",
            "http://224.0.0.1/",
            "http://[::1]/",
            "http://[::ffff:127.0.0.1]/",
        ] {
            match check(raw) {
                Err(FetchError::BlockedAddress { .. }) => {}
                other => panic!("{raw}: expected BlockedAddress, got {other:?}"),
            }
        }
    }

    #[test]
    fn rejects_numeric_host_forms_that_normalise_to_loopback() {
        assert!(matches!(
            check("http://2130706433/"),
            Err(FetchError::BlockedAddress { .. })
        ));
        assert!(matches!(
            check("http://0x7f.1/"),
            Err(FetchError::BlockedAddress { .. })
        ));
    }

    #[test]
    fn rejects_other_schemes_and_garbage() {
        for raw in [
            "ftp://example.com/file",
            "file:///etc/passwd",
            "javascript:alert(1)",
            "gopher://example.com",
            "example.com",
            "",
            "http://",
        ] {
            match check(raw) {
                Err(FetchError::InvalidUrl { .. }) => {}
                other => panic!("{raw}: expected InvalidUrl, got {other:?}"),
            }
        }
    }

    #[test]
    fn hostnames_are_not_resolved_here() {
        assert!(check("http://localhost.invalid/").is_ok());
    }
}
