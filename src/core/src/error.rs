use std::net::IpAddr;
use std::time::Duration;

use thiserror::Error;

/// Every way a content fetch can fail.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("blocked private or local IP address: {ip}")]
    BlockedAddress { ip: IpAddr },

    #[error(
        "blocked host {host:?}: resolves to private or local IP ({})",
        join_ips(.addresses)
    )]
    AllCandidatesBlocked { host: String, addresses: Vec<IpAddr> },

    #[error("dns lookup failed for {host:?}: {message}")]
    DnsResolution { host: String, message: String },

    #[error("connection to {host:?} failed: {message}")]
    Connection { host: String, message: String },

    #[error("stopped after {limit} redirects")]
    TooManyRedirects { limit: usize },

    #[error("HTTP {status}")]
    HttpStatus { status: u16 },

    #[error("failed to read response body: {message}")]
    BodyRead { message: String },

    #[error("could not extract readable content from {url}")]
    Extraction { url: String },

    #[error("request timed out after {}ms", .after.as_millis())]
    Timeout { after: Duration },

    #[error("failed to build http client: {0}")]
    Client(String),
}

impl FetchError {
    pub(crate) fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Stable machine-readable code for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidUrl { .. } => "invalid_url",
            Self::BlockedAddress { .. } => "blocked_address",
            Self::AllCandidatesBlocked { .. } => "all_candidates_blocked",
            Self::DnsResolution { .. } => "dns_resolution_failure",
            Self::Connection { .. } => "connection_failure",
            Self::TooManyRedirects { .. } => "too_many_redirects",
            Self::HttpStatus { .. } => "http_status",
            Self::BodyRead { .. } => "body_read",
            Self::Extraction { .. } => "extraction_failure",
            Self::Timeout { .. } => "timeout",
            Self::Client(_) => "client",
        }
    }

    /// Validation and policy rejections. Retrying these never helps.
    pub fn is_policy_violation(&self) -> bool {
        matches!(
            self,
            Self::InvalidUrl { .. }
                | Self::BlockedAddress { .. }
                | Self::AllCandidatesBlocked { .. }
                | Self::TooManyRedirects { .. }
        )
    }
}

fn join_ips(addresses: &[IpAddr]) -> String {
    addresses
        .iter()
        .map(IpAddr::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Joins an error with its `source()` chain so transport failures keep the
/// underlying cause (refused, reset, tls) in the message.
pub(crate) fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !out.contains(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_violations_are_flagged() {
        let blocked = FetchError::BlockedAddress {
            ip: "10.0.0.5".parse().unwrap(),
        };
        assert!(blocked.is_policy_violation());
        assert_eq!(blocked.kind(), "blocked_address");
        assert!(!FetchError::HttpStatus { status: 503 }.is_policy_violation());
        assert!(!FetchError::Timeout {
            after: Duration::from_secs(1)
        }
        .is_policy_violation());
    }

    #[test]
    fn messages_carry_diagnostic_detail() {
        assert_eq!(FetchError::HttpStatus { status: 404 }.to_string(), "HTTP 404");
        let err = FetchError::Timeout {
            after: Duration::from_secs(2),
        };
        assert_eq!(err.to_string(), "request timed out after 2000ms");
        let err = FetchError::AllCandidatesBlocked {
            host: "intranet.example".into(),
            addresses: vec!["10.0.0.1".parse().unwrap(), "::1".parse().unwrap()],
        };
        assert_eq!(
            err.to_string(),
            "blocked host \"intranet.example\": resolves to private or local IP (10.0.0.1, ::1)"
        );
    }

    #[test]
    fn error_chain_includes_sources() {
        let inner = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let outer = std::io::Error::new(std::io::ErrorKind::Other, inner);
        assert!(error_chain(&outer).contains("refused"));
    }
}
