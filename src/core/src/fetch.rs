use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, LOCATION, USER_AGENT,
};
use url::{Host, Url};

use crate::dialer::{AttemptError, PinnedDialer, Resolve, SystemResolver};
use crate::error::{error_chain, FetchError};
use crate::policy::{BlockPolicy, PrivateNetworkPolicy};
use crate::redirect::{is_redirect, RedirectGuard};
use crate::validate::validate_url;

/// Upper bound on response bytes read, whatever the server declares.
pub const MAX_BODY_BYTES: usize = 8 << 20;

pub const DEFAULT_USER_AGENT: &str = concat!(
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) ",
    "AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
);
const DEFAULT_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// One content fetch: target URL, overall deadline, output character cap
/// (0 = unlimited).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    url: String,
    timeout: Duration,
    max_chars: usize,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>, timeout: Duration, max_chars: usize) -> Self {
        Self {
            url: url.into(),
            timeout,
            max_chars,
        }
    }

    /// Builds a request from raw caller numbers. Timeouts below one second
    /// are raised to one second and negative character caps mean no cap.
    pub fn from_raw(url: impl Into<String>, timeout_seconds: i64, max_chars: i64) -> Self {
        let timeout = Duration::from_secs(u64::try_from(timeout_seconds.max(1)).unwrap_or(1));
        let max_chars = usize::try_from(max_chars.max(0)).unwrap_or(usize::MAX);
        Self::new(url, timeout, max_chars)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }
}

/// Transport tunables shared by every request a [`Fetcher`] sends.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Per-candidate connect timeout.
    pub dial_timeout: Duration,
    /// Hostname resolution timeout.
    pub resolve_timeout: Duration,
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            dial_timeout: Duration::from_secs(15),
            resolve_timeout: Duration::from_secs(10),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept: DEFAULT_ACCEPT.to_string(),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
        }
    }
}

/// Raw result of a successful exchange.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub final_url: Url,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    /// The body hit [`MAX_BODY_BYTES`] and the rest was left unread.
    pub body_truncated: bool,
}

/// Fetches untrusted URLs without ever reaching blocked addresses.
///
/// Every hop is validated, resolved and dialed through a fresh
/// [`PinnedDialer`]. Environment proxy settings are ignored.
#[derive(Clone)]
pub struct Fetcher {
    policy: Arc<dyn BlockPolicy>,
    resolver: Arc<dyn Resolve>,
    options: FetchOptions,
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new(FetchOptions::default())
    }
}

impl Fetcher {
    pub fn new(options: FetchOptions) -> Self {
        Self {
            policy: Arc::new(PrivateNetworkPolicy),
            resolver: Arc::new(SystemResolver),
            options,
        }
    }

    pub fn with_policy(mut self, policy: Arc<dyn BlockPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn Resolve>) -> Self {
        self.resolver = resolver;
        self
    }

    pub async fn fetch(&self, request: &FetchRequest) -> Result<FetchedPage, FetchError> {
        let start = validate_url(request.url(), self.policy.as_ref())?;
        let limit = request.timeout();
        match tokio::time::timeout(limit, self.fetch_validated(start, limit)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!(
                    url = request.url(),
                    timeout_ms = limit.as_millis() as u64,
                    "fetch deadline exceeded"
                );
                Err(FetchError::Timeout { after: limit })
            }
        }
    }

    async fn fetch_validated(
        &self,
        start: Url,
        limit: Duration,
    ) -> Result<FetchedPage, FetchError> {
        let dialer = PinnedDialer::new(
            self.policy.clone(),
            self.resolver.clone(),
            self.options.dial_timeout,
            self.options.resolve_timeout,
        );
        let headers = self.request_headers()?;
        let mut guard = RedirectGuard::new(start, self.policy.as_ref());

        loop {
            let current = guard.current().clone();
            let response = self.send(&dialer, &current, &headers, limit).await?;
            let status = response.status();
            if is_redirect(status) {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                guard.follow(location.as_deref())?;
                continue;
            }
            if !status.is_success() {
                tracing::debug!(url = %current, status = status.as_u16(), "non-success status");
                return Err(FetchError::HttpStatus {
                    status: status.as_u16(),
                });
            }
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let (body, body_truncated) = read_capped(response, MAX_BODY_BYTES, limit).await?;
            if body_truncated {
                tracing::debug!(url = %current, bytes = body.len(), "body truncated at cap");
            }
            return Ok(FetchedPage {
                final_url: guard.into_chain().into_final(),
                status: status.as_u16(),
                content_type,
                body,
                body_truncated,
            });
        }
    }

    async fn send(
        &self,
        dialer: &PinnedDialer,
        url: &Url,
        headers: &HeaderMap,
        limit: Duration,
    ) -> Result<reqwest::Response, FetchError> {
        let host = url
            .host_str()
            .ok_or_else(|| FetchError::invalid_url(url.as_str(), "missing hostname"))?;
        let port = url.port_or_known_default().unwrap_or(80);
        let domain = match url.host() {
            Some(Host::Domain(domain)) => Some(domain),
            _ => None,
        };
        dialer
            .dial(host, port, |addr| {
                self.send_once(url, domain, addr, headers, dialer.dial_timeout(), limit)
            })
            .await
    }

    async fn send_once(
        &self,
        url: &Url,
        domain: Option<&str>,
        addr: SocketAddr,
        headers: &HeaderMap,
        dial_timeout: Duration,
        limit: Duration,
    ) -> Result<reqwest::Response, AttemptError> {
        let mut builder = reqwest::Client::builder()
            .no_proxy()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(dial_timeout)
            .default_headers(headers.clone());
        if let Some(domain) = domain {
            builder = builder.resolve(domain, addr);
        }
        let client = builder
            .build()
            .map_err(|e| AttemptError::Fatal(FetchError::Client(error_chain(&e))))?;
        match client.get(url.clone()).send().await {
            Ok(response) => Ok(response),
            Err(err) if err.is_connect() => Err(AttemptError::Connect(error_chain(&err))),
            Err(err) if err.is_timeout() => {
                Err(AttemptError::Fatal(FetchError::Timeout { after: limit }))
            }
            Err(err) => Err(AttemptError::Fatal(FetchError::Connection {
                host: url.host_str().unwrap_or_default().to_string(),
                message: error_chain(&err),
            })),
        }
    }

    fn request_headers(&self) -> Result<HeaderMap, FetchError> {
        let mut headers = HeaderMap::new();
        for (name, value) in [
            (USER_AGENT, &self.options.user_agent),
            (ACCEPT, &self.options.accept),
            (ACCEPT_LANGUAGE, &self.options.accept_language),
        ] {
            let value = HeaderValue::from_str(value)
                .map_err(|e| FetchError::Client(format!("invalid {name} header: {e}")))?;
            headers.insert(name, value);
        }
        Ok(headers)
    }
}

async fn read_capped(
    mut response: reqwest::Response,
    cap: usize,
    limit: Duration,
) -> Result<(Vec<u8>, bool), FetchError> {
    let mut body = Vec::new();
    loop {
        let chunk = match response.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => return Ok((body, false)),
            Err(err) if err.is_timeout() => return Err(FetchError::Timeout { after: limit }),
            Err(err) => {
                return Err(FetchError::BodyRead {
                    message: error_chain(&err),
                })
            }
        };
        let room = cap.saturating_sub(body.len());
        if chunk.len() > room {
            body.extend_from_slice(&chunk[..room]);
            return Ok((body, true));
        }
        body.extend_from_slice(&chunk);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_request_numbers_are_normalised() {
        let req = FetchRequest::from_raw("https://example.com", 0, -5);
        assert_eq!(req.timeout(), Duration::from_secs(1));
        assert_eq!(req.max_chars(), 0);

        let req = FetchRequest::from_raw("https://example.com", 30, 2000);
        assert_eq!(req.timeout(), Duration::from_secs(30));
        assert_eq!(req.max_chars(), 2000);
        assert_eq!(req.url(), "https://example.com");
    }

    #[test]
    fn default_headers_look_like_a_browser() {
        let headers = Fetcher::default().request_headers().unwrap();
        assert!(headers[USER_AGENT].to_str().unwrap().starts_with("Mozilla/5.0"));
        assert!(headers[ACCEPT].to_str().unwrap().starts_with("text/html"));
        assert_eq!(headers[ACCEPT_LANGUAGE], "en-US,en;q=0.9");
    }

    #[test]
    fn invalid_header_values_are_client_errors() {
        let fetcher = Fetcher::new(FetchOptions {
            user_agent: "bad\nagent".into(),
            ..FetchOptions::default()
        });
        assert!(matches!(fetcher.request_headers(), Err(FetchError::Client(_))));
    }

    #[tokio::test]
    async fn blocked_literal_target_fails_before_io() {
        let fetcher = Fetcher::default();
        let req = FetchRequest::new("http://127.0.0.1:1/", Duration::from_secs(1), 0);
        assert!(matches!(
            fetcher.fetch(&req).await,
            Err(FetchError::BlockedAddress { .. })
        ));
    }
}
