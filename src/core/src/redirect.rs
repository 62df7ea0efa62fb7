use url::Url;

use crate::error::FetchError;
use crate::policy::BlockPolicy;
use crate::validate::validate_url;

/// Hard cap on redirect hops for one fetch.
pub const MAX_REDIRECTS: usize = 10;

pub(crate) fn is_redirect(status: reqwest::StatusCode) -> bool {
    matches!(
        status,
        reqwest::StatusCode::MOVED_PERMANENTLY
            | reqwest::StatusCode::FOUND
            | reqwest::StatusCode::SEE_OTHER
            | reqwest::StatusCode::TEMPORARY_REDIRECT
            | reqwest::StatusCode::PERMANENT_REDIRECT
    )
}

/// URLs visited during one fetch, initial URL first.
#[derive(Debug, Clone)]
pub struct RedirectChain {
    visited: Vec<Url>,
    current: Url,
}

impl RedirectChain {
    pub fn new(start: Url) -> Self {
        Self {
            visited: Vec::new(),
            current: start,
        }
    }

    pub fn current(&self) -> &Url {
        &self.current
    }

    /// Redirects followed so far.
    pub fn hops(&self) -> usize {
        self.visited.len()
    }

    pub fn urls(&self) -> impl Iterator<Item = &Url> {
        self.visited.iter().chain(std::iter::once(&self.current))
    }

    fn push(&mut self, next: Url) {
        let previous = std::mem::replace(&mut self.current, next);
        self.visited.push(previous);
    }

    pub fn into_final(self) -> Url {
        self.current
    }
}

/// Re-validates every redirect target and enforces the hop cap.
///
/// Only the URL is checked here. The target's hostname is resolved and
/// filtered again by the dialer when the next request is sent.
pub struct RedirectGuard<'a> {
    policy: &'a dyn BlockPolicy,
    limit: usize,
    chain: RedirectChain,
}

impl<'a> RedirectGuard<'a> {
    pub fn new(start: Url, policy: &'a dyn BlockPolicy) -> Self {
        Self::with_limit(start, policy, MAX_REDIRECTS)
    }

    pub(crate) fn with_limit(start: Url, policy: &'a dyn BlockPolicy, limit: usize) -> Self {
        Self {
            policy,
            limit,
            chain: RedirectChain::new(start),
        }
    }

    pub fn current(&self) -> &Url {
        self.chain.current()
    }

    pub fn chain(&self) -> &RedirectChain {
        &self.chain
    }

    /// Follows one redirect whose `Location` header was `location`.
    pub fn follow(&mut self, location: Option<&str>) -> Result<&Url, FetchError> {
        if self.chain.hops() >= self.limit {
            return Err(FetchError::TooManyRedirects { limit: self.limit });
        }
        let location = location
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .ok_or_else(|| {
                FetchError::invalid_url(
                    self.chain.current().as_str(),
                    "redirect missing Location header",
                )
            })?;
        let next = self
            .chain
            .current()
            .join(location)
            .map_err(|e| FetchError::invalid_url(location, e.to_string()))?;
        let next = validate_url(next.as_str(), self.policy)?;
        tracing::debug!(
            hop = self.chain.hops() + 1,
            from = %self.chain.current(),
            to = %next,
            "following redirect"
        );
        self.chain.push(next);
        Ok(self.chain.current())
    }

    pub fn into_chain(self) -> RedirectChain {
        self.chain
    }
}
