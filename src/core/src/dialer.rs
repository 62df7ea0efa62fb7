use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::lookup_host;

use crate::error::FetchError;
use crate::policy::BlockPolicy;

/// Object-safe hostname resolution.
pub trait Resolve: Send + Sync + 'static {
    fn resolve(
        &self,
        host: &str,
        port: u16,
    ) -> Pin<Box<dyn Future<Output = io::Result<Vec<IpAddr>>> + Send>>;
}

/// Resolves through the operating system (`getaddrinfo`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl Resolve for SystemResolver {
    fn resolve(
        &self,
        host: &str,
        port: u16,
    ) -> Pin<Box<dyn Future<Output = io::Result<Vec<IpAddr>>> + Send>> {
        let host = host.to_string();
        Box::pin(async move {
            let addrs = lookup_host((host.as_str(), port)).await?;
            Ok(addrs.map(|addr| addr.ip()).collect())
        })
    }
}

/// Fixed host table. Unknown hosts fail like NXDOMAIN.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    hosts: HashMap<String, Vec<IpAddr>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: impl Into<String>, ips: Vec<IpAddr>) -> Self {
        self.hosts.insert(host.into().to_ascii_lowercase(), ips);
        self
    }
}

impl Resolve for StaticResolver {
    fn resolve(
        &self,
        host: &str,
        _port: u16,
    ) -> Pin<Box<dyn Future<Output = io::Result<Vec<IpAddr>>> + Send>> {
        let found = self.hosts.get(&host.to_ascii_lowercase()).cloned();
        let host = host.to_string();
        Box::pin(async move {
            found.ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("no such host: {host}"))
            })
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub ip: IpAddr,
    pub allowed: bool,
}

/// Addresses a hostname resolved to, in resolution order, each annotated
/// with the policy verdict.
#[derive(Debug, Clone)]
pub struct ResolvedCandidateSet {
    host: String,
    candidates: Vec<Candidate>,
}

impl ResolvedCandidateSet {
    pub fn new(host: impl Into<String>, ips: Vec<IpAddr>, policy: &dyn BlockPolicy) -> Self {
        let mut candidates: Vec<Candidate> = Vec::with_capacity(ips.len());
        for ip in ips {
            if candidates.iter().any(|c| c.ip == ip) {
                continue;
            }
            candidates.push(Candidate {
                ip,
                allowed: !policy.is_blocked(ip),
            });
        }
        Self {
            host: host.into(),
            candidates,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn allowed(&self) -> impl Iterator<Item = IpAddr> + '_ {
        self.candidates.iter().filter(|c| c.allowed).map(|c| c.ip)
    }

    pub fn blocked(&self) -> impl Iterator<Item = IpAddr> + '_ {
        self.candidates.iter().filter(|c| !c.allowed).map(|c| c.ip)
    }

    pub fn has_allowed(&self) -> bool {
        self.candidates.iter().any(|c| c.allowed)
    }
}

/// Outcome of one connection attempt against one candidate address.
#[derive(Debug)]
pub enum AttemptError {
    /// The address could not be reached; the next candidate is tried.
    Connect(String),
    /// Anything else stops the dial immediately.
    Fatal(FetchError),
}

/// Connects only to addresses the policy allows.
///
/// Literal IP hosts are checked directly. Hostnames are resolved freshly on
/// every call, blocked addresses are dropped and the remaining ones are
/// tried one after another in resolution order. The attempt closure owns
/// the actual socket work and is expected to bound each connect by
/// [`PinnedDialer::dial_timeout`].
pub struct PinnedDialer {
    policy: Arc<dyn BlockPolicy>,
    resolver: Arc<dyn Resolve>,
    dial_timeout: Duration,
    resolve_timeout: Duration,
}

impl PinnedDialer {
    pub fn new(
        policy: Arc<dyn BlockPolicy>,
        resolver: Arc<dyn Resolve>,
        dial_timeout: Duration,
        resolve_timeout: Duration,
    ) -> Self {
        Self {
            policy,
            resolver,
            dial_timeout,
            resolve_timeout,
        }
    }

    pub fn dial_timeout(&self) -> Duration {
        self.dial_timeout
    }

    pub async fn candidates(
        &self,
        host: &str,
        port: u16,
    ) -> Result<ResolvedCandidateSet, FetchError> {
        let lookup = self.resolver.resolve(host, port);
        let ips = match tokio::time::timeout(self.resolve_timeout, lookup).await {
            Ok(Ok(ips)) => ips,
            Ok(Err(err)) => {
                return Err(FetchError::DnsResolution {
                    host: host.to_string(),
                    message: err.to_string(),
                })
            }
            Err(_) => {
                return Err(FetchError::DnsResolution {
                    host: host.to_string(),
                    message: format!(
                        "resolver timed out after {}ms",
                        self.resolve_timeout.as_millis()
                    ),
                })
            }
        };
        if ips.is_empty() {
            return Err(FetchError::DnsResolution {
                host: host.to_string(),
                message: "no addresses returned".to_string(),
            });
        }
        Ok(ResolvedCandidateSet::new(host, ips, self.policy.as_ref()))
    }

    pub async fn dial<T, F, Fut>(
        &self,
        host: &str,
        port: u16,
        mut attempt: F,
    ) -> Result<T, FetchError>
    where
        F: FnMut(SocketAddr) -> Fut,
        Fut: Future<Output = Result<T, AttemptError>>,
    {
        let bare = host.trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = bare.parse::<IpAddr>() {
            if self.policy.is_blocked(ip) {
                tracing::debug!(%ip, "refusing to dial blocked literal address");
                return Err(FetchError::BlockedAddress { ip });
            }
            return match attempt(SocketAddr::new(ip, port)).await {
                Ok(conn) => Ok(conn),
                Err(AttemptError::Connect(message)) => Err(FetchError::Connection {
                    host: bare.to_string(),
                    message,
                }),
                Err(AttemptError::Fatal(err)) => Err(err),
            };
        }

        let set = self.candidates(bare, port).await?;
        for ip in set.blocked() {
            tracing::debug!(host = bare, %ip, "dropping blocked candidate");
        }
        if !set.has_allowed() {
            return Err(FetchError::AllCandidatesBlocked {
                host: bare.to_string(),
                addresses: set.blocked().collect(),
            });
        }

        let mut last_error = None;
        for ip in set.allowed() {
            match attempt(SocketAddr::new(ip, port)).await {
                Ok(conn) => return Ok(conn),
                Err(AttemptError::Connect(message)) => {
                    tracing::debug!(host = bare, %ip, error = %message, "candidate connect failed");
                    last_error = Some(message);
                }
                Err(AttemptError::Fatal(err)) => return Err(err),
            }
        }
        Err(FetchError::Connection {
            host: bare.to_string(),
            message: last_error.unwrap_or_else(|| format!("failed to dial host {bare:?}")),
        })
    }
}
