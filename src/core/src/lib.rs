//! Fetches untrusted web pages without letting the caller reach private or
//! local network addresses, and turns the HTML into readable text.
//!
//! Flow: [`validate_url`] → [`Fetcher`] (dialing through [`PinnedDialer`],
//! re-checking each hop with [`RedirectGuard`]) → [`Pipeline`] →
//! [`truncate_chars`].

mod content;
mod dialer;
mod error;
mod extract;
mod fetch;
mod policy;
mod redirect;
mod truncate;
mod validate;

pub use content::{fetch_content, ContentClient, ContentResult};
pub use dialer::{
    AttemptError, Candidate, PinnedDialer, ResolvedCandidateSet, Resolve, StaticResolver,
    SystemResolver,
};
pub use error::FetchError;
pub use extract::{
    extract_readable_text, extract_title, ExtractStrategy, Extracted, MarkupStripStrategy,
    Pipeline, ReadabilityStrategy,
};
pub use fetch::{
    FetchOptions, FetchRequest, FetchedPage, Fetcher, DEFAULT_USER_AGENT, MAX_BODY_BYTES,
};
pub use policy::{BlockPolicy, PrivateNetworkPolicy};
pub use redirect::{RedirectChain, RedirectGuard, MAX_REDIRECTS};
pub use truncate::truncate_chars;
pub use validate::validate_url;
