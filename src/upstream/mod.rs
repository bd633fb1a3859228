//! Outbound Mercado Livre calls: a retrying HTTP wrapper plus the typed
//! classifier that recognizes the policy-agent block.

mod classify;
mod client;

pub use classify::{classify_upstream_error, UpstreamErrorKind};
pub use client::{FetchOptions, UpstreamClient, UpstreamResponse};
