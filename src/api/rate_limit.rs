//! Per-client throttling of the public API.
//!
//! Each route group gets its own governor bucket set, keyed by [`ClientIpKeyExtractor`],
//! and is wrapped by [`enforce_envelope`] so throttled callers receive the same JSON
//! failure body as every other error.

use crate::error::AppError;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use ipnetwork::IpNetwork;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tower_governor::GovernorError;
use tower_governor::key_extractor::KeyExtractor;

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_RATELIMIT_AFTER: &str = "x-ratelimit-after";

/// Buckets requests by client address.
///
/// A forwarded address is believed only when the TCP peer is one of the configured
/// proxies. The chain is read right to left and the first hop outside the proxy set is
/// the client; an unparseable hop ends the walk and the peer is used instead.
#[derive(Clone, Debug)]
pub struct ClientIpKeyExtractor {
    proxies: Arc<[IpNetwork]>,
}

impl ClientIpKeyExtractor {
    #[must_use]
    pub fn new(proxies: &[IpNetwork]) -> Self {
        Self { proxies: proxies.into() }
    }

    #[must_use]
    pub fn client_ip(&self, headers: &HeaderMap, peer: IpAddr) -> IpAddr {
        if !self.is_proxy(peer) {
            return peer;
        }

        let hops: Vec<&str> = headers
            .get_all(X_FORWARDED_FOR)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .map(str::trim)
            .collect();

        for hop in hops.into_iter().rev() {
            match hop.parse::<IpAddr>() {
                Ok(ip) if self.is_proxy(ip) => {}
                Ok(ip) => return ip,
                Err(_) => break,
            }
        }
        peer
    }

    fn is_proxy(&self, ip: IpAddr) -> bool {
        self.proxies.iter().any(|net| net.contains(ip))
    }
}

impl KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        let peer = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
            .ok_or(GovernorError::UnableToExtractKey)?;

        Ok(self.client_ip(req.headers(), peer))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Login and refresh: the credential guessing surface.
    Auth,
    Standard,
}

impl Tier {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Standard => "standard",
        }
    }
}

/// Middleware state for one tier.
#[derive(Clone, Debug)]
pub struct TierGuard {
    tier: Tier,
    decisions_total: Counter<u64>,
}

impl TierGuard {
    #[must_use]
    pub fn new(tier: Tier) -> Self {
        let decisions_total = global::meter("rental-auth-server")
            .u64_counter("rate_limit_decisions_total")
            .with_description("Rate limit decisions per tier")
            .build();
        Self { tier, decisions_total }
    }

    fn record(&self, outcome: &'static str) {
        self.decisions_total.add(1, &[KeyValue::new("tier", self.tier.as_str()), KeyValue::new("outcome", outcome)]);
    }
}

/// Counts governor decisions and rewrites a throttled response into the JSON envelope.
/// Must sit directly outside the tier's `GovernorLayer`.
pub async fn enforce_envelope(State(guard): State<TierGuard>, req: Request<Body>, next: Next) -> Response {
    let response = next.run(req).await;

    if response.status() != StatusCode::TOO_MANY_REQUESTS {
        guard.record("allowed");
        return response;
    }

    guard.record("throttled");
    let retry_after_secs = response
        .headers()
        .get(X_RATELIMIT_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    tracing::warn!(tier = guard.tier.as_str(), retry_after_secs = ?retry_after_secs, "Rate limit exceeded");

    AppError::RateLimited { retry_after_secs }.into_response()
}
