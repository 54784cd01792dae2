//! Client identifier resolution.

use axum::http::HeaderMap;
use std::net::{IpAddr, SocketAddr};

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

/// Derives the key a request is rate limited under.
#[derive(Debug, Clone)]
pub struct ClientResolver {
    /// Honour proxy headers before the peer address
    trust_forwarded_for: bool,
    /// Identifier used when nothing else is available
    fallback: String,
}

impl ClientResolver {
    /// Create a resolver.
    pub fn new(trust_forwarded_for: bool, fallback: impl Into<String>) -> Self {
        Self {
            trust_forwarded_for,
            fallback: fallback.into(),
        }
    }

    /// Resolve the identifier for a request.
    ///
    /// Proxy headers are only consulted when trusted. The peer port is
    /// dropped so that every connection from one host shares a quota.
    pub fn resolve(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
        if self.trust_forwarded_for {
            if let Some(ip) = forwarded_ip(headers) {
                return ip.to_string();
            }
        }

        match peer {
            Some(addr) => addr.ip().to_string(),
            None => self.fallback.clone(),
        }
    }
}

impl Default for ClientResolver {
    fn default() -> Self {
        Self::new(false, "unknown")
    }
}

/// First valid address from `X-Forwarded-For`, then `X-Real-IP`.
fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let from_forwarded = headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|first| first.trim().parse().ok());

    from_forwarded.or_else(|| {
        headers
            .get(X_REAL_IP)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    })
}
