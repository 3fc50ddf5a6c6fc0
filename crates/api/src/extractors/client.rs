//! Per-request client context.
//!
//! Builds the explicit [`SessionContext`] handed to portal operations from
//! the socket peer, the forwarding headers of trusted proxies and the
//! `User-Agent` header.

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRef, FromRequestParts},
    http::{header, request::Parts, Extensions, HeaderMap},
};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use domain::models::SessionContext;

const FORWARDED_FOR: &str = "x-forwarded-for";
const REAL_IP: &str = "x-real-ip";

/// Peers whose forwarding headers are believed.
#[derive(Debug, Clone, Default)]
pub struct TrustedProxies(Arc<Vec<IpAddr>>);

impl TrustedProxies {
    pub fn new(proxies: Vec<IpAddr>) -> Self {
        Self(Arc::new(proxies))
    }

    pub fn contains(&self, ip: &IpAddr) -> bool {
        self.0.contains(ip)
    }
}

/// Client IP as seen by this service.
///
/// The socket peer is authoritative. Only when the peer is a trusted proxy
/// are `X-Forwarded-For` (rightmost hop that is not itself a trusted proxy)
/// and then `X-Real-IP` consulted. Header values must parse as IP addresses.
pub fn client_ip(
    headers: &HeaderMap,
    extensions: &Extensions,
    trusted: &TrustedProxies,
) -> Option<String> {
    let peer = extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())?;

    if !trusted.contains(&peer) {
        return Some(peer.to_string());
    }

    forwarded_client(headers, trusted)
        .or_else(|| {
            headers
                .get(REAL_IP)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<IpAddr>().ok())
        })
        .or(Some(peer))
        .map(|ip| ip.to_string())
}

fn forwarded_client(headers: &HeaderMap, trusted: &TrustedProxies) -> Option<IpAddr> {
    let hops: Vec<IpAddr> = headers
        .get(FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())?
        .split(',')
        .map(|hop| hop.trim().parse::<IpAddr>().ok())
        .collect::<Option<Vec<_>>>()?;

    hops.iter()
        .rev()
        .find(|hop| !trusted.contains(hop))
        .or_else(|| hops.first())
        .copied()
}

fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Extractor wrapping the request's [`SessionContext`].
#[derive(Debug, Clone)]
pub struct ClientContext(pub SessionContext);

#[async_trait]
impl<S> FromRequestParts<S> for ClientContext
where
    TrustedProxies: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let trusted = TrustedProxies::from_ref(state);
        Ok(ClientContext(SessionContext::for_client(
            client_ip(&parts.headers, &parts.extensions, &trusted),
            user_agent(&parts.headers),
        )))
    }
}
