//! Client IP resolution behind trusted reverse proxies.
//!
//! # Responsibilities
//! - Determine the client address used for rate limiting and logs
//! - Honour `X-Forwarded-For` (leftmost entry) then `X-Real-IP`
//!
//! # Design Decisions
//! - Forwarded headers are ignored unless `proxy.trusted` is set
//! - With a `trusted_ips` list, only those peers may set forwarded headers
//! - Values that do not parse as an IP address are ignored

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::config::ProxyConfig;
use crate::http::state::AppState;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_REAL_IP: &str = "x-real-ip";

/// Resolved client address, stored in request extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

/// Pick the client address for a request arriving from `peer`.
///
/// A missing peer (in-process requests) resolves to `0.0.0.0`.
pub fn resolve_client_ip(peer: Option<IpAddr>, headers: &HeaderMap, proxy: &ProxyConfig) -> IpAddr {
    let peer_ip = peer.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    if !proxy.trusted {
        return peer_ip;
    }

    if !proxy.trusted_ips.is_empty() {
        let trusted = peer.is_some_and(|peer| {
            proxy
                .trusted_ips
                .iter()
                .any(|ip| ip.trim().parse::<IpAddr>().is_ok_and(|ip| ip == peer))
        });
        if !trusted {
            return peer_ip;
        }
    }

    forwarded_ip(headers).unwrap_or(peer_ip)
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    if let Some(ip) = header(X_FORWARDED_FOR)
        .and_then(|xff| xff.split(',').next())
        .and_then(|first| first.trim().parse().ok())
    {
        return Some(ip);
    }

    header(X_REAL_IP).and_then(|xri| xri.trim().parse().ok())
}

/// Insert [`ClientIp`] into request extensions.
pub async fn client_ip_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip());
    let ip = resolve_client_ip(peer, request.headers(), &state.config.proxy);
    request.extensions_mut().insert(ClientIp(ip));
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> Option<IpAddr> {
        Some("10.0.0.1".parse().unwrap())
    }

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(*name, HeaderValue::from_static(value));
        }
        headers
    }

    #[test]
    fn test_untrusted_ignores_forwarded() {
        let h = headers(&[(X_FORWARDED_FOR, "1.2.3.4")]);
        assert_eq!(resolve_client_ip(peer(), &h, &ProxyConfig::default()), peer().unwrap());
    }

    #[test]
    fn test_trusted_uses_leftmost_forwarded() {
        let proxy = ProxyConfig {
            trusted: true,
            trusted_ips: vec![],
        };
        let h = headers(&[(X_FORWARDED_FOR, "1.2.3.4, 10.0.0.1"), (X_REAL_IP, "5.6.7.8")]);
        assert_eq!(resolve_client_ip(peer(), &h, &proxy), "1.2.3.4".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_real_ip_fallback() {
        let proxy = ProxyConfig {
            trusted: true,
            trusted_ips: vec![],
        };
        let h = headers(&[(X_FORWARDED_FOR, "garbage"), (X_REAL_IP, " 5.6.7.8 ")]);
        assert_eq!(resolve_client_ip(peer(), &h, &proxy), "5.6.7.8".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_trusted_ips_list() {
        let proxy = ProxyConfig {
            trusted: true,
            trusted_ips: vec!["10.0.0.1".into()],
        };
        let h = headers(&[(X_FORWARDED_FOR, "1.2.3.4")]);
        assert_eq!(resolve_client_ip(peer(), &h, &proxy), "1.2.3.4".parse::<IpAddr>().unwrap());

        let stranger = Some("192.168.1.9".parse().unwrap());
        assert_eq!(resolve_client_ip(stranger, &h, &proxy), stranger.unwrap());
        assert_eq!(
            resolve_client_ip(None, &h, &proxy),
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        );
    }
}
