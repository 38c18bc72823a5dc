use std::net::SocketAddr;

use axum::{extract::ConnectInfo, http::HeaderMap};

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Identifier the abuse throttle counts against. `X-Forwarded-For` is read only when
/// `trust_proxy_headers` is set.
pub fn client_id(
    headers: &HeaderMap,
    peer: Option<&ConnectInfo<SocketAddr>>,
    trust_proxy_headers: bool,
) -> String {
    if trust_proxy_headers {
        let forwarded = headers
            .get(FORWARDED_FOR)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty());
        if let Some(forwarded) = forwarded {
            return forwarded.to_string();
        }
    }

    peer.map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> ConnectInfo<SocketAddr> {
        ConnectInfo(SocketAddr::from(([198, 51, 100, 7], 40_000)))
    }

    #[test]
    fn ignores_forwarded_header_unless_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR, HeaderValue::from_static("203.0.113.9, 10.0.0.1"));

        assert_eq!(client_id(&headers, Some(&peer()), false), "198.51.100.7");
        assert_eq!(client_id(&headers, Some(&peer()), true), "203.0.113.9");
    }

    #[test]
    fn falls_back_when_nothing_is_known() {
        assert_eq!(client_id(&HeaderMap::new(), None, true), "unknown");
    }
}
