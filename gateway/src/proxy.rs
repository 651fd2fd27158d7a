// gateway/src/proxy.rs
use actix_web::http::header::{self, HeaderName, HeaderValue};
use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};
use futures::TryStreamExt;
use std::io;

use crate::error::GatewayError;
use crate::routes::{Director, PROXY_CONTEXT_HEADER};

// Connection-scoped headers that must not cross the proxy
const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h))
}

/// Forward `req` to the backend chosen by `director` and stream the answer
/// back. The backend sees the path without its context plus an
/// `X-Proxy-Context` header, which is also set on the response.
pub async fn forward(
    req: &HttpRequest,
    body: web::Bytes,
    director: &Director,
    http: &reqwest::Client,
) -> Result<HttpResponse, GatewayError> {
    let target = director.target_url(req.path(), req.query_string());
    tracing::info!("`-> proxy: {} --> {}", req.path(), target);

    let method = reqwest::Method::from_bytes(req.method().as_str().as_bytes())
        .map_err(|e| GatewayError::BadRequest(e.to_string()))?;

    // Only the gateway stamps the context header
    let mut outbound = http.request(method, &target);
    for (name, value) in req.headers() {
        if is_hop_by_hop(name.as_str())
            || name == header::HOST
            || name == header::CONTENT_LENGTH
            || name.as_str().eq_ignore_ascii_case(PROXY_CONTEXT_HEADER)
        {
            continue;
        }
        outbound = outbound.header(name.as_str(), value.as_bytes());
    }
    outbound = outbound.header(PROXY_CONTEXT_HEADER, director.context());
    if let Some(peer) = req.peer_addr() {
        outbound = outbound.header("X-Forwarded-For", peer.ip().to_string());
    }

    let upstream = outbound
        .body(body.to_vec())
        .send()
        .await
        .map_err(|e| GatewayError::Upstream(format!("{}: {}", director.host(), e)))?;

    let status = StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut response = HttpResponse::build(status);
    for (name, value) in upstream.headers() {
        // Body is re-chunked on the way out
        if is_hop_by_hop(name.as_str()) || name.as_str().eq_ignore_ascii_case("content-length") {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_str().as_bytes()),
            HeaderValue::from_bytes(value.as_bytes()),
        ) {
            response.append_header((name, value));
        }
    }
    response.insert_header((PROXY_CONTEXT_HEADER, director.context().to_string()));

    let stream = upstream
        .bytes_stream()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()));
    Ok(response.streaming(stream))
}
