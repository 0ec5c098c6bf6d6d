//! Request logging middleware.
//!
//! [`record_access`] turns each request/response pair into a [`LogEntry`] and
//! hands it to an [`HttpLogger`]. The logger only buffers, so the response is
//! never held back by storage.

use axum::body::HttpBody;
use axum::extract::{ConnectInfo, MatchedPath, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use gecko_core::{GeckoError, HttpLogger, LogEntry};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Response extension carrying the caller's session id. Only a prefix of it
/// ends up in the log.
#[derive(Debug, Clone)]
pub struct SessionId(pub String);

/// Response extension carrying the text of the error a handler returned.
#[derive(Debug, Clone)]
pub struct ErrorText(pub String);

/// Handler error: mapped status, JSON body, and the message kept for the log.
#[derive(Debug)]
pub struct AppError(pub GeckoError);

impl From<GeckoError> for AppError {
    fn from(err: GeckoError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        debug!(status = status.as_u16(), error = %self.0, "handler error");
        let mut response = (
            status,
            [(header::CONTENT_TYPE, "application/json")],
            self.0.to_json_body(),
        )
            .into_response();
        response
            .extensions_mut()
            .insert(ErrorText(self.0.to_string()));
        response
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

/// `X-Real-IP`, then the first `X-Forwarded-For` hop, then the socket peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let real_ip = header_str(headers, "x-real-ip").trim();
    if !real_ip.is_empty() {
        return real_ip.to_string();
    }
    let forwarded = header_str(headers, "x-forwarded-for");
    if let Some(first) = forwarded.split(',').next().map(str::trim)
        && !first.is_empty()
    {
        return first.to_string();
    }
    peer.map(|p| p.ip().to_string()).unwrap_or_default()
}

/// Drop the request origin from a same-site URL, e.g. `https://a.com/x` -> `/x`.
pub fn strip_origin<'a>(url: &'a str, origin: &str) -> &'a str {
    if origin.is_empty() {
        return url;
    }
    url.strip_prefix(origin).unwrap_or(url)
}

fn request_fields(entry: &mut LogEntry, req: &Request) {
    let headers = req.headers();
    let origin = header_str(headers, "origin");

    entry.host = match header_str(headers, "host") {
        "" => req.uri().authority().map(|a| a.to_string()).unwrap_or_default(),
        host => host.to_string(),
    };
    entry.method = req.method().to_string();
    entry.route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_default();
    entry.uri = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    entry.htmx = header_str(headers, "hx-request") == "true";
    entry.bytes_in = header_str(headers, "content-length").parse().unwrap_or(0);

    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    entry.remote_ip = client_ip(headers, peer);

    entry.user_agent = header_str(headers, "user-agent").to_string();
    entry.referer = strip_origin(header_str(headers, "referer"), origin).to_string();
    entry.hx_current_url = strip_origin(header_str(headers, "hx-current-url"), origin).to_string();
    entry.hx_target = header_str(headers, "hx-target").to_string();
    entry.hx_trigger = header_str(headers, "hx-trigger").to_string();
    entry.hx_boosted = header_str(headers, "hx-boosted") == "true";
}

fn response_fields(entry: &mut LogEntry, response: &Response) {
    entry.status = response.status().as_u16();
    entry.bytes_out = response
        .body()
        .size_hint()
        .exact()
        .or_else(|| header_str(response.headers(), "content-length").parse().ok())
        .unwrap_or(0);
    if let Some(ErrorText(text)) = response.extensions().get::<ErrorText>() {
        entry.error = Some(text.clone());
    }
    if let Some(SessionId(id)) = response.extensions().get::<SessionId>() {
        entry.set_session(id);
    }
}

/// Middleware recording one [`LogEntry`] per request.
///
/// Install with `route_layer` so the matched route pattern is known.
pub async fn record_access(
    State(logger): State<Arc<dyn HttpLogger>>,
    req: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let mut entry = LogEntry::now();
    request_fields(&mut entry, &req);

    let response = next.run(req).await;

    entry.latency = started.elapsed();
    response_fields(&mut entry, &response);
    logger.save_log(entry);
    response
}
