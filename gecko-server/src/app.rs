use crate::access_log::{AppError, SessionId, record_access};
use crate::params::{Params, to_u64};
use axum::extract::{Path, State};
use axum::handler::Handler;
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::from_fn_with_state;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use gecko_core::config::check_route_path;
use gecko_core::{GeckoError, HttpLogger};
use gecko_logger::LogMetrics;
use std::sync::Arc;
use tracing::warn;

/// Shared state of the demo application.
#[derive(Clone)]
pub struct AppState {
    pub message: Arc<str>,
    pub metrics: Option<Arc<LogMetrics>>,
    pub metrics_path: String,
}

/// Routes served by [`build_router`] besides the metrics endpoint.
pub const ROUTES: [&str; 5] = ["/", "/items/{id}", "/teapot", "/error", "/missing"];

/// Whether `path` can be mounted next to [`ROUTES`].
pub fn check_metrics_path(path: &str) -> Result<(), GeckoError> {
    check_route_path(path).map_err(GeckoError::InvalidData)?;
    if ROUTES.contains(&path) {
        return Err(GeckoError::AlreadyExists(format!("route '{path}'")));
    }
    Ok(())
}

/// Build the router. With a logger, every request (matched or not) is
/// recorded.
pub fn build_router(state: AppState, logger: Option<Arc<dyn HttpLogger>>) -> Router {
    let mut router = Router::new()
        .route("/", get(index))
        .route("/items/{id}", get(item))
        .route("/teapot", get(teapot))
        .route("/error", get(failing))
        .route("/missing", get(missing));
    if state.metrics.is_some() {
        match check_metrics_path(&state.metrics_path) {
            Ok(()) => router = router.route(&state.metrics_path, get(metrics_handler)),
            Err(e) => warn!(path = %state.metrics_path, error = %e, "metrics endpoint not mounted"),
        }
    }

    let router = match logger {
        Some(logger) => router
            .route_layer(from_fn_with_state(Arc::clone(&logger), record_access))
            .fallback(not_found.layer(from_fn_with_state(logger, record_access))),
        None => router.fallback(not_found),
    };
    router.with_state(state)
}

fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|pair| pair.trim().strip_prefix("session="))
        .map(str::to_string)
}

async fn index(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let body = state.message.to_string();
    match session_cookie(&headers) {
        Some(id) => (Extension(SessionId(id)), body).into_response(),
        None => body.into_response(),
    }
}

async fn item(Path(id): Path<String>, params: Params) -> Result<Json<serde_json::Value>, AppError> {
    let id = to_u64(&id)?;
    Ok(Json(serde_json::json!({ "id": id, "full": params.bool("full") })))
}

async fn teapot() -> StatusCode {
    StatusCode::IM_A_TEAPOT
}

async fn failing() -> Result<String, AppError> {
    Err(GeckoError::NotFound("nothing to see here".into()).into())
}

async fn missing() -> Result<String, AppError> {
    Err(GeckoError::MissingData("required parameter".into()).into())
}

async fn not_found() -> AppError {
    AppError(GeckoError::NotFound("route".into()))
}

async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics.map(|m| m.render()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn session_cookie_is_found_among_others() {
        let mut h = HeaderMap::new();
        h.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session=abcdef123; lang=es"),
        );
        assert_eq!(session_cookie(&h).as_deref(), Some("abcdef123"));
    }

    #[test]
    fn metrics_path_must_not_shadow_a_route() {
        assert!(check_metrics_path("/metrics").is_ok());
        for route in ROUTES {
            assert!(check_metrics_path(route).is_err(), "{route}");
        }
        assert!(matches!(check_metrics_path("metrics"), Err(GeckoError::InvalidData(_))));
        assert!(matches!(check_metrics_path(""), Err(GeckoError::InvalidData(_))));
    }

    #[test]
    fn no_session_cookie() {
        let mut h = HeaderMap::new();
        h.insert(header::COOKIE, HeaderValue::from_static("theme=dark"));
        assert_eq!(session_cookie(&h), None);
        assert_eq!(session_cookie(&HeaderMap::new()), None);
    }
}
