use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::IntoResponse,
    Json,
};

use super::types::ApiResponse;

pub(super) const DEFAULT_API_RATE_LIMIT_PER_SEC: u32 = 180;
const MAX_TRACKED_CLIENTS: usize = 4096;

/// Fixed one-second windows per client key.
#[derive(Default)]
pub(super) struct RateLimiter {
    windows: HashMap<String, (Instant, u32)>,
}

impl RateLimiter {
    /// Counts one request and reports whether it fits in the window.
    pub(super) fn admit(&mut self, key: &str, now: Instant, per_sec: u32) -> bool {
        let window = self.windows.entry(key.to_string()).or_insert((now, 0));
        if now.duration_since(window.0) >= Duration::from_secs(1) {
            *window = (now, 0);
        }
        window.1 = window.1.saturating_add(1);
        let admitted = window.1 <= per_sec;

        if self.windows.len() > MAX_TRACKED_CLIENTS {
            self.windows
                .retain(|_, (start, _)| now.duration_since(*start) < Duration::from_secs(10));
        }
        admitted
    }
}

#[derive(Clone)]
pub(super) struct ApiSecurity {
    pub required_token: Option<String>,
    pub rate_limit_per_sec: u32,
    pub limiter: Arc<Mutex<RateLimiter>>,
}

impl ApiSecurity {
    pub(super) fn new(required_token: Option<String>, rate_limit_per_sec: u32) -> Self {
        Self {
            required_token,
            rate_limit_per_sec: rate_limit_per_sec.max(1),
            limiter: Arc::new(Mutex::new(RateLimiter::default())),
        }
    }

    pub(super) fn from_env() -> Self {
        let token = std::env::var("OVERWORLD_API_TOKEN")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        let rate = std::env::var("OVERWORLD_API_RATE_LIMIT_PER_SEC")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(DEFAULT_API_RATE_LIMIT_PER_SEC);
        Self::new(token, rate)
    }
}

/// Token from `Authorization: Bearer` or `x-api-key`.
fn presented_tokens(headers: &HeaderMap) -> [&str; 2] {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .unwrap_or("")
    };
    let auth = header("authorization");
    let bearer = auth
        .strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .unwrap_or(auth);
    [bearer, header("x-api-key")]
}

fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .or_else(|| headers.get("x-real-ip"))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("local")
        .to_string()
}

pub(super) async fn api_guard(
    State(security): State<ApiSecurity>,
    req: Request,
    next: Next,
) -> axum::response::Response {
    if let Some(expected) = security.required_token.as_deref() {
        if !presented_tokens(req.headers()).contains(&expected) {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ApiResponse::err(
                    "Unauthorized: send Authorization: Bearer <OVERWORLD_API_TOKEN>",
                )),
            )
                .into_response();
        }
    }

    let key = client_key(req.headers());
    let admitted = security
        .limiter
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .admit(&key, Instant::now(), security.rate_limit_per_sec);
    if !admitted {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ApiResponse::err("Rate limit exceeded")),
        )
            .into_response();
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::Request as HttpRequest, middleware, routing::get, Router};
    use tower::util::ServiceExt;

    async fn ok_handler() -> &'static str {
        "ok"
    }

    fn guarded(security: ApiSecurity) -> Router {
        Router::new()
            .route("/", get(ok_handler))
            .layer(middleware::from_fn_with_state(security, api_guard))
    }

    #[tokio::test]
    async fn rejects_when_token_missing_or_invalid() {
        let app = guarded(ApiSecurity::new(Some("secret".into()), 100));

        let req = HttpRequest::builder()
            .uri("/")
            .body(axum::body::Body::empty())
            .expect("request");
        let res = app.clone().oneshot(req).await.expect("response");
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

        let req_bad = HttpRequest::builder()
            .uri("/")
            .header("authorization", "Bearer nope")
            .body(axum::body::Body::empty())
            .expect("request");
        let res_bad = app.clone().oneshot(req_bad).await.expect("response");
        assert_eq!(res_bad.status(), StatusCode::UNAUTHORIZED);

        let req_key = HttpRequest::builder()
            .uri("/")
            .header("x-api-key", "secret")
            .body(axum::body::Body::empty())
            .expect("request");
        let res_key = app.oneshot(req_key).await.expect("response");
        assert_eq!(res_key.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn rate_limit_applies_per_client() {
        let app = guarded(ApiSecurity::new(None, 1));
        let request = |ip: &str| {
            HttpRequest::builder()
                .uri("/")
                .header("x-real-ip", ip)
                .body(axum::body::Body::empty())
                .expect("request")
        };

        let first = app.clone().oneshot(request("10.0.0.1")).await.expect("response");
        assert_eq!(first.status(), StatusCode::OK);
        let second = app.clone().oneshot(request("10.0.0.1")).await.expect("response");
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        let other = app.oneshot(request("10.0.0.2")).await.expect("response");
        assert_eq!(other.status(), StatusCode::OK);
    }

    #[test]
    fn limiter_window_resets_after_a_second() {
        let mut limiter = RateLimiter::default();
        let start = Instant::now();
        assert!(limiter.admit("a", start, 2));
        assert!(limiter.admit("a", start, 2));
        assert!(!limiter.admit("a", start, 2));
        assert!(limiter.admit("a", start + Duration::from_millis(1001), 2));
    }
}
