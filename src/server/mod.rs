pub mod routes;

use crate::errors::{EngineError, EngineResult};
use crate::state::AppState;
use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::Instrument;

/// Build the HTTP router. Fails only on an unparsable CORS origin.
pub fn router(state: Arc<AppState>) -> EngineResult<Router> {
    let cors = cors_layer(&state.config.cors_allow_origin)?;

    Ok(Router::new()
        .route("/", get(routes::root))
        .route("/calculate", post(routes::calculate))
        .route("/calculate/greeks", post(routes::calculate_greeks))
        .route("/calculate/monte_carlo", post(routes::calculate_monte_carlo))
        .route("/calculate_option_prices", post(routes::calculate_option_prices))
        .route("/heatmaps/{option_type}", get(routes::heatmap))
        .route("/api/counters", get(routes::get_counters))
        .layer(middleware::from_fn(request_span))
        .layer(cors)
        .with_state(state))
}

fn cors_layer(origin: &str) -> EngineResult<CorsLayer> {
    let allow_origin = if origin.trim() == "*" {
        AllowOrigin::from(Any)
    } else {
        let value = HeaderValue::from_str(origin.trim())
            .map_err(|e| EngineError::Config(format!("CORS_ALLOW_ORIGIN: {e}")))?;
        AllowOrigin::exact(value)
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any))
}

/// Tag every request with a fresh id, on its span and on the response.
async fn request_span(req: Request, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!(
        "request",
        %request_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    async move {
        let mut response = next.run(req).await;
        tracing::info!(status = response.status().as_u16(), "handled");
        if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
            response.headers_mut().insert("x-request-id", value);
        }
        response
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use axum::body::Body;
    use axum::http::{Request as HttpRequest, StatusCode};
    use tower::ServiceExt;

    #[test]
    fn test_bad_cors_origin_is_config_error() {
        let err = cors_layer("bad\norigin").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
        assert!(cors_layer("https://example.com").is_ok());
    }

    #[tokio::test]
    async fn test_responses_carry_request_id_and_cors() {
        let app = router(AppState::new(AppConfig::default())).unwrap();
        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/")
                    .header("origin", "https://example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let app = router(AppState::new(AppConfig::default())).unwrap();
        let response = app
            .oneshot(HttpRequest::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
