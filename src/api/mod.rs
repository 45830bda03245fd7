//! HTTP API
//!
//! Route table:
//! - `GET  /api/health` public
//! - `POST /api/auth/register`, `POST /api/auth/login` public
//! - `GET|PATCH /api/auth/me` access gate
//! - `GET  /api/houses`, `/api/houses/:id`, `/api/houses/locations/available` access gate
//! - `GET  /api/houses/my-listings`, `POST /api/houses`,
//!   `PUT|DELETE /api/houses/:id` access gate + owner role gate

pub mod error;

use crate::auth::{self, access_gate, role_gate, AuthState, Role};
use crate::db::{self, SharedConnection};
use crate::listings::{self, ListingStore};
use crate::middleware::{logging::REQUEST_ID_HEADER, request_logging};
use axum::{
    extract::{DefaultBodyLimit, FromRef, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::warn;

/// Largest accepted request body
pub const BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: SharedConnection,
    pub auth: AuthState,
    pub listings: Arc<ListingStore>,
}

impl AppState {
    pub fn new(db: SharedConnection, auth: AuthState) -> Self {
        Self {
            listings: Arc::new(ListingStore::new(db.clone())),
            db,
            auth,
        }
    }
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

impl FromRef<AppState> for Arc<ListingStore> {
    fn from_ref(state: &AppState) -> Self {
        state.listings.clone()
    }
}

/// Create the API router
pub fn create_router(state: AppState, client_url: &str) -> Router {
    let owner_only = || middleware::from_fn_with_state(Role::Owner, role_gate);

    // Access gate first, then (per route) the owner role gate
    let protected_routes = Router::new()
        .route(
            "/api/auth/me",
            get(auth::api::get_current_user).patch(auth::api::update_current_user),
        )
        .route(
            "/api/houses",
            get(listings::api::list_listings)
                .merge(post(listings::api::create_listing).route_layer(owner_only())),
        )
        .route(
            "/api/houses/my-listings",
            get(listings::api::my_listings).route_layer(owner_only()),
        )
        .route(
            "/api/houses/locations/available",
            get(listings::api::available_locations),
        )
        .route(
            "/api/houses/:id",
            get(listings::api::get_listing).merge(
                axum::routing::put(listings::api::update_listing)
                    .delete(listings::api::delete_listing)
                    .route_layer(owner_only()),
            ),
        )
        .route_layer(middleware::from_fn_with_state(
            state.auth.access_gate(),
            access_gate,
        ));

    let public_routes = Router::new()
        .route("/api/health", get(health_check))
        .route("/api/auth/register", post(auth::api::register))
        .route("/api/auth/login", post(auth::api::login));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .fallback(route_not_found)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_logging))
                .layer(cors_layer(client_url))
                .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES)),
        )
}

fn cors_layer(client_url: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers([REQUEST_ID_HEADER])
        .allow_credentials(true);

    match HeaderValue::from_str(client_url) {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => {
            warn!(client_url, "CLIENT_URL is not a valid origin; cross-origin requests disabled");
            layer
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    success: bool,
    message: String,
    timestamp: String,
    database: &'static str,
    version: &'static str,
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = if db::ping(&state.db) {
        "Connected"
    } else {
        "Disconnected"
    };

    Json(HealthResponse {
        success: true,
        message: "House Hunt API is running".to_string(),
        timestamp: Utc::now().to_rfc3339(),
        database,
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn route_not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "success": false,
            "message": "Route not found",
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{JwtHandler, UserStore, MIN_BCRYPT_COST};
    use axum::{
        body::{to_bytes, Body},
        http::Request,
    };
    use tower::ServiceExt;

    fn test_app() -> Router {
        let conn = db::in_memory().unwrap();
        let auth = AuthState::new(
            Arc::new(UserStore::with_cost(conn.clone(), MIN_BCRYPT_COST)),
            Arc::new(JwtHandler::new("router-test-secret")),
        );
        create_router(AppState::new(conn, auth), "http://localhost:3000")
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let response = test_app()
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["database"], "Connected");
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_unknown_route_is_json_404() {
        let response = test_app()
            .oneshot(Request::get("/api/nowhere").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Route not found");
    }

    #[tokio::test]
    async fn test_listing_routes_require_token() {
        for (method, uri) in [
            ("GET", "/api/houses"),
            ("POST", "/api/houses"),
            ("GET", "/api/houses/my-listings"),
            ("GET", "/api/houses/locations/available"),
            ("DELETE", "/api/houses/00000000-0000-0000-0000-000000000000"),
            ("GET", "/api/auth/me"),
        ] {
            let response = test_app()
                .oneshot(
                    Request::builder()
                        .method(method)
                        .uri(uri)
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{} {}", method, uri);
        }
    }

    #[tokio::test]
    async fn test_cors_preflight_allows_client_origin() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/api/houses")
                    .header("origin", "http://localhost:3000")
                    .header("access-control-request-method", "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "http://localhost:3000"
        );
        assert_eq!(
            response.headers()["access-control-allow-credentials"],
            "true"
        );
    }
}
