pub mod drink_handler;
pub mod error;
pub mod health;

use std::sync::Arc;

use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, patch, post, MethodRouter};
use axum::Router;
use coffee_auth::{require_permission, AuthGuard, TokenVerifier};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::domain::repository::DrinkRepository;

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub drink_repo: Arc<dyn DrinkRepository>,
    pub verifier: Arc<TokenVerifier>,
}

/// Build the REST API router.
pub fn router(state: AppState) -> Router {
    let verifier = state.verifier.clone();

    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/drinks", get(drink_handler::list_drinks))
        .route(
            "/drinks-detail",
            guarded(
                get(drink_handler::list_drink_details),
                &verifier,
                "get:drinks-detail",
            ),
        )
        .route(
            "/drinks",
            guarded(post(drink_handler::create_drink), &verifier, "post:drinks"),
        )
        .route(
            "/drinks/{id}",
            guarded(patch(drink_handler::update_drink), &verifier, "patch:drinks"),
        )
        .route(
            "/drinks/{id}",
            guarded(
                delete(drink_handler::delete_drink),
                &verifier,
                "delete:drinks",
            ),
        )
        .fallback(error::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// 指定権限を要求する AuthGuard をハンドラーの前段に置く。
fn guarded(
    handler: MethodRouter<AppState>,
    verifier: &Arc<TokenVerifier>,
    permission: &str,
) -> MethodRouter<AppState> {
    handler.route_layer(from_fn_with_state(
        AuthGuard::new(verifier.clone(), permission),
        require_permission,
    ))
}
