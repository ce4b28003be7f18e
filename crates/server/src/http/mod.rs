use axum::{Router, middleware::from_fn_with_state, routing::get};
use services::services::image::PUBLIC_PREFIX;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::{AppState, routes};

mod auth;

pub fn router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .merge(routes::auth::router())
        .merge(routes::members::router())
        .merge(routes::projects::router(&state))
        .merge(routes::tasks::router(&state))
        .merge(routes::notifications::router(&state))
        .layer(from_fn_with_state(state.clone(), auth::require_auth));

    let api_routes = Router::new()
        .merge(routes::auth::public_router())
        .merge(routes::docs::public_api_router())
        .merge(protected_routes);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .merge(routes::docs::router())
        .nest("/api", api_routes)
        .nest_service(PUBLIC_PREFIX, ServeDir::new(state.images().root()))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
