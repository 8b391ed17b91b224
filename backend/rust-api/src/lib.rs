use axum::{
    extract::Request,
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use services::AppState;

/// CSP middleware adds Content-Security-Policy header to all responses
async fn csp_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response.headers_mut().insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(
            "default-src 'self'; \
             script-src 'self' 'unsafe-inline'; \
             style-src 'self' 'unsafe-inline'; \
             img-src 'self' data: https:; \
             connect-src 'self'",
        ),
    );
    response
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    // The game page may be served from another origin.
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        // Metrics endpoint with Basic Auth protection
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        .nest("/api/v1", api_routes().layer(cors))
        .with_state(app_state)
        .layer(middleware::from_fn(csp_middleware))
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/players", players_routes())
        .nest("/games", games_routes())
        .nest("/leaderboards", leaderboard_routes())
}

fn players_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", post(handlers::players::login))
        .route(
            "/{username}/best/{operation}/{mode}",
            get(handlers::players::best_score),
        )
}

fn games_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(handlers::games::start_game))
        .route("/{id}", get(handlers::games::get_game))
        .route("/{id}/answers", post(handlers::games::submit_answer))
        .route("/{id}/give-up", post(handlers::games::give_up))
        .route("/{id}/summary", get(handlers::games::get_summary))
        .route("/{id}/stream", get(handlers::sse::game_stream))
}

fn leaderboard_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/{operation}/{mode}",
            get(handlers::leaderboards::get_leaderboard),
        )
        .route(
            "/{operation}/{mode}/stream",
            get(handlers::sse::leaderboard_stream),
        )
}
