mod handlers;

pub use handlers::ApiError;

use axum::{
    http::HeaderValue,
    routing::{any, get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::Config;
use crate::proxy::AssetResolver;

/// Router with permissive CORS.
pub fn create_router(resolver: AssetResolver) -> Router {
    build_router(resolver, CorsLayer::permissive())
}

/// Router with CORS restricted to the configured origins, if any.
pub fn create_router_with_config(resolver: AssetResolver, config: &Config) -> Router {
    build_router(resolver, cors_layer(config.cors_origins.as_deref()))
}

fn cors_layer(origins: Option<&[String]>) -> CorsLayer {
    match origins {
        Some(origins) if !origins.is_empty() => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|o| match o.parse() {
                    Ok(v) => Some(v),
                    Err(_) => {
                        tracing::warn!("Ignoring invalid CORS origin: {}", o);
                        None
                    }
                })
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        }
        _ => CorsLayer::permissive(),
    }
}

fn build_router(resolver: AssetResolver, cors: CorsLayer) -> Router {
    let api = Router::new()
        // Asset resolution (any method, like the pages they replace)
        .route("/presign", any(handlers::presign))
        .route("/manifest", any(handlers::manifest))
        .route("/scene", any(handlers::scene))
        // Generations
        .route("/generations", post(handlers::create_generation))
        .route(
            "/generations/{job_id}/status",
            get(handlers::generation_status),
        );

    Router::new()
        .nest("/api", api)
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(resolver)
}
