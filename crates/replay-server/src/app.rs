//! Router construction.
//!
//! Builds the axum router with all routes and middleware.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware::security;
use crate::state::AppState;

/// Create the application router.
pub(crate) fn create_router(state: Arc<AppState>) -> Router {
    let admin_routes = Router::new()
        .route("/admin/tasks", get(handlers::admin::list_tasks))
        .route(
            "/admin/tasks/clear",
            get(handlers::admin::clear_tasks).post(handlers::admin::clear_tasks),
        )
        .route(
            "/admin/cache/clear",
            get(handlers::admin::clear_cache).post(handlers::admin::clear_cache),
        );

    Router::new()
        .route("/", get(handlers::render::render_report))
        .route("/wait/{version}", get(handlers::wait::wait_page))
        .route("/assets/{file}", get(handlers::assets::serve_asset))
        .merge(admin_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(security::content_type_options_layer())
                .layer(security::frame_options_layer())
                .layer(security::referrer_policy_layer()),
        )
        .with_state(state)
}
