pub mod handlers;
pub mod middleware;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    services::ServeDir,
    trace::TraceLayer,
};
use std::sync::Arc;

use crate::{
    config::Settings,
    payments::StripeClient,
    service::ServiceContext,
};
use state::AppState;

// Authentication is handler-level: protected handlers take the
// `CurrentUser` extractor, public ones don't. Only the admin router gets a
// blanket middleware gate.
pub fn create_app(
    service_context: Arc<ServiceContext>,
    stripe_client: Option<Arc<StripeClient>>,
    settings: Arc<Settings>,
) -> Router {
    let app_state = AppState::new(service_context, stripe_client, settings.clone());

    Router::new()
        // Root and health endpoints
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::root::health_check))
        .route("/api", get(handlers::root::api_info))

        // Auth routes
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/me", get(handlers::auth::me))

        // API routes
        .nest("/api", api_routes())

        // Admin routes
        .nest("/admin", admin_routes(app_state.clone()))

        // Uploaded booking attachments, served read-only
        .nest_service("/uploads", ServeDir::new(settings.uploads.dir.clone()))

        // Add state to the router
        .with_state(app_state)

        // Middleware
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive()) // Configure properly for production
        .layer(TraceLayer::new_for_http())
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/garages", garage_routes())
        .nest("/services", service_routes())
        .nest("/bookings", booking_routes())
        .nest("/reviews", review_routes())
        .nest("/payments", payment_routes())
}

fn garage_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::garages::list).post(handlers::garages::create))
        .route("/mine", get(handlers::garages::mine))
        .route("/:id", get(handlers::garages::get)
            .put(handlers::garages::update)
            .delete(handlers::garages::delete))
        .route("/:id/services", get(handlers::services::list_by_garage)
            .post(handlers::services::create))
        .route("/:id/reviews", get(handlers::reviews::list_by_garage))
        .route("/:id/availability", get(handlers::bookings::check_availability))
        .route("/:id/calendar", get(handlers::bookings::calendar))
}

fn service_routes() -> Router<AppState> {
    Router::new()
        .route("/:id", axum::routing::put(handlers::services::update)
            .delete(handlers::services::delete))
}

fn booking_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::bookings::create).get(handlers::bookings::list))
        .route("/stats", get(handlers::bookings::stats))
        .route("/:id", get(handlers::bookings::get).delete(handlers::bookings::delete))
        .route("/:id/status", post(handlers::bookings::transition))
        .route("/:id/cancel", post(handlers::bookings::cancel))
        .route("/:id/timeline", get(handlers::bookings::timeline))
        .route("/:id/attachments", post(handlers::bookings::upload_attachment))
}

fn review_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::reviews::create))
        .route("/mine", get(handlers::reviews::mine))
        .route("/:id", axum::routing::put(handlers::reviews::update)
            .delete(handlers::reviews::delete))
        .route("/:id/response", post(handlers::reviews::respond)
            .put(handlers::reviews::update_response)
            .delete(handlers::reviews::withdraw_response))
        .route("/:id/helpful", post(handlers::reviews::toggle_helpful))
}

fn payment_routes() -> Router<AppState> {
    Router::new()
        // Webhook is unauthenticated; trust comes from signature verification
        .route("/webhook/stripe", post(handlers::payments::stripe_webhook))
        .route("/", get(handlers::payments::list_mine))
        .route("/booking/:booking_id/checkout", post(handlers::payments::booking_checkout))
        .route("/garage/checkout", post(handlers::payments::garage_checkout))
        .route("/:id", get(handlers::payments::get))
        .route("/:id/verify", post(handlers::payments::verify))
        .route("/:id/refund", post(handlers::payments::refund))
}

fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/stats", get(handlers::admin::stats))
        .route("/users", get(handlers::admin::list_users))
        .route("/users/:id", axum::routing::delete(handlers::admin::purge_user))
        .route("/garages", get(handlers::admin::list_garages))
        .route("/garages/:id/verify", post(handlers::admin::verify_garage))
        .route("/garages/:id/reconcile-stats", post(handlers::admin::reconcile_garage_stats))
        .route("/payments/manual", post(handlers::admin::record_manual_payment))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_admin,
        ))
}
