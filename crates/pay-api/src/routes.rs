//! # Routes
//!
//! Axum router configuration for the Dropics API.

use crate::handlers::{self, crypto, newsletter, products, solana, stripe};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
/// - Payments:
///   - POST/PUT/GET /api/payments/crypto - initiate / confirm / status
///   - POST/PUT/GET /api/payments/solana - initiate / confirm / signature status
///   - POST/PUT /api/payments/stripe - open / sync a card payment intent
///   - POST /api/payments/stripe/webhook - signed card gateway events
///
/// - Newsletter:
///   - POST   /api/newsletter - subscribe
///   - DELETE /api/newsletter - unsubscribe
///   - GET    /api/newsletter - list subscribers (admin)
///
/// - Catalog:
///   - GET /api/products - list active products
///   - GET /api/products/{product_id} - get product by ID
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let payment_routes = Router::new()
        .route(
            "/crypto",
            get(crypto::payment_status)
                .post(crypto::create_payment)
                .put(crypto::confirm_payment),
        )
        .route(
            "/solana",
            get(solana::signature_status)
                .post(solana::create_payment)
                .put(solana::confirm_payment),
        )
        .route("/stripe", post(stripe::create_intent).put(stripe::sync_intent))
        .route("/stripe/webhook", post(stripe::webhook));

    let api_routes = Router::new()
        .nest("/payments", payment_routes)
        .route(
            "/newsletter",
            get(newsletter::list_subscribers)
                .post(newsletter::subscribe)
                .delete(newsletter::unsubscribe),
        )
        .route("/products", get(products::list_products))
        .route("/products/{product_id}", get(products::get_product));

    Router::new()
        // Health check at root
        .route("/health", get(handlers::health))
        .route("/", get(handlers::health))
        .nest("/api", api_routes)
        // Middleware (tracing outermost)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        // State
        .with_state(state)
}
