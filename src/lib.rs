//! PayPal sandbox IPN round-trip tester.
//!
//! An administrator starts a sandbox donation, PayPal calls the IPN
//! listener back, the callback is echoed to PayPal's verification endpoint
//! and the outcome is stored and emailed to the site administrator.

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub mod admin;
pub mod config;
pub mod email;
pub mod initiate;
pub mod ipn;
pub mod paypal_handler;
pub mod report;
pub mod store;

use paypal_handler::{
    sandbox_ipn_handler, sandbox_return_handler, sandbox_status_handler,
    settings_tool_handler, start_sandbox_test_handler, SandboxTestState,
};

/// Builds the application router around a prepared state.
pub fn app(state: Arc<SandboxTestState>) -> Router {
    let paypal_router = Router::new()
        .route("/sandbox-test", post(start_sandbox_test_handler))
        .route("/sandbox-test/return", get(sandbox_return_handler))
        .route("/sandbox-test/status", get(sandbox_status_handler))
        .route("/ipn", post(sandbox_ipn_handler))
        .with_state(state.clone());

    let admin_router = Router::new()
        .route("/settings", get(settings_tool_handler))
        .with_state(state);

    Router::new()
        .nest("/paypal", paypal_router)
        .nest("/admin", admin_router)
        .route("/health", get(|| async { "OK" }))
}
