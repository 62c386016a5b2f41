// src/paypal_handler.rs
// PayPal Sandbox Test Handlers: initiate, IPN listener, return & admin views

use axum::{
    body::Bytes,
    extract::{Form, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::admin::{render_tool, settings_return_url, PAYPAL_SETTINGS_GROUP};
use crate::config::TesterConfig;
use crate::email::Mailer;
use crate::initiate::{start_sandbox_test, InitiateError};
use crate::ipn::{decode_ipn, IpnError, IpnTransport, IpnVerifier};
use crate::report::Reporter;
use crate::store::{KeyValueStore, SandboxTestStore, StoreError, TestResult};

// ═══════════════════════════════════════════════════════════════════════════════
// SANDBOX TEST STATE
// ═══════════════════════════════════════════════════════════════════════════════

pub struct SandboxTestState {
    pub config: TesterConfig,
    pub store: SandboxTestStore,
    pub verifier: IpnVerifier<dyn IpnTransport>,
    pub reporter: Reporter,
}

impl SandboxTestState {
    pub fn new(
        config: TesterConfig,
        kv: Arc<dyn KeyValueStore>,
        transport: Arc<dyn IpnTransport>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let store = SandboxTestStore::new(kv, config.option_prefix.clone(), config.notice_ttl);
        let reporter = Reporter::new(store.clone(), mailer, config.admin_email.clone());
        Self {
            verifier: IpnVerifier::new(transport),
            store,
            reporter,
            config,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ERROR RESPONSES
// ═══════════════════════════════════════════════════════════════════════════════

impl IntoResponse for IpnError {
    fn into_response(self) -> Response {
        match self {
            IpnError::MalformedCallback => {
                tracing::warn!("[IPN] ❌ Empty data");
                (StatusCode::BAD_REQUEST, "empty data").into_response()
            }
            IpnError::TokenMismatch => {
                tracing::warn!("[IPN] ⚠️ Missing or mismatched custom data, possible spoofed IPN");
                (StatusCode::FORBIDDEN, "missing or mismatched custom data").into_response()
            }
            IpnError::Store(e) => e.into_response(),
        }
    }
}

impl IntoResponse for InitiateError {
    fn into_response(self) -> Response {
        match self {
            InitiateError::Store(e) => e.into_response(),
            InitiateError::Encode(e) => {
                tracing::error!("[SANDBOX] ❌ {}", e);
                (StatusCode::BAD_REQUEST, "invalid form data").into_response()
            }
        }
    }
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        tracing::error!("[STORE] ❌ {}", self);
        (StatusCode::INTERNAL_SERVER_ERROR, "storage unavailable").into_response()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HANDLERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Starts a sandbox test and sends the browser to PayPal.
pub async fn start_sandbox_test_handler(
    State(state): State<Arc<SandboxTestState>>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Result<Redirect, InitiateError> {
    let url = start_sandbox_test(&state.store, &state.config.sandbox_webscr_url(), &fields).await?;
    Ok(Redirect::to(&url))
}

/// IPN listener for the sandbox test.
pub async fn sandbox_ipn_handler(
    State(state): State<Arc<SandboxTestState>>,
    body: Bytes,
) -> Result<impl IntoResponse, IpnError> {
    let payload = decode_ipn(&body)?;
    tracing::info!(
        "[IPN] 📬 Received: {} ({})",
        payload.get("txn_type").unwrap_or("unknown"),
        payload.get("txn_id").unwrap_or("-")
    );

    let outcome = state.verifier.receive(&payload, &state.store).await?;
    state.reporter.report(&outcome).await?;

    Ok((StatusCode::OK, "Received"))
}

/// PayPal `return` target: back to the gateway settings tab.
pub async fn sandbox_return_handler(State(state): State<Arc<SandboxTestState>>) -> Redirect {
    Redirect::to(&settings_return_url(&state.config.admin_url))
}

#[derive(Debug, Deserialize)]
pub struct SettingsQuery {
    #[serde(default)]
    pub group: String,
}

/// Settings-page render hook. Consumes the result notice when it is shown.
pub async fn settings_tool_handler(
    State(state): State<Arc<SandboxTestState>>,
    Query(query): Query<SettingsQuery>,
) -> Result<Response, StoreError> {
    if query.group != PAYPAL_SETTINGS_GROUP {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let notice = if state.store.take_notice().await? {
        state.store.result().await?
    } else {
        None
    };

    match render_tool(&query.group, &state.config, notice) {
        Some(html) => Ok(Html(html).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

#[derive(Debug, Serialize)]
pub struct SandboxStatus {
    pub result: Option<TestResult>,
    pub completed_at: Option<DateTime<Utc>>,
    pub pending: bool,
}

pub async fn sandbox_status_handler(
    State(state): State<Arc<SandboxTestState>>,
) -> Result<Json<SandboxStatus>, StoreError> {
    Ok(Json(SandboxStatus {
        result: state.store.result().await?,
        completed_at: state.store.completed_at().await?,
        pending: state.store.token().await?.is_some(),
    }))
}
