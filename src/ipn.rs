// src/ipn.rs
// IPN decoding, anti-spoofing token check & round-trip verification with PayPal

use async_trait::async_trait;
use reqwest::{header, redirect, Client};
use serde::Serialize;
use std::error::Error as StdError;
use std::time::Duration;
use thiserror::Error;

use crate::initiate::CUSTOM_FIELD;
use crate::store::{SandboxTestStore, StoreError, TestResult};

pub const VERIFY_TIMEOUT: Duration = Duration::from_secs(45);
pub const MAX_REDIRECTS: usize = 5;

// ═══════════════════════════════════════════════════════════════════════════════
// PAYLOAD
// ═══════════════════════════════════════════════════════════════════════════════

/// An IPN callback: the body exactly as received plus its decoded fields.
///
/// Fields are decoded as UTF-8 for lookups only; the verification call
/// echoes `raw` so bytes in other charsets reach PayPal untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpnPayload {
    fields: Vec<(String, String)>,
    raw: Vec<u8>,
}

impl IpnPayload {
    /// Builds a payload from fields, form-encoding them as the raw body.
    pub fn new(fields: Vec<(String, String)>) -> Self {
        let raw = serde_urlencoded::to_string(&fields)
            .unwrap_or_default()
            .into_bytes();
        Self { fields, raw }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }
}

#[derive(Debug, Error)]
pub enum IpnError {
    #[error("empty or undecodable IPN payload")]
    MalformedCallback,
    #[error("missing or mismatched custom data")]
    TokenMismatch,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Decodes a raw `application/x-www-form-urlencoded` IPN body.
pub fn decode_ipn(body: &[u8]) -> Result<IpnPayload, IpnError> {
    let fields: Vec<(String, String)> =
        serde_urlencoded::from_bytes(body).map_err(|_| IpnError::MalformedCallback)?;
    if fields.is_empty() {
        return Err(IpnError::MalformedCallback);
    }
    Ok(IpnPayload {
        fields,
        raw: body.to_vec(),
    })
}

/// Checks the `custom` field against the outstanding token. Never mutates state.
pub async fn validate_token(payload: &IpnPayload, store: &SandboxTestStore) -> Result<(), IpnError> {
    if payload.is_empty() {
        return Err(IpnError::MalformedCallback);
    }

    let expected = store.token().await?;
    match (payload.get(CUSTOM_FIELD), expected.as_deref()) {
        (Some(received), Some(expected)) if received == expected => Ok(()),
        _ => Err(IpnError::TokenMismatch),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// VERIFICATION CALL
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum VerificationOutcome {
    /// PayPal answered; the body is not inspected.
    Succeeded { status: u16 },
    Failed { errors: Vec<String> },
}

impl VerificationOutcome {
    pub fn result(&self) -> TestResult {
        match self {
            VerificationOutcome::Succeeded { .. } => TestResult::Succeeded,
            VerificationOutcome::Failed { .. } => TestResult::Failed,
        }
    }
}

/// Re-posts a payload to PayPal. `Err` carries transport-level error messages.
#[async_trait]
pub trait IpnTransport: Send + Sync {
    async fn post(&self, payload: &IpnPayload) -> Result<u16, Vec<String>>;
}

#[derive(Clone)]
pub struct ReqwestIpnTransport {
    http_client: Client,
    verify_url: String,
}

impl ReqwestIpnTransport {
    pub fn new(verify_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        // The sandbox endpoint historically served certificates older stacks rejected.
        let http_client = Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(VERIFY_TIMEOUT)
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .http1_only()
            .build()?;

        Ok(Self {
            http_client,
            verify_url: verify_url.into(),
        })
    }
}

#[async_trait]
impl IpnTransport for ReqwestIpnTransport {
    async fn post(&self, payload: &IpnPayload) -> Result<u16, Vec<String>> {
        let resp = self
            .http_client
            .post(&self.verify_url)
            .header(header::HOST, "www.paypal.com")
            .header(header::CONNECTION, "close")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(payload.raw().to_vec())
            .send()
            .await
            .map_err(|e| error_messages(&e))?;

        Ok(resp.status().as_u16())
    }
}

/// Flattens an error and its sources into one message per level.
pub fn error_messages(error: &(dyn StdError + 'static)) -> Vec<String> {
    let mut messages = vec![error.to_string()];
    let mut source = error.source();
    while let Some(cause) = source {
        let message = cause.to_string();
        if !messages.contains(&message) {
            messages.push(message);
        }
        source = cause.source();
    }
    messages
}

// ═══════════════════════════════════════════════════════════════════════════════
// VERIFIER
// ═══════════════════════════════════════════════════════════════════════════════

pub struct IpnVerifier<T: IpnTransport + ?Sized> {
    transport: std::sync::Arc<T>,
}

impl<T: IpnTransport + ?Sized> IpnVerifier<T> {
    pub fn new(transport: std::sync::Arc<T>) -> Self {
        Self { transport }
    }

    /// Validates the callback and performs the verification round-trip.
    ///
    /// On `Err` nothing has been sent and nothing has been stored.
    pub async fn receive(
        &self,
        payload: &IpnPayload,
        store: &SandboxTestStore,
    ) -> Result<VerificationOutcome, IpnError> {
        validate_token(payload, store).await?;
        Ok(self.verify(payload).await)
    }

    pub async fn verify(&self, payload: &IpnPayload) -> VerificationOutcome {
        match self.transport.post(payload).await {
            Ok(status) => {
                tracing::info!("[IPN] ✅ PayPal answered verification call ({})", status);
                VerificationOutcome::Succeeded { status }
            }
            Err(errors) => {
                tracing::warn!("[IPN] ❌ Verification call failed: {:?}", errors);
                VerificationOutcome::Failed { errors }
            }
        }
    }
}
