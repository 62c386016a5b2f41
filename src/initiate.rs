// src/initiate.rs
// Sandbox test token issuing & PayPal redirect building

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::store::{SandboxTestStore, StoreError};

/// Form field that only exists to submit the admin form.
pub const SUBMIT_FIELD: &str = "submit";
pub const CUSTOM_FIELD: &str = "custom";

/// Generates a 32-char lowercase hex token.
///
/// Seeded from a v4 UUID, the clock and a random word, so it cannot be
/// guessed from anything the site exposes.
pub fn generate_token() -> String {
    let mut hasher = Sha256::new();
    hasher.update(Uuid::new_v4().as_bytes());
    hasher.update(
        chrono::Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_default()
            .to_le_bytes(),
    );
    hasher.update(rand::random::<u64>().to_le_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..16])
}

/// Builds the sandbox redirect URL: the original fields minus `submit`,
/// followed by `custom=<token>`.
pub fn build_redirect_url(
    webscr_url: &str,
    fields: &[(String, String)],
    token: &str,
) -> Result<String, serde_urlencoded::ser::Error> {
    let mut args: Vec<(&str, &str)> = fields
        .iter()
        .filter(|(name, _)| name != SUBMIT_FIELD && name != CUSTOM_FIELD)
        .map(|(name, value)| (name.as_str(), value.as_str()))
        .collect();
    args.push((CUSTOM_FIELD, token));

    let query = serde_urlencoded::to_string(&args)?;
    Ok(format!("{}{}", webscr_url, query).replace("&amp;", "&"))
}

/// Issues a fresh token, replacing any outstanding test, and returns the
/// URL the browser should be sent to.
pub async fn start_sandbox_test(
    store: &SandboxTestStore,
    webscr_url: &str,
    fields: &[(String, String)],
) -> Result<String, InitiateError> {
    let token = generate_token();
    store.save_token(&token).await?;

    let url = build_redirect_url(webscr_url, fields, &token)?;
    tracing::info!("[SANDBOX] 🔗 Issued sandbox test token, redirecting to PayPal");
    Ok(url)
}

#[derive(Debug, thiserror::Error)]
pub enum InitiateError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("could not encode PayPal arguments: {0}")]
    Encode(#[from] serde_urlencoded::ser::Error),
}
