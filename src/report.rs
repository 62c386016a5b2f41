// src/report.rs
// Persists a sandbox test outcome and notifies the site administrator

use chrono::Utc;
use std::sync::Arc;

use crate::email::{compose_report, EmailMessage, Mailer};
use crate::ipn::VerificationOutcome;
use crate::store::{SandboxTestStore, StoreError};

#[derive(Clone)]
pub struct Reporter {
    store: SandboxTestStore,
    mailer: Arc<dyn Mailer>,
    admin_email: String,
}

impl Reporter {
    pub fn new(store: SandboxTestStore, mailer: Arc<dyn Mailer>, admin_email: impl Into<String>) -> Self {
        Self {
            store,
            mailer,
            admin_email: admin_email.into(),
        }
    }

    /// Records the outcome, consumes the token and emails the admin.
    ///
    /// Store failures are returned; mail failures are logged and dropped.
    pub async fn report(&self, outcome: &VerificationOutcome) -> Result<EmailMessage, StoreError> {
        let result = outcome.result();

        self.store.save_result(result, Utc::now()).await?;
        self.store.clear_token().await?;
        self.store.flag_notice().await?;
        self.store.clear_upgrade_notice().await?;

        tracing::info!("[REPORT] 📝 Sandbox test {}", result.as_str());

        let email = compose_report(outcome, &self.admin_email);
        if let Err(e) = self.mailer.send(&email).await {
            tracing::error!("[REPORT] ❌ Could not email {}: {}", email.to, e);
        }

        Ok(email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::MailError;
    use crate::store::{KeyValueStore, MemoryStore, TestResult};
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<EmailMessage>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: &EmailMessage) -> Result<(), MailError> {
            self.sent.lock().await.push(email.clone());
            Ok(())
        }
    }

    struct BrokenMailer;

    #[async_trait]
    impl Mailer for BrokenMailer {
        async fn send(&self, _email: &EmailMessage) -> Result<(), MailError> {
            Err(MailError::Address(
                "not an address".parse::<lettre::Address>().unwrap_err(),
            ))
        }
    }

    fn store() -> SandboxTestStore {
        SandboxTestStore::new(Arc::new(MemoryStore::new()), "charitable_", None)
    }

    #[tokio::test]
    async fn success_clears_token_and_sends_one_email() {
        let store = store();
        store.save_token("tok").await.unwrap();
        let mailer = Arc::new(RecordingMailer::default());
        let reporter = Reporter::new(store.clone(), mailer.clone(), "admin@example.com");

        reporter
            .report(&VerificationOutcome::Succeeded { status: 200 })
            .await
            .unwrap();

        assert_eq!(store.token().await.unwrap(), None);
        assert_eq!(store.result().await.unwrap(), Some(TestResult::Succeeded));
        let sent = mailer.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Your PayPal integration is working");
    }

    #[tokio::test]
    async fn failure_lists_errors_and_still_clears_token() {
        let store = store();
        store.save_token("tok").await.unwrap();
        let mailer = Arc::new(RecordingMailer::default());
        let reporter = Reporter::new(store.clone(), mailer.clone(), "admin@example.com");

        let email = reporter
            .report(&VerificationOutcome::Failed {
                errors: vec!["Connection timed out".to_string()],
            })
            .await
            .unwrap();

        assert!(email.html_body.contains("<li>Connection timed out</li>"));
        assert_eq!(store.token().await.unwrap(), None);
        assert_eq!(store.result().await.unwrap(), Some(TestResult::Failed));
    }

    #[tokio::test]
    async fn reporting_twice_overwrites() {
        let store = store();
        let reporter = Reporter::new(store.clone(), Arc::new(RecordingMailer::default()), "a@b.c");
        let outcome = VerificationOutcome::Failed { errors: vec![] };

        reporter.report(&outcome).await.unwrap();
        reporter.report(&outcome).await.unwrap();

        assert_eq!(store.result().await.unwrap(), Some(TestResult::Failed));
        assert_eq!(
            store.kv().get("charitable_paypal_sandbox_test").await.unwrap().as_deref(),
            Some("failed")
        );
    }

    #[tokio::test]
    async fn notices_are_swapped() {
        let store = store();
        store
            .kv()
            .set("charitable_release-143-paypal_notice", "1")
            .await
            .unwrap();
        let reporter = Reporter::new(store.clone(), Arc::new(RecordingMailer::default()), "a@b.c");

        reporter
            .report(&VerificationOutcome::Succeeded { status: 200 })
            .await
            .unwrap();

        assert_eq!(
            store.kv().get("charitable_release-143-paypal_notice").await.unwrap(),
            None
        );
        assert!(store.take_notice().await.unwrap());
    }

    #[tokio::test]
    async fn mail_failure_is_swallowed() {
        let store = store();
        store.save_token("tok").await.unwrap();
        let reporter = Reporter::new(store.clone(), Arc::new(BrokenMailer), "admin@example.com");

        let result = reporter
            .report(&VerificationOutcome::Succeeded { status: 200 })
            .await;

        assert!(result.is_ok());
        assert_eq!(store.token().await.unwrap(), None);
    }
}
