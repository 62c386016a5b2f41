// src/email.rs
// Admin notification emails: templates & delivery (SMTP or log-only)

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

use crate::admin::escape_html;
use crate::config::SmtpConfig;
use crate::ipn::VerificationOutcome;

pub const FROM: &str = "Charitable <support@wpcharitable.com>";
pub const REPLY_TO: &str = "support@wpcharitable.com";
pub const CONTENT_TYPE: &str = "text/html; charset=utf-8";

const SIGN_OFF: &str = "<p>Cheers<br />Eric & Wes";

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("could not build message: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("smtp error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub from: String,
    pub reply_to: String,
    pub content_type: String,
    pub subject: String,
    pub html_body: String,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TEMPLATES
// ═══════════════════════════════════════════════════════════════════════════════

pub fn subject_for(outcome: &VerificationOutcome) -> &'static str {
    match outcome {
        VerificationOutcome::Succeeded { .. } => "Your PayPal integration is working",
        VerificationOutcome::Failed { .. } => "Your PayPal test failed",
    }
}

/// Message body without the surrounding layout.
pub fn message_for(outcome: &VerificationOutcome) -> String {
    let mut message = String::new();

    match outcome {
        VerificationOutcome::Succeeded { .. } => {
            message.push_str("<p>Good news! We successfuly received the Instant Payment Notification from PayPal and were able to verify it with them.</p>");
            message.push_str("<p>This means that your website is all set to continue receiving donations through PayPal. You should not experience any issues when PayPal upgrades its SSL certificates.</p>");
        }
        VerificationOutcome::Failed { errors } => {
            message.push_str("<p>We received the Instant Payment Notification from PayPal but were not able to verify its authenticity.");
            message.push_str("<p>Our communicaton with PayPal failed with the following errors:</p>");
            message.push_str("<ul>");
            for error in errors {
                message.push_str(&format!("<li>{}</li>", escape_html(error)));
            }
            message.push_str("</ul>");
            message.push_str("<p>Unfortunately, this means that you are likely to face problems with your PayPal donations. Your donors will still be able to proceed to PayPal and make their donation, but their donations will not be automatically marked as Paid in your WordPress dashboard.</p>");
            message.push_str("<h3>Short-term fix</h3>");
            message.push_str("<p><strong>Disable IPN verification</strong>. This makes your donation verification process less secure, but it will allow your donations to continue getting marked as Paid. To set this up, log into your WordPress dashboard and go to <em>Charitable</em> > <em>Settings</em> > <em>Payment Gateways</em>, select your PayPal settings and enable the \"Disable IPN Verification\" setting.");
            message.push_str("<h3>Long-term solution</h3>");
            message.push_str("<p><strong>Get in touch with your web host</strong>. Please refer them to <a href=\"https://www.paypal-knowledge.com/infocenter/index?page=content&widgetview=true&id=FAQ1766&viewlocale=en_US\">the upgrade information provided by PayPal</a>. You should also provide them with the error message you received from PayPal above.</p>");
            message.push_str("<p>If your web host is unable to upgrade the software on your server, we strongly recommend switching to a hosting platform that provides a more modern, and secure service.</p>");
        }
    }

    message.push_str(SIGN_OFF);
    message
}

/// Wraps a message in the email header (headline) and footer.
pub fn render_layout(headline: &str, message: &str) -> String {
    format!(
        concat!(
            "<!DOCTYPE html><html><head><meta charset=\"utf-8\" /></head>",
            "<body style=\"background:#f6f6f6;font-family:Helvetica,Arial,sans-serif;\">",
            "<div style=\"max-width:600px;margin:0 auto;background:#fff;padding:24px;\">",
            "<h1 style=\"font-size:22px;\">{}</h1>",
            "{}",
            "</div>",
            "<p style=\"text-align:center;font-size:12px;color:#999;\">Sent by the Charitable PayPal Tester</p>",
            "</body></html>"
        ),
        headline, message
    )
}

pub fn compose_report(outcome: &VerificationOutcome, admin_email: &str) -> EmailMessage {
    let subject = subject_for(outcome);
    EmailMessage {
        to: admin_email.to_string(),
        from: FROM.to_string(),
        reply_to: REPLY_TO.to_string(),
        content_type: CONTENT_TYPE.to_string(),
        subject: subject.to_string(),
        html_body: render_layout(subject, &message_for(outcome)),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DELIVERY
// ═══════════════════════════════════════════════════════════════════════════════

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &EmailMessage) -> Result<(), MailError>;
}

/// Writes the message to the log instead of delivering it.
#[derive(Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &EmailMessage) -> Result<(), MailError> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            "[MAIL] 📧 No SMTP relay configured, message logged only"
        );
        tracing::debug!("[MAIL] body: {}", email.html_body);
        Ok(())
    }
}

#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Self {
        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(config.host.as_str())
                .port(config.port);
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }
        Self {
            transport: builder.build(),
        }
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &EmailMessage) -> Result<(), MailError> {
        let message = Message::builder()
            .from(email.from.parse::<Mailbox>()?)
            .reply_to(email.reply_to.parse::<Mailbox>()?)
            .to(email.to.parse::<Mailbox>()?)
            .subject(email.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(email.html_body.clone())?;

        self.transport.send(message).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_email_uses_success_template() {
        let email = compose_report(
            &VerificationOutcome::Succeeded { status: 200 },
            "admin@example.com",
        );
        assert_eq!(email.subject, "Your PayPal integration is working");
        assert!(email.html_body.contains("Good news!"));
        assert!(email.html_body.contains("<h1 style=\"font-size:22px;\">Your PayPal integration is working</h1>"));
        assert!(!email.html_body.contains("<ul>"));
        assert_eq!(email.to, "admin@example.com");
        assert_eq!(email.reply_to, REPLY_TO);
    }

    #[test]
    fn failure_email_lists_every_error() {
        let outcome = VerificationOutcome::Failed {
            errors: vec![
                "Connection timed out".to_string(),
                "tls handshake eof".to_string(),
            ],
        };
        let body = message_for(&outcome);
        assert!(body.contains("<li>Connection timed out</li>"));
        assert!(body.contains("<li>tls handshake eof</li>"));
        assert!(body.contains("Disable IPN verification"));
        assert!(body.contains("Get in touch with your web host"));
        assert_eq!(subject_for(&outcome), "Your PayPal test failed");
    }

    #[test]
    fn error_text_is_escaped_in_body() {
        let outcome = VerificationOutcome::Failed {
            errors: vec![
                "error sending request for url (https://ipnpb.sandbox.paypal.com/cgi-bin/webscr?a=1&b=<2>)"
                    .to_string(),
            ],
        };
        let body = message_for(&outcome);
        assert!(body.contains(
            "<li>error sending request for url (https://ipnpb.sandbox.paypal.com/cgi-bin/webscr?a=1&amp;b=&lt;2&gt;)</li>"
        ));
        assert!(!body.contains("b=<2>"));
    }
}
