// src/admin.rs
// Settings-page tool rendering & return navigation

use crate::config::TesterConfig;
use crate::store::TestResult;

pub const PAYPAL_SETTINGS_GROUP: &str = "gateways_paypal";

/// Where the browser lands after returning from the PayPal sandbox.
pub fn settings_return_url(admin_url: &str) -> String {
    let args: &[(&str, &str)] = &[
        ("page", "charitable-settings"),
        ("tab", "gateways"),
        ("group", PAYPAL_SETTINGS_GROUP),
        ("sandbox_test", "1"),
    ];
    let query = serde_urlencoded::to_string(args).unwrap_or_default();
    format!("{}admin.php?{}", admin_url, query)
}

fn notice_html(result: Option<TestResult>) -> &'static str {
    match result {
        Some(TestResult::Succeeded) => "<div class=\"notice notice-success\"><p><strong>Your PayPal integration is working.</strong> We received the Instant Payment Notification from PayPal and were able to verify it.</p></div>",
        Some(TestResult::Failed) => "<div class=\"notice notice-error\"><p><strong>Your PayPal test failed.</strong> Check your email for the errors PayPal reported and how to fix them.</p></div>",
        None => "",
    }
}

fn hidden(name: &str, value: &str) -> String {
    format!(
        "<input type=\"hidden\" name=\"{}\" value=\"{}\" />",
        escape_html(name),
        escape_html(value)
    )
}

/// Escapes text for HTML element content and quoted attributes.
pub fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Renders the sandbox tester for a settings group.
///
/// Returns `None` for every group except the PayPal gateway settings.
/// `notice` is the stored result when the notice marker was still set.
pub fn render_tool(group: &str, config: &TesterConfig, notice: Option<TestResult>) -> Option<String> {
    if group != PAYPAL_SETTINGS_GROUP {
        return None;
    }

    let mut html = String::new();
    html.push_str(notice_html(notice));
    html.push_str("<div class=\"charitable-paypal-tester\">");
    html.push_str("<h3>Test your PayPal integration</h3>");
    html.push_str("<p>Make a $1 donation in the PayPal sandbox. When PayPal sends the Instant Payment Notification back to your site we will try to verify it and email the result to the site administrator.</p>");
    html.push_str("<form method=\"post\" action=\"/paypal/sandbox-test\">");

    let fields = [
        ("cmd", "_donations".to_string()),
        ("business", config.sandbox_business.clone()),
        ("item_name", "PayPal Sandbox Test".to_string()),
        ("amount", "1.00".to_string()),
        ("currency_code", "USD".to_string()),
        ("notify_url", config.notify_url()),
        ("return", config.return_url()),
        ("no_shipping", "1".to_string()),
        ("no_note", "1".to_string()),
    ];
    for (name, value) in &fields {
        html.push_str(&hidden(name, value));
    }

    html.push_str("<input type=\"submit\" name=\"submit\" class=\"button button-secondary\" value=\"Test PayPal\" />");
    html.push_str("</form></div>");
    Some(html)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn return_url_selects_paypal_tab() {
        assert_eq!(
            settings_return_url("https://give.example.org/wp-admin/"),
            "https://give.example.org/wp-admin/admin.php?page=charitable-settings&tab=gateways&group=gateways_paypal&sandbox_test=1"
        );
    }

    #[test]
    fn other_groups_render_nothing() {
        let config = TesterConfig::default();
        assert!(render_tool("gateways_offline", &config, None).is_none());
        assert!(render_tool("general", &config, Some(TestResult::Failed)).is_none());
    }

    #[test]
    fn paypal_group_renders_form_posting_to_initiate() {
        let config = TesterConfig::default();
        let html = render_tool(PAYPAL_SETTINGS_GROUP, &config, None).unwrap();
        assert!(html.contains("action=\"/paypal/sandbox-test\""));
        assert!(html.contains("name=\"notify_url\" value=\"http://localhost:3000/paypal/ipn\""));
        assert!(html.contains("name=\"submit\""));
        assert!(!html.contains("notice-"));
    }

    #[test]
    fn notice_reflects_result() {
        let config = TesterConfig::default();
        let html = render_tool(PAYPAL_SETTINGS_GROUP, &config, Some(TestResult::Succeeded)).unwrap();
        assert!(html.contains("notice-success"));
    }

    #[test]
    fn attribute_values_are_escaped() {
        assert_eq!(hidden("n", "a\"b&c"), "<input type=\"hidden\" name=\"n\" value=\"a&quot;b&amp;c\" />");
    }
}
