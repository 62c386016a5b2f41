// src/config.rs
// Environment-driven configuration for the sandbox tester.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

// ═══════════════════════════════════════════════════════════════════════════════
// SMTP SETTINGS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTER CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct TesterConfig {
    pub port: u16,
    pub site_url: String,
    pub admin_url: String,
    pub admin_email: String,
    pub sandbox_business: String,
    pub sandbox_host: String,
    pub ipn_verify_url: String,
    pub option_prefix: String,
    /// `None` keeps the result notice until the settings page shows it.
    pub notice_ttl: Option<Duration>,
    pub redis_url: Option<String>,
    pub smtp: Option<SmtpConfig>,
}

impl Default for TesterConfig {
    fn default() -> Self {
        let site_url = "http://localhost:3000".to_string();
        Self {
            port: 3000,
            admin_url: format!("{}/wp-admin/", site_url),
            site_url,
            admin_email: "admin@example.com".to_string(),
            sandbox_business: "sandbox-merchant@example.com".to_string(),
            sandbox_host: "www.sandbox.paypal.com".to_string(),
            ipn_verify_url: "https://ipnpb.sandbox.paypal.com/cgi-bin/webscr".to_string(),
            option_prefix: "charitable_".to_string(),
            notice_ttl: None,
            redis_url: None,
            smtp: None,
        }
    }
}

impl TesterConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = parse_or(&lookup, "PORT", defaults.port)?;
        let site_url = lookup("SITE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.site_url);
        if !(site_url.starts_with("http://") || site_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                var: "SITE_URL",
                value: site_url,
            });
        }

        let mut admin_url =
            lookup("ADMIN_URL").unwrap_or_else(|| format!("{}/wp-admin/", site_url));
        if !admin_url.ends_with('/') {
            admin_url.push('/');
        }

        let smtp = match lookup("SMTP_HOST") {
            Some(host) => Some(SmtpConfig {
                host,
                port: parse_or(&lookup, "SMTP_PORT", 25)?,
                username: lookup("SMTP_USERNAME"),
                password: lookup("SMTP_PASSWORD"),
            }),
            None => None,
        };

        Ok(Self {
            port,
            site_url,
            admin_url,
            admin_email: lookup("ADMIN_EMAIL").unwrap_or(defaults.admin_email),
            sandbox_business: lookup("PAYPAL_SANDBOX_BUSINESS")
                .unwrap_or(defaults.sandbox_business),
            sandbox_host: lookup("PAYPAL_SANDBOX_URL_HOST").unwrap_or(defaults.sandbox_host),
            ipn_verify_url: lookup("PAYPAL_IPN_VERIFY_URL").unwrap_or(defaults.ipn_verify_url),
            option_prefix: lookup("OPTION_PREFIX").unwrap_or(defaults.option_prefix),
            notice_ttl: match parse_or::<_, u64>(&lookup, "NOTICE_TTL_SECS", 0)? {
                0 => defaults.notice_ttl,
                secs => Some(Duration::from_secs(secs)),
            },
            redis_url: lookup("REDIS_URL"),
            smtp,
        })
    }

    /// Whether the public site is served over TLS.
    pub fn is_ssl(&self) -> bool {
        self.site_url.starts_with("https://")
    }

    pub fn sandbox_webscr_url(&self) -> String {
        let scheme = if self.is_ssl() { "https" } else { "http" };
        format!("{}://{}/cgi-bin/webscr/?", scheme, self.sandbox_host)
    }

    pub fn notify_url(&self) -> String {
        format!("{}/paypal/ipn", self.site_url)
    }

    pub fn return_url(&self) -> String {
        format!("{}/paypal/sandbox-test/return", self.site_url)
    }
}

fn parse_or<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(var) {
        Some(value) => {
            let parsed = value.trim().parse::<T>();
            parsed.map_err(|_| ConfigError::Invalid { var, value })
        }
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let config = TesterConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.port, 3000);
        assert!(!config.is_ssl());
        assert_eq!(config.admin_url, "http://localhost:3000/wp-admin/");
        assert!(config.smtp.is_none());
        assert!(config.redis_url.is_none());
        assert_eq!(config.notice_ttl, None);
    }

    #[test]
    fn notice_ttl_is_opt_in() {
        let config =
            TesterConfig::from_lookup(lookup_from(&[("NOTICE_TTL_SECS", "600")])).unwrap();
        assert_eq!(config.notice_ttl, Some(Duration::from_secs(600)));

        let config = TesterConfig::from_lookup(lookup_from(&[("NOTICE_TTL_SECS", "0")])).unwrap();
        assert_eq!(config.notice_ttl, None);
    }

    #[test]
    fn https_site_switches_sandbox_scheme() {
        let config =
            TesterConfig::from_lookup(lookup_from(&[("SITE_URL", "https://give.example.org/")]))
                .unwrap();
        assert!(config.is_ssl());
        assert_eq!(
            config.sandbox_webscr_url(),
            "https://www.sandbox.paypal.com/cgi-bin/webscr/?"
        );
        assert_eq!(config.notify_url(), "https://give.example.org/paypal/ipn");
    }

    #[test]
    fn smtp_settings_need_a_host() {
        let config = TesterConfig::from_lookup(lookup_from(&[
            ("SMTP_HOST", "mail.local"),
            ("SMTP_PORT", "1025"),
        ]))
        .unwrap();
        let smtp = config.smtp.unwrap();
        assert_eq!(smtp.host, "mail.local");
        assert_eq!(smtp.port, 1025);
    }

    #[test]
    fn rejects_bad_port() {
        let err = TesterConfig::from_lookup(lookup_from(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "PORT", .. }));
    }

    #[test]
    fn rejects_site_url_without_scheme() {
        let err =
            TesterConfig::from_lookup(lookup_from(&[("SITE_URL", "give.example.org")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "SITE_URL", .. }));
    }
}
