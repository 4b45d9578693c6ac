//! Workflow configuration.
//!
//! One immutable value constructed up front and handed to the orchestrator.
//! Nothing in the crate reads ambient globals; the binary builds this from
//! `GATEKEEPER_*` environment variables, tests build it directly.

use std::env;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::captcha::CaptchaConfig;

pub const DEFAULT_QUANTITY: u32 = 1;
pub const DEFAULT_TTL_MINUTES: u32 = 10;
const DEFAULT_SOLVER_URL: &str = "https://api.capsolver.com";

/// Errors raised while assembling or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing configuration value: {0}")]
    Missing(&'static str),
    #[error("{name} is still set to a placeholder value")]
    Placeholder { name: &'static str },
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Immutable configuration for one workflow instance.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub api_key: String,
    pub website_url: Url,
    pub website_key: String,
    pub gatekeeper_url: Url,
    pub cart_url: Url,
    pub shop_domain: String,
    pub variant_id: String,
    pub quantity: u32,
    pub ttl_minutes: u32,
    pub solver_url: Url,
    pub captcha: CaptchaConfig,
}

impl WorkflowConfig {
    pub fn builder() -> WorkflowConfigBuilder {
        WorkflowConfigBuilder::new()
    }

    /// Build configuration from `GATEKEEPER_*` environment variables.
    ///
    /// Required: `GATEKEEPER_API_KEY`, `GATEKEEPER_WEBSITE_URL`,
    /// `GATEKEEPER_WEBSITE_KEY`, `GATEKEEPER_TOKEN_URL`,
    /// `GATEKEEPER_CART_URL`, `GATEKEEPER_SHOP_DOMAIN`,
    /// `GATEKEEPER_VARIANT_ID`. Optional with defaults:
    /// `GATEKEEPER_QUANTITY` (1), `GATEKEEPER_TTL_MINUTES` (10),
    /// `GATEKEEPER_MAX_POLLS` (30), `GATEKEEPER_POLL_INTERVAL_SECS` (2),
    /// `GATEKEEPER_SOLVER_URL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) but with an injectable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::builder()
            .api_key(require(&lookup, "GATEKEEPER_API_KEY")?)
            .website_url(parse_url(
                "GATEKEEPER_WEBSITE_URL",
                &require(&lookup, "GATEKEEPER_WEBSITE_URL")?,
            )?)
            .website_key(require(&lookup, "GATEKEEPER_WEBSITE_KEY")?)
            .gatekeeper_url(parse_url(
                "GATEKEEPER_TOKEN_URL",
                &require(&lookup, "GATEKEEPER_TOKEN_URL")?,
            )?)
            .cart_url(parse_url(
                "GATEKEEPER_CART_URL",
                &require(&lookup, "GATEKEEPER_CART_URL")?,
            )?)
            .shop_domain(require(&lookup, "GATEKEEPER_SHOP_DOMAIN")?)
            .variant_id(require(&lookup, "GATEKEEPER_VARIANT_ID")?);

        if let Some(value) = lookup("GATEKEEPER_QUANTITY") {
            builder = builder.quantity(parse_number("GATEKEEPER_QUANTITY", &value)?);
        }
        if let Some(value) = lookup("GATEKEEPER_TTL_MINUTES") {
            builder = builder.ttl_minutes(parse_number("GATEKEEPER_TTL_MINUTES", &value)?);
        }
        if let Some(value) = lookup("GATEKEEPER_MAX_POLLS") {
            builder = builder.max_polls(parse_number("GATEKEEPER_MAX_POLLS", &value)?);
        }
        if let Some(value) = lookup("GATEKEEPER_POLL_INTERVAL_SECS") {
            let secs: u64 = parse_number("GATEKEEPER_POLL_INTERVAL_SECS", &value)?;
            builder = builder.poll_interval(Duration::from_secs(secs));
        }
        if let Some(value) = lookup("GATEKEEPER_SOLVER_URL") {
            builder = builder.solver_url(parse_url("GATEKEEPER_SOLVER_URL", &value)?);
        }

        builder.build()
    }
}

/// Fluent builder for [`WorkflowConfig`].
#[derive(Debug, Default)]
pub struct WorkflowConfigBuilder {
    api_key: Option<String>,
    website_url: Option<Url>,
    website_key: Option<String>,
    gatekeeper_url: Option<Url>,
    cart_url: Option<Url>,
    shop_domain: Option<String>,
    variant_id: Option<String>,
    quantity: Option<u32>,
    ttl_minutes: Option<u32>,
    solver_url: Option<Url>,
    max_polls: Option<u32>,
    poll_interval: Option<Duration>,
}

impl WorkflowConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn api_key(mut self, value: impl Into<String>) -> Self {
        self.api_key = Some(value.into());
        self
    }

    pub fn website_url(mut self, value: Url) -> Self {
        self.website_url = Some(value);
        self
    }

    pub fn website_key(mut self, value: impl Into<String>) -> Self {
        self.website_key = Some(value.into());
        self
    }

    pub fn gatekeeper_url(mut self, value: Url) -> Self {
        self.gatekeeper_url = Some(value);
        self
    }

    pub fn cart_url(mut self, value: Url) -> Self {
        self.cart_url = Some(value);
        self
    }

    pub fn shop_domain(mut self, value: impl Into<String>) -> Self {
        self.shop_domain = Some(value.into());
        self
    }

    pub fn variant_id(mut self, value: impl Into<String>) -> Self {
        self.variant_id = Some(value.into());
        self
    }

    pub fn quantity(mut self, value: u32) -> Self {
        self.quantity = Some(value);
        self
    }

    pub fn ttl_minutes(mut self, value: u32) -> Self {
        self.ttl_minutes = Some(value);
        self
    }

    pub fn solver_url(mut self, value: Url) -> Self {
        self.solver_url = Some(value);
        self
    }

    pub fn max_polls(mut self, value: u32) -> Self {
        self.max_polls = Some(value);
        self
    }

    pub fn poll_interval(mut self, value: Duration) -> Self {
        self.poll_interval = Some(value);
        self
    }

    pub fn build(self) -> Result<WorkflowConfig, ConfigError> {
        let api_key = non_empty("GATEKEEPER_API_KEY", self.api_key)?;
        if is_placeholder(&api_key) {
            return Err(ConfigError::Placeholder {
                name: "GATEKEEPER_API_KEY",
            });
        }

        let defaults = CaptchaConfig::default();
        let max_polls = self.max_polls.unwrap_or(defaults.max_polls);
        if max_polls == 0 {
            return Err(ConfigError::Invalid {
                name: "GATEKEEPER_MAX_POLLS",
                reason: "must be at least 1".into(),
            });
        }

        Ok(WorkflowConfig {
            api_key,
            website_url: self
                .website_url
                .ok_or(ConfigError::Missing("GATEKEEPER_WEBSITE_URL"))?,
            website_key: non_empty("GATEKEEPER_WEBSITE_KEY", self.website_key)?,
            gatekeeper_url: self
                .gatekeeper_url
                .ok_or(ConfigError::Missing("GATEKEEPER_TOKEN_URL"))?,
            cart_url: self
                .cart_url
                .ok_or(ConfigError::Missing("GATEKEEPER_CART_URL"))?,
            shop_domain: non_empty("GATEKEEPER_SHOP_DOMAIN", self.shop_domain)?,
            variant_id: non_empty("GATEKEEPER_VARIANT_ID", self.variant_id)?,
            quantity: self.quantity.unwrap_or(DEFAULT_QUANTITY),
            ttl_minutes: self.ttl_minutes.unwrap_or(DEFAULT_TTL_MINUTES),
            solver_url: self
                .solver_url
                .unwrap_or_else(|| Url::parse(DEFAULT_SOLVER_URL).expect("invalid default url")),
            captcha: CaptchaConfig {
                max_polls,
                poll_interval: self.poll_interval.unwrap_or(defaults.poll_interval),
            },
        })
    }
}

// Vendor dashboards hand out keys as YOUR_..._HERE templates.
fn is_placeholder(value: &str) -> bool {
    value.starts_with("YOUR_") && value.ends_with("_HERE")
}

fn require<F>(lookup: &F, name: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .filter(|value| !value.trim().is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn non_empty(name: &'static str, value: Option<String>) -> Result<String, ConfigError> {
    value
        .filter(|value| !value.trim().is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn parse_url(name: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|err| ConfigError::Invalid {
        name,
        reason: err.to_string(),
    })
}

fn parse_number<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|err: T::Err| ConfigError::Invalid {
        name,
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_vars() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("GATEKEEPER_API_KEY", "real-api-key"),
            ("GATEKEEPER_WEBSITE_URL", "https://www.example.com/"),
            ("GATEKEEPER_WEBSITE_KEY", "0x4AAAAAAB"),
            (
                "GATEKEEPER_TOKEN_URL",
                "https://gatekeeper.example.com/api/gatekeeper-token",
            ),
            ("GATEKEEPER_CART_URL", "https://www.example.com/cart/add.js"),
            ("GATEKEEPER_SHOP_DOMAIN", "store-example.myshopify.com"),
            ("GATEKEEPER_VARIANT_ID", "55041037336956"),
        ])
    }

    fn lookup_in(vars: HashMap<&'static str, &'static str>) -> impl Fn(&str) -> Option<String> {
        move |name| vars.get(name).map(|value| value.to_string())
    }

    #[test]
    fn from_lookup_applies_defaults() {
        let config = WorkflowConfig::from_lookup(lookup_in(base_vars())).expect("should build");
        assert_eq!(config.quantity, 1);
        assert_eq!(config.ttl_minutes, 10);
        assert_eq!(config.captcha.max_polls, 30);
        assert_eq!(config.captcha.poll_interval, Duration::from_secs(2));
        assert_eq!(config.solver_url.as_str(), "https://api.capsolver.com/");
    }

    #[test]
    fn from_lookup_honours_overrides() {
        let mut vars = base_vars();
        vars.insert("GATEKEEPER_QUANTITY", "3");
        vars.insert("GATEKEEPER_MAX_POLLS", "12");
        vars.insert("GATEKEEPER_POLL_INTERVAL_SECS", "1");
        vars.insert("GATEKEEPER_SOLVER_URL", "http://127.0.0.1:9000/");

        let config = WorkflowConfig::from_lookup(lookup_in(vars)).expect("should build");
        assert_eq!(config.quantity, 3);
        assert_eq!(config.captcha.max_polls, 12);
        assert_eq!(config.captcha.poll_interval, Duration::from_secs(1));
        assert_eq!(config.solver_url.as_str(), "http://127.0.0.1:9000/");
    }

    #[test]
    fn missing_key_is_reported_by_name() {
        let mut vars = base_vars();
        vars.remove("GATEKEEPER_VARIANT_ID");
        let err = WorkflowConfig::from_lookup(lookup_in(vars)).expect_err("should fail");
        assert!(matches!(err, ConfigError::Missing("GATEKEEPER_VARIANT_ID")));
    }

    #[test]
    fn placeholder_api_key_is_rejected_before_any_network_use() {
        let mut vars = base_vars();
        vars.insert("GATEKEEPER_API_KEY", "YOUR_CAPMONSTER_CLOUD_API_KEY_HERE");
        let err = WorkflowConfig::from_lookup(lookup_in(vars)).expect_err("should fail");
        assert!(matches!(err, ConfigError::Placeholder { .. }));
    }

    #[test]
    fn invalid_url_is_rejected() {
        let mut vars = base_vars();
        vars.insert("GATEKEEPER_CART_URL", "not a url");
        let err = WorkflowConfig::from_lookup(lookup_in(vars)).expect_err("should fail");
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: "GATEKEEPER_CART_URL",
                ..
            }
        ));
    }

    #[test]
    fn zero_poll_cap_is_rejected() {
        let mut vars = base_vars();
        vars.insert("GATEKEEPER_MAX_POLLS", "0");
        let err = WorkflowConfig::from_lookup(lookup_in(vars)).expect_err("should fail");
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: "GATEKEEPER_MAX_POLLS",
                ..
            }
        ));
    }
}
