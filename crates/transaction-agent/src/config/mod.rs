// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Agent configuration.
//!
//! An [`AgentConfig`] is an immutable snapshot shared by every component of an
//! agent for its whole lifetime. It is built either programmatically through
//! [`AgentConfigBuilder`] or from `TX_AGENT_*` environment variables with
//! [`AgentConfig::from_env`].
//!
//! # Environment variables
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `TX_AGENT_ENABLED` | turn the agent on | `false` |
//! | `TX_AGENT_URL` | ingestion endpoint | required when enabled |
//! | `TX_AGENT_API_KEY` | API key | required when enabled |
//! | `TX_AGENT_SEND_INTERVAL_MS` | max idle time between buffer polls | `5000` |
//! | `TX_AGENT_SIZE_THRESHOLD` | batch / early-wake threshold | `0` |
//! | `TX_AGENT_GZIP` | gzip request bodies | `false` |
//! | `TX_AGENT_PROXY_HOST`, `TX_AGENT_PROXY_PORT` | HTTP proxy | none |
//! | `TX_AGENT_TIMEOUT_MS` | per-request timeout | `30000` |
//! | `TX_AGENT_LOG_LEVEL` | `trace`..`error` | `info` |
//! | `TX_AGENT_APPLICATIONS`, `TX_AGENT_OPERATIONS`, `TX_AGENT_ID_TYPES`, `TX_AGENT_PAYLOAD_TYPES` | `key:Name,...` tables | empty |

pub mod registry;

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use registry::{KeyNameRegistry, RegistryKind};

pub const DEFAULT_SEND_INTERVAL: Duration = Duration::from_millis(5000);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_OVERLOAD_CHECK_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_WORKERS: usize = 5;

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
}

impl ProxyConfig {
    pub fn url(&self) -> String {
        if self.host.contains("://") {
            format!("{}:{}", self.host, self.port)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }
}

/// When the overload monitor asks for another sender worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverloadTrigger {
    /// Every check that finds the buffer over the limit requests a worker.
    #[default]
    Level,
    /// Only the check that first finds the buffer over the limit requests a
    /// worker; the buffer has to drop back under the limit to re-arm.
    Edge,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverloadConfig {
    pub check_interval: Duration,
    pub max_workers: usize,
    pub trigger: OverloadTrigger,
}

impl Default for OverloadConfig {
    fn default() -> Self {
        Self {
            check_interval: DEFAULT_OVERLOAD_CHECK_INTERVAL,
            max_workers: DEFAULT_MAX_WORKERS,
            trigger: OverloadTrigger::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub api_key: String,
    /// Maximum idle time between buffer polls.
    pub send_interval: Duration,
    /// Early-wake threshold; `<= 1` also forces one record per request.
    pub size_threshold: usize,
    pub gzip_enabled: bool,
    pub proxy: Option<ProxyConfig>,
    pub request_timeout: Duration,
    pub overload: OverloadConfig,
    pub log_level: String,
    pub applications: KeyNameRegistry,
    pub operations: KeyNameRegistry,
    pub id_types: KeyNameRegistry,
    pub payload_types: KeyNameRegistry,
}

impl AgentConfig {
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::default()
    }

    /// A config that turns every agent operation into a no-op.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            endpoint: String::new(),
            api_key: String::new(),
            send_interval: DEFAULT_SEND_INTERVAL,
            size_threshold: 0,
            gzip_enabled: false,
            proxy: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            overload: OverloadConfig::default(),
            log_level: "info".to_string(),
            applications: KeyNameRegistry::new(RegistryKind::Applications),
            operations: KeyNameRegistry::new(RegistryKind::Operations),
            id_types: KeyNameRegistry::new(RegistryKind::IdTypes),
            payload_types: KeyNameRegistry::new(RegistryKind::PayloadTypes),
        }
    }

    /// Create configuration from `TX_AGENT_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut builder = AgentConfigBuilder::default()
            .enabled(parse_env_bool("TX_AGENT_ENABLED")?.unwrap_or(false));

        if let Ok(endpoint) = env::var("TX_AGENT_URL") {
            builder = builder.endpoint(endpoint);
        }
        if let Ok(api_key) = env::var("TX_AGENT_API_KEY") {
            builder = builder.api_key(api_key);
        }
        if let Some(ms) = parse_env::<u64>("TX_AGENT_SEND_INTERVAL_MS")? {
            builder = builder.send_interval(Duration::from_millis(ms));
        }
        if let Some(threshold) = parse_env::<usize>("TX_AGENT_SIZE_THRESHOLD")? {
            builder = builder.size_threshold(threshold);
        }
        if let Some(gzip) = parse_env_bool("TX_AGENT_GZIP")? {
            builder = builder.gzip_enabled(gzip);
        }
        if let Some(ms) = parse_env::<u64>("TX_AGENT_TIMEOUT_MS")? {
            builder = builder.request_timeout(Duration::from_millis(ms));
        }
        if let Ok(host) = env::var("TX_AGENT_PROXY_HOST") {
            let port = parse_env::<u16>("TX_AGENT_PROXY_PORT")?
                .ok_or(ConfigError::Missing("TX_AGENT_PROXY_PORT"))?;
            builder = builder.proxy(host, port);
        }
        if let Ok(level) = env::var("TX_AGENT_LOG_LEVEL") {
            builder = builder.log_level(level.to_lowercase());
        }

        let mut config = builder.build()?;
        config.applications = registry_from_env("TX_AGENT_APPLICATIONS", RegistryKind::Applications)?;
        config.operations = registry_from_env("TX_AGENT_OPERATIONS", RegistryKind::Operations)?;
        config.id_types = registry_from_env("TX_AGENT_ID_TYPES", RegistryKind::IdTypes)?;
        config.payload_types =
            registry_from_env("TX_AGENT_PAYLOAD_TYPES", RegistryKind::PayloadTypes)?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// A disabled agent never talks to the endpoint, so its service settings
    /// are not checked.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        if !self.enabled {
            return Ok(());
        }

        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::Missing("endpoint"));
        }
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::Missing("api_key"));
        }
        if self.send_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "send interval must be greater than 0".to_string(),
            ));
        }
        if self.overload.max_workers == 0 {
            return Err(ConfigError::Invalid(
                "max workers must be greater than 0".to_string(),
            ));
        }
        if self.overload.check_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "overload check interval must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Maximum number of records a single drain may take.
    pub fn max_batch(&self) -> Option<usize> {
        // one record per request when the threshold is zero or one
        if self.size_threshold <= 1 {
            Some(1)
        } else {
            None
        }
    }

    pub fn registry(&self, kind: RegistryKind) -> &KeyNameRegistry {
        match kind {
            RegistryKind::Applications => &self.applications,
            RegistryKind::Operations => &self.operations,
            RegistryKind::IdTypes => &self.id_types,
            RegistryKind::PayloadTypes => &self.payload_types,
        }
    }
}

/// Fluent builder for [`AgentConfig`].
///
/// Registry entries are collected as given and checked for duplicates in
/// [`build`](AgentConfigBuilder::build).
#[derive(Debug)]
pub struct AgentConfigBuilder {
    config: AgentConfig,
    entries: Vec<(RegistryKind, String, String)>,
}

impl Default for AgentConfigBuilder {
    fn default() -> Self {
        let mut config = AgentConfig::disabled();
        config.enabled = true;
        Self {
            config,
            entries: Vec::new(),
        }
    }
}

impl AgentConfigBuilder {
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    #[must_use]
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config.api_key = api_key.into();
        self
    }

    #[must_use]
    pub fn send_interval(mut self, interval: Duration) -> Self {
        self.config.send_interval = interval;
        self
    }

    #[must_use]
    pub fn size_threshold(mut self, threshold: usize) -> Self {
        self.config.size_threshold = threshold;
        self
    }

    #[must_use]
    pub fn gzip_enabled(mut self, gzip: bool) -> Self {
        self.config.gzip_enabled = gzip;
        self
    }

    #[must_use]
    pub fn proxy(mut self, host: impl Into<String>, port: u16) -> Self {
        self.config.proxy = Some(ProxyConfig {
            host: host.into(),
            port,
        });
        self
    }

    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn overload_check_interval(mut self, interval: Duration) -> Self {
        self.config.overload.check_interval = interval;
        self
    }

    #[must_use]
    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.config.overload.max_workers = max_workers;
        self
    }

    #[must_use]
    pub fn overload_trigger(mut self, trigger: OverloadTrigger) -> Self {
        self.config.overload.trigger = trigger;
        self
    }

    #[must_use]
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.log_level = level.into();
        self
    }

    #[must_use]
    pub fn application(self, key: impl Into<String>, name: impl Into<String>) -> Self {
        self.entry(RegistryKind::Applications, key, name)
    }

    #[must_use]
    pub fn operation(self, key: impl Into<String>, name: impl Into<String>) -> Self {
        self.entry(RegistryKind::Operations, key, name)
    }

    #[must_use]
    pub fn id_type(self, key: impl Into<String>, name: impl Into<String>) -> Self {
        self.entry(RegistryKind::IdTypes, key, name)
    }

    #[must_use]
    pub fn payload_type(self, key: impl Into<String>, name: impl Into<String>) -> Self {
        self.entry(RegistryKind::PayloadTypes, key, name)
    }

    fn entry(mut self, kind: RegistryKind, key: impl Into<String>, name: impl Into<String>) -> Self {
        self.entries.push((kind, key.into(), name.into()));
        self
    }

    pub fn build(self) -> Result<AgentConfig, ConfigError> {
        let AgentConfigBuilder {
            mut config,
            entries,
        } = self;

        for (kind, key, name) in entries {
            let registry = match kind {
                RegistryKind::Applications => &mut config.applications,
                RegistryKind::Operations => &mut config.operations,
                RegistryKind::IdTypes => &mut config.id_types,
                RegistryKind::PayloadTypes => &mut config.payload_types,
            };
            registry.add_entry(key, name)?;
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_env<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Unparsable { name, value }),
        Err(_) => Ok(None),
    }
}

fn parse_env_bool(name: &'static str) -> Result<Option<bool>, ConfigError> {
    match env::var(name) {
        Ok(value) => match value.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(Some(true)),
            "false" | "0" | "no" => Ok(Some(false)),
            _ => Err(ConfigError::Unparsable { name, value }),
        },
        Err(_) => Ok(None),
    }
}

fn registry_from_env(
    name: &'static str,
    kind: RegistryKind,
) -> Result<KeyNameRegistry, ConfigError> {
    match env::var(name) {
        Ok(raw) => KeyNameRegistry::parse(kind, &raw).map_err(|e| match e {
            ConfigError::Unparsable { value, .. } => ConfigError::Unparsable { name, value },
            other => other,
        }),
        Err(_) => Ok(KeyNameRegistry::new(kind)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const ENV_VARS: [&str; 14] = [
        "TX_AGENT_ENABLED",
        "TX_AGENT_URL",
        "TX_AGENT_API_KEY",
        "TX_AGENT_SEND_INTERVAL_MS",
        "TX_AGENT_SIZE_THRESHOLD",
        "TX_AGENT_GZIP",
        "TX_AGENT_PROXY_HOST",
        "TX_AGENT_PROXY_PORT",
        "TX_AGENT_TIMEOUT_MS",
        "TX_AGENT_LOG_LEVEL",
        "TX_AGENT_APPLICATIONS",
        "TX_AGENT_OPERATIONS",
        "TX_AGENT_ID_TYPES",
        "TX_AGENT_PAYLOAD_TYPES",
    ];

    fn clear_env() {
        for var in ENV_VARS {
            env::remove_var(var);
        }
    }

    fn base_builder() -> AgentConfigBuilder {
        AgentConfig::builder()
            .endpoint("http://localhost:8808/rest/v2.0/transaction")
            .api_key("secret")
    }

    #[test]
    fn test_builder_defaults() {
        let config = base_builder().build().expect("valid config");
        assert!(config.enabled);
        assert_eq!(config.send_interval, DEFAULT_SEND_INTERVAL);
        assert_eq!(config.size_threshold, 0);
        assert!(!config.gzip_enabled);
        assert_eq!(config.overload, OverloadConfig::default());
        assert_eq!(config.overload.max_workers, 5);
    }

    #[test]
    fn test_builder_registries() {
        let config = base_builder()
            .application("app01", "ESB")
            .application("app02", "CRM")
            .operation("update", "Update")
            .id_type("dataType01", "Order Id")
            .payload_type("subInterface01", "Interface 1")
            .build()
            .expect("valid config");

        assert_eq!(config.applications.len(), 2);
        assert_eq!(config.operations.get("update"), Some("Update"));
        assert_eq!(
            config.registry(RegistryKind::IdTypes).get("dataType01"),
            Some("Order Id")
        );
        assert!(config.payload_types.contains_key("subInterface01"));
    }

    #[test]
    fn test_builder_duplicate_key() {
        let err = base_builder()
            .operation("update", "Update")
            .operation("update", "Update again")
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::DuplicateKey {
                kind: RegistryKind::Operations,
                ..
            }
        ));
    }

    #[test]
    fn test_enabled_requires_endpoint_and_key() {
        let err = AgentConfig::builder().api_key("k").build().unwrap_err();
        assert_eq!(err, ConfigError::Missing("endpoint"));

        let err = AgentConfig::builder()
            .endpoint("http://localhost")
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::Missing("api_key"));
    }

    #[test]
    fn test_disabled_skips_service_validation() {
        let config = AgentConfig::builder()
            .enabled(false)
            .build()
            .expect("disabled config is valid");
        assert!(!config.enabled);
    }

    #[test]
    fn test_zero_send_interval_is_invalid() {
        let result = base_builder().send_interval(Duration::ZERO).build();
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_invalid_log_level() {
        let result = base_builder().log_level("verbose").build();
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_max_batch() {
        for threshold in [0, 1] {
            let config = base_builder().size_threshold(threshold).build().unwrap();
            assert_eq!(config.max_batch(), Some(1));
        }
        let config = base_builder().size_threshold(2).build().unwrap();
        assert_eq!(config.max_batch(), None);
    }

    #[test]
    fn test_proxy_url() {
        let proxy = ProxyConfig {
            host: "proxy.local".to_string(),
            port: 3128,
        };
        assert_eq!(proxy.url(), "http://proxy.local:3128");

        let proxy = ProxyConfig {
            host: "https://proxy.local".to_string(),
            port: 443,
        };
        assert_eq!(proxy.url(), "https://proxy.local:443");
    }

    #[test]
    #[serial]
    fn test_from_env_defaults_to_disabled() {
        clear_env();
        let config = AgentConfig::from_env().expect("config from empty env");
        assert!(!config.enabled);
        assert!(config.applications.is_empty());
    }

    #[test]
    #[serial]
    fn test_from_env() {
        clear_env();
        env::set_var("TX_AGENT_ENABLED", "true");
        env::set_var("TX_AGENT_URL", "http://localhost:8808/api");
        env::set_var("TX_AGENT_API_KEY", "secret");
        env::set_var("TX_AGENT_SEND_INTERVAL_MS", "250");
        env::set_var("TX_AGENT_SIZE_THRESHOLD", "20");
        env::set_var("TX_AGENT_GZIP", "TRUE");
        env::set_var("TX_AGENT_PROXY_HOST", "proxy.local");
        env::set_var("TX_AGENT_PROXY_PORT", "3128");
        env::set_var("TX_AGENT_LOG_LEVEL", "DEBUG");
        env::set_var("TX_AGENT_APPLICATIONS", "app01:ESB,app02:CRM");
        env::set_var("TX_AGENT_ID_TYPES", "dataType01:Order Id");

        let config = AgentConfig::from_env().expect("valid env config");
        assert!(config.enabled);
        assert_eq!(config.endpoint, "http://localhost:8808/api");
        assert_eq!(config.send_interval, Duration::from_millis(250));
        assert_eq!(config.size_threshold, 20);
        assert!(config.gzip_enabled);
        assert_eq!(
            config.proxy,
            Some(ProxyConfig {
                host: "proxy.local".to_string(),
                port: 3128
            })
        );
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.applications.len(), 2);
        assert_eq!(config.id_types.get("dataType01"), Some("Order Id"));
        assert!(config.operations.is_empty());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_unparsable() {
        clear_env();
        env::set_var("TX_AGENT_SIZE_THRESHOLD", "lots");
        let err = AgentConfig::from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Unparsable {
                name: "TX_AGENT_SIZE_THRESHOLD",
                ..
            }
        ));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_malformed_registry() {
        clear_env();
        env::set_var("TX_AGENT_APPLICATIONS", "app01");
        let err = AgentConfig::from_env().unwrap_err();
        assert_eq!(
            err,
            ConfigError::Unparsable {
                name: "TX_AGENT_APPLICATIONS",
                value: "app01".to_string(),
            }
        );
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_proxy_requires_port() {
        clear_env();
        env::set_var("TX_AGENT_PROXY_HOST", "proxy.local");
        let err = AgentConfig::from_env().unwrap_err();
        assert_eq!(err, ConfigError::Missing("TX_AGENT_PROXY_PORT"));
        clear_env();
    }
}
