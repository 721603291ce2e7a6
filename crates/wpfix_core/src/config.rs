//! Configuration types for the fixture harness.

use crate::error::{HarnessError, Result};
use crate::types::Role;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "wpfix.toml";

/// Comprehensive configuration for a harness run.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Baseline fixture settings.
    #[serde(default)]
    pub fixtures: FixtureConfig,

    /// Uniqueness token settings.
    #[serde(default)]
    pub token: TokenConfig,

    /// What the environment under test supports.
    #[serde(default)]
    pub capabilities: Capabilities,

    /// Teardown behaviour.
    #[serde(default)]
    pub cleanup: CleanupConfig,

    /// Conformance suite settings.
    #[serde(default)]
    pub suite: SuiteConfig,

    /// Remote site to test; the in-memory site is used when no URL is set.
    #[serde(default)]
    pub site: SiteConfig,
}

impl HarnessConfig {
    /// Load configuration from a file, falling back to defaults when it is missing.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(HarnessConfig::default());
        }
        let content = fs::read_to_string(path).map_err(|e| HarnessError::ConfigFile {
            path: path.to_path_buf(),
            reason: format!("failed to read config: {}", e),
        })?;
        let config: HarnessConfig = toml::from_str(&content).map_err(|e| HarnessError::ConfigFile {
            path: path.to_path_buf(),
            reason: format!("failed to parse config: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| HarnessError::ConfigError(format!("failed to serialize config: {}", e)))?;
        fs::write(path, content).map_err(|e| HarnessError::ConfigFile {
            path: path.to_path_buf(),
            reason: format!("failed to write config: {}", e),
        })?;
        Ok(())
    }

    /// Reject values the harness cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.fixtures.login_prefix.trim().is_empty() {
            return Err(HarnessError::ConfigError(
                "fixtures.login_prefix must not be empty".into(),
            ));
        }
        if self.fixtures.email_domain.trim().is_empty() || self.fixtures.email_domain.contains('@') {
            return Err(HarnessError::ConfigError(format!(
                "fixtures.email_domain is not a domain: {:?}",
                self.fixtures.email_domain
            )));
        }
        if self.token.suffix_min > self.token.suffix_max {
            return Err(HarnessError::ConfigError(format!(
                "token.suffix_min ({}) exceeds token.suffix_max ({})",
                self.token.suffix_min, self.token.suffix_max
            )));
        }
        self.site.validate()
    }
}

/// Baseline fixture settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FixtureConfig {
    /// Prefix for generated logins and email local parts (default: "testuser").
    pub login_prefix: String,

    /// Domain for generated email addresses (default: "example.com").
    pub email_domain: String,

    /// Secret assigned to generated principals.
    pub secret: String,

    /// Create a baseline principal before each case (default: true).
    pub create_baseline: bool,

    /// Role of the baseline principal (default: author).
    pub baseline_role: Role,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            login_prefix: "testuser".to_string(),
            email_domain: "example.com".to_string(),
            secret: "SecureTestPass123!".to_string(),
            create_baseline: true,
            baseline_role: Role::Author,
        }
    }
}

/// Uniqueness token settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenConfig {
    /// Smallest random suffix (default: 1000).
    pub suffix_min: u32,

    /// Largest random suffix, inclusive (default: 99999).
    pub suffix_max: u32,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            suffix_min: 1000,
            suffix_max: 99_999,
        }
    }
}

/// Capability descriptor for the environment under test.
///
/// Declared up front instead of probing the environment at runtime.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Capabilities {
    /// Principals can be deleted during teardown (default: true).
    pub principal_deletion: bool,

    /// The request/response dispatch surface is available (default: true).
    pub rest_dispatch: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            principal_deletion: true,
            rest_dispatch: true,
        }
    }
}

/// Teardown behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct CleanupConfig {
    /// Look every deleted entity up again and report it if it still resolves.
    pub verify: bool,
}

/// Conformance suite settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SuiteConfig {
    /// Wall-clock budget for a single content query in milliseconds (default: 1000).
    pub query_time_budget_ms: u64,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            query_time_budget_ms: 1000,
        }
    }
}

impl SuiteConfig {
    /// Returns the query budget as a Duration.
    pub fn query_time_budget(&self) -> Duration {
        Duration::from_millis(self.query_time_budget_ms)
    }
}

/// Connection settings for a site reached over HTTP.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SiteConfig {
    /// Base URL of the site, without the `/wp-json` suffix.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Administrator login used to create and remove fixtures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Application password for `username`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_password: Option<String>,

    /// Per-request timeout in seconds (default: 30).
    pub timeout_secs: u64,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            url: None,
            username: None,
            application_password: None,
            timeout_secs: 30,
        }
    }
}

impl SiteConfig {
    /// Returns the request timeout as a Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        if let Some(url) = &self.url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(HarnessError::ConfigError(format!(
                    "site.url must start with http:// or https://: {:?}",
                    url
                )));
            }
        }
        if self.username.is_some() != self.application_password.is_some() {
            return Err(HarnessError::ConfigError(
                "site.username and site.application_password must be set together".into(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(HarnessError::ConfigError(
                "site.timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}
