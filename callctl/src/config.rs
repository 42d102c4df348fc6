//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable
//! overrides. The configuration file path defaults to `config.yaml` but can
//! be specified via `-f` flag or `CALLCTL_CONFIG` environment variable.
//!
//! Sources are merged in order (later overrides earlier):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `CALLCTL_`
//!
//! For nested values, use double underscores: `CALLCTL_PROVIDER__PAGE_SIZE=500`
//! sets `provider.page_size`.
//!
//! The workspace registry lives here: a fixed list of tenant name + provider
//! API key pairs, loaded once at startup and immutable for the process
//! lifetime. The active workspace is chosen per request, never held in
//! process state.
//!
//! ```yaml
//! host: 0.0.0.0
//! port: 8080
//! provider:
//!   base_url: https://api.retellai.com
//!   page_delay: 1s
//! billing:
//!   rate_per_minute: 0.145
//!   minimum_charge: 0.145
//! workspaces:
//!   - name: Acme
//!     api_key: key_xxxxxxxxxxxxxxxxxxxxxxxxxxxx
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::billing::BillingPolicy;
use crate::errors::Error;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "CALLCTL_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Telephony provider connection settings
    pub provider: ProviderConfig,
    /// Telephony billing constants
    pub billing: BillingPolicy,
    /// Workspace registry: one entry per tenant
    pub workspaces: Vec<WorkspaceConfig>,
    /// CORS origins allowed to call the API ("*" for any)
    pub cors_allowed_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            provider: ProviderConfig::default(),
            billing: BillingPolicy::default(),
            workspaces: Vec::new(),
            cors_allowed_origins: vec!["*".to_string()],
        }
    }
}

/// Connection settings for the telephony provider API.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderConfig {
    pub base_url: Url,
    /// Per-request timeout, delegated to the HTTP client
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Records requested per page; the provider caps this at 1000
    pub page_size: u32,
    /// Pause between successive page requests, respecting the provider's
    /// rate limit. Never applied after the final page.
    #[serde(with = "humantime_serde")]
    pub page_delay: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("https://api.retellai.com").expect("default provider URL parses"),
            request_timeout: Duration::from_secs(30),
            page_size: 1000,
            page_delay: Duration::from_secs(1),
        }
    }
}

/// One tenant: display name plus its dedicated provider API key.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkspaceConfig {
    pub name: String,
    pub api_key: String,
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            .merge(Env::prefixed("CALLCTL_").split("__"))
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if self.workspaces.is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: no workspaces configured. Add at least one \
                            workspace (name + api_key) to the config file."
                    .to_string(),
            });
        }

        for workspace in &self.workspaces {
            if workspace.name.trim().is_empty() {
                return Err(Error::Internal {
                    operation: "Config validation: workspace names cannot be empty".to_string(),
                });
            }
            if workspace.api_key.trim().is_empty() {
                return Err(Error::Internal {
                    operation: format!(
                        "Config validation: workspace {} has an empty api_key",
                        workspace.name
                    ),
                });
            }
        }

        let mut names: Vec<&str> = self.workspaces.iter().map(|w| w.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        if names.len() != self.workspaces.len() {
            return Err(Error::Internal {
                operation: "Config validation: workspace names must be unique".to_string(),
            });
        }

        if self.provider.page_size == 0 || self.provider.page_size > 1000 {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: provider.page_size must be between 1 and 1000, got {}",
                    self.provider.page_size
                ),
            });
        }

        if self.billing.rate_per_minute.is_sign_negative()
            || self.billing.minimum_charge.is_sign_negative()
        {
            return Err(Error::Internal {
                operation: "Config validation: billing rates cannot be negative".to_string(),
            });
        }

        if self.cors_allowed_origins.is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: cors_allowed_origins cannot be empty. Use \"*\" \
                            to allow any origin."
                    .to_string(),
            });
        }

        Ok(())
    }

    /// Find a workspace by name.
    pub fn workspace(&self, name: &str) -> Option<&WorkspaceConfig> {
        self.workspaces.iter().find(|w| w.name == name)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rust_decimal::Decimal;

    fn args(path: &str) -> Args {
        Args {
            config: path.to_string(),
            validate: false,
        }
    }

    #[test]
    fn test_full_config_loads() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
port: 9100
provider:
  base_url: https://provider.test
  page_size: 500
  page_delay: 2s
billing:
  rate_per_minute: 0.16
  minimum_charge: 0.2
workspaces:
  - name: Acme
    api_key: key_acme
  - name: Globex
    api_key: key_globex
"#,
            )?;

            let config = Config::load(&args("test.yaml"))?;
            assert_eq!(config.port, 9100);
            assert_eq!(config.bind_address(), "0.0.0.0:9100");
            assert_eq!(config.provider.page_size, 500);
            assert_eq!(config.provider.page_delay, Duration::from_secs(2));
            assert_eq!(config.billing.rate_per_minute, Decimal::new(16, 2));
            assert_eq!(config.workspaces.len(), 2);
            assert!(config.workspace("Globex").is_some());
            assert!(config.workspace("globex").is_none());
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_nested_values() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
workspaces:
  - name: Acme
    api_key: key_acme
"#,
            )?;
            jail.set_env("CALLCTL_PORT", "9200");
            jail.set_env("CALLCTL_PROVIDER__PAGE_SIZE", "250");

            let config = Config::load(&args("test.yaml"))?;
            assert_eq!(config.port, 9200);
            assert_eq!(config.provider.page_size, 250);
            Ok(())
        });
    }

    #[test]
    fn test_validation_rejects_missing_workspaces() {
        let config = Config::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_duplicate_workspace_names() {
        let config = Config {
            workspaces: vec![
                WorkspaceConfig {
                    name: "Acme".into(),
                    api_key: "key_a".into(),
                },
                WorkspaceConfig {
                    name: "Acme".into(),
                    api_key: "key_b".into(),
                },
            ],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_oversized_page() {
        let mut config = Config {
            workspaces: vec![WorkspaceConfig {
                name: "Acme".into(),
                api_key: "key_a".into(),
            }],
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        config.provider.page_size = 1001;
        assert!(config.validate().is_err());
    }
}
