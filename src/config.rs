use crate::catalog::{ServiceCatalog, ServiceSpec};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Global configuration for the registration service
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Base domain all tenant subdomains hang under (required)
    pub base_domain: String,

    /// Path to the shared Caddyfile the proxy reads
    #[serde(default = "default_caddyfile")]
    pub caddyfile: String,

    /// Shell command that makes the proxy pick up a rewritten file.
    /// Absent or empty means reloads are skipped.
    pub reload_command: Option<String>,

    /// Upper bound for one reload invocation, in seconds
    #[serde(default = "default_reload_timeout")]
    pub reload_timeout_secs: u64,

    /// Service registered when a request names none
    #[serde(default = "default_service")]
    pub default_service: String,

    /// Routable services and their templates
    #[serde(default)]
    pub services: HashMap<String, ServiceSpec>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Bind address (default: 0.0.0.0)
    #[serde(default = "default_bind_address")]
    pub bind: String,

    /// Registration API port (default: 9321)
    #[serde(default = "default_listen_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind_address(),
            port: default_listen_port(),
        }
    }
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_listen_port() -> u16 {
    9321
}

fn default_caddyfile() -> String {
    "/etc/caddy/Caddyfile".to_string()
}

fn default_reload_timeout() -> u64 {
    30
}

fn default_service() -> String {
    "app".to_string()
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Environment variables win over the config file for the operational
    /// knobs a deployment most often needs to vary.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("TENANTGATE_BASE_DOMAIN") {
            if !v.is_empty() {
                self.base_domain = v;
            }
        }
        if let Ok(v) = std::env::var("TENANTGATE_CADDYFILE") {
            if !v.is_empty() {
                self.caddyfile = v;
            }
        }
        if let Ok(v) = std::env::var("TENANTGATE_RELOAD_COMMAND") {
            if !v.is_empty() {
                self.reload_command = Some(v);
            }
        }
        if let Ok(v) = std::env::var("TENANTGATE_PORT") {
            if let Ok(port) = v.parse() {
                self.server.port = port;
            }
        }
    }

    /// Validate all configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut errors = Vec::new();

        if self.base_domain.is_empty() {
            errors.push("'base_domain' must not be empty".to_string());
        }
        if self.base_domain.starts_with('.') {
            errors.push(format!(
                "'base_domain' must not start with a dot: '{}'",
                self.base_domain
            ));
        }
        if self.caddyfile.is_empty() {
            errors.push("'caddyfile' must not be empty".to_string());
        }
        for (name, spec) in &self.services {
            if name.is_empty() || name.contains('.') {
                errors.push(format!("Service '{}': name must be a single DNS label", name));
            }
            if spec.port == Some(0) {
                errors.push(format!("Service '{}': 'port' must be greater than 0", name));
            }
        }

        if !errors.is_empty() {
            anyhow::bail!("Configuration errors:\n  - {}", errors.join("\n  - "));
        }

        Ok(())
    }

    pub fn catalog(&self) -> ServiceCatalog {
        ServiceCatalog::new(self.services.clone())
    }

    pub fn reload_timeout(&self) -> Duration {
        Duration::from_secs(self.reload_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ServiceKind;

    #[test]
    fn test_parse_config() {
        let toml = r#"
base_domain = "example.com"
caddyfile = "/srv/caddy/Caddyfile"
reload_command = "systemctl reload caddy"

[server]
bind = "127.0.0.1"
port = 9400

[services.app]
port = 3000

[services.term]
port = 7681
kind = "websocket"
target = "127.0.0.1:7681"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.base_domain, "example.com");
        assert_eq!(config.caddyfile, "/srv/caddy/Caddyfile");
        assert_eq!(config.server.port, 9400);
        assert_eq!(config.services.len(), 2);

        let term = config.services.get("term").unwrap();
        assert_eq!(term.kind, ServiceKind::WebsocketUpgrading);
        assert_eq!(term.port, Some(7681));
        assert_eq!(term.target.as_deref(), Some("127.0.0.1:7681"));
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: Config = toml::from_str("base_domain = \"example.com\"").unwrap();
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.server.port, 9321);
        assert_eq!(config.caddyfile, "/etc/caddy/Caddyfile");
        assert_eq!(config.default_service, "app");
        assert_eq!(config.reload_timeout_secs, 30);
        assert!(config.reload_command.is_none());
        assert!(config.services.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_base_domain() {
        let config: Config = toml::from_str("base_domain = \"\"").unwrap();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("'base_domain' must not be empty"));
    }

    #[test]
    fn test_validate_rejects_dotted_base_domain() {
        let config: Config = toml::from_str("base_domain = \".example.com\"").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_collects_service_errors() {
        let toml = r#"
base_domain = "example.com"

[services."bad.name"]
port = 0
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("name must be a single DNS label"));
        assert!(err.contains("'port' must be greater than 0"));
    }

    #[test]
    fn test_catalog_from_config() {
        let toml = r#"
base_domain = "example.com"

[services.code]
port = 8443
kind = "path-scoped"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let catalog = config.catalog();
        assert_eq!(catalog.kind("code"), ServiceKind::PathScoped);
        assert_eq!(
            catalog.resolve_target("code", None, Some("10.0.0.5")).as_deref(),
            Some("10.0.0.5:8443")
        );
    }
}
