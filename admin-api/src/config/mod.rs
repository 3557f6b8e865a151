use std::collections::HashMap;

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

use crate::authz::{Operation, RoleSet};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub authz: AuthzConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TokenAlgorithm {
    Hs256,
    Rs256,
}

/// Verification settings for bearer tokens minted by the identity provider.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub issuer: String,
    pub audience: String,
    #[serde(default = "default_algorithm")]
    pub algorithm: TokenAlgorithm,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub public_key_pem: Option<String>,
    #[serde(default = "default_leeway_secs")]
    pub leeway_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthzConfig {
    /// Roles of which a principal must hold at least one before any
    /// operation-specific matching.
    pub baseline_roles: Vec<String>,
    /// Per-operation overrides of the required role set, keyed by operation id.
    #[serde(default)]
    pub operations: HashMap<String, Vec<String>>,
}

impl AuthzConfig {
    pub fn baseline(&self) -> RoleSet {
        self.baseline_roles
            .iter()
            .map(|r| r.trim())
            .filter(|r| !r.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout_secs() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

fn default_algorithm() -> TokenAlgorithm {
    TokenAlgorithm::Hs256
}

fn default_leeway_secs() -> u64 {
    30
}

impl Config {
    /// Defaults, then `config/admin-api.*` if present, then `__`-separated
    /// environment variables (`DATABASE__URL`, `AUTHZ__BASELINE_ROLES=SuperAdmin,Admin`,
    /// `AUTHZ__OPERATIONS__LIST_AUDIT_LOGS=SuperAdmin,Auditor`).
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::defaults()?
            .add_source(File::with_name("config/admin-api").required(false))
            .add_source(environment())
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with an inline TOML document.
    pub fn from_toml(source: &str) -> anyhow::Result<Self> {
        let config: Config = Self::defaults()?
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("database.url", "postgres://localhost/calendar")?
            .set_default("database.max_connections", 10)?
            .set_default("auth.audience", "calendar-admin-api")?
            .set_default("auth.algorithm", "HS256")?
            .set_default("authz.baseline_roles", vec!["SuperAdmin", "Admin"])?
            .set_default("logging.format", "pretty")
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.auth.issuer.trim().is_empty(), "auth.issuer is required");

        anyhow::ensure!(
            !self.authz.baseline().is_empty(),
            "authz.baseline_roles must name at least one role"
        );

        for id in self.authz.operations.keys() {
            id.parse::<Operation>().map_err(anyhow::Error::msg)?;
        }

        match self.auth.algorithm {
            TokenAlgorithm::Hs256 => anyhow::ensure!(
                self.auth.secret.as_deref().is_some_and(|s| !s.is_empty()),
                "auth.secret is required for HS256"
            ),
            TokenAlgorithm::Rs256 => anyhow::ensure!(
                self.auth.public_key_pem.as_deref().is_some_and(|s| !s.is_empty()),
                "auth.public_key_pem is required for RS256"
            ),
        }

        Ok(())
    }
}

/// Environment source. Role lists, including per-operation overrides, are
/// comma-separated.
fn environment() -> Environment {
    let env = Environment::default()
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("authz.baseline_roles")
        .try_parsing(true);

    Operation::ALL.iter().fold(env, |env, op| {
        env.with_list_parse_key(&format!("authz.operations.{}", op.as_str()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::{ADMIN, SUPER_ADMIN};

    const AUTH: &str = r#"
        [auth]
        issuer = "https://issuer.test/"
        secret = "test-secret"
    "#;

    fn with_auth(extra: &str) -> anyhow::Result<Config> {
        Config::from_toml(&format!("{AUTH}\n{extra}"))
    }

    #[test]
    fn defaults_are_usable() {
        let config = with_auth("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.auth.algorithm, TokenAlgorithm::Hs256);
        assert_eq!(config.auth.audience, "calendar-admin-api");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.database.run_migrations);

        let baseline = config.authz.baseline();
        assert!(baseline.contains(SUPER_ADMIN));
        assert!(baseline.contains(ADMIN));
        assert_eq!(baseline.len(), 2);
    }

    #[test]
    fn missing_auth_section_is_rejected() {
        let err = Config::from_toml("").unwrap_err();
        assert!(err.to_string().contains("auth.issuer"));
    }

    #[test]
    fn hs256_without_secret_is_rejected() {
        let err = Config::from_toml(
            r#"
            [auth]
            issuer = "https://issuer.test/"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("auth.secret"));
    }

    #[test]
    fn operation_overrides_are_parsed() {
        let config = with_auth(
            r#"
            [authz.operations]
            list_audit_logs = ["SuperAdmin", "Auditor"]
            "#,
        )
        .unwrap();
        let roles = &config.authz.operations["list_audit_logs"];
        assert_eq!(roles, &vec!["SuperAdmin".to_string(), "Auditor".to_string()]);
    }

    #[test]
    fn operation_overrides_parse_from_environment() {
        let mut vars = config::Map::new();
        vars.insert(
            "AUTHZ__OPERATIONS__LIST_AUDIT_LOGS".to_string(),
            "SuperAdmin,Auditor".to_string(),
        );
        vars.insert("AUTHZ__BASELINE_ROLES".to_string(), "SuperAdmin".to_string());

        let config: Config = Config::defaults()
            .unwrap()
            .add_source(File::from_str(AUTH, FileFormat::Toml))
            .add_source(environment().source(Some(vars)))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        config.validate().unwrap();

        let roles = &config.authz.operations["list_audit_logs"];
        assert_eq!(roles, &vec!["SuperAdmin".to_string(), "Auditor".to_string()]);
        assert_eq!(config.authz.baseline_roles, vec!["SuperAdmin".to_string()]);
    }

    #[test]
    fn empty_baseline_is_rejected() {
        let err = with_auth(
            r#"
            [authz]
            baseline_roles = []
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("baseline_roles"));
    }

    #[test]
    fn unknown_operation_override_is_rejected() {
        let err = with_auth(
            r#"
            [authz.operations]
            launch_rockets = ["SuperAdmin"]
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("launch_rockets"));
    }

    #[test]
    fn rs256_requires_public_key() {
        let err = Config::from_toml(
            r#"
            [auth]
            issuer = "https://issuer.test/"
            algorithm = "RS256"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("public_key_pem"));
    }
}
