//! Configuration management for Replay.
//!
//! Parses `replay.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `server.host`
//! - `token.secret`
//! - `storage.access_key_id`
//! - `storage.secret_access_key`
//! - `storage.region`

mod expand;

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override server host.
    pub host: Option<String>,
    /// Override server port.
    pub port: Option<u16>,
    /// Override engine install directory.
    pub install_dir: Option<PathBuf>,
    /// Override local report path.
    pub local_report: Option<PathBuf>,
    /// Override object storage enabled flag.
    pub storage_enabled: Option<bool>,
    /// Override token secret.
    pub secret: Option<String>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "replay.toml";

/// Minimum number of secret bytes needed to key the token cipher.
const MIN_SECRET_LEN: usize = 16;

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Token configuration.
    pub token: TokenConfig,
    /// Object storage configuration.
    pub storage: StorageConfig,
    /// Engine configuration (paths are relative strings from TOML).
    engine: EngineConfigRaw,
    /// Local report configuration (paths are relative strings from TOML).
    report: ReportConfigRaw,
    /// Remote fetch configuration.
    pub fetch: FetchConfig,

    /// Resolved engine configuration (set after loading).
    #[serde(skip)]
    pub engine_resolved: EngineConfig,
    /// Resolved local report configuration (set after loading).
    #[serde(skip)]
    pub report_resolved: ReportConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Server configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8080,
        }
    }
}

/// Token configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Shared secret keying the token cipher (first 16 bytes are used).
    pub secret: Option<String>,
}

/// Object storage configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Whether report URLs are classified as object storage locations.
    pub enabled: bool,
    /// Access key ID.
    pub access_key_id: Option<String>,
    /// Secret access key.
    pub secret_access_key: Option<String>,
    /// Region used when a URL does not name one.
    pub region: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            access_key_id: None,
            secret_access_key: None,
            region: "us-east-1".to_owned(),
        }
    }
}

/// Object storage credentials, validated by [`Config::require_storage`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageCredentials {
    /// Access key ID.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
}

/// Raw engine configuration as parsed from TOML (paths as strings).
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct EngineConfigRaw {
    package: Option<String>,
    install_dir: Option<String>,
    npm: Option<String>,
    node: Option<String>,
    poll_interval_secs: Option<u64>,
}

/// Resolved engine configuration with absolute paths.
#[derive(Debug)]
pub struct EngineConfig {
    /// Package name of the rendering engine.
    pub package: String,
    /// Install prefix; packages land in `{install_dir}/node_modules/`.
    pub install_dir: PathBuf,
    /// Package manager program.
    pub npm: String,
    /// Script runtime program used to run the report generator.
    pub node: String,
    /// Client-side refresh interval of the install polling page.
    pub poll_interval_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            package: "lighthouse".to_owned(),
            install_dir: PathBuf::from(".replay/engine"),
            npm: "npm".to_owned(),
            node: "node".to_owned(),
            poll_interval_secs: 2,
        }
    }
}

/// Raw local report configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ReportConfigRaw {
    local_path: Option<String>,
}

/// Resolved local report configuration.
#[derive(Debug, Default)]
pub struct ReportConfig {
    /// Report rendered when a request carries no token.
    pub local_path: Option<PathBuf>,
}

/// Remote fetch configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,
    /// `User-Agent` sent with HTTP requests (defaults to `replay/<version>`).
    pub user_agent: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            user_agent: None,
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`token.secret`").
        field: String,
        /// Error message (e.g., "${`REPLAY_SECRET`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Require an optional string field to be present and non-empty.
fn require_present<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, ConfigError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::Validation(format!("{field} must be set"))),
    }
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `replay.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist or parsing fails.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(host) = &settings.host {
            self.server.host.clone_from(host);
        }
        if let Some(port) = settings.port {
            self.server.port = port;
        }
        if let Some(install_dir) = &settings.install_dir {
            self.engine_resolved.install_dir.clone_from(install_dir);
        }
        if let Some(local_report) = &settings.local_report {
            self.report_resolved.local_path = Some(local_report.clone());
        }
        if let Some(enabled) = settings.storage_enabled {
            self.storage.enabled = enabled;
        }
        if let Some(secret) = &settings.secret {
            self.token.secret = Some(secret.clone());
        }
    }

    /// Get the validated token secret.
    ///
    /// Token operations require this; everything else works without it.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if the secret is unset or too short.
    pub fn require_secret(&self) -> Result<&str, ConfigError> {
        let secret = require_present(self.token.secret.as_deref(), "token.secret")?;
        if secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Validation(format!(
                "token.secret must be at least {MIN_SECRET_LEN} bytes"
            )));
        }
        Ok(secret)
    }

    /// Get validated object storage credentials.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if storage is disabled or either
    /// credential is missing.
    pub fn require_storage(&self) -> Result<StorageCredentials, ConfigError> {
        if !self.storage.enabled {
            return Err(ConfigError::Validation(
                "storage.enabled must be true".to_owned(),
            ));
        }
        let access_key_id =
            require_present(self.storage.access_key_id.as_deref(), "storage.access_key_id")?;
        let secret_access_key = require_present(
            self.storage.secret_access_key.as_deref(),
            "storage.secret_access_key",
        )?;
        Ok(StorageCredentials {
            access_key_id: access_key_id.to_owned(),
            secret_access_key: secret_access_key.to_owned(),
        })
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        Self {
            server: ServerConfig::default(),
            token: TokenConfig::default(),
            storage: StorageConfig::default(),
            engine: EngineConfigRaw::default(),
            report: ReportConfigRaw::default(),
            fetch: FetchConfig::default(),
            engine_resolved: EngineConfig {
                install_dir: base.join(".replay/engine"),
                ..EngineConfig::default()
            },
            report_resolved: ReportConfig {
                local_path: Some(base.join("report.json")),
            },
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Checks structural values only. Secrets and credentials are checked
    /// lazily by [`Config::require_secret`] and [`Config::require_storage`],
    /// so a missing secret fails token operations without stopping the server.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_engine()?;
        self.validate_fetch()?;
        require_non_empty(&self.storage.region, "storage.region")?;
        Ok(())
    }

    /// Validate server configuration.
    fn validate_server(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.server.host, "server.host")?;

        // Port 0 is technically valid (OS assigns a random port), but it's
        // unlikely to be intentional in a config file
        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "server.port cannot be 0".to_owned(),
            ));
        }

        Ok(())
    }

    /// Validate engine configuration.
    fn validate_engine(&self) -> Result<(), ConfigError> {
        const MAX_POLL_INTERVAL_SECS: u64 = 60;

        let engine = &self.engine_resolved;
        require_non_empty(&engine.package, "engine.package")?;
        if !engine
            .package
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.'))
        {
            return Err(ConfigError::Validation(format!(
                "engine.package {:?} is not a valid package name",
                engine.package
            )));
        }
        require_non_empty(&engine.npm, "engine.npm")?;
        require_non_empty(&engine.node, "engine.node")?;

        if engine.poll_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "engine.poll_interval_secs must be greater than 0".to_owned(),
            ));
        }
        if engine.poll_interval_secs > MAX_POLL_INTERVAL_SECS {
            return Err(ConfigError::Validation(format!(
                "engine.poll_interval_secs cannot exceed {MAX_POLL_INTERVAL_SECS}"
            )));
        }

        Ok(())
    }

    /// Validate fetch configuration.
    fn validate_fetch(&self) -> Result<(), ConfigError> {
        if self.fetch.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "fetch.timeout_secs must be greater than 0".to_owned(),
            ));
        }
        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.server.host = expand::expand_env(&self.server.host, "server.host")?;

        if let Some(ref secret) = self.token.secret {
            self.token.secret = Some(expand::expand_env(secret, "token.secret")?);
        }

        if let Some(ref key) = self.storage.access_key_id {
            self.storage.access_key_id = Some(expand::expand_env(key, "storage.access_key_id")?);
        }
        if let Some(ref secret) = self.storage.secret_access_key {
            self.storage.secret_access_key =
                Some(expand::expand_env(secret, "storage.secret_access_key")?);
        }
        self.storage.region = expand::expand_env(&self.storage.region, "storage.region")?;

        Ok(())
    }

    /// Resolve relative paths to absolute paths based on config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let defaults = EngineConfig::default();
        let engine = &self.engine;

        self.engine_resolved = EngineConfig {
            package: engine.package.clone().unwrap_or(defaults.package),
            install_dir: config_dir.join(
                engine
                    .install_dir
                    .as_deref()
                    .unwrap_or(".replay/engine"),
            ),
            npm: engine.npm.clone().unwrap_or(defaults.npm),
            node: engine.node.clone().unwrap_or(defaults.node),
            poll_interval_secs: engine
                .poll_interval_secs
                .unwrap_or(defaults.poll_interval_secs),
        };

        self.report_resolved = ReportConfig {
            local_path: Some(
                config_dir.join(self.report.local_path.as_deref().unwrap_or("report.json")),
            ),
        };
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default_with_base(Path::new("/test"));
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.engine_resolved.package, "lighthouse");
        assert_eq!(
            config.engine_resolved.install_dir,
            PathBuf::from("/test/.replay/engine")
        );
        assert_eq!(
            config.report_resolved.local_path,
            Some(PathBuf::from("/test/report.json"))
        );
        assert_eq!(config.engine_resolved.poll_interval_secs, 2);
        assert_eq!(config.fetch.timeout_secs, 10);
        assert!(!config.storage.enabled);
        assert_eq!(config.storage.region, "us-east-1");
        assert!(config.token.secret.is_none());
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[server]
host = "0.0.0.0"
port = 9000

[token]
secret = "0123456789abcdef0123"

[storage]
enabled = true
access_key_id = "AKIA"
secret_access_key = "shh"
region = "eu-west-1"

[fetch]
timeout_secs = 30
user_agent = "replay-test"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.token.secret.as_deref(), Some("0123456789abcdef0123"));
        assert!(config.storage.enabled);
        assert_eq!(config.storage.region, "eu-west-1");
        assert_eq!(config.fetch.timeout_secs, 30);
        assert_eq!(config.fetch.user_agent.as_deref(), Some("replay-test"));
    }

    #[test]
    fn test_resolve_paths() {
        let toml = r#"
[engine]
package = "lighthouse"
install_dir = "engines"
node = "/usr/bin/node"
poll_interval_secs = 5

[report]
local_path = "reports/latest.json"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/project"));

        assert_eq!(
            config.engine_resolved.install_dir,
            PathBuf::from("/project/engines")
        );
        assert_eq!(config.engine_resolved.node, "/usr/bin/node");
        assert_eq!(config.engine_resolved.npm, "npm");
        assert_eq!(config.engine_resolved.poll_interval_secs, 5);
        assert_eq!(
            config.report_resolved.local_path,
            Some(PathBuf::from("/project/reports/latest.json"))
        );
    }

    #[test]
    fn test_require_secret() {
        let mut config = Config::default_with_base(Path::new("/test"));
        assert!(matches!(
            config.require_secret(),
            Err(ConfigError::Validation(_))
        ));

        config.token.secret = Some("too-short".to_owned());
        let err = config.require_secret().unwrap_err();
        assert!(err.to_string().contains("at least 16 bytes"));

        config.token.secret = Some("0123456789abcdef".to_owned());
        assert_eq!(config.require_secret().unwrap(), "0123456789abcdef");
    }

    #[test]
    fn test_require_storage() {
        let mut config = Config::default_with_base(Path::new("/test"));
        assert!(config.require_storage().is_err());

        config.storage.enabled = true;
        let err = config.require_storage().unwrap_err();
        assert!(err.to_string().contains("storage.access_key_id"));

        config.storage.access_key_id = Some("AKIA".to_owned());
        config.storage.secret_access_key = Some("shh".to_owned());
        assert_eq!(
            config.require_storage().unwrap(),
            StorageCredentials {
                access_key_id: "AKIA".to_owned(),
                secret_access_key: "shh".to_owned(),
            }
        );
    }

    #[test]
    fn test_validate_rejects_zero_port() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.server.port = 0;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("server.port"));
    }

    #[test]
    fn test_validate_rejects_bad_package_name() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.engine_resolved.package = "../evil".to_owned();
        assert!(config.validate().is_err());

        config.engine_resolved.package = "Lighthouse".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_poll_interval_bounds() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.engine_resolved.poll_interval_secs = 0;
        assert!(config.validate().is_err());

        config.engine_resolved.poll_interval_secs = 61;
        assert!(config.validate().is_err());

        config.engine_resolved.poll_interval_secs = 60;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.fetch.timeout_secs = 0;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("fetch.timeout_secs"));
    }

    #[test]
    fn test_apply_cli_settings() {
        let mut config = Config::default_with_base(Path::new("/test"));
        let overrides = CliSettings {
            port: Some(9000),
            install_dir: Some(PathBuf::from("/opt/engines")),
            storage_enabled: Some(true),
            secret: Some("from-the-command-line".to_owned()),
            ..Default::default()
        };

        config.apply_cli_settings(&overrides);

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1"); // Unchanged
        assert_eq!(
            config.engine_resolved.install_dir,
            PathBuf::from("/opt/engines")
        );
        assert!(config.storage.enabled);
        assert_eq!(config.token.secret.as_deref(), Some("from-the-command-line"));
    }

    #[test]
    fn test_load_explicit_missing_file() {
        let result = Config::load(Some(Path::new("/nonexistent/replay.toml")), None);
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_expand_env_vars_in_secret() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::set_var("REPLAY_TEST_SECRET", "0123456789abcdef-env");
        }
        let toml = r#"
[token]
secret = "${REPLAY_TEST_SECRET}"

[storage]
region = "${REPLAY_TEST_UNSET_REGION:-eu-central-1}"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.expand_env_vars().unwrap();

        assert_eq!(config.token.secret.as_deref(), Some("0123456789abcdef-env"));
        assert_eq!(config.storage.region, "eu-central-1");
        unsafe {
            std::env::remove_var("REPLAY_TEST_SECRET");
        }
    }
}
