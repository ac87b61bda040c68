use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::form::DEFAULT_NAMESPACE;

/// Local config file looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "multistep-forms.toml";

/// Prefix for environment overrides, e.g. `MULTISTEP__SERVER__PORT=8080`
pub const ENV_PREFIX: &str = "MULTISTEP";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub form: FormConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub views: ViewsConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Defaults applied to every form built by the server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormConfig {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub can_navigate_back: bool,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            can_navigate_back: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum accepted request body, in bytes
    #[serde(default = "default_body_limit")]
    pub body_limit: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7010
}

fn default_body_limit() -> usize {
    64 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit: default_body_limit(),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.host, self.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewsConfig {
    /// Directory searched for templates, relative to the working directory
    #[serde(default = "default_templates_dir")]
    pub templates_dir: String,
    #[serde(default = "default_extension")]
    pub extension: String,
    /// View rendered by the demo form
    #[serde(default = "default_view")]
    pub default_view: String,
}

fn default_templates_dir() -> String {
    "templates".to_string()
}

fn default_extension() -> String {
    "hbs".to_string()
}

fn default_view() -> String {
    "form".to_string()
}

impl Default for ViewsConfig {
    fn default() -> Self {
        Self {
            templates_dir: default_templates_dir(),
            extension: default_extension(),
            default_view: default_view(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
}

fn default_cookie_name() -> String {
    "multistep_session".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Write to a timestamped file under `dir` instead of stderr
    #[serde(default)]
    pub to_file: bool,
    #[serde(default = "default_log_dir")]
    pub dir: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            to_file: false,
            dir: default_log_dir(),
        }
    }
}

impl Config {
    /// User config in `~/.config/multistep-forms/`
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("multistep-forms").join("config.toml"))
    }

    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Self::defaults_builder()?;

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            builder = builder.add_source(config::File::from(local));
        }

        if let Some(user_config) = Self::user_config_path() {
            if user_config.exists() {
                builder = builder.add_source(config::File::from(user_config));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        Self::finish(builder)
    }

    /// Defaults overlaid with a single file, no user or environment layers
    pub fn load_file(path: &Path) -> Result<Self> {
        let builder = Self::defaults_builder()?.add_source(config::File::from(path));
        Self::finish(builder)
    }

    fn defaults_builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        let defaults_json = serde_json::to_string(&Config::default())
            .context("Failed to serialize default config")?;
        Ok(config::Config::builder().add_source(config::File::from_str(
            &defaults_json,
            config::FileFormat::Json,
        )))
    }

    fn finish(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        let config = builder.build().context("Failed to load configuration")?;
        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Write the config as TOML, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .context("Failed to create config directory")?;
            }
        }

        let toml_str =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;
        std::fs::write(path, toml_str).context("Failed to write config file")?;
        Ok(())
    }

    pub fn templates_path(&self) -> PathBuf {
        absolute(&self.views.templates_dir)
    }

    pub fn logs_path(&self) -> PathBuf {
        absolute(&self.logging.dir)
    }
}

fn absolute(path: &str) -> PathBuf {
    let path = PathBuf::from(path);
    if path.is_absolute() {
        path
    } else {
        std::env::current_dir().unwrap_or_default().join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.form.namespace, "multistep-form");
        assert!(!config.form.can_navigate_back);
        assert_eq!(config.server.port, 7010);
        assert_eq!(config.views.extension, "hbs");
        assert_eq!(config.session.cookie_name, "multistep_session");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[form]\ncan_navigate_back = true\n\n[server]\nport = 9000\n",
        )
        .unwrap();

        let config = Config::load_file(&path).unwrap();
        assert!(config.form.can_navigate_back);
        assert_eq!(config.form.namespace, "multistep-form");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_save_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.form.namespace = "checkout".to_string();
        config.logging.level = "debug".to_string();
        config.save(&path).unwrap();

        let loaded = Config::load_file(&path).unwrap();
        assert_eq!(loaded.form.namespace, "checkout");
        assert_eq!(loaded.logging.level, "debug");
    }

    #[test]
    fn test_socket_addr() {
        let config = Config::default();
        assert_eq!(config.server.socket_addr().unwrap().port(), 7010);

        let mut bad = Config::default();
        bad.server.host = "not a host".to_string();
        assert!(bad.server.socket_addr().is_err());
    }

    #[test]
    fn test_relative_paths_resolve_against_cwd() {
        let config = Config::default();
        assert!(config.templates_path().is_absolute());
        assert!(config.templates_path().ends_with("templates"));
    }
}
