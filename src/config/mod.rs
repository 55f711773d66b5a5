use crate::routing::{route, HttpMethod, RouteConfig};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub controllers: ControllersConfig,
    #[serde(default)]
    pub views: ViewsConfig,
    /// Route declarations, matched in this order
    #[serde(default)]
    pub routes: Vec<RouteDeclaration>,
}

/// Server-level configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Global timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Maximum request body size in bytes
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout: default_timeout(),
            max_body_size: default_max_body_size(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line on stdout
    #[default]
    Json,
    /// Through the tracing subscriber
    Tracing,
}

/// Request lifecycle logging
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default = "default_true")]
    pub log_requests: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            log_requests: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControllersConfig {
    /// Prefix of controller class names in logs and errors
    #[serde(default = "default_root_package")]
    pub root_package: String,
    /// Controller serving `/`
    #[serde(default = "default_root_controller")]
    pub root_controller: String,
}

impl Default for ControllersConfig {
    fn default() -> Self {
        Self {
            root_package: default_root_package(),
            root_controller: default_root_controller(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ViewsConfig {
    /// Template directory; built-in templates only when unset
    #[serde(default)]
    pub directory: Option<String>,
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Layout applied when a view does not name one; `null` disables layouts
    #[serde(default = "default_layout")]
    pub default_layout: Option<String>,
}

impl Default for ViewsConfig {
    fn default() -> Self {
        Self {
            directory: None,
            extension: default_extension(),
            default_layout: default_layout(),
        }
    }
}

/// One `route(...)` declaration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RouteDeclaration {
    pub pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<HttpMethod>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_timeout() -> u64 {
    30
}

fn default_max_body_size() -> usize {
    2 * 1024 * 1024 // 2MB
}

fn default_true() -> bool {
    true
}

fn default_root_package() -> String {
    "app.controllers".to_string()
}

fn default_root_controller() -> String {
    "home".to_string()
}

fn default_extension() -> String {
    ".html".to_string()
}

fn default_layout() -> Option<String> {
    Some("/layouts/default_layout".to_string())
}

impl AppConfig {
    pub fn from_yaml_str(content: &str) -> anyhow::Result<Self> {
        let interpolated = crate::env_interpolation::interpolate_env_vars(content);
        let unresolved = crate::env_interpolation::unresolved_env_vars(&interpolated);
        if !unresolved.is_empty() {
            tracing::warn!(
                "Unresolved environment variables in config: {}",
                unresolved.join(", ")
            );
        }
        let config: AppConfig = serde_yaml::from_str(&interpolated)?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Defaults when the file does not exist
    pub fn load_or_default(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::from_yaml_file(path)
    }

    /// Route table from the declarations, conflicts included
    pub fn route_config(&self) -> RouteConfig {
        let mut config = RouteConfig::new();
        for declaration in &self.routes {
            let mut builder = route(&declaration.pattern);
            if let Some(controller) = &declaration.to {
                builder = builder.to(controller);
            }
            if let Some(action) = &declaration.action {
                builder = builder.action(action);
            }
            if let Some(method) = declaration.method {
                builder = builder.method(method);
            }
            config.route(builder);
        }
        config
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.views.extension.starts_with('.') {
            anyhow::bail!(
                "views.extension must start with '.': {}",
                self.views.extension
            );
        }
        if self.controllers.root_controller.trim_matches('/').is_empty() {
            anyhow::bail!("controllers.root_controller must not be empty");
        }
        self.route_config()
            .validate()
            .context("Invalid route declaration")?;
        Ok(())
    }
}
