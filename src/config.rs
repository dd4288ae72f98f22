//! TOML configuration for testpulse.
//!
//! Layered lookup: an explicit path, the `TESTPULSE_CONFIG` environment
//! variable, the system location, then compiled-in defaults. The upstream
//! base URL and token can additionally be overridden from the environment.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::client::Endpoint;

const SYSTEM_CONFIG_PATH: &str = "/etc/testpulse/testpulse.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for the testpulse process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Resolve the configuration for this process.
    ///
    /// An explicit `path` must load; the environment and system locations are
    /// best-effort and fall back to defaults. Runs before logging is set up, so
    /// nothing is logged here: call [`Resolved::log`] once tracing is live.
    pub fn resolve(path: Option<&Path>) -> Result<Resolved> {
        let mut resolved = match path {
            Some(p) => Resolved {
                config: Self::load(p)?,
                source: ConfigSource::Explicit(p.to_path_buf()),
                skipped: Vec::new(),
            },
            None => Self::load_or_default(),
        };
        resolved.config.apply_env_overrides();
        Ok(resolved)
    }

    /// Try `TESTPULSE_CONFIG`, then the system path, then defaults.
    pub fn load_or_default() -> Resolved {
        let env_path = std::env::var_os("TESTPULSE_CONFIG").map(PathBuf::from);
        Self::load_first(env_path, Path::new(SYSTEM_CONFIG_PATH))
    }

    fn load_first(env_path: Option<PathBuf>, system_path: &Path) -> Resolved {
        let mut skipped = Vec::new();

        if let Some(path) = env_path {
            match Self::load(&path) {
                Ok(config) => {
                    return Resolved {
                        config,
                        source: ConfigSource::Env(path),
                        skipped,
                    }
                }
                Err(e) => skipped.push(SkippedConfig {
                    path,
                    error: format!("{e:#}"),
                }),
            }
        }

        if system_path.exists() {
            match Self::load(system_path) {
                Ok(config) => {
                    return Resolved {
                        config,
                        source: ConfigSource::System(system_path.to_path_buf()),
                        skipped,
                    }
                }
                Err(e) => skipped.push(SkippedConfig {
                    path: system_path.to_path_buf(),
                    error: format!("{e:#}"),
                }),
            }
        }

        Resolved {
            config: Self::default(),
            source: ConfigSource::Defaults,
            skipped,
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("TESTPULSE_BASE_URL") {
            if !url.trim().is_empty() {
                self.upstream.base_url = url;
            }
        }
        if let Ok(token) = std::env::var("TESTPULSE_TOKEN") {
            if !token.trim().is_empty() {
                self.upstream.token = Some(token);
            }
        }
    }

    /// Endpoint descriptor for the project list.
    pub fn projects_endpoint(&self) -> Endpoint {
        Endpoint {
            path: self.endpoints.projects.clone(),
            page_size: self.pagination.project_page_size,
            page_ceiling: Some(self.pagination.project_page_ceiling),
            items_field: self.endpoints.projects_field.clone(),
        }
    }

    /// Endpoint descriptor for automation projects.
    pub fn automation_projects_endpoint(&self) -> Endpoint {
        Endpoint {
            path: self.endpoints.automation_projects.clone(),
            page_size: self.pagination.project_page_size,
            page_ceiling: Some(self.pagination.project_page_ceiling),
            items_field: self.endpoints.automation_projects_field.clone(),
        }
    }

    /// Endpoint descriptor for automation executions.
    pub fn executions_endpoint(&self) -> Endpoint {
        Endpoint {
            path: self.endpoints.automation_executions.clone(),
            page_size: self.pagination.record_page_size,
            page_ceiling: None,
            items_field: self.endpoints.automation_executions_field.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Resolution result
// ---------------------------------------------------------------------------

/// Where the effective configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Explicit(PathBuf),
    Env(PathBuf),
    System(PathBuf),
    Defaults,
}

/// A candidate file that existed or was named but failed to load.
#[derive(Debug, Clone)]
pub struct SkippedConfig {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of [`Config::resolve`].
#[derive(Debug, Clone)]
pub struct Resolved {
    pub config: Config,
    pub source: ConfigSource,
    pub skipped: Vec<SkippedConfig>,
}

impl Resolved {
    /// Report how the configuration was resolved.
    pub fn log(&self) {
        for skipped in &self.skipped {
            warn!(
                path = %skipped.path.display(),
                error = %skipped.error,
                "config file could not be loaded, trying fallback"
            );
        }
        match &self.source {
            ConfigSource::Explicit(path) | ConfigSource::Env(path) | ConfigSource::System(path) => {
                info!(path = %path.display(), "loaded testpulse configuration");
            }
            ConfigSource::Defaults => debug!("no config file loaded, using compiled-in defaults"),
        }
    }
}

// ---------------------------------------------------------------------------
// Upstream
// ---------------------------------------------------------------------------

/// Where the test-automation backend lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL every endpoint path is joined onto.
    pub base_url: String,
    /// Optional bearer token.
    pub token: Option<String>,
    /// Per-request timeout (seconds).
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000/api".to_string(),
            token: None,
            timeout_secs: 15,
        }
    }
}

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

/// Paths of the list resources, plus the field each wraps its items under.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    pub projects: String,
    pub projects_field: Option<String>,
    pub automation_projects: String,
    pub automation_projects_field: Option<String>,
    pub automation_executions: String,
    pub automation_executions_field: Option<String>,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            projects: "/projects".to_string(),
            projects_field: Some("projects".to_string()),
            automation_projects: "/automation/projects".to_string(),
            automation_projects_field: Some("projects".to_string()),
            automation_executions: "/automation/executions".to_string(),
            automation_executions_field: Some("executions".to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

/// Page sizes and loop bounds for the paginator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Requested page size for project-like resources.
    pub project_page_size: u32,
    /// Server-documented maximum page size for project-like resources.
    pub project_page_ceiling: u32,
    /// Requested page size for record-like resources.
    pub record_page_size: u32,
    /// Page size of the single-shot fallback request.
    pub fallback_page_size: u32,
    /// Hard stop for servers that never report the last page.
    pub max_pages: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            project_page_size: 100,
            project_page_ceiling: 100,
            record_page_size: 1000,
            fallback_page_size: 10_000,
            max_pages: 1000,
        }
    }
}

// ---------------------------------------------------------------------------
// Refresh
// ---------------------------------------------------------------------------

/// Background refresh cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub interval_secs: u64,
    /// How many recent executions the activity log keeps per refresh.
    pub activity_limit: usize,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            activity_limit: 100,
        }
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the JSON API listens on.
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum tracing level when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
