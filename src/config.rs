//! # Configuration
//!
//! [`ApiConfig`] holds the deployment settings of an [`Api`]: where the dev
//! server listens and how requests are routed (base URL, version signals,
//! default output format, whether 404s carry documentation). It loads from a
//! YAML, TOML or JSON file chosen by extension, and `HUGROUTE_*` environment
//! variables override the file:
//!
//! - `HUGROUTE_HOST`, `HUGROUTE_PORT`
//! - `HUGROUTE_BASE_URL`
//! - `HUGROUTE_DOCUMENTATION_404` (`true`/`false`)
//! - `HUGROUTE_VERSION_HEADER`, `HUGROUTE_VERSION_PARAM`
//! - `HUGROUTE_OUTPUT_FORMAT`
//!
//! ```yaml
//! host: 0.0.0.0
//! port: 8000
//! base_url: /api
//! output_format: pretty_json
//! ```
//!
//! [`RuntimeConfig`] carries the coroutine runtime knobs of the dev server.

use std::env;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

use crate::api::version::{DEFAULT_VERSION_HEADER, DEFAULT_VERSION_PARAM};
use crate::api::Api;
use crate::format::output;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub base_url: String,
    pub documentation_404: bool,
    pub version_header: String,
    pub version_param: String,
    pub output_format: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            base_url: String::new(),
            documentation_404: true,
            version_header: DEFAULT_VERSION_HEADER.to_string(),
            version_param: DEFAULT_VERSION_PARAM.to_string(),
            output_format: "json".to_string(),
        }
    }
}

impl ApiConfig {
    /// Parse a configuration file.
    ///
    /// # Errors
    ///
    /// Unreadable files, unknown extensions and malformed content.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        let config: Self = match extension.as_deref() {
            Some("yaml" | "yml") => serde_yaml::from_str(&content)
                .with_context(|| format!("failed to parse YAML config {}", path.display()))?,
            Some("toml") => toml::from_str(&content)
                .with_context(|| format!("failed to parse TOML config {}", path.display()))?,
            Some("json") => serde_json::from_str(&content)
                .with_context(|| format!("failed to parse JSON config {}", path.display()))?,
            _ => bail!("unsupported config format: {}", path.display()),
        };
        config.validated()
    }

    /// Defaults overridden by the environment.
    ///
    /// # Errors
    ///
    /// Malformed environment values.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Override fields from `HUGROUTE_*` environment variables.
    ///
    /// # Errors
    ///
    /// Malformed environment values.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|name| env::var(name).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(host) = lookup("HUGROUTE_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("HUGROUTE_PORT") {
            self.port = port
                .trim()
                .parse()
                .with_context(|| format!("HUGROUTE_PORT is not a port number: {port}"))?;
        }
        if let Some(base_url) = lookup("HUGROUTE_BASE_URL") {
            self.base_url = base_url;
        }
        if let Some(enabled) = lookup("HUGROUTE_DOCUMENTATION_404") {
            self.documentation_404 = enabled
                .trim()
                .parse()
                .with_context(|| format!("HUGROUTE_DOCUMENTATION_404 is not a boolean: {enabled}"))?;
        }
        if let Some(header) = lookup("HUGROUTE_VERSION_HEADER") {
            self.version_header = header;
        }
        if let Some(param) = lookup("HUGROUTE_VERSION_PARAM") {
            self.version_param = param;
        }
        if let Some(format) = lookup("HUGROUTE_OUTPUT_FORMAT") {
            self.output_format = format;
        }
        let validated = std::mem::take(self).validated()?;
        *self = validated;
        Ok(())
    }

    fn validated(mut self) -> Result<Self> {
        if output::by_name(&self.output_format).is_none() {
            bail!("unknown output format: {}", self.output_format);
        }
        let trimmed = self.base_url.trim_end_matches('/');
        if !trimmed.is_empty() && !trimmed.starts_with('/') {
            bail!("base_url must start with '/': {}", self.base_url);
        }
        self.base_url = trimmed.to_string();
        Ok(self)
    }

    /// `host:port` for the dev server.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Apply the routing settings to `api`.
    ///
    /// # Errors
    ///
    /// An unknown output format name.
    pub fn apply(&self, api: &mut Api) -> Result<()> {
        let format = output::by_name(&self.output_format)
            .ok_or_else(|| anyhow!("unknown output format: {}", self.output_format))?;
        api.http.set_output_format(format);
        api.http.set_base_url(&self.base_url);
        api.http.set_documentation_404(self.documentation_404);
        api.http.set_version_header(&self.version_header);
        api.http.set_version_param(&self.version_param);
        Ok(())
    }
}

const DEFAULT_STACK_SIZE: usize = 0x4000;

/// Coroutine runtime settings for the dev server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Stack size of each request coroutine, in bytes.
    pub stack_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

impl RuntimeConfig {
    /// Reads `HUGROUTE_STACK_SIZE`, decimal or `0x` hex; 16 KiB otherwise.
    #[must_use]
    pub fn from_env() -> Self {
        let stack_size = env::var("HUGROUTE_STACK_SIZE")
            .ok()
            .and_then(|raw| parse_size(&raw))
            .unwrap_or(DEFAULT_STACK_SIZE);
        Self { stack_size }
    }
}

fn parse_size(raw: &str) -> Option<usize> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}
