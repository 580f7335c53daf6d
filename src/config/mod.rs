//! Configuration system (layered: code > env > config file).

pub mod conversation;

pub use conversation::{ConversationConfig, CustomInstructions};

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{LuminaryError, Result};
use crate::models::ProviderKey;

/// Layered configuration for Luminary.
///
/// Resolution order:
/// 1. Explicit values (`set_api_key`, `set_base_url`, field assignment)
/// 2. Environment variables (after `.env` is loaded)
/// 3. `luminary.toml`
#[derive(Clone)]
pub struct LuminaryConfig {
    api_keys: Arc<RwLock<HashMap<String, String>>>,
    base_urls: Arc<RwLock<HashMap<String, String>>>,
    pub runtime: RuntimeSettings,
}

impl fmt::Debug for LuminaryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let providers: Vec<String> = read_map(&self.api_keys).keys().cloned().collect();
        f.debug_struct("LuminaryConfig")
            .field("api_keys", &providers)
            .field("base_urls", &self.base_urls)
            .field("runtime", &self.runtime)
            .finish()
    }
}

impl Default for LuminaryConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Non-secret runtime knobs.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RuntimeSettings {
    /// Address the HTTP server binds to.
    pub bind_address: String,
    /// Model used when a request does not name one.
    pub default_model: String,
    /// Only this many trailing messages are sent to the model.
    pub history_window: usize,
    /// Default bound on tool-dispatch rounds per turn.
    pub max_tool_steps: u32,
    /// Attempts to establish a model stream before failing the turn.
    pub model_retries: u32,
    /// Delay between smoothed word chunks; zero disables smoothing.
    pub smooth_stream_delay_ms: u64,
    pub tools: ToolSettings,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:3000".into(),
            default_model: crate::models::DEFAULT_MODEL.into(),
            history_window: 50,
            max_tool_steps: 5,
            model_retries: 3,
            smooth_stream_delay_ms: 20,
            tools: ToolSettings::default(),
        }
    }
}

/// Endpoints and timeouts for built-in tools.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToolSettings {
    pub piston_url: String,
    pub weather_url: String,
    pub quote_url: String,
    pub search_url: String,
    pub timeout_secs: u64,
    pub run_code_timeout_secs: u64,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            piston_url: "https://emkc.org/api/v2/piston".into(),
            weather_url: "https://api.open-meteo.com/v1/forecast".into(),
            quote_url: "https://quotes-api-self.vercel.app/quote".into(),
            search_url: "https://search.rhscz.eu/search".into(),
            timeout_secs: 15,
            run_code_timeout_secs: 20,
        }
    }
}

impl ToolSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn run_code_timeout(&self) -> Duration {
        Duration::from_secs(self.run_code_timeout_secs)
    }
}

/// On-disk shape of `luminary.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    providers: HashMap<String, ProviderSection>,
    #[serde(flatten)]
    runtime: RuntimeSettings,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProviderSection {
    api_key: Option<String>,
    base_url: Option<String>,
}

fn read_map(map: &RwLock<HashMap<String, String>>) -> HashMap<String, String> {
    map.read()
        .map(|guard| guard.clone())
        .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
}

fn write_map(map: &RwLock<HashMap<String, String>>, key: &str, value: String) {
    let mut guard = map.write().unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.insert(key.to_string(), value);
}

/// Default config file location (`<config dir>/luminary/luminary.toml`).
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "luminary", "luminary")
        .map(|dirs| dirs.config_dir().join("luminary.toml"))
}

impl LuminaryConfig {
    /// Create empty config with default runtime settings.
    pub fn new() -> Self {
        Self {
            api_keys: Arc::new(RwLock::new(HashMap::new())),
            base_urls: Arc::new(RwLock::new(HashMap::new())),
            runtime: RuntimeSettings::default(),
        }
    }

    /// Load the full layered configuration: config file, then `.env` and
    /// process environment on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).or_else(default_config_path);
        let mut config = match path {
            Some(path) if path.exists() => Self::from_file(&path)?,
            Some(path) if path_was_explicit(&path) => {
                return Err(LuminaryError::Configuration(format!(
                    "config file not found: {}",
                    path.display()
                )))
            }
            _ => Self::new(),
        };
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from environment variables only.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let mut config = Self::new();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Parse a `luminary.toml` file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw, &path.display().to_string())
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Self::parse(raw, "config")
    }

    fn parse(raw: &str, origin: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(raw)
            .map_err(|e| LuminaryError::Configuration(format!("invalid {origin}: {e}")))?;
        let mut config = Self::new();
        config.runtime = file.runtime;
        for (name, section) in file.providers {
            let Some(provider) = ProviderKey::parse(&name) else {
                tracing::warn!(provider = %name, "ignoring unknown provider in config file");
                continue;
            };
            if let Some(key) = section.api_key {
                config.set_api_key(provider, key);
            }
            if let Some(url) = section.base_url {
                config.set_base_url(provider, url);
            }
        }
        Ok(config)
    }

    /// Overlay values from an environment lookup.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for provider in ProviderKey::ALL {
            if let Some(key) = lookup(provider.api_key_env()).filter(|v| !v.is_empty()) {
                self.set_api_key(provider, key);
            }
            if let Some(url) = lookup(provider.base_url_env()).filter(|v| !v.is_empty()) {
                self.set_base_url(provider, url);
            }
        }

        let runtime = &mut self.runtime;
        if let Some(bind) = lookup("LUMINARY_BIND") {
            runtime.bind_address = bind;
        }
        if let Some(model) = lookup("LUMINARY_MODEL") {
            runtime.default_model = model;
        }
        if let Some(value) = parse_env(&lookup, "LUMINARY_HISTORY_WINDOW") {
            runtime.history_window = value;
        }
        if let Some(value) = parse_env(&lookup, "LUMINARY_MAX_TOOL_STEPS") {
            runtime.max_tool_steps = value;
        }
        if let Some(value) = parse_env(&lookup, "LUMINARY_MODEL_RETRIES") {
            runtime.model_retries = value;
        }
        if let Some(value) = parse_env(&lookup, "LUMINARY_SMOOTH_STREAM_MS") {
            runtime.smooth_stream_delay_ms = value;
        }
        if let Some(url) = lookup("PISTON_URL") {
            runtime.tools.piston_url = url;
        }
        if let Some(url) = lookup("SEARXNG_URL") {
            runtime.tools.search_url = url;
        }
        if let Some(value) = parse_env(&lookup, "LUMINARY_TOOL_TIMEOUT_SECS") {
            runtime.tools.timeout_secs = value;
        }
    }

    pub fn set_api_key(&self, provider: ProviderKey, key: String) {
        write_map(&self.api_keys, provider.as_str(), key);
    }

    pub fn get_api_key(&self, provider: ProviderKey) -> Option<String> {
        read_map(&self.api_keys).get(provider.as_str()).cloned()
    }

    /// Resolve the key for `provider`, failing when it is not configured.
    pub fn require_api_key(&self, provider: ProviderKey) -> Result<String> {
        self.get_api_key(provider).ok_or_else(|| {
            LuminaryError::Configuration(format!(
                "{} is not set; the {provider} provider cannot be used",
                provider.api_key_env()
            ))
        })
    }

    pub fn set_base_url(&self, provider: ProviderKey, url: String) {
        write_map(&self.base_urls, provider.as_str(), url);
    }

    /// Base URL for `provider`, falling back to its public endpoint.
    pub fn base_url(&self, provider: ProviderKey) -> String {
        read_map(&self.base_urls)
            .get(provider.as_str())
            .cloned()
            .unwrap_or_else(|| provider.default_base_url().to_string())
    }

    /// Check if a provider has credentials configured.
    pub fn has_credentials(&self, provider: ProviderKey) -> bool {
        self.get_api_key(provider).is_some()
    }
}

fn path_was_explicit(path: &Path) -> bool {
    default_config_path().as_deref() != Some(path)
}

fn parse_env<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable environment value");
            None
        }
    }
}
