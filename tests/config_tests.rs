//! Tests for configuration system.

use std::io::Write;
use std::sync::{Mutex, OnceLock};

use luminary::config::{ConversationConfig, CustomInstructions, LuminaryConfig, RuntimeSettings};
use luminary::error::LuminaryError;
use luminary::models::ProviderKey;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

const CONFIG_ENV_VARS: [&str; 13] = [
    "GROQ_API_KEY",
    "GROQ_BASE_URL",
    "OPENROUTER_API_KEY",
    "OPENROUTER_BASE_URL",
    "LUMINARY_BIND",
    "LUMINARY_MODEL",
    "LUMINARY_HISTORY_WINDOW",
    "LUMINARY_MAX_TOOL_STEPS",
    "LUMINARY_MODEL_RETRIES",
    "LUMINARY_SMOOTH_STREAM_MS",
    "LUMINARY_TOOL_TIMEOUT_SECS",
    "PISTON_URL",
    "SEARXNG_URL",
];

struct EnvGuard {
    saved: Vec<(String, Option<String>)>,
}

impl EnvGuard {
    fn capture(keys: &[&str]) -> Self {
        let saved = keys
            .iter()
            .map(|key| ((*key).to_string(), std::env::var(key).ok()))
            .collect();
        Self { saved }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.saved {
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
    }
}

fn env_lock_guard() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn clear_config_env() {
    for key in CONFIG_ENV_VARS {
        std::env::remove_var(key);
    }
}

#[test]
fn config_set_get_api_key() {
    let config = LuminaryConfig::new();
    config.set_api_key(ProviderKey::Groq, "gsk-test-123".to_string());
    assert_eq!(
        config.get_api_key(ProviderKey::Groq),
        Some("gsk-test-123".to_string())
    );
    assert_eq!(config.get_api_key(ProviderKey::OpenRouter), None);
    assert!(config.has_credentials(ProviderKey::Groq));
    assert!(!config.has_credentials(ProviderKey::OpenRouter));
}

#[test]
fn config_set_get_base_url() {
    let config = LuminaryConfig::new();
    config.set_base_url(ProviderKey::OpenRouter, "http://localhost:8080".to_string());
    assert_eq!(config.base_url(ProviderKey::OpenRouter), "http://localhost:8080");
    assert_eq!(
        config.base_url(ProviderKey::Groq),
        ProviderKey::Groq.default_base_url()
    );
}

#[test]
fn clones_share_credentials() {
    let config = LuminaryConfig::new();
    let clone = config.clone();
    config.set_api_key(ProviderKey::OpenRouter, "sk-or-1".to_string());
    assert_eq!(
        clone.get_api_key(ProviderKey::OpenRouter).as_deref(),
        Some("sk-or-1")
    );
}

#[test]
fn debug_output_never_prints_keys() {
    let config = LuminaryConfig::new();
    config.set_api_key(ProviderKey::Groq, "gsk-secret-value".to_string());
    let rendered = format!("{config:?}");
    assert!(rendered.contains("groq"));
    assert!(!rendered.contains("gsk-secret-value"));
}

#[test]
fn from_env_reads_keys_and_runtime_overrides() {
    let _lock = env_lock_guard();
    let _guard = EnvGuard::capture(&CONFIG_ENV_VARS);
    clear_config_env();

    std::env::set_var("GROQ_API_KEY", "gsk-env");
    std::env::set_var("OPENROUTER_BASE_URL", "http://router.local/v1");
    std::env::set_var("LUMINARY_MODEL", "qwen-qwq-32b");
    std::env::set_var("LUMINARY_HISTORY_WINDOW", "12");
    std::env::set_var("SEARXNG_URL", "http://searx.local/search");
    std::env::set_var("LUMINARY_TOOL_TIMEOUT_SECS", "3");

    let config = LuminaryConfig::from_env();
    assert_eq!(config.get_api_key(ProviderKey::Groq).as_deref(), Some("gsk-env"));
    assert_eq!(config.base_url(ProviderKey::OpenRouter), "http://router.local/v1");
    assert_eq!(config.runtime.default_model, "qwen-qwq-32b");
    assert_eq!(config.runtime.history_window, 12);
    assert_eq!(config.runtime.tools.search_url, "http://searx.local/search");
    assert_eq!(config.runtime.tools.timeout_secs, 3);
}

#[test]
fn empty_env_keys_do_not_count_as_credentials() {
    let _lock = env_lock_guard();
    let _guard = EnvGuard::capture(&CONFIG_ENV_VARS);
    clear_config_env();

    std::env::set_var("OPENROUTER_API_KEY", "");
    let config = LuminaryConfig::from_env();
    assert!(!config.has_credentials(ProviderKey::OpenRouter));
}

#[test]
fn load_layers_env_over_file() {
    let _lock = env_lock_guard();
    let _guard = EnvGuard::capture(&CONFIG_ENV_VARS);
    clear_config_env();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
bind_address = "0.0.0.0:8080"
max_tool_steps = 4

[providers.openrouter]
api_key = "sk-or-file"
"#
    )
    .unwrap();
    std::env::set_var("LUMINARY_MAX_TOOL_STEPS", "1");

    let config = LuminaryConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.runtime.bind_address, "0.0.0.0:8080");
    assert_eq!(config.runtime.max_tool_steps, 1);
    assert_eq!(
        config.get_api_key(ProviderKey::OpenRouter).as_deref(),
        Some("sk-or-file")
    );
}

#[test]
fn malformed_toml_is_a_configuration_error() {
    let err = LuminaryConfig::from_toml_str("history_window = \"many\"").unwrap_err();
    assert!(matches!(err, LuminaryError::Configuration(_)));
}

#[test]
fn unknown_providers_in_file_are_skipped() {
    let config = LuminaryConfig::from_toml_str(
        r#"
[providers.anthropic]
api_key = "ignored"

[providers.groq]
base_url = "http://groq.local/v1"
"#,
    )
    .unwrap();
    assert_eq!(config.base_url(ProviderKey::Groq), "http://groq.local/v1");
    assert!(!config.has_credentials(ProviderKey::Groq));
    assert_eq!(config.runtime, RuntimeSettings::default());
}

#[test]
fn conversation_config_builder_applies_defaults() {
    let config = ConversationConfig::builder()
        .model_name("deepseek/deepseek-r1:free")
        .temperature(0.2)
        .custom_instructions(CustomInstructions {
            username: Some("Ada".into()),
            ..Default::default()
        })
        .build();
    assert_eq!(config.max_tool_steps, 5);
    assert!(config.tool_streaming_enabled);
    assert!(config.validate().is_ok());
    assert_eq!(
        config.language_model().unwrap().provider,
        ProviderKey::OpenRouter
    );

    let too_many = ConversationConfig::builder().max_tool_steps(11).build();
    assert!(too_many.validate().is_err());
}
