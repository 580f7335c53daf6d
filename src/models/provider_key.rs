//! Typed provider identifiers.

use serde::{Deserialize, Serialize};

/// Canonical provider keys used across model routing, config, and provider wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKey {
    Groq,
    OpenRouter,
}

impl ProviderKey {
    /// Canonical provider key string.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Groq => "groq",
            Self::OpenRouter => "openrouter",
        }
    }

    /// Parse user-facing provider aliases into a typed provider key.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "groq" => Some(Self::Groq),
            "openrouter" | "open-router" | "open_router" => Some(Self::OpenRouter),
            _ => None,
        }
    }

    /// Environment variable holding the API key.
    pub const fn api_key_env(self) -> &'static str {
        match self {
            Self::Groq => "GROQ_API_KEY",
            Self::OpenRouter => "OPENROUTER_API_KEY",
        }
    }

    /// Environment variable overriding the base URL.
    pub const fn base_url_env(self) -> &'static str {
        match self {
            Self::Groq => "GROQ_BASE_URL",
            Self::OpenRouter => "OPENROUTER_BASE_URL",
        }
    }

    /// OpenAI-compatible API root.
    pub const fn default_base_url(self) -> &'static str {
        match self {
            Self::Groq => "https://api.groq.com/openai/v1",
            Self::OpenRouter => "https://openrouter.ai/api/v1",
        }
    }

    pub const ALL: [ProviderKey; 2] = [Self::Groq, Self::OpenRouter];
}

impl std::fmt::Display for ProviderKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
