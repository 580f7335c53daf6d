//! Model identifiers and provider routing.

pub mod provider_key;

pub use provider_key::ProviderKey;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LuminaryError;

/// Model used when a request does not name one.
pub const DEFAULT_MODEL: &str = "deepseek-r1-distill-llama-70b";

/// A concrete model on a concrete provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct LanguageModel {
    pub provider: ProviderKey,
    pub model_id: String,
}

impl LanguageModel {
    pub fn new(provider: ProviderKey, model_id: impl Into<String>) -> Self {
        Self {
            provider,
            model_id: model_id.into(),
        }
    }

    /// Route a bare model id: namespaced ids (`vendor/model`) go to
    /// OpenRouter, everything else to Groq.
    pub fn route(model_id: &str) -> Self {
        let provider = if model_id.contains('/') {
            ProviderKey::OpenRouter
        } else {
            ProviderKey::Groq
        };
        Self::new(provider, model_id)
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn provider_name(&self) -> &str {
        self.provider.as_str()
    }
}

impl Default for LanguageModel {
    fn default() -> Self {
        Self::route(DEFAULT_MODEL)
    }
}

impl fmt::Display for LanguageModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.model_id)
    }
}

impl FromStr for LanguageModel {
    type Err = LuminaryError;

    /// Parse `provider:model` or a bare model id (routed by shape).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(LuminaryError::RequestValidation(
                "model id must not be empty".into(),
            ));
        }
        if let Some((prefix, rest)) = s.split_once(':') {
            if let Some(provider) = ProviderKey::parse(prefix) {
                if rest.is_empty() {
                    return Err(LuminaryError::RequestValidation(format!(
                        "missing model id after provider '{prefix}'"
                    )));
                }
                return Ok(Self::new(provider, rest));
            }
        }
        Ok(Self::route(s))
    }
}
