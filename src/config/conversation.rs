//! Per-request conversation configuration. Never persisted server-side.

use bon::Builder;
use serde::{Deserialize, Serialize};

use super::RuntimeSettings;
use crate::error::{LuminaryError, Result};
use crate::models::{LanguageModel, DEFAULT_MODEL};

/// Upper bound accepted for `max_tool_steps` from a request.
pub const MAX_TOOL_STEPS_LIMIT: u32 = 10;

/// Settings that shape one conversational turn.
#[derive(Debug, Clone, Builder, PartialEq)]
pub struct ConversationConfig {
    #[builder(into, default = DEFAULT_MODEL.to_string())]
    pub model_name: String,
    #[builder(default = 0.6)]
    pub temperature: f64,
    #[builder(default = 5)]
    pub max_tool_steps: u32,
    #[builder(default = true)]
    pub tool_streaming_enabled: bool,
    #[builder(default = true)]
    pub markdown_enabled: bool,
    #[builder(default = false)]
    pub developer_mode: bool,
    #[builder(default)]
    pub custom_instructions: CustomInstructions,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ConversationConfig {
    /// Reject values outside the accepted ranges.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.temperature) || self.temperature.is_nan() {
            return Err(LuminaryError::RequestValidation(format!(
                "temperature must be within [0, 1], got {}",
                self.temperature
            )));
        }
        if self.max_tool_steps > MAX_TOOL_STEPS_LIMIT {
            return Err(LuminaryError::RequestValidation(format!(
                "maxToolSteps must be at most {MAX_TOOL_STEPS_LIMIT}, got {}",
                self.max_tool_steps
            )));
        }
        if self.model_name.trim().is_empty() {
            return Err(LuminaryError::RequestValidation(
                "model must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Resolve the model and its provider.
    pub fn language_model(&self) -> Result<LanguageModel> {
        self.model_name.parse()
    }
}

/// Free-form user preferences injected into the system prompt.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomInstructions {
    pub username: Option<String>,
    pub occupation: Option<String>,
    #[serde(alias = "interests")]
    pub user_interest_and_values: Option<String>,
    pub system_traits: Option<String>,
}

/// `settings` object of a chat request; every field optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestSettings {
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub streaming: Option<bool>,
    pub markdown_enabled: Option<bool>,
    pub developer_mode: Option<bool>,
    pub max_tool_steps: Option<u32>,
}

impl RequestSettings {
    /// Fill absent fields from runtime defaults and validate.
    pub fn resolve(
        self,
        instructions: CustomInstructions,
        runtime: &RuntimeSettings,
    ) -> Result<ConversationConfig> {
        let config = ConversationConfig::builder()
            .model_name(
                self.model
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| runtime.default_model.clone()),
            )
            .temperature(self.temperature.unwrap_or(0.6))
            .max_tool_steps(self.max_tool_steps.unwrap_or(runtime.max_tool_steps))
            .tool_streaming_enabled(self.streaming.unwrap_or(true))
            .markdown_enabled(self.markdown_enabled.unwrap_or(true))
            .developer_mode(self.developer_mode.unwrap_or(false))
            .custom_instructions(instructions)
            .build();
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_settings_resolve_to_documented_defaults() {
        let config = RequestSettings::default()
            .resolve(CustomInstructions::default(), &RuntimeSettings::default())
            .unwrap();
        assert_eq!(config, ConversationConfig::default());
        assert_eq!(config.model_name, DEFAULT_MODEL);
        assert_eq!(config.temperature, 0.6);
        assert!(config.tool_streaming_enabled);
        assert!(config.markdown_enabled);
        assert!(!config.developer_mode);
    }

    #[test]
    fn out_of_range_temperature_is_rejected() {
        let settings = RequestSettings {
            temperature: Some(1.5),
            ..Default::default()
        };
        let err = settings
            .resolve(CustomInstructions::default(), &RuntimeSettings::default())
            .unwrap_err();
        assert!(matches!(err, LuminaryError::RequestValidation(_)));
    }

    #[test]
    fn settings_parse_from_camel_case_json() {
        let settings: RequestSettings = serde_json::from_value(serde_json::json!({
            "model": "qwen-qwq-32b",
            "markdownEnabled": false,
            "developerMode": true
        }))
        .unwrap();
        assert_eq!(settings.markdown_enabled, Some(false));
        assert_eq!(settings.developer_mode, Some(true));

        let instructions: CustomInstructions = serde_json::from_value(serde_json::json!({
            "username": "Sam",
            "userInterestAndValues": "compilers"
        }))
        .unwrap();
        assert_eq!(instructions.user_interest_and_values.as_deref(), Some("compilers"));
    }
}
