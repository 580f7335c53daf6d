//! Model provider trait and the OpenAI-compatible implementation.

pub mod http;
pub mod openai_compatible;

pub use openai_compatible::OpenAiCompatibleProvider;

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::config::LuminaryConfig;
use crate::error::LuminaryError;
use crate::models::LanguageModel;
use crate::types::{GenerationSettings, ModelMessage, TextStreamDelta};

/// A request sent to a model provider.
#[derive(Debug, Clone, Default)]
pub struct ProviderRequest {
    pub messages: Vec<ModelMessage>,
    pub settings: GenerationSettings,
    pub tools: Option<Vec<ToolDefinition>>,
    /// Whether tool-call argument fragments should be surfaced as deltas.
    pub stream_tool_calls: bool,
}

/// Tool definition sent to the provider API.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Stream of deltas for one model step.
pub type DeltaStream = BoxStream<'static, Result<TextStreamDelta, LuminaryError>>;

/// Core trait implemented by all model providers.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name (e.g., "groq").
    fn provider_name(&self) -> &str;
    /// The model ID this provider instance serves.
    fn model_id(&self) -> &str;

    /// Start streaming one model step.
    ///
    /// Errors returned here happen before any delta was produced and may be
    /// retried; errors inside the stream may not.
    async fn stream_text(&self, request: &ProviderRequest) -> Result<DeltaStream, LuminaryError>;
}

/// Creates providers for the models named in requests.
pub trait ProviderFactory: Send + Sync {
    fn create(&self, model: &LanguageModel) -> Result<Arc<dyn ModelProvider>, LuminaryError>;
}

/// Factory backed by [`LuminaryConfig`] credentials.
#[derive(Debug, Clone)]
pub struct ConfigProviderFactory {
    config: LuminaryConfig,
}

impl ConfigProviderFactory {
    pub fn new(config: LuminaryConfig) -> Self {
        Self { config }
    }
}

impl ProviderFactory for ConfigProviderFactory {
    fn create(&self, model: &LanguageModel) -> Result<Arc<dyn ModelProvider>, LuminaryError> {
        create_provider(model, &self.config)
    }
}

/// Create a provider for the given model, using the provided config.
///
/// Fails with `Configuration` when the provider's API key is unset.
pub fn create_provider(
    model: &LanguageModel,
    config: &LuminaryConfig,
) -> Result<Arc<dyn ModelProvider>, LuminaryError> {
    let api_key = config.require_api_key(model.provider)?;
    Ok(Arc::new(OpenAiCompatibleProvider::new(
        model.provider,
        model.model_id(),
        api_key,
        config.base_url(model.provider),
    )))
}
