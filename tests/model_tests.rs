//! Tests for model routing.

use luminary::models::*;

#[test]
fn language_model_display() {
    let model = LanguageModel::new(ProviderKey::Groq, "llama-3.3-70b-versatile");
    assert_eq!(model.to_string(), "groq:llama-3.3-70b-versatile");
}

#[test]
fn language_model_provider_name() {
    let model = LanguageModel::route("google/gemini-2.0-flash-exp:free");
    assert_eq!(model.provider_name(), "openrouter");
    assert_eq!(model.model_id(), "google/gemini-2.0-flash-exp:free");
}

#[test]
fn display_output_parses_back() {
    for raw in ["qwen-qwq-32b", "deepseek/deepseek-r1:free"] {
        let model = LanguageModel::route(raw);
        let parsed: LanguageModel = model.to_string().parse().unwrap();
        assert_eq!(parsed, model);
    }
}

#[test]
fn provider_prefix_without_model_is_rejected() {
    let err = "groq:".parse::<LanguageModel>().unwrap_err();
    assert!(err.to_string().contains("missing model id"));
}

#[test]
fn unknown_prefix_is_treated_as_part_of_the_id() {
    let model: LanguageModel = "mystery:model".parse().unwrap();
    assert_eq!(model.provider, ProviderKey::Groq);
    assert_eq!(model.model_id(), "mystery:model");
}

#[test]
fn provider_keys_expose_env_and_urls() {
    for key in ProviderKey::ALL {
        assert!(key.api_key_env().ends_with("_API_KEY"));
        assert!(key.base_url_env().ends_with("_BASE_URL"));
        assert!(key.default_base_url().starts_with("https://"));
        assert_eq!(ProviderKey::parse(key.as_str()), Some(key));
    }
}
