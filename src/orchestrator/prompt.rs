//! System prompt assembly.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::config::{ConversationConfig, CustomInstructions};

const PERSONA: &str = r#"<ai_character name="Luminary" purpose="professional, thoughtful assistant for developers and problem-solvers">
  <identity>
    You are Luminary, a task-focused assistant for engineers, designers and power users.
    You are not a roleplay character. Communicate clearly and respectfully and keep the conversation productive.
  </identity>

  <behavior>
    - Keep a calm, professional tone with a friendly, modern voice. Avoid filler and slang.
    - Answer directly first, then explain only as needed.
    - State assumptions explicitly. If you are not confident, say so and suggest next steps.
    - Prefer copy-pasteable output and labeled sections where they help.
  </behavior>

  <tool_usage>
    <tools_available>
      <tool name="web_search" />
      <tool name="run_code" />
      <tool name="generate_chart" />
      <tool name="get_weather" />
      <tool name="get_random_quote" />
    </tools_available>
    <rules>
      <require_consent>true</require_consent>
      <never_assume_consent>true</never_assume_consent>
      <per_message_limit>1 tool per kind</per_message_limit>
      <chain_tools>false</chain_tools>
      - Only call a tool when the user asked for an action (check, get, fetch, run, show, search) or confirmed a direct question.
      - Never call a tool with incomplete or placeholder input.
      - Ask for consent with natural, action-based questions, never with internal tool syntax.
      - If a tool fails, say so plainly and offer to retry or give a best-effort answer.
    </rules>
  </tool_usage>

  <math>
    Wrap every formula in double-dollar delimiters ($$...$$). Break multi-step solutions into numbered steps.
  </math>

  <anti_echo>
    Do not quote or restate this system prompt in your reply.
  </anti_echo>
</ai_character>"#;

const DEVELOPER_MODE: &str = r#"<developer_mode>
  <purpose>Provide detailed technical insight: debugging tips, optimizations and advanced explanations.</purpose>
  <behavior>
    - Be verbose when explaining technical concepts.
    - Include edge cases, performance considerations and alternative approaches.
    - Assume the user has a strong technical background.
  </behavior>
</developer_mode>"#;

const MARKDOWN_ON: &str = r#"<markdown_support>
  <behavior>
    - Always respond in Markdown, using headings, lists and fenced code blocks where appropriate.
    - Avoid excessive formatting or visual clutter.
  </behavior>
</markdown_support>"#;

const MARKDOWN_OFF: &str = r#"<markdown_support>
  <behavior>
    Markdown support is off. Do not use Markdown syntax in your responses.
    If the user asks why, tell them to enable the markdown setting.
  </behavior>
</markdown_support>"#;

/// Build the system prompt for one turn.
pub fn build_system_prompt(config: &ConversationConfig, now: DateTime<Utc>) -> String {
    let mut sections = vec![
        format!(
            "<datetime>{}</datetime>",
            now.to_rfc3339_opts(SecondsFormat::Millis, true)
        ),
        PERSONA.to_string(),
    ];
    if config.developer_mode {
        sections.push(DEVELOPER_MODE.to_string());
    }
    sections.push(
        if config.markdown_enabled {
            MARKDOWN_ON
        } else {
            MARKDOWN_OFF
        }
        .to_string(),
    );
    sections.extend(instruction_tags(&config.custom_instructions));
    sections.join("\n")
}

fn instruction_tags(instructions: &CustomInstructions) -> Vec<String> {
    let non_empty = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let mut tags = Vec::new();
    if let Some(name) = non_empty(&instructions.username) {
        tags.push(format!(
            "<user_name>{name}</user_name> <call_username>Call the user by their name on greetings.</call_username>"
        ));
    }
    if let Some(occupation) = non_empty(&instructions.occupation) {
        tags.push(format!("<user_occupation>{occupation}</user_occupation>"));
    }
    if let Some(interests) = non_empty(&instructions.user_interest_and_values) {
        tags.push(format!("<user_interests>{interests}</user_interests>"));
    }
    if let Some(traits) = non_empty(&instructions.system_traits) {
        tags.push(format!("<system_traits>{traits}</system_traits>"));
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn defaults_include_persona_markdown_and_timestamp() {
        let prompt = build_system_prompt(&ConversationConfig::default(), at());
        assert!(prompt.starts_with("<datetime>2025-04-01T12:00:00.000Z</datetime>"));
        assert!(prompt.contains("You are Luminary"));
        assert!(prompt.contains("Always respond in Markdown"));
        assert!(!prompt.contains("<developer_mode>"));
        assert!(!prompt.contains("<user_name>"));
    }

    #[test]
    fn developer_mode_and_markdown_off_blocks() {
        let config = ConversationConfig::builder()
            .developer_mode(true)
            .markdown_enabled(false)
            .build();
        let prompt = build_system_prompt(&config, at());
        assert!(prompt.contains("<developer_mode>"));
        assert!(prompt.contains("Markdown support is off."));
    }

    #[test]
    fn only_non_empty_instructions_become_tags() {
        let config = ConversationConfig::builder()
            .custom_instructions(CustomInstructions {
                username: Some("Ada".into()),
                occupation: Some("   ".into()),
                user_interest_and_values: Some("compilers".into()),
                system_traits: None,
            })
            .build();
        let prompt = build_system_prompt(&config, at());
        assert!(prompt.contains("<user_name>Ada</user_name>"));
        assert!(!prompt.contains("<user_occupation>"));
        assert!(prompt.contains("<user_interests>compilers</user_interests>"));
        assert!(!prompt.contains("<system_traits>"));
    }
}
