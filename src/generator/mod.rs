use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use std::str::FromStr;
use tera::{Context as TeraContext, Tera};
use tracing::debug;

use crate::error::ApiError;
use crate::settings::GeneratorSettings;

mod selection;

pub use selection::InstructionSelection;

const PROMPT_TEMPLATE: &str = include_str!("templates/instructions_prompt.tera");
const PROXY_AUTHORIZATION: &str = "not needed";

/// Creativity dial for generated instructions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpiceLevel {
    #[default]
    Normal,
    Spicy,
    Nuclear,
}

struct SpiceProfile {
    temperature: f64,
    creativity: &'static str,
    fun_examples: &'static str,
    business_examples: &'static str,
}

impl SpiceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpiceLevel::Normal => "normal",
            SpiceLevel::Spicy => "spicy",
            SpiceLevel::Nuclear => "nuclear",
        }
    }

    pub fn temperature(&self) -> f64 {
        self.profile().temperature
    }

    fn profile(&self) -> SpiceProfile {
        match self {
            SpiceLevel::Normal => SpiceProfile {
                temperature: 0.8,
                creativity: "moderately creative and engaging",
                fun_examples: "Use dad jokes where appropriate, Add excitement with emojis, Make it sound like a pirate",
                business_examples: "Use formal business terminology, Keep sentences concise and clear, Maintain a professional tone",
            },
            SpiceLevel::Spicy => SpiceProfile {
                temperature: 1.0,
                creativity: "very creative and unexpected",
                fun_examples: "Translate as if you're a time-traveling Shakespeare, Add onomatopoeia and sound effects, Write like a fantasy novel narrator",
                business_examples: "Use jargon-heavy corporate speak, Write like a management consultant, Add buzzwords and synergy",
            },
            SpiceLevel::Nuclear => SpiceProfile {
                temperature: 1.2,
                creativity: "wildly creative and absurd",
                fun_examples: "Translate as if aliens are trying to learn human language, Add random medieval references, Write like a dramatic soap opera",
                business_examples: "Use so much jargon it's barely comprehensible, Write like a robot pretending to be professional, Add ridiculous corporate metaphors",
            },
        }
    }
}

impl fmt::Display for SpiceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpiceLevel {
    type Err = ApiError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "normal" => Ok(SpiceLevel::Normal),
            "spicy" => Ok(SpiceLevel::Spicy),
            "nuclear" => Ok(SpiceLevel::Nuclear),
            other => Err(ApiError::validation(format!(
                "unknown spice level '{}' (expected normal, spicy or nuclear)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstructionCategory {
    Fun,
    Business,
}

impl InstructionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstructionCategory::Fun => "fun",
            InstructionCategory::Business => "business",
        }
    }

    /// Anything that is not "fun" counts as business.
    fn normalize(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("fun") {
            InstructionCategory::Fun
        } else {
            InstructionCategory::Business
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorizedInstruction {
    pub category: InstructionCategory,
    pub instruction: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerateRequest {
    pub count: usize,
    pub max_length: usize,
    pub spice_level: SpiceLevel,
}

impl GenerateRequest {
    pub fn new(max_length: usize, spice_level: SpiceLevel) -> Self {
        Self {
            count: 4,
            max_length,
            spice_level,
        }
    }
}

pub fn render_prompt(request: &GenerateRequest) -> Result<String> {
    let profile = request.spice_level.profile();
    let business_count = request.count / 2;
    let mut context = TeraContext::new();
    context.insert("count", &request.count);
    context.insert("fun_count", &(request.count - business_count));
    context.insert("business_count", &business_count);
    context.insert("level", request.spice_level.as_str());
    context.insert("creativity", profile.creativity);
    context.insert("fun_examples", profile.fun_examples);
    context.insert("business_examples", profile.business_examples);
    context.insert("max_length", &request.max_length);
    Tera::one_off(PROMPT_TEMPLATE, &context, false)
        .with_context(|| "failed to render instruction prompt")
}

pub fn chat_request_body(
    prompt: &str,
    request: &GenerateRequest,
    settings: &GeneratorSettings,
) -> Value {
    json!({
        "model": settings.model,
        "temperature": request.spice_level.temperature(),
        "max_tokens": settings.max_tokens,
        "top_p": 1,
        "presence_penalty": 1,
        "messages": [
            {"role": "user", "content": prompt}
        ],
        "stream": false
    })
}

/// Asks the chat endpoint for candidate instructions. One round trip, no
/// retry.
pub async fn generate(
    http: &reqwest::Client,
    endpoint: &str,
    request: &GenerateRequest,
    settings: &GeneratorSettings,
) -> Result<Vec<CategorizedInstruction>, ApiError> {
    let endpoint = endpoint.trim().trim_end_matches('/');
    if endpoint.is_empty() {
        return Err(ApiError::validation("OpenAI proxy URL not configured"));
    }
    let prompt = render_prompt(request).map_err(|err| ApiError::Internal(format!("{:#}", err)))?;
    let body = chat_request_body(&prompt, request, settings);
    let url = format!("{}/v1/chat/completions", endpoint);
    debug!(
        "POST {} (spice={}, temperature={})",
        url,
        request.spice_level,
        request.spice_level.temperature()
    );

    let response = http
        .post(&url)
        .bearer_auth(PROXY_AUTHORIZATION)
        .json(&body)
        .send()
        .await?;
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(ApiError::Upstream {
            status: status.as_u16(),
            message: format!(
                "OpenAI Proxy error: {}",
                status.canonical_reason().unwrap_or("Unknown Status")
            ),
            details: Some(text),
        });
    }

    let content = extract_message_content(&text)?;
    parse_instructions(&content, request.max_length)
}

fn extract_message_content(body: &str) -> Result<String, ApiError> {
    #[derive(Deserialize)]
    struct ChatResponse {
        #[serde(default)]
        choices: Vec<ChatChoice>,
    }

    #[derive(Deserialize)]
    struct ChatChoice {
        message: Option<ChatMessage>,
    }

    #[derive(Deserialize)]
    struct ChatMessage {
        content: Option<String>,
    }

    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|err| ApiError::parse(format!("failed to parse chat response JSON: {}", err)))?;
    Ok(parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .filter(|content| !content.trim().is_empty())
        .unwrap_or_else(|| "[]".to_string()))
}

/// Turns a model reply into instructions. The reply may wrap the JSON array
/// in prose; the outermost bracketed span is tried when direct parsing fails.
pub fn parse_instructions(
    content: &str,
    max_length: usize,
) -> Result<Vec<CategorizedInstruction>, ApiError> {
    let value: Value = match serde_json::from_str(content.trim()) {
        Ok(value) => value,
        Err(_) => {
            let slice = bracketed_span(content)
                .ok_or_else(|| ApiError::parse("Failed to parse instructions from response"))?;
            serde_json::from_str(slice).map_err(|err| {
                ApiError::parse(format!("Failed to parse instructions from response: {}", err))
            })?
        }
    };

    let Value::Array(items) = value else {
        return Err(ApiError::parse("Invalid response format: not an array"));
    };

    let instructions = items
        .iter()
        .filter_map(|item| {
            let category = non_empty_str(item.get("category"))?;
            let instruction = non_empty_str(item.get("instruction"))?;
            Some(CategorizedInstruction {
                category: InstructionCategory::normalize(category),
                instruction: truncate_with_ellipsis(instruction, max_length),
            })
        })
        .collect::<Vec<_>>();

    if instructions.is_empty() {
        return Err(ApiError::parse("No valid instructions in response"));
    }
    Ok(instructions)
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .filter(|value| !value.trim().is_empty())
}

fn bracketed_span(content: &str) -> Option<&str> {
    let start = content.find('[')?;
    let end = content.rfind(']')?;
    if end <= start {
        return None;
    }
    Some(&content[start..=end])
}

/// Caps `text` at `max_length` characters, ending in "..." when cut.
///
/// Limits below three leave room for dots only.
pub fn truncate_with_ellipsis(text: &str, max_length: usize) -> String {
    if text.chars().count() <= max_length {
        return text.to_string();
    }
    if max_length < 3 {
        return ".".repeat(max_length);
    }
    let keep = max_length - 3;
    let mut truncated = text.chars().take(keep).collect::<String>();
    truncated.push_str("...");
    truncated
}
