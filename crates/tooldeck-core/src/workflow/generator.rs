//! Generation / transform hook — the injected text-generation capability.
//!
//! The executor only knows the [`Generator`] trait. Hosting code wires in an
//! [`LlmGenerator`] (Anthropic-compatible Messages API over HTTP), or leaves
//! the default [`DisabledGenerator`] in place.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ExecutionError;
use crate::workflow::schema::GenerationContext;

/// Text/code generation capability used by `_generate` and `_transform`.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce a parameter value from a prompt.
    async fn generate(&self, prompt: &str, context: GenerationContext) -> Result<Value, String>;

    /// Reshape a just-computed action result.
    async fn transform(
        &self,
        raw: &Value,
        prompt: &str,
        context: GenerationContext,
    ) -> Result<Value, String>;
}

/// Fails every call; used when no generator is configured.
#[derive(Debug, Default, Clone)]
pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    async fn generate(&self, _prompt: &str, _context: GenerationContext) -> Result<Value, String> {
        Err("no generator configured".to_string())
    }

    async fn transform(
        &self,
        _raw: &Value,
        _prompt: &str,
        _context: GenerationContext,
    ) -> Result<Value, String> {
        Err("no generator configured".to_string())
    }
}

/// Coerce hook output to the shape its context promises.
///
/// - `json`: strings are parsed as JSON (after stripping code fences)
/// - `sql`: must be a string; fences are stripped
/// - `markdown` / `general`: strings have a wrapping fence stripped, other values pass through
pub fn normalize_output(value: Value, context: GenerationContext) -> Result<Value, ExecutionError> {
    match context {
        GenerationContext::Json => match value {
            Value::String(text) => {
                let body = strip_code_fences(&text);
                serde_json::from_str(body).map_err(|e| {
                    ExecutionError::GenerationOutputInvalid(format!(
                        "expected JSON output: {}",
                        e
                    ))
                })
            }
            other => Ok(other),
        },
        GenerationContext::Sql => match value {
            Value::String(text) => Ok(Value::String(strip_code_fences(&text).to_string())),
            other => Err(ExecutionError::GenerationOutputInvalid(format!(
                "expected SQL text, got {}",
                crate::registry::schema::describe_value(&other)
            ))),
        },
        GenerationContext::Markdown | GenerationContext::General => match value {
            Value::String(text) => Ok(Value::String(strip_code_fences(&text).to_string())),
            other => Ok(other),
        },
    }
}

/// Remove a single wrapping ```lang … ``` fence, if present.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the language tag on the opening line.
    match body.find('\n') {
        Some(idx) => body[idx + 1..].trim(),
        None => body.trim(),
    }
}

/// Configuration for [`LlmGenerator`].
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".to_string(),
            api_key: String::new(),
            model: "claude-3-5-haiku-latest".to_string(),
            max_tokens: 4096,
            temperature: Some(0.0),
        }
    }
}

impl GeneratorConfig {
    /// Read `TOOLDECK_LLM_*` variables; `None` when no API key is set.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("TOOLDECK_LLM_API_KEY")
            .or_else(|_| std::env::var("ANTHROPIC_API_KEY"))
            .ok()
            .filter(|k| !k.is_empty())?;
        let defaults = Self::default();
        Some(Self {
            base_url: std::env::var("TOOLDECK_LLM_BASE_URL").unwrap_or(defaults.base_url),
            model: std::env::var("TOOLDECK_LLM_MODEL").unwrap_or(defaults.model),
            api_key,
            ..defaults
        })
    }
}

/// Calls an Anthropic-compatible Messages API.
pub struct LlmGenerator {
    client: reqwest::Client,
    config: GeneratorConfig,
}

impl LlmGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            config,
        }
    }

    fn system_prompt(context: GenerationContext) -> &'static str {
        match context {
            GenerationContext::Sql => {
                "You write SQL. Reply with a single SQL statement only, no commentary."
            }
            GenerationContext::Markdown => "Reply in GitHub-flavoured Markdown only.",
            GenerationContext::Json => {
                "Reply with a single valid JSON value only, no commentary and no code fences."
            }
            GenerationContext::General => "Reply with the requested text only.",
        }
    }

    /// POST {base_url}/v1/messages
    async fn complete(&self, context: GenerationContext, user_prompt: &str) -> Result<String, String> {
        let url = format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'));

        let mut body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "system": Self::system_prompt(context),
            "messages": [
                { "role": "user", "content": user_prompt }
            ]
        });
        if let Some(temp) = self.config.temperature {
            body["temperature"] = serde_json::json!(temp);
        }

        tracing::info!(
            "[Generator] Calling {} (model: {}, context: {})",
            url,
            self.config.model,
            context.as_str()
        );

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("HTTP request failed: {}", e))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| format!("Failed to read response body: {}", e))?;

        if !status.is_success() {
            return Err(format!("API returned {}: {}", status, response_text));
        }

        let json: Value = serde_json::from_str(&response_text)
            .map_err(|e| format!("Failed to parse response JSON: {}", e))?;

        let content = json
            .get("content")
            .and_then(|c| c.as_array())
            .and_then(|arr| {
                arr.iter()
                    .filter_map(|block| {
                        if block.get("type").and_then(|t| t.as_str()) == Some("text") {
                            block.get("text").and_then(|t| t.as_str()).map(|s| s.to_string())
                        } else {
                            None
                        }
                    })
                    .reduce(|a, b| format!("{}\n{}", a, b))
            })
            .ok_or_else(|| "Response contained no text content".to_string())?;

        Ok(content)
    }
}

#[async_trait]
impl Generator for LlmGenerator {
    async fn generate(&self, prompt: &str, context: GenerationContext) -> Result<Value, String> {
        self.complete(context, prompt).await.map(Value::String)
    }

    async fn transform(
        &self,
        raw: &Value,
        prompt: &str,
        context: GenerationContext,
    ) -> Result<Value, String> {
        let data = serde_json::to_string_pretty(raw).unwrap_or_else(|_| raw.to_string());
        let user_prompt = format!("{}\n\nData:\n```json\n{}\n```", prompt, data);
        self.complete(context, &user_prompt).await.map(Value::String)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```\nSELECT 1\n```"), "SELECT 1");
        assert_eq!(strip_code_fences("  plain  "), "plain");
        assert_eq!(strip_code_fences("```unterminated"), "```unterminated");
    }

    #[test]
    fn test_normalize_json_output() {
        assert_eq!(
            normalize_output(json!("```json\n[1, 2]\n```"), GenerationContext::Json).unwrap(),
            json!([1, 2])
        );
        assert_eq!(
            normalize_output(json!({ "a": 1 }), GenerationContext::Json).unwrap(),
            json!({ "a": 1 })
        );
        let err = normalize_output(json!("not json"), GenerationContext::Json).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::GenerationOutputInvalid);
    }

    #[test]
    fn test_normalize_sql_output() {
        assert_eq!(
            normalize_output(json!("```sql\nSELECT * FROM users\n```"), GenerationContext::Sql)
                .unwrap(),
            json!("SELECT * FROM users")
        );
        let err = normalize_output(json!(12), GenerationContext::Sql).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::GenerationOutputInvalid);
    }

    #[test]
    fn test_normalize_markdown_passes_through() {
        assert_eq!(
            normalize_output(json!("| a |\n|---|"), GenerationContext::Markdown).unwrap(),
            json!("| a |\n|---|")
        );
        assert_eq!(
            normalize_output(json!([1]), GenerationContext::General).unwrap(),
            json!([1])
        );
    }

    #[tokio::test]
    async fn test_disabled_generator_fails() {
        let generator = DisabledGenerator;
        assert!(generator.generate("hi", GenerationContext::General).await.is_err());
        assert!(generator
            .transform(&json!(1), "hi", GenerationContext::Json)
            .await
            .is_err());
    }
}
