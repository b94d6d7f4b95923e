use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::pipeline::response::{ModelOutput, QaAnswer};

pub type TokenId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A role-tagged prompt unit, serialized the way chat templates expect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Sampling knobs forwarded to the backend untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_new_tokens: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_k: 50,
            top_p: 0.95,
            max_new_tokens: 256,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Chat-templated prompt text.
    pub prompt: String,
    pub messages: Vec<Message>,
    pub sampling: SamplingParams,
}

/// The tokenizer half of the model backend.
#[async_trait]
pub trait Tokenizer: Send + Sync {
    async fn encode(&self, text: &str) -> Result<Vec<TokenId>>;

    async fn decode(&self, tokens: &[TokenId]) -> Result<String>;

    /// Render messages with the model's chat template, generation prompt included.
    async fn apply_chat_template(&self, messages: &[Message]) -> Result<String>;

    async fn count_tokens(&self, text: &str) -> Result<usize> {
        Ok(self.encode(text).await?.len())
    }
}

/// The generation half of the model backend.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<ModelOutput>;
}

/// Client for a llama.cpp-compatible inference server. Serves as both
/// tokenizer and generative backend.
pub struct LlmClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl LlmClient {
    pub fn from_env() -> Result<Self> {
        let base_url = dotenv::var("LLM_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:8080".to_string());
        let api_key = dotenv::var("LLM_API_KEY").ok().filter(|k| !k.is_empty());

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<serde_json::Value> {
        let mut req = self.client.post(self.endpoint(path)).json(&body);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let resp = req
            .send()
            .await
            .with_context(|| format!("LLM request to /{} failed", path))?
            .error_for_status()
            .with_context(|| format!("LLM /{} returned an error status", path))?;
        let text = resp.text().await.context("Failed to read LLM response")?;
        serde_json::from_str(&text).context("Failed to parse LLM JSON")
    }
}

/// Required string field of a server response.
pub(crate) fn string_field(json: &serde_json::Value, field: &str, endpoint: &str) -> Result<String> {
    json[field]
        .as_str()
        .map(str::to_string)
        .with_context(|| format!("Malformed {} response: missing `{}`", endpoint, field))
}

#[async_trait]
impl Tokenizer for LlmClient {
    async fn encode(&self, text: &str) -> Result<Vec<TokenId>> {
        let json = self
            .post(
                "tokenize",
                serde_json::json!({ "content": text, "add_special": false }),
            )
            .await?;
        serde_json::from_value(json["tokens"].clone()).context("Malformed /tokenize response")
    }

    async fn decode(&self, tokens: &[TokenId]) -> Result<String> {
        let json = self
            .post("detokenize", serde_json::json!({ "tokens": tokens }))
            .await?;
        string_field(&json, "content", "/detokenize")
    }

    async fn apply_chat_template(&self, messages: &[Message]) -> Result<String> {
        let json = self
            .post("apply-template", serde_json::json!({ "messages": messages }))
            .await?;
        string_field(&json, "prompt", "/apply-template")
    }
}

#[async_trait]
impl ModelBackend for LlmClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<ModelOutput> {
        let sampling = &request.sampling;
        let body = serde_json::json!({
            "prompt": request.prompt,
            "n_predict": sampling.max_new_tokens,
            "temperature": sampling.temperature,
            "top_k": sampling.top_k,
            "top_p": sampling.top_p,
        });

        let json = self.post("completion", body).await?;
        let content = string_field(&json, "content", "/completion")?;
        debug!(output_len = content.len(), "completion received");
        Ok(ModelOutput::Generated(content))
    }
}

/// Client for an extractive question-answering endpoint.
pub struct QaClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl QaClient {
    pub fn from_env() -> Result<Self> {
        let endpoint = dotenv::var("QA_ENDPOINT_URL").context("QA_ENDPOINT_URL required for the extractive backend")?;
        let api_key = dotenv::var("QA_API_KEY").ok().filter(|k| !k.is_empty());

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }
}

/// Split templated messages into the (question, context) pair a QA model wants.
/// Context is every system message after the first instruction.
pub(crate) fn qa_inputs(messages: &[Message]) -> (String, String) {
    let question = messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.clone())
        .unwrap_or_default();
    let context = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .skip(1)
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    (question, context)
}

/// QA endpoints answer with either a single object or a ranked list.
pub(crate) fn parse_qa_answer(json: &serde_json::Value) -> Result<QaAnswer> {
    let best = match json {
        serde_json::Value::Array(items) => items.first().context("Empty QA answer list")?,
        other => other,
    };
    serde_json::from_value(best.clone()).context("Malformed QA answer")
}

#[async_trait]
impl ModelBackend for QaClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<ModelOutput> {
        let (question, context) = qa_inputs(&request.messages);
        let body = serde_json::json!({
            "inputs": { "question": question, "context": context },
        });

        let mut req = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let resp = req
            .send()
            .await
            .context("QA request failed")?
            .error_for_status()
            .context("QA endpoint returned an error status")?;
        let json: serde_json::Value = resp.json().await.context("Failed to parse QA JSON")?;
        let answer = parse_qa_answer(&json)?;
        debug!(score = answer.score, "QA answer received");
        Ok(ModelOutput::Extracted(answer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChatError;

    #[test]
    fn test_message_serializes_lowercase_role() {
        let json = serde_json::to_value(Message::system("hi")).unwrap();
        assert_eq!(json, serde_json::json!({ "role": "system", "content": "hi" }));
    }

    #[test]
    fn test_role_name_matches_serialized_role() {
        for role in [Role::System, Role::User, Role::Assistant] {
            assert_eq!(serde_json::to_value(role).unwrap(), role.as_str());
        }
    }

    #[test]
    fn test_qa_inputs_skip_instruction() {
        let messages = vec![
            Message::system("You are a financial chatbot."),
            Message::system("Prices rose 3% last year."),
            Message::user("What is inflation?"),
        ];
        let (question, context) = qa_inputs(&messages);
        assert_eq!(question, "What is inflation?");
        assert_eq!(context, "Prices rose 3% last year.");
    }

    #[test]
    fn test_parse_qa_answer_object() {
        let json = serde_json::json!({ "answer": "3%", "score": 0.9, "start": 10, "end": 12 });
        let answer = parse_qa_answer(&json).unwrap();
        assert_eq!(answer.answer, "3%");
        assert!((answer.score - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_parse_qa_answer_list_takes_first() {
        let json = serde_json::json!([
            { "answer": "3%", "score": 0.9 },
            { "answer": "4%", "score": 0.1 },
        ]);
        assert_eq!(parse_qa_answer(&json).unwrap().answer, "3%");
    }

    #[test]
    fn test_parse_qa_answer_empty_list() {
        assert!(parse_qa_answer(&serde_json::json!([])).is_err());
    }

    #[test]
    fn test_string_field_present() {
        let json = serde_json::json!({ "content": "Prices rose" });
        assert_eq!(string_field(&json, "content", "/detokenize").unwrap(), "Prices rose");
    }

    #[test]
    fn test_string_field_empty_string_is_valid() {
        let json = serde_json::json!({ "content": "" });
        assert_eq!(string_field(&json, "content", "/detokenize").unwrap(), "");
    }

    #[test]
    fn test_malformed_detokenize_is_an_error() {
        for json in [
            serde_json::json!({}),
            serde_json::json!({ "content": null }),
            serde_json::json!({ "content": [1, 2] }),
        ] {
            let err = string_field(&json, "content", "/detokenize").unwrap_err();
            assert!(err.to_string().contains("/detokenize"));
        }
    }

    #[test]
    fn test_malformed_response_maps_to_backend_error() {
        let err = string_field(&serde_json::json!({}), "content", "/detokenize").unwrap_err();
        assert!(matches!(ChatError::from(err), ChatError::Backend(_)));
    }
}
