//! Offline doubles for the page source and the model backend.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::error::FetchError;
use crate::llm::{GenerationRequest, Message, ModelBackend, TokenId, Tokenizer};
use crate::news::PageSource;
use crate::pipeline::response::ModelOutput;

/// In-memory pages keyed by exact URL, each with an optional delay.
#[derive(Default)]
pub struct StaticPages {
    pages: HashMap<String, (Duration, Result<String, FetchError>)>,
}

impl StaticPages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, url: &str, html: &str) -> Self {
        self.delayed(url, Duration::ZERO, Ok(html.to_string()))
    }

    pub fn fail(self, url: &str, err: FetchError) -> Self {
        self.delayed(url, Duration::ZERO, Err(err))
    }

    pub fn delayed(mut self, url: &str, delay: Duration, outcome: Result<String, FetchError>) -> Self {
        self.pages.insert(url.to_string(), (delay, outcome));
        self
    }
}

#[async_trait]
impl PageSource for StaticPages {
    async fn get(&self, url: &str) -> Result<String, FetchError> {
        let Some((delay, outcome)) = self.pages.get(url) else {
            return Err(FetchError::Network(format!("no route to {}", url)));
        };
        if !delay.is_zero() {
            tokio::time::sleep(*delay).await;
        }
        outcome.clone()
    }
}

/// Search results page with one article headline per link.
pub fn headline_page(links: &[&str]) -> String {
    let headlines: String = links
        .iter()
        .enumerate()
        .map(|(i, link)| {
            format!(
                r#"<div class="element"><h3 class="article__headline"><a href="{}">Story {}</a></h3></div>"#,
                link,
                i + 1
            )
        })
        .collect();
    format!("<html><body>{}</body></html>", headlines)
}

/// One token per whitespace-separated word; ids are assigned on first sight.
/// The chat template mimics the Zephyr style: `<|role|>\ncontent</s>\n`.
#[derive(Default)]
pub struct WordTokenizer {
    vocab: Mutex<(Vec<String>, HashMap<String, TokenId>)>,
}

impl WordTokenizer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Tokenizer for WordTokenizer {
    async fn encode(&self, text: &str) -> Result<Vec<TokenId>> {
        let mut vocab = self.vocab.lock().unwrap();
        let mut tokens = Vec::new();
        for word in text.split_whitespace() {
            let id = match vocab.1.get(word) {
                Some(id) => *id,
                None => {
                    let id = vocab.0.len() as TokenId;
                    vocab.0.push(word.to_string());
                    vocab.1.insert(word.to_string(), id);
                    id
                }
            };
            tokens.push(id);
        }
        Ok(tokens)
    }

    async fn decode(&self, tokens: &[TokenId]) -> Result<String> {
        let vocab = self.vocab.lock().unwrap();
        Ok(tokens
            .iter()
            .filter_map(|t| vocab.0.get(*t as usize).cloned())
            .collect::<Vec<_>>()
            .join(" "))
    }

    async fn apply_chat_template(&self, messages: &[Message]) -> Result<String> {
        let mut prompt = String::new();
        for m in messages {
            prompt.push_str(&format!("<|{}|>\n{}</s>\n", m.role.as_str(), m.content));
        }
        prompt.push_str("<|assistant|>\n");
        Ok(prompt)
    }
}

/// Backend that always answers with the same output and remembers the request.
pub struct ScriptedBackend {
    output: ModelOutput,
    pub last_request: Mutex<Option<GenerationRequest>>,
}

impl ScriptedBackend {
    pub fn new(output: ModelOutput) -> Self {
        Self {
            output,
            last_request: Mutex::new(None),
        }
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<ModelOutput> {
        *self.last_request.lock().unwrap() = Some(request.clone());
        Ok(self.output.clone())
    }
}
