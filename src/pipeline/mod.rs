pub mod budget;
pub mod prompts;
pub mod response;

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::ChatError;
use crate::llm::{GenerationRequest, Message, ModelBackend, Tokenizer};
use crate::news::sanitize::sanitize;
use crate::news::NewsClient;
use crate::state::PipelineConfig;

use response::extract_response;

/// The answer to one turn.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub answer: String,
    /// Links that contributed text, in search-rank order.
    pub sources: Vec<String>,
    pub context_tokens: usize,
}

/// Join article texts in retrieval order, skipping empty ones.
pub fn assemble<'a>(texts: impl IntoIterator<Item = &'a str>) -> String {
    texts
        .into_iter()
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Retrieval-augmented answering: search, scrape, budget, prompt, generate.
/// Built once at startup and shared across turns.
pub struct ChatPipeline {
    news: NewsClient,
    tokenizer: Arc<dyn Tokenizer>,
    backend: Arc<dyn ModelBackend>,
    turn_delimiter: String,
}

impl ChatPipeline {
    pub fn new(
        news: NewsClient,
        tokenizer: Arc<dyn Tokenizer>,
        backend: Arc<dyn ModelBackend>,
        turn_delimiter: impl Into<String>,
    ) -> Self {
        Self {
            news,
            tokenizer,
            backend,
            turn_delimiter: turn_delimiter.into(),
        }
    }

    pub async fn answer(
        &self,
        query: &str,
        config: &PipelineConfig,
    ) -> Result<ChatResponse, ChatError> {
        let sanitized = sanitize(query)?;
        let query = query.trim();
        info!(query, "answering");

        let results = self.news.retrieve(&sanitized, config.result_limit).await?;
        let articles = self.news.gather(&results, config.strict_fetch).await?;
        let context = assemble(articles.iter().map(|a| a.text.as_str()));

        let overhead = prompts::build(&config.system_prompt, "", query);
        let (context, messages, prompt) = self
            .fit_prompt(&context, query, &overhead, config)
            .await?;
        let context_tokens = self.tokenizer.count_tokens(&context).await?;
        debug!(
            prompt_len = prompt.len(),
            context_tokens,
            roles = ?messages.iter().map(|m| m.role.as_str()).collect::<Vec<_>>(),
            "prompt built"
        );

        let output = self
            .backend
            .generate(&GenerationRequest {
                prompt,
                messages,
                sampling: config.sampling.clone(),
            })
            .await?;
        let answer = extract_response(&output, &self.turn_delimiter);

        let sources: Vec<String> = articles
            .into_iter()
            .filter(|a| !a.text.is_empty())
            .map(|a| a.link)
            .collect();

        info!(
            answer_len = answer.len(),
            sources = sources.len(),
            context_tokens,
            "turn complete"
        );
        Ok(ChatResponse {
            answer,
            sources,
            context_tokens,
        })
    }

    /// Reduce the context and render the prompt, then count the rendered
    /// prompt itself. Special tokens the template adds, or tokens merging
    /// across message boundaries, can push it past the budget; shrink the
    /// context budget by the overshoot until the whole prompt fits.
    async fn fit_prompt(
        &self,
        context: &str,
        query: &str,
        overhead: &[Message],
        config: &PipelineConfig,
    ) -> Result<(String, Vec<Message>, String), ChatError> {
        let mut budget = config.token_budget;
        loop {
            let reduced =
                budget::reduce(context, self.tokenizer.as_ref(), budget, overhead).await?;
            let messages = prompts::build(&config.system_prompt, &reduced, query);
            let prompt = self.tokenizer.apply_chat_template(&messages).await?;
            let prompt_tokens = self.tokenizer.count_tokens(&prompt).await?;
            if prompt_tokens <= config.token_budget {
                return Ok((reduced, messages, prompt));
            }

            let overshoot = prompt_tokens - config.token_budget;
            debug!(prompt_tokens, overshoot, "rendered prompt over budget, shrinking context");
            budget = budget.saturating_sub(overshoot);
        }
    }
}
