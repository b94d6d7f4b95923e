use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::llm::{Message, SamplingParams};
use crate::pipeline::prompts::{GREETING, SYSTEM_PROMPT};
use crate::pipeline::ChatPipeline;

/// Per-turn pipeline parameters (admins can modify at runtime).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub result_limit: usize,
    pub token_budget: usize,
    pub strict_fetch: bool,
    pub sampling: SamplingParams,
    pub system_prompt: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            result_limit: 5,
            token_budget: 2048,
            strict_fetch: false,
            sampling: SamplingParams::default(),
            system_prompt: SYSTEM_PROMPT.to_string(),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    dotenv::var(key)
        .ok()
        .and_then(|s| s.trim().parse::<T>().ok())
        .unwrap_or(default)
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            result_limit: env_or("NEWS_RESULT_LIMIT", defaults.result_limit),
            token_budget: env_or("TOKEN_BUDGET", defaults.token_budget),
            strict_fetch: env_or("NEWS_FETCH_STRICT", defaults.strict_fetch),
            sampling: SamplingParams {
                temperature: env_or("LLM_TEMPERATURE", defaults.sampling.temperature),
                top_k: env_or("LLM_TOP_K", defaults.sampling.top_k),
                top_p: env_or("LLM_TOP_P", defaults.sampling.top_p),
                max_new_tokens: env_or("LLM_MAX_NEW_TOKENS", defaults.sampling.max_new_tokens),
            },
            system_prompt: defaults.system_prompt,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub message: Message,
    pub at: DateTime<Utc>,
}

/// Append-only transcript of one channel's session. Never persisted.
#[derive(Debug, Clone)]
pub struct ChatHistory {
    entries: Vec<HistoryEntry>,
}

impl Default for ChatHistory {
    fn default() -> Self {
        let mut history = Self {
            entries: Vec::new(),
        };
        history.push(Message::assistant(GREETING));
        history
    }
}

impl ChatHistory {
    pub fn push(&mut self, message: Message) {
        self.entries.push(HistoryEntry {
            message,
            at: Utc::now(),
        });
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// The last `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> &[HistoryEntry] {
        &self.entries[self.entries.len().saturating_sub(n)..]
    }
}

pub struct AppState {
    pub pipeline: Arc<ChatPipeline>,
    pub admin_ids: HashSet<u64>,
    pub pipeline_config: Arc<RwLock<PipelineConfig>>,
    pub histories: Arc<RwLock<HashMap<u64, ChatHistory>>>,
}

impl AppState {
    pub fn is_admin(&self, user_id: u64) -> bool {
        self.admin_ids.contains(&user_id)
    }

    pub async fn record(&self, channel_id: u64, message: Message) {
        let mut histories = self.histories.write().await;
        histories.entry(channel_id).or_default().push(message);
    }
}

pub type Context<'a> = poise::Context<'a, AppState, anyhow::Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;

    #[test]
    fn test_history_starts_with_greeting() {
        let history = ChatHistory::default();
        assert_eq!(history.entries().len(), 1);
        assert_eq!(history.entries()[0].message.role, Role::Assistant);
        assert_eq!(history.entries()[0].message.content, GREETING);
    }

    #[test]
    fn test_history_recent_keeps_order() {
        let mut history = ChatHistory::default();
        history.push(Message::user("q1"));
        history.push(Message::assistant("a1"));
        history.push(Message::user("q2"));

        let recent: Vec<&str> = history
            .recent(2)
            .iter()
            .map(|e| e.message.content.as_str())
            .collect();
        assert_eq!(recent, vec!["a1", "q2"]);
        assert_eq!(history.recent(100).len(), 4);
    }

    #[test]
    fn test_default_config_matches_documented_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.result_limit, 5);
        assert_eq!(config.token_budget, 2048);
        assert!(!config.strict_fetch);
        assert_eq!(config.sampling.max_new_tokens, 256);
    }
}
