use thiserror::Error;

/// Shown when the query is empty or unusable after sanitization.
pub const REPHRASE_MESSAGE: &str =
    "I'm sorry, I had trouble understanding your query. Could you please try again?";

/// Shown for failures outside the user's control (search down, backend down).
pub const APOLOGY_MESSAGE: &str =
    "I'm sorry, I couldn't gather the news I needed to answer that right now. Please try again in a moment.";

/// Shown when the configured token budget cannot even fit the prompt scaffolding.
pub const INTERNAL_ERROR_MESSAGE: &str =
    "Something is wrong with my configuration and I can't answer questions right now. An operator has been notified.";

/// Why a single article could not be fetched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("network error: {0}")]
    Network(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = e.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

/// Failure kinds of a single chat turn.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Query was empty after trimming and punctuation removal.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The search page itself could not be loaded. Fatal for the turn.
    #[error("search unavailable: {0}")]
    SearchUnavailable(String),

    /// An article failed while fetching in strict mode.
    #[error("article fetch failed for {url}: {source}")]
    ArticleFetch {
        url: String,
        #[source]
        source: FetchError,
    },

    /// Prompt overhead alone uses the whole token budget.
    #[error("token budget exhausted: overhead {used} >= budget {budget}")]
    BudgetExhausted { used: usize, budget: usize },

    /// Model output did not have the expected shape.
    #[error("could not post-process response: {0}")]
    ResponsePostprocess(String),

    /// Tokenizer or generation call failed.
    #[error("model backend error: {0}")]
    Backend(String),
}

impl ChatError {
    pub fn invalid_query(msg: impl Into<String>) -> Self {
        Self::InvalidQuery(msg.into())
    }

    pub fn search_unavailable(msg: impl Into<String>) -> Self {
        Self::SearchUnavailable(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// The text shown to the end user. Causes are logged, never shown.
    pub fn user_message(&self) -> &'static str {
        match self {
            ChatError::InvalidQuery(_) => REPHRASE_MESSAGE,
            ChatError::BudgetExhausted { .. } => INTERNAL_ERROR_MESSAGE,
            ChatError::SearchUnavailable(_)
            | ChatError::ArticleFetch { .. }
            | ChatError::ResponsePostprocess(_)
            | ChatError::Backend(_) => APOLOGY_MESSAGE,
        }
    }
}

impl From<anyhow::Error> for ChatError {
    fn from(e: anyhow::Error) -> Self {
        ChatError::backend(format!("{:#}", e))
    }
}
