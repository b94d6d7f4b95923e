use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::error::ChatError;
use crate::llm::{Message, Tokenizer};

/// Complete chat-template markers such as `<|assistant|>`, `<s>`, `</s>`.
fn marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"<\|[A-Za-z0-9_]*\|>|</?s>").expect("marker regex must compile")
    })
}

/// A marker cut off by truncation, e.g. a trailing `<|assi` or `</`.
/// A bare `<` never counts: `inflation <3` is content.
fn partial_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"<(?:\|[A-Za-z0-9_|]*|/[A-Za-z0-9_]*)$")
            .expect("partial marker regex must compile")
    })
}

/// Remove template markup from decoded context text. Trailing decoding
/// debris (a cut-off marker, U+FFFD) is only removed when `truncated`.
pub fn strip_template_artifacts(text: &str, truncated: bool) -> String {
    let mut text = marker_re().replace_all(text, " ").into_owned();
    if truncated {
        let trimmed = text.trim_end_matches(|c: char| c == '\u{FFFD}' || c.is_whitespace());
        text = partial_marker_re().replace(trimmed, "").into_owned();
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cut `context` so that it fits in whatever `total_budget` leaves after the
/// templated `overhead` messages. The earliest tokens are kept.
pub async fn reduce(
    context: &str,
    tokenizer: &dyn Tokenizer,
    total_budget: usize,
    overhead: &[Message],
) -> Result<String, ChatError> {
    let template = tokenizer.apply_chat_template(overhead).await?;
    let used = tokenizer.count_tokens(&template).await?;
    if used >= total_budget {
        return Err(ChatError::BudgetExhausted {
            used,
            budget: total_budget,
        });
    }
    let remaining = total_budget - used;

    let tokens = tokenizer.encode(context).await?;
    let mut keep = tokens.len().min(remaining);

    // Decoded text can re-encode to more tokens than it came from; shrink until it fits.
    loop {
        let decoded = tokenizer.decode(&tokens[..keep]).await?;
        let text = strip_template_artifacts(&decoded, keep < tokens.len());
        let count = tokenizer.count_tokens(&text).await?;
        if count <= remaining {
            debug!(
                used,
                remaining,
                context_tokens = tokens.len(),
                kept_tokens = count,
                "context reduced"
            );
            return Ok(text);
        }
        if keep == 0 {
            return Ok(String::new());
        }
        keep = keep.saturating_sub((count - remaining).max(1));
    }
}
