mod ask;
mod config;
mod manage;

use crate::state::Context;

/// Finchat - market news assistant
#[poise::command(
    slash_command,
    subcommands("ask::ask", "manage::history", "manage::clear", "config::config")
)]
pub async fn finchat(_ctx: Context<'_>) -> Result<(), anyhow::Error> {
    Ok(())
}

/// Discord rejects messages over 2000 chars.
const CHUNK_LIMIT: usize = 1990;

/// Split text into Discord-sized chunks, preferring newline then space breaks.
fn split_chunks(text: &str, limit: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut remaining = text;
    while !remaining.is_empty() {
        let mut chunk_len = remaining.len().min(limit);
        while !remaining.is_char_boundary(chunk_len) {
            chunk_len -= 1;
        }
        if chunk_len == 0 {
            chunk_len = remaining.chars().next().map_or(remaining.len(), char::len_utf8);
        }
        let split_at = if chunk_len < remaining.len() {
            remaining[..chunk_len]
                .rfind('\n')
                .or_else(|| remaining[..chunk_len].rfind(' '))
                .map(|i| i + 1)
                .unwrap_or(chunk_len)
        } else {
            chunk_len
        };
        chunks.push(&remaining[..split_at]);
        remaining = &remaining[split_at..];
    }
    chunks
}

/// Send a message in Discord-safe chunks. Uses ctx.say() for all chunks so
/// follow-ups go through the interaction webhook.
async fn send_chunked(ctx: &Context<'_>, text: &str) -> Result<(), anyhow::Error> {
    for chunk in split_chunks(text, CHUNK_LIMIT) {
        ctx.say(chunk).await?;
    }
    Ok(())
}
