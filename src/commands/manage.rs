use crate::llm::Role;
use crate::state::{ChatHistory, Context, HistoryEntry};

use super::send_chunked;

/// Show this channel's recent conversation
#[poise::command(slash_command, guild_only)]
pub async fn history(
    ctx: Context<'_>,
    #[description = "Max messages to show"] limit: Option<u32>,
) -> Result<(), anyhow::Error> {
    let limit = limit.unwrap_or(10) as usize;
    let channel_id = ctx.channel_id().get();

    let output = {
        let histories = ctx.data().histories.read().await;
        match histories.get(&channel_id) {
            Some(history) => render_history(history, limit),
            None => render_history(&ChatHistory::default(), limit),
        }
    };

    send_chunked(&ctx, &output).await
}

/// Clear this channel's conversation
#[poise::command(slash_command, guild_only)]
pub async fn clear(ctx: Context<'_>) -> Result<(), anyhow::Error> {
    let channel_id = ctx.channel_id().get();
    ctx.data().histories.write().await.remove(&channel_id);
    ctx.say("Session cleared.").await?;
    Ok(())
}

fn is_visible(entry: &HistoryEntry) -> bool {
    entry.message.role != Role::System
}

fn render_history(history: &ChatHistory, limit: usize) -> String {
    let total = history.entries().iter().filter(|e| is_visible(e)).count();
    let shown: Vec<_> = history
        .recent(limit)
        .iter()
        .filter(|e| is_visible(e))
        .collect();

    let mut output = format!(
        "**Recent conversation** (showing {} of {})\n\n",
        shown.len(),
        total
    );
    for entry in shown {
        let who = match entry.message.role {
            Role::User => "You",
            _ => "Finchat",
        };
        output.push_str(&format!(
            "`{}` **{}:** {}\n",
            entry.at.format("%H:%M"),
            who,
            entry.message.content
        ));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Message;

    #[test]
    fn test_render_history_labels_roles() {
        let mut history = ChatHistory::default();
        history.push(Message::system("hidden instruction"));
        history.push(Message::user("What is inflation?"));
        history.push(Message::assistant("The rate is 3%."));

        let out = render_history(&history, 10);
        assert!(out.contains("**You:** What is inflation?"));
        assert!(out.contains("**Finchat:** The rate is 3%."));
        assert!(!out.contains("hidden instruction"));
    }

    #[test]
    fn test_render_history_respects_limit() {
        let mut history = ChatHistory::default();
        history.push(Message::user("first"));
        history.push(Message::user("second"));

        let out = render_history(&history, 1);
        assert!(out.contains("second"));
        assert!(!out.contains("first"));
    }

    #[test]
    fn test_render_history_counts_whole_conversation() {
        let mut history = ChatHistory::default();
        history.push(Message::system("hidden instruction"));
        history.push(Message::user("first"));
        history.push(Message::assistant("one"));
        history.push(Message::user("second"));

        let total = history
            .entries()
            .iter()
            .filter(|e| e.message.role != Role::System)
            .count();
        let out = render_history(&history, 2);
        assert!(out.starts_with(&format!("**Recent conversation** (showing 2 of {})", total)));
        assert!(!out.contains("first"));
    }
}
