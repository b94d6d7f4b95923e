use tracing::{error, info, warn};

use super::send_chunked;
use crate::error::ChatError;
use crate::llm::Message;
use crate::pipeline::ChatResponse;
use crate::state::Context;

/// Ask a financial question answered from recent market news
#[poise::command(slash_command, guild_only)]
pub async fn ask(
    ctx: Context<'_>,
    #[description = "Your question"] question: String,
) -> Result<(), anyhow::Error> {
    ctx.defer().await?;

    let channel_id = ctx.channel_id().get();
    ctx.data()
        .record(channel_id, Message::user(question.clone()))
        .await;

    let config = ctx.data().pipeline_config.read().await.clone();

    info!(user = ctx.author().name, question, "turn started");

    let reply = match ctx.data().pipeline.answer(&question, &config).await {
        Ok(response) => {
            ctx.data()
                .record(channel_id, Message::assistant(response.answer.clone()))
                .await;
            format_answer(&response)
        }
        Err(e) => {
            log_turn_error(&e);
            let message = e.user_message().to_string();
            ctx.data()
                .record(channel_id, Message::assistant(message.clone()))
                .await;
            message
        }
    };

    send_chunked(&ctx, &reply).await
}

fn log_turn_error(e: &ChatError) {
    match e {
        ChatError::InvalidQuery(_) => warn!(error = %e, "query rejected"),
        ChatError::BudgetExhausted { .. } => error!(error = %e, "token budget misconfigured"),
        _ => error!(error = %e, "turn failed"),
    }
}

/// Answer text followed by the article links it drew on.
fn format_answer(response: &ChatResponse) -> String {
    let mut full = if response.answer.is_empty() {
        "I wasn't able to put together an answer from the news I found.".to_string()
    } else {
        response.answer.clone()
    };

    if !response.sources.is_empty() {
        full.push_str("\n\n**Sources:**\n");
        for url in &response.sources {
            let label = url.rsplit('/').find(|s| !s.is_empty()).unwrap_or(url);
            full.push_str(&format!("- [{}](<{}>)\n", label, url));
        }
    }
    full
}
