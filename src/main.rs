mod commands;
mod error;
mod llm;
mod news;
mod pipeline;
mod state;
#[cfg(test)]
mod test_support;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use poise::serenity_prelude as serenity;
use poise::{Framework, FrameworkOptions};
use tokio::sync::RwLock;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use llm::{LlmClient, ModelBackend, QaClient, Tokenizer};
use news::{NewsClient, NewsConfig};
use pipeline::ChatPipeline;
use state::{AppState, PipelineConfig};

const DEFAULT_TURN_DELIMITER: &str = "<|assistant|>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .init();

    // Load env
    let _ = dotenv::dotenv();
    let token = dotenv::var("DISCORD_TOKEN")
        .map_err(|_| anyhow::anyhow!("DISCORD_TOKEN required"))?;
    let guild_id: Option<serenity::GuildId> = dotenv::var("DISCORD_GUILD_ID")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(serenity::GuildId::new);

    // Init news scraping
    let news_config = NewsConfig::from_env()?;
    info!(
        search_base = %news_config.search_base,
        timeout_secs = news_config.fetch_timeout.as_secs(),
        "News source configured"
    );
    let news = NewsClient::from_config(&news_config)?;

    // Init model backend; the llama server always provides the tokenizer
    let llm_client = Arc::new(LlmClient::from_env()?);
    let tokenizer: Arc<dyn Tokenizer> = llm_client.clone();
    let backend: Arc<dyn ModelBackend> = match dotenv::var("MODEL_BACKEND").as_deref() {
        Ok("extractive") => {
            info!("Using extractive QA backend");
            Arc::new(QaClient::from_env()?)
        }
        _ => {
            info!("Using generative LLM backend");
            llm_client
        }
    };
    let turn_delimiter = dotenv::var("LLM_TURN_DELIMITER")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_TURN_DELIMITER.to_string());

    let pipeline = Arc::new(ChatPipeline::new(news, tokenizer, backend, turn_delimiter));

    // Parse admin user IDs from env
    let admin_ids: HashSet<u64> = dotenv::var("ADMIN_USER_IDS")
        .unwrap_or_default()
        .split(',')
        .filter_map(|s| s.trim().parse::<u64>().ok())
        .collect();
    if !admin_ids.is_empty() {
        info!(count = admin_ids.len(), "Admin users configured");
    }

    let pipeline_config = PipelineConfig::from_env();
    info!(
        result_limit = pipeline_config.result_limit,
        token_budget = pipeline_config.token_budget,
        strict_fetch = pipeline_config.strict_fetch,
        "Pipeline configured"
    );

    let app_state = AppState {
        pipeline,
        admin_ids,
        pipeline_config: Arc::new(RwLock::new(pipeline_config)),
        histories: Arc::new(RwLock::new(HashMap::new())),
    };

    let intents =
        serenity::GatewayIntents::GUILDS | serenity::GatewayIntents::GUILD_MESSAGES;

    let framework = Framework::builder()
        .options(FrameworkOptions {
            commands: vec![commands::finchat()],
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!("Bot connected as: {} ({})", ready.user.name, ready.user.id);

                let commands = &framework.options().commands;
                for cmd in commands {
                    info!("  /{} ({} subcommands)", cmd.name, cmd.subcommands.len());
                }

                if let Some(gid) = guild_id {
                    info!("Registering to guild {} (instant)", gid);
                    poise::builtins::register_in_guild(
                        ctx,
                        &framework.options().commands,
                        gid,
                    )
                    .await?;
                } else {
                    info!("Registering globally (up to 1 hour delay)");
                    poise::builtins::register_globally(
                        ctx,
                        &framework.options().commands,
                    )
                    .await?;
                }

                Ok(app_state)
            })
        })
        .build();

    info!("Starting Finchat Discord bot...");

    let mut client = serenity::ClientBuilder::new(&token, intents)
        .framework(framework)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create client: {}", e))?;

    if let Err(e) = client.start().await {
        error!("Client error: {}", e);
    }

    Ok(())
}
