use crate::state::{Context, PipelineConfig};

const PARAMS: &str =
    "`result_limit`, `token_budget`, `strict_fetch`, `max_new_tokens`, `temperature`, `top_k`, `top_p`";

/// Configure pipeline parameters (admin only)
#[poise::command(slash_command, guild_only)]
pub async fn config(
    ctx: Context<'_>,
    #[description = "result_limit | token_budget | strict_fetch | max_new_tokens | temperature | top_k | top_p"]
    param: Option<String>,
    #[description = "New value"] value: Option<String>,
) -> Result<(), anyhow::Error> {
    let user_id = ctx.author().id.get();
    if !ctx.data().is_admin(user_id) {
        ctx.say("This command is admin-only.").await?;
        return Ok(());
    }

    match (param.as_deref(), value) {
        (None, _) => {
            let config = ctx.data().pipeline_config.read().await;
            ctx.say(describe(&config)).await?;
        }
        (Some(key), Some(val)) => {
            let mut config = ctx.data().pipeline_config.write().await;
            let reply = match apply(&mut config, key, &val) {
                Ok(()) => format!("`{}` set to {}", key, val.trim()),
                Err(e) => e,
            };
            ctx.say(reply).await?;
        }
        (Some(_), None) => {
            ctx.say("Provide both `param` and `value`. Example: `/finchat config token_budget 4096`")
                .await?;
        }
    }

    Ok(())
}

fn describe(config: &PipelineConfig) -> String {
    format!(
        "**Pipeline Configuration:**\n\
         `result_limit`: {}\n\
         `token_budget`: {}\n\
         `strict_fetch`: {}\n\
         `max_new_tokens`: {}\n\
         `temperature`: {}\n\
         `top_k`: {}\n\
         `top_p`: {}",
        config.result_limit,
        config.token_budget,
        config.strict_fetch,
        config.sampling.max_new_tokens,
        config.sampling.temperature,
        config.sampling.top_k,
        config.sampling.top_p
    )
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, String> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| format!("Invalid value `{}` for `{}`", value, key))
}

/// Update one parameter. Errors are user-facing replies.
fn apply(config: &mut PipelineConfig, key: &str, value: &str) -> Result<(), String> {
    match key {
        "result_limit" => {
            let limit: usize = parse(key, value)?;
            if limit == 0 {
                return Err("`result_limit` must be at least 1".to_string());
            }
            config.result_limit = limit;
        }
        "token_budget" => config.token_budget = parse(key, value)?,
        "strict_fetch" => config.strict_fetch = parse(key, value)?,
        "max_new_tokens" => config.sampling.max_new_tokens = parse(key, value)?,
        "temperature" => config.sampling.temperature = parse(key, value)?,
        "top_k" => config.sampling.top_k = parse(key, value)?,
        "top_p" => config.sampling.top_p = parse(key, value)?,
        _ => return Err(format!("Unknown param `{}`. Valid: {}", key, PARAMS)),
    }
    Ok(())
}
