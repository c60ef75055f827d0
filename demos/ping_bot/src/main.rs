//! Ping Bot Example
//!
//! A small rboot bot showing rules, captures, the memorizer and lifecycle
//! events.
//!
//! # Commands
//!
//! ```text
//! ping                    - pong
//! echo <text>             - repeats <text>
//! remember <key> <value>  - stores a value
//! recall <key>            - reads a stored value
//! forget <key>            - deletes a stored value
//! divide <a> <b>          - integer division (fails on zero)
//! help                    - this list
//! ```
//!
//! # Usage
//!
//! ```bash
//! cargo run --package ping-bot -- --config demos/ping_bot/rboot.toml
//! RBOOT_ADAPTER=bearychat RBOOT_ADAPTERS__BEARYCHAT__WEBHOOK=<token> cargo run --package ping-bot
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use rboot::prelude::*;
use tracing::info;

#[derive(Debug, Parser)]
#[command(version, about = "A small demonstration bot for rboot")]
struct Args {
    /// Configuration file to load in addition to the default search paths.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile (dev, prod, or a custom name).
    #[arg(short, long)]
    profile: Option<String>,
}

// ============================================================================
// Script Actions
// ============================================================================

async fn ping(_ctx: ScriptContext) -> ScriptResult<Vec<Message>> {
    Ok(vec![Message::new("pong")])
}

async fn echo(ctx: ScriptContext) -> ScriptResult<Vec<Message>> {
    let text = ctx.capture(1).unwrap_or_default();
    Ok(vec![Message::new(text)])
}

/// Values are namespaced per user.
fn memo_key(ctx: &ScriptContext, key: &str) -> String {
    format!("{}:{}", ctx.sender().id, key)
}

async fn remember(ctx: ScriptContext) -> ScriptResult<Vec<Message>> {
    let (Some(key), Some(value)) = (ctx.capture(1), ctx.capture(2)) else {
        return Err(ScriptError::failed("usage: remember <key> <value>"));
    };

    ctx.memorizer()
        .save(&memo_key(&ctx, key), value.as_bytes().to_vec())
        .await?;
    Ok(vec![Message::new(format!("ok, remembered {key}"))])
}

async fn recall(ctx: ScriptContext) -> ScriptResult<Vec<Message>> {
    let key = ctx.capture(1).unwrap_or_default();
    let reply = match ctx.memorizer().read(&memo_key(&ctx, key)).await? {
        Some(value) => String::from_utf8_lossy(&value).into_owned(),
        None => format!("I don't know anything about {key}"),
    };
    Ok(vec![Message::new(reply)])
}

async fn forget(ctx: ScriptContext) -> ScriptResult<Vec<Message>> {
    let key = ctx.capture(1).unwrap_or_default();
    ctx.memorizer().delete(&memo_key(&ctx, key)).await?;
    Ok(vec![Message::new(format!("forgot {key}"))])
}

async fn divide(ctx: ScriptContext) -> ScriptResult<Vec<Message>> {
    let parse = |index| {
        ctx.capture(index)
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| ScriptError::failed("expected two integers"))
    };
    let (a, b) = (parse(1)?, parse(2)?);

    let quotient = a
        .checked_div(b)
        .ok_or_else(|| ScriptError::failed(format!("cannot divide {a} by {b}")))?;
    Ok(vec![Message::new(quotient.to_string())])
}

fn scripts() -> Vec<Script> {
    vec![
        Script::new("ping", ping)
            .description("replies pong")
            .rule_with("ping", ExactRule::new("ping")),
        Script::new("echo", echo)
            .description("echo <text>, repeats <text>")
            .rule("echo", r"^echo\s+(.+)$"),
        Script::new("remember", remember)
            .description("remember <key> <value>, stores a value")
            .rule("remember", r"^remember\s+(\S+)\s+(.+)$"),
        Script::new("recall", recall)
            .description("recall <key>, reads a stored value")
            .rule("recall", r"^recall\s+(\S+)$")
            .rule("what-is", r"^what is ([^\s?]+)\??$"),
        Script::new("forget", forget)
            .description("forget <key>, deletes a stored value")
            .rule("forget", r"^forget\s+(\S+)$"),
        Script::new("divide", divide)
            .description("divide <a> <b>, integer division")
            .rule("divide", r"^divide\s+(-?\d+)\s+(-?\d+)$"),
    ]
}

/// Replies with `text`, rendered from the registry before start.
fn help_script(text: String) -> Script {
    let text: Arc<str> = format!("{text}\nhelp: this list").into();

    Script::new("help", move |_ctx: ScriptContext| {
        let text = text.clone();
        async move { Ok::<_, ScriptError>(vec![Message::new(text.as_ref())]) }
    })
    .rule_with("help", ExactRule::new("help"))
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = Rboot::builder();
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }
    if let Some(profile) = args.profile {
        builder = builder.profile(profile);
    }
    let mut bot = builder.build()?;
    rboot::register_builtin_adapters(&mut bot);

    bot.register_scripts(scripts())?;
    let help = bot.help();
    bot.register_script(help_script(help))?;

    bot.subscribe(STARTED_EVENT, |event: Event, _ctx: EventContext| async move {
        info!(
            adapter = %event.payload["adapter"],
            scripts = %event.payload["scripts"],
            "Ping bot ready"
        );
        Ok::<_, ScriptError>(())
    });

    let stats = bot.run().await?;
    info!(
        received = stats.received,
        replied = stats.replied,
        "Ping bot stopped"
    );

    Ok(())
}
