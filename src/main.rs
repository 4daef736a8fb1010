use anyhow::{Context, Result};
use clap::Parser;
use histvault::cli::commands::RoleArg;
use histvault::cli::{Cli, Commands};
use histvault::{storage, utils, ChatMessageHistory, Message, SessionHistory, Settings};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::new().context("Failed to load settings")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level)),
        )
        .init();

    let cli = Cli::parse();

    let client = storage::connect(&settings.storage).await?;
    let mut history = SessionHistory::new(
        client,
        settings.storage.database_id.clone(),
        settings.storage.container_id.clone(),
        cli.session.clone(),
        cli.user.clone(),
    )?;

    let result = match cli.command {
        Commands::Show => handle_show(&mut history).await,
        Commands::Add { role, text } => handle_add(&mut history, role, text).await,
        Commands::Clear => handle_clear(&mut history).await,
        Commands::Replace { file } => handle_replace(&mut history, file).await,
    };

    if let Err(e) = result {
        utils::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
    Ok(())
}

async fn handle_show(history: &mut SessionHistory) -> Result<()> {
    let messages = history.messages().await?;

    utils::print_session_header(history.user_id(), history.session_id(), messages.len());

    if messages.is_empty() {
        utils::print_info("no messages");
        return Ok(());
    }

    for (i, message) in messages.iter().enumerate() {
        utils::print_message(i, message);
    }
    Ok(())
}

async fn handle_add(history: &mut SessionHistory, role: RoleArg, text: String) -> Result<()> {
    // Pick up whatever is stored before appending to it.
    history.messages().await?;

    let message = match role {
        RoleArg::Human => Message::human(text),
        RoleArg::Ai => Message::ai(text),
        RoleArg::System => Message::system(text),
    };
    history.add_message(message).await?;

    utils::print_success(&format!(
        "session now has {} messages",
        history.message_count()
    ));
    Ok(())
}

async fn handle_clear(history: &mut SessionHistory) -> Result<()> {
    history.clear().await?;
    utils::print_success("session history cleared");
    Ok(())
}

async fn handle_replace(history: &mut SessionHistory, file: String) -> Result<()> {
    let json = tokio::fs::read_to_string(&file)
        .await
        .context(format!("Failed to read messages file: {}", file))?;
    let messages: Vec<Message> =
        serde_json::from_str(&json).context("Failed to parse messages file")?;

    let count = messages.len();
    history.set_messages(messages).await?;

    utils::print_success(&format!("replaced history with {} messages", count));
    Ok(())
}
