//! Docket application binary - composition root.
//!
//! 1. Parse CLI args and load configuration from TOML
//! 2. Initialize tracing
//! 3. Open the SQLite database
//! 4. Wire the action registry, dialogue engine and language model
//! 5. Run the requested command (interactive chat by default)

mod cli;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};

use docket_action::{ActionRegistry, RepositoryCandidates, TracingNotifier};
use docket_chat::{
    ChatError, DialogueEngine, EngineParts, GeminiClient, GeneralResponder, IntentClassifier,
    OfflineResponder, PatternClassifier,
};
use docket_core::config::DocketConfig;
use docket_core::types::HistoryMessage;
use docket_storage::{merge_context, ContextRecord, Database, SqliteContextStore, TicketRepository};

use cli::{ChatArgs, CliArgs, Command};

/// Expand ~ to home directory in a path string.
fn resolve_data_dir(data_dir: &str) -> PathBuf {
    if data_dir.starts_with("~/") || data_dir.starts_with("~\\") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(&data_dir[2..])
    } else {
        PathBuf::from(data_dir)
    }
}

/// Pick the classifier and responder: Gemini with an API key, offline otherwise.
fn language_model(
    config: &DocketConfig,
) -> Result<(Arc<dyn IntentClassifier>, Arc<dyn GeneralResponder>), ChatError> {
    match config.llm.api_key() {
        Some(key) => {
            let client = Arc::new(GeminiClient::new(config.llm.clone(), key)?);
            tracing::info!(model = %config.llm.model, "Using hosted language model");
            let classifier: Arc<dyn IntentClassifier> = client.clone();
            let responder: Arc<dyn GeneralResponder> = client;
            Ok((classifier, responder))
        }
        None => {
            tracing::warn!(
                env = %config.llm.api_key_env,
                "No API key set, using offline classifier and responder"
            );
            let classifier: Arc<dyn IntentClassifier> = Arc::new(PatternClassifier::new()?);
            let responder: Arc<dyn GeneralResponder> = Arc::new(OfflineResponder);
            Ok((classifier, responder))
        }
    }
}

/// Interactive chat over stdin until EOF or `/exit`.
async fn run_chat(
    config: &DocketConfig,
    db: Arc<Database>,
    args: ChatArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(SqliteContextStore::new(Arc::clone(&db)));
    let repo = Arc::new(TicketRepository::new(db));

    let mut registry = ActionRegistry::new();
    registry.register_defaults(Arc::clone(&repo), Arc::new(TracingNotifier));
    tracing::info!(actions = ?registry.ids(), "Action registry ready");

    let (classifier, responder) = language_model(config)?;
    let engine = DialogueEngine::new(
        EngineParts {
            registry: Arc::new(registry),
            context_store: store.clone(),
            candidates: Arc::new(RepositoryCandidates::new(repo)),
            classifier,
            responder,
        },
        config.dialogue.clone(),
    );

    let user = args.user_context();
    let conversation_id = args
        .conversation
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    tracing::info!(conversation_id = %conversation_id, role = %user.role, "Chat started");

    println!("Docket chat ({}). Type /exit to leave.", conversation_id);

    let mut history: Vec<HistoryMessage> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim() == "/exit" {
            break;
        }

        let mut identity = ContextRecord::new();
        identity.insert("userId".to_string(), json!(user.user_id));
        identity.insert("organizationId".to_string(), json!(user.organization_id));
        identity.insert("userRole".to_string(), json!(user.role));
        let context = merge_context(store.as_ref(), &conversation_id, identity).await?;

        history.push(HistoryMessage::user(line.as_str()));
        match engine
            .handle_turn(&conversation_id, &line, &history, &context, &user)
            .await
        {
            Ok(turn) => {
                println!("\n{}\n", turn.response);
                if let Some(usage) = turn.usage {
                    println!(
                        "[tokens: {} in / {} out]\n",
                        usage.input_tokens, usage.output_tokens
                    );
                }
                history.push(HistoryMessage::assistant(turn.response));
            }
            Err(ChatError::MessageTooLong(max)) => {
                history.pop();
                println!("\nThat message is too long (max {} characters).\n", max);
            }
            Err(e) => {
                history.pop();
                tracing::error!(error = %e, "Turn failed");
                println!("\nSomething went wrong, please try again.\n");
            }
        }
    }

    tracing::info!(conversation_id = %conversation_id, "Chat ended");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = DocketConfig::load_or_default(&config_file);
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }
    if let Some(level) = args.resolve_log_level() {
        config.general.log_level = level;
    }

    // Tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Docket v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration resolved");

    if let Some(Command::InitConfig) = args.command {
        config.save(&config_file)?;
        println!("Wrote {}", config_file.display());
        return Ok(());
    }

    // Storage.
    let data_dir = resolve_data_dir(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }
    let db_path = data_dir.join(&config.storage.database_file);
    let db = Arc::new(Database::new(&db_path)?);
    tracing::info!(path = %db_path.display(), "SQLite database opened");

    match args.command {
        Some(Command::AddTeam { org_id, name }) => {
            let team = TicketRepository::new(db).create_team(&org_id, &name)?;
            println!("Created team {} ({})", team.name, team.id);
            Ok(())
        }
        Some(Command::Chat(chat)) => run_chat(&config, db, chat).await,
        Some(Command::InitConfig) | None => run_chat(&config, db, ChatArgs::default()).await,
    }
}
