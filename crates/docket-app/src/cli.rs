//! CLI argument definitions for the docket binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use docket_core::types::UserContext;

/// Docket: a legal-ticketing assistant that turns chat into actions.
#[derive(Parser, Debug)]
#[command(name = "docket", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Data directory for the SQLite database.
    #[arg(short = 'd', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Chat interactively on stdin (the default).
    Chat(ChatArgs),
    /// Create a team that categories can be assigned to.
    AddTeam {
        /// Organization the team belongs to.
        #[arg(long = "org-id", default_value = "org-local")]
        org_id: String,
        /// Team name.
        name: String,
    },
    /// Write the effective configuration to the config file path.
    InitConfig,
}

/// Identity and conversation of an interactive chat.
#[derive(clap::Args, Debug, Clone)]
pub struct ChatArgs {
    /// Conversation id; a fresh one is generated when omitted.
    #[arg(long = "conversation")]
    pub conversation: Option<String>,

    #[arg(long = "user-id", default_value = "user-local")]
    pub user_id: String,

    #[arg(long = "org-id", default_value = "org-local")]
    pub org_id: String,

    #[arg(long = "email", default_value = "")]
    pub email: String,

    #[arg(long = "name", default_value = "")]
    pub name: String,

    /// Role checked against each action's allowed roles.
    #[arg(long = "role", default_value = "member")]
    pub role: String,
}

impl Default for ChatArgs {
    fn default() -> Self {
        Self {
            conversation: None,
            user_id: "user-local".to_string(),
            org_id: "org-local".to_string(),
            email: String::new(),
            name: String::new(),
            role: "member".to_string(),
        }
    }
}

impl ChatArgs {
    pub fn user_context(&self) -> UserContext {
        UserContext {
            user_id: self.user_id.clone(),
            organization_id: self.org_id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role.clone(),
        }
    }
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > DOCKET_CONFIG env var > ~/.docket/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("DOCKET_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the data directory path.
    ///
    /// Returns `None` if not overridden (use config value).
    pub fn resolve_data_dir(&self) -> Option<String> {
        self.data_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }

    /// Resolve the log level.
    ///
    /// Returns `None` if not overridden.
    pub fn resolve_log_level(&self) -> Option<String> {
        self.log_level.clone()
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".docket").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".docket").join("config.toml");
    }
    PathBuf::from("config.toml")
}
