//! Command-line interface parsing and handling
//!
//! This module parses command-line arguments and runs the selected command.
//! Without a subcommand an interactive chat starts.

pub mod history;
pub mod settings;
pub mod speech;


use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::cli::history::{delete_chat, list_chats, show_chat};
use crate::cli::settings::{apply_setting, reset_setting};
use crate::cli::speech::{list_voices, speak_text};
use crate::core::chat_history::{ChatId, JsonChatHistory};
use crate::core::config::data::path_display;
use crate::core::config::Config;
use crate::ui::chat_loop::{run_chat, ChatOptions};
use crate::utils::logging::init_tracing;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("VERGEN_GIT_DESCRIBE"),
    " ",
    env!("VERGEN_GIT_SHA"),
    ")\nbuilt ",
    env!("VERGEN_BUILD_TIMESTAMP"),
    " for ",
    env!("VERGEN_CARGO_TARGET_TRIPLE"),
);

#[derive(Parser)]
#[command(name = "mediscan-chat")]
#[command(version, long_version = LONG_VERSION)]
#[command(about = "Ask the MediScan assistant about medications from the terminal")]
#[command(
    long_about = "MediScan chat sends your questions to an OpenAI-compatible assistant and \
types the answers out as they arrive. Replies can be read aloud and copied, and every \
conversation is saved so it can be resumed later.\n\n\
Environment Variables:\n\
  MEDISCAN_API_KEY  API key for the assistant endpoint\n\
  MEDISCAN_LOG      Log filter, e.g. debug or mediscan_chat=trace (default: warn)\n\n\
Chat commands:\n\
  /stop             Stop the reply and any speech\n\
  /speak            Read the latest reply aloud (again to stop)\n\
  /copy             Copy the latest reply\n\
  /image <url>      Ask about a photo of a medication\n\
  /help             List all commands\n\
  /quit             Save and leave"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Write diagnostics to this file instead of stderr
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Start an interactive chat (default)
    Chat {
        /// Resume a saved chat by id
        #[arg(short = 'c', long = "chat", value_name = "ID")]
        chat: Option<String>,
        /// Read every reply aloud
        #[arg(short = 's', long)]
        speak: bool,
    },
    /// Read text aloud with the configured voice
    Speak {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        text: Vec<String>,
    },
    /// List the voices of the speech synthesizer
    Voices,
    /// Inspect or remove saved chats
    History {
        #[command(subcommand)]
        action: HistoryCommand,
    },
    /// Show or change configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigCommand>,
    },
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum HistoryCommand {
    /// List saved chats, most recent first
    List,
    /// Print a saved chat
    Show { id: String },
    /// Delete a saved chat
    Delete { id: String },
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum ConfigCommand {
    /// Set a configuration value
    Set {
        key: String,
        /// Value to set (can be multiple words)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Vec<String>,
    },
    /// Restore a configuration value to its default
    Unset { key: String },
    /// Print the configuration file location
    Path,
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(args.log.as_deref())?;

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(async_main(args));
    // Stdin is read on a blocking thread that never returns on its own.
    runtime.shutdown_timeout(Duration::from_millis(250));
    result
}

async fn async_main(args: Args) -> Result<(), Box<dyn Error>> {
    let command = args.command.unwrap_or(Commands::Chat {
        chat: None,
        speak: false,
    });

    match command {
        Commands::Chat { chat, speak } => {
            let config = Config::load()?;
            let options = ChatOptions {
                chat: chat.map(ChatId::new),
                speak,
            };
            run_chat(config, options).await
        }
        Commands::Speak { text } => {
            let config = Config::load()?;
            speak_text(&config, text).await
        }
        Commands::Voices => {
            let config = Config::load()?;
            list_voices(&config)
        }
        Commands::History { action } => {
            let history = JsonChatHistory::from_default_location()?;
            match action {
                HistoryCommand::List => list_chats(&history).await,
                HistoryCommand::Show { id } => show_chat(&history, &id).await,
                HistoryCommand::Delete { id } => delete_chat(&history, &id).await,
            }
        }
        Commands::Config { action } => run_config(action),
    }
}

fn run_config(action: Option<ConfigCommand>) -> Result<(), Box<dyn Error>> {
    let mut config = Config::load()?;
    match action {
        None => {
            config.print_all();
            Ok(())
        }
        Some(ConfigCommand::Path) => {
            println!("{}", path_display(Config::get_config_path()?));
            Ok(())
        }
        Some(ConfigCommand::Set { key, value }) => {
            if let Err(err) = apply_setting(&mut config, &key, &value) {
                eprintln!("❌ {err}");
                std::process::exit(1);
            }
            config.save()?;
            println!("✅ Set {key} to: {}", value.join(" "));
            Ok(())
        }
        Some(ConfigCommand::Unset { key }) => {
            if let Err(err) = reset_setting(&mut config, &key) {
                eprintln!("❌ {err}");
                std::process::exit(1);
            }
            config.save()?;
            println!("✅ Unset {key} (back to default)");
            Ok(())
        }
    }
}
