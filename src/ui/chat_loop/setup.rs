//! Builds a chat screen wired to the real platform: the network assistant,
//! on-disk history, tokio timers, the system synthesizer and clipboard.

use std::error::Error;
use std::io::{self, Stdout};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use super::screen::{ChatScreen, ChatScreenParts, ReplyEnvelope};
use crate::core::assistant::HttpAssistant;
use crate::core::chat_history::{ChatHistory, ChatId, JsonChatHistory};
use crate::core::chat_ui::{ChatPlatform, ChatUi, ChatUiSettings};
use crate::core::config::{Config, SpeechConfig};
use crate::core::constants::API_KEY_ENV;
use crate::core::scheduler::{TimerId, TokioScheduler};
use crate::core::speech::{SpeechEngine, SpeechEvent};
use crate::ui::transcript::TranscriptPrinter;
use crate::ui::viewport::TerminalViewport;
use crate::utils::clipboard::SystemClipboard;
use crate::utils::speech_command::{CommandSpeechEngine, NoSpeech};

#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    /// Continue a saved conversation instead of starting a new one.
    pub chat: Option<ChatId>,
    /// Read every reply aloud.
    pub speak: bool,
}

pub(super) struct Bootstrapped {
    pub screen: ChatScreen<Stdout>,
    pub ticks: mpsc::UnboundedReceiver<TimerId>,
    /// `None` when speech is disabled or unavailable.
    pub speech_events: Option<mpsc::UnboundedReceiver<SpeechEvent>>,
    pub replies: mpsc::UnboundedReceiver<ReplyEnvelope>,
}

/// Picks the speech engine. Missing synthesizers are not fatal: speech
/// requests are then refused and reported in the transcript.
pub fn build_speech(
    config: &SpeechConfig,
) -> (
    Box<dyn SpeechEngine>,
    Option<mpsc::UnboundedReceiver<SpeechEvent>>,
) {
    if !config.enabled {
        return (Box::new(NoSpeech::new("speech is turned off")), None);
    }
    match CommandSpeechEngine::detect(config) {
        Ok((engine, events)) => {
            info!(program = engine.program(), "speech enabled");
            (Box::new(engine), Some(events))
        }
        Err(err) => {
            warn!("{err}");
            (Box::new(NoSpeech::new(err.to_string())), None)
        }
    }
}

pub(super) async fn bootstrap(
    config: &Config,
    options: ChatOptions,
) -> Result<Bootstrapped, Box<dyn Error>> {
    let assistant = HttpAssistant::from_env(&config.assistant)?;
    if std::env::var_os(API_KEY_ENV).is_none() {
        warn!("{API_KEY_ENV} is not set; requests are sent without credentials");
    }
    let history: Arc<dyn ChatHistory> = Arc::new(JsonChatHistory::from_default_location()?);

    let (scheduler, ticks) = TokioScheduler::new();
    let (speech, speech_events) = build_speech(&config.speech);
    let viewport = TerminalViewport::new();
    let printer = TranscriptPrinter::new(io::stdout()).with_viewport(viewport.clone());

    let ui = ChatUi::new(
        ChatUiSettings::from(config),
        ChatPlatform {
            scheduler: Box::new(scheduler),
            speech,
            viewport: Box::new(viewport),
            clipboard: Box::new(SystemClipboard),
        },
    );

    let (reply_tx, replies) = mpsc::unbounded_channel();
    let mut screen = ChatScreen::new(ChatScreenParts {
        ui,
        printer,
        assistant: Arc::new(assistant),
        history: Arc::clone(&history),
        replies: reply_tx,
        auto_speak: options.speak,
    });

    if let Some(id) = options.chat {
        let session = history.get_chat(&id).await?;
        screen.resume(session)?;
    }

    Ok(Bootstrapped {
        screen,
        ticks,
        speech_events,
        replies,
    })
}
