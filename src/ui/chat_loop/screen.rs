//! The chat screen: transcript, prompt handling and the glue between user
//! input, assistant replies and [`ChatUi`].

use std::io::{self, Write};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::core::assistant::{AssistantClient, AssistantError};
use crate::core::cancellation::RequestId;
use crate::core::chat_history::{ChatHistory, ChatSession};
use crate::core::chat_ui::{ChatUi, TurnState};
use crate::core::message::{Message, MessageStore};
use crate::core::scheduler::TimerId;
use crate::core::speech::{SpeakOutcome, SpeechEvent};
use crate::core::typing::TickOutcome;
use crate::ui::commands::{help_text, parse_input, ChatCommand, InputLine};
use crate::ui::transcript::TranscriptPrinter;

pub type ReplyEnvelope = (RequestId, Result<Message, AssistantError>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct ChatScreenParts<W: Write> {
    pub ui: ChatUi,
    pub printer: TranscriptPrinter<W>,
    pub assistant: Arc<dyn AssistantClient>,
    pub history: Arc<dyn ChatHistory>,
    pub replies: mpsc::UnboundedSender<ReplyEnvelope>,
    /// Read every reply aloud as it arrives.
    pub auto_speak: bool,
}

pub struct ChatScreen<W: Write> {
    ui: ChatUi,
    store: MessageStore,
    printer: TranscriptPrinter<W>,
    assistant: Arc<dyn AssistantClient>,
    history: Arc<dyn ChatHistory>,
    replies: mpsc::UnboundedSender<ReplyEnvelope>,
    saved: Option<ChatSession>,
    auto_speak: bool,
}

impl<W: Write> ChatScreen<W> {
    pub fn new(parts: ChatScreenParts<W>) -> Self {
        let ChatScreenParts {
            ui,
            printer,
            assistant,
            history,
            replies,
            auto_speak,
        } = parts;
        Self {
            ui,
            store: MessageStore::new(),
            printer,
            assistant,
            history,
            replies,
            saved: None,
            auto_speak,
        }
    }

    pub fn ui(&self) -> &ChatUi {
        &self.ui
    }

    pub fn messages(&self) -> &MessageStore {
        &self.store
    }

    pub fn saved_session(&self) -> Option<&ChatSession> {
        self.saved.as_ref()
    }

    /// Shows a stored conversation and keeps appending to it.
    pub fn resume(&mut self, session: ChatSession) -> io::Result<()> {
        self.printer
            .notice(&format!("Resuming \"{}\" ({})", session.title, session.id))?;
        self.store = MessageStore::from_messages(session.messages.clone());
        for message in self.store.iter() {
            self.printer.print_message(message)?;
        }
        self.ui.on_message_count_changed(self.store.len());
        self.saved = Some(session);
        Ok(())
    }

    pub async fn handle_input(&mut self, line: &str) -> io::Result<Flow> {
        match parse_input(line) {
            InputLine::Empty => {}
            InputLine::Message(text) => self.submit(Message::user(text)).await?,
            InputLine::Usage(usage) => self.printer.notice(&format!("Usage: {usage}"))?,
            InputLine::Command(command) => return self.run_command(command).await,
        }
        Ok(Flow::Continue)
    }

    async fn run_command(&mut self, command: ChatCommand) -> io::Result<Flow> {
        match command {
            ChatCommand::Stop => self.stop()?,
            ChatCommand::Speak => self.toggle_speech()?,
            ChatCommand::Copy => self.copy_last_reply()?,
            ChatCommand::Bottom => {
                self.ui.scroll_to_bottom();
                self.ui.on_scroll();
            }
            ChatCommand::Sidebar => self.toggle_sidebar().await?,
            ChatCommand::Share => self.share()?,
            ChatCommand::Image { url, text } => {
                self.submit(Message::user_with_image(text, url)).await?
            }
            ChatCommand::Help => {
                let help = help_text();
                for line in help.lines() {
                    self.printer.notice(line)?;
                }
            }
            ChatCommand::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    async fn submit(&mut self, message: Message) -> io::Result<()> {
        if self.ui.is_processing() {
            return self
                .printer
                .notice("Still replying. Type /stop to interrupt.");
        }

        let key = self.store.push(message);
        if let Some(stored) = self.store.get(key) {
            self.printer.print_message(stored)?;
        }
        self.ui.on_message_count_changed(self.store.len());
        self.persist().await;

        let (token, id) = self.ui.begin_request();
        let messages = self.store.as_slice().to_vec();
        let assistant = Arc::clone(&self.assistant);
        let replies = self.replies.clone();
        debug!(%id, "assistant request sent");
        tokio::spawn(async move {
            let result = assistant.reply(&messages, token).await;
            let _ = replies.send((id, result));
        });
        Ok(())
    }

    pub async fn handle_reply(
        &mut self,
        id: RequestId,
        result: Result<Message, AssistantError>,
    ) -> io::Result<()> {
        if self.ui.turn_state() != TurnState::Awaiting(id) {
            debug!(%id, "reply arrived after the request was abandoned");
            return Ok(());
        }

        let reply = match result {
            Ok(reply) => reply,
            Err(AssistantError::Cancelled) => {
                self.ui.fail_request(id);
                return Ok(());
            }
            Err(err) => {
                warn!(%id, "assistant request failed: {err}");
                self.ui.fail_request(id);
                return self.printer.notice(&err.to_string());
            }
        };

        let key = self.store.push(reply);
        let Some(stored) = self.store.get(key).cloned() else {
            return Ok(());
        };
        self.ui.complete_request(id, &stored);
        if self.ui.typing_key() == Some(key) {
            self.printer.begin_reply(key)?;
        } else {
            self.printer.print_message(&stored)?;
        }
        self.ui.on_message_count_changed(self.store.len());

        if self.auto_speak {
            let outcome = self.ui.speak(&stored.content);
            self.announce_speech(outcome)?;
        }
        self.persist().await;
        Ok(())
    }

    pub fn handle_tick(&mut self, timer: TimerId) -> io::Result<()> {
        match self.ui.on_tick(timer) {
            TickOutcome::Ignored => Ok(()),
            TickOutcome::Advanced(key) => {
                let displayed = self.ui.displayed_text().get(key).unwrap_or_default();
                self.printer.show_progress(key, displayed)
            }
            TickOutcome::Finished(key) => {
                let full = self
                    .store
                    .get(key)
                    .map(|message| message.content.as_str())
                    .unwrap_or_default();
                self.printer.finish_reply(key, full)
            }
        }
    }

    pub fn handle_speech(&mut self, event: SpeechEvent) {
        self.ui.on_speech_event(event);
    }

    fn stop(&mut self) -> io::Result<()> {
        let report = self.ui.stop_all_processing();
        if let Some(key) = report.typing {
            let full = self
                .store
                .get(key)
                .map(|message| message.content.as_str())
                .unwrap_or_default();
            self.printer.finish_reply(key, full)?;
        }
        if report.is_empty() {
            self.printer.notice("Nothing to stop.")
        } else {
            self.printer.notice("Stopped.")
        }
    }

    fn announce_speech(&mut self, outcome: SpeakOutcome) -> io::Result<()> {
        match outcome {
            SpeakOutcome::Queued(_) => Ok(()),
            SpeakOutcome::NothingToSay => self.printer.notice("Nothing to read aloud."),
            SpeakOutcome::EngineFailed => self.printer.notice("Speech is unavailable."),
        }
    }

    fn toggle_speech(&mut self) -> io::Result<()> {
        if self.ui.is_speech_active() {
            self.ui.stop_speaking();
            return Ok(());
        }
        let Some(text) = self.store.last_assistant().map(|m| m.content.clone()) else {
            return self.printer.notice("No reply to read yet.");
        };
        let outcome = self.ui.speak(&text);
        self.announce_speech(outcome)
    }

    fn copy_last_reply(&mut self) -> io::Result<()> {
        let Some(text) = self.store.last_assistant().map(|m| m.content.clone()) else {
            return self.printer.notice("No reply to copy yet.");
        };
        if self.ui.copy_to_clipboard(&text) {
            self.printer.notice("Copied to clipboard.")
        } else {
            self.printer.notice("Could not copy to clipboard.")
        }
    }

    async fn toggle_sidebar(&mut self) -> io::Result<()> {
        if !self.ui.toggle_sidebar() {
            return self.printer.notice("Chat list closed.");
        }
        match self.history.list_chats().await {
            Ok(chats) if chats.is_empty() => self.printer.notice("No saved chats."),
            Ok(chats) => {
                self.printer.notice("Saved chats:")?;
                let current = self.saved.as_ref().map(|session| session.id.clone());
                for chat in chats {
                    let marker = if Some(&chat.id) == current.as_ref() {
                        "*"
                    } else {
                        " "
                    };
                    self.printer.notice(&format!(
                        "{marker} {}  {}  ({} messages, {})",
                        chat.id,
                        chat.title,
                        chat.message_count,
                        chat.updated_at.format("%Y-%m-%d %H:%M")
                    ))?;
                }
                Ok(())
            }
            Err(err) => {
                warn!("listing chats failed: {err}");
                self.printer.notice("Could not load saved chats.")
            }
        }
    }

    fn share(&mut self) -> io::Result<()> {
        if self.store.is_empty() {
            return self.printer.notice("Nothing to share yet.");
        }
        self.ui.set_share_modal_open(true);
        let text = share_text(&self.store);
        for line in text.lines() {
            self.printer.notice(line)?;
        }
        let copied = self.ui.copy_to_clipboard(&text);
        self.ui.set_share_modal_open(false);
        if copied {
            self.printer.notice("Conversation copied to clipboard.")
        } else {
            Ok(())
        }
    }

    /// Saves the conversation, creating the stored session on first use.
    /// Failures are logged; the chat keeps going without persistence.
    async fn persist(&mut self) {
        if self.store.is_empty() {
            return;
        }
        let messages = self.store.as_slice().to_vec();
        match self.saved.as_mut() {
            Some(session) => {
                session.messages = messages;
                session.refresh_title();
                session.updated_at = Utc::now();
                if let Err(err) = self.history.update_chat(session).await {
                    warn!(id = %session.id, "saving chat failed: {err}");
                }
            }
            None => {
                let mut session = ChatSession::new(messages);
                match self.history.save_chat(&session).await {
                    Ok(id) => {
                        session.id = id;
                        self.saved = Some(session);
                    }
                    Err(err) => warn!("creating chat failed: {err}"),
                }
            }
        }
    }

    /// Ctrl+C: interrupts a running turn, or asks to leave when idle.
    pub fn interrupt(&mut self) -> io::Result<Flow> {
        if self.ui.is_processing() || self.ui.is_speech_active() {
            self.stop()?;
            Ok(Flow::Continue)
        } else {
            Ok(Flow::Quit)
        }
    }

    pub async fn shutdown(&mut self) -> io::Result<()> {
        let report = self.ui.stop_all_processing();
        if let Some(key) = report.typing {
            let full = self
                .store
                .get(key)
                .map(|message| message.content.as_str())
                .unwrap_or_default();
            self.printer.finish_reply(key, full)?;
        }
        self.persist().await;
        if let Some(session) = &self.saved {
            self.printer.notice(&format!(
                "Saved as {}. Resume with: mediscan-chat chat --chat {}",
                session.id, session.id
            ))?;
        }
        Ok(())
    }
}

fn share_text(store: &MessageStore) -> String {
    store
        .iter()
        .map(|message| {
            let speaker = if message.role.is_user() { "Me" } else { "MediScan" };
            format!("{speaker}: {}", message.content)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
