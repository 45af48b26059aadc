//! Chat screen orchestration.
//!
//! [`ChatUi`] ties the typing animation, scroll tracking, narration and
//! cancellation together behind the surface the chat screen consumes. The
//! screen still owns the transcript and the network call; it reports what
//! happened (`begin_request`, `complete_request`, scroll events, ticks,
//! speech events) and renders what `ChatUi` exposes.
//!
//! Per assistant turn the orchestrator moves through
//! `Idle -> Awaiting -> Typing -> Idle`. [`ChatUi::stop_all_processing`]
//! jumps straight back to `Idle` from anywhere. Speech runs independently
//! of the turn and is stopped by the same call.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::cancellation::{CancellationController, RequestId, StopReport};
use crate::core::config::Config;
use crate::core::constants::{SCROLL_BOTTOM_TOLERANCE_PX, SCROLL_BUTTON_MIN_MESSAGES, TYPING_TICK};
use crate::core::message::{Message, MessageKey};
use crate::core::scheduler::{TickScheduler, TimerId};
use crate::core::scroll::{ScrollState, ScrollTracker, ScrollViewport};
use crate::core::speech::{SpeakOutcome, SpeechEngine, SpeechEvent, SpeechNarrator, SpeechSettings};
use crate::core::typing::{DisplayedTextMap, TickOutcome, TypingAnimator};
use crate::utils::clipboard::Clipboard;

#[cfg(test)]
mod tests;

/// Platform capabilities the orchestrator drives.
pub struct ChatPlatform {
    pub scheduler: Box<dyn TickScheduler>,
    pub speech: Box<dyn SpeechEngine>,
    pub viewport: Box<dyn ScrollViewport>,
    pub clipboard: Box<dyn Clipboard>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatUiSettings {
    pub typing_tick: Duration,
    pub scroll_bottom_tolerance_px: f64,
    pub scroll_button_min_messages: usize,
    pub speech: SpeechSettings,
}

impl Default for ChatUiSettings {
    fn default() -> Self {
        Self {
            typing_tick: TYPING_TICK,
            scroll_bottom_tolerance_px: SCROLL_BOTTOM_TOLERANCE_PX,
            scroll_button_min_messages: SCROLL_BUTTON_MIN_MESSAGES,
            speech: SpeechSettings::default(),
        }
    }
}

impl From<&Config> for ChatUiSettings {
    fn from(config: &Config) -> Self {
        Self {
            typing_tick: Duration::from_millis(config.ui.typing_tick_ms),
            scroll_bottom_tolerance_px: config.ui.scroll_bottom_tolerance_px,
            scroll_button_min_messages: config.ui.scroll_button_min_messages,
            speech: SpeechSettings {
                rate: config.speech.rate,
                pitch: config.speech.pitch,
                language_prefix: config.speech.preferred_language.clone(),
                prefer_female_voice: config.speech.prefer_female_voice,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    /// Waiting for the assistant reply to the given request.
    Awaiting(RequestId),
    /// Revealing the reply stored under the given key.
    Typing(MessageKey),
}

pub struct ChatUi {
    platform: ChatPlatform,
    typing: TypingAnimator,
    scroll: ScrollTracker,
    narrator: SpeechNarrator,
    cancellation: CancellationController,
    turn: TurnState,
    sidebar_open: bool,
    share_modal_open: bool,
}

impl ChatUi {
    pub fn new(settings: ChatUiSettings, platform: ChatPlatform) -> Self {
        Self {
            platform,
            typing: TypingAnimator::new(settings.typing_tick),
            scroll: ScrollTracker::new(
                settings.scroll_bottom_tolerance_px,
                settings.scroll_button_min_messages,
            ),
            narrator: SpeechNarrator::new(settings.speech),
            cancellation: CancellationController::new(),
            turn: TurnState::Idle,
            sidebar_open: false,
            share_modal_open: false,
        }
    }

    pub fn turn_state(&self) -> TurnState {
        self.turn
    }

    pub fn is_processing(&self) -> bool {
        self.turn != TurnState::Idle
    }

    // --- typing ---------------------------------------------------------

    pub fn displayed_text(&self) -> &DisplayedTextMap {
        self.typing.displayed()
    }

    pub fn text_for<'a>(&'a self, message: &'a Message) -> &'a str {
        self.typing.displayed().text_for(message)
    }

    pub fn is_typing(&self) -> bool {
        self.typing.is_active()
    }

    pub fn typing_key(&self) -> Option<MessageKey> {
        self.typing.active_key()
    }

    /// Animates an arbitrary message outside of a request cycle, e.g. a
    /// canned greeting. A turn that is awaiting a reply stays awaiting.
    pub fn start_typing(&mut self, message: &Message) {
        let key = message.timestamp;
        let started = self
            .typing
            .start_typing(self.platform.scheduler.as_mut(), key, &message.content);
        if matches!(self.turn, TurnState::Awaiting(_)) {
            return;
        }
        if started {
            self.set_turn(TurnState::Typing(key));
        } else if matches!(self.turn, TurnState::Typing(_)) {
            self.set_turn(TurnState::Idle);
        }
    }

    pub fn on_tick(&mut self, timer: TimerId) -> TickOutcome {
        let outcome = self.typing.on_tick(self.platform.scheduler.as_mut(), timer);
        if let TickOutcome::Finished(key) = outcome {
            if self.turn == TurnState::Typing(key) && self.cancellation.in_flight().is_none() {
                self.set_turn(TurnState::Idle);
            }
        }
        outcome
    }

    // --- request lifecycle ----------------------------------------------

    /// Marks the start of an assistant request and returns the token the
    /// request must honor. A still-running animation is finished first.
    pub fn begin_request(&mut self) -> (CancellationToken, RequestId) {
        self.typing.cancel(self.platform.scheduler.as_mut());
        let (token, id) = self.cancellation.begin();
        self.set_turn(TurnState::Awaiting(id));
        (token, id)
    }

    /// Hands over the reply for `id`, which the screen has already appended
    /// to its transcript. Returns false for a reply nobody is waiting for
    /// any more.
    pub fn complete_request(&mut self, id: RequestId, reply: &Message) -> bool {
        if !self.cancellation.finish(id) {
            debug!(%id, "ignoring reply for stale request");
            return false;
        }
        self.set_turn(TurnState::Idle);
        if reply.role.is_assistant() {
            self.start_typing(reply);
        }
        true
    }

    /// The request for `id` failed; nothing was appended.
    pub fn fail_request(&mut self, id: RequestId) -> bool {
        if !self.cancellation.finish(id) {
            return false;
        }
        self.set_turn(TurnState::Idle);
        true
    }

    pub fn stop_all_processing(&mut self) -> StopReport {
        let report = self.cancellation.stop_all(
            &mut self.typing,
            self.platform.scheduler.as_mut(),
            &mut self.narrator,
            self.platform.speech.as_mut(),
        );
        self.set_turn(TurnState::Idle);
        if !report.is_empty() {
            debug!(?report, "stopped all processing");
        }
        report
    }

    // --- scrolling ------------------------------------------------------

    pub fn scroll_state(&self) -> ScrollState {
        self.scroll.state()
    }

    pub fn show_scroll_button(&self) -> bool {
        self.scroll.show_scroll_button()
    }

    pub fn on_scroll(&mut self) {
        let metrics = self.platform.viewport.metrics();
        self.scroll.on_scroll(metrics);
    }

    pub fn on_message_count_changed(&mut self, count: usize) -> bool {
        self.scroll
            .on_message_count_changed(count, self.platform.viewport.as_mut())
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll.scroll_to_bottom(self.platform.viewport.as_mut());
    }

    // --- speech ---------------------------------------------------------

    pub fn is_speaking(&self) -> bool {
        self.narrator.is_speaking()
    }

    /// True from the moment an utterance is handed to the engine until it
    /// ends, including before the engine reports that it started.
    pub fn is_speech_active(&self) -> bool {
        self.narrator.is_active()
    }

    pub fn speak(&mut self, text: &str) -> SpeakOutcome {
        self.narrator.speak(self.platform.speech.as_mut(), text)
    }

    pub fn stop_speaking(&mut self) -> bool {
        self.narrator.stop(self.platform.speech.as_mut())
    }

    pub fn on_speech_event(&mut self, event: SpeechEvent) -> bool {
        self.narrator.on_event(event)
    }

    // --- misc surface ---------------------------------------------------

    /// Copies `text`, returning whether it worked. Failures are only logged.
    pub fn copy_to_clipboard(&mut self, text: &str) -> bool {
        match self.platform.clipboard.copy(text) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("copy to clipboard failed: {err}");
                false
            }
        }
    }

    pub fn is_sidebar_open(&self) -> bool {
        self.sidebar_open
    }

    pub fn set_sidebar_open(&mut self, open: bool) {
        self.sidebar_open = open;
    }

    pub fn toggle_sidebar(&mut self) -> bool {
        self.sidebar_open = !self.sidebar_open;
        self.sidebar_open
    }

    pub fn is_share_modal_open(&self) -> bool {
        self.share_modal_open
    }

    pub fn set_share_modal_open(&mut self, open: bool) {
        self.share_modal_open = open;
    }

    fn set_turn(&mut self, next: TurnState) {
        if self.turn != next {
            debug!(from = ?self.turn, to = ?next, "turn state");
            self.turn = next;
        }
    }
}
