//! Read-aloud support for chat messages.
//!
//! The narrator keeps at most one utterance alive. The engine reports
//! progress asynchronously through [`SpeechEvent`]s that the event loop feeds
//! back into [`SpeechNarrator::on_event`]; events for an utterance that has
//! since been replaced or cancelled are dropped.

mod sanitize;

pub use sanitize::sanitize_for_speech;

use std::fmt;
use std::io;

use tracing::{debug, warn};

use crate::core::constants::{SPEECH_LANGUAGE_PREFIX, SPEECH_PITCH, SPEECH_RATE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UtteranceId(u64);

#[cfg(test)]
impl UtteranceId {
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for UtteranceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "utterance#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceGender {
    Female,
    Male,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    pub name: String,
    /// BCP 47 style tag such as `en-US`.
    pub language: String,
    pub gender: Option<VoiceGender>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub id: UtteranceId,
    pub text: String,
    pub rate: f32,
    pub pitch: f32,
    /// `None` leaves the choice to the platform default.
    pub voice: Option<Voice>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    Started(UtteranceId),
    Ended(UtteranceId),
    Failed { id: UtteranceId, error: String },
}

impl SpeechEvent {
    pub fn id(&self) -> UtteranceId {
        match self {
            SpeechEvent::Started(id) | SpeechEvent::Ended(id) => *id,
            SpeechEvent::Failed { id, .. } => *id,
        }
    }
}

/// Errors an engine can report synchronously when asked to speak.
#[derive(Debug)]
pub enum SpeechError {
    /// No usable speech program or service on this platform.
    Unavailable(String),

    /// The speech program exists but could not be started.
    Spawn {
        program: String,
        source: io::Error,
    },
}

impl fmt::Display for SpeechError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeechError::Unavailable(reason) => write!(f, "Speech unavailable: {reason}"),
            SpeechError::Spawn { program, source } => {
                write!(f, "Failed to start speech program `{program}`: {source}")
            }
        }
    }
}

impl std::error::Error for SpeechError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SpeechError::Spawn { source, .. } => Some(source),
            SpeechError::Unavailable(_) => None,
        }
    }
}

/// Platform text-to-speech capability.
pub trait SpeechEngine {
    fn voices(&self) -> Vec<Voice>;

    /// Begins speaking. Progress arrives later as [`SpeechEvent`]s carrying
    /// `utterance.id`.
    fn speak(&mut self, utterance: Utterance) -> Result<(), SpeechError>;

    /// Stops whatever is being spoken. Must be harmless when silent.
    fn cancel(&mut self);
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpeechSettings {
    pub rate: f32,
    pub pitch: f32,
    pub language_prefix: String,
    pub prefer_female_voice: bool,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            rate: SPEECH_RATE,
            pitch: SPEECH_PITCH,
            language_prefix: SPEECH_LANGUAGE_PREFIX.to_string(),
            prefer_female_voice: true,
        }
    }
}

const FEMALE_NAME_HINTS: &[&str] = &[
    "female", "woman", "samantha", "victoria", "karen", "zira", "susan", "fiona", "moira",
    "tessa", "serena", "aria", "jenny", "libby", "veena", "google uk english female",
];

fn sounds_female(voice: &Voice) -> bool {
    if voice.gender == Some(VoiceGender::Female) {
        return true;
    }
    let name = voice.name.to_lowercase();
    FEMALE_NAME_HINTS.iter().any(|hint| name.contains(hint))
}

/// Picks the preferred voice: matching language and, when asked for, a
/// female-sounding name. Falls back to the platform default.
pub fn choose_voice(voices: &[Voice], settings: &SpeechSettings) -> Option<Voice> {
    if !settings.prefer_female_voice {
        return None;
    }
    let prefix = settings.language_prefix.to_lowercase();
    voices
        .iter()
        .find(|voice| voice.language.to_lowercase().starts_with(&prefix) && sounds_female(voice))
        .cloned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakOutcome {
    /// Handed to the engine; `is_speaking` flips once it reports a start.
    Queued(UtteranceId),
    /// Nothing left after sanitizing.
    NothingToSay,
    /// The engine refused the utterance. Already logged.
    EngineFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum SpeechState {
    #[default]
    Idle,
    Pending(UtteranceId),
    Speaking(UtteranceId),
}

impl SpeechState {
    fn current(self) -> Option<UtteranceId> {
        match self {
            SpeechState::Idle => None,
            SpeechState::Pending(id) | SpeechState::Speaking(id) => Some(id),
        }
    }
}

#[derive(Debug)]
pub struct SpeechNarrator {
    settings: SpeechSettings,
    next_id: u64,
    state: SpeechState,
}

impl SpeechNarrator {
    pub fn new(settings: SpeechSettings) -> Self {
        Self {
            settings,
            next_id: 0,
            state: SpeechState::Idle,
        }
    }

    pub fn is_speaking(&self) -> bool {
        matches!(self.state, SpeechState::Speaking(_))
    }

    /// True from `speak` until the utterance ends, including the window
    /// before the engine reports a start.
    pub fn is_active(&self) -> bool {
        self.state != SpeechState::Idle
    }

    pub fn current_utterance(&self) -> Option<UtteranceId> {
        self.state.current()
    }

    pub fn speak(&mut self, engine: &mut dyn SpeechEngine, text: &str) -> SpeakOutcome {
        self.stop(engine);

        let text = sanitize_for_speech(text);
        if text.is_empty() {
            debug!("nothing speakable after sanitizing");
            return SpeakOutcome::NothingToSay;
        }

        self.next_id += 1;
        let id = UtteranceId(self.next_id);
        let utterance = Utterance {
            id,
            text,
            rate: self.settings.rate,
            pitch: self.settings.pitch,
            voice: choose_voice(&engine.voices(), &self.settings),
        };

        match engine.speak(utterance) {
            Ok(()) => {
                self.state = SpeechState::Pending(id);
                SpeakOutcome::Queued(id)
            }
            Err(err) => {
                warn!(%id, "speech engine refused utterance: {err}");
                SpeakOutcome::EngineFailed
            }
        }
    }

    /// Applies an engine event. Returns false when the event belongs to an
    /// utterance that is no longer current.
    pub fn on_event(&mut self, event: SpeechEvent) -> bool {
        if self.state.current() != Some(event.id()) {
            debug!(id = %event.id(), "dropping stale speech event");
            return false;
        }

        match event {
            SpeechEvent::Started(id) => self.state = SpeechState::Speaking(id),
            SpeechEvent::Ended(_) => self.state = SpeechState::Idle,
            SpeechEvent::Failed { id, error } => {
                warn!(%id, "speech synthesis failed: {error}");
                self.state = SpeechState::Idle;
            }
        }
        true
    }

    /// Cancels the active utterance. Returns true if one was active.
    pub fn stop(&mut self, engine: &mut dyn SpeechEngine) -> bool {
        let Some(id) = self.state.current() else {
            return false;
        };
        engine.cancel();
        self.state = SpeechState::Idle;
        debug!(%id, "speech stopped");
        true
    }
}
