use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::constants::{
    SCROLL_BOTTOM_TOLERANCE_PX, SCROLL_BUTTON_MIN_MESSAGES, SPEECH_LANGUAGE_PREFIX, SPEECH_PITCH,
    SPEECH_RATE, TYPING_TICK,
};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct UiConfig {
    /// Milliseconds between two revealed characters of a reply
    pub typing_tick_ms: u64,
    /// How close to the end of the transcript still counts as the bottom (max 30)
    pub scroll_bottom_tolerance_px: f64,
    /// Show the "jump to latest" control only above this many messages
    pub scroll_button_min_messages: usize,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            typing_tick_ms: TYPING_TICK.as_millis() as u64,
            scroll_bottom_tolerance_px: SCROLL_BOTTOM_TOLERANCE_PX,
            scroll_button_min_messages: SCROLL_BUTTON_MIN_MESSAGES,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SpeechConfig {
    pub enabled: bool,
    pub rate: f32,
    pub pitch: f32,
    /// Voices whose language starts with this prefix are preferred
    pub preferred_language: String,
    pub prefer_female_voice: bool,
    /// Speech program to run instead of the platform default (e.g. "espeak-ng")
    pub command: Option<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rate: SPEECH_RATE,
            pitch: SPEECH_PITCH,
            preferred_language: SPEECH_LANGUAGE_PREFIX.to_string(),
            prefer_female_voice: true,
            command: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AssistantConfig {
    /// Base URL of an OpenAI-compatible API, without the `/chat/completions` suffix
    pub base_url: String,
    pub model: String,
    pub system_prompt: String,
    /// No timeout when unset
    pub request_timeout_secs: Option<u64>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            system_prompt: "You are MediScan, a careful assistant that explains medications \
in plain language. Always remind the user to confirm dosing with a pharmacist or doctor."
                .to_string(),
            request_timeout_secs: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub ui: UiConfig,
    pub speech: SpeechConfig,
    pub assistant: AssistantConfig,
}

pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
