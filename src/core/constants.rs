//! Shared constants used across the application

use std::time::Duration;

/// Delay between two revealed characters of an assistant reply.
pub const TYPING_TICK: Duration = Duration::from_millis(30);

/// Distance from the end of the transcript, in pixels, that still counts as
/// "at the bottom". Configured values above this are clamped to it.
pub const SCROLL_BOTTOM_TOLERANCE_PX: f64 = 30.0;

/// The "jump to latest" control only appears once the transcript holds more
/// than this many messages.
pub const SCROLL_BUTTON_MIN_MESSAGES: usize = 2;

pub const SPEECH_RATE: f32 = 0.95;
pub const SPEECH_PITCH: f32 = 1.0;
pub const SPEECH_LANGUAGE_PREFIX: &str = "en";

/// Number of characters of the first user message used as a chat title.
pub const CHAT_TITLE_MAX_CHARS: usize = 50;

/// Environment variable holding the bearer token for the assistant endpoint.
pub const API_KEY_ENV: &str = "MEDISCAN_API_KEY";

/// Environment variable read by the tracing filter.
pub const LOG_ENV: &str = "MEDISCAN_LOG";
