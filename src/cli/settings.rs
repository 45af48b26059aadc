//! `config set` / `config unset` handling.
//!
//! Every key is a row in [`SETTINGS`]: how to parse a value into the config,
//! and how to restore the default.

use std::fmt;

use crate::core::config::{AssistantConfig, Config, SpeechConfig, UiConfig};
use crate::core::constants::SCROLL_BOTTOM_TOLERANCE_PX;

#[derive(Debug, Clone, PartialEq)]
pub enum SettingError {
    UnknownKey(String),
    InvalidBoolean(String),
    InvalidNumber { key: &'static str, input: String },
    OutOfRange { key: &'static str, hint: &'static str },
    MissingValue(&'static str),
}

impl fmt::Display for SettingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingError::UnknownKey(key) => write!(f, "Unknown config key: {key}"),
            SettingError::InvalidBoolean(input) => write!(
                f,
                "Invalid boolean value: {input} (use on/off, true/false or yes/no)"
            ),
            SettingError::InvalidNumber { key, input } => {
                write!(f, "Invalid number for {key}: {input}")
            }
            SettingError::OutOfRange { key, hint } => write!(f, "{key} {hint}"),
            SettingError::MissingValue(key) => write!(f, "Missing value for {key}"),
        }
    }
}

impl std::error::Error for SettingError {}

pub fn parse_bool(input: &str) -> Option<bool> {
    match input.to_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Some(true),
        "off" | "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, input: &str) -> Result<T, SettingError> {
    input
        .trim()
        .parse()
        .map_err(|_| SettingError::InvalidNumber {
            key,
            input: input.to_string(),
        })
}

fn parse_positive_f32(key: &'static str, input: &str) -> Result<f32, SettingError> {
    let value: f32 = parse_number(key, input)?;
    if !(value.is_finite() && value > 0.0 && value <= 10.0) {
        return Err(SettingError::OutOfRange {
            key,
            hint: "must be between 0 and 10",
        });
    }
    Ok(value)
}

struct Setting {
    key: &'static str,
    set: fn(&mut Config, &str) -> Result<(), SettingError>,
    unset: fn(&mut Config),
}

const SETTINGS: &[Setting] = &[
    Setting {
        key: "ui.typing-tick-ms",
        set: |config, value| {
            let ms: u64 = parse_number("ui.typing-tick-ms", value)?;
            if ms == 0 {
                return Err(SettingError::OutOfRange {
                    key: "ui.typing-tick-ms",
                    hint: "must be at least 1",
                });
            }
            config.ui.typing_tick_ms = ms;
            Ok(())
        },
        unset: |config| config.ui.typing_tick_ms = UiConfig::default().typing_tick_ms,
    },
    Setting {
        key: "ui.scroll-bottom-tolerance-px",
        set: |config, value| {
            let px: f64 = parse_number("ui.scroll-bottom-tolerance-px", value)?;
            if !(0.0..=SCROLL_BOTTOM_TOLERANCE_PX).contains(&px) {
                return Err(SettingError::OutOfRange {
                    key: "ui.scroll-bottom-tolerance-px",
                    hint: "must be between 0 and 30",
                });
            }
            config.ui.scroll_bottom_tolerance_px = px;
            Ok(())
        },
        unset: |config| {
            config.ui.scroll_bottom_tolerance_px = UiConfig::default().scroll_bottom_tolerance_px
        },
    },
    Setting {
        key: "ui.scroll-button-min-messages",
        set: |config, value| {
            config.ui.scroll_button_min_messages =
                parse_number("ui.scroll-button-min-messages", value)?;
            Ok(())
        },
        unset: |config| {
            config.ui.scroll_button_min_messages = UiConfig::default().scroll_button_min_messages
        },
    },
    Setting {
        key: "speech",
        set: |config, value| {
            config.speech.enabled =
                parse_bool(value).ok_or_else(|| SettingError::InvalidBoolean(value.to_string()))?;
            Ok(())
        },
        unset: |config| config.speech.enabled = SpeechConfig::default().enabled,
    },
    Setting {
        key: "speech.rate",
        set: |config, value| {
            config.speech.rate = parse_positive_f32("speech.rate", value)?;
            Ok(())
        },
        unset: |config| config.speech.rate = SpeechConfig::default().rate,
    },
    Setting {
        key: "speech.pitch",
        set: |config, value| {
            config.speech.pitch = parse_positive_f32("speech.pitch", value)?;
            Ok(())
        },
        unset: |config| config.speech.pitch = SpeechConfig::default().pitch,
    },
    Setting {
        key: "speech.language",
        set: |config, value| {
            config.speech.preferred_language = value.trim().to_string();
            Ok(())
        },
        unset: |config| {
            config.speech.preferred_language = SpeechConfig::default().preferred_language
        },
    },
    Setting {
        key: "speech.female-voice",
        set: |config, value| {
            config.speech.prefer_female_voice =
                parse_bool(value).ok_or_else(|| SettingError::InvalidBoolean(value.to_string()))?;
            Ok(())
        },
        unset: |config| {
            config.speech.prefer_female_voice = SpeechConfig::default().prefer_female_voice
        },
    },
    Setting {
        key: "speech.command",
        set: |config, value| {
            config.speech.command = Some(value.trim().to_string());
            Ok(())
        },
        unset: |config| config.speech.command = None,
    },
    Setting {
        key: "assistant.base-url",
        set: |config, value| {
            config.assistant.base_url = value.trim().to_string();
            Ok(())
        },
        unset: |config| config.assistant.base_url = AssistantConfig::default().base_url,
    },
    Setting {
        key: "assistant.model",
        set: |config, value| {
            config.assistant.model = value.trim().to_string();
            Ok(())
        },
        unset: |config| config.assistant.model = AssistantConfig::default().model,
    },
    Setting {
        key: "assistant.system-prompt",
        set: |config, value| {
            config.assistant.system_prompt = value.to_string();
            Ok(())
        },
        unset: |config| config.assistant.system_prompt = AssistantConfig::default().system_prompt,
    },
    Setting {
        key: "assistant.timeout-secs",
        set: |config, value| {
            config.assistant.request_timeout_secs =
                Some(parse_number("assistant.timeout-secs", value)?);
            Ok(())
        },
        unset: |config| config.assistant.request_timeout_secs = None,
    },
];

fn find(key: &str) -> Result<&'static Setting, SettingError> {
    SETTINGS
        .iter()
        .find(|setting| setting.key == key)
        .ok_or_else(|| SettingError::UnknownKey(key.to_string()))
}

pub fn keys() -> impl Iterator<Item = &'static str> {
    SETTINGS.iter().map(|setting| setting.key)
}

/// Applies `key = value` to `config`. Multi-word values arrive split and are
/// joined with spaces.
pub fn apply_setting(config: &mut Config, key: &str, value: &[String]) -> Result<(), SettingError> {
    let setting = find(key)?;
    let value = value.join(" ");
    if value.trim().is_empty() {
        return Err(SettingError::MissingValue(setting.key));
    }
    (setting.set)(config, &value)
}

pub fn reset_setting(config: &mut Config, key: &str) -> Result<(), SettingError> {
    let setting = find(key)?;
    (setting.unset)(config);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: &str) -> Vec<String> {
        value.split(' ').map(str::to_string).collect()
    }

    #[test]
    fn sets_and_resets_values() {
        let mut config = Config::default();
        apply_setting(&mut config, "speech", &args("off")).unwrap();
        apply_setting(&mut config, "speech.rate", &args("1.2")).unwrap();
        apply_setting(&mut config, "assistant.system-prompt", &args("Be brief.  Always.")).unwrap();
        assert!(!config.speech.enabled);
        assert_eq!(config.speech.rate, 1.2);
        assert_eq!(config.assistant.system_prompt, "Be brief.  Always.");

        reset_setting(&mut config, "speech.rate").unwrap();
        assert_eq!(config.speech.rate, SpeechConfig::default().rate);
    }

    #[test]
    fn rejects_bad_input() {
        let mut config = Config::default();
        assert_eq!(
            apply_setting(&mut config, "colour", &args("red")),
            Err(SettingError::UnknownKey("colour".into()))
        );
        assert_eq!(
            apply_setting(&mut config, "speech", &args("maybe")),
            Err(SettingError::InvalidBoolean("maybe".into()))
        );
        assert!(matches!(
            apply_setting(&mut config, "ui.scroll-bottom-tolerance-px", &args("45")),
            Err(SettingError::OutOfRange { .. })
        ));
        assert!(matches!(
            apply_setting(&mut config, "ui.typing-tick-ms", &args("fast")),
            Err(SettingError::InvalidNumber { .. })
        ));
        assert_eq!(
            apply_setting(&mut config, "assistant.model", &[]),
            Err(SettingError::MissingValue("assistant.model"))
        );
        assert_eq!(config, Config::default());
    }

    #[test]
    fn every_key_can_be_reset() {
        let mut config = Config::default();
        for key in keys() {
            reset_setting(&mut config, key).unwrap();
        }
        assert_eq!(config, Config::default());
    }
}
