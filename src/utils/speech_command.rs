//! Text-to-speech through the platform's command-line synthesizer: `say` on
//! macOS, `espeak-ng` elsewhere. Text is written to the program's stdin so a
//! leading dash is never mistaken for a flag.

use std::process::{Command as StdCommand, Stdio};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::config::SpeechConfig;
use crate::core::speech::{SpeechEngine, SpeechError, SpeechEvent, Utterance, Voice, VoiceGender};

/// Words per minute both synthesizers use at rate 1.0.
const BASE_WORDS_PER_MINUTE: f32 = 175.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavor {
    Say,
    Espeak,
}

impl Flavor {
    fn detect(program: &str) -> Self {
        let name = std::path::Path::new(program)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(program);
        if name == "say" {
            Flavor::Say
        } else {
            Flavor::Espeak
        }
    }

    fn list_voices_args(self) -> &'static [&'static str] {
        match self {
            Flavor::Say => &["-v", "?"],
            Flavor::Espeak => &["--voices"],
        }
    }
}

fn default_program() -> &'static str {
    if cfg!(target_os = "macos") {
        "say"
    } else {
        "espeak-ng"
    }
}

/// Parses `espeak-ng --voices`:
/// `Pty Language Age/Gender VoiceName File Other Languages`.
fn parse_espeak_voices(output: &str) -> Vec<Voice> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 4 {
                return None;
            }
            let gender = match fields[2].rsplit('/').next() {
                Some("F") => Some(VoiceGender::Female),
                Some("M") => Some(VoiceGender::Male),
                _ => None,
            };
            Some(Voice {
                name: fields[3].to_string(),
                language: fields[1].to_string(),
                gender,
            })
        })
        .collect()
}

/// Parses `say -v ?`: `Name   en_US    # sample sentence`. Names may contain
/// spaces, the locale is the last token before the `#`.
fn parse_say_voices(output: &str) -> Vec<Voice> {
    output
        .lines()
        .filter_map(|line| {
            let head = line.split('#').next()?.trim_end();
            let (name, locale) = head.rsplit_once(char::is_whitespace)?;
            let name = name.trim();
            if name.is_empty() || locale.is_empty() {
                return None;
            }
            Some(Voice {
                name: name.to_string(),
                language: locale.replace('_', "-"),
                gender: None,
            })
        })
        .collect()
}

fn utterance_args(flavor: Flavor, utterance: &Utterance) -> Vec<String> {
    let words_per_minute = (BASE_WORDS_PER_MINUTE * utterance.rate).round().max(80.0) as u32;
    let mut args = Vec::new();
    match flavor {
        Flavor::Say => {
            args.push("-r".to_string());
            args.push(words_per_minute.to_string());
            if let Some(voice) = &utterance.voice {
                args.push("-v".to_string());
                args.push(voice.name.clone());
            }
        }
        Flavor::Espeak => {
            let pitch = (50.0 * utterance.pitch).round().clamp(0.0, 99.0) as u32;
            args.push("-s".to_string());
            args.push(words_per_minute.to_string());
            args.push("-p".to_string());
            args.push(pitch.to_string());
            if let Some(voice) = &utterance.voice {
                args.push("-v".to_string());
                args.push(voice.language.clone());
            }
        }
    }
    args
}

pub struct CommandSpeechEngine {
    program: String,
    flavor: Flavor,
    voices: Vec<Voice>,
    events: mpsc::UnboundedSender<SpeechEvent>,
    current: Option<CancellationToken>,
}

impl CommandSpeechEngine {
    /// Locates the synthesizer and lists its voices. Events for spoken
    /// utterances arrive on the returned receiver.
    pub fn detect(
        config: &SpeechConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SpeechEvent>), SpeechError> {
        let program = config
            .command
            .clone()
            .unwrap_or_else(|| default_program().to_string());
        let flavor = Flavor::detect(&program);

        let output = StdCommand::new(&program)
            .args(flavor.list_voices_args())
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .map_err(|err| {
                SpeechError::Unavailable(format!("speech program `{program}` not found ({err})"))
            })?;
        let listing = String::from_utf8_lossy(&output.stdout);
        let voices = match flavor {
            Flavor::Say => parse_say_voices(&listing),
            Flavor::Espeak => parse_espeak_voices(&listing),
        };
        debug!(%program, voices = voices.len(), "speech engine ready");

        let (events, rx) = mpsc::unbounded_channel();
        Ok((
            Self {
                program,
                flavor,
                voices,
                events,
                current: None,
            },
            rx,
        ))
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl SpeechEngine for CommandSpeechEngine {
    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    fn speak(&mut self, utterance: Utterance) -> Result<(), SpeechError> {
        self.cancel();

        let mut child = Command::new(&self.program)
            .args(utterance_args(self.flavor, &utterance))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SpeechError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let token = CancellationToken::new();
        self.current = Some(token.clone());
        let events = self.events.clone();
        let Utterance { id, text, .. } = utterance;

        tokio::spawn(async move {
            if let Some(mut stdin) = child.stdin.take() {
                if let Err(err) = stdin.write_all(text.as_bytes()).await {
                    let _ = child.kill().await;
                    let _ = events.send(SpeechEvent::Failed {
                        id,
                        error: err.to_string(),
                    });
                    return;
                }
            }
            let _ = events.send(SpeechEvent::Started(id));

            let event = tokio::select! {
                status = child.wait() => match status {
                    Ok(status) if status.success() => SpeechEvent::Ended(id),
                    Ok(status) => SpeechEvent::Failed { id, error: format!("synthesizer exited with {status}") },
                    Err(err) => SpeechEvent::Failed { id, error: err.to_string() },
                },
                _ = token.cancelled() => {
                    let _ = child.kill().await;
                    SpeechEvent::Ended(id)
                }
            };
            let _ = events.send(event);
        });
        Ok(())
    }

    fn cancel(&mut self) {
        if let Some(token) = self.current.take() {
            token.cancel();
        }
    }
}

/// Stand-in when no synthesizer could be found. Every request is refused
/// with the reason detection failed.
#[derive(Debug, Clone)]
pub struct NoSpeech {
    reason: String,
}

impl NoSpeech {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl SpeechEngine for NoSpeech {
    fn voices(&self) -> Vec<Voice> {
        Vec::new()
    }

    fn speak(&mut self, _utterance: Utterance) -> Result<(), SpeechError> {
        Err(SpeechError::Unavailable(self.reason.clone()))
    }

    fn cancel(&mut self) {}
}
