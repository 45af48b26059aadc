//! `speak` and `voices` subcommands.

use std::error::Error;

use crate::core::chat_ui::ChatUiSettings;
use crate::core::config::Config;
use crate::core::speech::{choose_voice, SpeakOutcome, SpeechEngine, SpeechEvent, SpeechNarrator};
use crate::utils::speech_command::CommandSpeechEngine;

/// Reads `text` aloud with the configured voice and waits until it is done.
pub async fn speak_text(config: &Config, text: Vec<String>) -> Result<(), Box<dyn Error>> {
    let text = text.join(" ");
    if text.trim().is_empty() {
        eprintln!("Usage: mediscan-chat speak <text>");
        std::process::exit(1);
    }

    let (mut engine, mut events) = CommandSpeechEngine::detect(&config.speech)?;
    let mut narrator = SpeechNarrator::new(ChatUiSettings::from(config).speech);

    match narrator.speak(&mut engine, &text) {
        SpeakOutcome::Queued(_) => {}
        SpeakOutcome::NothingToSay => {
            eprintln!("Nothing to read aloud.");
            return Ok(());
        }
        SpeakOutcome::EngineFailed => {
            return Err(format!("{} refused the text", engine.program()).into());
        }
    }

    while narrator.is_active() {
        tokio::select! {
            event = events.recv() => match event {
                Some(SpeechEvent::Failed { id, error }) => {
                    narrator.on_event(SpeechEvent::Failed { id, error: error.clone() });
                    return Err(format!("Speech failed: {error}").into());
                }
                Some(event) => {
                    narrator.on_event(event);
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                narrator.stop(&mut engine);
                break;
            }
        }
    }
    Ok(())
}

pub fn list_voices(config: &Config) -> Result<(), Box<dyn Error>> {
    let (engine, _events) = CommandSpeechEngine::detect(&config.speech)?;
    let voices = engine.voices();
    if voices.is_empty() {
        println!("{} reported no voices.", engine.program());
        return Ok(());
    }

    let settings = ChatUiSettings::from(config).speech;
    let preferred = choose_voice(&voices, &settings);
    println!("Voices from {}:\n", engine.program());
    for voice in &voices {
        let marker = if preferred.as_ref() == Some(voice) {
            "*"
        } else {
            " "
        };
        println!("{marker} {:<28} {}", voice.name, voice.language);
    }
    match preferred {
        Some(voice) => println!("\n* used for replies: {}", voice.name),
        None => println!("\nReplies use the platform default voice."),
    }
    Ok(())
}
