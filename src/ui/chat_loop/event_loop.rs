//! The interactive loop: stdin lines, typing ticks, speech progress and
//! assistant replies all arrive on channels and are applied to the screen
//! one at a time.

use std::error::Error;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::screen::Flow;
use super::setup::{bootstrap, Bootstrapped, ChatOptions};
use crate::core::config::Config;
use crate::core::speech::SpeechEvent;

fn spawn_input_reader(tx: mpsc::UnboundedSender<String>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    warn!("reading input failed: {err}");
                    break;
                }
            }
        }
    })
}

async fn next_speech_event(
    events: &mut Option<mpsc::UnboundedReceiver<SpeechEvent>>,
) -> Option<SpeechEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

pub async fn run_chat(config: Config, options: ChatOptions) -> Result<(), Box<dyn Error>> {
    let Bootstrapped {
        mut screen,
        mut ticks,
        mut speech_events,
        mut replies,
    } = bootstrap(&config, options).await?;

    println!("MediScan chat. Type a question, /help for commands, /quit to leave.");
    println!("Answers are informational; confirm dosing with a pharmacist or doctor.");

    let (input_tx, mut input_rx) = mpsc::unbounded_channel::<String>();
    let reader = spawn_input_reader(input_tx);

    let result: Result<(), Box<dyn Error>> = loop {
        let flow = tokio::select! {
            line = input_rx.recv() => match line {
                Some(line) => screen.handle_input(&line).await,
                None => Ok(Flow::Quit),
            },
            Some(timer) = ticks.recv() => screen.handle_tick(timer).map(|_| Flow::Continue),
            Some(event) = next_speech_event(&mut speech_events) => {
                screen.handle_speech(event);
                Ok(Flow::Continue)
            }
            Some((id, reply)) = replies.recv() => {
                screen.handle_reply(id, reply).await.map(|_| Flow::Continue)
            }
            signal = tokio::signal::ctrl_c() => match signal {
                Ok(()) => screen.interrupt(),
                Err(err) => {
                    warn!("ctrl-c handler failed: {err}");
                    Ok(Flow::Quit)
                }
            },
        };

        match flow {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) => break Ok(()),
            Err(err) => break Err(err.into()),
        }
    };

    debug!("leaving chat loop");
    reader.abort();
    screen.shutdown().await?;
    result
}
