//! Interactive chat session in the terminal.
//!
//! [`setup`] wires [`crate::core::chat_ui::ChatUi`] to real capabilities,
//! [`screen`] turns prompt lines and background results into transcript
//! output, and [`event_loop`] multiplexes the input sources.

mod event_loop;
pub mod screen;
pub mod setup;


pub use event_loop::run_chat;
pub use setup::{build_speech, ChatOptions};
