//! Terminal front end for chat sessions.
//!
//! This layer reads prompt lines, prints the transcript and forwards what
//! happened to [`crate::core::chat_ui::ChatUi`]; the state machines
//! themselves live in [`crate::core`].

pub mod chat_loop;
pub mod commands;
pub mod transcript;
pub mod viewport;
