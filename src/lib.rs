//! MediScan chat is the conversation core behind the MediScan assistant
//! screen.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the chat UI state machine: typing animation, scroll
//!   tracking, speech narration, cancellation, and the [`core::chat_ui::ChatUi`]
//!   orchestrator that composes them. It also defines the message model, the
//!   tick schedulers, the configuration file, and the assistant and
//!   chat-history collaborators.
//! - [`ui`] runs a line-based terminal chat loop that drives `ChatUi` from
//!   stdin, scheduler ticks, speech events and assistant replies.
//! - [`utils`] provides the platform adapters (system clipboard, command-line
//!   speech engines) and logging setup.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod cli;
pub mod core;
pub mod ui;
pub mod utils;
