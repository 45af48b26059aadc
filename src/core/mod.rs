pub mod assistant;
pub mod cancellation;
pub mod chat_history;
pub mod chat_ui;
pub mod config;
pub mod constants;
pub mod message;
pub mod scheduler;
pub mod scroll;
pub mod speech;
pub mod typing;
