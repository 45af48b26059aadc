pub mod data;
pub mod io;
pub mod printing;

pub use data::{AssistantConfig, Config, SpeechConfig, UiConfig};
pub use io::ConfigError;
