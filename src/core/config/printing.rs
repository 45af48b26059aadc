use crate::core::config::data::Config;

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

impl Config {
    pub fn print_all(&self) {
        println!("Current configuration:");
        println!("  ui.typing-tick-ms: {}", self.ui.typing_tick_ms);
        println!(
            "  ui.scroll-bottom-tolerance-px: {}",
            self.ui.scroll_bottom_tolerance_px
        );
        println!(
            "  ui.scroll-button-min-messages: {}",
            self.ui.scroll_button_min_messages
        );
        println!("  speech: {}", on_off(self.speech.enabled));
        println!("  speech.rate: {}", self.speech.rate);
        println!("  speech.pitch: {}", self.speech.pitch);
        println!("  speech.language: {}", self.speech.preferred_language);
        println!(
            "  speech.female-voice: {}",
            on_off(self.speech.prefer_female_voice)
        );
        match &self.speech.command {
            Some(command) => println!("  speech.command: {command}"),
            None => println!("  speech.command: (platform default)"),
        }
        println!("  assistant.base-url: {}", self.assistant.base_url);
        println!("  assistant.model: {}", self.assistant.model);
        match self.assistant.request_timeout_secs {
            Some(secs) => println!("  assistant.timeout-secs: {secs}"),
            None => println!("  assistant.timeout-secs: (none)"),
        }
    }
}
