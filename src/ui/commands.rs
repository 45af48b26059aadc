//! Slash commands understood by the chat prompt.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Cancel the pending reply, finish the animation and silence speech.
    Stop,
    /// Read the latest assistant reply aloud.
    Speak,
    /// Copy the latest assistant reply.
    Copy,
    /// Jump back to the newest message.
    Bottom,
    Sidebar,
    Share,
    /// Ask about a medication photo.
    Image { url: String, text: String },
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputLine {
    Empty,
    Message(String),
    Command(ChatCommand),
    /// A slash command that needs arguments it did not get.
    Usage(&'static str),
}

pub struct CommandUsage {
    pub syntax: &'static str,
    pub description: &'static str,
}

pub const COMMANDS: &[CommandUsage] = &[
    CommandUsage {
        syntax: "/stop",
        description: "Stop the reply and any speech",
    },
    CommandUsage {
        syntax: "/speak",
        description: "Read the latest reply aloud",
    },
    CommandUsage {
        syntax: "/copy",
        description: "Copy the latest reply to the clipboard",
    },
    CommandUsage {
        syntax: "/bottom",
        description: "Jump to the newest message",
    },
    CommandUsage {
        syntax: "/image <url> [question]",
        description: "Ask about a photo of a medication",
    },
    CommandUsage {
        syntax: "/sidebar",
        description: "List saved chats",
    },
    CommandUsage {
        syntax: "/share",
        description: "Print this chat as shareable text",
    },
    CommandUsage {
        syntax: "/help",
        description: "Show this list",
    },
    CommandUsage {
        syntax: "/quit",
        description: "Save and leave",
    },
];

const DEFAULT_IMAGE_QUESTION: &str = "What medication is this and how is it taken?";

/// Classifies a line typed at the prompt. Unknown slash words are sent as
/// ordinary messages so dosages like "1/2 tablet" are never swallowed.
pub fn parse_input(input: &str) -> InputLine {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return InputLine::Empty;
    }
    let Some(rest) = trimmed.strip_prefix('/') else {
        return InputLine::Message(trimmed.to_string());
    };

    let mut parts = rest.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or("");
    let args = parts.next().unwrap_or("").trim();

    let command = match name {
        "stop" => ChatCommand::Stop,
        "speak" | "read" => ChatCommand::Speak,
        "copy" => ChatCommand::Copy,
        "bottom" => ChatCommand::Bottom,
        "sidebar" | "chats" => ChatCommand::Sidebar,
        "share" => ChatCommand::Share,
        "help" => ChatCommand::Help,
        "quit" | "exit" => ChatCommand::Quit,
        "image" => {
            let mut image_parts = args.splitn(2, char::is_whitespace);
            let url = image_parts.next().unwrap_or("");
            if url.is_empty() {
                return InputLine::Usage("/image <url> [question]");
            }
            let text = image_parts
                .next()
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .unwrap_or(DEFAULT_IMAGE_QUESTION);
            ChatCommand::Image {
                url: url.to_string(),
                text: text.to_string(),
            }
        }
        _ => return InputLine::Message(trimmed.to_string()),
    };
    InputLine::Command(command)
}

pub fn help_text() -> String {
    let width = COMMANDS
        .iter()
        .map(|usage| usage.syntax.len())
        .max()
        .unwrap_or(0);
    let mut text = String::from("Commands:\n");
    for usage in COMMANDS {
        text.push_str(&format!(
            "  {:width$}  {}\n",
            usage.syntax,
            usage.description,
            width = width
        ));
    }
    text
}
