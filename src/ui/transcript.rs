//! Line-oriented rendering of the conversation.
//!
//! Whole messages are printed at once. A reply being typed is printed
//! incrementally: each frame writes only the part of the displayed text that
//! is not on screen yet.

use std::io::{self, Write};

use crate::core::message::{Message, MessageKey, Role};
use crate::ui::viewport::TerminalViewport;

fn label(role: Role) -> &'static str {
    match role {
        Role::User => "You",
        Role::Assistant => "MediScan",
    }
}

#[derive(Debug, Clone, Copy)]
struct InProgress {
    key: MessageKey,
    printed: usize,
}

pub struct TranscriptPrinter<W: Write> {
    out: W,
    viewport: Option<TerminalViewport>,
    in_progress: Option<InProgress>,
}

impl<W: Write> TranscriptPrinter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            viewport: None,
            in_progress: None,
        }
    }

    /// Reports printed line counts to `viewport`.
    pub fn with_viewport(mut self, viewport: TerminalViewport) -> Self {
        self.viewport = Some(viewport);
        self
    }

    pub fn typing_key(&self) -> Option<MessageKey> {
        self.in_progress.map(|progress| progress.key)
    }

    fn write_tracked(&mut self, text: &str) -> io::Result<()> {
        self.out.write_all(text.as_bytes())?;
        if let Some(viewport) = &self.viewport {
            viewport.record_lines(text.matches('\n').count());
        }
        Ok(())
    }

    pub fn print_message(&mut self, message: &Message) -> io::Result<()> {
        let mut block = format!("{}: {}\n", label(message.role), message.content);
        if let Some(url) = &message.image_url {
            block.push_str(&format!("  [image: {url}]\n"));
        }
        self.write_tracked(&block)?;
        self.out.flush()
    }

    /// Prints the label of a reply whose text will arrive frame by frame.
    pub fn begin_reply(&mut self, key: MessageKey) -> io::Result<()> {
        self.in_progress = Some(InProgress { key, printed: 0 });
        self.write_tracked(&format!("{}: ", label(Role::Assistant)))?;
        self.out.flush()
    }

    /// Writes whatever part of `displayed` is new since the last frame.
    pub fn show_progress(&mut self, key: MessageKey, displayed: &str) -> io::Result<()> {
        let Some(progress) = self.in_progress else {
            return Ok(());
        };
        if progress.key != key || displayed.len() <= progress.printed {
            return Ok(());
        }
        let Some(delta) = displayed.get(progress.printed..) else {
            return Ok(());
        };
        self.write_tracked(delta)?;
        self.in_progress = Some(InProgress {
            key,
            printed: displayed.len(),
        });
        self.out.flush()
    }

    /// Completes the reply on screen with the rest of `full` and ends the
    /// line.
    pub fn finish_reply(&mut self, key: MessageKey, full: &str) -> io::Result<()> {
        match self.in_progress {
            Some(progress) if progress.key == key => {
                self.in_progress = None;
                let rest = full.get(progress.printed..).unwrap_or_default();
                self.write_tracked(&format!("{rest}\n"))?;
                self.out.flush()
            }
            _ => Ok(()),
        }
    }

    pub fn notice(&mut self, text: &str) -> io::Result<()> {
        // A notice never lands in the middle of a reply line.
        if self.in_progress.is_some() {
            self.write_tracked("\n")?;
        }
        self.write_tracked(&format!("  · {text}\n"))?;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
