use std::cell::Cell;
use std::rc::Rc;

use tracing::trace;

use crate::core::scroll::{ScrollBehavior, ScrollMetrics, ScrollViewport};

const DEFAULT_ROWS: f64 = 24.0;

/// A line-oriented terminal: output is appended and the terminal keeps the
/// cursor on the last line, so the view always sits at the end of the
/// transcript. Heights are measured in printed lines. Clones share the
/// line counter, so the printer can keep one while the chat UI owns another.
#[derive(Debug, Clone)]
pub struct TerminalViewport {
    rows: f64,
    printed_lines: Rc<Cell<f64>>,
}

impl TerminalViewport {
    pub fn new() -> Self {
        let rows = std::env::var("LINES")
            .ok()
            .and_then(|value| value.parse::<f64>().ok())
            .filter(|rows| *rows > 0.0)
            .unwrap_or(DEFAULT_ROWS);
        Self {
            rows,
            printed_lines: Rc::new(Cell::new(0.0)),
        }
    }

    pub fn record_lines(&self, lines: usize) {
        self.printed_lines.set(self.printed_lines.get() + lines as f64);
    }
}

impl Default for TerminalViewport {
    fn default() -> Self {
        Self::new()
    }
}

impl ScrollViewport for TerminalViewport {
    fn metrics(&self) -> ScrollMetrics {
        let scroll_height = self.printed_lines.get().max(self.rows);
        ScrollMetrics::new(scroll_height - self.rows, scroll_height, self.rows)
    }

    fn scroll_end_into_view(&mut self, behavior: ScrollBehavior) {
        trace!(?behavior, "terminal already follows the newest line");
    }
}
