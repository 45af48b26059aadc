//! Follow-the-tail scrolling for the transcript.
//!
//! New messages only pull the view down when the reader was already at the
//! bottom. Someone reading scrollback keeps their place and gets a
//! "jump to latest" control instead.

use tracing::debug;

use crate::core::constants::{SCROLL_BOTTOM_TOLERANCE_PX, SCROLL_BUTTON_MIN_MESSAGES};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl ScrollMetrics {
    pub fn new(scroll_top: f64, scroll_height: f64, client_height: f64) -> Self {
        Self {
            scroll_top,
            scroll_height,
            client_height,
        }
    }

    pub fn distance_from_bottom(&self) -> f64 {
        (self.scroll_height - self.scroll_top - self.client_height).abs()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollBehavior {
    Smooth,
    Instant,
}

/// The scrollable transcript container together with its end marker.
pub trait ScrollViewport {
    fn metrics(&self) -> ScrollMetrics;

    /// Brings the end-of-transcript marker into view.
    fn scroll_end_into_view(&mut self, behavior: ScrollBehavior);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollState {
    pub is_at_bottom: bool,
    pub show_scroll_button: bool,
}

impl Default for ScrollState {
    fn default() -> Self {
        Self {
            is_at_bottom: true,
            show_scroll_button: false,
        }
    }
}

#[derive(Debug)]
pub struct ScrollTracker {
    tolerance_px: f64,
    button_min_messages: usize,
    message_count: usize,
    state: ScrollState,
}

impl Default for ScrollTracker {
    fn default() -> Self {
        Self::new(SCROLL_BOTTOM_TOLERANCE_PX, SCROLL_BUTTON_MIN_MESSAGES)
    }
}

impl ScrollTracker {
    /// `tolerance_px` is capped at [`SCROLL_BOTTOM_TOLERANCE_PX`].
    pub fn new(tolerance_px: f64, button_min_messages: usize) -> Self {
        Self {
            tolerance_px: tolerance_px.clamp(0.0, SCROLL_BOTTOM_TOLERANCE_PX),
            button_min_messages,
            message_count: 0,
            state: ScrollState::default(),
        }
    }

    pub fn state(&self) -> ScrollState {
        self.state
    }

    pub fn is_at_bottom(&self) -> bool {
        self.state.is_at_bottom
    }

    pub fn show_scroll_button(&self) -> bool {
        self.state.show_scroll_button
    }

    pub fn message_count(&self) -> usize {
        self.message_count
    }

    pub fn on_scroll(&mut self, metrics: ScrollMetrics) {
        let is_at_bottom = metrics.distance_from_bottom() < self.tolerance_px;
        self.state = ScrollState {
            is_at_bottom,
            show_scroll_button: !is_at_bottom && self.message_count > self.button_min_messages,
        };
    }

    pub fn scroll_to_bottom(&self, viewport: &mut dyn ScrollViewport) {
        viewport.scroll_end_into_view(ScrollBehavior::Smooth);
    }

    /// Reacts to a change in transcript length. Returns true when the view
    /// was pulled to the bottom.
    pub fn on_message_count_changed(
        &mut self,
        new_count: usize,
        viewport: &mut dyn ScrollViewport,
    ) -> bool {
        let grew = new_count > self.message_count;
        self.message_count = new_count;
        if !grew {
            self.state.show_scroll_button =
                !self.state.is_at_bottom && new_count > self.button_min_messages;
            return false;
        }

        if self.state.is_at_bottom {
            debug!(new_count, "auto-scrolling to latest message");
            self.scroll_to_bottom(viewport);
            true
        } else {
            self.state.show_scroll_button = new_count > self.button_min_messages;
            false
        }
    }
}
