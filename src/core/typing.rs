//! Typewriter reveal of finished assistant replies.
//!
//! The reply has already arrived in full when the animation starts; this is
//! a presentation effect only. One animation runs at a time across the whole
//! conversation, and whatever stops it, the message ends up fully visible.

use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

use crate::core::message::{Message, MessageKey};
use crate::core::scheduler::{TickScheduler, TimerId};

/// Partial text currently shown for each animated message.
///
/// A message that is not animating either has no entry or maps to its full
/// content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayedTextMap {
    entries: HashMap<MessageKey, String>,
}

impl DisplayedTextMap {
    pub fn get(&self, key: MessageKey) -> Option<&str> {
        self.entries.get(&key).map(String::as_str)
    }

    /// What the screen should render for `message`.
    pub fn text_for<'a>(&'a self, message: &'a Message) -> &'a str {
        self.get(message.timestamp).unwrap_or(&message.content)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MessageKey, &str)> {
        self.entries.iter().map(|(k, v)| (*k, v.as_str()))
    }

    fn set(&mut self, key: MessageKey, text: &str) {
        let entry = self.entries.entry(key).or_default();
        entry.clear();
        entry.push_str(text);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Stale timer, or no animation running.
    Ignored,
    /// One more character of the message became visible.
    Advanced(MessageKey),
    /// The last character was revealed and the timer released.
    Finished(MessageKey),
}

#[derive(Debug)]
struct ActiveTyping {
    key: MessageKey,
    timer: TimerId,
    content: String,
    /// Byte offset just past each grapheme, so slicing never splits one.
    boundaries: Vec<usize>,
    revealed: usize,
}

impl ActiveTyping {
    fn visible(&self) -> &str {
        match self.revealed {
            0 => "",
            n => &self.content[..self.boundaries[n - 1]],
        }
    }

    fn is_complete(&self) -> bool {
        self.revealed >= self.boundaries.len()
    }
}

#[derive(Debug, Default)]
enum TypingState {
    #[default]
    Idle,
    Active(ActiveTyping),
}

#[derive(Debug)]
pub struct TypingAnimator {
    tick: Duration,
    displayed: DisplayedTextMap,
    state: TypingState,
}

impl TypingAnimator {
    pub fn new(tick: Duration) -> Self {
        Self {
            tick,
            displayed: DisplayedTextMap::default(),
            state: TypingState::Idle,
        }
    }

    pub fn displayed(&self) -> &DisplayedTextMap {
        &self.displayed
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, TypingState::Active(_))
    }

    pub fn active_key(&self) -> Option<MessageKey> {
        match &self.state {
            TypingState::Active(active) => Some(active.key),
            TypingState::Idle => None,
        }
    }

    pub fn active_timer(&self) -> Option<TimerId> {
        match &self.state {
            TypingState::Active(active) => Some(active.timer),
            TypingState::Idle => None,
        }
    }

    /// Starts revealing `content` under `key`, finishing any animation that
    /// is still running first. Returns false when there is nothing to
    /// animate (empty content); the entry is still recorded.
    pub fn start_typing(
        &mut self,
        scheduler: &mut dyn TickScheduler,
        key: MessageKey,
        content: &str,
    ) -> bool {
        self.cancel(scheduler);

        self.displayed.set(key, "");
        if content.is_empty() {
            return false;
        }

        let boundaries: Vec<usize> = content
            .grapheme_indices(true)
            .map(|(offset, grapheme)| offset + grapheme.len())
            .collect();
        let timer = scheduler.schedule(self.tick);
        debug!(%key, %timer, graphemes = boundaries.len(), "typing started");

        self.state = TypingState::Active(ActiveTyping {
            key,
            timer,
            content: content.to_string(),
            boundaries,
            revealed: 0,
        });
        true
    }

    pub fn on_tick(&mut self, scheduler: &mut dyn TickScheduler, timer: TimerId) -> TickOutcome {
        let TypingState::Active(active) = &mut self.state else {
            return TickOutcome::Ignored;
        };
        if active.timer != timer {
            return TickOutcome::Ignored;
        }

        active.revealed += 1;
        self.displayed.set(active.key, active.visible());

        if !active.is_complete() {
            return TickOutcome::Advanced(active.key);
        }

        let key = active.key;
        scheduler.cancel(timer);
        self.state = TypingState::Idle;
        debug!(%key, "typing finished");
        TickOutcome::Finished(key)
    }

    /// Stops the running animation and shows its message in full. Returns
    /// the key that was interrupted, if any.
    pub fn cancel(&mut self, scheduler: &mut dyn TickScheduler) -> Option<MessageKey> {
        let TypingState::Active(active) = std::mem::take(&mut self.state) else {
            return None;
        };
        scheduler.cancel(active.timer);
        self.displayed.set(active.key, &active.content);
        debug!(key = %active.key, revealed = active.revealed, "typing interrupted");
        Some(active.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constants::TYPING_TICK;
    use crate::core::scheduler::ManualScheduler;

    fn run_to_completion(animator: &mut TypingAnimator, scheduler: &mut ManualScheduler) -> Vec<String> {
        let mut frames = Vec::new();
        while let Some(id) = scheduler.next_tick() {
            let outcome = animator.on_tick(scheduler, id);
            if let TickOutcome::Advanced(key) | TickOutcome::Finished(key) = outcome {
                frames.push(animator.displayed().get(key).unwrap_or_default().to_string());
            }
        }
        frames
    }

    #[test]
    fn reveals_one_character_per_tick() {
        let mut scheduler = ManualScheduler::new();
        let mut animator = TypingAnimator::new(TYPING_TICK);
        let key = MessageKey(2000);
        let content = "It is a pain reliever.";

        assert!(animator.start_typing(&mut scheduler, key, content));
        assert_eq!(animator.displayed().get(key), Some(""));

        let frames = run_to_completion(&mut animator, &mut scheduler);
        assert_eq!(frames.len(), content.chars().count());
        assert_eq!(frames[0], "I");
        assert_eq!(frames[1], "It");
        assert_eq!(frames.last().map(String::as_str), Some(content));
        assert_eq!(animator.displayed().get(key), Some(content));
        assert!(!animator.is_active());
        assert_eq!(scheduler.active_timers(), 0);
        assert_eq!(scheduler.now(), TYPING_TICK * content.len() as u32);
    }

    #[test]
    fn never_splits_grapheme_clusters() {
        let mut scheduler = ManualScheduler::new();
        let mut animator = TypingAnimator::new(TYPING_TICK);
        let key = MessageKey(1);
        let content = "Take 💊 with wate\u{0301}r";

        animator.start_typing(&mut scheduler, key, content);
        let frames = run_to_completion(&mut animator, &mut scheduler);
        assert!(frames.iter().any(|f| f == "Take 💊"));
        assert_eq!(frames.last().map(String::as_str), Some(content));
        assert!(frames.iter().all(|f| content.starts_with(f.as_str())));
    }

    #[test]
    fn second_start_finalizes_the_first_and_keeps_one_timer() {
        let mut scheduler = ManualScheduler::new();
        let mut animator = TypingAnimator::new(TYPING_TICK);
        let first = MessageKey(10);
        let second = MessageKey(20);

        animator.start_typing(&mut scheduler, first, "first reply");
        let first_timer = animator.active_timer();
        for id in scheduler.advance(TYPING_TICK * 3) {
            animator.on_tick(&mut scheduler, id);
        }
        assert_eq!(animator.displayed().get(first), Some("fir"));

        animator.start_typing(&mut scheduler, second, "second");
        assert_eq!(scheduler.active_timers(), 1);
        assert_ne!(animator.active_timer(), first_timer);
        assert_eq!(animator.displayed().get(first), Some("first reply"));
        assert_eq!(animator.active_key(), Some(second));
    }

    #[test]
    fn stale_ticks_are_ignored() {
        let mut scheduler = ManualScheduler::new();
        let mut animator = TypingAnimator::new(TYPING_TICK);
        animator.start_typing(&mut scheduler, MessageKey(1), "abc");
        let stale = animator.active_timer().expect("timer");
        animator.start_typing(&mut scheduler, MessageKey(2), "xyz");

        assert_eq!(animator.on_tick(&mut scheduler, stale), TickOutcome::Ignored);
        assert_eq!(animator.displayed().get(MessageKey(2)), Some(""));
    }

    #[test]
    fn cancel_shows_full_content_and_is_idempotent() {
        let mut scheduler = ManualScheduler::new();
        let mut animator = TypingAnimator::new(TYPING_TICK);
        let key = MessageKey(7);
        animator.start_typing(&mut scheduler, key, "Ibuprofen is an NSAID.");
        if let Some(id) = scheduler.next_tick() {
            animator.on_tick(&mut scheduler, id);
        }

        assert_eq!(animator.cancel(&mut scheduler), Some(key));
        assert_eq!(animator.displayed().get(key), Some("Ibuprofen is an NSAID."));
        assert_eq!(scheduler.active_timers(), 0);
        assert_eq!(animator.cancel(&mut scheduler), None);
    }

    #[test]
    fn empty_content_does_not_schedule() {
        let mut scheduler = ManualScheduler::new();
        let mut animator = TypingAnimator::new(TYPING_TICK);
        assert!(!animator.start_typing(&mut scheduler, MessageKey(3), ""));
        assert_eq!(scheduler.active_timers(), 0);
        assert_eq!(animator.displayed().get(MessageKey(3)), Some(""));
    }

    #[test]
    fn text_for_falls_back_to_message_content() {
        let animator = TypingAnimator::new(TYPING_TICK);
        let message = Message::new(crate::core::message::Role::User, "hello", MessageKey(4));
        assert_eq!(animator.displayed().text_for(&message), "hello");
    }
}
