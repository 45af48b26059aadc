//! Shared fakes for unit tests. Each fake is a cheap handle over shared
//! state so a test can keep one copy while the code under test owns another.

use std::cell::RefCell;
use std::rc::Rc;

use crate::core::chat_ui::{ChatPlatform, ChatUi, ChatUiSettings};
use crate::core::message::{Message, MessageKey, Role};
use crate::core::scheduler::ManualScheduler;
use crate::core::scroll::{ScrollBehavior, ScrollMetrics, ScrollViewport};
use crate::core::speech::{SpeechEngine, SpeechError, Utterance, Voice};
use crate::utils::clipboard::{Clipboard, ClipboardError};

#[derive(Debug)]
struct ViewportState {
    metrics: ScrollMetrics,
    scrolls: Vec<ScrollBehavior>,
}

#[derive(Debug, Clone)]
pub struct FakeViewport {
    state: Rc<RefCell<ViewportState>>,
}

impl FakeViewport {
    /// Starts scrolled to the very bottom of a 1000px transcript.
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(ViewportState {
                metrics: ScrollMetrics::new(500.0, 1000.0, 500.0),
                scrolls: Vec::new(),
            })),
        }
    }

    pub fn set_metrics(&self, metrics: ScrollMetrics) {
        self.state.borrow_mut().metrics = metrics;
    }

    pub fn scroll_calls(&self) -> usize {
        self.state.borrow().scrolls.len()
    }

    pub fn last_behavior(&self) -> Option<ScrollBehavior> {
        self.state.borrow().scrolls.last().copied()
    }
}

impl ScrollViewport for FakeViewport {
    fn metrics(&self) -> ScrollMetrics {
        self.state.borrow().metrics
    }

    fn scroll_end_into_view(&mut self, behavior: ScrollBehavior) {
        self.state.borrow_mut().scrolls.push(behavior);
    }
}

#[derive(Debug, Default)]
struct SpeechEngineState {
    voices: Vec<Voice>,
    spoken: Vec<Utterance>,
    cancel_calls: usize,
    fail: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FakeSpeechEngine {
    state: Rc<RefCell<SpeechEngineState>>,
}

impl FakeSpeechEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine that refuses every utterance.
    pub fn failing() -> Self {
        let engine = Self::default();
        engine.state.borrow_mut().fail = true;
        engine
    }

    pub fn with_voices(voices: Vec<Voice>) -> Self {
        let engine = Self::default();
        engine.state.borrow_mut().voices = voices;
        engine
    }

    pub fn spoken(&self) -> Vec<Utterance> {
        self.state.borrow().spoken.clone()
    }

    pub fn cancel_calls(&self) -> usize {
        self.state.borrow().cancel_calls
    }
}

impl SpeechEngine for FakeSpeechEngine {
    fn voices(&self) -> Vec<Voice> {
        self.state.borrow().voices.clone()
    }

    fn speak(&mut self, utterance: Utterance) -> Result<(), SpeechError> {
        let mut state = self.state.borrow_mut();
        if state.fail {
            return Err(SpeechError::Unavailable("fake engine offline".into()));
        }
        state.spoken.push(utterance);
        Ok(())
    }

    fn cancel(&mut self) {
        self.state.borrow_mut().cancel_calls += 1;
    }
}

#[derive(Debug, Default)]
struct ClipboardState {
    copied: Vec<String>,
    fail: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FakeClipboard {
    state: Rc<RefCell<ClipboardState>>,
}

impl FakeClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let clipboard = Self::default();
        clipboard.state.borrow_mut().fail = true;
        clipboard
    }

    pub fn copied(&self) -> Vec<String> {
        self.state.borrow().copied.clone()
    }
}

impl Clipboard for FakeClipboard {
    fn copy(&mut self, text: &str) -> Result<(), ClipboardError> {
        let mut state = self.state.borrow_mut();
        if state.fail {
            return Err(ClipboardError::NoBackend("fake clipboard offline".into()));
        }
        state.copied.push(text.to_string());
        Ok(())
    }
}

/// Test-side handles onto the fakes owned by a [`ChatUi`].
pub struct TestPlatform {
    pub scheduler: ManualScheduler,
    pub speech: FakeSpeechEngine,
    pub viewport: FakeViewport,
    pub clipboard: FakeClipboard,
}

impl TestPlatform {
    pub fn new() -> Self {
        Self {
            scheduler: ManualScheduler::new(),
            speech: FakeSpeechEngine::new(),
            viewport: FakeViewport::new(),
            clipboard: FakeClipboard::new(),
        }
    }

    pub fn build(&self) -> ChatUi {
        ChatUi::new(
            ChatUiSettings::default(),
            ChatPlatform {
                scheduler: Box::new(self.scheduler.clone()),
                speech: Box::new(self.speech.clone()),
                viewport: Box::new(self.viewport.clone()),
                clipboard: Box::new(self.clipboard.clone()),
            },
        )
    }

    /// Feeds every pending tick back into `ui` until the scheduler is idle.
    pub fn run_ticks(&self, ui: &mut ChatUi) {
        while let Some(id) = self.scheduler.next_tick() {
            ui.on_tick(id);
        }
    }
}

pub fn create_test_chat_ui() -> (ChatUi, TestPlatform) {
    let platform = TestPlatform::new();
    let ui = platform.build();
    (ui, platform)
}

pub fn create_test_message(role: Role, content: &str, timestamp: i64) -> Message {
    Message::new(role, content, MessageKey(timestamp))
}
