//! The "stop everything" path.
//!
//! Each assistant request gets its own [`CancellationToken`] and a
//! [`RequestId`]. The id lets the orchestrator recognize a reply that lands
//! after the user already gave up on it.

use std::fmt;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::message::MessageKey;
use crate::core::scheduler::TickScheduler;
use crate::core::speech::{SpeechEngine, SpeechNarrator};
use crate::core::typing::TypingAnimator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request#{}", self.0)
    }
}

/// What a call to [`CancellationController::stop_all`] actually stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StopReport {
    pub typing: Option<MessageKey>,
    pub speech: bool,
    pub request: Option<RequestId>,
}

impl StopReport {
    pub fn is_empty(&self) -> bool {
        self.typing.is_none() && !self.speech && self.request.is_none()
    }
}

#[derive(Debug, Default)]
pub struct CancellationController {
    next_id: u64,
    in_flight: Option<(RequestId, CancellationToken)>,
}

impl CancellationController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a fresh token for a new request, cancelling the previous one.
    pub fn begin(&mut self) -> (CancellationToken, RequestId) {
        self.abort();
        self.next_id += 1;
        let id = RequestId(self.next_id);
        let token = CancellationToken::new();
        self.in_flight = Some((id, token.clone()));
        debug!(%id, "request started");
        (token, id)
    }

    pub fn in_flight(&self) -> Option<RequestId> {
        self.in_flight.as_ref().map(|(id, _)| *id)
    }

    pub fn is_current(&self, id: RequestId) -> bool {
        self.in_flight() == Some(id)
    }

    /// Releases the token of a request that completed on its own.
    pub fn finish(&mut self, id: RequestId) -> bool {
        if !self.is_current(id) {
            return false;
        }
        self.in_flight = None;
        true
    }

    /// Cancels the in-flight request, if any.
    pub fn abort(&mut self) -> Option<RequestId> {
        let (id, token) = self.in_flight.take()?;
        token.cancel();
        debug!(%id, "request aborted");
        Some(id)
    }

    /// Stops typing (showing the interrupted message in full), speech, and
    /// the in-flight request, in that order. Safe to call at any time.
    pub fn stop_all(
        &mut self,
        typing: &mut TypingAnimator,
        scheduler: &mut dyn TickScheduler,
        narrator: &mut SpeechNarrator,
        engine: &mut dyn SpeechEngine,
    ) -> StopReport {
        StopReport {
            typing: typing.cancel(scheduler),
            speech: narrator.stop(engine),
            request: self.abort(),
        }
    }
}
