// Conversation continuation state.
//
// One shared `Link` per connection, cloned between the conversation thread,
// the session that spawned it, and the engine-side handle. It replaces a
// pile of sticky boolean flags with a single phase plus one optional
// transport-error cause; the continuation guard consulted before and after
// every blocking operation is a single comparison on that state.

use std::io;
use std::sync::{Arc, Mutex};

/// Where the conversation stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkPhase {
    /// Conversing normally.
    Running,
    /// Someone asked the conversation to wind down; blocking operations
    /// should return instead of retrying.
    Ending,
    /// The socket is closed and the thread is exiting or gone.
    Stopped,
}

#[derive(Debug)]
struct State {
    phase: LinkPhase,
    error: Option<io::Error>,
}

/// Shared continuation state for one conversation.
#[derive(Clone, Debug)]
pub struct Link {
    inner: Arc<Mutex<State>>,
}

impl Link {
    pub fn new() -> Self {
        Link {
            inner: Arc::new(Mutex::new(State {
                phase: LinkPhase::Running,
                error: None,
            })),
        }
    }

    /// The continuation guard: true iff the conversation is still running
    /// and no transport failure has been recorded.
    pub fn continue_conversation(&self) -> bool {
        let state = self.inner.lock().unwrap();
        state.phase == LinkPhase::Running && state.error.is_none()
    }

    /// Ask the conversation to wind down. Idempotent; never rewinds a
    /// stopped link.
    pub fn request_end(&self) {
        let mut state = self.inner.lock().unwrap();
        if state.phase == LinkPhase::Running {
            state.phase = LinkPhase::Ending;
        }
    }

    /// The conversation thread is done with the socket.
    pub fn mark_stopped(&self) {
        self.inner.lock().unwrap().phase = LinkPhase::Stopped;
    }

    /// Record a transport failure. The first cause wins; later failures
    /// during teardown are uninteresting.
    pub fn record_error(&self, err: io::Error) {
        let mut state = self.inner.lock().unwrap();
        if state.error.is_none() {
            state.error = Some(err);
        }
    }

    pub fn phase(&self) -> LinkPhase {
        self.inner.lock().unwrap().phase
    }

    pub fn error_cause(&self) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .error
            .as_ref()
            .map(|err| err.to_string())
    }
}

impl Default for Link {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_link_continues() {
        let link = Link::new();
        assert!(link.continue_conversation());
        assert_eq!(link.phase(), LinkPhase::Running);
    }

    #[test]
    fn request_end_trips_the_guard() {
        let link = Link::new();
        link.request_end();
        assert!(!link.continue_conversation());
        assert_eq!(link.phase(), LinkPhase::Ending);
    }

    #[test]
    fn recorded_error_trips_the_guard_and_sticks() {
        let link = Link::new();
        link.record_error(io::Error::new(io::ErrorKind::BrokenPipe, "first"));
        link.record_error(io::Error::other("second"));
        assert!(!link.continue_conversation());
        assert_eq!(link.error_cause().unwrap(), "first");
        // The phase itself is untouched; the error alone trips the guard.
        assert_eq!(link.phase(), LinkPhase::Running);
    }

    #[test]
    fn stop_is_terminal() {
        let link = Link::new();
        link.mark_stopped();
        link.request_end();
        assert_eq!(link.phase(), LinkPhase::Stopped);
    }

    #[test]
    fn clones_share_state() {
        let link = Link::new();
        let other = link.clone();
        other.request_end();
        assert!(!link.continue_conversation());
    }
}
