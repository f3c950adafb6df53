//! Session management.
//!
//! One session is one client connection's worth of work. States run in order,
//! looping over images:
//!
//! ```text
//! AwaitCount -> AwaitOperation -> ( AwaitImageSize -> AwaitImageData -> Dispatch
//!     -> Collect -> Merge -> Respond )* -> Close
//! ```
//!
//! An image that fails to decode, fails in a worker, or fails to re-encode
//! jumps straight to the next image (or `Close`) without a response.

use crate::error::ServerError;
use std::net::SocketAddr;
use std::time::Instant;
use stripmill_core::OperationKind;
use uuid::Uuid;

/// Session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitCount,
    AwaitOperation,
    AwaitImageSize,
    AwaitImageData,
    Dispatch,
    Collect,
    Merge,
    Respond,
    Close,
}

impl SessionState {
    /// Returns whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;

        if next == Close {
            return true;
        }
        matches!(
            (self, next),
            (AwaitCount, AwaitOperation)
                | (AwaitOperation, AwaitImageSize)
                | (AwaitImageSize, AwaitImageData)
                | (AwaitImageData, Dispatch)
                | (Dispatch, Collect)
                | (Collect, Merge)
                | (Merge, Respond)
                // next image, after a response or a skipped image
                | (AwaitImageData, AwaitImageSize)
                | (Collect, AwaitImageSize)
                | (Merge, AwaitImageSize)
                | (Respond, AwaitImageSize)
        )
    }
}

/// What happened to one image of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutcome {
    /// A response frame of `bytes` payload bytes was written.
    Responded { bytes: usize },
    /// No response was written.
    Skipped { reason: String },
}

/// A client session.
pub struct Session {
    /// Unique session ID.
    pub id: String,

    /// Remote address.
    pub remote_addr: SocketAddr,

    state: SessionState,

    /// Number of images the client announced.
    image_count: u32,

    /// Operation for every image of the session.
    operation: Option<OperationKind>,

    /// Per-image outcomes, in arrival order.
    outcomes: Vec<ImageOutcome>,

    created_at: Instant,
}

impl Session {
    /// Creates a new session.
    pub fn new(remote_addr: SocketAddr) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            remote_addr,
            state: SessionState::AwaitCount,
            image_count: 0,
            operation: None,
            outcomes: Vec::new(),
            created_at: Instant::now(),
        }
    }

    /// Returns the session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Moves to `next`, rejecting transitions outside the state graph.
    pub fn set_state(&mut self, next: SessionState) -> Result<(), ServerError> {
        if !self.state.can_transition_to(next) {
            return Err(ServerError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    pub fn image_count(&self) -> u32 {
        self.image_count
    }

    pub fn set_image_count(&mut self, count: u32) {
        self.image_count = count;
    }

    pub fn operation(&self) -> Option<&OperationKind> {
        self.operation.as_ref()
    }

    /// Fixes the operation for the rest of the session.
    pub fn set_operation(&mut self, operation: OperationKind) {
        self.operation = Some(operation);
    }

    /// Records a written response.
    pub fn record_response(&mut self, bytes: usize) {
        self.outcomes.push(ImageOutcome::Responded { bytes });
    }

    /// Records a skipped image.
    pub fn record_skip(&mut self, reason: impl Into<String>) {
        self.outcomes.push(ImageOutcome::Skipped {
            reason: reason.into(),
        });
    }

    pub fn outcomes(&self) -> &[ImageOutcome] {
        &self.outcomes
    }

    pub fn responded_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ImageOutcome::Responded { .. }))
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes.len() - self.responded_count()
    }

    /// Returns the session age.
    pub fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn test_addr() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 12345)
    }

    #[test]
    fn test_session_creation() {
        let session = Session::new(test_addr());
        assert_eq!(session.state(), SessionState::AwaitCount);
        assert_eq!(session.image_count(), 0);
        assert!(session.operation().is_none());
        assert!(session.outcomes().is_empty());
    }

    #[test]
    fn test_full_image_cycle() {
        use SessionState::*;

        let mut session = Session::new(test_addr());
        for next in [
            AwaitOperation,
            AwaitImageSize,
            AwaitImageData,
            Dispatch,
            Collect,
            Merge,
            Respond,
            AwaitImageSize,
            AwaitImageData,
            Dispatch,
            Collect,
            Merge,
            Respond,
            Close,
        ] {
            session.set_state(next).unwrap();
        }
        assert_eq!(session.state(), Close);
    }

    #[test]
    fn test_skip_transitions() {
        use SessionState::*;

        // Decode failure skips to the next image
        assert!(AwaitImageData.can_transition_to(AwaitImageSize));
        // Worker failure skips to the next image
        assert!(Collect.can_transition_to(AwaitImageSize));
        // Zero images
        assert!(AwaitOperation.can_transition_to(Close));
    }

    #[test]
    fn test_invalid_transition() {
        let mut session = Session::new(test_addr());
        let result = session.set_state(SessionState::Dispatch);
        assert!(matches!(
            result,
            Err(ServerError::InvalidTransition {
                from: SessionState::AwaitCount,
                to: SessionState::Dispatch
            })
        ));
        // State unchanged
        assert_eq!(session.state(), SessionState::AwaitCount);
    }

    #[test]
    fn test_any_state_can_close() {
        let mut session = Session::new(test_addr());
        session.set_state(SessionState::AwaitOperation).unwrap();
        session.set_state(SessionState::Close).unwrap();
        assert_eq!(session.state(), SessionState::Close);
    }

    #[test]
    fn test_outcomes() {
        let mut session = Session::new(test_addr());
        session.set_image_count(3);
        session.set_operation(OperationKind::Blur);
        session.record_response(120);
        session.record_skip("decode failed");
        session.record_response(80);

        assert_eq!(session.responded_count(), 2);
        assert_eq!(session.skipped_count(), 1);
        assert_eq!(session.outcomes()[0], ImageOutcome::Responded { bytes: 120 });
        assert_eq!(session.operation(), Some(&OperationKind::Blur));
    }
}
