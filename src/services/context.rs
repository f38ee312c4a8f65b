use std::time::Duration;
use tokio::time::Instant;

/// Per-request correlation id and deadline, carried through every
/// service and account-client call.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    deadline: Instant,
}

impl RequestContext {
    pub fn new(request_id: impl Into<String>, timeout: Duration) -> Self {
        Self {
            request_id: request_id.into(),
            deadline: Instant::now() + timeout,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the deadline, zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}
