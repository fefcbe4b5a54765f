//! Refresh bookkeeping: the in-progress flag and the queue of waiters.

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::ApiError;
use crate::ports::HttpClientError;

/// Outcome delivered to a queued request: the new access token, or the
/// error the refresh failed with.
pub type RefreshOutcome = Result<String, ApiError>;

/// A request parked until the running refresh completes.
///
/// The request descriptor stays with the suspended caller; only the
/// completion half travels through the queue.
#[derive(Debug)]
pub struct PendingRequest {
    completion: oneshot::Sender<RefreshOutcome>,
}

impl PendingRequest {
    fn resolve(self, outcome: RefreshOutcome) {
        // The receiver is gone if the caller stopped waiting.
        let _ = self.completion.send(outcome);
    }
}

/// What a caller that hit an expired token must do next.
#[derive(Debug)]
pub enum RefreshRole {
    /// No refresh was running; this caller now owns the attempt.
    Leader,
    /// A refresh is running; await its outcome.
    Follower(oneshot::Receiver<RefreshOutcome>),
}

/// In-progress flag plus the ordered queue of requests waiting on it.
///
/// The queue is non-empty only while `in_progress` is set, and both are
/// reset together by [`RefreshState::complete`].
#[derive(Debug, Default)]
pub struct RefreshState {
    in_progress: bool,
    queue: Vec<PendingRequest>,
}

impl RefreshState {
    /// Creates an idle state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            in_progress: false,
            queue: Vec::new(),
        }
    }

    /// Tests and sets the flag in one step: the first caller leads, every
    /// later caller is queued until [`RefreshState::complete`] runs.
    pub fn begin(&mut self) -> RefreshRole {
        if self.in_progress {
            let (completion, outcome) = oneshot::channel();
            self.queue.push(PendingRequest { completion });
            RefreshRole::Follower(outcome)
        } else {
            self.in_progress = true;
            RefreshRole::Leader
        }
    }

    /// Delivers `outcome` to every queued request in enqueue order, then
    /// clears the flag. Returns how many requests were waiting.
    pub fn complete(&mut self, outcome: &RefreshOutcome) -> usize {
        let waiting = std::mem::take(&mut self.queue);
        let count = waiting.len();
        for pending in waiting {
            pending.resolve(outcome.clone());
        }
        self.in_progress = false;
        count
    }

    /// True while an attempt is running.
    #[must_use]
    pub const fn is_refreshing(&self) -> bool {
        self.in_progress
    }

    /// Number of requests waiting on the running attempt.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Vec::len is not const in stable
    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}

/// Guard owned by the leader for the duration of one attempt.
///
/// [`RefreshAttempt::finish`] drains the queue with the real outcome. If the
/// leader is dropped first (its caller gave up, or the exchange panicked),
/// the guard drains it with `Cancelled` so no waiter is left hanging.
pub(crate) struct RefreshAttempt<'a> {
    state: &'a Mutex<RefreshState>,
    finished: bool,
}

impl<'a> RefreshAttempt<'a> {
    pub(crate) const fn new(state: &'a Mutex<RefreshState>) -> Self {
        Self {
            state,
            finished: false,
        }
    }

    /// Completes the attempt and returns the number of followers notified.
    pub(crate) fn finish(mut self, outcome: &RefreshOutcome) -> usize {
        self.finished = true;
        self.state.lock().complete(outcome)
    }
}

impl Drop for RefreshAttempt<'_> {
    fn drop(&mut self) {
        if !self.finished {
            let abandoned = Err(ApiError::Transport(HttpClientError::Cancelled));
            let count = self.state.lock().complete(&abandoned);
            tracing::warn!(queued = count, "Token refresh abandoned before completing");
        }
    }
}
