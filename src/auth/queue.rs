// Pending request queue
// Requests that failed with 401 wait here, in arrival order, for the in-flight refresh

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::error::{ApiError, TransportError};
use crate::request::{ApiRequest, ApiResponse};

/// How an in-flight refresh ended for the requests waiting on it
#[derive(Debug, Clone)]
pub enum RefreshFailure {
    Rejected(String),
    TimedOut(Duration),
}

impl From<RefreshFailure> for ApiError {
    fn from(failure: RefreshFailure) -> Self {
        match failure {
            RefreshFailure::Rejected(reason) => ApiError::ReauthenticationRequired(reason),
            RefreshFailure::TimedOut(after) => ApiError::RefreshTimeout(after),
        }
    }
}

/// Continuation handed to a waiting request when the queue drains
pub enum Resumption {
    /// Outcome of the retry sent with the refreshed credential
    Retried(Result<ApiResponse, TransportError>),
    /// Refresh failed; the request is rejected without being retried
    Abandoned(RefreshFailure),
}

/// A request waiting for a fresh credential
pub struct PendingRequest {
    pub id: u64,
    pub request: ApiRequest,
    pub resume: oneshot::Sender<Resumption>,
}

impl PendingRequest {
    /// The waiter has gone away (future dropped)
    pub fn is_abandoned(&self) -> bool {
        self.resume.is_closed()
    }
}

/// FIFO of pending requests
#[derive(Default)]
pub struct PendingQueue {
    entries: VecDeque<PendingRequest>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, pending: PendingRequest) {
        self.entries.push_back(pending);
    }

    /// Withdraw a request. Returns false if it was already drained.
    pub fn remove(&mut self, id: u64) -> bool {
        match self.entries.iter().position(|p| p.id == id) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Ids in the order they will be resumed
    pub fn ids(&self) -> Vec<u64> {
        self.entries.iter().map(|p| p.id).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Take every entry, oldest first, leaving the queue empty
    pub fn take_all(&mut self) -> VecDeque<PendingRequest> {
        std::mem::take(&mut self.entries)
    }
}
