//! Bookkeeping for deferred calls.
//!
//! Every deferred request gets a slot keyed by a UUID handle. A slot moves
//! `PENDING -> {COMPLETED, FAILED}` exactly once; the terminal response is
//! published through a `watch` channel so the completion write is visible to
//! any reader that observes it. Finished slots expire after a TTL and are
//! evicted lazily, the same way an idempotency store drops stale keys.

use crate::error::{RpcError, RpcResult};
use parking_lot::Mutex;
use rpc_protocol_types::{HandleSnapshot, Response, Status};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Details recorded on a handle that was cancelled.
pub const CANCELLED_DETAILS: &str = "cancelled";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Queued,
    Running,
    Finished,
}

#[derive(Debug)]
struct SlotState {
    phase: Phase,
    finished_at: Option<Instant>,
}

/// What a cancellation request achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelOutcome {
    /// The call had not started and never will.
    NotStarted,
    /// The call is running; its eventual result will be discarded.
    Suppressed,
    /// The call had already reached a terminal state.
    AlreadyFinished,
}

impl CancelOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            CancelOutcome::NotStarted => "not_started",
            CancelOutcome::Suppressed => "suppressed",
            CancelOutcome::AlreadyFinished => "already_finished",
        }
    }
}

/// Completion slot for one deferred call.
#[derive(Debug)]
pub(crate) struct DeferredSlot {
    request_id: String,
    state: Mutex<SlotState>,
    outcome: watch::Sender<Option<Response>>,
}

impl DeferredSlot {
    fn new(request_id: String) -> Self {
        let (outcome, _) = watch::channel(None);
        Self {
            request_id,
            state: Mutex::new(SlotState {
                phase: Phase::Queued,
                finished_at: None,
            }),
            outcome,
        }
    }

    /// Claim the slot for execution. Returns false if it was cancelled first.
    pub(crate) fn begin(&self) -> bool {
        let mut state = self.state.lock();
        if state.phase == Phase::Queued {
            state.phase = Phase::Running;
            true
        } else {
            false
        }
    }

    /// Record the terminal response under the originating request id.
    /// Returns false if the slot already finished.
    pub(crate) fn publish(&self, response: Response) -> bool {
        let mut state = self.state.lock();
        self.finish(&mut state, response)
    }

    fn cancel(&self) -> CancelOutcome {
        let mut state = self.state.lock();
        let outcome = match state.phase {
            Phase::Queued => CancelOutcome::NotStarted,
            Phase::Running => CancelOutcome::Suppressed,
            Phase::Finished => return CancelOutcome::AlreadyFinished,
        };
        self.finish(
            &mut state,
            Response::error(Status::InternalError, Some(CANCELLED_DETAILS.to_string())),
        );
        outcome
    }

    fn finish(&self, state: &mut SlotState, response: Response) -> bool {
        if state.phase == Phase::Finished {
            return false;
        }
        state.phase = Phase::Finished;
        state.finished_at = Some(Instant::now());
        self.outcome
            .send_replace(Some(response.with_id(self.request_id.clone())));
        true
    }

    fn expired(&self, ttl: Duration, now: Instant) -> bool {
        let state = self.state.lock();
        matches!(state.finished_at, Some(at) if now.saturating_duration_since(at) >= ttl)
    }

    fn snapshot(&self, handle: &str) -> HandleSnapshot {
        match self.outcome.borrow().clone() {
            Some(response) => HandleSnapshot::finished(handle, response),
            None => HandleSnapshot::pending(handle),
        }
    }
}

/// Table of outstanding and recently finished deferred calls.
#[derive(Debug, Clone)]
pub struct HandleTable {
    ttl: Duration,
    slots: Arc<Mutex<HashMap<String, Arc<DeferredSlot>>>>,
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl HandleTable {
    /// Finished handles are kept for `ttl` after completion.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a fresh pending handle for the request `request_id`.
    pub(crate) fn open(&self, request_id: &str) -> (String, Arc<DeferredSlot>) {
        self.sweep();
        let handle = uuid::Uuid::new_v4().to_string();
        let slot = Arc::new(DeferredSlot::new(request_id.to_string()));
        self.slots.lock().insert(handle.clone(), slot.clone());
        (handle, slot)
    }

    fn slot(&self, handle: &str) -> RpcResult<Arc<DeferredSlot>> {
        self.sweep();
        self.slots
            .lock()
            .get(handle)
            .cloned()
            .ok_or_else(|| RpcError::UnknownHandle(handle.to_string()))
    }

    /// Current state of `handle` without waiting.
    pub fn poll(&self, handle: &str) -> RpcResult<HandleSnapshot> {
        Ok(self.slot(handle)?.snapshot(handle))
    }

    /// Wait until `handle` reaches a terminal state and return its response.
    pub async fn wait(&self, handle: &str) -> RpcResult<Response> {
        let slot = self.slot(handle)?;
        let mut rx = slot.outcome.subscribe();
        let outcome = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| RpcError::UnknownHandle(handle.to_string()))?;
        outcome
            .clone()
            .ok_or_else(|| RpcError::UnknownHandle(handle.to_string()))
    }

    /// Cancel `handle`. A queued call is never started; a running call
    /// finishes but its result is not published.
    pub fn cancel(&self, handle: &str) -> RpcResult<CancelOutcome> {
        Ok(self.slot(handle)?.cancel())
    }

    /// Drop `handle` regardless of its state. Returns false if it was unknown.
    pub fn forget(&self, handle: &str) -> bool {
        self.slots.lock().remove(handle).is_some()
    }

    /// Evict finished handles older than the TTL. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let mut slots = self.slots.lock();
        let before = slots.len();
        slots.retain(|_, slot| !slot.expired(self.ttl, now));
        before - slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
