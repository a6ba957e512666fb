use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender};
use echovoice_foundation::RecorderError;
use echovoice_store::StoredClip;
use parking_lot::RwLock;
use tracing::{debug, info};

/// Externally observable lifecycle of the recorder.
///
/// `Completed` and `Error` are terminal for the clip that produced them,
/// not for the session: while `Completed`, the pipeline keeps listening
/// and the next utterance moves the state back to `Recording`.
#[derive(Debug, Clone)]
pub enum RecorderState {
    Idle,
    Preparing,
    Listening,
    Recording,
    Processing,
    Completed(StoredClip),
    Error(Arc<RecorderError>),
}

impl RecorderState {
    /// States in which `start()` is a no-op because a session is already
    /// being brought up or is running.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Preparing | Self::Listening | Self::Recording | Self::Processing
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Preparing => "preparing",
            Self::Listening => "listening",
            Self::Recording => "recording",
            Self::Processing => "processing",
            Self::Completed(_) => "completed",
            Self::Error(_) => "error",
        }
    }
}

struct Inner {
    state: RwLock<RecorderState>,
    tx: Sender<RecorderState>,
    rx: Receiver<RecorderState>,
}

/// Shared, validated view of the recorder state. Cheap to clone; every
/// clone observes and drives the same state machine.
#[derive(Clone)]
pub struct StateHandle {
    inner: Arc<Inner>,
}

impl StateHandle {
    pub fn new() -> Self {
        let (tx, rx) = bounded(64);
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(RecorderState::Idle),
                tx,
                rx,
            }),
        }
    }

    pub fn current(&self) -> RecorderState {
        self.inner.state.read().clone()
    }

    /// Receiver for state-change notifications. Slow subscribers lose the
    /// oldest updates rather than blocking the pipeline.
    pub fn subscribe(&self) -> Receiver<RecorderState> {
        self.inner.rx.clone()
    }

    /// Apply a transition if the state machine allows it. Invalid
    /// transitions are rejected and logged, never applied.
    pub fn transition(&self, new: RecorderState) -> bool {
        let mut guard = self.inner.state.write();
        if !Self::is_valid(&guard, &new) {
            // Expected when a clip finishes persisting after the next
            // utterance already moved the session back to Recording.
            debug!(
                from = guard.name(),
                to = new.name(),
                "rejecting state transition"
            );
            return false;
        }
        debug!(from = guard.name(), to = new.name(), "state transition");
        *guard = new.clone();
        drop(guard);
        self.publish(new);
        true
    }

    /// Unconditional return to `Idle`. `stop()` must succeed from any
    /// state, so this bypasses transition validation.
    pub fn force_idle(&self) {
        let mut guard = self.inner.state.write();
        if matches!(*guard, RecorderState::Idle) {
            return;
        }
        info!(from = guard.name(), "forcing state to idle");
        *guard = RecorderState::Idle;
        drop(guard);
        self.publish(RecorderState::Idle);
    }

    fn publish(&self, state: RecorderState) {
        if self.inner.tx.try_send(state).is_err() {
            // Channel full: drop one stale update to make room.
            let _ = self.inner.rx.try_recv();
            let _ = self.inner.tx.try_send(self.current());
        }
    }

    fn is_valid(from: &RecorderState, to: &RecorderState) -> bool {
        use RecorderState::*;
        matches!(
            (from, to),
            (Idle, Preparing)
                // A fresh start() is legal once the previous session has
                // resolved, whether it saved a clip or failed.
                | (Completed(_), Preparing)
                | (Error(_), Preparing)
                | (Preparing, Listening)
                | (Listening, Recording)
                | (Recording, Processing)
                | (Processing, Completed(_))
                // The pipeline keeps classifying while a clip is being
                // persisted, so the next utterance can begin from either
                // Processing or Completed.
                | (Processing, Recording)
                | (Completed(_), Recording)
                | (Preparing, Error(_))
                | (Listening, Error(_))
                | (Recording, Error(_))
                | (Processing, Error(_))
                | (Completed(_), Error(_))
        )
    }
}

impl Default for StateHandle {
    fn default() -> Self {
        Self::new()
    }
}
