use std::sync::Arc;

use echovoice_foundation::RecorderError;
use echovoice_store::StoredClip;
use parking_lot::RwLock;

/// Callbacks for recorder lifecycle events. All methods default to no-ops
/// so implementors only override what they care about.
///
/// Callbacks fire from the pipeline task; keep them short and never call
/// back into the recorder from inside one.
pub trait RecorderListener: Send + Sync {
    /// Capture and classifier are up, the session is listening.
    fn on_ready(&self) {}

    /// Confirmed speech onset, an utterance is being buffered.
    fn on_recording_start(&self) {}

    /// A clip reached disk.
    fn on_recording_complete(&self, _clip: &StoredClip) {}

    /// The session failed. The recorder stays in the error state until
    /// explicitly restarted.
    fn on_error(&self, _error: &RecorderError) {}
}

/// Swappable listener slot shared between the recorder and its pipeline
/// task. `release()` clears it so no callback fires after teardown.
#[derive(Clone, Default)]
pub(crate) struct ListenerHandle {
    slot: Arc<RwLock<Option<Arc<dyn RecorderListener>>>>,
}

impl ListenerHandle {
    pub(crate) fn set(&self, listener: Arc<dyn RecorderListener>) {
        *self.slot.write() = Some(listener);
    }

    pub(crate) fn clear(&self) {
        *self.slot.write() = None;
    }

    fn get(&self) -> Option<Arc<dyn RecorderListener>> {
        self.slot.read().clone()
    }

    pub(crate) fn ready(&self) {
        if let Some(l) = self.get() {
            l.on_ready();
        }
    }

    pub(crate) fn recording_start(&self) {
        if let Some(l) = self.get() {
            l.on_recording_start();
        }
    }

    pub(crate) fn recording_complete(&self, clip: &StoredClip) {
        if let Some(l) = self.get() {
            l.on_recording_complete(clip);
        }
    }

    pub(crate) fn error(&self, error: &RecorderError) {
        if let Some(l) = self.get() {
            l.on_error(error);
        }
    }
}
