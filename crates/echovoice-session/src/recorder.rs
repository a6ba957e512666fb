use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use echovoice_audio::capture::{CaptureSource, CaptureStream, CpalCapture};
use echovoice_foundation::{RecorderError, VadError};
use echovoice_store::{ClipStore, StoredClip};
use echovoice_vad::config::VadConfig;
use echovoice_vad::energy_vad::EnergyVad;
use echovoice_vad::VadEngine;

use crate::config::RecorderConfig;
use crate::listener::{ListenerHandle, RecorderListener};
use crate::segmenter::{SegmentEvent, UtteranceSegmenter};
use crate::state::{RecorderState, StateHandle};

/// Builds a fresh classifier for each session. Sessions never share
/// classifier state.
pub type EngineFactory =
    Box<dyn Fn(&VadConfig) -> Result<Box<dyn VadEngine>, VadError> + Send + Sync>;

type SharedCapture = Arc<Mutex<Box<dyn CaptureSource>>>;

/// Push-to-listen recording engine.
///
/// `start()` brings up capture and classification and then runs hands-off:
/// confirmed utterances are segmented, encoded and persisted until `stop()`
/// or an unrecoverable failure. At most one session is active per recorder.
pub struct VoiceRecorder {
    config: RecorderConfig,
    state: StateHandle,
    listener: ListenerHandle,
    store: Arc<ClipStore>,
    capture: SharedCapture,
    engine_factory: EngineFactory,
    pipeline: Option<JoinHandle<()>>,
    cancel: Arc<AtomicBool>,
    last_clip: Arc<RwLock<Option<StoredClip>>>,
    released: bool,
}

impl VoiceRecorder {
    /// Recorder with the production capture and classifier backends.
    pub fn new(config: RecorderConfig) -> Self {
        let capture: Box<dyn CaptureSource> = Box::new(CpalCapture::new(config.capture_config()));
        let factory: EngineFactory =
            Box::new(|vad| EnergyVad::new(vad.clone()).map(|e| Box::new(e) as Box<dyn VadEngine>));
        Self::with_parts(config, capture, factory)
    }

    /// Recorder with injected capture and classifier, used by tests and
    /// by callers that bring their own backends.
    pub fn with_parts(
        config: RecorderConfig,
        capture: Box<dyn CaptureSource>,
        engine_factory: EngineFactory,
    ) -> Self {
        let store = Arc::new(ClipStore::new(
            config.store_dir.clone(),
            config.file_prefix.clone(),
        ));
        Self {
            config,
            state: StateHandle::new(),
            listener: ListenerHandle::default(),
            store,
            capture: Arc::new(Mutex::new(capture)),
            engine_factory,
            pipeline: None,
            cancel: Arc::new(AtomicBool::new(false)),
            last_clip: Arc::new(RwLock::new(None)),
            released: false,
        }
    }

    pub fn set_listener(&self, listener: Arc<dyn RecorderListener>) {
        self.listener.set(listener);
    }

    pub fn current_state(&self) -> RecorderState {
        self.state.current()
    }

    pub fn subscribe_state(&self) -> crossbeam_channel::Receiver<RecorderState> {
        self.state.subscribe()
    }

    /// Bring up a listening session. A no-op while a session is already
    /// active; fails fast when the classifier or the device cannot be
    /// initialized, leaving the recorder in the `Error` state.
    pub async fn start(&mut self) -> Result<(), Arc<RecorderError>> {
        if self.released {
            return Err(Arc::new(RecorderError::Unknown(
                "recorder has been released".into(),
            )));
        }
        if self.state.current().is_active() || self.pipeline_running() {
            debug!("start ignored, session already active");
            return Ok(());
        }
        self.pipeline = None;

        // Storage maintenance runs off the hot path; its outcome never
        // blocks or fails session bring-up.
        let store = self.store.clone();
        let retention = self.config.retention;
        tokio::task::spawn_blocking(move || {
            let by_age = store.cleanup_by_age(Duration::from_millis(retention.max_file_age_ms));
            let by_count = store.cleanup_by_count(retention.max_file_count);
            if by_age + by_count > 0 {
                info!(by_age, by_count, "startup retention pass evicted clips");
            }
        });

        self.state.transition(RecorderState::Preparing);

        let engine = match (self.engine_factory)(&self.config.vad) {
            Ok(engine) => engine,
            Err(e) => return Err(self.fail(e.into())),
        };

        // The lock guard must be released before `fail`, which stops the
        // capture source and takes the same lock.
        let start_result = self.capture.lock().start();
        let stream = match start_result {
            Ok(stream) => stream,
            Err(e) => return Err(self.fail(e.into())),
        };

        self.state.transition(RecorderState::Listening);
        self.listener.ready();
        info!(
            dir = %self.store.dir().display(),
            silence_ms = self.config.vad.silence_duration_ms,
            "listening session started"
        );

        let segmenter = UtteranceSegmenter::new(
            self.config.vad.sample_rate_hz,
            self.config.max_utterance_frames(),
        );
        self.cancel = Arc::new(AtomicBool::new(false));
        let ctx = PipelineCtx {
            state: self.state.clone(),
            listener: self.listener.clone(),
            store: self.store.clone(),
            last_clip: self.last_clip.clone(),
            capture: self.capture.clone(),
            cancel: self.cancel.clone(),
            max_file_count: self.config.retention.max_file_count,
        };
        self.pipeline = Some(tokio::spawn(run_pipeline(stream, engine, segmenter, ctx)));
        Ok(())
    }

    /// Tear the session down from any state. An in-flight utterance is
    /// finalized and persisted before the recorder returns to `Idle`.
    pub async fn stop(&mut self) {
        // Frames already buffered behind the stream are abandoned, not
        // classified; only the in-flight utterance is finalized.
        self.cancel.store(true, Ordering::SeqCst);
        self.capture.lock().stop();
        if let Some(handle) = self.pipeline.take() {
            if handle.await.is_err() {
                warn!("pipeline task panicked during shutdown");
            }
        }
        self.state.force_idle();
        info!("recorder stopped");
    }

    /// Restart listening after a clip completed or a session failed.
    /// A no-op in every other state.
    pub async fn resume_listening(&mut self) -> Result<(), Arc<RecorderError>> {
        if !matches!(
            self.state.current(),
            RecorderState::Completed(_) | RecorderState::Error(_)
        ) {
            return Ok(());
        }
        self.stop().await;
        self.start().await
    }

    /// Final teardown. The recorder is unusable afterwards and no
    /// listener callback fires again.
    pub async fn release(&mut self) {
        self.stop().await;
        self.listener.clear();
        self.released = true;
    }

    pub fn last_clip(&self) -> Option<StoredClip> {
        self.last_clip.read().clone()
    }

    /// Delete the most recently persisted clip. Returns `false` when
    /// there is none or the file is already gone.
    pub fn delete_last_clip(&self) -> bool {
        match self.last_clip.write().take() {
            Some(clip) => self.store.delete(&clip.path),
            None => false,
        }
    }

    /// Remove every clip this recorder's store manages.
    pub fn clear_clips(&self) -> usize {
        *self.last_clip.write() = None;
        self.store.clear_all()
    }

    pub fn store(&self) -> &ClipStore {
        &self.store
    }

    fn pipeline_running(&self) -> bool {
        self.pipeline.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn fail(&self, err: RecorderError) -> Arc<RecorderError> {
        let err = Arc::new(err);
        error!(error = %err, "session start failed");
        self.capture.lock().stop();
        self.state.transition(RecorderState::Error(err.clone()));
        self.listener.error(&err);
        err
    }
}

/// Everything the pipeline and storage tasks need, detached from the
/// recorder so `stop()` can await them without self-borrow issues.
#[derive(Clone)]
struct PipelineCtx {
    state: StateHandle,
    listener: ListenerHandle,
    store: Arc<ClipStore>,
    last_clip: Arc<RwLock<Option<StoredClip>>>,
    capture: SharedCapture,
    cancel: Arc<AtomicBool>,
    max_file_count: usize,
}

impl PipelineCtx {
    /// Resolve the session as failed. The callback is gated on the state
    /// transition so one session emits at most one `on_error`.
    fn fail(&self, err: RecorderError) {
        let err = Arc::new(err);
        self.capture.lock().stop();
        if self.state.transition(RecorderState::Error(err.clone())) {
            error!(error = %err, "recording session failed");
            self.listener.error(&err);
        }
    }

    fn failed(&self) -> bool {
        matches!(self.state.current(), RecorderState::Error(_))
    }
}

/// Frame loop: classify, segment, hand finished clips to the storage
/// task. Persistence runs on its own task so a slow write never stalls
/// classification of the next utterance.
async fn run_pipeline(
    mut stream: CaptureStream,
    mut engine: Box<dyn VadEngine>,
    mut segmenter: UtteranceSegmenter,
    ctx: PipelineCtx,
) {
    let (clip_tx, clip_rx) = mpsc::channel(8);
    let storage = tokio::spawn(storage_task(clip_rx, ctx.clone()));

    let mut failure: Option<RecorderError> = None;

    while let Some(item) = stream.next_frame().await {
        if ctx.cancel.load(Ordering::SeqCst) {
            break;
        }
        let frame = match item {
            Ok(frame) => frame,
            Err(e) => {
                segmenter.abort();
                failure = Some(e.into());
                break;
            }
        };
        let is_speech = match engine.process(&frame.samples) {
            Ok(v) => v,
            Err(e) => {
                segmenter.abort();
                failure = Some(e.into());
                break;
            }
        };
        match segmenter.push(&frame.samples, is_speech) {
            Some(SegmentEvent::SpeechStart) => {
                debug!(timestamp_ms = frame.timestamp_ms, "speech onset confirmed");
                ctx.state.transition(RecorderState::Recording);
                ctx.listener.recording_start();
            }
            Some(SegmentEvent::SpeechEnd(clip)) => {
                ctx.state.transition(RecorderState::Processing);
                if clip_tx.send(clip).await.is_err() {
                    break;
                }
            }
            None => {}
        }
    }

    // The final flush is skipped once the session failed (a storage error
    // must not trigger a second save attempt).
    if failure.is_none() && !ctx.failed() {
        // Stop path: the utterance in flight keeps everything buffered up
        // to the moment the stream ended.
        if let Some(clip) = segmenter.finalize() {
            ctx.state.transition(RecorderState::Processing);
            let _ = clip_tx.send(clip).await;
        }
    }

    // Let queued clips reach disk before the session resolves.
    drop(clip_tx);
    if storage.await.is_err() {
        warn!("storage task panicked");
    }

    if let Some(err) = failure {
        ctx.fail(err);
    }
    debug!("pipeline task finished");
}

async fn storage_task(mut rx: mpsc::Receiver<crate::segmenter::EncodedClip>, ctx: PipelineCtx) {
    while let Some(clip) = rx.recv().await {
        let store = ctx.store.clone();
        let max_file_count = ctx.max_file_count;
        let saved = tokio::task::spawn_blocking(move || {
            let stored = store.save(&clip.wav)?;
            // Every completed write leaves the directory within the count
            // cap; the freshly saved clip is the newest and survives.
            store.cleanup_by_count(max_file_count);
            Ok::<_, echovoice_foundation::StoreError>(stored)
        })
        .await;
        match saved {
            Ok(Ok(stored)) => {
                info!(
                    path = %stored.path.display(),
                    size_bytes = stored.size_bytes,
                    "clip persisted"
                );
                *ctx.last_clip.write() = Some(stored.clone());
                ctx.state.transition(RecorderState::Completed(stored.clone()));
                ctx.listener.recording_complete(&stored);
            }
            Ok(Err(e)) => ctx.fail(e.into()),
            Err(e) => ctx.fail(RecorderError::Unknown(format!("storage task failed: {e}"))),
        }
    }
}
