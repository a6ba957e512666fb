use std::path::PathBuf;

use echovoice_audio::CaptureConfig;
use echovoice_store::RetentionConfig;
use echovoice_vad::VadConfig;

/// Immutable configuration of one recording session, fixed at creation.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    pub vad: VadConfig,
    pub retention: RetentionConfig,
    /// Directory exclusively owned by the clip store.
    pub store_dir: PathBuf,
    /// Clip file name prefix.
    pub file_prefix: String,
    /// Hard cap on one utterance; expiry forces finalize as if the
    /// classifier had reported silence.
    pub max_recording_duration_ms: u64,
    /// Input device name; `None` means the host default.
    pub device: Option<String>,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            vad: VadConfig::default(),
            retention: RetentionConfig::default(),
            store_dir: std::env::temp_dir().join("echovoice_clips"),
            file_prefix: "echo_voice".to_string(),
            max_recording_duration_ms: 60_000,
            device: None,
        }
    }
}

impl RecorderConfig {
    /// Long silence window (the shipped default tuning).
    pub fn patient() -> Self {
        Self {
            vad: VadConfig::patient(),
            ..Self::default()
        }
    }

    /// Short silence window for snappier turn-taking.
    pub fn responsive() -> Self {
        Self {
            vad: VadConfig::responsive(),
            ..Self::default()
        }
    }

    pub(crate) fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            device: self.device.clone(),
            sample_rate_hz: self.vad.sample_rate_hz,
            frame_size_samples: self.vad.frame_size_samples,
            ..CaptureConfig::default()
        }
    }

    /// Utterance cap expressed in whole frames (at least one).
    pub(crate) fn max_utterance_frames(&self) -> u64 {
        let frame_ms = self.vad.frame_duration_ms() as f64;
        ((self.max_recording_duration_ms as f64 / frame_ms).ceil() as u64).max(1)
    }
}
