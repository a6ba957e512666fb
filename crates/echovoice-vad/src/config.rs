use serde::{Deserialize, Serialize};

use echovoice_foundation::VadError;

/// Sample rates the classifier accepts (Hz).
pub const SUPPORTED_SAMPLE_RATES: [u32; 2] = [8_000, 16_000];

/// Frame sizes the classifier accepts (samples).
pub const SUPPORTED_FRAME_SIZES: [usize; 5] = [256, 512, 768, 1024, 1536];

/// Background-noise rejection strength. Stronger modes demand more energy
/// above the noise floor before a frame counts as speech.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VadMode {
    Normal,
    Aggressive,
    VeryAggressive,
}

impl Default for VadMode {
    fn default() -> Self {
        Self::Normal
    }
}

impl VadMode {
    /// dB above the tracked noise floor required to enter speech.
    pub(crate) fn onset_offset_db(self) -> f32 {
        match self {
            VadMode::Normal => 9.0,
            VadMode::Aggressive => 12.0,
            VadMode::VeryAggressive => 15.0,
        }
    }

    /// dB above the tracked noise floor below which speech ends.
    pub(crate) fn offset_offset_db(self) -> f32 {
        match self {
            VadMode::Normal => 6.0,
            VadMode::Aggressive => 9.0,
            VadMode::VeryAggressive => 12.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VadConfig {
    pub sample_rate_hz: u32,
    pub frame_size_samples: usize,
    /// Silence this long confirms the end of an utterance.
    pub silence_duration_ms: u32,
    /// Candidate speech this long confirms the start of an utterance;
    /// shorter bursts (coughs, door slams) are rejected as noise.
    pub speech_duration_ms: u32,
    pub mode: VadMode,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self::patient()
    }
}

impl VadConfig {
    /// Long offset window (2 s). Tuned for slow, deliberate speakers who
    /// pause between words; this is the originally shipped default.
    pub fn patient() -> Self {
        Self {
            sample_rate_hz: 16_000,
            frame_size_samples: 512,
            silence_duration_ms: 2_000,
            speech_duration_ms: 100,
            mode: VadMode::Normal,
        }
    }

    /// Short offset window (800 ms) for snappier turn-taking.
    pub fn responsive() -> Self {
        Self {
            silence_duration_ms: 800,
            ..Self::patient()
        }
    }

    pub fn validate(&self) -> Result<(), VadError> {
        if !SUPPORTED_SAMPLE_RATES.contains(&self.sample_rate_hz) {
            return Err(VadError::ModelLoad(format!(
                "unsupported sample rate {} Hz",
                self.sample_rate_hz
            )));
        }
        if !SUPPORTED_FRAME_SIZES.contains(&self.frame_size_samples) {
            return Err(VadError::ModelLoad(format!(
                "unsupported frame size {} samples",
                self.frame_size_samples
            )));
        }
        Ok(())
    }

    pub fn frame_duration_ms(&self) -> f32 {
        (self.frame_size_samples as f32 * 1000.0) / self.sample_rate_hz as f32
    }

    /// Candidate-speech frames required to confirm onset (at least 1).
    pub fn speech_confirm_frames(&self) -> u32 {
        ((self.speech_duration_ms as f32 / self.frame_duration_ms()).ceil() as u32).max(1)
    }

    /// Candidate-silence frames required to confirm offset (at least 1).
    pub fn silence_confirm_frames(&self) -> u32 {
        ((self.silence_duration_ms as f32 / self.frame_duration_ms()).ceil() as u32).max(1)
    }
}
