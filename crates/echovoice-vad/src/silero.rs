use voice_activity_detector::VoiceActivityDetector;

use crate::config::{VadConfig, VadMode};
use crate::gate::HysteresisGate;
use crate::VadEngine;
use echovoice_foundation::VadError;

/// Silero ONNX classifier. Per-frame speech probabilities are thresholded
/// by sensitivity mode, then debounced by the same hysteresis gate the
/// energy engine uses.
pub struct SileroVad {
    detector: VoiceActivityDetector,
    config: VadConfig,
    gate: HysteresisGate,
    closed: bool,
}

impl SileroVad {
    pub fn new(config: VadConfig) -> Result<Self, VadError> {
        config.validate()?;
        let detector = Self::build_detector(&config)?;

        Ok(Self {
            detector,
            gate: HysteresisGate::new(
                config.speech_confirm_frames(),
                config.silence_confirm_frames(),
            ),
            closed: false,
            config,
        })
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    fn build_detector(config: &VadConfig) -> Result<VoiceActivityDetector, VadError> {
        VoiceActivityDetector::builder()
            .sample_rate(config.sample_rate_hz as i64)
            .chunk_size(config.frame_size_samples)
            .build()
            .map_err(|e| VadError::ModelLoad(e.to_string()))
    }

    fn activation_threshold(&self) -> f32 {
        match self.config.mode {
            VadMode::Normal => 0.35,
            VadMode::Aggressive => 0.5,
            VadMode::VeryAggressive => 0.65,
        }
    }
}

impl VadEngine for SileroVad {
    fn process(&mut self, frame: &[i16]) -> Result<bool, VadError> {
        if self.closed {
            return Err(VadError::Closed);
        }
        if frame.len() != self.config.frame_size_samples {
            return Err(VadError::FrameSize {
                expected: self.config.frame_size_samples,
                got: frame.len(),
            });
        }

        let probability = self.detector.predict(frame.iter().copied());
        let candidate = probability >= self.activation_threshold();
        Ok(self.gate.update(candidate))
    }

    fn reset(&mut self) {
        // The detector carries recurrent model state; a fresh instance is
        // the reliable way to drop it.
        if let Ok(detector) = Self::build_detector(&self.config) {
            self.detector = detector;
        }
        self.gate.reset();
    }

    fn required_frame_size(&self) -> usize {
        self.config.frame_size_samples
    }

    fn required_sample_rate(&self) -> u32 {
        self.config.sample_rate_hz
    }
}
