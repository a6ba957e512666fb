use crate::config::VadConfig;
use crate::energy::EnergyCalculator;
use crate::gate::HysteresisGate;
use crate::threshold::AdaptiveThreshold;
use crate::VadEngine;

use echovoice_foundation::VadError;
use tracing::debug;

/// Energy-based classifier: RMS energy against an adaptive noise floor,
/// debounced by the hysteresis gate. Self-contained (no model download),
/// which makes it the default engine; the Silero engine behind the
/// `silero` feature shares the same gate.
pub struct EnergyVad {
    config: VadConfig,
    energy: EnergyCalculator,
    threshold: AdaptiveThreshold,
    gate: HysteresisGate,
    frames_processed: u64,
    closed: bool,
}

impl EnergyVad {
    pub fn new(config: VadConfig) -> Result<Self, VadError> {
        config.validate()?;
        Ok(Self {
            threshold: AdaptiveThreshold::new(&config),
            gate: HysteresisGate::new(
                config.speech_confirm_frames(),
                config.silence_confirm_frames(),
            ),
            energy: EnergyCalculator::new(),
            frames_processed: 0,
            closed: false,
            config,
        })
    }

    /// Invalidate the engine; subsequent `process` calls fail with
    /// `Closed`. Mirrors explicit model-handle release.
    pub fn close(&mut self) {
        self.closed = true;
    }
}

impl VadEngine for EnergyVad {
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

        let energy_db = self.energy.calculate_dbfs(frame);
        let candidate = if self.gate.is_open() {
            !self.threshold.should_deactivate(energy_db)
        } else {
            self.threshold.should_activate(energy_db)
        };
        self.threshold.update(energy_db, self.gate.is_open());

        let verdict = self.gate.update(candidate);

        self.frames_processed += 1;
        if self.frames_processed % 1000 == 0 {
            debug!(
                frames = self.frames_processed,
                noise_floor_db = self.threshold.current_floor(),
                "energy vad progress"
            );
        }

        Ok(verdict)
    }

    fn reset(&mut self) {
        self.gate.reset();
        self.threshold.reset();
        self.frames_processed = 0;
    }

    fn required_frame_size(&self) -> usize {
        self.config.frame_size_samples
    }

    fn required_sample_rate(&self) -> u32 {
        self.config.sample_rate_hz
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loud_frame(size: usize) -> Vec<i16> {
        (0..size)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * i as f32 * 8.0 / size as f32;
                (phase.sin() * 12_000.0) as i16
            })
            .collect()
    }

    fn quiet_frame(size: usize) -> Vec<i16> {
        vec![0i16; size]
    }

    fn test_config() -> VadConfig {
        // One-frame confirmation windows keep the tests focused on the
        // energy path rather than the debounce counters.
        VadConfig {
            speech_duration_ms: 0,
            silence_duration_ms: 0,
            ..VadConfig::patient()
        }
    }

    #[test]
    fn loud_audio_is_speech_quiet_audio_is_not() {
        let mut vad = EnergyVad::new(test_config()).unwrap();
        let size = vad.required_frame_size();

        assert!(!vad.process(&quiet_frame(size)).unwrap());
        assert!(vad.process(&loud_frame(size)).unwrap());
        assert!(!vad.process(&quiet_frame(size)).unwrap());
    }

    #[test]
    fn wrong_frame_size_is_an_error() {
        let mut vad = EnergyVad::new(VadConfig::default()).unwrap();
        let err = vad.process(&[0i16; 100]).unwrap_err();
        assert!(matches!(
            err,
            VadError::FrameSize {
                expected: 512,
                got: 100
            }
        ));
    }

    #[test]
    fn closed_engine_rejects_frames() {
        let mut vad = EnergyVad::new(VadConfig::default()).unwrap();
        vad.close();
        let frame = quiet_frame(512);
        assert!(matches!(vad.process(&frame), Err(VadError::Closed)));
    }

    #[test]
    fn invalid_config_fails_construction() {
        let bad = VadConfig {
            frame_size_samples: 333,
            ..VadConfig::default()
        };
        assert!(EnergyVad::new(bad).is_err());
    }

    #[test]
    fn hysteresis_holds_speech_through_short_gaps() {
        // 2-frame silence window: one quiet frame inside an utterance must
        // not end it.
        let cfg = VadConfig {
            speech_duration_ms: 0,
            silence_duration_ms: 64, // 2 frames at 32 ms
            ..VadConfig::patient()
        };
        let mut vad = EnergyVad::new(cfg).unwrap();
        let size = vad.required_frame_size();

        assert!(vad.process(&loud_frame(size)).unwrap());
        assert!(vad.process(&quiet_frame(size)).unwrap(), "gap shorter than window");
        assert!(vad.process(&loud_frame(size)).unwrap());
        assert!(vad.process(&quiet_frame(size)).unwrap());
        assert!(!vad.process(&quiet_frame(size)).unwrap(), "window elapsed");
    }

    #[test]
    fn reset_restores_silence_state() {
        let mut vad = EnergyVad::new(test_config()).unwrap();
        let size = vad.required_frame_size();
        assert!(vad.process(&loud_frame(size)).unwrap());
        vad.reset();
        assert!(!vad.process(&quiet_frame(size)).unwrap());
    }
}
