/// Debounce gate turning per-frame candidate verdicts into confirmed ones.
///
/// The gate opens only after `speech_confirm` consecutive candidate-speech
/// frames and closes only after `silence_confirm` consecutive
/// candidate-silence frames, which is the hysteresis contract the rest of
/// the pipeline relies on: the confirmed verdict flips at most once per
/// window and never flaps on single-frame noise.
pub struct HysteresisGate {
    open: bool,
    speech_frames: u32,
    silence_frames: u32,
    speech_confirm: u32,
    silence_confirm: u32,
}

impl HysteresisGate {
    pub fn new(speech_confirm: u32, silence_confirm: u32) -> Self {
        Self {
            open: false,
            speech_frames: 0,
            silence_frames: 0,
            speech_confirm: speech_confirm.max(1),
            silence_confirm: silence_confirm.max(1),
        }
    }

    /// Feed one candidate verdict, get the confirmed verdict back.
    pub fn update(&mut self, candidate: bool) -> bool {
        if self.open {
            if candidate {
                self.silence_frames = 0;
            } else {
                self.silence_frames += 1;
                if self.silence_frames >= self.silence_confirm {
                    self.open = false;
                    self.silence_frames = 0;
                }
            }
        } else if candidate {
            self.speech_frames += 1;
            if self.speech_frames >= self.speech_confirm {
                self.open = true;
                self.speech_frames = 0;
            }
        } else {
            self.speech_frames = 0;
        }

        self.open
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn reset(&mut self) {
        self.open = false;
        self.speech_frames = 0;
        self.silence_frames = 0;
    }
}
