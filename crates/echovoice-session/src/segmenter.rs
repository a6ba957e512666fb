use echovoice_audio::wav;
use tracing::debug;

const CHANNELS_MONO: u16 = 1;
const BITS_PER_SAMPLE: u16 = 16;

/// One finished utterance, already wrapped in its WAV container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedClip {
    pub wav: Vec<u8>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentEvent {
    SpeechStart,
    SpeechEnd(EncodedClip),
}

/// Bounded state machine cutting a classified frame stream into discrete
/// utterances.
///
/// Listening -> (speech) -> Active -> (non-speech | timeout | stop) ->
/// finalize -> Listening. The segmenter exclusively owns the single
/// utterance buffer; it is cleared atomically on finalize and on abort, so
/// a new utterance can never start before the previous one is resolved.
pub struct UtteranceSegmenter {
    buffer: Vec<u8>,
    active: bool,
    frames_in_utterance: u64,
    max_utterance_frames: u64,
    sample_rate_hz: u32,
}

impl UtteranceSegmenter {
    pub fn new(sample_rate_hz: u32, max_utterance_frames: u64) -> Self {
        Self {
            buffer: Vec::new(),
            active: false,
            frames_in_utterance: 0,
            max_utterance_frames: max_utterance_frames.max(1),
            sample_rate_hz,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Feed one classified frame. Emits at most one event: `SpeechStart`
    /// when an utterance begins, `SpeechEnd` with the encoded clip when
    /// one finishes.
    pub fn push(&mut self, frame: &[i16], is_speech: bool) -> Option<SegmentEvent> {
        // The duration cap acts exactly like a confirmed non-speech
        // verdict: finalize now, and the triggering frame is not appended.
        if self.active && self.frames_in_utterance >= self.max_utterance_frames {
            debug!(
                frames = self.frames_in_utterance,
                "utterance hit the duration cap, forcing finalize"
            );
            return Some(SegmentEvent::SpeechEnd(self.finish()));
        }

        match (self.active, is_speech) {
            (false, true) => {
                self.buffer.clear();
                self.append(frame);
                self.active = true;
                self.frames_in_utterance = 1;
                Some(SegmentEvent::SpeechStart)
            }
            (false, false) => None,
            (true, true) => {
                self.append(frame);
                self.frames_in_utterance += 1;
                None
            }
            (true, false) => Some(SegmentEvent::SpeechEnd(self.finish())),
        }
    }

    /// Finalize an in-flight utterance (stop path). `None` when no
    /// utterance is active; an empty buffer never produces a clip.
    pub fn finalize(&mut self) -> Option<EncodedClip> {
        if self.active {
            Some(self.finish())
        } else {
            None
        }
    }

    /// Discard the current utterance without encoding (classifier error
    /// path: the audio since speech start is lost, never partially
    /// emitted).
    pub fn abort(&mut self) {
        if self.active {
            debug!(bytes = self.buffer.len(), "aborting in-flight utterance");
        }
        self.buffer.clear();
        self.active = false;
        self.frames_in_utterance = 0;
    }

    fn append(&mut self, frame: &[i16]) {
        self.buffer.extend_from_slice(&wav::samples_to_bytes(frame));
    }

    fn finish(&mut self) -> EncodedClip {
        let pcm = std::mem::take(&mut self.buffer);
        self.active = false;
        self.frames_in_utterance = 0;

        let duration_ms =
            (pcm.len() as u64 / 2) * 1000 / u64::from(self.sample_rate_hz);
        let clip = EncodedClip {
            wav: wav::encode_wav(&pcm, self.sample_rate_hz, CHANNELS_MONO, BITS_PER_SAMPLE),
            duration_ms,
        };
        debug!(
            payload_bytes = pcm.len(),
            duration_ms, "utterance finalized"
        );
        clip
    }
}
