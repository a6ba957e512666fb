pub mod config;
pub mod listener;
pub mod recorder;
pub mod segmenter;
pub mod state;

pub use config::RecorderConfig;
pub use listener::RecorderListener;
pub use recorder::{EngineFactory, VoiceRecorder};
pub use segmenter::{EncodedClip, SegmentEvent, UtteranceSegmenter};
pub use state::{RecorderState, StateHandle};
