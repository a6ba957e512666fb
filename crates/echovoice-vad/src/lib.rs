pub mod config;
pub mod energy;
pub mod energy_vad;
pub mod gate;
#[cfg(feature = "silero")]
pub mod silero;
pub mod threshold;

pub use config::{VadConfig, VadMode};
pub use energy_vad::EnergyVad;
pub use gate::HysteresisGate;
#[cfg(feature = "silero")]
pub use silero::SileroVad;

use echovoice_foundation::VadError;

/// A frame-level voice activity classifier.
///
/// Implementations are stateful: hysteresis (speech-confirmation and
/// silence-confirmation windows) is internal, so callers must feed every
/// frame in order with no gaps. The returned verdict is already
/// hysteresis-confirmed: it flips to `false` only once the configured
/// silence window has elapsed, and to `true` only once the speech window
/// has.
pub trait VadEngine: Send {
    /// Classify one frame. Returns `true` when the frame belongs to a
    /// confirmed utterance.
    fn process(&mut self, frame: &[i16]) -> Result<bool, VadError>;

    /// Drop all hysteresis state and return to silence.
    fn reset(&mut self);

    fn required_frame_size(&self) -> usize;

    fn required_sample_rate(&self) -> u32;
}
