pub mod capture;
pub mod ring_buffer;
pub mod wav;

pub use capture::{AudioFrame, CaptureConfig, CaptureSource, CaptureStream, CpalCapture};
pub use ring_buffer::{AudioConsumer, AudioProducer, AudioRingBuffer};
