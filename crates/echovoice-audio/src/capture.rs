use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::ring_buffer::{AudioConsumer, AudioRingBuffer};
use echovoice_foundation::CaptureError;

/// One fixed-size window of mono 16-bit samples. Timestamps are derived
/// from the emitted sample count, so they are monotonic and gap-free even
/// when the hardware callback is bursty.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub samples: Vec<i16>,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Input device name; `None` means the host default.
    pub device: Option<String>,
    pub sample_rate_hz: u32,
    pub frame_size_samples: usize,
    /// Ring buffer capacity in samples between the audio callback and the
    /// frame assembler.
    pub ring_capacity_samples: usize,
    /// Bound of the outgoing frame channel.
    pub channel_capacity: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate_hz: 16_000,
            frame_size_samples: 512,
            ring_capacity_samples: 16_384 * 4,
            channel_capacity: 64,
        }
    }
}

impl CaptureConfig {
    pub fn validate(&self) -> Result<(), CaptureError> {
        if !matches!(self.sample_rate_hz, 8_000 | 16_000) {
            return Err(CaptureError::BadValue(format!(
                "unsupported sample rate {} Hz",
                self.sample_rate_hz
            )));
        }
        if !matches!(self.frame_size_samples, 256 | 512 | 768 | 1024 | 1536) {
            return Err(CaptureError::BadValue(format!(
                "unsupported frame size {} samples",
                self.frame_size_samples
            )));
        }
        Ok(())
    }
}

/// Stream of captured frames. Ends after the first error, or when the
/// source is stopped.
pub struct CaptureStream {
    rx: mpsc::Receiver<Result<AudioFrame, CaptureError>>,
}

impl CaptureStream {
    pub fn new(rx: mpsc::Receiver<Result<AudioFrame, CaptureError>>) -> Self {
        Self { rx }
    }

    /// Await the next frame. `None` means the stream has terminated.
    pub async fn next_frame(&mut self) -> Option<Result<AudioFrame, CaptureError>> {
        self.rx.recv().await
    }
}

/// Seam between the orchestrator and the hardware. The production
/// implementation is [`CpalCapture`]; tests script their own source.
pub trait CaptureSource: Send {
    fn start(&mut self) -> Result<CaptureStream, CaptureError>;

    /// Release the device. Idempotent; the stream handed out by `start`
    /// terminates shortly after.
    fn stop(&mut self);
}

/// Microphone capture over cpal. The stream object is not `Send`, so it
/// lives on a dedicated `audio-capture` thread; samples cross to the async
/// side through the rtrb ring buffer.
pub struct CpalCapture {
    config: CaptureConfig,
    shutdown: Option<Arc<AtomicBool>>,
    thread: Option<JoinHandle<()>>,
}

impl CpalCapture {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            shutdown: None,
            thread: None,
        }
    }
}

impl CaptureSource for CpalCapture {
    fn start(&mut self) -> Result<CaptureStream, CaptureError> {
        self.config.validate()?;
        if self.thread.is_some() {
            return Err(CaptureError::InvalidOperation);
        }

        let ring = AudioRingBuffer::new(self.config.ring_capacity_samples);
        let (mut producer, consumer) = ring.split();

        let shutdown = Arc::new(AtomicBool::new(false));
        let error_slot: Arc<Mutex<Option<CaptureError>>> = Arc::new(Mutex::new(None));
        let dropped = Arc::new(AtomicU64::new(0));

        let (init_tx, init_rx) = std::sync::mpsc::channel::<Result<(), CaptureError>>();
        let thread_shutdown = shutdown.clone();
        let thread_error = error_slot.clone();
        let cfg = self.config.clone();

        let handle = thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || {
                let stream = match build_input_stream(&cfg, move |samples| {
                    if producer.write(samples).is_err() {
                        dropped.fetch_add(1, Ordering::Relaxed);
                    }
                }, thread_error.clone())
                {
                    Ok(s) => s,
                    Err(e) => {
                        let _ = init_tx.send(Err(e));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = init_tx.send(Err(e.into()));
                    return;
                }
                let _ = init_tx.send(Ok(()));

                // The stream delivers samples via its callback; this thread
                // only keeps it alive until shutdown.
                while !thread_shutdown.load(Ordering::SeqCst) {
                    thread::sleep(Duration::from_millis(50));
                }
                drop(stream);
                info!("audio capture thread shut down");
            })
            .map_err(|e| CaptureError::DeviceInit(format!("failed to spawn capture thread: {e}")))?;

        match init_rx.recv_timeout(Duration::from_secs(5)) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(e);
            }
            Err(_) => {
                shutdown.store(true, Ordering::SeqCst);
                let _ = handle.join();
                return Err(CaptureError::DeviceInit(
                    "timed out waiting for input stream".into(),
                ));
            }
        }

        let (tx, rx) = mpsc::channel(self.config.channel_capacity);
        tokio::spawn(assemble_frames(
            consumer,
            tx,
            self.config.frame_size_samples,
            self.config.sample_rate_hz,
            shutdown.clone(),
            error_slot,
        ));

        self.shutdown = Some(shutdown);
        self.thread = Some(handle);
        info!(
            sample_rate = self.config.sample_rate_hz,
            frame_size = self.config.frame_size_samples,
            "audio capture started"
        );
        Ok(CaptureStream::new(rx))
    }

    fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            shutdown.store(true, Ordering::SeqCst);
        }
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CpalCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Drain the ring buffer and emit exactly `frame_size` sample frames.
/// Polls with a short sleep when no samples are available; at 16 kHz a
/// 512-sample frame arrives every 32 ms, so a 10 ms poll never lags by
/// more than a fraction of a frame.
async fn assemble_frames(
    mut consumer: AudioConsumer,
    tx: mpsc::Sender<Result<AudioFrame, CaptureError>>,
    frame_size: usize,
    sample_rate_hz: u32,
    shutdown: Arc<AtomicBool>,
    error_slot: Arc<Mutex<Option<CaptureError>>>,
) {
    let mut pending: Vec<i16> = Vec::with_capacity(frame_size * 2);
    let mut scratch = vec![0i16; frame_size.max(1024)];
    let mut samples_emitted: u64 = 0;

    loop {
        let stream_error = error_slot.lock().take();
        if let Some(err) = stream_error {
            warn!("capture stream error: {err}");
            let _ = tx.send(Err(err)).await;
            break;
        }
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        let n = consumer.read(&mut scratch);
        if n == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            continue;
        }
        pending.extend_from_slice(&scratch[..n]);

        while pending.len() >= frame_size {
            let samples: Vec<i16> = pending.drain(..frame_size).collect();
            let timestamp_ms = samples_emitted * 1000 / u64::from(sample_rate_hz);
            samples_emitted += frame_size as u64;
            if tx
                .send(Ok(AudioFrame {
                    samples,
                    timestamp_ms,
                }))
                .await
                .is_err()
            {
                return;
            }
        }
    }
    debug!(samples_emitted, "frame assembler stopped");
}

fn build_input_stream(
    cfg: &CaptureConfig,
    mut on_samples: impl FnMut(&[i16]) + Send + 'static,
    error_slot: Arc<Mutex<Option<CaptureError>>>,
) -> Result<cpal::Stream, CaptureError> {
    let host = cpal::default_host();
    let device = match &cfg.device {
        Some(name) => host
            .input_devices()
            .map_err(|e| CaptureError::DeviceInit(e.to_string()))?
            .find(|d| d.name().map(|n| &n == name).unwrap_or(false))
            .ok_or_else(|| CaptureError::DeviceInit(format!("input device {name:?} not found")))?,
        None => host
            .default_input_device()
            .ok_or_else(|| CaptureError::DeviceInit("no input device available".into()))?,
    };
    if let Ok(name) = device.name() {
        info!("selected input device: {name}");
    }

    let sample_format = negotiate_format(&device, cfg)?;
    let stream_config = StreamConfig {
        channels: 1,
        sample_rate: cpal::SampleRate(cfg.sample_rate_hz),
        buffer_size: cpal::BufferSize::Default,
    };

    let err_fn = move |err: cpal::StreamError| {
        let mapped: CaptureError = err.into();
        error_slot.lock().get_or_insert(mapped);
    };

    let stream = match sample_format {
        SampleFormat::I16 => device.build_input_stream(
            &stream_config,
            move |data: &[i16], _: &_| on_samples(data),
            err_fn,
            None,
        )?,
        SampleFormat::F32 => {
            let mut convert: Vec<i16> = Vec::new();
            device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &_| {
                    convert.clear();
                    convert.reserve(data.len());
                    for &s in data {
                        convert.push((s.clamp(-1.0, 1.0) * 32767.0).round() as i16);
                    }
                    on_samples(&convert);
                },
                err_fn,
                None,
            )?
        }
        SampleFormat::U16 => {
            let mut convert: Vec<i16> = Vec::new();
            device.build_input_stream(
                &stream_config,
                move |data: &[u16], _: &_| {
                    convert.clear();
                    convert.reserve(data.len());
                    for &s in data {
                        convert.push((i32::from(s) - 32768) as i16);
                    }
                    on_samples(&convert);
                },
                err_fn,
                None,
            )?
        }
        other => {
            return Err(CaptureError::FormatNotSupported {
                format: format!("{other:?}"),
            });
        }
    };

    Ok(stream)
}

fn negotiate_format(
    device: &cpal::Device,
    cfg: &CaptureConfig,
) -> Result<SampleFormat, CaptureError> {
    let supported = device
        .supported_input_configs()
        .map_err(|e| CaptureError::DeviceInit(e.to_string()))?;

    for range in supported {
        if range.channels() == 1
            && range.min_sample_rate().0 <= cfg.sample_rate_hz
            && range.max_sample_rate().0 >= cfg.sample_rate_hz
            && matches!(
                range.sample_format(),
                SampleFormat::I16 | SampleFormat::F32 | SampleFormat::U16
            )
        {
            return Ok(range.sample_format());
        }
    }

    Err(CaptureError::FormatNotSupported {
        format: format!("mono i16/f32/u16 at {} Hz", cfg.sample_rate_hz),
    })
}
