use thiserror::Error;

/// Top-level error of the recording engine. Every failure a caller can
/// observe (through the `Error` state or the listener callback) is one of
/// these variants.
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("classifier error: {0}")]
    Vad(#[from] VadError),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("unknown error: {0}")]
    Unknown(String),
}

/// Coarse error kind for presentation layers that key a user-facing
/// message off the failure class rather than the full error chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    PermissionDenied,
    DeviceInit,
    ModelLoad,
    Recording,
    Write,
    InsufficientStorage,
    Unknown,
}

impl RecorderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RecorderError::Capture(CaptureError::PermissionDenied) => ErrorKind::PermissionDenied,
            RecorderError::Capture(CaptureError::DeviceInit(_))
            | RecorderError::Capture(CaptureError::FormatNotSupported { .. }) => {
                ErrorKind::DeviceInit
            }
            RecorderError::Capture(_) => ErrorKind::Recording,
            RecorderError::Vad(VadError::ModelLoad(_)) => ErrorKind::ModelLoad,
            RecorderError::Vad(_) => ErrorKind::Recording,
            RecorderError::Store(StoreError::InsufficientStorage { .. }) => {
                ErrorKind::InsufficientStorage
            }
            RecorderError::Store(_) => ErrorKind::Write,
            RecorderError::Unknown(_) => ErrorKind::Unknown,
        }
    }
}

/// Errors from the microphone capture path.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("failed to initialize input device: {0}")]
    DeviceInit(String),

    #[error("format not supported: {format}")]
    FormatNotSupported { format: String },

    #[error("invalid operation on audio stream")]
    InvalidOperation,

    #[error("bad capture parameter: {0}")]
    BadValue(String),

    #[error("input device lost")]
    DeviceLost,
}

impl From<cpal::BuildStreamError> for CaptureError {
    fn from(e: cpal::BuildStreamError) -> Self {
        match e {
            cpal::BuildStreamError::DeviceNotAvailable => {
                CaptureError::DeviceInit("device not available".into())
            }
            cpal::BuildStreamError::StreamConfigNotSupported => CaptureError::FormatNotSupported {
                format: "requested stream config not supported".into(),
            },
            cpal::BuildStreamError::InvalidArgument => {
                CaptureError::BadValue("invalid stream argument".into())
            }
            cpal::BuildStreamError::BackendSpecific { err } => {
                let msg = err.description.to_ascii_lowercase();
                if msg.contains("permission") || msg.contains("access") {
                    CaptureError::PermissionDenied
                } else {
                    CaptureError::DeviceInit(err.description)
                }
            }
            other => CaptureError::DeviceInit(other.to_string()),
        }
    }
}

impl From<cpal::PlayStreamError> for CaptureError {
    fn from(e: cpal::PlayStreamError) -> Self {
        match e {
            cpal::PlayStreamError::DeviceNotAvailable => CaptureError::DeviceLost,
            cpal::PlayStreamError::BackendSpecific { err } => {
                CaptureError::DeviceInit(err.description)
            }
        }
    }
}

impl From<cpal::StreamError> for CaptureError {
    fn from(e: cpal::StreamError) -> Self {
        match e {
            cpal::StreamError::DeviceNotAvailable => CaptureError::DeviceLost,
            cpal::StreamError::BackendSpecific { .. } => CaptureError::InvalidOperation,
        }
    }
}

/// Errors from the voice activity classifier.
#[derive(Error, Debug)]
pub enum VadError {
    #[error("failed to load voice activity model: {0}")]
    ModelLoad(String),

    #[error("classifier used after close")]
    Closed,

    #[error("classifier expects {expected} samples per frame, got {got}")]
    FrameSize { expected: usize, got: usize },
}

/// Errors from the retention-managed clip store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("insufficient storage: need {needed} bytes, {available} available")]
    InsufficientStorage { needed: u64, available: u64 },

    #[error("failed to write clip: {0}")]
    Write(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_maps_permission_denied() {
        let err = RecorderError::Capture(CaptureError::PermissionDenied);
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    }

    #[test]
    fn kind_maps_model_load() {
        let err = RecorderError::Vad(VadError::ModelLoad("missing model".into()));
        assert_eq!(err.kind(), ErrorKind::ModelLoad);
    }

    #[test]
    fn kind_maps_storage_variants() {
        let full = RecorderError::Store(StoreError::InsufficientStorage {
            needed: 2048,
            available: 100,
        });
        assert_eq!(full.kind(), ErrorKind::InsufficientStorage);

        let io = RecorderError::Store(StoreError::Write(std::io::Error::other("disk gone")));
        assert_eq!(io.kind(), ErrorKind::Write);
    }

    #[test]
    fn kind_maps_runtime_capture_errors_to_recording() {
        for err in [
            CaptureError::InvalidOperation,
            CaptureError::BadValue("rate".into()),
            CaptureError::DeviceLost,
        ] {
            assert_eq!(RecorderError::Capture(err).kind(), ErrorKind::Recording);
        }
    }

    #[test]
    fn display_includes_frame_size_details() {
        let err = VadError::FrameSize {
            expected: 512,
            got: 480,
        };
        let msg = err.to_string();
        assert!(msg.contains("512") && msg.contains("480"), "{msg}");
    }
}
