pub mod error;

pub use error::{CaptureError, ErrorKind, RecorderError, StoreError, VadError};
