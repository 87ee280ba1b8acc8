use thiserror::Error;

/// Failures raised by the capture side of the analyzer.
///
/// Only `StreamOpen` and `StreamRuntime` ever end a session. `DeviceNotFound`
/// is reported so callers can log it, but the bridge recovers by falling back
/// to the default input device.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum CaptureError {
  #[error("no input device matched {0}")]
  DeviceNotFound(String),
  #[error("could not query input devices: {0}")]
  DeviceQuery(String),
  #[error("could not open input stream: {0}")]
  StreamOpen(String),
  #[error("input stream failed: {0}")]
  StreamRuntime(String),
}
