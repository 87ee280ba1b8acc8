use super::CaptureError;
use std::fmt;
use std::str::FromStr;

/// Receives one interleaved block of f32 samples from the audio thread
pub type BlockCallback = Box<dyn FnMut(&[f32]) + Send + 'static>;

/// Receives a description of a stream failure from the audio thread
pub type ErrorCallback = Box<dyn FnMut(String) + Send + 'static>;

/// An input device as reported by the backend
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputDevice {
  pub index: usize,
  pub name: String,
  pub max_input_channels: u16,
}

/// Parameters for opening an input stream
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamRequest {
  /// Device index from [`AudioBackend::list_input_devices`], `None` for the
  /// system default input
  pub device: Option<usize>,
  pub channels: u16,
  pub sample_rate: u32,
  pub block_size: u32,
}

/// A running input stream. Callbacks stop once `close` returns.
pub trait InputSession {
  fn close(self: Box<Self>);
}

/// Platform audio primitive: device enumeration and stream opening
pub trait AudioBackend: Send + Sync {
  fn list_input_devices(&self) -> Result<Vec<InputDevice>, CaptureError>;

  /// Name of the device `open_input_stream` would use for `device`
  fn device_name(&self, device: Option<usize>) -> Option<String>;

  /// Most input channels that device supports, `None` when unknown
  fn max_input_channels(&self, device: Option<usize>) -> Option<u16>;

  fn open_input_stream(
    &self,
    request: &StreamRequest,
    on_block: BlockCallback,
    on_error: ErrorCallback,
  ) -> Result<Box<dyn InputSession>, CaptureError>;
}

/// Explicit device choice from config or the command line
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceSelector {
  Index(usize),
  /// Case-insensitive substring of the device name
  Name(String),
}

impl FromStr for DeviceSelector {
  type Err = std::convert::Infallible;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let s = s.trim();
    Ok(match s.parse::<usize>() {
      Ok(index) => DeviceSelector::Index(index),
      Err(_) => DeviceSelector::Name(s.to_string()),
    })
  }
}

impl fmt::Display for DeviceSelector {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      DeviceSelector::Index(index) => write!(f, "device #{}", index),
      DeviceSelector::Name(name) => write!(f, "device \"{}\"", name),
    }
  }
}

/// Pick the input device to capture from.
///
/// An explicit selector wins when it matches a device with input channels.
/// Otherwise the first input whose name contains `marker` (ignoring case) is
/// chosen. `Err` means nothing matched and the caller should fall back to
/// the default input.
pub fn select_input_device(
  devices: &[InputDevice],
  explicit: Option<&DeviceSelector>,
  marker: &str,
) -> Result<usize, CaptureError> {
  let inputs = || devices.iter().filter(|d| d.max_input_channels > 0);

  if let Some(selector) = explicit {
    let found = match selector {
      DeviceSelector::Index(index) => inputs().find(|d| d.index == *index),
      DeviceSelector::Name(name) => {
        let name = name.to_lowercase();
        inputs().find(|d| d.name.to_lowercase().contains(&name))
      }
    };
    return found
      .map(|d| d.index)
      .ok_or_else(|| CaptureError::DeviceNotFound(selector.to_string()));
  }

  let marker = marker.trim().to_lowercase();
  if marker.is_empty() {
    return Err(CaptureError::DeviceNotFound("an empty marker".to_string()));
  }

  inputs()
    .find(|d| d.name.to_lowercase().contains(&marker))
    .map(|d| d.index)
    .ok_or_else(|| CaptureError::DeviceNotFound(format!("marker \"{}\"", marker)))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn devices() -> Vec<InputDevice> {
    vec![
      InputDevice {
        index: 0,
        name: "MacBook Pro Microphone".to_string(),
        max_input_channels: 1,
      },
      InputDevice {
        index: 1,
        name: "MacBook Pro Speakers".to_string(),
        max_input_channels: 0,
      },
      InputDevice {
        index: 2,
        name: "BlackHole 2ch".to_string(),
        max_input_channels: 2,
      },
    ]
  }

  #[test]
  fn marker_match_ignores_case() {
    assert_eq!(select_input_device(&devices(), None, "blackhole"), Ok(2));
    assert_eq!(select_input_device(&devices(), None, "BLACKHOLE"), Ok(2));
  }

  #[test]
  fn missing_marker_reports_device_not_found() {
    let result = select_input_device(&devices(), None, "loopback");
    assert!(matches!(result, Err(CaptureError::DeviceNotFound(_))));
  }

  #[test]
  fn output_only_devices_are_skipped() {
    assert!(select_input_device(&devices(), None, "speakers").is_err());
    let explicit = DeviceSelector::Index(1);
    assert!(select_input_device(&devices(), Some(&explicit), "blackhole").is_err());
  }

  #[test]
  fn explicit_selector_wins_over_marker() {
    let by_index = DeviceSelector::Index(0);
    assert_eq!(
      select_input_device(&devices(), Some(&by_index), "blackhole"),
      Ok(0)
    );

    let by_name = DeviceSelector::Name("microphone".to_string());
    assert_eq!(
      select_input_device(&devices(), Some(&by_name), "blackhole"),
      Ok(0)
    );
  }

  #[test]
  fn selector_parses_index_or_name() {
    assert_eq!(
      "3".parse::<DeviceSelector>().unwrap(),
      DeviceSelector::Index(3)
    );
    assert_eq!(
      " BlackHole ".parse::<DeviceSelector>().unwrap(),
      DeviceSelector::Name("BlackHole".to_string())
    );
  }
}
