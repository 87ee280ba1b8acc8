// Audio capture and analysis for the real-time analyzer
// - backend: device enumeration and stream opening (cpal in production)
// - capture: the capture thread that owns the live session
// - handoff: bounded overwrite-oldest queue between capture and analysis
// - analyzer: windowed FFT, A-weighting, 1/3-octave bands and peak-hold

mod analyzer;
mod backend;
mod capture;
#[cfg(feature = "cpal-backend")]
mod cpal_backend;
mod error;
mod handoff;
#[cfg(test)]
pub mod testing;
mod weighting;

pub use analyzer::{loudest_band, SpectrumAnalyzer, DEFAULT_PEAK_DECAY};
pub use backend::{select_input_device, AudioBackend, DeviceSelector};
pub use capture::{CaptureBridge, CaptureRequest, FailureFlag, DEFAULT_DEVICE_MARKER};
#[cfg(feature = "cpal-backend")]
pub use cpal_backend::CpalBackend;
pub use error::CaptureError;
pub use handoff::{FrameQueue, DEFAULT_CAPACITY as DEFAULT_QUEUE_CAPACITY};

/// A block of mono samples published by the capture thread.
///
/// Frames are immutable once built: the capture side hands them to the
/// [`FrameQueue`] by value and whoever pops one owns it.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioFrame {
  samples: Vec<f32>,
}

impl AudioFrame {
  pub fn from_mono(samples: Vec<f32>) -> Self {
    Self { samples }
  }

  /// Downmix an interleaved block to mono by averaging every channel of each
  /// sample frame. A trailing partial frame is averaged over what is present.
  #[allow(dead_code)]
  pub fn from_interleaved(data: &[f32], channels: usize) -> Self {
    Self {
      samples: downmix(data, channels).collect(),
    }
  }

  pub fn samples(&self) -> &[f32] {
    &self.samples
  }

  #[cfg(test)]
  pub fn len(&self) -> usize {
    self.samples.len()
  }
}

/// Average interleaved channels down to one sample per frame.
pub fn downmix(data: &[f32], channels: usize) -> impl Iterator<Item = f32> + '_ {
  let channels = channels.max(1);
  data
    .chunks(channels)
    .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn stereo_block_is_averaged_to_mono() {
    let frame = AudioFrame::from_interleaved(&[1.0, 0.0, 0.5, 0.5, -1.0, 1.0], 2);
    assert_eq!(frame.samples(), &[0.5, 0.5, 0.0]);
  }

  #[test]
  fn mono_block_passes_through() {
    let frame = AudioFrame::from_interleaved(&[0.1, 0.2, 0.3], 1);
    assert_eq!(frame.samples(), &[0.1, 0.2, 0.3]);
  }

  #[test]
  fn zero_channels_is_treated_as_mono() {
    let frame = AudioFrame::from_interleaved(&[0.25, 0.75], 0);
    assert_eq!(frame.len(), 2);
  }
}
