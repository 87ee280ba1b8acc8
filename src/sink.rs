use crate::audio::loudest_band;
use std::sync::Mutex;

/// Consumer of analysis results, called once per successful tick.
///
/// All three slices have the same length, one entry per band.
pub trait RenderSink: Send + Sync {
  fn render(&self, centers: &[f32], levels: &[f32], peaks: &[f32]);
}

/// The most recent analysis result
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpectrumSnapshot {
  pub centers: Vec<f32>,
  pub levels: Vec<f32>,
  pub peaks: Vec<f32>,
  /// Number of results rendered so far, including this one
  pub sequence: u64,
}

impl SpectrumSnapshot {
  /// Center frequency and level of the loudest finite band
  pub fn loudest(&self) -> Option<(f32, f32)> {
    loudest_band(&self.levels).map(|(index, level)| (self.centers[index], level))
  }
}

/// Keeps the latest result for a UI (or anything else) to read at its own pace
#[derive(Default)]
pub struct SharedSpectrum {
  latest: Mutex<Option<SpectrumSnapshot>>,
}

impl SharedSpectrum {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn latest(&self) -> Option<SpectrumSnapshot> {
    self.latest.lock().ok().and_then(|latest| latest.clone())
  }
}

impl RenderSink for SharedSpectrum {
  fn render(&self, centers: &[f32], levels: &[f32], peaks: &[f32]) {
    if let Ok(mut latest) = self.latest.lock() {
      let sequence = latest.as_ref().map_or(0, |s| s.sequence) + 1;
      *latest = Some(SpectrumSnapshot {
        centers: centers.to_vec(),
        levels: levels.to_vec(),
        peaks: peaks.to_vec(),
        sequence,
      });
    }
  }
}

/// Short human-readable summary, e.g. `Peak: -12.3 dB @ 1000 Hz`
pub fn format_peak(snapshot: Option<&SpectrumSnapshot>) -> String {
  match snapshot.and_then(|s| s.loudest()) {
    Some((center, level)) => format!("Peak: {:.1} dB @ {}", level, format_frequency(center)),
    None => "Peak: -- dB".to_string(),
  }
}

/// Compact band label: `31.5`, `400`, `1k`, `12.5k`
pub fn format_frequency(hz: f32) -> String {
  if hz >= 1000.0 {
    let khz = hz / 1000.0;
    if (khz - khz.round()).abs() < 0.05 {
      format!("{}k", khz.round() as u32)
    } else {
      format!("{:.1}k", khz)
    }
  } else if (hz - hz.round()).abs() < 0.05 {
    format!("{}", hz.round() as u32)
  } else {
    format!("{:.1}", hz)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn shared_spectrum_keeps_latest_and_counts() {
    let sink = SharedSpectrum::new();
    assert!(sink.latest().is_none());

    sink.render(&[100.0, 200.0], &[-10.0, -20.0], &[-5.0, -20.0]);
    sink.render(&[100.0, 200.0], &[-30.0, -1.0], &[-5.5, -1.0]);

    let latest = sink.latest().unwrap();
    assert_eq!(latest.sequence, 2);
    assert_eq!(latest.levels, vec![-30.0, -1.0]);
  }

  #[test]
  fn peak_text_ignores_silent_bands() {
    let snapshot = SpectrumSnapshot {
      centers: vec![20.0, 1000.0],
      levels: vec![f32::NEG_INFINITY, -12.34],
      peaks: vec![f32::NEG_INFINITY, -12.34],
      sequence: 1,
    };
    assert_eq!(format_peak(Some(&snapshot)), "Peak: -12.3 dB @ 1k");

    let silent = SpectrumSnapshot {
      levels: vec![f32::NEG_INFINITY, f32::NEG_INFINITY],
      ..snapshot
    };
    assert_eq!(format_peak(Some(&silent)), "Peak: -- dB");
    assert_eq!(format_peak(None), "Peak: -- dB");
  }

  #[test]
  fn frequency_labels() {
    assert_eq!(format_frequency(20.0), "20");
    assert_eq!(format_frequency(31.5), "31.5");
    assert_eq!(format_frequency(1000.0), "1k");
    assert_eq!(format_frequency(1600.0), "1.6k");
    assert_eq!(format_frequency(6300.0), "6.3k");
    assert_eq!(format_frequency(12500.0), "12.5k");
    assert_eq!(format_frequency(20000.0), "20k");
  }
}
