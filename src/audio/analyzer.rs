use super::weighting::{a_weighting_db, BandTable, AUDIBLE_MAX_HZ, AUDIBLE_MIN_HZ};
use super::AudioFrame;
use log::warn;
use realfft::num_complex::Complex;
use std::ops::Range;
use std::sync::Arc;

/// Peak-hold decay per analysis cycle (0.0 = follow instantly, 1.0 = hold forever)
pub const DEFAULT_PEAK_DECAY: f32 = 0.95;

/// Smallest FFT the analyzer will plan
const MIN_CHUNK_SIZE: usize = 2;

/// Output of one analysis cycle
#[derive(Clone, Debug, PartialEq)]
pub struct BandReading {
  /// Instantaneous A-weighted level per band (dB, `-inf` for silence)
  pub levels: Vec<f32>,
  /// Peak-hold level per band (dB), detached from the analyzer's state
  pub peaks: Vec<f32>,
}

/// A-weighted 1/3-octave analyzer with per-band peak-hold.
///
/// Everything derived from the sample rate and chunk size (window, bin
/// ranges, weighting gains) is computed once in [`SpectrumAnalyzer::new`].
/// Only the peak-hold values change between calls.
pub struct SpectrumAnalyzer {
  sample_rate: u32,
  chunk_size: usize,
  fft: Arc<dyn realfft::RealToComplex<f32>>,
  window: Vec<f32>,
  fft_input: Vec<f32>,
  fft_output: Vec<Complex<f32>>,
  scratch: Vec<Complex<f32>>,
  /// FFT bin indices inside 20 Hz .. 20 kHz
  audible_bins: Range<usize>,
  /// Center frequency of each audible bin
  bin_frequencies: Vec<f32>,
  /// Linear A-weighting gain of each audible bin
  weighting: Vec<f32>,
  /// Weighted magnitudes of the last analyzed frame, one per audible bin
  weighted: Vec<f32>,
  bands: BandTable,
  /// Audible-bin slice (relative to `audible_bins.start`) covered by each band
  band_bins: Vec<Range<usize>>,
  peak_hold: Vec<f32>,
  peak_decay: f32,
}

impl SpectrumAnalyzer {
  pub fn new(sample_rate: u32, chunk_size: usize) -> Self {
    Self::with_decay(sample_rate, chunk_size, DEFAULT_PEAK_DECAY)
  }

  pub fn with_decay(sample_rate: u32, chunk_size: usize, peak_decay: f32) -> Self {
    let chunk_size = chunk_size.max(MIN_CHUNK_SIZE);
    let sample_rate = sample_rate.max(1);

    let mut planner = realfft::RealFftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(chunk_size);
    let fft_output = fft.make_output_vec();
    let scratch = fft.make_scratch_vec();

    let window = hann_window(chunk_size);

    // Only the non-negative half is analyzed, matching bins 0..N/2
    let bin_width = sample_rate as f32 / chunk_size as f32;
    let half = chunk_size / 2;
    let first = (0..half)
      .find(|&bin| bin as f32 * bin_width >= AUDIBLE_MIN_HZ)
      .unwrap_or(half);
    let last = (first..half)
      .take_while(|&bin| bin as f32 * bin_width <= AUDIBLE_MAX_HZ)
      .last()
      .map_or(first, |bin| bin + 1);
    let audible_bins = first..last;

    let bin_frequencies: Vec<f32> = audible_bins
      .clone()
      .map(|bin| bin as f32 * bin_width)
      .collect();

    let weighting: Vec<f32> = bin_frequencies
      .iter()
      .map(|&frequency| 10f64.powf(a_weighting_db(frequency as f64) / 20.0) as f32)
      .collect();

    let bands = BandTable::third_octave();
    let band_bins = (0..bands.len())
      .map(|index| {
        let (lower, upper) = bands.limits(index);
        let start = bin_frequencies.partition_point(|&f| f < lower);
        let end = bin_frequencies.partition_point(|&f| f <= upper);
        start..end.max(start)
      })
      .collect();

    let peak_hold = vec![f32::NEG_INFINITY; bands.len()];
    let weighted = vec![0.0; bin_frequencies.len()];

    Self {
      sample_rate,
      chunk_size,
      fft,
      window,
      fft_input: vec![0.0; chunk_size],
      fft_output,
      scratch,
      audible_bins,
      bin_frequencies,
      weighting,
      weighted,
      bands,
      band_bins,
      peak_hold,
      peak_decay: peak_decay.clamp(0.0, 1.0),
    }
  }

  #[allow(dead_code)]
  pub fn sample_rate(&self) -> u32 {
    self.sample_rate
  }

  pub fn center_frequencies(&self) -> &[f32] {
    self.bands.centers()
  }

  #[allow(dead_code)]
  pub fn bands(&self) -> &BandTable {
    &self.bands
  }

  /// Current peak-hold values
  #[allow(dead_code)]
  pub fn peak_hold(&self) -> &[f32] {
    &self.peak_hold
  }

  /// Analyze one frame, update peak-hold and return both level sets.
  ///
  /// Frames of the wrong length are zero-padded or truncated to the chunk
  /// size. Non-finite samples are read as silence.
  pub fn analyze(&mut self, frame: &AudioFrame) -> BandReading {
    self.load_windowed(frame.samples());

    if let Err(e) = self
      .fft
      .process_with_scratch(&mut self.fft_input, &mut self.fft_output, &mut self.scratch)
    {
      // Buffer lengths come from the plan itself, so this is unreachable in
      // practice; report silence rather than stale data
      warn!("fft failed: {}", e);
      self.fft_output.fill(Complex::default());
    }

    for (i, bin) in self.audible_bins.clone().enumerate() {
      self.weighted[i] = self.fft_output[bin].norm() * self.weighting[i];
    }

    let levels: Vec<f32> = self
      .band_bins
      .iter()
      .map(|range| band_level(&self.weighted[range.clone()]))
      .collect();

    self.update_peaks(&levels);

    BandReading {
      levels,
      peaks: self.peak_hold.clone(),
    }
  }

  fn load_windowed(&mut self, samples: &[f32]) {
    let used = samples.len().min(self.chunk_size);
    for (i, slot) in self.fft_input.iter_mut().enumerate() {
      let sample = if i < used { samples[i] } else { 0.0 };
      let sample = if sample.is_finite() { sample } else { 0.0 };
      *slot = sample * self.window[i];
    }
  }

  fn update_peaks(&mut self, levels: &[f32]) {
    let decay = self.peak_decay;
    for (peak, &level) in self.peak_hold.iter_mut().zip(levels) {
      if level > *peak {
        *peak = level;
      } else if level == f32::NEG_INFINITY {
        // -inf * (1 - decay) is -inf unless decay is exactly 1.0, where the
        // product would be NaN
        if decay < 1.0 {
          *peak = f32::NEG_INFINITY;
        }
      } else {
        // stays between the level and the old peak despite rounding
        *peak = (*peak * decay + level * (1.0 - decay)).min(*peak).max(level);
      }
    }
  }

  /// Frequencies of the audible FFT bins, for diagnostics
  #[allow(dead_code)]
  pub fn bin_frequencies(&self) -> &[f32] {
    &self.bin_frequencies
  }
}

/// Symmetric Hann window (`0.5 - 0.5 cos(2πn / (N - 1))`)
fn hann_window(len: usize) -> Vec<f32> {
  if len == 1 {
    return vec![1.0];
  }
  let denominator = (len - 1) as f32;
  (0..len)
    .map(|n| 0.5 - 0.5 * (2.0 * std::f32::consts::PI * n as f32 / denominator).cos())
    .collect()
}

/// RMS of the weighted magnitudes in dB, `-inf` when empty or silent
fn band_level(magnitudes: &[f32]) -> f32 {
  if magnitudes.is_empty() {
    return f32::NEG_INFINITY;
  }
  // squares of loud bins overflow f32
  let mean_square = magnitudes
    .iter()
    .map(|&m| f64::from(m.min(f32::MAX)).powi(2))
    .sum::<f64>()
    / magnitudes.len() as f64;
  let rms = mean_square.sqrt();
  if rms > 0.0 {
    (20.0 * rms.log10()) as f32
  } else {
    f32::NEG_INFINITY
  }
}

/// Index and level of the loudest band, ignoring non-finite levels.
pub fn loudest_band(levels: &[f32]) -> Option<(usize, f32)> {
  levels
    .iter()
    .copied()
    .enumerate()
    .filter(|(_, level)| level.is_finite())
    .max_by(|(_, a), (_, b)| a.total_cmp(b))
}
