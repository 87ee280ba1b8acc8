/// Lowest frequency the analyzer looks at (Hz)
pub const AUDIBLE_MIN_HZ: f32 = 20.0;

/// Highest frequency the analyzer looks at (Hz)
pub const AUDIBLE_MAX_HZ: f32 = 20_000.0;

/// Nominal 1/3-octave centers (IEC 61260) covering the audible range
const NOMINAL_CENTERS: [f32; 31] = [
  20.0, 25.0, 31.5, 40.0, 50.0, 63.0, 80.0, 100.0, 125.0, 160.0, 200.0, 250.0, 315.0, 400.0, 500.0,
  630.0, 800.0, 1000.0, 1250.0, 1600.0, 2000.0, 2500.0, 3150.0, 4000.0, 5000.0, 6300.0, 8000.0,
  10000.0, 12500.0, 16000.0, 20000.0,
];

/// A-weighting gain in dB at `frequency` Hz (IEC 61672, 0 dB at 1 kHz).
pub fn a_weighting_db(frequency: f64) -> f64 {
  const F1: f64 = 20.6;
  const F2: f64 = 107.7;
  const F3: f64 = 737.9;
  const F4: f64 = 12194.0;

  let f2 = frequency * frequency;
  let f4 = f2 * f2;
  let numerator = F4 * F4 * f4;
  let denominator =
    (f2 + F1 * F1) * ((f2 + F2 * F2) * (f2 + F3 * F3)).sqrt() * (f2 + F4 * F4);

  20.0 * (numerator / denominator).log10() + 2.0
}

/// Fixed table of 1/3-octave band centers, strictly increasing and confined
/// to the audible range.
#[derive(Clone, Debug, PartialEq)]
pub struct BandTable {
  centers: Vec<f32>,
  factor: f32,
}

impl BandTable {
  pub fn third_octave() -> Self {
    // 1/3 octave in base-10 terms: G = 10^(3/10), edges at center * G^(±1/6)
    let g = 10f64.powf(3.0 / 10.0);
    let factor = g.powf(1.0 / 6.0) as f32;

    let centers = NOMINAL_CENTERS
      .iter()
      .copied()
      .filter(|center| (AUDIBLE_MIN_HZ..=AUDIBLE_MAX_HZ).contains(center))
      .collect();

    Self { centers, factor }
  }

  pub fn centers(&self) -> &[f32] {
    &self.centers
  }

  pub fn len(&self) -> usize {
    self.centers.len()
  }

  #[allow(dead_code)]
  pub fn is_empty(&self) -> bool {
    self.centers.is_empty()
  }

  /// Lower and upper edge of band `index`, clamped to the audible range
  pub fn limits(&self, index: usize) -> (f32, f32) {
    let center = self.centers[index];
    let lower = (center / self.factor).max(AUDIBLE_MIN_HZ);
    let upper = (center * self.factor).min(AUDIBLE_MAX_HZ);
    (lower, upper)
  }

  /// Index of the band whose center is closest to `frequency`
  #[allow(dead_code)]
  pub fn closest(&self, frequency: f32) -> Option<usize> {
    self
      .centers
      .iter()
      .enumerate()
      .min_by(|(_, a), (_, b)| {
        (*a - frequency)
          .abs()
          .total_cmp(&(*b - frequency).abs())
      })
      .map(|(index, _)| index)
  }
}

impl Default for BandTable {
  fn default() -> Self {
    Self::third_octave()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn a_weighting_reference_points() {
    assert!(a_weighting_db(1000.0).abs() < 0.05);
    assert!((a_weighting_db(100.0) - -19.1).abs() < 0.2);
    assert!((a_weighting_db(20.0) - -50.5).abs() < 0.3);
    assert!((a_weighting_db(10_000.0) - -2.5).abs() < 0.2);
  }

  #[test]
  fn a_weighting_attenuates_both_ends() {
    assert!(a_weighting_db(50.0) < a_weighting_db(500.0));
    assert!(a_weighting_db(20_000.0) < a_weighting_db(2_500.0));
  }

  #[test]
  fn band_table_is_strictly_increasing_and_audible() {
    let table = BandTable::third_octave();
    assert_eq!(table.len(), 31);
    assert!(table.centers().windows(2).all(|pair| pair[0] < pair[1]));
    assert!(table
      .centers()
      .iter()
      .all(|center| (AUDIBLE_MIN_HZ..=AUDIBLE_MAX_HZ).contains(center)));
  }

  #[test]
  fn band_limits_use_third_octave_factor() {
    let table = BandTable::third_octave();
    assert!((table.factor - 1.122_018_5).abs() < 1e-5);

    let index = table.closest(1000.0).unwrap();
    let (lower, upper) = table.limits(index);
    assert!((lower - 891.25).abs() < 0.01);
    assert!((upper - 1122.02).abs() < 0.01);
  }

  #[test]
  fn edge_bands_are_clamped() {
    let table = BandTable::third_octave();
    assert_eq!(table.limits(0).0, AUDIBLE_MIN_HZ);
    assert_eq!(table.limits(table.len() - 1).1, AUDIBLE_MAX_HZ);
  }

  #[test]
  fn closest_band_to_440_is_400() {
    let table = BandTable::third_octave();
    let index = table.closest(440.0).unwrap();
    assert_eq!(table.centers()[index], 400.0);
  }
}
