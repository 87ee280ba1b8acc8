use crate::audio::{CaptureRequest, DeviceSelector, DEFAULT_DEVICE_MARKER};
use crate::driver::DriverSettings;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::{
  fs,
  path::{Path, PathBuf},
  time::Duration,
};

const FILE_NAME: &str = "config.yml";
const CONFIG_DIR: &str = ".config";
const APP_CONFIG_DIR: &str = "rta";

/// Visualizer style for the spectrum view
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VisualizerStyle {
  /// Continuous braille bar graph with a gradient (tui-bar-graph)
  #[default]
  BarGraph,
  /// Classic segmented equalizer (tui-equalizer)
  Equalizer,
}

impl VisualizerStyle {
  pub fn name(&self) -> &'static str {
    match self {
      VisualizerStyle::BarGraph => "Bar Graph",
      VisualizerStyle::Equalizer => "Equalizer",
    }
  }

  pub fn next(&self) -> Self {
    match self {
      VisualizerStyle::BarGraph => VisualizerStyle::Equalizer,
      VisualizerStyle::Equalizer => VisualizerStyle::BarGraph,
    }
  }
}

/// A device as written in the config file: either an index or part of a name
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DeviceString {
  Index(usize),
  Name(String),
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct AnalyzerConfigString {
  pub sample_rate: Option<u32>,
  pub chunk_size: Option<usize>,
  pub tick_rate_milliseconds: Option<u64>,
  pub peak_decay: Option<f32>,
  pub queue_capacity: Option<usize>,
  pub channels: Option<u16>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct CaptureConfigString {
  pub device: Option<DeviceString>,
  pub device_marker: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct DisplayConfigString {
  pub floor_db: Option<f32>,
  pub ceiling_db: Option<f32>,
  pub visualizer_style: Option<VisualizerStyle>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct UserConfigString {
  analyzer: Option<AnalyzerConfigString>,
  capture: Option<CaptureConfigString>,
  display: Option<DisplayConfigString>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnalyzerConfig {
  pub sample_rate: u32,
  pub chunk_size: usize,
  pub tick_rate_milliseconds: u64,
  pub peak_decay: f32,
  pub queue_capacity: usize,
  pub channels: u16,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CaptureConfig {
  pub device: Option<DeviceSelector>,
  pub device_marker: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DisplayConfig {
  pub floor_db: f32,
  pub ceiling_db: f32,
  pub visualizer_style: VisualizerStyle,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UserConfigPaths {
  pub config_file_path: PathBuf,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UserConfig {
  pub analyzer: AnalyzerConfig,
  pub capture: CaptureConfig,
  pub display: DisplayConfig,
  pub path_to_config: Option<UserConfigPaths>,
}

impl UserConfig {
  pub fn new() -> UserConfig {
    UserConfig {
      analyzer: AnalyzerConfig {
        sample_rate: 48_000,
        chunk_size: 8192,
        tick_rate_milliseconds: 16,
        peak_decay: 0.95,
        queue_capacity: 10,
        channels: 2,
      },
      capture: CaptureConfig {
        device: None,
        device_marker: DEFAULT_DEVICE_MARKER.to_string(),
      },
      display: DisplayConfig {
        floor_db: -80.0,
        ceiling_db: 10.0,
        visualizer_style: VisualizerStyle::default(),
      },
      path_to_config: None,
    }
  }

  pub fn get_or_build_paths(&mut self) -> Result<()> {
    match dirs::home_dir() {
      Some(home) => {
        let path = Path::new(&home);
        let home_config_dir = path.join(CONFIG_DIR);
        let app_config_dir = home_config_dir.join(APP_CONFIG_DIR);

        if !home_config_dir.exists() {
          fs::create_dir(&home_config_dir)?;
        }

        if !app_config_dir.exists() {
          fs::create_dir(&app_config_dir)?;
        }

        let config_file_path = &app_config_dir.join(FILE_NAME);

        let paths = UserConfigPaths {
          config_file_path: config_file_path.to_path_buf(),
        };
        self.path_to_config = Some(paths);
        Ok(())
      }
      None => Err(anyhow!("No $HOME directory found for config")),
    }
  }

  pub fn load_analyzer_config(&mut self, analyzer: AnalyzerConfigString) -> Result<()> {
    if let Some(sample_rate) = analyzer.sample_rate {
      self.set_sample_rate(sample_rate)?;
    }

    if let Some(chunk_size) = analyzer.chunk_size {
      self.set_chunk_size(chunk_size)?;
    }

    if let Some(tick_rate) = analyzer.tick_rate_milliseconds {
      self.set_tick_rate(tick_rate)?;
    }

    if let Some(peak_decay) = analyzer.peak_decay {
      if !(0.0..1.0).contains(&peak_decay) {
        return Err(anyhow!(
          "Peak decay must be at least 0.0 and below 1.0, is {}",
          peak_decay
        ));
      }
      self.analyzer.peak_decay = peak_decay;
    }

    if let Some(queue_capacity) = analyzer.queue_capacity {
      if queue_capacity == 0 {
        return Err(anyhow!("Queue capacity must be at least 1"));
      }
      self.analyzer.queue_capacity = queue_capacity;
    }

    if let Some(channels) = analyzer.channels {
      if !(1..=8).contains(&channels) {
        return Err(anyhow!("Channels must be between 1 and 8, is {}", channels));
      }
      self.analyzer.channels = channels;
    }

    Ok(())
  }

  pub fn load_capture_config(&mut self, capture: CaptureConfigString) -> Result<()> {
    if let Some(device) = capture.device {
      self.capture.device = Some(match device {
        DeviceString::Index(index) => DeviceSelector::Index(index),
        DeviceString::Name(name) => name
          .parse()
          .map_err(|_| anyhow!("Invalid device {}", name))?,
      });
    }

    if let Some(marker) = capture.device_marker {
      self.set_device_marker(&marker)?;
    }

    Ok(())
  }

  pub fn load_display_config(&mut self, display: DisplayConfigString) -> Result<()> {
    let floor_db = display.floor_db.unwrap_or(self.display.floor_db);
    let ceiling_db = display.ceiling_db.unwrap_or(self.display.ceiling_db);
    if !floor_db.is_finite() || !ceiling_db.is_finite() || floor_db >= ceiling_db {
      return Err(anyhow!(
        "Display floor ({} dB) must be below the ceiling ({} dB)",
        floor_db,
        ceiling_db
      ));
    }
    self.display.floor_db = floor_db;
    self.display.ceiling_db = ceiling_db;

    if let Some(visualizer_style) = display.visualizer_style {
      self.display.visualizer_style = visualizer_style;
    }

    Ok(())
  }

  pub fn set_sample_rate(&mut self, sample_rate: u32) -> Result<()> {
    if !(8_000..=192_000).contains(&sample_rate) {
      return Err(anyhow!(
        "Sample rate must be between 8000 and 192000 Hz, is {}",
        sample_rate
      ));
    }
    self.analyzer.sample_rate = sample_rate;
    Ok(())
  }

  pub fn set_chunk_size(&mut self, chunk_size: usize) -> Result<()> {
    if !chunk_size.is_power_of_two() || !(256..=65_536).contains(&chunk_size) {
      return Err(anyhow!(
        "Chunk size must be a power of two between 256 and 65536, is {}",
        chunk_size
      ));
    }
    self.analyzer.chunk_size = chunk_size;
    Ok(())
  }

  pub fn set_tick_rate(&mut self, tick_rate: u64) -> Result<()> {
    if tick_rate == 0 || tick_rate >= 1000 {
      return Err(anyhow!("Tick rate must be between 1 and 999 ms, is {}", tick_rate));
    }
    self.analyzer.tick_rate_milliseconds = tick_rate;
    Ok(())
  }

  pub fn set_device_marker(&mut self, marker: &str) -> Result<()> {
    let marker = marker.trim();
    if marker.is_empty() {
      return Err(anyhow!("Device marker must not be empty"));
    }
    self.capture.device_marker = marker.to_string();
    Ok(())
  }

  pub fn load_config(&mut self) -> Result<()> {
    if self.path_to_config.is_none() {
      self.get_or_build_paths()?;
    }
    let Some(paths) = &self.path_to_config else {
      return Err(anyhow!("Config path not initialized"));
    };

    if paths.config_file_path.exists() {
      let config_string = fs::read_to_string(&paths.config_file_path)?;
      self.load_from_str(&config_string)
    } else {
      Ok(())
    }
  }

  pub fn load_from_str(&mut self, config_string: &str) -> Result<()> {
    // serde fails if file is empty
    if config_string.trim().is_empty() {
      return Ok(());
    }

    let config_yml: UserConfigString = serde_yaml::from_str(config_string)?;

    if let Some(analyzer) = config_yml.analyzer {
      self.load_analyzer_config(analyzer)?;
    }
    if let Some(capture) = config_yml.capture {
      self.load_capture_config(capture)?;
    }
    if let Some(display) = config_yml.display {
      self.load_display_config(display)?;
    }

    Ok(())
  }

  pub fn driver_settings(&self) -> DriverSettings {
    DriverSettings {
      capture: CaptureRequest {
        sample_rate: self.analyzer.sample_rate,
        chunk_size: self.analyzer.chunk_size,
        channels: self.analyzer.channels,
        device: self.capture.device.clone(),
        device_marker: self.capture.device_marker.clone(),
      },
      tick_rate: Duration::from_millis(self.analyzer.tick_rate_milliseconds),
      peak_decay: self.analyzer.peak_decay,
      queue_capacity: self.analyzer.queue_capacity,
    }
  }
}

impl Default for UserConfig {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_match_the_documented_values() {
    let settings = UserConfig::new().driver_settings();
    assert_eq!(settings.capture.sample_rate, 48_000);
    assert_eq!(settings.capture.chunk_size, 8192);
    assert_eq!(settings.tick_rate, Duration::from_millis(16));
    assert_eq!(settings.peak_decay, 0.95);
    assert_eq!(settings.queue_capacity, 10);
    assert_eq!(settings.capture.device_marker, "blackhole");
  }

  #[test]
  fn empty_file_keeps_defaults() {
    let mut config = UserConfig::new();
    config.load_from_str("  \n").unwrap();
    assert_eq!(config, UserConfig::new());
  }

  #[test]
  fn full_file_is_applied() {
    let mut config = UserConfig::new();
    config
      .load_from_str(
        r#"
analyzer:
  sample_rate: 44100
  chunk_size: 4096
  tick_rate_milliseconds: 33
  peak_decay: 0.9
  queue_capacity: 4
  channels: 1
capture:
  device: "Loopback Audio"
  device_marker: soundflower
display:
  floor_db: -60
  ceiling_db: 0
  visualizer_style: Equalizer
"#,
      )
      .unwrap();

    assert_eq!(config.analyzer.sample_rate, 44_100);
    assert_eq!(config.analyzer.chunk_size, 4096);
    assert_eq!(config.analyzer.tick_rate_milliseconds, 33);
    assert_eq!(config.analyzer.peak_decay, 0.9);
    assert_eq!(config.analyzer.queue_capacity, 4);
    assert_eq!(config.analyzer.channels, 1);
    assert_eq!(
      config.capture.device,
      Some(DeviceSelector::Name("Loopback Audio".to_string()))
    );
    assert_eq!(config.capture.device_marker, "soundflower");
    assert_eq!(config.display.floor_db, -60.0);
    assert_eq!(config.display.visualizer_style, VisualizerStyle::Equalizer);
  }

  #[test]
  fn numeric_device_is_an_index() {
    let mut config = UserConfig::new();
    config.load_from_str("capture:\n  device: 3\n").unwrap();
    assert_eq!(config.capture.device, Some(DeviceSelector::Index(3)));
  }

  #[test]
  fn invalid_values_are_rejected() {
    for yml in [
      "analyzer:\n  tick_rate_milliseconds: 1000\n",
      "analyzer:\n  tick_rate_milliseconds: 0\n",
      "analyzer:\n  chunk_size: 1000\n",
      "analyzer:\n  sample_rate: 1000\n",
      "analyzer:\n  peak_decay: 1.0\n",
      "analyzer:\n  queue_capacity: 0\n",
      "analyzer:\n  channels: 0\n",
      "capture:\n  device_marker: \"  \"\n",
      "display:\n  floor_db: 10\n  ceiling_db: -10\n",
    ] {
      let mut config = UserConfig::new();
      assert!(config.load_from_str(yml).is_err(), "accepted {}", yml);
    }
  }

  #[test]
  fn visualizer_style_cycles() {
    assert_eq!(VisualizerStyle::BarGraph.next(), VisualizerStyle::Equalizer);
    assert_eq!(VisualizerStyle::Equalizer.next(), VisualizerStyle::BarGraph);
  }
}
