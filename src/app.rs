use crate::driver::{DriverState, PresentationDriver};
use crate::sink::{SharedSpectrum, SpectrumSnapshot};
use crate::user_config::{UserConfig, VisualizerStyle};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::sync::Arc;

/// What a key press asks the main loop to do
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
  ToggleCapture,
  CycleVisualizer,
  Quit,
}

impl Action {
  pub fn from_key(key: KeyEvent) -> Option<Action> {
    if key.kind != KeyEventKind::Press {
      return None;
    }
    match key.code {
      KeyCode::Char(' ') => Some(Action::ToggleCapture),
      KeyCode::Char('v') | KeyCode::Char('V') => Some(Action::CycleVisualizer),
      KeyCode::Char('q') | KeyCode::Esc => Some(Action::Quit),
      KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Action::Quit),
      _ => None,
    }
  }
}

/// View state read by the UI on every frame
pub struct App {
  pub user_config: UserConfig,
  pub spectrum: Arc<SharedSpectrum>,
  pub visualizer_style: VisualizerStyle,
  pub driver_state: DriverState,
  pub device_name: Option<String>,
  pub last_error: Option<String>,
}

impl App {
  pub fn new(user_config: UserConfig, spectrum: Arc<SharedSpectrum>) -> App {
    App {
      visualizer_style: user_config.display.visualizer_style,
      user_config,
      spectrum,
      driver_state: DriverState::Stopped,
      device_name: None,
      last_error: None,
    }
  }

  /// Copy what the UI shows from the driver
  pub fn sync(&mut self, driver: &PresentationDriver) {
    self.driver_state = driver.state();
    self.device_name = driver.device_name().map(str::to_string);
    self.last_error = driver.last_error().map(str::to_string);
  }

  pub fn cycle_visualizer_style(&mut self) {
    self.visualizer_style = self.visualizer_style.next();
  }

  pub fn is_capturing(&self) -> bool {
    self.driver_state == DriverState::Running
  }

  pub fn snapshot(&self) -> Option<SpectrumSnapshot> {
    self.spectrum.latest()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::KeyEventState;

  fn press(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  #[test]
  fn key_bindings() {
    assert_eq!(
      Action::from_key(press(KeyCode::Char(' '))),
      Some(Action::ToggleCapture)
    );
    assert_eq!(
      Action::from_key(press(KeyCode::Char('v'))),
      Some(Action::CycleVisualizer)
    );
    assert_eq!(Action::from_key(press(KeyCode::Char('q'))), Some(Action::Quit));
    assert_eq!(Action::from_key(press(KeyCode::Esc)), Some(Action::Quit));
    assert_eq!(
      Action::from_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
      Some(Action::Quit)
    );
    assert_eq!(Action::from_key(press(KeyCode::Char('x'))), None);
  }

  #[test]
  fn key_release_is_ignored() {
    let release = KeyEvent {
      code: KeyCode::Char(' '),
      modifiers: KeyModifiers::NONE,
      kind: KeyEventKind::Release,
      state: KeyEventState::NONE,
    };
    assert_eq!(Action::from_key(release), None);
  }

  #[test]
  fn style_starts_from_config_and_cycles() {
    let mut user_config = UserConfig::new();
    user_config.display.visualizer_style = VisualizerStyle::Equalizer;
    let mut app = App::new(user_config, Arc::new(SharedSpectrum::new()));

    assert_eq!(app.visualizer_style, VisualizerStyle::Equalizer);
    app.cycle_visualizer_style();
    assert_eq!(app.visualizer_style, VisualizerStyle::BarGraph);
    assert!(!app.is_capturing());
  }
}
