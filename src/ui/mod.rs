mod spectrum;

use crate::app::App;
use crate::sink::format_peak;
use ratatui::{
  layout::{Constraint, Layout},
  style::{Color, Style},
  text::{Line, Span},
  widgets::{Block, Borders, Paragraph},
  Frame,
};

pub use spectrum::DbScale;

const KEY_HINT: &str = "space: start/stop  v: style  q: quit";

pub fn draw(f: &mut Frame<'_>, app: &App) {
  let [info_area, visualizer_area] = f
    .area()
    .layout(&Layout::vertical([Constraint::Length(4), Constraint::Min(6)]));

  let text = Style::default().fg(Color::White);
  let gray = Style::default().fg(Color::DarkGray);
  let display = &app.user_config.display;
  let tick_rate = app.user_config.analyzer.tick_rate_milliseconds.max(1);
  let snapshot = app.snapshot();

  let info_block = Block::default()
    .title(Span::styled(
      format!("Real-Time Analyzer ({})", app.visualizer_style.name()),
      gray,
    ))
    .borders(Borders::ALL)
    .border_style(gray);

  let status_text = if app.is_capturing() {
    "[>] Capturing"
  } else {
    "[||] Stopped"
  };
  let device = app.device_name.as_deref().unwrap_or("no device");

  let second_line = match &app.last_error {
    Some(message) => Line::from(Span::styled(
      format!("Error: {}", message),
      Style::default().fg(Color::Red),
    )),
    None => Line::from(Span::styled(KEY_HINT, Style::default().fg(Color::Cyan))),
  };

  let texts = vec![
    Line::from(vec![
      Span::styled(status_text, text),
      Span::raw("  "),
      Span::styled(device, gray),
      Span::raw("  |  "),
      Span::styled(format_peak(snapshot.as_ref()), text),
      Span::raw("  |  "),
      Span::styled(format!("{} FPS", 1000 / tick_rate), gray),
    ]),
    second_line,
  ];
  f.render_widget(Paragraph::new(texts).block(info_block), info_area);

  let spectrum_block = Block::default()
    .borders(Borders::ALL)
    .style(text)
    .title(Span::styled(
      format!(
        "1/3 Octave Spectrum | A-weighted | {} to {} dB",
        display.floor_db, display.ceiling_db
      ),
      gray,
    ))
    .border_style(gray);

  match snapshot {
    Some(snapshot) => {
      let inner_area = spectrum_block.inner(visualizer_area);
      f.render_widget(spectrum_block, visualizer_area);
      let scale = DbScale {
        floor_db: display.floor_db,
        ceiling_db: display.ceiling_db,
      };
      spectrum::render(f, &snapshot, app.visualizer_style, scale, inner_area);
    }
    None => {
      let waiting = if app.is_capturing() {
        "Waiting for audio input..."
      } else {
        "Press space to start capturing"
      };
      f.render_widget(
        Paragraph::new(waiting).block(spectrum_block),
        visualizer_area,
      );
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sink::{RenderSink, SharedSpectrum};
  use crate::user_config::{UserConfig, VisualizerStyle};
  use ratatui::{backend::TestBackend, Terminal};
  use std::sync::Arc;

  fn screen(app: &App) -> String {
    let mut terminal = Terminal::new(TestBackend::new(100, 20)).unwrap();
    terminal.draw(|f| draw(f, app)).unwrap();
    terminal
      .backend()
      .buffer()
      .content()
      .iter()
      .map(|cell| cell.symbol())
      .collect()
  }

  fn app_with(levels: Option<Vec<f32>>) -> App {
    let spectrum = Arc::new(SharedSpectrum::new());
    if let Some(levels) = levels {
      let centers: Vec<f32> = (0..levels.len()).map(|i| 100.0 * (i + 1) as f32).collect();
      spectrum.render(&centers, &levels, &levels);
    }
    App::new(UserConfig::new(), spectrum)
  }

  #[test]
  fn stopped_without_data_prompts_to_start() {
    let out = screen(&app_with(None));
    assert!(out.contains("[||] Stopped"));
    assert!(out.contains("Peak: -- dB"));
    assert!(out.contains("Press space to start capturing"));
  }

  #[test]
  fn spectrum_shows_the_loudest_band() {
    let mut app = app_with(Some(vec![-60.0, -6.0, f32::NEG_INFINITY]));
    let out = screen(&app);
    assert!(out.contains("Peak: -6.0 dB @ 200"));

    app.visualizer_style = VisualizerStyle::Equalizer;
    let out = screen(&app);
    assert!(out.contains("Equalizer"));
  }

  #[test]
  fn error_replaces_the_key_hint() {
    let mut app = app_with(None);
    app.last_error = Some("input stream failed: device unplugged".to_string());
    let out = screen(&app);
    assert!(out.contains("device unplugged"));
    assert!(!out.contains(KEY_HINT));
  }
}
