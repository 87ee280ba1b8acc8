use crate::sink::{format_frequency, SpectrumSnapshot};
use crate::user_config::VisualizerStyle;
use ratatui::{
  buffer::Buffer,
  layout::{Constraint, Layout, Rect},
  style::{Color, Style},
  widgets::{Paragraph, Widget},
  Frame,
};

use tui_bar_graph::{BarGraph, BarStyle, ColorMode};
use tui_equalizer::{Band, Equalizer};

const PEAK_SYMBOL: &str = "─";
// taller equalizers get slow on some terminals
const MAX_EQ_HEIGHT: u16 = 24;

/// Maps band levels in dB onto 0.0..=1.0 of the bar height
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DbScale {
  pub floor_db: f32,
  pub ceiling_db: f32,
}

impl DbScale {
  pub fn ratio(&self, db: f32) -> f32 {
    if db.is_nan() || db == f32::NEG_INFINITY {
      return 0.0;
    }
    let span = (self.ceiling_db - self.floor_db).max(f32::EPSILON);
    ((db - self.floor_db) / span).clamp(0.0, 1.0)
  }
}

/// Split `width` columns between `count` bands in whole multiples of `unit`.
///
/// Returns `(offset, width)` per band, or nothing when a band would get
/// less than one unit.
pub fn band_spans(count: usize, width: u16, unit: u16) -> Vec<(u16, u16)> {
  let unit = unit.max(1);
  let units_total = (width / unit) as usize;
  if count == 0 || units_total < count {
    return Vec::new();
  }

  let per_band = units_total / count;
  let extra = units_total % count;

  let mut offset = 0;
  (0..count)
    .map(|index| {
      let band_width = (per_band + usize::from(index < extra)) as u16 * unit;
      let span = (offset, band_width);
      offset += band_width;
      span
    })
    .collect()
}

pub fn render(
  f: &mut Frame<'_>,
  snapshot: &SpectrumSnapshot,
  style: VisualizerStyle,
  scale: DbScale,
  area: Rect,
) {
  let [bars_area, labels_area] = area.layout(&Layout::vertical([
    Constraint::Min(1),
    Constraint::Length(1),
  ]));
  if bars_area.width == 0 || bars_area.height == 0 {
    return;
  }

  let levels: Vec<f32> = snapshot.levels.iter().map(|&db| scale.ratio(db)).collect();
  let peaks: Vec<f32> = snapshot.peaks.iter().map(|&db| scale.ratio(db)).collect();

  let unit = match style {
    VisualizerStyle::Equalizer => 2,
    VisualizerStyle::BarGraph => 1,
  };
  let spans = band_spans(levels.len(), bars_area.width, unit);
  if spans.is_empty() {
    f.render_widget(
      Paragraph::new(format!(
        "Window too narrow for {} bands",
        snapshot.levels.len()
      )),
      bars_area,
    );
    return;
  }

  let drawn_area = match style {
    VisualizerStyle::Equalizer => render_equalizer(f.buffer_mut(), &levels, &spans, bars_area),
    VisualizerStyle::BarGraph => render_bar_graph(f, &levels, &spans, bars_area),
  };

  let buf = f.buffer_mut();
  render_peak_markers(buf, &peaks, &spans, drawn_area);
  render_labels(buf, &snapshot.centers, &spans, labels_area);
}

/// Draw the equalizer for one 2-cell band per entry, then stretch each band
/// across its span. Returns the area actually drawn.
fn render_equalizer(buf: &mut Buffer, levels: &[f32], spans: &[(u16, u16)], area: Rect) -> Rect {
  let eq_bands: Vec<Band> = levels
    .iter()
    .map(|&ratio| Band::from(ratio as f64))
    .collect();

  let equalizer = Equalizer {
    bands: eq_bands,
    brightness: 1.0,
  };

  let render_height = area.height.clamp(1, MAX_EQ_HEIGHT);
  let base_width = (levels.len() as u16) * 2;

  let tmp_area = Rect::new(0, 0, base_width, render_height);
  let mut tmp = Buffer::empty(tmp_area);
  equalizer.render(tmp_area, &mut tmp);

  let render_area = Rect {
    x: area.x,
    y: area.y + area.height.saturating_sub(render_height),
    width: area.width,
    height: render_height,
  };

  // only the left cell of each band is drawn, repeat it across the span
  for (band_index, &(offset, width)) in spans.iter().enumerate() {
    let src_x = (band_index as u16) * 2;
    for y in 0..render_height {
      let cell = tmp[(src_x, y)].clone();
      for dx in 0..width {
        buf[(render_area.x + offset + dx, render_area.y + y)] = cell.clone();
      }
    }
  }

  render_area
}

fn render_bar_graph(f: &mut Frame<'_>, levels: &[f32], spans: &[(u16, u16)], area: Rect) -> Rect {
  // Braille packs two columns of dots per cell
  let mut data = Vec::with_capacity(area.width as usize * 2);
  for (&ratio, &(_, width)) in levels.iter().zip(spans) {
    data.extend(std::iter::repeat(ratio as f64).take(width as usize * 2));
  }
  data.resize(area.width as usize * 2, 0.0);

  let bar_graph = BarGraph::new(data)
    .with_gradient(colorgrad::preset::turbo())
    .with_bar_style(BarStyle::Braille)
    .with_color_mode(ColorMode::VerticalGradient)
    .with_max(1.0);

  f.render_widget(bar_graph, area);
  area
}

fn render_peak_markers(buf: &mut Buffer, peaks: &[f32], spans: &[(u16, u16)], area: Rect) {
  if area.height == 0 {
    return;
  }
  let style = Style::default().fg(Color::White);

  for (&peak, &(offset, width)) in peaks.iter().zip(spans) {
    if peak <= 0.0 {
      continue;
    }
    let rows = ((peak * area.height as f32).ceil() as u16).clamp(1, area.height);
    let y = area.y + area.height - rows;
    for dx in 0..width {
      buf[(area.x + offset + dx, y)]
        .set_symbol(PEAK_SYMBOL)
        .set_style(style);
    }
  }
}

/// Frequency labels under the bands, skipping any that would collide
fn render_labels(buf: &mut Buffer, centers: &[f32], spans: &[(u16, u16)], area: Rect) {
  if area.height == 0 {
    return;
  }
  let style = Style::default().fg(Color::Gray);
  let right = area.x + area.width;
  let mut next_free = area.x;

  for (&center, &(offset, _)) in centers.iter().zip(spans) {
    let label = format_frequency(center);
    let x = area.x + offset;
    let end = x + label.len() as u16;
    if x < next_free || end > right {
      continue;
    }
    buf.set_string(x, area.y, &label, style);
    next_free = end + 1;
  }
}
