mod app;
mod audio;
mod cli;
mod driver;
mod sink;
mod ui;
mod user_config;

use crate::app::{Action, App};
use crate::audio::{select_input_device, AudioBackend};
use crate::driver::{DriverState, PresentationDriver};
use crate::sink::{format_peak, SharedSpectrum};
use anyhow::{anyhow, Result};
use backtrace::Backtrace;
use clap_complete::generate;
use crossterm::event::{self, Event};
use log::{info, warn};
use std::{
  fs,
  io::{self, Write},
  panic,
  path::PathBuf,
  sync::Arc,
  time::Duration,
};
use tokio::time::MissedTickBehavior;
use user_config::UserConfig;

const HEADLESS_INTERVAL: Duration = Duration::from_secs(1);

fn setup_logging(verbose: bool) -> Result<PathBuf> {
  let pid = std::process::id();

  let log_dir = PathBuf::from("/tmp/rta_logs");
  let log_path = log_dir.join(format!("rtalog{}", pid));

  if !log_dir.exists() {
    fs::create_dir_all(&log_dir)
      .map_err(|e| anyhow!("Failed to create log directory {}: {}", log_dir.display(), e))?;
  }

  let level = if verbose {
    log::LevelFilter::Debug
  } else {
    log::LevelFilter::Info
  };

  fern::Dispatch::new()
    .format(|out, message, record| {
      out.finish(format_args!(
        "{}[{}][{}] {}",
        chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
        record.target(),
        record.level(),
        message
      ))
    })
    .level(level)
    .chain(fern::log_file(&log_path)?)
    .apply()
    .map_err(|e| anyhow!("Failed to initialize logger: {}", e))?;

  Ok(log_path)
}

fn install_panic_hook() {
  let default_hook = panic::take_hook();
  panic::set_hook(Box::new(move |info| {
    ratatui::restore();
    let panic_log_path =
      dirs::home_dir().map(|home| home.join(".config").join("rta").join("rta_panic.log"));

    if let Some(path) = panic_log_path.as_ref() {
      if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
      }
      if let Ok(mut f) = fs::OpenOptions::new().create(true).append(true).open(path) {
        let _ = writeln!(f, "\n==== rta panic ====");
        let _ = writeln!(f, "{}", info);
        let _ = writeln!(f, "{:?}", Backtrace::new());
      }
      eprintln!("A crash log was written to: {}", path.to_string_lossy());
    }
    default_hook(info);
  }));
}

#[cfg(feature = "cpal-backend")]
fn audio_backend() -> Result<Arc<dyn AudioBackend>> {
  Ok(Arc::new(audio::CpalBackend::new()))
}

#[cfg(not(feature = "cpal-backend"))]
fn audio_backend() -> Result<Arc<dyn AudioBackend>> {
  Err(anyhow!(
    "rta was built without an audio backend, rebuild with the cpal-backend feature"
  ))
}

fn list_devices(backend: &dyn AudioBackend, user_config: &UserConfig) -> Result<()> {
  let devices = backend.list_input_devices()?;
  if devices.is_empty() {
    println!("No audio devices found");
    return Ok(());
  }

  let selected = select_input_device(
    &devices,
    user_config.capture.device.as_ref(),
    &user_config.capture.device_marker,
  )
  .ok();

  for device in &devices {
    let mark = if Some(device.index) == selected {
      "  <- selected"
    } else {
      ""
    };
    println!(
      "[{}] {} ({} channels){}",
      device.index, device.name, device.max_input_channels, mark
    );
  }

  if selected.is_none() {
    println!("No device matched, the system default input will be used");
  }
  Ok(())
}

/// Print one summary line per second until Ctrl-C or a capture failure
async fn run_headless(mut driver: PresentationDriver, spectrum: Arc<SharedSpectrum>) -> Result<()> {
  driver.start().await?;
  println!(
    "Capturing from {} (Ctrl-C to stop)",
    driver.device_name().unwrap_or("the default input")
  );

  let mut ticker = tokio::time::interval(HEADLESS_INTERVAL);
  ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
  let mut last_sequence = 0;

  loop {
    tokio::select! {
      _ = tokio::signal::ctrl_c() => break,
      _ = ticker.tick() => {
        if driver.refresh().await? == DriverState::Stopped {
          break;
        }
        let latest = spectrum.latest();
        let sequence = latest.as_ref().map_or(0, |s| s.sequence);
        if sequence == last_sequence {
          println!("{} (no new audio)", format_peak(latest.as_ref()));
        } else {
          println!("{}", format_peak(latest.as_ref()));
        }
        last_sequence = sequence;
      }
    }
  }

  driver.stop().await?;
  match driver.last_error() {
    Some(message) => Err(anyhow!("{}", message)),
    None => Ok(()),
  }
}

async fn run_tui(mut driver: PresentationDriver, mut app: App) -> Result<()> {
  let mut terminal = ratatui::init();
  let result = tui_loop(&mut terminal, &mut driver, &mut app).await;
  let stopped = driver.stop().await;
  ratatui::restore();
  result.and(stopped)
}

async fn tui_loop(
  terminal: &mut ratatui::DefaultTerminal,
  driver: &mut PresentationDriver,
  app: &mut App,
) -> Result<()> {
  let poll_timeout = Duration::from_millis(app.user_config.analyzer.tick_rate_milliseconds);

  // a failed start is shown in the UI, the user can retry with space
  if let Err(e) = driver.start().await {
    warn!("could not start capture: {}", e);
  }

  loop {
    driver.refresh().await?;
    app.sync(driver);
    terminal.draw(|f| ui::draw(f, app))?;

    if !event::poll(poll_timeout)? {
      continue;
    }
    let Event::Key(key) = event::read()? else {
      continue;
    };

    match Action::from_key(key) {
      Some(Action::ToggleCapture) => {
        if let Err(e) = driver.toggle().await {
          warn!("could not start capture: {}", e);
        }
      }
      Some(Action::CycleVisualizer) => {
        app.cycle_visualizer_style();
        info!("visualizer style: {}", app.visualizer_style.name());
      }
      Some(Action::Quit) => return Ok(()),
      None => {}
    }
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  let mut clap_app = cli::build_cli();
  let matches = clap_app.clone().get_matches();

  // completions go to stdout, so nothing else may print before them
  if let Some(s) = matches.get_one::<String>("completions") {
    let shell = cli::shell_from_name(s)?;
    generate(shell, &mut clap_app, "rta", &mut io::stdout());
    return Ok(());
  }

  let headless = matches.get_flag("headless");
  let log_path = setup_logging(matches.get_flag("verbose"))?;
  if headless {
    println!("Logging to: {}", log_path.display());
  }
  info!("rta {} starting up", env!("CARGO_PKG_VERSION"));
  install_panic_hook();

  let mut user_config = UserConfig::new();
  if let Some(path) = cli::config_path(&matches) {
    user_config.path_to_config.replace(path);
  }
  user_config.load_config()?;
  cli::apply_overrides(&matches, &mut user_config)?;
  info!("user config loaded successfully");

  let backend = audio_backend()?;

  if matches.get_flag("list-devices") {
    return list_devices(backend.as_ref(), &user_config);
  }

  let spectrum = Arc::new(SharedSpectrum::new());
  let driver = PresentationDriver::new(user_config.driver_settings(), backend, spectrum.clone());

  if headless {
    run_headless(driver, spectrum).await
  } else {
    run_tui(driver, App::new(user_config, spectrum)).await
  }
}
