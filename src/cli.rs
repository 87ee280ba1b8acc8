use crate::audio::DeviceSelector;
use crate::user_config::{UserConfig, UserConfigPaths};
use anyhow::{anyhow, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use clap_complete::Shell;
use std::path::PathBuf;

pub fn build_cli() -> Command {
  Command::new(env!("CARGO_PKG_NAME"))
    .version(env!("CARGO_PKG_VERSION"))
    .author(env!("CARGO_PKG_AUTHORS"))
    .about(env!("CARGO_PKG_DESCRIPTION"))
    .override_usage("rta [OPTIONS]   (space: start/stop, v: switch style, q: quit)")
    .after_help("Settings are read from $HOME/.config/rta/config.yml unless --config is given")
    .arg(
      Arg::new("config")
        .short('c')
        .long("config")
        .value_name("FILE")
        .help("Specify configuration file path."),
    )
    .arg(
      Arg::new("sample-rate")
        .short('r')
        .long("sample-rate")
        .value_name("HZ")
        .value_parser(clap::value_parser!(u32))
        .help("Capture sample rate in Hz"),
    )
    .arg(
      Arg::new("chunk-size")
        .short('n')
        .long("chunk-size")
        .value_name("SAMPLES")
        .value_parser(clap::value_parser!(usize))
        .help("Samples per analysis frame (power of two)")
        .long_help(
          "Number of samples per analysis frame, a power of two between 256 and 65536. \
Larger frames resolve the low bands better but react more slowly.",
        ),
    )
    .arg(
      Arg::new("tick-rate")
        .short('t')
        .long("tick-rate")
        .value_name("MS")
        .value_parser(clap::value_parser!(u64))
        .help("Set the tick rate (milliseconds): the lower the number the higher the FPS."),
    )
    .arg(
      Arg::new("device")
        .short('d')
        .long("device")
        .value_name("DEVICE")
        .help("Input device to capture, by index or by part of its name"),
    )
    .arg(
      Arg::new("device-marker")
        .long("device-marker")
        .value_name("TEXT")
        .help("Name fragment used to pick a device when none is given (default: blackhole)"),
    )
    .arg(
      Arg::new("list-devices")
        .short('l')
        .long("list-devices")
        .action(ArgAction::SetTrue)
        .help("List input devices and exit"),
    )
    .arg(
      Arg::new("headless")
        .long("headless")
        .action(ArgAction::SetTrue)
        .help("Print a summary line every second instead of drawing the UI"),
    )
    .arg(
      Arg::new("verbose")
        .short('v')
        .long("verbose")
        .action(ArgAction::SetTrue)
        .help("Write debug messages to the log file"),
    )
    .arg(
      Arg::new("completions")
        .long("completions")
        .help("Generates completions for your preferred shell")
        .value_parser(["bash", "zsh", "fish", "power-shell", "elvish"])
        .value_name("SHELL"),
    )
}

pub fn shell_from_name(name: &str) -> Result<Shell> {
  match name {
    "fish" => Ok(Shell::Fish),
    "bash" => Ok(Shell::Bash),
    "zsh" => Ok(Shell::Zsh),
    "power-shell" => Ok(Shell::PowerShell),
    "elvish" => Ok(Shell::Elvish),
    _ => Err(anyhow!("no completions available for '{}'", name)),
  }
}

/// Path given with `--config`, if any
pub fn config_path(matches: &ArgMatches) -> Option<UserConfigPaths> {
  matches
    .get_one::<String>("config")
    .map(|path| UserConfigPaths {
      config_file_path: PathBuf::from(path),
    })
}

/// Command line flags win over the config file
pub fn apply_overrides(matches: &ArgMatches, user_config: &mut UserConfig) -> Result<()> {
  if let Some(sample_rate) = matches.get_one::<u32>("sample-rate") {
    user_config.set_sample_rate(*sample_rate)?;
  }

  if let Some(chunk_size) = matches.get_one::<usize>("chunk-size") {
    user_config.set_chunk_size(*chunk_size)?;
  }

  if let Some(tick_rate) = matches.get_one::<u64>("tick-rate") {
    user_config.set_tick_rate(*tick_rate)?;
  }

  if let Some(device) = matches.get_one::<String>("device") {
    let selector: DeviceSelector = device
      .parse()
      .map_err(|_| anyhow!("Invalid device {}", device))?;
    user_config.capture.device = Some(selector);
  }

  if let Some(marker) = matches.get_one::<String>("device-marker") {
    user_config.set_device_marker(marker)?;
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn parse(args: &[&str]) -> ArgMatches {
    build_cli()
      .try_get_matches_from(std::iter::once("rta").chain(args.iter().copied()))
      .unwrap()
  }

  #[test]
  fn cli_definition_is_consistent() {
    build_cli().debug_assert();
  }

  #[test]
  fn flags_override_the_config() {
    let matches = parse(&[
      "--sample-rate",
      "44100",
      "--chunk-size",
      "2048",
      "--tick-rate",
      "30",
      "--device",
      "2",
      "--device-marker",
      "loopback",
    ]);
    let mut user_config = UserConfig::new();
    apply_overrides(&matches, &mut user_config).unwrap();

    assert_eq!(user_config.analyzer.sample_rate, 44_100);
    assert_eq!(user_config.analyzer.chunk_size, 2048);
    assert_eq!(user_config.analyzer.tick_rate_milliseconds, 30);
    assert_eq!(user_config.capture.device, Some(DeviceSelector::Index(2)));
    assert_eq!(user_config.capture.device_marker, "loopback");
  }

  #[test]
  fn device_name_is_kept_as_text() {
    let matches = parse(&["-d", "USB Audio"]);
    let mut user_config = UserConfig::new();
    apply_overrides(&matches, &mut user_config).unwrap();
    assert_eq!(
      user_config.capture.device,
      Some(DeviceSelector::Name("USB Audio".to_string()))
    );
  }

  #[test]
  fn out_of_range_flags_are_rejected() {
    let mut user_config = UserConfig::new();
    assert!(apply_overrides(&parse(&["--tick-rate", "1000"]), &mut user_config).is_err());
    assert!(apply_overrides(&parse(&["--chunk-size", "3000"]), &mut user_config).is_err());
  }

  #[test]
  fn no_flags_leave_the_config_alone() {
    let matches = parse(&[]);
    let mut user_config = UserConfig::new();
    apply_overrides(&matches, &mut user_config).unwrap();
    assert_eq!(user_config, UserConfig::new());
    assert!(config_path(&matches).is_none());
  }

  #[test]
  fn unknown_shell_is_an_error() {
    assert!(shell_from_name("zsh").is_ok());
    assert!(shell_from_name("tcsh").is_err());
  }
}
