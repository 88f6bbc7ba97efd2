// File: args.rs
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use stream_player::{AbrAlgorithm, PlayerConfig, Result};
use tracing::level_filters::LevelFilter;

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, ValueEnum)]
pub enum LogLevel {
    Trace = 0, // Designates very fine-grained informational events, extremely verbose.
    Debug = 1, // Designates fine-grained informational events.
    Info = 2, // Designates informational messages.
    Warn = 3, // Designates hazardous situations.
    Error = 4, // Designates very serious errors.
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, ValueEnum)]
pub enum Algorithm {
    Adaptive,
    Fixed,
    Random,
}

impl From<Algorithm> for AbrAlgorithm {
    fn from(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Adaptive => AbrAlgorithm::Adaptive,
            Algorithm::Fixed => AbrAlgorithm::Fixed,
            Algorithm::Random => AbrAlgorithm::Random,
        }
    }
}

#[derive(Parser, Debug)]
#[command(version, about, long_about="A headless client that plays an adaptive stream and stores the media it buffers.")]
pub struct Args {
    /// Manifest URL, `.mpd` for DASH, anything else is read as Smooth Streaming
    #[arg(short, long)]
    pub url: Option<String>,
    #[arg(short, long)]
    pub algorithm: Option<Algorithm>,
    /// Level pinned by the fixed algorithm
    #[arg(long)]
    pub level: Option<usize>,
    /// Preferred protection flavor
    #[arg(short, long)]
    pub flavor: Option<String>,
    /// Wait for enough buffered media instead of starting playback right away
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub autoplay: bool,
    #[arg(short, long, default_value = "output")]
    pub output_dir: PathBuf,
    /// Stop after this many seconds of presentation time
    #[arg(short, long)]
    pub max_duration: Option<f64>,
    #[arg(short, long, default_value = "info")]
    pub log_level: LogLevel,
    /// JSON player configuration, flags take precedence
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

pub fn parse_args() -> Args {
    Args::parse()
}

pub fn get_log_level_filter(args: &Args) -> LevelFilter {
    // Map the LogLevel enum to the LevelFilter enum
    match args.log_level {
        LogLevel::Trace => LevelFilter::TRACE,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Error => LevelFilter::ERROR,
    }
}

/// Loads the configuration file, if any, and applies the flags on top.
pub fn player_config(args: &Args) -> Result<PlayerConfig> {
    let mut config = match &args.config {
        Some(path) => PlayerConfig::from_json_file(path)?,
        None => PlayerConfig::default(),
    };
    if let Some(url) = &args.url {
        config.url = url.clone();
    }
    if let Some(algorithm) = args.algorithm {
        config.algorithm = algorithm.into();
    }
    if args.level.is_some() {
        config.level = args.level;
    }
    if args.flavor.is_some() {
        config.flavor = args.flavor.clone();
    }
    if args.autoplay {
        config.autoplay = true;
    }
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stream_player::PlayerError;

    fn parse(flags: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("stream-client").chain(flags.iter().copied())).unwrap()
    }

    #[test]
    fn flags_build_the_player_config() {
        let args = parse(&["--url", "http://h/a.mpd", "--algorithm", "fixed", "--level", "2", "--autoplay", "-l", "debug"]);
        assert_eq!(get_log_level_filter(&args), LevelFilter::DEBUG);
        let config = player_config(&args).unwrap();
        assert_eq!(config.url, "http://h/a.mpd");
        assert_eq!(config.algorithm, AbrAlgorithm::Fixed);
        assert_eq!(config.level, Some(2));
        assert!(config.autoplay);
        assert_eq!(config.tick_interval_ms, 250);
    }

    #[test]
    fn flags_override_the_config_file() {
        let path = std::env::temp_dir().join(format!("stream-client-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"url": "http://h/file.mpd", "algorithm": "random", "autoplay": true}"#).unwrap();
        let args = parse(&["--config", path.to_str().unwrap(), "--url", "http://h/flag.ism/Manifest"]);
        let config = player_config(&args).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.url, "http://h/flag.ism/Manifest");
        assert_eq!(config.algorithm, AbrAlgorithm::Random);
        assert!(config.autoplay);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        assert!(matches!(player_config(&parse(&[])), Err(PlayerError::Config(_))));
        let fixed_without_level = parse(&["--url", "http://h/a.mpd", "--algorithm", "fixed"]);
        assert!(matches!(player_config(&fixed_without_level), Err(PlayerError::Config(_))));
        assert!(Args::try_parse_from(["stream-client", "--algorithm", "greedy"]).is_err());
    }
}
