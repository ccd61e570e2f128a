use anyhow::{bail, Result};
use serde::Deserialize;
use tracing_subscriber::{
	filter::LevelFilter, fmt, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
	EnvFilter,
};

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
	/// one of `debug`, `info`, `warn` or `error`
	pub level: String,
}

impl LogSettings {
	pub fn level_filter(&self) -> Result<LevelFilter> {
		match self.level.to_ascii_lowercase().as_str() {
			"debug" => Ok(LevelFilter::DEBUG),
			"info" => Ok(LevelFilter::INFO),
			"warn" => Ok(LevelFilter::WARN),
			"error" => Ok(LevelFilter::ERROR),
			level => bail!("invalid log level {level:?}, expected one of debug, info, warn, error"),
		}
	}
}

pub fn setup_logging(settings: &LogSettings) -> Result<()> {
	let level = settings.level_filter()?;

	let fmt_layer = fmt::layer();

	let filter_layer = EnvFilter::default()
		.add_directive(level.into())
		.add_directive("hyper=warn".parse()?)
		.add_directive("reqwest=warn".parse()?);

	tracing_subscriber::registry().with(filter_layer).with(fmt_layer).try_init()?;

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn settings(level: &str) -> LogSettings {
		LogSettings { level: level.to_owned() }
	}

	#[test]
	fn parses_levels_case_insensitively() {
		assert_eq!(settings("debug").level_filter().unwrap(), LevelFilter::DEBUG);
		assert_eq!(settings("Info").level_filter().unwrap(), LevelFilter::INFO);
		assert_eq!(settings("WARN").level_filter().unwrap(), LevelFilter::WARN);
		assert_eq!(settings("error").level_filter().unwrap(), LevelFilter::ERROR);
	}

	#[test]
	fn rejects_unknown_levels() {
		assert!(settings("verbose").level_filter().is_err());
		assert!(settings("").level_filter().is_err());
		assert!(settings("trace").level_filter().is_err());
	}
}
