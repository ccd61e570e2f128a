use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use config::{Config, File};
use serde::Deserialize;

use crate::{
	alert_renderer::TemplateSettings,
	alertmanager_webhook_receiver::AlertReceiverSettings,
	dingtalk::{settings::DEFAULT_API_URL, DingTalkSettings},
	log::LogSettings,
	telemetry_endpoint::TelemetryEndpointSettings,
};

/// config file read if `--config` isn't given, it's fine if it doesn't exist
const DEFAULT_CONFIG_PATH: &str = "./config.yaml";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
	pub log: LogSettings,
	pub alert_webhook_receiver: AlertReceiverSettings,
	pub template: TemplateSettings,
	pub dingtalk: DingTalkSettings,
	#[serde(default)]
	pub telemetry_endpoint: Option<TelemetryEndpointSettings>,
}

impl Settings {
	/// load settings from the command line arguments of the process
	pub fn load() -> Result<Self> {
		Self::from_matches(&command().get_matches())
	}

	/// Layer defaults, config file and command line flags, later layers win.
	fn from_matches(opts: &ArgMatches) -> Result<Self> {
		let (config_path, required) = match opts.get_one::<PathBuf>("config") {
			Some(path) => (path.clone(), true),
			None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
		};

		let conf = Config::builder()
			.set_default("log.level", "info")?
			.set_default("alert_webhook_receiver.address", ":6001")?
			.set_default("template.path", "./templates/base.tmpl")?
			.set_default("dingtalk.api_url", DEFAULT_API_URL)?
			.set_default("dingtalk.timeout", 10.0)?
			.add_source(File::from(config_path.as_path()).required(required))
			.set_override_option("log.level", opts.get_one::<String>("level").cloned())?
			.set_override_option(
				"alert_webhook_receiver.address",
				opts.get_one::<String>("addr").cloned(),
			)?
			.set_override_option(
				"template.path",
				opts.get_one::<PathBuf>("template").map(|path| path.to_string_lossy().into_owned()),
			)?
			.build()
			.context(format!("can't load config {config_path:?}"))?;

		conf.try_deserialize().context("can't load config")
	}
}

fn command() -> Command {
	Command::new(clap::crate_name!())
		.version(clap::crate_version!())
		.about(clap::crate_description!())
		.author(clap::crate_authors!())
		.args([
			Arg::new("config")
				.help("path of config file")
				.short('c')
				.long("config")
				.value_parser(clap::value_parser!(PathBuf)),
			Arg::new("level")
				.help("log level")
				.long("log-level")
				.value_parser(["error", "warn", "info", "debug"])
				.ignore_case(true),
			Arg::new("addr").help("listen address, format: [host]:port").long("addr"),
			Arg::new("template")
				.help("path of the message template")
				.long("template")
				.value_parser(clap::value_parser!(PathBuf)),
		])
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use super::*;

	fn settings(args: &[&str]) -> Result<Settings> {
		let opts = command().try_get_matches_from(args)?;
		Settings::from_matches(&opts)
	}

	#[test]
	fn defaults() {
		let settings = settings(&["alert2dingtalk"]).unwrap();

		assert_eq!(settings.log.level, "info");
		assert_eq!(settings.alert_webhook_receiver.address, ":6001");
		assert_eq!(settings.template.path, PathBuf::from("./templates/base.tmpl"));
		assert_eq!(settings.dingtalk.api_url.as_str(), DEFAULT_API_URL);
		assert_eq!(settings.dingtalk.timeout, Duration::from_secs(10));
		assert!(settings.dingtalk.secret.is_none());
		assert!(settings.telemetry_endpoint.is_none());
	}

	#[test]
	fn explicit_config_file_has_to_exist() {
		assert!(settings(&["alert2dingtalk", "-c", "/nonexistent/config.yaml"]).is_err());
	}

	#[test]
	fn flags_override_config_file() {
		let dir = std::env::temp_dir().join(format!("alert2dingtalk-settings-{}", std::process::id()));
		std::fs::create_dir_all(&dir).unwrap();
		let path = dir.join("config.yaml");
		std::fs::write(
			&path,
			"log:\n  level: warn\nalert_webhook_receiver:\n  address: 127.0.0.1:7001\ndingtalk:\n  api_url: http://localhost:8080/robot/send\n  secret: SEC123\n  timeout: 2.5\ntelemetry_endpoint:\n  address: 127.0.0.1:9100\n",
		)
		.unwrap();

		let from_file = settings(&["alert2dingtalk", "-c", path.to_str().unwrap()]).unwrap();
		assert_eq!(from_file.log.level, "warn");
		assert_eq!(from_file.alert_webhook_receiver.address, "127.0.0.1:7001");
		assert_eq!(from_file.dingtalk.secret.as_deref(), Some("SEC123"));
		assert_eq!(from_file.dingtalk.timeout, Duration::from_millis(2500));
		assert_eq!(from_file.telemetry_endpoint.unwrap().address, "127.0.0.1:9100");

		let overridden = settings(&[
			"alert2dingtalk",
			"-c",
			path.to_str().unwrap(),
			"--log-level",
			"DEBUG",
			"--addr",
			":6002",
			"--template",
			"/etc/alert2dingtalk/custom.tmpl",
		])
		.unwrap();
		assert_eq!(overridden.log.level, "DEBUG");
		assert_eq!(overridden.alert_webhook_receiver.address, ":6002");
		assert_eq!(overridden.template.path, PathBuf::from("/etc/alert2dingtalk/custom.tmpl"));
		assert_eq!(overridden.dingtalk.api_url.as_str(), "http://localhost:8080/robot/send");

		std::fs::remove_dir_all(&dir).unwrap();
	}

	#[test]
	fn rejects_unknown_log_level() {
		assert!(command().try_get_matches_from(["alert2dingtalk", "--log-level", "verbose"]).is_err());
	}
}
