//! prometheus alertmanager receiver that forwards alerts to dingtalk robots
//!
//! Features:
//! - renders notifications with a tera template loaded at startup
//! - `token` url parameters select the dingtalk robots, `mobile` parameters
//!   mention users in the message
//! - optional prometheus metrics endpoint

use std::sync::Arc;

use anyhow::{Context, Result};
use dingtalk::DingTalkClient;
use prometheus::Registry;
use settings::Settings;

use crate::{alert_renderer::AlertRenderer, alertmanager_webhook_receiver::ReceiverState};

mod alert;
mod alert_renderer;
mod alertmanager_webhook_receiver;
mod dingtalk;
mod log;
mod settings;
mod telemetry_endpoint;
mod template_functions;

/// the entry point of the program
#[tokio::main]
pub async fn main() -> Result<()> {
	let settings = Settings::load().context("failed to load config and command line arguments")?;

	log::setup_logging(&settings.log).context("could not setup logging")?;

	let registry = Registry::new();

	let renderer = AlertRenderer::from_file(&settings.template.path)
		.context("failed to construct alert renderer")?;
	tracing::info!(
		template = renderer.template_name(),
		"loaded template from {:?}",
		settings.template.path
	);

	let dingtalk = DingTalkClient::new(&settings.dingtalk, &registry)
		.context("failed to construct dingtalk client")?;

	let state = Arc::new(ReceiverState::new(renderer, dingtalk, &registry)?);

	if let Some(telemetry) = settings.telemetry_endpoint.clone() {
		let registry = registry.clone();
		tokio::spawn(async move {
			if let Err(err) = telemetry_endpoint::run_telemetry_endpoint(&telemetry, registry).await {
				tracing::error!("{err:#}");
				std::process::exit(1);
			}
		});
	}

	alertmanager_webhook_receiver::run_prometheus_receiver(&settings.alert_webhook_receiver, state)
		.await
		.context("prometheus alertmanager receiver endpoint failed to start or crashed")
}
