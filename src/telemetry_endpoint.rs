//! Here we expose prometheus metrics about alert2dingtalk
use anyhow::{Context, Result};
use axum::{
	extract::State,
	http::{header::CONTENT_TYPE, StatusCode},
	response::{IntoResponse, Response},
	routing::get,
	Router,
};
use prometheus::{Encoder, Registry, TextEncoder};
use serde::Deserialize;
use tokio::net::TcpListener;

use crate::alertmanager_webhook_receiver::bind_address;

#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryEndpointSettings {
	/// `[host]:port` of the metrics endpoint
	pub address: String,
}

async fn metrics_handler(State(registry): State<Registry>) -> Response {
	let mut buffer = vec![];
	let encoder = TextEncoder::new();
	let metric_families = registry.gather();

	if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
		tracing::error!("failed to encode metrics: {err}");
		return StatusCode::INTERNAL_SERVER_ERROR.into_response();
	}

	([(CONTENT_TYPE, encoder.format_type().to_owned())], buffer).into_response()
}

pub fn router(registry: Registry) -> Router {
	Router::new().route("/metrics", get(metrics_handler)).with_state(registry)
}

pub async fn run_telemetry_endpoint(
	settings: &TelemetryEndpointSettings,
	registry: Registry,
) -> Result<()> {
	let address = bind_address(&settings.address);
	let listener =
		TcpListener::bind(&address).await.context(format!("failed to bind to {address}"))?;

	tracing::info!("serving metrics on {address}");

	axum::serve(listener, router(registry)).await.context("telemetry endpoint crashed")?;

	Ok(())
}
