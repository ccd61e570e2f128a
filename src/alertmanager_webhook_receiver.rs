//! http endpoint receiving alertmanager webhook notifications
//!
//! `POST /send?token=<robot token>[&token=..][&mobile=<mobile>..]` renders the
//! notification and forwards it to one of the given dingtalk robots.
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
	extract::{rejection::BytesRejection, DefaultBodyLimit, RawQuery, State},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
	Router,
};
use bytes::Bytes;
use prometheus::{opts, IntCounterVec, Registry};
use serde::Deserialize;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::{
	alert::{AlertCounts, Notification},
	alert_renderer::AlertRenderer,
	dingtalk::{DeliveryError, DingTalkClient, MarkdownMessage},
};

#[derive(Debug, Deserialize, Clone)]
pub struct AlertReceiverSettings {
	/// `[host]:port`, an empty host listens on all interfaces
	pub address: String,
}

impl AlertReceiverSettings {
	pub fn bind_address(&self) -> String {
		bind_address(&self.address)
	}
}

/// `:port` is short for `0.0.0.0:port`
pub(crate) fn bind_address(address: &str) -> String {
	if address.starts_with(':') {
		format!("0.0.0.0{address}")
	} else {
		address.to_owned()
	}
}

/// Error occuring while handling a notification, mapped to the http response
#[derive(Error, Debug)]
pub enum ReceiverError {
	#[error("missing URL parameter {0}")]
	MissingParameter(&'static str),
	#[error("failed to read request body: {0}")]
	BodyRead(#[from] BytesRejection),
	#[error("failed to decode alertmanager notification: {0}")]
	PayloadDecode(#[from] serde_json::Error),
	#[error("failed to render template: {0:?}")]
	TemplateRender(#[from] tera::Error),
	#[error("failed to send message to dingtalk: {0}")]
	Delivery(#[from] DeliveryError),
}

impl ReceiverError {
	/// label value for the notification metric
	fn outcome(&self) -> &'static str {
		match self {
			Self::MissingParameter(_) => "missing_parameter",
			Self::BodyRead(_) => "body_read",
			Self::PayloadDecode(_) => "payload_decode",
			Self::TemplateRender(_) => "template_render",
			Self::Delivery(_) => "delivery",
		}
	}
}

impl IntoResponse for ReceiverError {
	fn into_response(self) -> Response {
		match self {
			Self::MissingParameter(_) | Self::BodyRead(_) | Self::PayloadDecode(_) => {
				tracing::debug!("rejected notification: {self}");
				(StatusCode::BAD_REQUEST, self.to_string()).into_response()
			}
			Self::TemplateRender(_) | Self::Delivery(_) => {
				tracing::error!("{self}");
				StatusCode::INTERNAL_SERVER_ERROR.into_response()
			}
		}
	}
}

#[derive(Debug, Clone)]
struct Metrics {
	notifications: IntCounterVec,
	alerts: IntCounterVec,
}

impl Metrics {
	fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
		let notifications = IntCounterVec::new(
			opts!("notifications_total", "total number of received notifications by outcome")
				.namespace("alert2dingtalk")
				.subsystem("webhook"),
			&["outcome"],
		)?;

		let alerts = IntCounterVec::new(
			opts!("alerts_total", "total number of received alerts by status")
				.namespace("alert2dingtalk")
				.subsystem("webhook"),
			&["status"],
		)?;

		registry.register(Box::new(notifications.clone()))?;
		registry.register(Box::new(alerts.clone()))?;

		Ok(Self { notifications, alerts })
	}

	fn record_alerts(&self, counts: &AlertCounts) {
		self.alerts.with_label_values(&["firing"]).inc_by(counts.firing as u64);
		self.alerts.with_label_values(&["resolved"]).inc_by(counts.resolved as u64);
		self.alerts.with_label_values(&["unexpected"]).inc_by(counts.unexpected as u64);
	}
}

/// read only state shared by all requests
pub struct ReceiverState {
	renderer: AlertRenderer,
	dingtalk: DingTalkClient,
	metrics: Metrics,
}

impl ReceiverState {
	pub fn new(
		renderer: AlertRenderer,
		dingtalk: DingTalkClient,
		registry: &Registry,
	) -> Result<Self> {
		let metrics = Metrics::new(registry).context("failed to register webhook metrics")?;

		Ok(Self { renderer, dingtalk, metrics })
	}
}

/// url parameters of `/send`, both may be repeated
#[derive(Debug, Default, PartialEq, Eq)]
struct SendParams {
	tokens: Vec<String>,
	mobiles: Vec<String>,
}

impl SendParams {
	fn parse(query: Option<&str>) -> Self {
		let mut params = Self::default();

		for (key, value) in url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
			match key.as_ref() {
				"token" if !value.is_empty() => params.tokens.push(value.into_owned()),
				"mobile" => params.mobiles.push(value.into_owned()),
				_ => {}
			}
		}

		params
	}
}

async fn health() -> &'static str {
	"ok"
}

async fn send(
	State(state): State<Arc<ReceiverState>>,
	RawQuery(query): RawQuery,
	body: Result<Bytes, BytesRejection>,
) -> Result<StatusCode, ReceiverError> {
	let result = relay(&state, query.as_deref(), body).await;

	let outcome = match &result {
		Ok(_) => "ok",
		Err(err) => err.outcome(),
	};
	state.metrics.notifications.with_label_values(&[outcome]).inc();

	result
}

async fn relay(
	state: &ReceiverState,
	query: Option<&str>,
	body: Result<Bytes, BytesRejection>,
) -> Result<StatusCode, ReceiverError> {
	let SendParams { tokens, mobiles } = SendParams::parse(query);
	if tokens.is_empty() {
		return Err(ReceiverError::MissingParameter("token"));
	}

	let body = body?;
	tracing::debug!("alertmanager request body: {}", String::from_utf8_lossy(&body));

	let notification: Notification = serde_json::from_slice(&body)?;

	let content = state.renderer.render(&notification)?;

	let counts = AlertCounts::tally(&notification.alerts);
	state.metrics.record_alerts(&counts);

	let message = MarkdownMessage::new(counts.title(), content, mobiles);
	state.dingtalk.robot(&tokens).send_markdown(&message).await?;

	tracing::info!(
		receiver = notification.receiver.as_str(),
		firing = counts.firing,
		resolved = counts.resolved,
		"forwarded notification to dingtalk"
	);

	Ok(StatusCode::OK)
}

pub fn router(state: Arc<ReceiverState>) -> Router {
	Router::new()
		.route("/", get(health))
		.route("/send", post(send).layer(DefaultBodyLimit::disable()))
		.layer(TraceLayer::new_for_http().on_response(DefaultOnResponse::new().level(Level::INFO)))
		.with_state(state)
}

pub async fn run_prometheus_receiver(
	settings: &AlertReceiverSettings,
	state: Arc<ReceiverState>,
) -> Result<()> {
	let address = settings.bind_address();
	let listener =
		TcpListener::bind(&address).await.context(format!("failed to bind to {address}"))?;

	tracing::info!("listening for alertmanager notifications on {address}");

	axum::serve(listener, router(state))
		.with_graceful_shutdown(shutdown_signal())
		.await
		.context("prometheus endpoint crashed")?;

	Ok(())
}

async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(err) = tokio::signal::ctrl_c().await {
			tracing::error!("failed to listen for ctrl-c: {err}");
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
			Ok(mut signal) => {
				signal.recv().await;
			}
			Err(err) => {
				tracing::error!("failed to listen for SIGTERM: {err}");
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}

	tracing::info!("shutting down");
}
