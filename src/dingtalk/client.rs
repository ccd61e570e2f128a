use anyhow::Context;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use hmac::{Hmac, Mac};
use prometheus::Registry;
use rand::seq::SliceRandom;
use reqwest::StatusCode;
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;
use url::Url;

use super::{message::MarkdownMessage, metrics::DeliveryMetrics, settings::DingTalkSettings};

type HmacSha256 = Hmac<Sha256>;

/// Error occuring when sending a message to a dingtalk robot
#[derive(Error, Debug)]
pub enum DeliveryError {
	#[error("no robot access token given")]
	NoToken,
	#[error("invalid signing secret")]
	InvalidSecret,
	#[error("request to dingtalk failed: {0}")]
	Request(#[from] reqwest::Error),
	#[error("dingtalk responded with status {0}")]
	Status(StatusCode),
	#[error("dingtalk rejected the message: {errmsg} (errcode {errcode})")]
	Api { errcode: i64, errmsg: String },
}

impl DeliveryError {
	/// label value for the failure metric
	fn reason(&self) -> &'static str {
		match self {
			Self::NoToken => "no_token",
			Self::InvalidSecret => "invalid_secret",
			Self::Request(err) if err.is_timeout() => "timeout",
			Self::Request(err) if err.is_decode() => "response",
			Self::Request(_) => "request",
			Self::Status(_) => "status",
			Self::Api { .. } => "api",
		}
	}
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// response body of the robot send api
struct RobotResponse {
	errcode: i64,
	errmsg: String,
}

#[derive(Debug, Clone)]
/// Http client for the dingtalk robot api. Shared by all requests, use
/// [DingTalkClient::robot] to address specific robots.
pub struct DingTalkClient {
	client: reqwest::Client,
	api_url: Url,
	secret: Option<String>,
	metrics: DeliveryMetrics,
}

impl DingTalkClient {
	pub fn new(settings: &DingTalkSettings, registry: &Registry) -> anyhow::Result<Self> {
		let client = reqwest::Client::builder()
			.timeout(settings.timeout)
			.build()
			.context("failed to build http client")?;

		let metrics =
			DeliveryMetrics::new(registry).context("failed to register dingtalk metrics")?;

		Ok(Self {
			client,
			api_url: settings.api_url.clone(),
			secret: settings.secret.clone().filter(|secret| !secret.is_empty()),
			metrics,
		})
	}

	/// robot client scoped to the access tokens of one request
	pub fn robot<'a>(&'a self, tokens: &'a [String]) -> Robot<'a> {
		Robot { client: self, tokens }
	}

	/// send url for `token`, signed if a secret is configured
	fn send_url(&self, token: &str, timestamp_millis: i64) -> Result<Url, DeliveryError> {
		let mut url = self.api_url.clone();

		{
			let mut query = url.query_pairs_mut();
			query.append_pair("access_token", token);

			if let Some(secret) = &self.secret {
				let timestamp = timestamp_millis.to_string();
				query.append_pair("timestamp", &timestamp);
				query.append_pair("sign", &sign(secret, &timestamp)?);
			}
		}

		Ok(url)
	}
}

/// `base64(hmac_sha256(secret, "<timestamp>\n<secret>"))`
fn sign(secret: &str, timestamp: &str) -> Result<String, DeliveryError> {
	let mut mac =
		HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| DeliveryError::InvalidSecret)?;
	mac.update(format!("{timestamp}\n{secret}").as_bytes());

	Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// [DingTalkClient] scoped to a set of robots
#[derive(Debug, Clone, Copy)]
pub struct Robot<'a> {
	client: &'a DingTalkClient,
	tokens: &'a [String],
}

impl Robot<'_> {
	/// Send a markdown message. If multiple tokens are given one of them is
	/// picked at random. Failed requests are not retried.
	pub async fn send_markdown(&self, message: &MarkdownMessage) -> Result<(), DeliveryError> {
		let result = self.try_send(message).await;

		if let Err(err) = &result {
			self.client.metrics.record_failure(err.reason());
		}

		result
	}

	async fn try_send(&self, message: &MarkdownMessage) -> Result<(), DeliveryError> {
		let token = self.tokens.choose(&mut rand::thread_rng()).ok_or(DeliveryError::NoToken)?;
		let url = self.client.send_url(token, Utc::now().timestamp_millis())?;

		let _timer = self.client.metrics.start_request();

		let response = self.client.client.post(url).json(&message.payload()).send().await?;

		let status = response.status();
		if !status.is_success() {
			return Err(DeliveryError::Status(status));
		}

		let RobotResponse { errcode, errmsg } = response.json().await?;
		if errcode != 0 {
			return Err(DeliveryError::Api { errcode, errmsg });
		}

		tracing::debug!(title = message.title(), "sent message to dingtalk");

		Ok(())
	}
}
