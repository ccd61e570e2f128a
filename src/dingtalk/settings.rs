//! config file options for the dingtalk robot client

use std::time::Duration;

use serde::Deserialize;
use serde_with::{serde_as, DurationSeconds};
use url::Url;

/// endpoint of the dingtalk robot api
pub const DEFAULT_API_URL: &str = "https://oapi.dingtalk.com/robot/send";

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
/// settings for sending messages to dingtalk robots
pub struct DingTalkSettings {
	/// robot send endpoint, the access token is appended as query parameter
	pub api_url: Url,
	/// signing secret of the robots, only needed if the robots use signed requests
	#[serde(default)]
	pub secret: Option<String>,
	/// timeout of a single send request
	#[serde_as(as = "DurationSeconds<f64>")]
	pub timeout: Duration,
}
