//! data structures for deserializing incoming alerts
use std::{collections::HashMap, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// alert status of an active problem
pub const FIRING: &str = "firing";
/// alert status of a cleared problem
pub const RESOLVED: &str = "resolved";

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
/// notification sent by prometheus alertmanager to the webhook receiver
pub struct Notification {
	pub version: String,
	pub group_key: String,
	pub truncated_alerts: u64,

	pub receiver: String,
	pub status: String,
	pub alerts: Vec<Alert>,
	pub group_labels: HashMap<String, String>,
	pub common_labels: HashMap<String, String>,
	pub common_annotations: HashMap<String, String>,
	#[serde(rename = "externalURL")]
	pub external_url: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
/// a single alert of a [Notification]
pub struct Alert {
	pub status: String,
	pub labels: HashMap<String, String>,
	pub annotations: HashMap<String, String>,
	/// defaults to the unix epoch if missing
	pub starts_at: DateTime<Utc>,
	/// alertmanager sends a zero timestamp for alerts which are still firing
	pub ends_at: DateTime<Utc>,
	#[serde(rename = "generatorURL")]
	pub generator_url: String,
	pub fingerprint: String,
}

/// number of alerts per status in a [Notification]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AlertCounts {
	pub firing: usize,
	pub resolved: usize,
	/// alerts with a status other than `firing` or `resolved`
	pub unexpected: usize,
}

impl AlertCounts {
	/// Counts alerts by status. Alerts with an unknown status are logged and
	/// don't count as firing or resolved.
	pub fn tally(alerts: &[Alert]) -> Self {
		let mut counts = Self::default();

		for alert in alerts {
			match alert.status.as_str() {
				FIRING => counts.firing += 1,
				RESOLVED => counts.resolved += 1,
				status => {
					tracing::warn!(
						status,
						fingerprint = alert.fingerprint.as_str(),
						"unexpected alert status"
					);
					counts.unexpected += 1;
				}
			}
		}

		counts
	}

	/// message title summarizing the counts
	pub fn title(&self) -> String {
		self.to_string()
	}
}

impl fmt::Display for AlertCounts {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "firing: {}, resolved: {}", self.firing, self.resolved)
	}
}
