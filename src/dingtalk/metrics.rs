//! prometheus meters for the dingtalk client

use prometheus::{
	exponential_buckets, histogram_opts, opts, Histogram, IntCounter, IntCounterVec, Registry,
};

#[derive(Debug, Clone)]
/// prometheus meters for requests to the robot api
pub(crate) struct DeliveryMetrics {
	/// total number of send requests
	requests: IntCounter,
	/// number of failed send requests
	requests_failed: IntCounterVec,
	/// duration of send requests
	request_duration: Histogram,
}

impl DeliveryMetrics {
	/// construct meters and register them at `registry`
	pub(crate) fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
		let requests = IntCounter::with_opts(
			opts!("requests_total", "total number of dingtalk robot send requests")
				.namespace("alert2dingtalk")
				.subsystem("dingtalk"),
		)?;

		let requests_failed = IntCounterVec::new(
			opts!("requests_failed", "number of failed dingtalk robot send requests")
				.namespace("alert2dingtalk")
				.subsystem("dingtalk"),
			&["reason"],
		)?;

		let request_duration = Histogram::with_opts(
			histogram_opts!(
				"request_duration_seconds",
				"total time of a dingtalk robot send request in seconds",
				exponential_buckets(0.01, 2., 12)?
			)
			.namespace("alert2dingtalk")
			.subsystem("dingtalk"),
		)?;

		registry.register(Box::new(requests.clone()))?;
		registry.register(Box::new(requests_failed.clone()))?;
		registry.register(Box::new(request_duration.clone()))?;

		Ok(Self { requests, requests_failed, request_duration })
	}

	/// count a request and time it until the returned timer is dropped
	pub(crate) fn start_request(&self) -> prometheus::HistogramTimer {
		self.requests.inc();
		self.request_duration.start_timer()
	}

	/// count a failed request
	pub(crate) fn record_failure(&self, reason: &str) {
		self.requests_failed.with_label_values(&[reason]).inc();
	}
}
