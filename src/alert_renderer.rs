//! Renders alertmanager notifications via tera templates.
//!
//! The template is loaded and compiled once at startup. Rendering happens per
//! request in [alertmanager_webhook_receiver](crate::alertmanager_webhook_receiver).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tera::Tera;

use crate::{alert::Notification, template_functions};

#[derive(Debug, Clone, Deserialize)]
/// location of the message template
pub struct TemplateSettings {
	pub path: PathBuf,
}

/// Alert renderer
pub struct AlertRenderer {
	tera: Tera,
	template_name: String,
}

impl AlertRenderer {
	/// Load and compile the template file. The file name is used as template name.
	pub fn from_file(path: &Path) -> Result<Self> {
		let template_name = path
			.file_name()
			.and_then(|name| name.to_str())
			.context(format!("template path {path:?} has no valid file name"))?
			.to_owned();

		let mut tera = Tera::default();
		template_functions::register(&mut tera);

		tera.add_template_file(path, Some(template_name.as_str()))
			.context(format!("could not load template {path:?}"))?;

		Ok(Self { tera, template_name })
	}

	/// Compile a template from a string
	pub fn from_raw(template_name: &str, content: &str) -> Result<Self> {
		let mut tera = Tera::default();
		template_functions::register(&mut tera);

		tera.add_raw_template(template_name, content)
			.context(format!("could not parse template {template_name}"))?;

		Ok(Self { tera, template_name: template_name.to_owned() })
	}

	/// name the template was registered under
	pub fn template_name(&self) -> &str {
		&self.template_name
	}

	/// Render a notification into the message body.
	///
	/// # Arguments
	///
	/// * `notification` - the notification as received from alertmanager, exposed to the
	///   template with the alertmanager field names (`alerts`, `commonLabels`, `externalURL`, ...)
	pub fn render(&self, notification: &Notification) -> tera::Result<String> {
		let context = tera::Context::from_serialize(notification)?;

		self.tera.render(&self.template_name, &context)
	}
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap;

	use super::*;
	use crate::alert::Alert;

	fn notification() -> Notification {
		let labels = HashMap::from([
			(String::from("alertname"), String::from("HighCPU")),
			(String::from("team/owner"), String::from("infra & ops <oncall>")),
			(String::from("emoji"), String::from("🔥 hot")),
		]);
		let annotations =
			HashMap::from([(String::from("summary"), String::from("cpu\nabove \"90%\""))]);

		Notification {
			receiver: String::from("dingtalk"),
			status: String::from("firing"),
			alerts: vec![Alert {
				status: String::from("firing"),
				labels,
				annotations,
				..Default::default()
			}],
			..Default::default()
		}
	}

	#[test]
	fn renders_notification_fields() {
		let renderer = AlertRenderer::from_raw(
			"base.tmpl",
			"{{ receiver }}/{{ status }}:{% for alert in alerts %} {{ alert.labels.alertname }}{% endfor %}",
		)
		.unwrap();

		assert_eq!(renderer.render(&notification()).unwrap(), "dingtalk/firing: HighCPU");
	}

	#[test]
	fn labels_and_annotations_reach_the_template_unchanged() {
		let renderer = AlertRenderer::from_raw(
			"pairs.tmpl",
			"{% for alert in alerts %}{% for key, value in alert.labels %}{{ key }}={{ value | safe }};{% endfor %}{% for key, value in alert.annotations %}{{ key }}={{ value | safe }};{% endfor %}{% endfor %}",
		)
		.unwrap();

		let notification = notification();
		let rendered = renderer.render(&notification).unwrap();

		let alert = &notification.alerts[0];
		for (key, value) in alert.labels.iter().chain(alert.annotations.iter()) {
			assert!(rendered.contains(&format!("{key}={value};")), "{key} missing in {rendered}");
		}
	}

	#[test]
	fn undefined_variable_fails_to_render() {
		let renderer = AlertRenderer::from_raw("base.tmpl", "{{ nonexistent.field }}").unwrap();

		assert!(renderer.render(&notification()).is_err());
	}

	#[test]
	fn invalid_template_is_rejected_up_front() {
		assert!(AlertRenderer::from_raw("base.tmpl", "{% for alert in alerts %}").is_err());
	}

	#[test]
	fn loads_template_from_file() {
		let dir = std::env::temp_dir().join(format!("alert2dingtalk-{}", std::process::id()));
		std::fs::create_dir_all(&dir).unwrap();
		let path = dir.join("custom.tmpl");
		std::fs::write(&path, "{{ alerts | length }} alerts for {{ receiver }}").unwrap();

		let renderer = AlertRenderer::from_file(&path).unwrap();

		assert_eq!(renderer.template_name(), "custom.tmpl");
		assert_eq!(renderer.render(&notification()).unwrap(), "1 alerts for dingtalk");

		std::fs::remove_dir_all(&dir).unwrap();
	}

	#[test]
	fn missing_template_file_is_an_error() {
		assert!(AlertRenderer::from_file(Path::new("/nonexistent/base.tmpl")).is_err());
	}

	#[test]
	fn bundled_template_renders() {
		let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("templates/base.tmpl");
		let renderer = AlertRenderer::from_file(&path).unwrap();

		let rendered = renderer.render(&notification()).unwrap();

		assert!(rendered.contains("HighCPU"));
	}

	#[test]
	fn bundled_template_only_marks_resolved_alerts_as_resolved() {
		let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("templates/base.tmpl");
		let renderer = AlertRenderer::from_file(&path).unwrap();

		let mut notification = notification();
		notification.alerts[0].status = String::from("pending");
		let rendered = renderer.render(&notification).unwrap();

		assert!(rendered.contains("[PENDING] HighCPU"), "{rendered}");
		assert!(!rendered.contains("[RESOLVED]"), "{rendered}");
		assert!(!rendered.contains("- ended:"), "{rendered}");

		notification.alerts[0].status = String::from("resolved");
		let rendered = renderer.render(&notification).unwrap();

		assert!(rendered.contains("[RESOLVED] HighCPU"), "{rendered}");
		assert!(rendered.contains("- ended:"), "{rendered}");
	}
}
