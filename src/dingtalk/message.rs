//! Markdown message sent to a dingtalk robot. The robot api rejects overly
//! large messages, so the text is truncated to [MAX_MESSAGE_TEXT_LEN].

use serde::Serialize;

/// size limit of the markdown text in bytes
pub const MAX_MESSAGE_TEXT_LEN: usize = 20000;

#[derive(Debug, Clone, PartialEq, Eq)]
/// markdown message with optional mentions
pub struct MarkdownMessage {
	/// shown in the conversation list and notifications
	title: String,
	/// markdown content, including the `@mobile` mentions
	text: String,
	/// mobile numbers of the mentioned users
	at_mobiles: Vec<String>,
}

impl MarkdownMessage {
	/// Construct a message. Mentions are passed through as they are, empty
	/// ones are dropped. Dingtalk only highlights mentions which also appear in
	/// the text, so `@<mobile>` is appended for each of them.
	///
	/// # Arguments
	///
	/// * `title` - message title
	///
	/// * `text` - markdown content
	///
	/// * `mobiles` - mobile numbers of users to mention
	pub fn new(title: String, text: String, mobiles: Vec<String>) -> Self {
		let at_mobiles: Vec<String> = mobiles.into_iter().filter(|m| !m.is_empty()).collect();

		let mut text = text;
		if !at_mobiles.is_empty() {
			let mentions: Vec<String> = at_mobiles.iter().map(|m| format!("@{m}")).collect();
			let mentions = mentions.join(" ");

			truncate(&mut text, MAX_MESSAGE_TEXT_LEN.saturating_sub(mentions.len() + 2));
			text.push_str("\n\n");
			text.push_str(&mentions);
		} else {
			truncate(&mut text, MAX_MESSAGE_TEXT_LEN);
		}

		Self { title, text, at_mobiles }
	}

	pub fn title(&self) -> &str {
		&self.title
	}

	/// request body of the robot send api
	pub(crate) fn payload(&self) -> Payload<'_> {
		Payload {
			msgtype: "markdown",
			markdown: Markdown { title: &self.title, text: &self.text },
			at: At { at_mobiles: &self.at_mobiles, is_at_all: false },
		}
	}
}

/// truncate to at most `max` bytes without splitting a character
fn truncate(text: &mut String, max: usize) {
	if text.len() <= max {
		return;
	}

	let mut end = max;
	while !text.is_char_boundary(end) {
		end -= 1;
	}

	tracing::warn!(len = text.len(), "message text too long, truncating to {end} bytes");
	text.truncate(end);
}

#[derive(Debug, Serialize)]
pub(crate) struct Payload<'a> {
	msgtype: &'static str,
	markdown: Markdown<'a>,
	at: At<'a>,
}

#[derive(Debug, Serialize)]
struct Markdown<'a> {
	title: &'a str,
	text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct At<'a> {
	at_mobiles: &'a [String],
	is_at_all: bool,
}
