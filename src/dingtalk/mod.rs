//! client for dingtalk custom robots
//!
//! Messages are sent as markdown to `POST <api_url>?access_token=<token>`,
//! see <https://open.dingtalk.com/document/robots/custom-robot-access>.

pub mod client;
pub mod message;
pub mod settings;

mod metrics;

pub use client::{DeliveryError, DingTalkClient};
pub use message::MarkdownMessage;
pub use settings::DingTalkSettings;
