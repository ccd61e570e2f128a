//! time helpers available in alert templates
//!
//! Every helper is registered as a function with named arguments and as a
//! filter:
//!
//! ```text
//! {{ timeFormat(t=alert.startsAt) }}                         {{ alert.startsAt | timeFormat }}
//! {{ timeDuration(start=alert.startsAt, end=alert.endsAt) }} {{ alert.startsAt | timeDuration(end=alert.endsAt) }}
//! {{ timeFromNow(start=alert.startsAt) }}                    {{ alert.startsAt | timeFromNow }}
//! ```
use std::collections::HashMap;

use chrono::{DateTime, Duration, FixedOffset, Local, TimeZone, Utc};
use tera::{Tera, Value};

/// layout used by `timeFormat`
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// register all time helpers on `tera`
pub fn register(tera: &mut Tera) {
	tera.register_function("timeFormat", time_format_function);
	tera.register_function("timeDuration", time_duration_function);
	tera.register_function("timeFromNow", time_from_now_function);

	tera.register_filter("timeFormat", time_format_filter);
	tera.register_filter("timeDuration", time_duration_filter);
	tera.register_filter("timeFromNow", time_from_now_filter);
}

fn time_format_function(args: &HashMap<String, Value>) -> tera::Result<Value> {
	let t = required_time(args, "timeFormat", "t")?;
	Ok(Value::String(format_time(&t, &Local)))
}

fn time_duration_function(args: &HashMap<String, Value>) -> tera::Result<Value> {
	let start = required_time(args, "timeDuration", "start")?;
	let end = required_time(args, "timeDuration", "end")?;
	Ok(Value::String(format_duration(end - start)))
}

fn time_from_now_function(args: &HashMap<String, Value>) -> tera::Result<Value> {
	let start = required_time(args, "timeFromNow", "start")?;
	Ok(Value::String(time_from_now(&start)))
}

fn time_format_filter(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
	let t = parse_time(value, "timeFormat")?;
	Ok(Value::String(format_time(&t, &Local)))
}

fn time_duration_filter(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
	let start = parse_time(value, "timeDuration")?;
	let end = required_time(args, "timeDuration", "end")?;
	Ok(Value::String(format_duration(end - start)))
}

fn time_from_now_filter(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
	let start = parse_time(value, "timeFromNow")?;
	Ok(Value::String(time_from_now(&start)))
}

/// format `t` in the time zone `tz` as `YYYY-MM-DD HH:MM:SS`
pub fn format_time<Tz: TimeZone>(t: &DateTime<FixedOffset>, tz: &Tz) -> String
where
	Tz::Offset: std::fmt::Display,
{
	t.with_timezone(tz).format(TIME_FORMAT).to_string()
}

/// Compact human readable duration like `1d2h3m4s`. Units with a value of
/// zero are left out and fractions of a second are dropped. Negative
/// durations are clamped to zero.
pub fn format_duration(duration: Duration) -> String {
	let total = duration.num_seconds();
	if total <= 0 {
		return String::from("0s");
	}

	let units = [
		(total / 86_400, 'd'),
		(total % 86_400 / 3_600, 'h'),
		(total % 3_600 / 60, 'm'),
		(total % 60, 's'),
	];

	let mut out = String::new();
	for (value, unit) in units {
		if value > 0 {
			out.push_str(&value.to_string());
			out.push(unit);
		}
	}

	out
}

/// duration between `start` and now
pub fn time_from_now(start: &DateTime<FixedOffset>) -> String {
	format_duration(Utc::now().fixed_offset() - *start)
}

/// look up a named argument and parse it as a timestamp
fn required_time(
	args: &HashMap<String, Value>,
	helper: &str,
	name: &str,
) -> tera::Result<DateTime<FixedOffset>> {
	match args.get(name) {
		Some(value) => parse_time(value, helper),
		None => Err(tera::Error::msg(format!("`{helper}` is missing the argument `{name}`"))),
	}
}

/// timestamps reach the template as RFC 3339 strings
fn parse_time(value: &Value, helper: &str) -> tera::Result<DateTime<FixedOffset>> {
	let s = value.as_str().ok_or_else(|| {
		tera::Error::msg(format!("`{helper}` expects an RFC 3339 timestamp, got {value}"))
	})?;

	DateTime::parse_from_rfc3339(s).map_err(|err| {
		tera::Error::msg(format!("`{helper}` failed to parse timestamp {s:?}: {err}"))
	})
}
