//! Key layout of the store. Every persisted value lives under one of these keys.

use time::{
	Date, OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description,
};
use uuid::Uuid;

pub const AUDIT_PREFIX: &str = "audit:";
pub const API_KEY_META_PREFIX: &str = "claude:api_key:meta:";
pub const API_KEY_ACTIVE: &str = "claude:api_key:active";

const DAY: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");
const HOUR: &[BorrowedFormatItem<'static>] = format_description!("[year][month][day][hour]");

pub fn analysis(id: Uuid) -> String {
	format!("analysis:{id}")
}

pub fn analysis_content(id: Uuid) -> String {
	format!("analysis:{id}:content")
}

/// Marker left by a delete so an in-flight pipeline drops its writes.
pub fn analysis_tombstone(id: Uuid) -> String {
	format!("deleted:analysis:{id}")
}

pub fn user_analyses(user_id: &str) -> String {
	format!("user:{user_id}:analyses")
}

pub fn user_config(user_id: &str) -> String {
	format!("user:{user_id}:config")
}

pub fn api_key_meta(id: Uuid) -> String {
	format!("{API_KEY_META_PREFIX}{id}")
}

pub fn api_key_secret(id: Uuid) -> String {
	format!("claude:api_key:secret:{id}")
}

pub fn audit_day(date: Date) -> String {
	format!("{AUDIT_PREFIX}{}", format_day(date))
}

/// Hourly bucket of a user's analysis requests.
pub fn rate_limit(user_id: &str, at: OffsetDateTime) -> String {
	format!("ratelimit:{user_id}:{}", format_hour(at))
}

/// Hourly bucket of calls made with a stored AI key.
pub fn api_key_rate_limit(id: Uuid, at: OffsetDateTime) -> String {
	format!("ratelimit:api_key:{id}:{}", format_hour(at))
}

pub fn cache_analysis(hash: &str) -> String {
	format!("cache:analysis:{hash}")
}

pub fn format_day(date: Date) -> String {
	date.format(DAY).unwrap_or_else(|_| date.to_string())
}

pub fn parse_day(raw: &str) -> Option<Date> {
	Date::parse(raw.trim(), DAY).ok()
}

fn format_hour(at: OffsetDateTime) -> String {
	let at = at.to_offset(time::UtcOffset::UTC);

	at.format(HOUR).unwrap_or_else(|_| at.unix_timestamp().div_euclid(3_600).to_string())
}

#[cfg(test)]
mod tests {
	use time::macros::{date, datetime};

	use super::*;

	#[test]
	fn buckets_are_utc() {
		let at = datetime!(2026-10-14 23:30 -2);

		assert_eq!(rate_limit("u-1", at), "ratelimit:u-1:2026101501");
		assert_eq!(audit_day(date!(2026 - 03 - 07)), "audit:2026-03-07");
	}

	#[test]
	fn days_parse_strictly() {
		assert_eq!(parse_day("2026-10-14"), Some(date!(2026 - 10 - 14)));
		assert_eq!(parse_day("2026-13-01"), None);
		assert_eq!(parse_day("14/10/2026"), None);
	}
}
