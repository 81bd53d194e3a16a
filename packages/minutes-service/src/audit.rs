use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{Date, Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{Error, MinutesService, RequestContext, Result};
use minutes_storage::{
	keys,
	models::{AuditLogEntry, Severity},
};

const MAX_RANGE_DAYS: i64 = 31;
const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 1_000;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AuditLogRequest {
	pub start_date: Option<String>,
	pub end_date: Option<String>,
	#[serde(rename = "type")]
	pub event_type: Option<String>,
	pub severity: Option<String>,
	pub limit: Option<usize>,
}

#[derive(Clone, Debug, Serialize)]
pub struct AuditLogResponse {
	pub start_date: String,
	pub end_date: String,
	pub entries: Vec<AuditLogEntry>,
	/// Matching entries before `limit` was applied.
	pub total: usize,
}

impl MinutesService {
	/// Appends an audit entry to today's bucket. Failures are logged, never returned.
	pub async fn record_audit(
		&self,
		event_type: &str,
		actor: &str,
		severity: Severity,
		details: Value,
	) {
		let entry = AuditLogEntry {
			id: Uuid::new_v4(),
			event_type: event_type.to_string(),
			actor: actor.to_string(),
			severity,
			timestamp: OffsetDateTime::now_utc(),
			details,
		};

		if let Err(err) = self.append_audit(entry).await {
			tracing::warn!(error = %err, event_type, "Failed to write audit entry.");
		}
	}

	pub async fn get_audit_log(
		&self,
		ctx: &RequestContext,
		req: AuditLogRequest,
	) -> Result<AuditLogResponse> {
		self.require_admin(ctx, "getAuditLog").await?;

		let today = OffsetDateTime::now_utc().date();
		let (start, end) =
			self.audit_range(req.start_date.as_deref(), req.end_date.as_deref(), today)?;
		let severity = match req.severity.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
			Some(raw) => Some(raw.parse::<Severity>().map_err(Error::validation)?),
			None => None,
		};
		let event_type = req.event_type.as_deref().map(str::trim).filter(|t| !t.is_empty());
		let limit = req.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
		let mut matched = Vec::new();
		let mut day = end;

		loop {
			let bucket: Vec<AuditLogEntry> =
				minutes_storage::get_json(self.store.as_ref(), &keys::audit_day(day))
					.await?
					.unwrap_or_default();

			matched.extend(bucket.into_iter().rev().filter(|entry| {
				event_type.is_none_or(|t| entry.event_type == t)
					&& severity.is_none_or(|s| entry.severity == s)
			}));

			if day <= start {
				break;
			}

			day = match day.previous_day() {
				Some(previous) => previous,
				None => break,
			};
		}

		matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

		let total = matched.len();

		matched.truncate(limit);

		Ok(AuditLogResponse {
			start_date: keys::format_day(start),
			end_date: keys::format_day(end),
			entries: matched,
			total,
		})
	}

	fn audit_range(
		&self,
		start: Option<&str>,
		end: Option<&str>,
		today: Date,
	) -> Result<(Date, Date)> {
		let end = match end.filter(|raw| !raw.trim().is_empty()) {
			Some(raw) => parse_date(raw, "end_date")?,
			None => today,
		};
		let default_days = i64::from(self.cfg.audit.default_range_days.max(1));
		let start = match start.filter(|raw| !raw.trim().is_empty()) {
			Some(raw) => parse_date(raw, "start_date")?,
			None => end.saturating_sub(Duration::days(default_days - 1)),
		};

		if start > end {
			return Err(Error::validation("start_date must not be after end_date."));
		}
		if (end - start).whole_days() + 1 > MAX_RANGE_DAYS {
			return Err(Error::validation(format!(
				"Audit log range must not exceed {MAX_RANGE_DAYS} days."
			)));
		}

		Ok((start, end))
	}

	/// Read-modify-write on the day bucket with no compare-and-set. Concurrent appends, such as a
	/// background `analysis.completed` racing a request-path event, can drop one entry.
	async fn append_audit(&self, entry: AuditLogEntry) -> Result<()> {
		let key = keys::audit_day(entry.timestamp.date());
		let mut bucket: Vec<AuditLogEntry> =
			minutes_storage::get_json(self.store.as_ref(), &key).await?.unwrap_or_default();
		let cap = self.cfg.audit.max_entries_per_day.max(1) as usize;

		bucket.push(entry);

		if bucket.len() > cap {
			let overflow = bucket.len() - cap;

			bucket.drain(..overflow);
		}

		minutes_storage::set_json(self.store.as_ref(), &key, &bucket, None).await?;

		Ok(())
	}
}

fn parse_date(raw: &str, field: &str) -> Result<Date> {
	keys::parse_day(raw)
		.ok_or_else(|| Error::validation(format!("{field} must be a date in YYYY-MM-DD format.")))
}
