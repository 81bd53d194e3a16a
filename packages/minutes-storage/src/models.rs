use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Error, Result};
use minutes_domain::{AnalysisResult, AnalysisStatus, IssueType, MeetingType};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisSource {
	#[default]
	Text,
	Upload,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnalysisRecord {
	pub id: Uuid,
	pub user_id: String,
	pub site_id: String,
	pub input_length: usize,
	pub input_hash: String,
	pub meeting_type: MeetingType,
	pub issue_type: IssueType,
	pub status: AnalysisStatus,
	pub progress: u8,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
	#[serde(with = "crate::time_serde")]
	pub updated_at: OffsetDateTime,
	#[serde(default, with = "crate::time_serde::option")]
	pub completed_at: Option<OffsetDateTime>,
	#[serde(default)]
	pub result: Option<AnalysisResult>,
	#[serde(default)]
	pub error: Option<String>,
	#[serde(default)]
	pub source: AnalysisSource,
	#[serde(default)]
	pub file_name: Option<String>,
}
impl AnalysisRecord {
	/// Moves the record to `next`. Disallowed transitions leave the record untouched and
	/// progress never moves backwards.
	pub fn advance(
		&mut self,
		next: AnalysisStatus,
		progress: u8,
		now: OffsetDateTime,
	) -> Result<()> {
		if !self.status.can_transition_to(next) {
			return Err(Error::InvalidTransition { from: self.status, to: next });
		}

		self.status = next;
		self.progress = self.progress.max(progress.min(100));
		self.updated_at = now;

		if next.is_terminal() {
			self.completed_at = Some(now);
		}

		Ok(())
	}

	pub fn complete(&mut self, result: AnalysisResult, now: OffsetDateTime) -> Result<()> {
		self.advance(AnalysisStatus::Completed, 100, now)?;

		self.result = Some(result);
		self.error = None;

		Ok(())
	}

	pub fn fail(&mut self, message: String, now: OffsetDateTime) -> Result<()> {
		self.advance(AnalysisStatus::Error, self.progress, now)?;

		self.error = Some(message);

		Ok(())
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyMetadata {
	pub id: Uuid,
	pub name: String,
	pub active: bool,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
	#[serde(default, with = "crate::time_serde::option")]
	pub rotated_at: Option<OffsetDateTime>,
	#[serde(default, with = "crate::time_serde::option")]
	pub last_used_at: Option<OffsetDateTime>,
	#[serde(default)]
	pub usage_count: u64,
	/// Calls per hour.
	pub rate_limit: u32,
	/// Last four characters of the secret.
	pub key_hint: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
	#[default]
	Info,
	Warning,
	Error,
	Critical,
}
impl Severity {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Info => "info",
			Self::Warning => "warning",
			Self::Error => "error",
			Self::Critical => "critical",
		}
	}
}
impl std::str::FromStr for Severity {
	type Err = String;

	fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"info" => Ok(Self::Info),
			"warning" | "warn" => Ok(Self::Warning),
			"error" => Ok(Self::Error),
			"critical" => Ok(Self::Critical),
			other => Err(format!("Unknown severity: {other}.")),
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
	pub id: Uuid,
	#[serde(rename = "type")]
	pub event_type: String,
	pub actor: String,
	pub severity: Severity,
	#[serde(with = "crate::time_serde")]
	pub timestamp: OffsetDateTime,
	#[serde(default)]
	pub details: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Notifications {
	pub on_complete: bool,
	pub on_error: bool,
}
impl Default for Notifications {
	fn default() -> Self {
		Self { on_complete: true, on_error: true }
	}
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
	#[serde(default)]
	pub default_meeting_type: MeetingType,
	#[serde(default)]
	pub default_issue_type: IssueType,
	#[serde(default)]
	pub default_project_key: Option<String>,
	#[serde(default)]
	pub notifications: Notifications,
	#[serde(default, with = "crate::time_serde::option")]
	pub updated_at: Option<OffsetDateTime>,
}
