use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, MinutesService, RequestContext, Result};
use minutes_domain::{IssueType, Priority};
use minutes_providers::{
	retry::{self, RetryPolicy},
	tracker::IssueDraft,
};
use minutes_storage::models::Severity;

static PROJECT_KEY: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^[A-Z][A-Z0-9_]{1,9}$").expect("project key pattern is valid"));

#[derive(Clone, Debug, Deserialize)]
pub struct CreateIssuesRequest {
	pub project_key: String,
	#[serde(default)]
	pub issues: Vec<IssueInput>,
	#[serde(default)]
	pub analysis_id: Option<Uuid>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct IssueInput {
	pub summary: String,
	pub description: String,
	pub issue_type: Option<String>,
	pub priority: Option<String>,
	pub assignee_account_id: Option<String>,
	pub labels: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IssueOutcome {
	Created { index: usize, summary: String, key: String, url: String },
	Failed { index: usize, summary: String, message: String },
}

#[derive(Clone, Debug, Serialize)]
pub struct CreateIssuesResponse {
	pub project_key: String,
	pub created: usize,
	pub failed: usize,
	pub results: Vec<IssueOutcome>,
}

impl MinutesService {
	/// Creates the issues one at a time. Earlier successes are kept when a later issue fails.
	pub async fn create_jira_issues(
		&self,
		ctx: &RequestContext,
		req: CreateIssuesRequest,
	) -> Result<CreateIssuesResponse> {
		let drafts = self.build_drafts(&req)?;

		if let Some(id) = req.analysis_id {
			self.load_owned(ctx, id).await?;
		}

		let policy = RetryPolicy::from_config(&self.cfg.retry);
		let cfg = &self.cfg.providers.tracker;
		let mut results = Vec::with_capacity(drafts.len());

		for (index, draft) in drafts.iter().enumerate() {
			let outcome = retry::with_backoff(policy, minutes_providers::Error::is_retryable, |_| {
				self.providers.tracker.create_issue(cfg, draft)
			})
			.await;

			match outcome {
				Ok(created) => {
					tracing::info!(user_id = %ctx.user_id, key = %created.key, "Tracker issue created.");

					results.push(IssueOutcome::Created {
						index,
						summary: draft.summary.clone(),
						key: created.key,
						url: created.url,
					});
				},
				Err(err) => {
					let status = err.http_status();
					let err = Error::Tracker(err);

					tracing::warn!(user_id = %ctx.user_id, index, error = %err, "Tracker issue failed.");

					let message = match status {
						Some(status) => format!("{} (HTTP {status})", err.public_message()),
						None => err.public_message(),
					};

					results.push(IssueOutcome::Failed {
						index,
						summary: draft.summary.clone(),
						message,
					});
				},
			}
		}

		let created = results.iter().filter(|r| matches!(r, IssueOutcome::Created { .. })).count();
		let failed = results.len() - created;

		self.record_audit(
			"issues.created",
			&ctx.user_id,
			if failed == 0 { Severity::Info } else { Severity::Warning },
			serde_json::json!({
				"project_key": req.project_key.trim(),
				"analysis_id": req.analysis_id,
				"created": created,
				"failed": failed,
			}),
		)
		.await;

		Ok(CreateIssuesResponse {
			project_key: req.project_key.trim().to_string(),
			created,
			failed,
			results,
		})
	}

	/// Validates the whole batch before any tracker call is made.
	fn build_drafts(&self, req: &CreateIssuesRequest) -> Result<Vec<IssueDraft>> {
		let max = self.cfg.tracker.max_issues_per_request as usize;

		if req.issues.is_empty() {
			return Err(Error::validation("At least one issue is required."));
		}
		if req.issues.len() > max {
			return Err(Error::validation(format!(
				"Too many issues in one request: {} (limit {max}).",
				req.issues.len()
			)));
		}

		let project_key = validate_project_key(&req.project_key)?;

		req.issues
			.iter()
			.enumerate()
			.map(|(index, issue)| {
				let summary = issue.summary.trim();

				if summary.is_empty() {
					return Err(Error::validation(format!("Issue {} summary is required.", index + 1)));
				}

				let issue_type = match issue.issue_type.as_deref().map(str::trim) {
					Some(raw) if !raw.is_empty() => raw.parse().map_err(Error::validation)?,
					_ => IssueType::default(),
				};
				let mut labels = self.cfg.tracker.default_labels.clone();

				for label in &issue.labels {
					let label = label.trim();

					if !label.is_empty() && !labels.iter().any(|existing| existing == label) {
						labels.push(label.to_string());
					}
				}

				Ok(IssueDraft {
					project_key: project_key.to_string(),
					summary: summary.to_string(),
					description: issue.description.trim().to_string(),
					issue_type,
					assignee_account_id: issue
						.assignee_account_id
						.as_deref()
						.map(str::trim)
						.filter(|id| !id.is_empty())
						.map(str::to_string),
					labels,
					priority: issue.priority.as_deref().and_then(Priority::parse_loose),
				})
			})
			.collect()
	}
}

pub(crate) fn validate_project_key(raw: &str) -> Result<&str> {
	let key = raw.trim();

	if !PROJECT_KEY.is_match(key) {
		return Err(Error::validation(format!(
			"Invalid project key {key:?}: use 2-10 uppercase letters, digits, or underscores."
		)));
	}

	Ok(key)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn project_keys_follow_tracker_rules() {
		assert!(validate_project_key("OPS").is_ok());
		assert!(validate_project_key(" DATA_2 ").is_ok());
		assert!(validate_project_key("ops").is_err());
		assert!(validate_project_key("1OPS").is_err());
		assert!(validate_project_key("A").is_err());
		assert!(validate_project_key("ABCDEFGHIJK").is_err());
	}
}
