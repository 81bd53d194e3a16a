use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};
use minutes_domain::{IssueType, Priority, text};

const PROVIDER: &str = "Jira API";
const MAX_SUMMARY_GRAPHEMES: usize = 255;

#[derive(Clone, Debug)]
pub struct IssueDraft {
	pub project_key: String,
	pub summary: String,
	pub description: String,
	pub issue_type: IssueType,
	pub assignee_account_id: Option<String>,
	pub labels: Vec<String>,
	pub priority: Option<Priority>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedIssue {
	pub id: String,
	pub key: String,
	pub url: String,
}

pub async fn create_issue(
	cfg: &minutes_config::TrackerProviderConfig,
	draft: &IssueDraft,
) -> Result<CreatedIssue> {
	if cfg.api_base.trim().is_empty() || cfg.email.trim().is_empty() || cfg.api_token.is_empty() {
		return Err(Error::InvalidConfig {
			message: "Jira tracker credentials are not configured.".to_string(),
		});
	}

	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let base = cfg.api_base.trim_end_matches('/');
	let url = format!("{base}/rest/api/3/issue");
	let res = client
		.post(url)
		.basic_auth(&cfg.email, Some(&cfg.api_token))
		.json(&issue_body(draft))
		.send()
		.await?;
	let json = crate::read_json(PROVIDER, res).await?;
	let field = |name: &str| json.get(name).and_then(|v| v.as_str()).map(str::to_string);
	let key = field("key").ok_or_else(|| Error::InvalidResponse {
		message: "Jira response is missing the issue key.".to_string(),
	})?;

	Ok(CreatedIssue { id: field("id").unwrap_or_default(), url: format!("{base}/browse/{key}"), key })
}

pub fn issue_body(draft: &IssueDraft) -> Value {
	let summary =
		text::truncate_graphemes(&text::squash_whitespace(&draft.summary), MAX_SUMMARY_GRAPHEMES);
	let mut fields = serde_json::json!({
		"project": { "key": draft.project_key },
		"summary": summary,
		"description": adf_document(&draft.description),
		"issuetype": { "name": draft.issue_type.tracker_name() },
		"labels": draft
			.labels
			.iter()
			.map(|label| label.trim().replace(char::is_whitespace, "-"))
			.filter(|label| !label.is_empty())
			.collect::<Vec<_>>(),
	});

	if let Some(obj) = fields.as_object_mut() {
		if let Some(account_id) =
			draft.assignee_account_id.as_deref().filter(|id| !id.trim().is_empty())
		{
			obj.insert("assignee".to_string(), serde_json::json!({ "accountId": account_id }));
		}
		if let Some(priority) = draft.priority {
			obj.insert("priority".to_string(), serde_json::json!({ "name": priority.tracker_name() }));
		}
	}

	serde_json::json!({ "fields": fields })
}

/// Atlassian document format: one paragraph per blank-line separated block.
fn adf_document(description: &str) -> Value {
	let content = description
		.split("\n\n")
		.map(str::trim)
		.filter(|block| !block.is_empty())
		.map(|block| {
			serde_json::json!({
				"type": "paragraph",
				"content": [{ "type": "text", "text": block }],
			})
		})
		.collect::<Vec<_>>();

	serde_json::json!({ "type": "doc", "version": 1, "content": content })
}
