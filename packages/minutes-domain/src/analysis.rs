use serde::{Deserialize, Serialize};

use crate::types::{IssueType, Priority};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionItem {
	pub title: String,
	#[serde(default)]
	pub description: Option<String>,
	#[serde(default)]
	pub assignee: Option<String>,
	#[serde(default)]
	pub due_date: Option<String>,
	#[serde(default)]
	pub priority: Option<Priority>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Decision {
	pub text: String,
	#[serde(default)]
	pub rationale: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedIssue {
	pub summary: String,
	#[serde(default)]
	pub description: String,
	#[serde(default)]
	pub issue_type: IssueType,
	#[serde(default)]
	pub priority: Option<Priority>,
	#[serde(default)]
	pub labels: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
	pub summary: String,
	#[serde(default)]
	pub action_items: Vec<ActionItem>,
	#[serde(default)]
	pub decisions: Vec<Decision>,
	#[serde(default)]
	pub issues: Vec<ExtractedIssue>,
	#[serde(default)]
	pub model: String,
	/// Set when the result was served from the content cache.
	#[serde(default)]
	pub cached: bool,
}
impl AnalysisResult {
	pub fn is_empty(&self) -> bool {
		self.summary.trim().is_empty()
			&& self.action_items.is_empty()
			&& self.decisions.is_empty()
			&& self.issues.is_empty()
	}
}
