use std::{sync::LazyLock, time::Duration};

use regex::Regex;
use reqwest::{
	Client,
	header::{CONTENT_TYPE, HeaderValue},
};
use serde_json::Value;

use crate::{Error, Result};
use minutes_domain::{
	ActionItem, AnalysisResult, Decision, ExtractedIssue, IssueType, MeetingType, Priority,
};

const PROVIDER: &str = "Claude API";

static FENCED_JSON: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?s)```(?:json|JSON)?\s*(\{.*?\})\s*```").expect("fenced json pattern is valid")
});
static SECTION_HEADER: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(
		r"(?i)^[#*\s]*(summary|action items|action_items|decisions|issues)[*\s]*(?::[*\s]*(.*))?$",
	)
	.expect("section header pattern is valid")
});
static BULLET: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^\s*(?:[-*\u{2022}]|\d+[.)])\s+(.*)$").expect("bullet pattern is valid")
});

pub struct AnalysisRequest<'a> {
	pub content: &'a str,
	pub meeting_type: MeetingType,
	pub issue_type: IssueType,
}

#[derive(Clone, Debug)]
pub struct AnalysisOutput {
	pub result: AnalysisResult,
	pub input_tokens: Option<u64>,
	pub output_tokens: Option<u64>,
}

pub async fn analyze(
	cfg: &minutes_config::AiProviderConfig,
	api_key: &str,
	req: &AnalysisRequest<'_>,
) -> Result<AnalysisOutput> {
	if api_key.trim().is_empty() {
		return Err(Error::InvalidConfig { message: "Claude API key is not configured.".to_string() });
	}

	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base.trim_end_matches('/'), cfg.path);
	let mut headers = crate::extra_headers(&cfg.default_headers)?;

	headers.insert("x-api-key", HeaderValue::from_str(api_key)?);
	headers.insert("anthropic-version", HeaderValue::from_str(&cfg.anthropic_version)?);
	headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

	let body = serde_json::json!({
		"model": cfg.model,
		"max_tokens": cfg.max_tokens,
		"messages": [
			{ "role": "user", "content": build_prompt(req.content, req.meeting_type, req.issue_type) }
		],
	});
	let res = client.post(url).headers(headers).json(&body).send().await?;
	let json = crate::read_json(PROVIDER, res).await?;

	parse_message_response(&json, &cfg.model)
}

pub fn build_prompt(content: &str, meeting_type: MeetingType, issue_type: IssueType) -> String {
	format!(
		"\
You are analyzing notes from a {meeting} meeting. Focus on {focus}.

Respond with a single JSON object and nothing else, using exactly this shape:
{{
  \"summary\": \"two to four sentence overview\",
  \"action_items\": [{{\"title\": \"\", \"description\": \"\", \"assignee\": null, \"due_date\": null, \"priority\": \"medium\"}}],
  \"decisions\": [{{\"text\": \"\", \"rationale\": null}}],
  \"issues\": [{{\"summary\": \"\", \"description\": \"\", \"issue_type\": \"{issue}\", \"priority\": \"medium\", \"labels\": []}}]
}}

Rules:
- Only include items supported by the notes. Use null when an owner or date is not stated.
- Priorities are one of highest, high, medium, low, lowest.
- Issue summaries are short imperative titles under 120 characters.
- Default issue_type is \"{issue}\" unless the notes clearly describe a bug, story, or epic.

Meeting notes:
<notes>
{content}
</notes>",
		meeting = meeting_type.as_str().replace('_', " "),
		focus = meeting_type.focus(),
		issue = issue_type.as_str(),
	)
}

fn parse_message_response(json: &Value, fallback_model: &str) -> Result<AnalysisOutput> {
	let text = json
		.get("content")
		.and_then(|v| v.as_array())
		.and_then(|blocks| {
			blocks
				.iter()
				.filter(|block| block.get("type").and_then(|t| t.as_str()).unwrap_or("text") == "text")
				.find_map(|block| block.get("text").and_then(|t| t.as_str()))
		})
		.ok_or_else(|| Error::InvalidResponse {
			message: "Claude response is missing a text content block.".to_string(),
		})?;
	let mut result = parse_analysis(text)?;

	result.model = json
		.get("model")
		.and_then(|v| v.as_str())
		.unwrap_or(fallback_model)
		.to_string();

	let usage = json.get("usage");

	Ok(AnalysisOutput {
		result,
		input_tokens: usage.and_then(|u| u.get("input_tokens")).and_then(|v| v.as_u64()),
		output_tokens: usage.and_then(|u| u.get("output_tokens")).and_then(|v| v.as_u64()),
	})
}

/// Accepts a bare JSON object, a fenced JSON block, JSON embedded in prose, or a plain-text
/// reply with `Summary:`/`Action Items:`/`Decisions:`/`Issues:` sections.
pub fn parse_analysis(text: &str) -> Result<AnalysisResult> {
	let result = match locate_json(text) {
		Some(value) => from_json(&value),
		None => from_sections(text),
	};

	if result.is_empty() {
		return Err(Error::InvalidResponse {
			message: "Claude response contained no summary or items.".to_string(),
		});
	}

	Ok(result)
}

fn locate_json(text: &str) -> Option<Value> {
	let trimmed = text.trim();

	if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
		return Some(value);
	}
	if let Some(caps) = FENCED_JSON.captures(trimmed)
		&& let Some(inner) = caps.get(1)
		&& let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(inner.as_str())
	{
		return Some(value);
	}

	let start = trimmed.find('{')?;
	let end = trimmed.rfind('}')?;

	if end <= start {
		return None;
	}

	match serde_json::from_str::<Value>(&trimmed[start..=end]) {
		Ok(value @ Value::Object(_)) => Some(value),
		_ => None,
	}
}

fn from_json(value: &Value) -> AnalysisResult {
	let summary = str_field(value, &["summary", "overview"]).unwrap_or_default();
	let action_items = array_field(value, &["action_items", "actionItems", "tasks"])
		.iter()
		.filter_map(action_item_from)
		.collect();
	let decisions =
		array_field(value, &["decisions", "key_decisions"]).iter().filter_map(decision_from).collect();
	let issues = array_field(value, &["issues", "jira_issues", "extracted_issues"])
		.iter()
		.filter_map(issue_from)
		.collect();

	AnalysisResult { summary, action_items, decisions, issues, model: String::new(), cached: false }
}

fn action_item_from(value: &Value) -> Option<ActionItem> {
	if let Some(text) = value.as_str() {
		return non_empty(text).map(|title| ActionItem { title, ..ActionItem::default() });
	}

	let title = str_field(value, &["title", "task", "action", "description"])?;

	Some(ActionItem {
		description: str_field(value, &["description", "details"]).filter(|d| d != &title),
		assignee: str_field(value, &["assignee", "owner", "responsible"]),
		due_date: str_field(value, &["due_date", "dueDate", "deadline"]),
		priority: str_field(value, &["priority"]).and_then(|p| Priority::parse_loose(&p)),
		title,
	})
}

fn decision_from(value: &Value) -> Option<Decision> {
	if let Some(text) = value.as_str() {
		return non_empty(text).map(|text| Decision { text, rationale: None });
	}

	Some(Decision {
		text: str_field(value, &["text", "decision", "summary"])?,
		rationale: str_field(value, &["rationale", "reason", "context"]),
	})
}

fn issue_from(value: &Value) -> Option<ExtractedIssue> {
	if let Some(text) = value.as_str() {
		return non_empty(text)
			.map(|summary| ExtractedIssue { summary, ..ExtractedIssue::default() });
	}

	let labels = array_field(value, &["labels"])
		.iter()
		.filter_map(|label| label.as_str().and_then(non_empty))
		.collect();

	Some(ExtractedIssue {
		summary: str_field(value, &["summary", "title"])?,
		description: str_field(value, &["description", "details"]).unwrap_or_default(),
		issue_type: str_field(value, &["issue_type", "issueType", "type"])
			.and_then(|t| t.parse().ok())
			.unwrap_or_default(),
		priority: str_field(value, &["priority"]).and_then(|p| Priority::parse_loose(&p)),
		labels,
	})
}

fn from_sections(text: &str) -> AnalysisResult {
	#[derive(Clone, Copy, PartialEq)]
	enum Section {
		None,
		Summary,
		Actions,
		Decisions,
		Issues,
	}

	fn push_entry(
		section: Section,
		entry: &str,
		summary_lines: &mut Vec<String>,
		result: &mut AnalysisResult,
	) {
		let entry = entry.trim();

		match section {
			Section::Summary => summary_lines.push(entry.to_string()),
			Section::Actions => result.action_items.push(split_owner(entry)),
			Section::Decisions =>
				result.decisions.push(Decision { text: entry.to_string(), rationale: None }),
			Section::Issues => result
				.issues
				.push(ExtractedIssue { summary: entry.to_string(), ..ExtractedIssue::default() }),
			Section::None => {},
		}
	}

	let mut section = Section::None;
	let mut summary_lines = Vec::new();
	let mut result = AnalysisResult::default();

	for line in text.lines() {
		let trimmed = line.trim();

		if trimmed.is_empty() {
			continue;
		}
		if let Some(caps) = SECTION_HEADER.captures(trimmed) {
			section = match caps.get(1).map(|m| m.as_str().to_ascii_lowercase()).as_deref() {
				Some("summary") => Section::Summary,
				Some("action items") | Some("action_items") => Section::Actions,
				Some("decisions") => Section::Decisions,
				Some("issues") => Section::Issues,
				_ => Section::None,
			};

			// Text on the header line counts as the section's first entry.
			if let Some(rest) = caps.get(2).and_then(|m| non_empty(m.as_str())) {
				let rest = BULLET
					.captures(&rest)
					.and_then(|caps| caps.get(1))
					.map_or(rest.as_str(), |m| m.as_str())
					.to_string();

				push_entry(section, &rest, &mut summary_lines, &mut result);
			}

			continue;
		}

		match (section, BULLET.captures(trimmed).and_then(|caps| caps.get(1))) {
			(Section::Summary, bullet) =>
				summary_lines.push(bullet.map_or(trimmed, |m| m.as_str()).to_string()),
			(section, Some(item)) =>
				push_entry(section, item.as_str(), &mut summary_lines, &mut result),
			_ => {},
		}
	}

	result.summary = summary_lines.join(" ");

	result
}

/// `Alice: send the deck` and `Send the deck (Alice)` both yield an assignee.
fn split_owner(item: &str) -> ActionItem {
	let item = item.trim();

	if let Some((owner, task)) = item.split_once(':')
		&& !owner.trim().is_empty()
		&& owner.split_whitespace().count() <= 3
		&& !task.trim().is_empty()
	{
		return ActionItem {
			title: task.trim().to_string(),
			assignee: Some(owner.trim().to_string()),
			..ActionItem::default()
		};
	}
	if let Some(stripped) = item.strip_suffix(')')
		&& let Some((task, owner)) = stripped.rsplit_once('(')
		&& !task.trim().is_empty()
		&& !owner.trim().is_empty()
	{
		return ActionItem {
			title: task.trim().to_string(),
			assignee: Some(owner.trim().to_string()),
			..ActionItem::default()
		};
	}

	ActionItem { title: item.to_string(), ..ActionItem::default() }
}

fn str_field(value: &Value, names: &[&str]) -> Option<String> {
	names.iter().find_map(|name| value.get(*name).and_then(|v| v.as_str()).and_then(non_empty))
}

fn array_field<'a>(value: &'a Value, names: &[&str]) -> &'a [Value] {
	names
		.iter()
		.find_map(|name| value.get(*name).and_then(|v| v.as_array()))
		.map(Vec::as_slice)
		.unwrap_or_default()
}

fn non_empty(text: &str) -> Option<String> {
	let trimmed = text.trim();

	if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
}
