use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingType {
	#[default]
	General,
	Standup,
	Planning,
	Retrospective,
	Review,
	OneOnOne,
}
impl MeetingType {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::General => "general",
			Self::Standup => "standup",
			Self::Planning => "planning",
			Self::Retrospective => "retrospective",
			Self::Review => "review",
			Self::OneOnOne => "one_on_one",
		}
	}

	/// What the analysis should pay most attention to for this kind of meeting.
	pub fn focus(self) -> &'static str {
		match self {
			Self::General => "key discussion points, decisions, and follow-up tasks",
			Self::Standup => "blockers, commitments for today, and work that is at risk",
			Self::Planning => "scope, estimates, owners, and sequencing of upcoming work",
			Self::Retrospective => "what went well, what did not, and concrete improvement actions",
			Self::Review => "feedback received, requested changes, and acceptance outcomes",
			Self::OneOnOne => "agreed next steps, growth goals, and concerns raised",
		}
	}
}
impl FromStr for MeetingType {
	type Err = String;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
			"general" => Ok(Self::General),
			"standup" | "stand_up" | "daily" => Ok(Self::Standup),
			"planning" | "sprint_planning" => Ok(Self::Planning),
			"retrospective" | "retro" => Ok(Self::Retrospective),
			"review" | "sprint_review" => Ok(Self::Review),
			"one_on_one" | "1on1" | "1_on_1" => Ok(Self::OneOnOne),
			other => Err(format!("Unknown meeting type: {other}.")),
		}
	}
}
impl fmt::Display for MeetingType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
	#[default]
	Task,
	Story,
	Bug,
	Epic,
}
impl IssueType {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Task => "task",
			Self::Story => "story",
			Self::Bug => "bug",
			Self::Epic => "epic",
		}
	}

	/// Name the tracker expects in `issuetype.name`.
	pub fn tracker_name(self) -> &'static str {
		match self {
			Self::Task => "Task",
			Self::Story => "Story",
			Self::Bug => "Bug",
			Self::Epic => "Epic",
		}
	}
}
impl FromStr for IssueType {
	type Err = String;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"task" => Ok(Self::Task),
			"story" | "user story" => Ok(Self::Story),
			"bug" | "defect" => Ok(Self::Bug),
			"epic" => Ok(Self::Epic),
			other => Err(format!("Unknown issue type: {other}.")),
		}
	}
}
impl fmt::Display for IssueType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
	Highest,
	High,
	#[default]
	Medium,
	Low,
	Lowest,
}
impl Priority {
	pub fn tracker_name(self) -> &'static str {
		match self {
			Self::Highest => "Highest",
			Self::High => "High",
			Self::Medium => "Medium",
			Self::Low => "Low",
			Self::Lowest => "Lowest",
		}
	}

	/// Lenient parse for model output; unknown values map to `None` rather than failing.
	pub fn parse_loose(raw: &str) -> Option<Self> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"highest" | "critical" | "blocker" | "urgent" => Some(Self::Highest),
			"high" | "major" => Some(Self::High),
			"medium" | "normal" | "moderate" => Some(Self::Medium),
			"low" | "minor" => Some(Self::Low),
			"lowest" | "trivial" => Some(Self::Lowest),
			_ => None,
		}
	}
}
