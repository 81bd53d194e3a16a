use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
	Queued,
	Processing,
	Completed,
	Error,
}
impl AnalysisStatus {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Queued => "queued",
			Self::Processing => "processing",
			Self::Completed => "completed",
			Self::Error => "error",
		}
	}

	pub fn is_terminal(self) -> bool {
		matches!(self, Self::Completed | Self::Error)
	}

	/// `queued -> processing -> {completed | error}`, plus `queued -> error` for failures that
	/// happen before processing starts. Re-entering the current non-terminal state is allowed so
	/// progress updates can be written.
	pub fn can_transition_to(self, next: Self) -> bool {
		match (self, next) {
			(Self::Queued, Self::Queued | Self::Processing | Self::Error) => true,
			(Self::Processing, Self::Processing | Self::Completed | Self::Error) => true,
			_ => false,
		}
	}
}
impl fmt::Display for AnalysisStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
