#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
	Security,
	Validation,
	RateLimit,
	AiService,
	TrackerService,
	File,
	Storage,
	Timeout,
	Auth,
	Unknown,
}
impl ErrorCategory {
	/// Checked in this order; the first category with a matching keyword wins.
	const KEYWORDS: [(Self, &'static [&'static str]); 9] = [
		(Self::Security, &["security", "injection", "forbidden content", "malicious", "xss"]),
		(Self::Validation, &["validation", "invalid", "too short", "too long", "required", "empty"]),
		(Self::RateLimit, &["rate limit", "too many requests", "quota", "429"]),
		(Self::AiService, &["claude", "anthropic", "ai service", "model", "completion"]),
		(Self::TrackerService, &["jira", "tracker", "issue creation", "project key"]),
		(Self::File, &["file", "upload", "extension", "encoding"]),
		(Self::Storage, &["storage", "database", "kv store", "sqlx", "postgres"]),
		(Self::Timeout, &["timeout", "timed out", "deadline"]),
		(Self::Auth, &["unauthorized", "permission", "not authorized", "access denied", "401", "403"]),
	];

	pub fn status_code(self) -> u16 {
		match self {
			Self::Security => 403,
			Self::Validation => 400,
			Self::RateLimit => 429,
			Self::AiService => 502,
			Self::TrackerService => 502,
			Self::File => 400,
			Self::Storage => 503,
			Self::Timeout => 504,
			Self::Auth => 403,
			Self::Unknown => 500,
		}
	}

	pub fn code(self) -> &'static str {
		match self {
			Self::Security => "SECURITY_ERROR",
			Self::Validation => "VALIDATION_ERROR",
			Self::RateLimit => "RATE_LIMIT_EXCEEDED",
			Self::AiService => "AI_SERVICE_ERROR",
			Self::TrackerService => "TRACKER_SERVICE_ERROR",
			Self::File => "FILE_ERROR",
			Self::Storage => "STORAGE_ERROR",
			Self::Timeout => "TIMEOUT",
			Self::Auth => "AUTHORIZATION_ERROR",
			Self::Unknown => "INTERNAL_ERROR",
		}
	}

	pub fn user_message(self) -> &'static str {
		match self {
			Self::Security => "The request was blocked for security reasons.",
			Self::Validation => "The request is invalid.",
			Self::RateLimit => "Too many requests. Please wait before trying again.",
			Self::AiService => "The analysis service is unavailable. Please try again later.",
			Self::TrackerService => "The issue tracker could not complete the request.",
			Self::File => "The uploaded file could not be processed.",
			Self::Storage => "Storage is temporarily unavailable. Please try again later.",
			Self::Timeout => "The operation timed out. Please try again.",
			Self::Auth => "You are not authorized to perform this action.",
			Self::Unknown => "An unexpected error occurred.",
		}
	}

	/// These categories describe the caller's own request, so their text is returned verbatim.
	pub fn exposes_detail(self) -> bool {
		matches!(self, Self::Validation | Self::File | Self::RateLimit)
	}
}

pub fn classify_message(message: &str) -> ErrorCategory {
	let lowered = message.to_lowercase();

	ErrorCategory::KEYWORDS
		.iter()
		.find(|(_, keywords)| keywords.iter().any(|keyword| lowered.contains(keyword)))
		.map(|(category, _)| *category)
		.unwrap_or(ErrorCategory::Unknown)
}
