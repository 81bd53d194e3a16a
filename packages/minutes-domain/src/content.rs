use std::{fmt, sync::LazyLock};

use regex::Regex;

static SCRIPT_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?is)<\s*(script|style)\b[^>]*>.*?<\s*/\s*(script|style)\s*>")
		.expect("script block pattern is valid")
});
static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?s)<\s*/?\s*[a-zA-Z!][^<>]*>").expect("html tag pattern is valid")
});
static BLANK_RUN: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)+").expect("blank run pattern is valid"));

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentError {
	TooShort,
	TooLong,
	Empty,
}
impl ContentError {
	pub fn message(self) -> &'static str {
		match self {
			Self::TooShort => "Content too short",
			Self::TooLong => "Content too long",
			Self::Empty => "Content is empty",
		}
	}
}
impl fmt::Display for ContentError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.message())
	}
}

#[derive(Clone, Copy, Debug)]
pub struct ContentRules {
	pub min_chars: usize,
	pub max_chars: usize,
}
impl ContentRules {
	pub fn from_config(cfg: &minutes_config::Analysis) -> Self {
		Self {
			min_chars: cfg.min_content_chars as usize,
			max_chars: cfg.max_content_chars as usize,
		}
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedContent {
	pub sanitized: String,
	/// Character count of the raw input.
	pub char_count: usize,
}

/// Bounds apply to the raw input. The sanitized copy is what gets stored and analyzed.
pub fn validate_content(text: &str, rules: ContentRules) -> Result<ValidatedContent, ContentError> {
	let char_count = text.chars().count();

	if char_count < rules.min_chars {
		return Err(ContentError::TooShort);
	}
	if char_count > rules.max_chars {
		return Err(ContentError::TooLong);
	}
	if text.trim().is_empty() {
		return Err(ContentError::Empty);
	}

	let sanitized = sanitize(text);

	if sanitized.is_empty() {
		return Err(ContentError::Empty);
	}

	Ok(ValidatedContent { sanitized, char_count })
}

/// Every step only removes characters or replaces a sequence with a shorter one.
pub fn sanitize(text: &str) -> String {
	let unified = text.replace("\r\n", "\n").replace('\r', "\n");
	let without_scripts = SCRIPT_BLOCK.replace_all(&unified, "");
	let without_tags = HTML_TAG.replace_all(&without_scripts, "");
	let printable: String = without_tags
		.chars()
		.filter(|ch| *ch == '\n' || *ch == '\t' || !ch.is_control())
		.collect();
	let collapsed = BLANK_RUN.replace_all(&printable, "\n\n");

	collapsed.trim().to_string()
}

pub fn content_hash(text: &str) -> String {
	blake3::hash(text.as_bytes()).to_hex().to_string()
}
