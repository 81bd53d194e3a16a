use std::{fmt, path::Path, sync::LazyLock};

use regex::Regex;

static VOICE_TAG: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^<v(?:\.[^ >]+)?\s+([^>]+)>").expect("voice tag pattern is valid"));
static INLINE_TAG: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"</?[a-zA-Z][^>]*>").expect("inline tag pattern is valid"));

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileError {
	MissingName,
	UnsupportedType { extension: String },
	Empty,
	TooLarge { size: u64, max: u64 },
	NotUtf8,
	NoText,
}
impl fmt::Display for FileError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::MissingName => f.write_str("File name is required."),
			Self::UnsupportedType { extension } =>
				write!(f, "File type .{extension} is not supported."),
			Self::Empty => f.write_str("File is empty."),
			Self::TooLarge { size, max } =>
				write!(f, "File is too large ({size} bytes, limit {max} bytes)."),
			Self::NotUtf8 => f.write_str("File encoding must be UTF-8."),
			Self::NoText => f.write_str("File contains no readable text."),
		}
	}
}

#[derive(Clone, Debug)]
pub struct FileRules {
	pub max_bytes: u64,
	pub allowed_extensions: Vec<String>,
}
impl FileRules {
	pub fn from_config(cfg: &minutes_config::Upload) -> Self {
		Self { max_bytes: cfg.max_file_bytes, allowed_extensions: cfg.allowed_extensions.clone() }
	}
}

pub fn validate_file(name: &str, size: u64, rules: &FileRules) -> Result<(), FileError> {
	if name.trim().is_empty() {
		return Err(FileError::MissingName);
	}

	let extension = extension_of(name);

	if !rules.allowed_extensions.iter().any(|allowed| allowed == &extension) {
		return Err(FileError::UnsupportedType { extension });
	}
	if size == 0 {
		return Err(FileError::Empty);
	}
	if size > rules.max_bytes {
		return Err(FileError::TooLarge { size, max: rules.max_bytes });
	}

	Ok(())
}

/// Decodes the file as UTF-8 and flattens WebVTT and SubRip transcripts into plain lines.
pub fn extract_text(name: &str, bytes: &[u8]) -> Result<String, FileError> {
	let raw = std::str::from_utf8(bytes).map_err(|_| FileError::NotUtf8)?;
	let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
	let text = match extension_of(name).as_str() {
		"vtt" => flatten_transcript(raw, true),
		"srt" => flatten_transcript(raw, false),
		_ => raw.to_string(),
	};

	if text.trim().is_empty() {
		return Err(FileError::NoText);
	}

	Ok(text)
}

fn extension_of(name: &str) -> String {
	Path::new(name.trim())
		.extension()
		.and_then(|ext| ext.to_str())
		.map(|ext| ext.to_ascii_lowercase())
		.unwrap_or_default()
}

fn flatten_transcript(raw: &str, webvtt: bool) -> String {
	let mut lines = Vec::new();
	let mut skipping_block = false;

	for line in raw.lines() {
		let trimmed = line.trim();

		if trimmed.is_empty() {
			skipping_block = false;

			continue;
		}
		if skipping_block {
			continue;
		}
		if webvtt
			&& (trimmed.starts_with("WEBVTT")
				|| trimmed.starts_with("NOTE")
				|| trimmed.starts_with("STYLE")
				|| trimmed.starts_with("REGION"))
		{
			skipping_block = true;

			continue;
		}
		if trimmed.contains("-->") || trimmed.chars().all(|ch| ch.is_ascii_digit()) {
			continue;
		}

		let spoken = match VOICE_TAG.captures(trimmed) {
			Some(caps) => {
				let speaker = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
				let rest = &trimmed[caps.get(0).map(|m| m.end()).unwrap_or(0)..];

				format!("{speaker}: {}", INLINE_TAG.replace_all(rest, "").trim())
			},
			None => INLINE_TAG.replace_all(trimmed, "").trim().to_string(),
		};

		if !spoken.is_empty() {
			lines.push(spoken);
		}
	}

	lines.join("\n")
}

#[cfg(test)]
mod tests {
	use super::*;

	fn rules() -> FileRules {
		FileRules {
			max_bytes: 64,
			allowed_extensions: vec!["txt".to_string(), "vtt".to_string(), "srt".to_string()],
		}
	}

	#[test]
	fn rejects_unsupported_and_oversized_files() {
		assert_eq!(
			validate_file("notes.pdf", 10, &rules()),
			Err(FileError::UnsupportedType { extension: "pdf".to_string() })
		);
		assert_eq!(
			validate_file("notes.TXT", 65, &rules()),
			Err(FileError::TooLarge { size: 65, max: 64 })
		);
		assert_eq!(validate_file("notes.txt", 0, &rules()), Err(FileError::Empty));
		assert!(validate_file("notes.txt", 64, &rules()).is_ok());
	}

	#[test]
	fn flattens_webvtt_cues() {
		let raw = "WEBVTT\nKind: captions\n\nNOTE edited\nby hand\n\n1\n00:00:01.000 --> 00:00:04.000\n<v Alice>We ship on <b>Friday</b>.\n\n2\n00:00:04.000 --> 00:00:06.000\n<v.loud Bob>Bob owns the rollout.\n";
		let text = extract_text("call.vtt", raw.as_bytes()).expect("vtt must parse");

		assert_eq!(text, "Alice: We ship on Friday.\nBob: Bob owns the rollout.");
	}

	#[test]
	fn flattens_subrip_cues() {
		let raw = "1\r\n00:00:01,000 --> 00:00:02,000\r\nKickoff starts.\r\n\r\n2\r\n00:00:02,000 --> 00:00:03,000\r\nBudget approved.\r\n";
		let text = extract_text("call.srt", raw.as_bytes()).expect("srt must parse");

		assert_eq!(text, "Kickoff starts.\nBudget approved.");
	}

	#[test]
	fn rejects_non_utf8_bytes() {
		assert_eq!(extract_text("notes.txt", &[0xff, 0xfe, 0x00]), Err(FileError::NotUtf8));
	}
}
