pub mod analysis;
pub mod classify;
pub mod content;
pub mod file;
pub mod status;
pub mod text;
pub mod types;

pub use analysis::{ActionItem, AnalysisResult, Decision, ExtractedIssue};
pub use classify::{ErrorCategory, classify_message};
pub use content::{
	ContentError, ContentRules, ValidatedContent, content_hash, sanitize, validate_content,
};
pub use file::{FileError, FileRules, extract_text, validate_file};
pub use status::AnalysisStatus;
pub use types::{IssueType, MeetingType, Priority};
