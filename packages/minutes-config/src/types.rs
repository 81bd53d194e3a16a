use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	#[serde(default)]
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub analysis: Analysis,
	#[serde(default)]
	pub upload: Upload,
	#[serde(default)]
	pub retry: Retry,
	#[serde(default)]
	pub rate_limit: RateLimit,
	#[serde(default)]
	pub cache: Cache,
	#[serde(default)]
	pub tracker: Tracker,
	#[serde(default)]
	pub audit: Audit,
	#[serde(default)]
	pub security: Security,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	#[serde(default = "default_log_level")]
	pub log_level: String,
	/// `text` or `json`.
	#[serde(default = "default_log_format")]
	pub log_format: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Storage {
	/// `postgres` or `memory`.
	pub backend: String,
	pub postgres: Option<Postgres>,
}
impl Default for Storage {
	fn default() -> Self {
		Self { backend: "postgres".to_string(), postgres: None }
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	#[serde(default = "default_pool_max_conns")]
	pub pool_max_conns: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Providers {
	pub ai: AiProviderConfig,
	pub tracker: TrackerProviderConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AiProviderConfig {
	#[serde(default = "default_ai_provider_id")]
	pub provider_id: String,
	#[serde(default = "default_ai_api_base")]
	pub api_base: String,
	#[serde(default = "default_ai_path")]
	pub path: String,
	/// Fallback credential. A stored active key takes precedence.
	#[serde(default)]
	pub api_key: String,
	pub model: String,
	#[serde(default = "default_ai_max_tokens")]
	pub max_tokens: u32,
	#[serde(default = "default_anthropic_version")]
	pub anthropic_version: String,
	#[serde(default = "default_ai_timeout_ms")]
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TrackerProviderConfig {
	/// Site root, e.g. `https://example.atlassian.net`.
	pub api_base: String,
	#[serde(default)]
	pub email: String,
	#[serde(default)]
	pub api_token: String,
	#[serde(default = "default_tracker_timeout_ms")]
	pub timeout_ms: u64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Analysis {
	pub min_content_chars: u32,
	pub max_content_chars: u32,
	pub history_limit: u32,
	/// Runs the pipeline inside the request instead of on a spawned task.
	pub run_inline: bool,
	pub default_meeting_type: String,
	pub default_issue_type: String,
}
impl Default for Analysis {
	fn default() -> Self {
		Self {
			min_content_chars: 10,
			max_content_chars: 50_000,
			history_limit: 50,
			run_inline: false,
			default_meeting_type: "general".to_string(),
			default_issue_type: "task".to_string(),
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Upload {
	pub max_file_bytes: u64,
	pub allowed_extensions: Vec<String>,
}
impl Default for Upload {
	fn default() -> Self {
		Self {
			max_file_bytes: 1_048_576,
			allowed_extensions: ["txt", "md", "vtt", "srt"].map(str::to_string).to_vec(),
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Retry {
	pub max_attempts: u32,
	pub base_delay_ms: u64,
}
impl Default for Retry {
	fn default() -> Self {
		Self { max_attempts: 3, base_delay_ms: 500 }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RateLimit {
	/// Per caller. Zero disables the limit.
	pub analyses_per_hour: u32,
}
impl Default for RateLimit {
	fn default() -> Self {
		Self { analyses_per_hour: 20 }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Cache {
	pub enabled: bool,
	pub ttl_secs: u64,
}
impl Default for Cache {
	fn default() -> Self {
		Self { enabled: true, ttl_secs: 86_400 }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Tracker {
	pub max_issues_per_request: u32,
	pub default_labels: Vec<String>,
}
impl Default for Tracker {
	fn default() -> Self {
		Self { max_issues_per_request: 50, default_labels: vec!["meeting-notes".to_string()] }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Audit {
	pub max_entries_per_day: u32,
	pub default_range_days: u32,
}
impl Default for Audit {
	fn default() -> Self {
		Self { max_entries_per_day: 5_000, default_range_days: 7 }
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Security {
	pub bind_localhost_only: bool,
	pub api_auth_token: Option<String>,
	pub admin_user_ids: Vec<String>,
}
impl Default for Security {
	fn default() -> Self {
		Self { bind_localhost_only: true, api_auth_token: None, admin_user_ids: Vec::new() }
	}
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_log_format() -> String {
	"text".to_string()
}

fn default_pool_max_conns() -> u32 {
	5
}

fn default_ai_provider_id() -> String {
	"anthropic".to_string()
}

fn default_ai_api_base() -> String {
	"https://api.anthropic.com".to_string()
}

fn default_ai_path() -> String {
	"/v1/messages".to_string()
}

fn default_ai_max_tokens() -> u32 {
	4_000
}

fn default_anthropic_version() -> String {
	"2023-06-01".to_string()
}

fn default_ai_timeout_ms() -> u64 {
	60_000
}

fn default_tracker_timeout_ms() -> u64 {
	15_000
}
