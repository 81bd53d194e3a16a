mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	AiProviderConfig, Analysis, Audit, Cache, Config, Postgres, Providers, RateLimit, Retry,
	Security, Service, Storage, Tracker, TrackerProviderConfig, Upload,
};

use std::{env, fs, path::Path, str::FromStr};

pub const MEETING_TYPES: [&str; 6] =
	["general", "standup", "planning", "retrospective", "review", "one_on_one"];
pub const ISSUE_TYPES: [&str; 4] = ["task", "story", "bug", "epic"];

const MAX_RETRY_ATTEMPTS: u32 = 10;

pub fn load(path: &Path) -> Result<Config> {
	load_with_env(path, |name| env::var(name).ok())
}

pub fn load_with_env<F>(path: &Path, lookup: F) -> Result<Config>
where
	F: Fn(&str) -> Option<String>,
{
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	apply_env_overrides(&mut cfg, lookup)?;
	normalize(&mut cfg);
	validate(&cfg)?;

	Ok(cfg)
}

/// Credentials and a handful of tunables may come from the environment instead of the file.
pub fn apply_env_overrides<F>(cfg: &mut Config, lookup: F) -> Result<()>
where
	F: Fn(&str) -> Option<String>,
{
	let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

	if let Some(value) = read("MINUTES_AI_API_KEY") {
		cfg.providers.ai.api_key = value;
	}
	if let Some(value) = read("MINUTES_AI_MODEL") {
		cfg.providers.ai.model = value;
	}
	if let Some(value) = read("MINUTES_TRACKER_BASE_URL") {
		cfg.providers.tracker.api_base = value;
	}
	if let Some(value) = read("MINUTES_TRACKER_EMAIL") {
		cfg.providers.tracker.email = value;
	}
	if let Some(value) = read("MINUTES_TRACKER_API_TOKEN") {
		cfg.providers.tracker.api_token = value;
	}
	if let Some(value) = read("MINUTES_LOG_LEVEL") {
		cfg.service.log_level = value;
	}
	if let Some(value) = read("MINUTES_API_AUTH_TOKEN") {
		cfg.security.api_auth_token = Some(value);
	}
	if let Some(dsn) = read("MINUTES_PG_DSN") {
		match cfg.storage.postgres.as_mut() {
			Some(postgres) => postgres.dsn = dsn,
			None => cfg.storage.postgres = Some(Postgres { dsn, pool_max_conns: 5 }),
		}
	}
	if let Some(value) = read("MINUTES_RATE_LIMIT_PER_HOUR") {
		cfg.rate_limit.analyses_per_hour = parse_env("MINUTES_RATE_LIMIT_PER_HOUR", &value)?;
	}
	if let Some(value) = read("MINUTES_CACHE_TTL_SECS") {
		cfg.cache.ttl_secs = parse_env("MINUTES_CACHE_TTL_SECS", &value)?;
	}
	if let Some(value) = read("MINUTES_AI_TIMEOUT_MS") {
		cfg.providers.ai.timeout_ms = parse_env("MINUTES_AI_TIMEOUT_MS", &value)?;
	}

	Ok(())
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if !matches!(cfg.service.log_format.as_str(), "text" | "json") {
		return Err(Error::Validation {
			message: "service.log_format must be one of text or json.".to_string(),
		});
	}

	match cfg.storage.backend.as_str() {
		"memory" => {},
		"postgres" => {
			let has_dsn = cfg
				.storage
				.postgres
				.as_ref()
				.map(|postgres| !postgres.dsn.trim().is_empty())
				.unwrap_or(false);

			if !has_dsn {
				return Err(Error::Validation {
					message: "storage.postgres.dsn is required when storage.backend is postgres."
						.to_string(),
				});
			}
		},
		_ => {
			return Err(Error::Validation {
				message: "storage.backend must be one of postgres or memory.".to_string(),
			});
		},
	}

	if let Some(postgres) = cfg.storage.postgres.as_ref()
		&& postgres.pool_max_conns == 0
	{
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}

	if cfg.providers.ai.model.trim().is_empty() {
		return Err(Error::Validation {
			message: "providers.ai.model must be non-empty.".to_string(),
		});
	}
	if cfg.providers.ai.max_tokens == 0 {
		return Err(Error::Validation {
			message: "providers.ai.max_tokens must be greater than zero.".to_string(),
		});
	}

	for (label, timeout_ms) in [
		("providers.ai.timeout_ms", cfg.providers.ai.timeout_ms),
		("providers.tracker.timeout_ms", cfg.providers.tracker.timeout_ms),
	] {
		if timeout_ms == 0 {
			return Err(Error::Validation {
				message: format!("{label} must be greater than zero."),
			});
		}
	}

	if !cfg.providers.tracker.api_base.starts_with("http://")
		&& !cfg.providers.tracker.api_base.starts_with("https://")
	{
		return Err(Error::Validation {
			message: "providers.tracker.api_base must be an http(s) URL.".to_string(),
		});
	}
	if cfg.analysis.min_content_chars == 0 {
		return Err(Error::Validation {
			message: "analysis.min_content_chars must be greater than zero.".to_string(),
		});
	}
	if cfg.analysis.min_content_chars >= cfg.analysis.max_content_chars {
		return Err(Error::Validation {
			message: "analysis.min_content_chars must be less than analysis.max_content_chars."
				.to_string(),
		});
	}
	if cfg.analysis.history_limit == 0 {
		return Err(Error::Validation {
			message: "analysis.history_limit must be greater than zero.".to_string(),
		});
	}
	if !MEETING_TYPES.contains(&cfg.analysis.default_meeting_type.as_str()) {
		return Err(Error::Validation {
			message: format!(
				"analysis.default_meeting_type must be one of {}.",
				MEETING_TYPES.join(", ")
			),
		});
	}
	if !ISSUE_TYPES.contains(&cfg.analysis.default_issue_type.as_str()) {
		return Err(Error::Validation {
			message: format!(
				"analysis.default_issue_type must be one of {}.",
				ISSUE_TYPES.join(", ")
			),
		});
	}
	if cfg.upload.allowed_extensions.is_empty() {
		return Err(Error::Validation {
			message: "upload.allowed_extensions must be non-empty.".to_string(),
		});
	}
	if cfg.upload.max_file_bytes == 0 {
		return Err(Error::Validation {
			message: "upload.max_file_bytes must be greater than zero.".to_string(),
		});
	}
	if cfg.retry.max_attempts == 0 || cfg.retry.max_attempts > MAX_RETRY_ATTEMPTS {
		return Err(Error::Validation {
			message: format!("retry.max_attempts must be between 1 and {MAX_RETRY_ATTEMPTS}."),
		});
	}
	if cfg.cache.enabled && cfg.cache.ttl_secs == 0 {
		return Err(Error::Validation {
			message: "cache.ttl_secs must be greater than zero when the cache is enabled."
				.to_string(),
		});
	}
	if cfg.tracker.max_issues_per_request == 0 {
		return Err(Error::Validation {
			message: "tracker.max_issues_per_request must be greater than zero.".to_string(),
		});
	}
	if cfg.audit.max_entries_per_day == 0 {
		return Err(Error::Validation {
			message: "audit.max_entries_per_day must be greater than zero.".to_string(),
		});
	}
	if cfg.audit.default_range_days == 0 {
		return Err(Error::Validation {
			message: "audit.default_range_days must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.security.api_auth_token.as_deref().map(|token| token.trim().is_empty()).unwrap_or(false)
	{
		cfg.security.api_auth_token = None;
	}

	cfg.providers.tracker.api_base =
		cfg.providers.tracker.api_base.trim_end_matches('/').to_string();
	cfg.upload.allowed_extensions = cfg
		.upload
		.allowed_extensions
		.iter()
		.map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
		.filter(|ext| !ext.is_empty())
		.collect();
	cfg.security.admin_user_ids.retain(|id| !id.trim().is_empty());
}

fn parse_env<T>(name: &'static str, value: &str) -> Result<T>
where
	T: FromStr,
{
	value.trim().parse().map_err(|_| Error::InvalidEnv { name })
}
