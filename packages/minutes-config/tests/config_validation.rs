use std::{
	collections::HashMap,
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

use minutes_config::{Config, Error};

const SAMPLE_CONFIG_TOML: &str = include_str!("fixtures/sample_config.toml");

fn sample_with<F>(edit: F) -> String
where
	F: FnOnce(&mut toml::Table),
{
	let mut value: Value = toml::from_str(SAMPLE_CONFIG_TOML).expect("Failed to parse sample config.");
	let root = value.as_table_mut().expect("Sample config must be a table.");

	edit(root);

	toml::to_string(&value).expect("Failed to render sample config.")
}

fn section<'a>(root: &'a mut toml::Table, name: &str) -> &'a mut toml::Table {
	root.get_mut(name)
		.and_then(Value::as_table_mut)
		.unwrap_or_else(|| panic!("Sample config must include [{name}]."))
}

fn write_temp_config(payload: String) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let pid = std::process::id();
	let mut path = env::temp_dir();

	path.push(format!("minutes_config_test_{nanos}_{pid}_{ordinal}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn load_payload(payload: String, env_vars: &[(&str, &str)]) -> minutes_config::Result<Config> {
	let vars: HashMap<String, String> =
		env_vars.iter().map(|(key, value)| (key.to_string(), value.to_string())).collect();
	let path = write_temp_config(payload);
	let result = minutes_config::load_with_env(&path, |name| vars.get(name).cloned());

	fs::remove_file(&path).expect("Failed to remove test config.");

	result
}

fn expect_validation(payload: String, needle: &str) {
	let err = load_payload(payload, &[]).expect_err("Expected a validation error.");
	let message = err.to_string();

	assert!(message.contains(needle), "Unexpected error message: {message}");
}

#[test]
fn sample_config_loads_and_normalizes() {
	let cfg = load_payload(SAMPLE_CONFIG_TOML.to_string(), &[]).expect("Sample config must load.");

	assert_eq!(cfg.providers.tracker.api_base, "https://example.atlassian.net");
	assert_eq!(cfg.upload.allowed_extensions, vec!["txt", "md", "vtt", "srt"]);
	assert_eq!(cfg.security.admin_user_ids, vec!["admin-1"]);
	assert!(cfg.security.api_auth_token.is_none());
	assert_eq!(cfg.providers.ai.path, "/v1/messages");
	assert_eq!(cfg.providers.ai.anthropic_version, "2023-06-01");
}

#[test]
fn environment_overrides_credentials_and_tunables() {
	let cfg = load_payload(
		SAMPLE_CONFIG_TOML.to_string(),
		&[
			("MINUTES_AI_API_KEY", "env-key"),
			("MINUTES_TRACKER_API_TOKEN", "env-token"),
			("MINUTES_PG_DSN", "postgres://env@localhost/env"),
			("MINUTES_RATE_LIMIT_PER_HOUR", "7"),
			("MINUTES_CACHE_TTL_SECS", "60"),
			("MINUTES_LOG_LEVEL", "   "),
		],
	)
	.expect("Config with overrides must load.");

	assert_eq!(cfg.providers.ai.api_key, "env-key");
	assert_eq!(cfg.providers.tracker.api_token, "env-token");
	assert_eq!(
		cfg.storage.postgres.as_ref().map(|postgres| postgres.dsn.as_str()),
		Some("postgres://env@localhost/env")
	);
	assert_eq!(cfg.rate_limit.analyses_per_hour, 7);
	assert_eq!(cfg.cache.ttl_secs, 60);
	assert_eq!(cfg.service.log_level, "info");
}

#[test]
fn unparsable_numeric_override_is_rejected() {
	let err = load_payload(SAMPLE_CONFIG_TOML.to_string(), &[("MINUTES_CACHE_TTL_SECS", "soon")])
		.expect_err("Expected an invalid env error.");

	assert!(matches!(err, Error::InvalidEnv { name: "MINUTES_CACHE_TTL_SECS" }));
}

#[test]
fn postgres_backend_requires_dsn() {
	let payload = sample_with(|root| {
		section(root, "storage").remove("postgres");
	});

	expect_validation(payload, "storage.postgres.dsn is required");
}

#[test]
fn memory_backend_needs_no_dsn() {
	let payload = sample_with(|root| {
		let storage = section(root, "storage");

		storage.remove("postgres");
		storage.insert("backend".to_string(), Value::String("memory".to_string()));
	});
	let cfg = load_payload(payload, &[]).expect("Memory backend config must load.");

	assert_eq!(cfg.storage.backend, "memory");
}

#[test]
fn unknown_backend_is_rejected() {
	let payload = sample_with(|root| {
		section(root, "storage").insert("backend".to_string(), Value::String("redis".to_string()));
	});

	expect_validation(payload, "storage.backend must be one of postgres or memory.");
}

#[test]
fn content_bounds_must_be_ordered() {
	let payload = sample_with(|root| {
		section(root, "analysis").insert("min_content_chars".to_string(), Value::Integer(50_000));
	});

	expect_validation(payload, "analysis.min_content_chars must be less than");
}

#[test]
fn retry_attempts_are_bounded() {
	let payload = sample_with(|root| {
		section(root, "retry").insert("max_attempts".to_string(), Value::Integer(0));
	});

	expect_validation(payload, "retry.max_attempts must be between 1 and 10.");
}

#[test]
fn default_meeting_type_must_be_known() {
	let payload = sample_with(|root| {
		section(root, "analysis")
			.insert("default_meeting_type".to_string(), Value::String("offsite".to_string()));
	});

	expect_validation(payload, "analysis.default_meeting_type must be one of");
}

#[test]
fn optional_sections_fall_back_to_defaults() {
	let payload = sample_with(|root| {
		for name in ["analysis", "upload", "retry", "rate_limit", "cache", "tracker", "audit"] {
			root.remove(name);
		}
	});
	let cfg = load_payload(payload, &[]).expect("Config without optional sections must load.");

	assert_eq!(cfg.analysis.min_content_chars, 10);
	assert_eq!(cfg.analysis.max_content_chars, 50_000);
	assert_eq!(cfg.retry.max_attempts, 3);
	assert_eq!(cfg.tracker.max_issues_per_request, 50);
}

#[test]
fn missing_file_reports_path() {
	let path = env::temp_dir().join("minutes_config_missing.toml");
	let err = minutes_config::load(&path).expect_err("Expected a read error.");

	assert!(matches!(err, Error::ReadConfig { .. }));
}
