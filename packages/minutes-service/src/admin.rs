use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Error, HOUR, MinutesService, RequestContext, Result};
use minutes_storage::{
	keys,
	models::{ApiKeyMetadata, Severity},
};

const DEFAULT_KEY_RATE_LIMIT: u32 = 100;
const MAX_KEY_RATE_LIMIT: u32 = 10_000;
const MIN_KEY_CHARS: usize = 20;
const MAX_NAME_CHARS: usize = 100;
const MAX_LISTED_KEYS: usize = 1_000;

#[derive(Clone, Debug, Serialize)]
pub struct AdminPermissions {
	pub user_id: String,
	pub is_admin: bool,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ManageApiKeysRequest {
	List,
	Create {
		name: String,
		key: String,
		#[serde(default)]
		rate_limit: Option<u32>,
	},
	Rotate {
		id: Uuid,
		key: String,
	},
	Activate {
		id: Uuid,
	},
	Deactivate {
		id: Uuid,
	},
	UpdateRateLimit {
		id: Uuid,
		rate_limit: u32,
	},
	Delete {
		id: Uuid,
	},
}
impl ManageApiKeysRequest {
	fn action(&self) -> &'static str {
		match self {
			Self::List => "list",
			Self::Create { .. } => "create",
			Self::Rotate { .. } => "rotate",
			Self::Activate { .. } => "activate",
			Self::Deactivate { .. } => "deactivate",
			Self::UpdateRateLimit { .. } => "update_rate_limit",
			Self::Delete { .. } => "delete",
		}
	}
}

/// Secrets never leave the store; only metadata and the active pointer are returned.
#[derive(Clone, Debug, Serialize)]
pub struct ApiKeysResponse {
	pub action: &'static str,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub key: Option<ApiKeyMetadata>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub keys: Option<Vec<ApiKeyMetadata>>,
	pub active_key_id: Option<Uuid>,
}

impl MinutesService {
	pub async fn check_admin_permissions(&self, ctx: &RequestContext) -> Result<AdminPermissions> {
		Ok(AdminPermissions { user_id: ctx.user_id.clone(), is_admin: self.is_admin(ctx) })
	}

	pub async fn manage_api_keys(
		&self,
		ctx: &RequestContext,
		req: ManageApiKeysRequest,
	) -> Result<ApiKeysResponse> {
		let action = req.action();

		self.require_admin(ctx, "manageAPIKeys").await?;

		let now = OffsetDateTime::now_utc();
		let (key, severity) = match req {
			ManageApiKeysRequest::List => {
				let listed = self.list_api_keys().await?;
				let active_key_id = self.active_key_id().await?;

				self.record_audit(
					"api_key.listed",
					&ctx.user_id,
					Severity::Info,
					serde_json::json!({ "count": listed.len() }),
				)
				.await;

				return Ok(ApiKeysResponse { action, key: None, keys: Some(listed), active_key_id });
			},
			ManageApiKeysRequest::Create { name, key, rate_limit } => {
				let name = validate_name(&name)?;
				let secret = validate_secret(&key)?;
				let rate_limit = validate_rate_limit(rate_limit.unwrap_or(DEFAULT_KEY_RATE_LIMIT))?;
				let make_active = self.active_key_id().await?.is_none();
				let meta = ApiKeyMetadata {
					id: Uuid::new_v4(),
					name,
					active: make_active,
					created_at: now,
					rotated_at: None,
					last_used_at: None,
					usage_count: 0,
					rate_limit,
					key_hint: key_hint(secret),
				};

				self.store
					.set(&keys::api_key_secret(meta.id), Value::String(secret.to_string()), None)
					.await?;
				self.save_key_meta(&meta).await?;

				if make_active {
					self.set_active_pointer(meta.id).await?;
				}

				(meta, Severity::Warning)
			},
			ManageApiKeysRequest::Rotate { id, key } => {
				let secret = validate_secret(&key)?;
				let mut meta = self.load_key_meta(id).await?;

				self.store
					.set(&keys::api_key_secret(id), Value::String(secret.to_string()), None)
					.await?;

				meta.rotated_at = Some(now);
				meta.key_hint = key_hint(secret);

				self.save_key_meta(&meta).await?;

				(meta, Severity::Warning)
			},
			ManageApiKeysRequest::Activate { id } => {
				let mut meta = self.load_key_meta(id).await?;

				if let Some(previous) =
					self.active_key_id().await?.filter(|previous| *previous != id)
					&& let Some(mut previous_meta) = self.find_key_meta(previous).await?
				{
					previous_meta.active = false;

					self.save_key_meta(&previous_meta).await?;
				}

				meta.active = true;

				self.save_key_meta(&meta).await?;
				self.set_active_pointer(id).await?;

				(meta, Severity::Warning)
			},
			ManageApiKeysRequest::Deactivate { id } => {
				let mut meta = self.load_key_meta(id).await?;

				meta.active = false;

				self.save_key_meta(&meta).await?;
				self.clear_active_pointer_if(id).await?;

				(meta, Severity::Warning)
			},
			ManageApiKeysRequest::UpdateRateLimit { id, rate_limit } => {
				let rate_limit = validate_rate_limit(rate_limit)?;
				let mut meta = self.load_key_meta(id).await?;

				meta.rate_limit = rate_limit;

				self.save_key_meta(&meta).await?;

				(meta, Severity::Info)
			},
			ManageApiKeysRequest::Delete { id } => {
				let meta = self.load_key_meta(id).await?;

				self.store.delete(&keys::api_key_meta(id)).await?;
				self.store.delete(&keys::api_key_secret(id)).await?;
				self.clear_active_pointer_if(id).await?;

				(meta, Severity::Warning)
			},
		};
		let active_key_id = self.active_key_id().await?;

		tracing::info!(user_id = %ctx.user_id, action, key_id = %key.id, "API key updated.");

		self.record_audit(
			&format!("api_key.{}", past_tense(action)),
			&ctx.user_id,
			severity,
			serde_json::json!({
				"key_id": key.id,
				"name": key.name,
				"key_hint": key.key_hint,
				"active": key.active,
				"rate_limit": key.rate_limit,
			}),
		)
		.await;

		Ok(ApiKeysResponse { action, key: Some(key), keys: None, active_key_id })
	}

	pub(crate) async fn require_admin(&self, ctx: &RequestContext, operation: &str) -> Result<()> {
		if self.is_admin(ctx) {
			return Ok(());
		}

		tracing::warn!(user_id = %ctx.user_id, operation, "Admin permission denied.");

		self.record_audit(
			"security.admin_denied",
			&ctx.user_id,
			Severity::Warning,
			serde_json::json!({ "operation": operation }),
		)
		.await;

		Err(Error::Unauthorized { message: "Admin permissions are required.".to_string() })
	}

	/// Picks the key for one model call: the active stored key, else the configured one. Using a
	/// stored key counts against its hourly limit and updates its usage metadata.
	pub(crate) async fn resolve_api_key(&self, now: OffsetDateTime) -> Result<String> {
		if let Some(id) = self.active_key_id().await?
			&& let Some(mut meta) = self.find_key_meta(id).await?
			&& meta.active
			&& let Some(Value::String(secret)) = self.store.get(&keys::api_key_secret(id)).await?
		{
			let used =
				self.store.increment(&keys::api_key_rate_limit(id, now), 1, Some(HOUR)).await?;

			if used > i64::from(meta.rate_limit) {
				tracing::warn!(key_id = %id, used, limit = meta.rate_limit, "API key rate limit exceeded.");

				return Err(Error::RateLimited {
					message: format!(
						"API key rate limit exceeded: at most {} requests per hour.",
						meta.rate_limit
					),
				});
			}

			meta.usage_count += 1;
			meta.last_used_at = Some(now);

			self.save_key_meta(&meta).await?;

			return Ok(secret);
		}

		let configured = self.cfg.providers.ai.api_key.trim();

		if configured.is_empty() {
			return Err(Error::Unauthorized {
				message: "No Claude API key is configured.".to_string(),
			});
		}

		Ok(configured.to_string())
	}

	async fn list_api_keys(&self) -> Result<Vec<ApiKeyMetadata>> {
		let rows = self.store.list_prefix(keys::API_KEY_META_PREFIX, MAX_LISTED_KEYS).await?;
		let mut listed = Vec::with_capacity(rows.len());

		for (key, value) in rows {
			match serde_json::from_value::<ApiKeyMetadata>(value) {
				Ok(meta) => listed.push(meta),
				Err(err) =>
					tracing::warn!(key = %key, error = %err, "Skipping unreadable API key metadata."),
			}
		}

		listed.sort_by(|a, b| a.created_at.cmp(&b.created_at));

		Ok(listed)
	}

	async fn active_key_id(&self) -> Result<Option<Uuid>> {
		Ok(minutes_storage::get_json(self.store.as_ref(), keys::API_KEY_ACTIVE).await?)
	}

	async fn find_key_meta(&self, id: Uuid) -> Result<Option<ApiKeyMetadata>> {
		Ok(minutes_storage::get_json(self.store.as_ref(), &keys::api_key_meta(id)).await?)
	}

	async fn load_key_meta(&self, id: Uuid) -> Result<ApiKeyMetadata> {
		self.find_key_meta(id)
			.await?
			.ok_or_else(|| Error::NotFound { message: format!("API key {id} was not found.") })
	}

	async fn save_key_meta(&self, meta: &ApiKeyMetadata) -> Result<()> {
		Ok(minutes_storage::set_json(self.store.as_ref(), &keys::api_key_meta(meta.id), meta, None)
			.await?)
	}

	async fn set_active_pointer(&self, id: Uuid) -> Result<()> {
		Ok(minutes_storage::set_json(self.store.as_ref(), keys::API_KEY_ACTIVE, &id, None).await?)
	}

	async fn clear_active_pointer_if(&self, id: Uuid) -> Result<()> {
		if self.active_key_id().await? == Some(id) {
			self.store.delete(keys::API_KEY_ACTIVE).await?;
		}

		Ok(())
	}
}

fn validate_name(raw: &str) -> Result<String> {
	let name = raw.trim();

	if name.is_empty() {
		return Err(Error::validation("API key name is required."));
	}
	if name.chars().count() > MAX_NAME_CHARS {
		return Err(Error::validation(format!(
			"API key name must be at most {MAX_NAME_CHARS} characters."
		)));
	}

	Ok(name.to_string())
}

fn validate_secret(raw: &str) -> Result<&str> {
	if raw.is_empty() {
		return Err(Error::validation("API key value is required."));
	}
	if raw.chars().any(char::is_whitespace) {
		return Err(Error::validation("API key value must not contain whitespace."));
	}
	if raw.chars().count() < MIN_KEY_CHARS {
		return Err(Error::validation(format!(
			"API key value must be at least {MIN_KEY_CHARS} characters."
		)));
	}

	Ok(raw)
}

fn validate_rate_limit(rate_limit: u32) -> Result<u32> {
	if !(1..=MAX_KEY_RATE_LIMIT).contains(&rate_limit) {
		return Err(Error::validation(format!(
			"API key rate limit must be between 1 and {MAX_KEY_RATE_LIMIT} requests per hour."
		)));
	}

	Ok(rate_limit)
}

fn key_hint(secret: &str) -> String {
	let chars = secret.chars().collect::<Vec<_>>();

	chars[chars.len().saturating_sub(4)..].iter().collect()
}

fn past_tense(action: &str) -> &str {
	match action {
		"create" => "created",
		"rotate" => "rotated",
		"activate" => "activated",
		"deactivate" => "deactivated",
		"update_rate_limit" => "rate_limit_updated",
		"delete" => "deleted",
		other => other,
	}
}
