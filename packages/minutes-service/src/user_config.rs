use serde::Deserialize;
use time::OffsetDateTime;

use crate::{Error, MinutesService, RequestContext, Result, issues};
use minutes_domain::{IssueType, MeetingType};
use minutes_storage::{
	keys,
	models::{Notifications, Severity, UserConfig},
};

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateUserConfigRequest {
	pub default_meeting_type: Option<String>,
	pub default_issue_type: Option<String>,
	/// An empty string clears the saved project key.
	pub default_project_key: Option<String>,
	pub notifications: Option<NotificationsPatch>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct NotificationsPatch {
	pub on_complete: Option<bool>,
	pub on_error: Option<bool>,
}

impl MinutesService {
	pub async fn get_user_config(&self, ctx: &RequestContext) -> Result<UserConfig> {
		self.load_user_config(&ctx.user_id).await
	}

	pub async fn update_user_config(
		&self,
		ctx: &RequestContext,
		req: UpdateUserConfigRequest,
	) -> Result<UserConfig> {
		let mut config = self.load_user_config(&ctx.user_id).await?;
		let mut changed = Vec::new();

		if let Some(raw) = req.default_meeting_type.as_deref() {
			config.default_meeting_type = raw.parse::<MeetingType>().map_err(Error::validation)?;

			changed.push("default_meeting_type");
		}
		if let Some(raw) = req.default_issue_type.as_deref() {
			config.default_issue_type = raw.parse::<IssueType>().map_err(Error::validation)?;

			changed.push("default_issue_type");
		}
		if let Some(raw) = req.default_project_key.as_deref() {
			let key = raw.trim();

			config.default_project_key = if key.is_empty() {
				None
			} else {
				Some(issues::validate_project_key(key)?.to_string())
			};

			changed.push("default_project_key");
		}
		if let Some(patch) = req.notifications {
			let Notifications { on_complete, on_error } = config.notifications;

			config.notifications = Notifications {
				on_complete: patch.on_complete.unwrap_or(on_complete),
				on_error: patch.on_error.unwrap_or(on_error),
			};

			changed.push("notifications");
		}

		config.updated_at = Some(OffsetDateTime::now_utc());

		minutes_storage::set_json(
			self.store.as_ref(),
			&keys::user_config(&ctx.user_id),
			&config,
			None,
		)
		.await?;

		tracing::info!(user_id = %ctx.user_id, fields = ?changed, "User config updated.");

		self.record_audit(
			"user_config.updated",
			&ctx.user_id,
			Severity::Info,
			serde_json::json!({ "fields": changed }),
		)
		.await;

		Ok(config)
	}

	/// Stored preferences, or the service-wide defaults when the user has none yet.
	pub(crate) async fn load_user_config(&self, user_id: &str) -> Result<UserConfig> {
		let stored: Option<UserConfig> =
			minutes_storage::get_json(self.store.as_ref(), &keys::user_config(user_id)).await?;

		Ok(stored.unwrap_or_else(|| UserConfig {
			default_meeting_type: self
				.cfg
				.analysis
				.default_meeting_type
				.parse()
				.unwrap_or_default(),
			default_issue_type: self.cfg.analysis.default_issue_type.parse().unwrap_or_default(),
			..UserConfig::default()
		}))
	}
}
