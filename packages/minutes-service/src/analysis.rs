use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Error, MinutesService, RequestContext, Result};
use minutes_domain::{
	AnalysisResult, AnalysisStatus, ContentRules, IssueType, MeetingType, ValidatedContent, text,
};
use minutes_providers::{
	ai::AnalysisRequest,
	retry::{self, RetryPolicy},
};
use minutes_storage::{
	keys,
	models::{AnalysisRecord, AnalysisSource, Severity},
};

const SUMMARY_PREVIEW_GRAPHEMES: usize = 200;
const TOMBSTONE_TTL: Duration = Duration::from_secs(86_400);

#[derive(Clone, Debug, Deserialize)]
pub struct StartAnalysisRequest {
	pub content: String,
	#[serde(default)]
	pub meeting_type: Option<String>,
	#[serde(default)]
	pub issue_type: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct StartAnalysisResponse {
	pub analysis_id: Uuid,
	pub status: AnalysisStatus,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AnalysisIdRequest {
	pub analysis_id: Uuid,
}

#[derive(Clone, Debug, Serialize)]
pub struct AnalysisStatusResponse {
	pub analysis_id: Uuid,
	pub status: AnalysisStatus,
	pub progress: u8,
	pub meeting_type: MeetingType,
	pub source: AnalysisSource,
	pub file_name: Option<String>,
	#[serde(with = "minutes_storage::time_serde")]
	pub created_at: OffsetDateTime,
	#[serde(with = "minutes_storage::time_serde")]
	pub updated_at: OffsetDateTime,
	#[serde(with = "minutes_storage::time_serde::option")]
	pub completed_at: Option<OffsetDateTime>,
	pub error: Option<String>,
}
impl From<&AnalysisRecord> for AnalysisStatusResponse {
	fn from(record: &AnalysisRecord) -> Self {
		Self {
			analysis_id: record.id,
			status: record.status,
			progress: record.progress,
			meeting_type: record.meeting_type,
			source: record.source,
			file_name: record.file_name.clone(),
			created_at: record.created_at,
			updated_at: record.updated_at,
			completed_at: record.completed_at,
			error: record.error.clone(),
		}
	}
}

#[derive(Clone, Debug, Serialize)]
pub struct AnalysisResultsResponse {
	pub analysis_id: Uuid,
	pub meeting_type: MeetingType,
	pub issue_type: IssueType,
	pub result: AnalysisResult,
	#[serde(with = "minutes_storage::time_serde::option")]
	pub completed_at: Option<OffsetDateTime>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct HistoryRequest {
	pub limit: Option<u32>,
}

#[derive(Clone, Debug, Serialize)]
pub struct AnalysisSummary {
	pub analysis_id: Uuid,
	pub status: AnalysisStatus,
	pub progress: u8,
	pub meeting_type: MeetingType,
	pub source: AnalysisSource,
	pub file_name: Option<String>,
	pub input_length: usize,
	#[serde(with = "minutes_storage::time_serde")]
	pub created_at: OffsetDateTime,
	#[serde(with = "minutes_storage::time_serde::option")]
	pub completed_at: Option<OffsetDateTime>,
	pub summary: Option<String>,
	pub action_item_count: usize,
	pub issue_count: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct HistoryResponse {
	pub analyses: Vec<AnalysisSummary>,
}

#[derive(Clone, Debug, Serialize)]
pub struct DeleteAnalysisResponse {
	pub analysis_id: Uuid,
	pub deleted: bool,
}

/// Everything needed to queue an analysis once the input has been validated.
pub(crate) struct Submission {
	pub(crate) content: ValidatedContent,
	pub(crate) meeting_type: MeetingType,
	pub(crate) issue_type: IssueType,
	pub(crate) source: AnalysisSource,
	pub(crate) file_name: Option<String>,
}

impl MinutesService {
	pub async fn start_analysis(
		&self,
		ctx: &RequestContext,
		req: StartAnalysisRequest,
	) -> Result<StartAnalysisResponse> {
		let content = self.validate_content(&req.content)?;
		let (meeting_type, issue_type) = self
			.resolve_types(ctx, req.meeting_type.as_deref(), req.issue_type.as_deref())
			.await?;

		self.submit(
			ctx,
			Submission {
				content,
				meeting_type,
				issue_type,
				source: AnalysisSource::Text,
				file_name: None,
			},
		)
		.await
	}

	pub async fn get_analysis_status(
		&self,
		ctx: &RequestContext,
		req: AnalysisIdRequest,
	) -> Result<AnalysisStatusResponse> {
		let record = self.load_owned(ctx, req.analysis_id).await?;

		Ok(AnalysisStatusResponse::from(&record))
	}

	pub async fn get_analysis_results(
		&self,
		ctx: &RequestContext,
		req: AnalysisIdRequest,
	) -> Result<AnalysisResultsResponse> {
		let record = self.load_owned(ctx, req.analysis_id).await?;

		if record.status != AnalysisStatus::Completed {
			return Err(Error::validation(format!(
				"Analysis is not completed yet (status: {}).",
				record.status
			)));
		}

		let result = record.result.ok_or_else(|| Error::Internal {
			message: "Completed analysis has no stored result.".to_string(),
		})?;

		Ok(AnalysisResultsResponse {
			analysis_id: record.id,
			meeting_type: record.meeting_type,
			issue_type: record.issue_type,
			result,
			completed_at: record.completed_at,
		})
	}

	pub async fn get_analysis_history(
		&self,
		ctx: &RequestContext,
		req: HistoryRequest,
	) -> Result<HistoryResponse> {
		let max = self.cfg.analysis.history_limit.max(1);
		let limit = req.limit.unwrap_or(max).clamp(1, max) as usize;
		let ids = self.history_ids(&ctx.user_id).await?;
		let mut analyses = Vec::with_capacity(limit.min(ids.len()));

		for id in ids {
			if analyses.len() >= limit {
				break;
			}

			let Some(record) = self.load_record(id).await? else {
				continue;
			};

			if record.user_id != ctx.user_id {
				continue;
			}

			analyses.push(summarize(&record));
		}

		Ok(HistoryResponse { analyses })
	}

	pub async fn delete_analysis(
		&self,
		ctx: &RequestContext,
		req: AnalysisIdRequest,
	) -> Result<DeleteAnalysisResponse> {
		let record = self.load_owned(ctx, req.analysis_id).await?;

		self.store
			.set(&keys::analysis_tombstone(record.id), Value::Bool(true), Some(TOMBSTONE_TTL))
			.await?;
		self.store.delete(&keys::analysis(record.id)).await?;
		self.store.delete(&keys::analysis_content(record.id)).await?;

		let mut ids = self.history_ids(&ctx.user_id).await?;

		ids.retain(|id| *id != record.id);

		minutes_storage::set_json(
			self.store.as_ref(),
			&keys::user_analyses(&ctx.user_id),
			&ids,
			None,
		)
		.await?;

		tracing::info!(analysis_id = %record.id, user_id = %ctx.user_id, "Analysis deleted.");

		self.record_audit(
			"analysis.deleted",
			&ctx.user_id,
			Severity::Info,
			serde_json::json!({ "analysis_id": record.id, "status": record.status }),
		)
		.await;

		Ok(DeleteAnalysisResponse { analysis_id: record.id, deleted: true })
	}

	pub(crate) fn validate_content(&self, raw: &str) -> Result<ValidatedContent> {
		let rules = ContentRules::from_config(&self.cfg.analysis);

		minutes_domain::validate_content(raw, rules).map_err(|err| Error::validation(err.message()))
	}

	/// Explicit request values win; otherwise the caller's saved defaults apply.
	pub(crate) async fn resolve_types(
		&self,
		ctx: &RequestContext,
		meeting_type: Option<&str>,
		issue_type: Option<&str>,
	) -> Result<(MeetingType, IssueType)> {
		let meeting_type = meeting_type.map(str::trim).filter(|raw| !raw.is_empty());
		let issue_type = issue_type.map(str::trim).filter(|raw| !raw.is_empty());
		let defaults = match (meeting_type, issue_type) {
			(Some(_), Some(_)) => None,
			_ => Some(self.load_user_config(&ctx.user_id).await?),
		};
		let meeting_type = match meeting_type {
			Some(raw) => raw.parse().map_err(Error::validation)?,
			None => defaults.as_ref().map(|cfg| cfg.default_meeting_type).unwrap_or_default(),
		};
		let issue_type = match issue_type {
			Some(raw) => raw.parse().map_err(Error::validation)?,
			None => defaults.as_ref().map(|cfg| cfg.default_issue_type).unwrap_or_default(),
		};

		Ok((meeting_type, issue_type))
	}

	pub(crate) async fn submit(
		&self,
		ctx: &RequestContext,
		submission: Submission,
	) -> Result<StartAnalysisResponse> {
		let now = OffsetDateTime::now_utc();

		self.consume_user_quota(&ctx.user_id, now).await?;

		let Submission { content, meeting_type, issue_type, source, file_name } = submission;
		let record = AnalysisRecord {
			id: Uuid::new_v4(),
			user_id: ctx.user_id.clone(),
			site_id: ctx.site_id.clone(),
			input_length: content.char_count,
			input_hash: minutes_domain::content_hash(&content.sanitized),
			meeting_type,
			issue_type,
			status: AnalysisStatus::Queued,
			progress: 0,
			created_at: now,
			updated_at: now,
			completed_at: None,
			result: None,
			error: None,
			source,
			file_name,
		};
		let id = record.id;

		self.store
			.set(&keys::analysis_content(id), Value::String(content.sanitized), None)
			.await?;
		self.save_record(&record).await?;
		self.prepend_history(&ctx.user_id, id).await?;

		tracing::info!(
			analysis_id = %id,
			user_id = %ctx.user_id,
			meeting_type = %meeting_type,
			input_length = record.input_length,
			"Analysis queued."
		);

		self.record_audit(
			"analysis.started",
			&ctx.user_id,
			Severity::Info,
			serde_json::json!({
				"analysis_id": id,
				"meeting_type": meeting_type,
				"issue_type": issue_type,
				"source": record.source,
				"input_length": record.input_length,
			}),
		)
		.await;

		if self.cfg.analysis.run_inline {
			self.run_pipeline(id).await;
		} else {
			let service = self.clone();

			tokio::spawn(async move { service.run_pipeline(id).await });
		}

		Ok(StartAnalysisResponse { analysis_id: id, status: AnalysisStatus::Queued })
	}

	/// Drives one analysis to a terminal state. Failures land on the record, not the caller.
	pub(crate) async fn run_pipeline(&self, id: Uuid) {
		let Err(err) = self.process(id).await else {
			return;
		};

		tracing::error!(analysis_id = %id, error = %err, "Analysis failed.");

		if let Err(store_err) = self.mark_failed(id, &err).await {
			tracing::error!(
				analysis_id = %id,
				error = %store_err,
				"Failed to record analysis failure."
			);
		}
	}

	async fn process(&self, id: Uuid) -> Result<()> {
		let Some(mut record) = self.load_record(id).await? else {
			return dropped(id);
		};

		record.advance(AnalysisStatus::Processing, 10, OffsetDateTime::now_utc())?;

		if !self.save_if_live(&record).await? {
			return dropped(id);
		}

		let content = match self.store.get(&keys::analysis_content(id)).await? {
			Some(Value::String(content)) => content,
			_ => {
				if self.is_deleted(id).await? {
					return dropped(id);
				}

				return Err(Error::Internal {
					message: format!("Stored content for analysis {id} is missing."),
				});
			},
		};
		let cache_key = keys::cache_analysis(&self.cache_fingerprint(&record));
		let result = match self.cached_result(&cache_key).await {
			Some(result) => {
				tracing::info!(analysis_id = %id, "Analysis served from cache.");

				result
			},
			None => {
				record.advance(AnalysisStatus::Processing, 50, OffsetDateTime::now_utc())?;

				if !self.save_if_live(&record).await? {
					return dropped(id);
				}

				let result =
					self.call_model(id, &content, record.meeting_type, record.issue_type).await?;

				if self.is_deleted(id).await? {
					return dropped(id);
				}

				self.store_cached_result(&cache_key, &result).await;

				result
			},
		};
		let summary = serde_json::json!({
			"analysis_id": id,
			"action_items": result.action_items.len(),
			"decisions": result.decisions.len(),
			"issues": result.issues.len(),
			"cached": result.cached,
		});

		record.complete(result, OffsetDateTime::now_utc())?;

		if !self.save_if_live(&record).await? {
			return dropped(id);
		}

		tracing::info!(analysis_id = %id, "Analysis completed.");

		self.record_audit("analysis.completed", &record.user_id, Severity::Info, summary).await;

		Ok(())
	}

	async fn call_model(
		&self,
		id: Uuid,
		content: &str,
		meeting_type: MeetingType,
		issue_type: IssueType,
	) -> Result<AnalysisResult> {
		let api_key = self.resolve_api_key(OffsetDateTime::now_utc()).await?;
		let request = AnalysisRequest { content, meeting_type, issue_type };
		let cfg = &self.cfg.providers.ai;
		let output = retry::with_backoff(
			RetryPolicy::from_config(&self.cfg.retry),
			minutes_providers::Error::is_retryable,
			|attempt| {
				tracing::debug!(analysis_id = %id, attempt, "Calling analysis model.");

				self.providers.ai.analyze(cfg, &api_key, &request)
			},
		)
		.await
		.map_err(Error::Ai)?;

		tracing::info!(
			analysis_id = %id,
			model = %output.result.model,
			input_tokens = output.input_tokens,
			output_tokens = output.output_tokens,
			"Analysis model replied."
		);

		Ok(output.result)
	}

	async fn mark_failed(&self, id: Uuid, err: &Error) -> Result<()> {
		let Some(mut record) = self.load_record(id).await? else {
			return Ok(());
		};

		if record.status.is_terminal() {
			return Ok(());
		}

		record.fail(err.public_message(), OffsetDateTime::now_utc())?;

		if !self.save_if_live(&record).await? {
			return dropped(id);
		}

		self.record_audit(
			"analysis.failed",
			&record.user_id,
			Severity::Error,
			serde_json::json!({ "analysis_id": id, "category": err.category() }),
		)
		.await;

		Ok(())
	}

	fn cache_fingerprint(&self, record: &AnalysisRecord) -> String {
		minutes_domain::content_hash(&format!(
			"{}:{}:{}:{}",
			record.input_hash, record.meeting_type, record.issue_type, self.cfg.providers.ai.model
		))
	}

	async fn cached_result(&self, key: &str) -> Option<AnalysisResult> {
		if !self.cfg.cache.enabled {
			return None;
		}

		match minutes_storage::get_json::<AnalysisResult>(self.store.as_ref(), key).await {
			Ok(Some(mut result)) => {
				result.cached = true;

				Some(result)
			},
			Ok(None) => None,
			Err(err) => {
				tracing::warn!(error = %err, "Failed to read analysis cache.");

				None
			},
		}
	}

	async fn store_cached_result(&self, key: &str, result: &AnalysisResult) {
		if !self.cfg.cache.enabled {
			return;
		}

		let ttl = std::time::Duration::from_secs(self.cfg.cache.ttl_secs);

		if let Err(err) =
			minutes_storage::set_json(self.store.as_ref(), key, result, Some(ttl)).await
		{
			tracing::warn!(error = %err, "Failed to write analysis cache.");
		}
	}

	pub(crate) async fn load_record(&self, id: Uuid) -> Result<Option<AnalysisRecord>> {
		Ok(minutes_storage::get_json(self.store.as_ref(), &keys::analysis(id)).await?)
	}

	/// Loads a record the caller owns. Someone else's record is an authorization error.
	pub(crate) async fn load_owned(
		&self,
		ctx: &RequestContext,
		id: Uuid,
	) -> Result<AnalysisRecord> {
		let record = self.load_record(id).await?.ok_or_else(|| not_found(id))?;

		if record.user_id != ctx.user_id {
			tracing::warn!(analysis_id = %id, user_id = %ctx.user_id, "Analysis owner mismatch.");

			return Err(Error::Unauthorized {
				message: "You are not authorized to access this analysis.".to_string(),
			});
		}

		Ok(record)
	}

	async fn save_record(&self, record: &AnalysisRecord) -> Result<()> {
		Ok(minutes_storage::set_json(self.store.as_ref(), &keys::analysis(record.id), record, None)
			.await?)
	}

	/// Pipeline write that never outlives a delete. Returns `false` once the analysis is gone.
	async fn save_if_live(&self, record: &AnalysisRecord) -> Result<bool> {
		if self.is_deleted(record.id).await? {
			return Ok(false);
		}

		self.save_record(record).await?;

		// A delete that landed between the check and the write.
		if self.is_deleted(record.id).await? {
			self.store.delete(&keys::analysis(record.id)).await?;

			return Ok(false);
		}

		Ok(true)
	}

	async fn is_deleted(&self, id: Uuid) -> Result<bool> {
		Ok(self.store.get(&keys::analysis_tombstone(id)).await?.is_some())
	}


	async fn history_ids(&self, user_id: &str) -> Result<Vec<Uuid>> {
		Ok(minutes_storage::get_json(self.store.as_ref(), &keys::user_analyses(user_id))
			.await?
			.unwrap_or_default())
	}

	/// Read-modify-write on one key with no compare-and-set. Two concurrent submissions from the
	/// same user can lose one id; the record itself stays readable by id.
	async fn prepend_history(&self, user_id: &str, id: Uuid) -> Result<()> {
		let mut ids = self.history_ids(user_id).await?;

		ids.retain(|existing| *existing != id);
		ids.insert(0, id);
		ids.truncate(self.cfg.analysis.history_limit.max(1) as usize);

		Ok(minutes_storage::set_json(self.store.as_ref(), &keys::user_analyses(user_id), &ids, None)
			.await?)
	}
}

fn summarize(record: &AnalysisRecord) -> AnalysisSummary {
	let result = record.result.as_ref();

	AnalysisSummary {
		analysis_id: record.id,
		status: record.status,
		progress: record.progress,
		meeting_type: record.meeting_type,
		source: record.source,
		file_name: record.file_name.clone(),
		input_length: record.input_length,
		created_at: record.created_at,
		completed_at: record.completed_at,
		summary: result
			.map(|result| text::truncate_graphemes(&result.summary, SUMMARY_PREVIEW_GRAPHEMES)),
		action_item_count: result.map(|result| result.action_items.len()).unwrap_or_default(),
		issue_count: result.map(|result| result.issues.len()).unwrap_or_default(),
	}
}

fn dropped(id: Uuid) -> Result<()> {
	tracing::info!(analysis_id = %id, "Analysis was deleted while processing; output dropped.");

	Ok(())
}

fn not_found(id: Uuid) -> Error {
	Error::NotFound { message: format!("Analysis {id} was not found.") }
}
