use std::{
	sync::{
		Arc, Mutex,
		atomic::{AtomicU32, Ordering},
	},
	time::Duration,
};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use tokio::sync::Notify;

use minutes_config::{AiProviderConfig, Config, TrackerProviderConfig};
use minutes_domain::{AnalysisResult, AnalysisStatus, ErrorCategory, MeetingType};
use minutes_providers::{
	ai::{AnalysisOutput, AnalysisRequest},
	tracker::{CreatedIssue, IssueDraft},
};
use minutes_service::{
	AiProvider, AnalysisIdRequest, AnalysisStatusResponse, AuditLogRequest, BoxFuture,
	CreateIssuesRequest, Error, HistoryRequest, IssueInput, IssueOutcome, ManageApiKeysRequest,
	MinutesService, Providers, RequestContext, StartAnalysisRequest, TrackerProvider,
	UpdateUserConfigRequest, UploadFileRequest,
};
use minutes_storage::{KvStore, MemoryKvStore, keys};

const CONFIG: &str = r#"
[service]
http_bind = "127.0.0.1:0"

[storage]
backend = "memory"

[providers.ai]
api_key = "config-key-00000000000000"
model   = "claude-test"

[providers.tracker]
api_base  = "https://tracker.example.test"
email     = "bot@example.test"
api_token = "token"

[analysis]
run_inline = true

[retry]
max_attempts  = 2
base_delay_ms = 1

[security]
admin_user_ids = ["admin-1"]
"#;

const NOTES: &str = "Alice will send the launch checklist by Friday. The team agreed to ship v2.";

#[derive(Default)]
struct SpyAi {
	calls: AtomicU32,
	keys: Mutex<Vec<String>>,
	gate: Option<Arc<Notify>>,
	fail: bool,
}
impl AiProvider for SpyAi {
	fn analyze<'a>(
		&'a self,
		_cfg: &'a AiProviderConfig,
		api_key: &'a str,
		req: &'a AnalysisRequest<'a>,
	) -> BoxFuture<'a, minutes_providers::Result<AnalysisOutput>> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);
			self.keys.lock().unwrap_or_else(|err| err.into_inner()).push(api_key.to_string());

			if let Some(gate) = &self.gate {
				gate.notified().await;
			}
			if self.fail {
				return Err(minutes_providers::Error::InvalidResponse {
					message: "Claude response contained no summary or items.".to_string(),
				});
			}

			Ok(AnalysisOutput {
				result: AnalysisResult {
					summary: format!(
						"{} meeting with {} chars.",
						req.meeting_type,
						req.content.len()
					),
					model: "claude-test".to_string(),
					..AnalysisResult::default()
				},
				input_tokens: Some(10),
				output_tokens: Some(5),
			})
		})
	}
}

#[derive(Default)]
struct SpyTracker {
	drafts: Mutex<Vec<IssueDraft>>,
}
impl TrackerProvider for SpyTracker {
	fn create_issue<'a>(
		&'a self,
		_cfg: &'a TrackerProviderConfig,
		draft: &'a IssueDraft,
	) -> BoxFuture<'a, minutes_providers::Result<CreatedIssue>> {
		Box::pin(async move {
			let mut drafts = self.drafts.lock().unwrap_or_else(|err| err.into_inner());

			drafts.push(draft.clone());

			if draft.summary.contains("reject") {
				return Err(minutes_providers::Error::InvalidResponse {
					message: "Jira response is missing the issue key.".to_string(),
				});
			}

			let key = format!("{}-{}", draft.project_key, drafts.len());

			Ok(CreatedIssue {
				id: drafts.len().to_string(),
				url: format!("https://tracker.example.test/browse/{key}"),
				key,
			})
		})
	}
}

struct Harness {
	service: MinutesService,
	store: Arc<MemoryKvStore>,
	ai: Arc<SpyAi>,
	tracker: Arc<SpyTracker>,
}

fn config_with<F>(edit: F) -> Config
where
	F: FnOnce(&mut Config),
{
	let mut cfg: Config = toml::from_str(CONFIG).expect("Failed to parse test config.");

	edit(&mut cfg);

	cfg
}

fn harness_with(cfg: Config, ai: SpyAi) -> Harness {
	let store = Arc::new(MemoryKvStore::new());
	let ai = Arc::new(ai);
	let tracker = Arc::new(SpyTracker::default());
	let providers = Providers::new(ai.clone(), tracker.clone());
	let service = MinutesService::with_providers(cfg, store.clone(), providers);

	Harness { service, store, ai, tracker }
}

fn harness() -> Harness {
	harness_with(config_with(|_| {}), SpyAi::default())
}

fn user(id: &str) -> RequestContext {
	RequestContext::new(id, "default")
}

fn start(content: &str) -> StartAnalysisRequest {
	StartAnalysisRequest { content: content.to_string(), meeting_type: None, issue_type: None }
}

fn by_id(id: uuid::Uuid) -> AnalysisIdRequest {
	AnalysisIdRequest { analysis_id: id }
}

#[tokio::test]
async fn short_content_is_rejected_without_a_record() {
	let h = harness();
	let err = h.service.start_analysis(&user("u-1"), start("too short")).await.unwrap_err();

	assert!(matches!(err, Error::Validation { .. }));
	assert_eq!(err.to_string(), "Content too short");
	assert!(h.store.list_prefix("analysis:", 10).await.unwrap().is_empty());
	assert_eq!(h.ai.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn background_pipeline_moves_through_processing_to_completed() {
	let gate = Arc::new(Notify::new());
	let cfg = config_with(|cfg| cfg.analysis.run_inline = false);
	let h = harness_with(cfg, SpyAi { gate: Some(gate.clone()), ..SpyAi::default() });
	let ctx = user("u-1");
	let started = h.service.start_analysis(&ctx, start(NOTES)).await.unwrap();

	assert_eq!(started.status, AnalysisStatus::Queued);

	let processing = wait_until(&h.service, &ctx, started.analysis_id, |status| {
		status.status == AnalysisStatus::Processing && status.progress == 50
	})
	.await;

	assert!(processing.completed_at.is_none());

	gate.notify_one();

	let completed =
		wait_for(&h.service, &ctx, started.analysis_id, AnalysisStatus::Completed).await;

	assert_eq!(completed.progress, 100);
	assert!(completed.completed_at.is_some());

	let results = h.service.get_analysis_results(&ctx, by_id(started.analysis_id)).await.unwrap();

	assert!(!results.result.summary.is_empty());
	assert!(!results.result.cached);
}

#[tokio::test]
async fn deleting_a_running_analysis_discards_its_output() {
	let gate = Arc::new(Notify::new());
	let cfg = config_with(|cfg| cfg.analysis.run_inline = false);
	let h = harness_with(cfg, SpyAi { gate: Some(gate.clone()), ..SpyAi::default() });
	let ctx = user("u-1");
	let started = h.service.start_analysis(&ctx, start(NOTES)).await.unwrap();
	let id = started.analysis_id;

	wait_until(&h.service, &ctx, id, |status| status.progress == 50).await;

	let deleted = h.service.delete_analysis(&ctx, by_id(id)).await.unwrap();

	assert!(deleted.deleted);

	gate.notify_one();

	tokio::time::sleep(Duration::from_millis(200)).await;

	assert_eq!(h.ai.calls.load(Ordering::SeqCst), 1);
	assert!(matches!(
		h.service.get_analysis_status(&ctx, by_id(id)).await,
		Err(Error::NotFound { .. })
	));
	assert!(h.store.get(&keys::analysis(id)).await.unwrap().is_none());
	assert!(h.store.list_prefix("cache:analysis:", 10).await.unwrap().is_empty());

	let history =
		h.service.get_analysis_history(&ctx, HistoryRequest { limit: Some(10) }).await.unwrap();

	assert!(history.analyses.is_empty());

	let audit =
		h.service.get_audit_log(&user("admin-1"), AuditLogRequest::default()).await.unwrap();

	assert!(audit.entries.iter().all(|entry| entry.event_type != "analysis.completed"));
}

#[tokio::test]
async fn results_require_completion_and_ownership() {
	let gate = Arc::new(Notify::new());
	let cfg = config_with(|cfg| cfg.analysis.run_inline = false);
	let h = harness_with(cfg, SpyAi { gate: Some(gate.clone()), ..SpyAi::default() });
	let owner = user("u-1");
	let started = h.service.start_analysis(&owner, start(NOTES)).await.unwrap();
	let id = started.analysis_id;

	let err = h.service.get_analysis_results(&owner, by_id(id)).await.unwrap_err();

	assert_eq!(err.category(), ErrorCategory::Validation);

	let stranger = user("u-2");
	let err = h.service.get_analysis_status(&stranger, by_id(id)).await.unwrap_err();

	assert!(matches!(err, Error::Unauthorized { .. }));
	assert_eq!(err.category().status_code(), 403);

	gate.notify_one();
	wait_for(&h.service, &owner, id, AnalysisStatus::Completed).await;

	assert!(matches!(
		h.service.get_analysis_results(&stranger, by_id(id)).await,
		Err(Error::Unauthorized { .. })
	));
	assert!(matches!(
		h.service.delete_analysis(&stranger, by_id(id)).await,
		Err(Error::Unauthorized { .. })
	));
}

#[tokio::test]
async fn identical_content_is_served_from_cache() {
	let h = harness();
	let ctx = user("u-1");
	let first = h.service.start_analysis(&ctx, start(NOTES)).await.unwrap();
	let second = h.service.start_analysis(&ctx, start(NOTES)).await.unwrap();
	let first = h.service.get_analysis_results(&ctx, by_id(first.analysis_id)).await.unwrap();
	let second = h.service.get_analysis_results(&ctx, by_id(second.analysis_id)).await.unwrap();

	assert_eq!(h.ai.calls.load(Ordering::SeqCst), 1);
	assert!(!first.result.cached);
	assert!(second.result.cached);
	assert_eq!(first.result.summary, second.result.summary);
}

#[tokio::test]
async fn model_failures_end_in_a_terminal_error() {
	let h = harness_with(config_with(|_| {}), SpyAi { fail: true, ..SpyAi::default() });
	let ctx = user("u-1");
	let started = h.service.start_analysis(&ctx, start(NOTES)).await.unwrap();
	let status = h.service.get_analysis_status(&ctx, by_id(started.analysis_id)).await.unwrap();

	assert_eq!(status.status, AnalysisStatus::Error);
	assert_eq!(status.error.as_deref(), Some(ErrorCategory::AiService.user_message()));
	assert!(status.completed_at.is_some());
	// Not retryable, so a single attempt.
	assert_eq!(h.ai.calls.load(Ordering::SeqCst), 1);
	assert!(h.service.get_analysis_results(&ctx, by_id(started.analysis_id)).await.is_err());
}

#[tokio::test]
async fn hourly_rate_limit_applies_per_user() {
	let h = harness_with(config_with(|cfg| cfg.rate_limit.analyses_per_hour = 2), SpyAi::default());
	let ctx = user("u-1");

	h.service.start_analysis(&ctx, start(NOTES)).await.unwrap();
	h.service.start_analysis(&ctx, start(NOTES)).await.unwrap();

	let err = h.service.start_analysis(&ctx, start(NOTES)).await.unwrap_err();

	assert_eq!(err.category(), ErrorCategory::RateLimit);
	assert!(h.service.start_analysis(&user("u-2"), start(NOTES)).await.is_ok());
}

#[tokio::test]
async fn history_is_newest_first_and_delete_removes_entries() {
	let h = harness();
	let ctx = user("u-1");
	let older = h.service.start_analysis(&ctx, start(NOTES)).await.unwrap();
	let newer = h
		.service
		.start_analysis(&ctx, start("A different set of notes for the retro."))
		.await
		.unwrap();
	let history = h.service.get_analysis_history(&ctx, HistoryRequest::default()).await.unwrap();
	let ids = history.analyses.iter().map(|item| item.analysis_id).collect::<Vec<_>>();

	assert_eq!(ids, vec![newer.analysis_id, older.analysis_id]);
	assert!(history.analyses[0].summary.is_some());

	h.service.delete_analysis(&ctx, by_id(newer.analysis_id)).await.unwrap();

	let history =
		h.service.get_analysis_history(&ctx, HistoryRequest { limit: Some(10) }).await.unwrap();

	assert_eq!(history.analyses.len(), 1);
	assert!(h.store.get(&keys::analysis_content(newer.analysis_id)).await.unwrap().is_none());
	assert!(matches!(
		h.service.get_analysis_status(&ctx, by_id(newer.analysis_id)).await,
		Err(Error::NotFound { .. })
	));
}

#[tokio::test]
async fn uploads_flatten_transcripts_before_analysis() {
	let h = harness();
	let ctx = user("u-1");
	let vtt = "WEBVTT\n\n1\n00:00:01.000 --> 00:00:04.000\n<v Alice>We ship the beta on Friday.\n";
	let started = h
		.service
		.upload_file(
			&ctx,
			UploadFileRequest {
				file_name: "standup.vtt".to_string(),
				content_base64: STANDARD.encode(vtt),
				meeting_type: Some("standup".to_string()),
				issue_type: None,
			},
		)
		.await
		.unwrap();
	let status = h.service.get_analysis_status(&ctx, by_id(started.analysis_id)).await.unwrap();
	let content = h.store.get(&keys::analysis_content(started.analysis_id)).await.unwrap();

	assert_eq!(status.status, AnalysisStatus::Completed);
	assert_eq!(status.meeting_type, MeetingType::Standup);
	assert_eq!(status.file_name.as_deref(), Some("standup.vtt"));
	assert_eq!(content, Some(serde_json::Value::from("Alice: We ship the beta on Friday.")));
}

#[tokio::test]
async fn uploads_reject_unsupported_and_undecodable_files() {
	let h = harness();
	let ctx = user("u-1");
	let upload = |name: &str, body: &str| UploadFileRequest {
		file_name: name.to_string(),
		content_base64: body.to_string(),
		meeting_type: None,
		issue_type: None,
	};
	let err =
		h.service.upload_file(&ctx, upload("deck.pdf", &STANDARD.encode("x"))).await.unwrap_err();

	assert_eq!(err.category(), ErrorCategory::File);

	let err = h.service.upload_file(&ctx, upload("notes.txt", "***")).await.unwrap_err();

	assert_eq!(err.to_string(), "File content is not valid base64.");
}

#[tokio::test]
async fn empty_issue_batches_never_reach_the_tracker() {
	let h = harness();
	let req = CreateIssuesRequest {
		project_key: "OPS".to_string(),
		issues: Vec::new(),
		analysis_id: None,
	};
	let err = h.service.create_jira_issues(&user("u-1"), req).await.unwrap_err();

	assert_eq!(err.category(), ErrorCategory::Validation);
	assert!(h.tracker.drafts.lock().unwrap().is_empty());

	let req = CreateIssuesRequest {
		project_key: "ops".to_string(),
		issues: vec![IssueInput { summary: "Ship it".to_string(), ..IssueInput::default() }],
		analysis_id: None,
	};

	assert!(h.service.create_jira_issues(&user("u-1"), req).await.is_err());
	assert!(h.tracker.drafts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn issue_batches_report_per_issue_outcomes() {
	let h = harness();
	let req = CreateIssuesRequest {
		project_key: " OPS ".to_string(),
		issues: vec![
			IssueInput {
				summary: "Send the launch checklist".to_string(),
				issue_type: Some("story".to_string()),
				priority: Some("urgent".to_string()),
				labels: vec!["launch".to_string(), "meeting-notes".to_string()],
				..IssueInput::default()
			},
			IssueInput { summary: "Please reject this one".to_string(), ..IssueInput::default() },
		],
		analysis_id: None,
	};
	let res = h.service.create_jira_issues(&user("u-1"), req).await.unwrap();

	assert_eq!((res.created, res.failed), (1, 1));
	assert!(matches!(&res.results[0], IssueOutcome::Created { key, .. } if key == "OPS-1"));
	assert!(matches!(&res.results[1], IssueOutcome::Failed { index: 1, .. }));

	let drafts = h.tracker.drafts.lock().unwrap();

	assert_eq!(drafts[0].labels, vec!["meeting-notes".to_string(), "launch".to_string()]);
	assert_eq!(drafts[0].priority, Some(minutes_domain::Priority::Highest));
}

#[tokio::test]
async fn user_config_defaults_feed_new_analyses() {
	let h = harness();
	let ctx = user("u-1");
	let defaults = h.service.get_user_config(&ctx).await.unwrap();

	assert_eq!(defaults.default_meeting_type, MeetingType::General);
	assert!(defaults.notifications.on_complete);

	let updated = h
		.service
		.update_user_config(
			&ctx,
			UpdateUserConfigRequest {
				default_meeting_type: Some("retro".to_string()),
				default_project_key: Some("OPS".to_string()),
				..UpdateUserConfigRequest::default()
			},
		)
		.await
		.unwrap();

	assert_eq!(updated.default_meeting_type, MeetingType::Retrospective);
	assert_eq!(updated.default_project_key.as_deref(), Some("OPS"));
	assert!(updated.updated_at.is_some());

	let started = h.service.start_analysis(&ctx, start(NOTES)).await.unwrap();
	let status = h.service.get_analysis_status(&ctx, by_id(started.analysis_id)).await.unwrap();

	assert_eq!(status.meeting_type, MeetingType::Retrospective);

	let err = h
		.service
		.update_user_config(
			&ctx,
			UpdateUserConfigRequest {
				default_issue_type: Some("saga".to_string()),
				..Default::default()
			},
		)
		.await
		.unwrap_err();

	assert_eq!(err.category(), ErrorCategory::Validation);
}

#[tokio::test]
async fn stored_active_key_is_preferred_and_metered() {
	let h = harness();
	let admin = user("admin-1");

	assert!(h.service.check_admin_permissions(&admin).await.unwrap().is_admin);
	assert!(!h.service.check_admin_permissions(&user("u-1")).await.unwrap().is_admin);
	assert!(matches!(
		h.service.manage_api_keys(&user("u-1"), ManageApiKeysRequest::List).await,
		Err(Error::Unauthorized { .. })
	));

	let created = h
		.service
		.manage_api_keys(
			&admin,
			ManageApiKeysRequest::Create {
				name: "primary".to_string(),
				key: "sk-stored-key-0000000000001234".to_string(),
				rate_limit: Some(1),
			},
		)
		.await
		.unwrap();
	let meta = created.key.clone().expect("create returns metadata");

	assert!(meta.active);
	assert_eq!(meta.key_hint, "1234");
	assert_eq!(created.active_key_id, Some(meta.id));

	let ctx = user("u-1");

	h.service.start_analysis(&ctx, start(NOTES)).await.unwrap();

	let second = h
		.service
		.start_analysis(&ctx, start("Completely different notes about hiring plans."))
		.await
		.unwrap();
	let status = h.service.get_analysis_status(&ctx, by_id(second.analysis_id)).await.unwrap();

	assert_eq!(h.ai.keys.lock().unwrap().as_slice(), ["sk-stored-key-0000000000001234"]);
	assert_eq!(status.status, AnalysisStatus::Error);
	assert_eq!(
		status.error.as_deref(),
		Some("API key rate limit exceeded: at most 1 requests per hour.")
	);

	let listed = h.service.manage_api_keys(&admin, ManageApiKeysRequest::List).await.unwrap();
	let stored = listed.keys.expect("list returns keys");

	assert_eq!(stored.len(), 1);
	assert_eq!(stored[0].usage_count, 1);
	assert!(stored[0].last_used_at.is_some());

	h.service.manage_api_keys(&admin, ManageApiKeysRequest::Delete { id: meta.id }).await.unwrap();

	let listed = h.service.manage_api_keys(&admin, ManageApiKeysRequest::List).await.unwrap();

	assert_eq!(listed.active_key_id, None);
	assert!(h.store.get(&keys::api_key_secret(meta.id)).await.unwrap().is_none());
}

#[tokio::test]
async fn missing_keys_fail_the_analysis_with_an_auth_error() {
	let cfg = config_with(|cfg| cfg.providers.ai.api_key = String::new());
	let h = harness_with(cfg, SpyAi::default());
	let ctx = user("u-1");
	let started = h.service.start_analysis(&ctx, start(NOTES)).await.unwrap();
	let status = h.service.get_analysis_status(&ctx, by_id(started.analysis_id)).await.unwrap();

	assert_eq!(status.status, AnalysisStatus::Error);
	assert_eq!(status.error.as_deref(), Some(ErrorCategory::Auth.user_message()));
	assert_eq!(h.ai.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn audit_log_is_admin_only_and_filterable() {
	let h = harness();
	let ctx = user("u-1");
	let admin = user("admin-1");

	h.service.start_analysis(&ctx, start(NOTES)).await.unwrap();

	assert!(h.service.get_audit_log(&ctx, AuditLogRequest::default()).await.is_err());

	let all = h.service.get_audit_log(&admin, AuditLogRequest::default()).await.unwrap();
	let types = all.entries.iter().map(|entry| entry.event_type.as_str()).collect::<Vec<_>>();

	assert!(types.contains(&"analysis.started"));
	assert!(types.contains(&"analysis.completed"));
	assert!(types.contains(&"security.admin_denied"));

	let started_only = h
		.service
		.get_audit_log(
			&admin,
			AuditLogRequest {
				event_type: Some("analysis.started".to_string()),
				..Default::default()
			},
		)
		.await
		.unwrap();

	assert_eq!(started_only.entries.len(), 1);
	assert_eq!(started_only.entries[0].actor, "u-1");

	let err = h
		.service
		.get_audit_log(
			&admin,
			AuditLogRequest {
				start_date: Some("2026-01-01".to_string()),
				end_date: Some("2026-03-01".to_string()),
				..Default::default()
			},
		)
		.await
		.unwrap_err();

	assert_eq!(err.category(), ErrorCategory::Validation);
}

async fn wait_for(
	service: &MinutesService,
	ctx: &RequestContext,
	id: uuid::Uuid,
	status: AnalysisStatus,
) -> AnalysisStatusResponse {
	wait_until(service, ctx, id, |current| current.status == status).await
}

async fn wait_until<F>(
	service: &MinutesService,
	ctx: &RequestContext,
	id: uuid::Uuid,
	ready: F,
) -> AnalysisStatusResponse
where
	F: Fn(&AnalysisStatusResponse) -> bool,
{
	for _ in 0..400 {
		let current = service.get_analysis_status(ctx, by_id(id)).await.unwrap();

		if ready(&current) {
			return current;
		}

		tokio::time::sleep(Duration::from_millis(5)).await;
	}

	panic!("Analysis {id} never reached the expected state.");
}
