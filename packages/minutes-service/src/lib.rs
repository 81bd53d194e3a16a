pub mod admin;
pub mod analysis;
pub mod audit;
pub mod issues;
pub mod upload;
pub mod user_config;

mod error;
mod rate_limit;

pub use admin::{AdminPermissions, ApiKeysResponse, ManageApiKeysRequest};
pub use analysis::{
	AnalysisIdRequest, AnalysisResultsResponse, AnalysisStatusResponse, AnalysisSummary,
	DeleteAnalysisResponse, HistoryRequest, HistoryResponse, StartAnalysisRequest,
	StartAnalysisResponse,
};
pub use audit::{AuditLogRequest, AuditLogResponse};
pub use error::{Error, Result};
pub use issues::{CreateIssuesRequest, CreateIssuesResponse, IssueInput, IssueOutcome};
pub use minutes_storage::BoxFuture;
pub use upload::UploadFileRequest;
pub use user_config::{NotificationsPatch, UpdateUserConfigRequest};

use std::{sync::Arc, time::Duration};

use minutes_config::{AiProviderConfig, Config, TrackerProviderConfig};
use minutes_providers::{
	ai::{self, AnalysisOutput, AnalysisRequest},
	tracker::{self, CreatedIssue, IssueDraft},
};
use minutes_storage::KvStore;

pub(crate) const HOUR: Duration = Duration::from_secs(3_600);

pub trait AiProvider
where
	Self: Send + Sync,
{
	fn analyze<'a>(
		&'a self,
		cfg: &'a AiProviderConfig,
		api_key: &'a str,
		req: &'a AnalysisRequest<'a>,
	) -> BoxFuture<'a, minutes_providers::Result<AnalysisOutput>>;
}

pub trait TrackerProvider
where
	Self: Send + Sync,
{
	fn create_issue<'a>(
		&'a self,
		cfg: &'a TrackerProviderConfig,
		draft: &'a IssueDraft,
	) -> BoxFuture<'a, minutes_providers::Result<CreatedIssue>>;
}

#[derive(Clone)]
pub struct Providers {
	pub ai: Arc<dyn AiProvider>,
	pub tracker: Arc<dyn TrackerProvider>,
}
impl Providers {
	pub fn new(ai: Arc<dyn AiProvider>, tracker: Arc<dyn TrackerProvider>) -> Self {
		Self { ai, tracker }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { ai: provider.clone(), tracker: provider }
	}
}

/// Caller identity supplied by the hosting platform with every request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestContext {
	pub user_id: String,
	pub site_id: String,
}
impl RequestContext {
	pub fn new(user_id: impl Into<String>, site_id: impl Into<String>) -> Self {
		Self { user_id: user_id.into(), site_id: site_id.into() }
	}
}

#[derive(Clone)]
pub struct MinutesService {
	pub cfg: Arc<Config>,
	pub store: Arc<dyn KvStore>,
	pub providers: Providers,
}
impl MinutesService {
	pub fn new(cfg: Config, store: Arc<dyn KvStore>) -> Self {
		Self::with_providers(cfg, store, Providers::default())
	}

	pub fn with_providers(cfg: Config, store: Arc<dyn KvStore>, providers: Providers) -> Self {
		Self { cfg: Arc::new(cfg), store, providers }
	}

	pub fn is_admin(&self, ctx: &RequestContext) -> bool {
		self.cfg.security.admin_user_ids.iter().any(|id| id == &ctx.user_id)
	}
}

struct DefaultProviders;
impl AiProvider for DefaultProviders {
	fn analyze<'a>(
		&'a self,
		cfg: &'a AiProviderConfig,
		api_key: &'a str,
		req: &'a AnalysisRequest<'a>,
	) -> BoxFuture<'a, minutes_providers::Result<AnalysisOutput>> {
		Box::pin(ai::analyze(cfg, api_key, req))
	}
}
impl TrackerProvider for DefaultProviders {
	fn create_issue<'a>(
		&'a self,
		cfg: &'a TrackerProviderConfig,
		draft: &'a IssueDraft,
	) -> BoxFuture<'a, minutes_providers::Result<CreatedIssue>> {
		Box::pin(tracker::create_issue(cfg, draft))
	}
}
