use axum::{
	Json, Router,
	body::Bytes,
	extract::{Path, State},
	http::{HeaderMap, StatusCode, header::AUTHORIZATION},
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::state::AppState;
use minutes_domain::ErrorCategory;
use minutes_service::RequestContext;

pub const HEADER_USER_ID: &str = "x-minutes-user-id";
pub const HEADER_SITE_ID: &str = "x-minutes-site-id";

const DEFAULT_SITE_ID: &str = "default";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RpcMethod {
	StartAnalysis,
	GetAnalysisStatus,
	GetAnalysisResults,
	GetAnalysisHistory,
	DeleteAnalysis,
	UploadFile,
	CreateJiraIssues,
	GetUserConfig,
	UpdateUserConfig,
	CheckAdminPermissions,
	ManageApiKeys,
	GetAuditLog,
}
impl RpcMethod {
	pub const ALL: [Self; 12] = [
		Self::StartAnalysis,
		Self::GetAnalysisStatus,
		Self::GetAnalysisResults,
		Self::GetAnalysisHistory,
		Self::DeleteAnalysis,
		Self::UploadFile,
		Self::CreateJiraIssues,
		Self::GetUserConfig,
		Self::UpdateUserConfig,
		Self::CheckAdminPermissions,
		Self::ManageApiKeys,
		Self::GetAuditLog,
	];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::StartAnalysis => "startAnalysis",
			Self::GetAnalysisStatus => "getAnalysisStatus",
			Self::GetAnalysisResults => "getAnalysisResults",
			Self::GetAnalysisHistory => "getAnalysisHistory",
			Self::DeleteAnalysis => "deleteAnalysis",
			Self::UploadFile => "uploadFile",
			Self::CreateJiraIssues => "createJiraIssues",
			Self::GetUserConfig => "getUserConfig",
			Self::UpdateUserConfig => "updateUserConfig",
			Self::CheckAdminPermissions => "checkAdminPermissions",
			Self::ManageApiKeys => "manageAPIKeys",
			Self::GetAuditLog => "getAuditLog",
		}
	}

	/// Method names are matched exactly.
	pub fn parse(raw: &str) -> Option<Self> {
		Self::ALL.into_iter().find(|method| method.as_str() == raw)
	}
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/rpc/{method}", post(rpc))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn rpc(
	State(state): State<AppState>,
	Path(method): Path<String>,
	headers: HeaderMap,
	body: Bytes,
) -> Response {
	match dispatch(&state, &method, &headers, &body).await {
		Ok(data) => (StatusCode::OK, Json(SuccessBody { success: true, data })).into_response(),
		Err(err) => {
			tracing::warn!(
				method = %method,
				code = err.code,
				status = err.status.as_u16(),
				"RPC call failed."
			);

			err.into_response()
		},
	}
}

async fn dispatch(
	state: &AppState,
	method: &str,
	headers: &HeaderMap,
	body: &[u8],
) -> Result<Value, ApiError> {
	authorize(state, headers)?;

	let method = RpcMethod::parse(method).ok_or_else(|| ApiError::unknown_method(method))?;
	let ctx = request_context(headers)?;
	let payload = read_payload(body)?;
	let service = &state.service;

	tracing::info!(
		method = method.as_str(),
		user_id = %ctx.user_id,
		site_id = %ctx.site_id,
		"RPC call."
	);

	match method {
		RpcMethod::StartAnalysis => respond(service.start_analysis(&ctx, decode(payload)?).await),
		RpcMethod::GetAnalysisStatus =>
			respond(service.get_analysis_status(&ctx, decode(payload)?).await),
		RpcMethod::GetAnalysisResults =>
			respond(service.get_analysis_results(&ctx, decode(payload)?).await),
		RpcMethod::GetAnalysisHistory =>
			respond(service.get_analysis_history(&ctx, decode(payload)?).await),
		RpcMethod::DeleteAnalysis => respond(service.delete_analysis(&ctx, decode(payload)?).await),
		RpcMethod::UploadFile => respond(service.upload_file(&ctx, decode(payload)?).await),
		RpcMethod::CreateJiraIssues =>
			respond(service.create_jira_issues(&ctx, decode(payload)?).await),
		RpcMethod::GetUserConfig => respond(service.get_user_config(&ctx).await),
		RpcMethod::UpdateUserConfig =>
			respond(service.update_user_config(&ctx, decode(payload)?).await),
		RpcMethod::CheckAdminPermissions => respond(service.check_admin_permissions(&ctx).await),
		RpcMethod::ManageApiKeys => respond(service.manage_api_keys(&ctx, decode(payload)?).await),
		RpcMethod::GetAuditLog => respond(service.get_audit_log(&ctx, decode(payload)?).await),
	}
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
	let Some(expected) = state
		.service
		.cfg
		.security
		.api_auth_token
		.as_deref()
		.map(str::trim)
		.filter(|token| !token.is_empty())
	else {
		return Ok(());
	};

	if read_bearer_token(headers).is_some_and(|token| token == expected) {
		Ok(())
	} else {
		Err(ApiError::from_category(ErrorCategory::Auth))
	}
}

fn read_bearer_token(headers: &HeaderMap) -> Option<&str> {
	let raw = headers.get(AUTHORIZATION)?;
	let value = raw.to_str().ok()?.trim();
	let token = value.strip_prefix("Bearer ")?.trim();

	if token.is_empty() { None } else { Some(token) }
}

fn request_context(headers: &HeaderMap) -> Result<RequestContext, ApiError> {
	let user_id = read_header(headers, HEADER_USER_ID).ok_or_else(|| {
		ApiError::validation("The X-Minutes-User-Id header is required.".to_string())
	})?;
	let site_id = read_header(headers, HEADER_SITE_ID).unwrap_or(DEFAULT_SITE_ID);

	Ok(RequestContext::new(user_id, site_id))
}

fn read_header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
	let value = headers.get(name)?.to_str().ok()?.trim();

	if value.is_empty() { None } else { Some(value) }
}

fn read_payload(body: &[u8]) -> Result<Value, ApiError> {
	if body.iter().all(u8::is_ascii_whitespace) {
		return Ok(Value::Object(Default::default()));
	}

	serde_json::from_slice(body)
		.map_err(|err| ApiError::validation(format!("Request body is not valid JSON: {err}.")))
}

fn decode<T>(payload: Value) -> Result<T, ApiError>
where
	T: DeserializeOwned,
{
	serde_json::from_value(payload)
		.map_err(|err| ApiError::validation(format!("Invalid request payload: {err}.")))
}

fn respond<T>(result: minutes_service::Result<T>) -> Result<Value, ApiError>
where
	T: Serialize,
{
	let data = result?;

	serde_json::to_value(data).map_err(|err| {
		tracing::error!(error = %err, "Failed to serialize RPC response.");

		ApiError::from_category(ErrorCategory::Unknown)
	})
}

#[derive(Debug, Serialize)]
struct SuccessBody {
	success: bool,
	data: Value,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	success: bool,
	error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
	code: &'static str,
	message: String,
	category: ErrorCategory,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	code: &'static str,
	message: String,
	category: ErrorCategory,
}
impl ApiError {
	fn new(
		category: ErrorCategory,
		status: StatusCode,
		code: &'static str,
		message: String,
	) -> Self {
		Self { status, code, message, category }
	}

	fn from_category(category: ErrorCategory) -> Self {
		Self::new(
			category,
			status_of(category),
			category.code(),
			category.user_message().to_string(),
		)
	}

	fn validation(message: String) -> Self {
		let category = ErrorCategory::Validation;

		Self::new(category, status_of(category), category.code(), message)
	}

	fn unknown_method(method: &str) -> Self {
		Self::new(
			ErrorCategory::Validation,
			StatusCode::NOT_FOUND,
			"UNKNOWN_METHOD",
			format!("Unknown method: {method}."),
		)
	}
}
impl From<minutes_service::Error> for ApiError {
	fn from(err: minutes_service::Error) -> Self {
		let category = err.category();

		if status_of(category).is_server_error() {
			tracing::error!(error = %err, category = ?category, "RPC call failed in the service.");
		}

		Self::new(category, status_of(category), category.code(), err.public_message())
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody {
			success: false,
			error: ErrorDetail { code: self.code, message: self.message, category: self.category },
		};

		(self.status, Json(body)).into_response()
	}
}

fn status_of(category: ErrorCategory) -> StatusCode {
	StatusCode::from_u16(category.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}
