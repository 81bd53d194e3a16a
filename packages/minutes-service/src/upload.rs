use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::Deserialize;

use crate::{
	Error, MinutesService, RequestContext, Result,
	analysis::{StartAnalysisResponse, Submission},
};
use minutes_domain::{FileRules, extract_text, validate_file};
use minutes_storage::models::AnalysisSource;

#[derive(Clone, Debug, Deserialize)]
pub struct UploadFileRequest {
	pub file_name: String,
	/// Plain base64, or a `data:<mime>;base64,` URL as produced by browser file readers.
	pub content_base64: String,
	#[serde(default)]
	pub meeting_type: Option<String>,
	#[serde(default)]
	pub issue_type: Option<String>,
}

impl MinutesService {
	pub async fn upload_file(
		&self,
		ctx: &RequestContext,
		req: UploadFileRequest,
	) -> Result<StartAnalysisResponse> {
		let rules = FileRules::from_config(&self.cfg.upload);
		let file_name = req.file_name.trim().to_string();
		let encoded = strip_data_url(&req.content_base64);
		// Oversized payloads are rejected before decoding.
		let approx_size = (encoded.len() as u64 / 4) * 3;

		if approx_size > rules.max_bytes.saturating_add(3) {
			validate_file(&file_name, approx_size, &rules).map_err(file_error)?;
		}

		let bytes = STANDARD.decode(encoded.as_bytes()).map_err(|_| Error::File {
			message: "File content is not valid base64.".to_string(),
		})?;

		validate_file(&file_name, bytes.len() as u64, &rules).map_err(file_error)?;

		let text = extract_text(&file_name, &bytes).map_err(file_error)?;
		let content = self.validate_content(&text)?;
		let (meeting_type, issue_type) = self
			.resolve_types(ctx, req.meeting_type.as_deref(), req.issue_type.as_deref())
			.await?;

		tracing::info!(
			user_id = %ctx.user_id,
			file_name = %file_name,
			bytes = bytes.len(),
			"File accepted for analysis."
		);

		self.submit(
			ctx,
			Submission {
				content,
				meeting_type,
				issue_type,
				source: AnalysisSource::Upload,
				file_name: Some(file_name),
			},
		)
		.await
	}
}

fn strip_data_url(raw: &str) -> String {
	let trimmed = raw.trim();
	let payload = match trimmed.strip_prefix("data:").and_then(|rest| rest.split_once(";base64,")) {
		Some((_, payload)) => payload,
		None => trimmed,
	};

	payload.chars().filter(|ch| !ch.is_ascii_whitespace()).collect()
}

fn file_error(err: minutes_domain::FileError) -> Error {
	Error::File { message: err.to_string() }
}
