use minutes_domain::AnalysisStatus;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
	#[error("Stored value could not be decoded: {0}")]
	SerdeJson(#[from] serde_json::Error),
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error("Invalid status transition from {from} to {to}.")]
	InvalidTransition { from: AnalysisStatus, to: AnalysisStatus },
}
