use minutes_domain::{ErrorCategory, classify_message};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("{message}")]
	Validation { message: String },
	#[error("{message}")]
	Unauthorized { message: String },
	#[error("{message}")]
	NotFound { message: String },
	#[error("{message}")]
	RateLimited { message: String },
	#[error(transparent)]
	Ai(minutes_providers::Error),
	#[error(transparent)]
	Tracker(minutes_providers::Error),
	#[error("{message}")]
	File { message: String },
	#[error(transparent)]
	Storage(#[from] minutes_storage::Error),
	#[error("{message}")]
	Timeout { message: String },
	#[error("{message}")]
	Security { message: String },
	#[error("{message}")]
	Internal { message: String },
}
impl Error {
	pub fn validation(message: impl Into<String>) -> Self {
		Self::Validation { message: message.into() }
	}

	pub fn category(&self) -> ErrorCategory {
		match self {
			Self::Validation { .. } | Self::NotFound { .. } => ErrorCategory::Validation,
			Self::Unauthorized { .. } => ErrorCategory::Auth,
			Self::RateLimited { .. } => ErrorCategory::RateLimit,
			Self::Ai(err) | Self::Tracker(err) if err.is_timeout() => ErrorCategory::Timeout,
			Self::Ai(err) | Self::Tracker(err) if err.http_status() == Some(429) =>
				ErrorCategory::RateLimit,
			Self::Ai(_) => ErrorCategory::AiService,
			Self::Tracker(_) => ErrorCategory::TrackerService,
			Self::File { .. } => ErrorCategory::File,
			Self::Storage(_) => ErrorCategory::Storage,
			Self::Timeout { .. } => ErrorCategory::Timeout,
			Self::Security { .. } => ErrorCategory::Security,
			Self::Internal { message } => classify_message(message),
		}
	}

	/// Text safe to show the caller: the raw message for request-shaped errors, otherwise the
	/// category's generic message.
	pub fn public_message(&self) -> String {
		let category = self.category();

		match self {
			Self::Ai(_) | Self::Tracker(_) | Self::Storage(_) | Self::Internal { .. } =>
				category.user_message().to_string(),
			_ if category.exposes_detail() => self.to_string(),
			_ => category.user_message().to_string(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn typed_variants_map_directly() {
		assert_eq!(Error::validation("Content too short").category(), ErrorCategory::Validation);
		assert_eq!(
			Error::Unauthorized { message: "nope".to_string() }.category().status_code(),
			403
		);
		assert_eq!(
			Error::RateLimited { message: "slow down".to_string() }.category().status_code(),
			429
		);
	}

	#[test]
	fn opaque_messages_are_classified() {
		let err = Error::Internal { message: "database connection reset".to_string() };

		assert_eq!(err.category(), ErrorCategory::Storage);
		assert_eq!(err.public_message(), ErrorCategory::Storage.user_message());
	}

	#[test]
	fn validation_text_passes_through() {
		assert_eq!(Error::validation("Content too short").public_message(), "Content too short");
	}
}
