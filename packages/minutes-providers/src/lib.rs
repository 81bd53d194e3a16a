pub mod ai;
pub mod retry;
pub mod tracker;

mod error;

pub use error::{Error, Result};

use reqwest::header::{HeaderMap, HeaderName};
use serde_json::{Map, Value};

pub(crate) fn extra_headers(default_headers: &Map<String, Value>) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(Error::InvalidConfig {
				message: "Default header values must be strings.".to_string(),
			});
		};

		headers.insert(HeaderName::from_bytes(key.as_bytes())?, raw.parse()?);
	}

	Ok(headers)
}

pub(crate) async fn read_json(provider: &'static str, res: reqwest::Response) -> Result<Value> {
	let status = res.status();
	let body = res.text().await?;

	if !status.is_success() {
		return Err(Error::status(provider, status.as_u16(), &body));
	}

	Ok(serde_json::from_str(&body)?)
}
