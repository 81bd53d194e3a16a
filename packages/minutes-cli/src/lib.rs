use clap::builder::{
	Styles,
	styling::{AnsiColor, Effects},
};
use tracing_subscriber::EnvFilter;

pub const VERSION: &str = concat!(
	env!("CARGO_PKG_VERSION"),
	"-",
	env!("VERGEN_GIT_SHA"),
	"-",
	env!("VERGEN_CARGO_TARGET_TRIPLE"),
);

const FALLBACK_FILTER: &str = "info";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
	Text,
	Json,
}
impl LogFormat {
	pub fn parse(raw: &str) -> Option<Self> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"text" | "pretty" => Some(Self::Text),
			"json" => Some(Self::Json),
			_ => None,
		}
	}
}

pub fn styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Yellow.on_default() | Effects::BOLD)
		.usage(AnsiColor::Yellow.on_default() | Effects::BOLD)
		.literal(AnsiColor::Cyan.on_default() | Effects::BOLD)
		.placeholder(AnsiColor::Green.on_default())
}

/// Builds the filter from a directive string such as `info,minutes_service=debug`, falling back
/// to `info` when the directive does not parse.
pub fn env_filter(directives: &str) -> EnvFilter {
	EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new(FALLBACK_FILTER))
}

pub fn init_tracing(directives: &str, format: LogFormat) {
	let builder = tracing_subscriber::fmt().with_env_filter(env_filter(directives));

	match format {
		LogFormat::Text => builder.init(),
		LogFormat::Json => builder.json().flatten_event(true).init(),
	}
}
