//! Logging setup driven by environment variables.
//!
//! - `LOG_MODE`: `stdout` (default) or `file`
//! - `LOG_LEVEL`: `trace`, `debug`, `info` (default), `warn` or `error`
//! - `LOG_DATA_DIR`: directory for log files, `logs/` by default
//! - `LOG_MAX_SIZE`: size in bytes after which a new file is started, 1GB by default
//! - `IN_DOCKER`: when `true` the log directory is always `logs/`

pub mod error;

use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;
use std::{env, fs, path::Path};
use tracing::{info, Subscriber};
use tracing_subscriber::{
	filter::EnvFilter,
	fmt::{
		self,
		format::{Compact, Format, Writer},
		FmtContext, FormatEvent, FormatFields,
	},
	prelude::*,
	registry::LookupSpan,
};

const DEFAULT_LOG_MAX_SIZE: u64 = 1_073_741_824;
const LOG_FILE_NAME: &str = "confirmation-monitor.log";

lazy_static! {
	static ref ANSI_ESCAPE: Regex = Regex::new(r"\x1b\[[0-9;]*[a-zA-Z]").unwrap();
}

/// Logging settings resolved from the environment
#[derive(Debug, Clone, PartialEq)]
pub struct LogSettings {
	pub to_file: bool,
	pub level: tracing::Level,
	pub directory: String,
	pub max_size: u64,
}

impl LogSettings {
	/// Reads the settings from the process environment
	pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
		let mode = env::var("LOG_MODE").unwrap_or_else(|_| "stdout".to_string());
		let level = match env::var("LOG_LEVEL")
			.unwrap_or_else(|_| "info".to_string())
			.to_lowercase()
			.as_str()
		{
			"trace" => tracing::Level::TRACE,
			"debug" => tracing::Level::DEBUG,
			"warn" => tracing::Level::WARN,
			"error" => tracing::Level::ERROR,
			_ => tracing::Level::INFO,
		};

		let in_docker = env::var("IN_DOCKER").map(|v| v == "true").unwrap_or(false);
		let directory = if in_docker {
			"logs/".to_string()
		} else {
			env::var("LOG_DATA_DIR").unwrap_or_else(|_| "logs/".to_string())
		};

		let max_size = match env::var("LOG_MAX_SIZE") {
			Ok(raw) => raw
				.parse::<u64>()
				.map_err(|e| format!("LOG_MAX_SIZE must be a valid u64 if set: {}", e))?,
			Err(_) => DEFAULT_LOG_MAX_SIZE,
		};

		Ok(Self {
			to_file: mode.eq_ignore_ascii_case("file"),
			level,
			directory: format!("{}/", directory.trim_end_matches('/')),
			max_size,
		})
	}
}

/// Event formatter that removes colour codes before writing to a file
struct PlainFormatter<T> {
	inner: T,
}

impl<S, N, T> FormatEvent<S, N> for PlainFormatter<T>
where
	S: Subscriber + for<'a> LookupSpan<'a>,
	N: for<'a> FormatFields<'a> + 'static,
	T: FormatEvent<S, N>,
{
	fn format_event(
		&self,
		ctx: &FmtContext<'_, S, N>,
		mut writer: Writer<'_>,
		event: &tracing::Event<'_>,
	) -> std::fmt::Result {
		let mut buf = String::new();
		self.inner.format_event(ctx, Writer::new(&mut buf), event)?;
		write!(writer, "{}", strip_ansi_escapes(&buf))
	}
}

fn strip_ansi_escapes(s: &str) -> String {
	ANSI_ESCAPE.replace_all(s, "").to_string()
}

/// Builds `<base>-<date>.<index>.log` from a base `.log` path
pub fn compute_rolled_file_path(base_file_path: &str, date_str: &str, index: u32) -> String {
	let stem = base_file_path
		.strip_suffix(".log")
		.unwrap_or(base_file_path);
	format!("{}-{}.{}.log", stem, date_str, index)
}

/// Returns the first rolled path (starting at `file_path`) whose file is not above `max_size`.
pub fn space_based_rolling(
	file_path: &str,
	base_file_path: &str,
	date_str: &str,
	max_size: u64,
) -> String {
	let mut candidate = file_path.to_string();
	let mut index = 1;
	while let Ok(meta) = fs::metadata(&candidate) {
		if meta.len() <= max_size {
			break;
		}
		index += 1;
		candidate = compute_rolled_file_path(base_file_path, date_str, index);
	}
	candidate
}

fn compact_format(with_ansi: bool) -> Format<Compact> {
	fmt::format()
		.with_level(true)
		.with_target(true)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_ansi(with_ansi)
		.compact()
}

/// Installs the global tracing subscriber.
pub fn setup_logging() -> Result<(), Box<dyn std::error::Error>> {
	let settings = LogSettings::from_env()?;
	let subscriber =
		tracing_subscriber::registry().with(EnvFilter::new(settings.level.to_string()));

	if settings.to_file {
		let date_str = Utc::now().format("%Y-%m-%d").to_string();
		let base_file_path = format!("{}{}", settings.directory, LOG_FILE_NAME);
		let dated_path = compute_rolled_file_path(&base_file_path, &date_str, 1);
		if let Some(parent) = Path::new(&dated_path).parent() {
			fs::create_dir_all(parent)?;
		}
		let final_path =
			space_based_rolling(&dated_path, &base_file_path, &date_str, settings.max_size);

		let final_path = Path::new(&final_path);
		let appender = tracing_appender::rolling::never(
			final_path.parent().unwrap_or(Path::new(".")),
			final_path.file_name().unwrap_or_default(),
		);

		subscriber
			.with(
				fmt::layer()
					.event_format(PlainFormatter {
						inner: compact_format(false),
					})
					.with_writer(appender)
					.fmt_fields(fmt::format::PrettyFields::new()),
			)
			.try_init()?;
		info!(path = %final_path.display(), "logging to file");
	} else {
		subscriber
			.with(
				fmt::layer()
					.event_format(compact_format(true))
					.fmt_fields(fmt::format::PrettyFields::new()),
			)
			.try_init()?;
	}

	info!(level = %settings.level, "logging configured");
	Ok(())
}
