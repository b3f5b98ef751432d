mod error;
mod types;

pub use error::{Error, Result};
pub use types::{Config, Selection, Service};

use std::{fs, path::Path};

/// Longest time budget accepted from configuration, in milliseconds.
pub const MAX_PERMISSION_CHECK_TIME_CEILING_MS: u64 = 86_400_000;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	parse(&raw).map_err(|err| match err {
		Error::ParseConfig { source, .. } => {
			Error::ParseConfig { path: path.to_path_buf(), source }
		},
		other => other,
	})
}

pub fn parse(raw: &str) -> Result<Config> {
	let mut cfg: Config = toml::from_str(raw)
		.map_err(|err| Error::ParseConfig { path: Default::default(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}
	if cfg.selection.max_permission_check_time_ms > MAX_PERMISSION_CHECK_TIME_CEILING_MS {
		return Err(Error::Validation {
			message: format!(
				"selection.max_permission_check_time_ms must be at most {MAX_PERMISSION_CHECK_TIME_CEILING_MS}."
			),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	let trimmed = cfg.service.log_level.trim();

	if trimmed.len() != cfg.service.log_level.len() {
		cfg.service.log_level = trimmed.to_string();
	}
}
