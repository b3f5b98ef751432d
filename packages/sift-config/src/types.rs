use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	#[serde(default)]
	pub selection: Selection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub log_level: String,
}

/// Defaults applied to every selection when the caller does not override them.
#[derive(Debug, Clone, Deserialize)]
pub struct Selection {
	/// Permission checks allowed per invocation. Zero disables the ceiling.
	#[serde(default = "default_max_permission_checks")]
	pub max_permission_checks: u64,
	/// Wall-clock milliseconds allowed for permission checks, measured from the first check.
	/// Zero disables the ceiling.
	#[serde(default = "default_max_permission_check_time_ms")]
	pub max_permission_check_time_ms: u64,
	#[serde(default = "default_cache_readers_by_acl")]
	pub cache_readers_by_acl: bool,
}
impl Default for Selection {
	fn default() -> Self {
		Self {
			max_permission_checks: default_max_permission_checks(),
			max_permission_check_time_ms: default_max_permission_check_time_ms(),
			cache_readers_by_acl: default_cache_readers_by_acl(),
		}
	}
}

fn default_max_permission_checks() -> u64 {
	1_000
}

fn default_max_permission_check_time_ms() -> u64 {
	10_000
}

fn default_cache_readers_by_acl() -> bool {
	true
}
