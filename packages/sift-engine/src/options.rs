use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Caller intent as received from the host's search parameters.
///
/// `max_items` of `-1` or `0` means unbounded. A budget of `-1` (or absent) defers to the
/// configured default and `0` disables that budget.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct QueryOptionsRequest {
	pub skip_count: i64,
	pub max_items: i64,
	pub max_permission_checks: Option<i64>,
	pub max_permission_check_time_ms: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BudgetOverride {
	/// Use the engine's configured ceiling.
	#[default]
	Default,
	Unlimited,
	Limit(u64),
}
impl BudgetOverride {
	pub fn from_raw(raw: u64) -> Self {
		if raw == 0 { Self::Unlimited } else { Self::Limit(raw) }
	}

	/// Resolves against a configured default where zero means unlimited.
	pub fn resolve(self, default: u64) -> Option<u64> {
		match self {
			Self::Default => (default > 0).then_some(default),
			Self::Unlimited => None,
			Self::Limit(limit) => Some(limit),
		}
	}

	fn parse(field: &str, raw: Option<i64>) -> Result<Self> {
		match raw {
			None | Some(-1) => Ok(Self::Default),
			Some(value) if value >= 0 => Ok(Self::from_raw(value as u64)),
			Some(value) => Err(Error::InvalidOptions {
				message: format!("{field} must be -1, zero, or greater; got {value}."),
			}),
		}
	}
}

/// Immutable per-invocation configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
	skip_count: usize,
	max_items: Option<usize>,
	max_permission_checks: BudgetOverride,
	max_permission_check_time_ms: BudgetOverride,
}
impl QueryOptions {
	/// A `max_items` of zero means unbounded.
	pub fn new(skip_count: usize, max_items: usize) -> Self {
		Self {
			skip_count,
			max_items: (max_items > 0).then_some(max_items),
			..Default::default()
		}
	}

	pub fn unbounded() -> Self {
		Self::default()
	}

	pub fn with_max_permission_checks(mut self, max: u64) -> Self {
		self.max_permission_checks = BudgetOverride::from_raw(max);

		self
	}

	pub fn with_max_permission_check_time_ms(mut self, max_ms: u64) -> Self {
		self.max_permission_check_time_ms = BudgetOverride::from_raw(max_ms);

		self
	}

	pub fn skip_count(&self) -> usize {
		self.skip_count
	}

	pub fn max_items(&self) -> Option<usize> {
		self.max_items
	}

	pub fn max_permission_checks(&self) -> BudgetOverride {
		self.max_permission_checks
	}

	pub fn max_permission_check_time_ms(&self) -> BudgetOverride {
		self.max_permission_check_time_ms
	}
}

impl TryFrom<&QueryOptionsRequest> for QueryOptions {
	type Error = Error;

	fn try_from(req: &QueryOptionsRequest) -> Result<Self> {
		let skip_count = usize::try_from(req.skip_count).map_err(|_| Error::InvalidOptions {
			message: format!("skip_count must be zero or greater; got {}.", req.skip_count),
		})?;
		let max_items = match req.max_items {
			-1 | 0 => None,
			value if value > 0 => Some(usize::try_from(value).map_err(|_| {
				Error::InvalidOptions {
					message: format!("max_items {value} does not fit this platform."),
				}
			})?),
			value => {
				return Err(Error::InvalidOptions {
					message: format!("max_items must be -1, zero, or greater; got {value}."),
				});
			},
		};

		Ok(Self {
			skip_count,
			max_items,
			max_permission_checks: BudgetOverride::parse(
				"max_permission_checks",
				req.max_permission_checks,
			)?,
			max_permission_check_time_ms: BudgetOverride::parse(
				"max_permission_check_time_ms",
				req.max_permission_check_time_ms,
			)?,
		})
	}
}

#[cfg(test)]
mod tests {
	use crate::{BudgetOverride, Error, QueryOptions, QueryOptionsRequest};

	fn request(skip_count: i64, max_items: i64) -> QueryOptionsRequest {
		QueryOptionsRequest { skip_count, max_items, ..Default::default() }
	}

	#[test]
	fn negative_skip_count_is_rejected() {
		let err = QueryOptions::try_from(&request(-1, 10)).expect_err("Expected invalid options.");

		assert!(matches!(err, Error::InvalidOptions { .. }));
		assert!(err.to_string().contains("skip_count must be zero or greater"), "{err}");
	}

	#[test]
	fn max_items_sentinels_mean_unbounded() {
		for raw in [-1, 0] {
			let options =
				QueryOptions::try_from(&request(0, raw)).expect("Sentinel must be accepted.");

			assert_eq!(options.max_items(), None);
		}
	}

	#[test]
	fn max_items_below_sentinel_is_rejected() {
		let err = QueryOptions::try_from(&request(0, -2)).expect_err("Expected invalid options.");

		assert!(err.to_string().contains("max_items must be -1, zero, or greater"), "{err}");
	}

	#[test]
	fn budget_overrides_follow_host_conventions() {
		let req = QueryOptionsRequest {
			skip_count: 3,
			max_items: 5,
			max_permission_checks: Some(0),
			max_permission_check_time_ms: Some(250),
		};
		let options = QueryOptions::try_from(&req).expect("Options must be valid.");

		assert_eq!(options.skip_count(), 3);
		assert_eq!(options.max_items(), Some(5));
		assert_eq!(options.max_permission_checks(), BudgetOverride::Unlimited);
		assert_eq!(options.max_permission_check_time_ms(), BudgetOverride::Limit(250));

		let defaulted = QueryOptions::try_from(&QueryOptionsRequest {
			max_permission_checks: Some(-1),
			..Default::default()
		})
		.expect("Options must be valid.");

		assert_eq!(defaulted.max_permission_checks(), BudgetOverride::Default);
		assert_eq!(defaulted.max_permission_check_time_ms(), BudgetOverride::Default);
	}

	#[test]
	fn negative_budget_is_rejected() {
		let err = QueryOptions::try_from(&QueryOptionsRequest {
			max_permission_check_time_ms: Some(-7),
			..Default::default()
		})
		.expect_err("Expected invalid options.");

		assert!(err.to_string().contains("max_permission_check_time_ms"), "{err}");
	}

	#[test]
	fn override_resolution() {
		assert_eq!(BudgetOverride::Default.resolve(1_000), Some(1_000));
		assert_eq!(BudgetOverride::Default.resolve(0), None);
		assert_eq!(BudgetOverride::Unlimited.resolve(1_000), None);
		assert_eq!(BudgetOverride::Limit(7).resolve(1_000), Some(7));
		assert_eq!(BudgetOverride::from_raw(0), BudgetOverride::Unlimited);
	}
}
