use std::collections::{HashMap, HashSet};

use serde::Serialize;
use time::{Duration, OffsetDateTime};

use crate::{
	AuthorityContext, CandidateNode, Clock, Collaborators, Error, PermissionOracle, Principal,
	QueryOptions, Result,
};
use sift_config::Selection;

/// The budget dimension that cut a scan short.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetLimit {
	Checks,
	Time,
}

/// Ceilings for one invocation. `None` disables that dimension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BudgetLimits {
	pub max_permission_checks: Option<u64>,
	pub max_permission_check_time: Option<Duration>,
}
impl BudgetLimits {
	pub fn resolve(options: &QueryOptions, defaults: &Selection) -> Self {
		Self {
			max_permission_checks: options
				.max_permission_checks()
				.resolve(defaults.max_permission_checks),
			max_permission_check_time: options
				.max_permission_check_time_ms()
				.resolve(defaults.max_permission_check_time_ms)
				.map(millis),
		}
	}
}

/// Counters owned by exactly one assessor.
#[derive(Debug, Clone, Default)]
pub struct AssessmentBudget {
	checks_performed: u64,
	first_check_at: Option<OffsetDateTime>,
}
impl AssessmentBudget {
	pub fn checks_performed(&self) -> u64 {
		self.checks_performed
	}

	pub fn first_check_at(&self) -> Option<OffsetDateTime> {
		self.first_check_at
	}

	fn record_check(&mut self, now: OffsetDateTime) {
		self.checks_performed = self.checks_performed.saturating_add(1);

		if self.first_check_at.is_none() {
			self.first_check_at = Some(now);
		}
	}

	fn exceeded(&self, limits: &BudgetLimits, now: OffsetDateTime) -> Option<BudgetLimit> {
		if limits.max_permission_checks.is_some_and(|max| self.checks_performed > max) {
			return Some(BudgetLimit::Checks);
		}
		if let (Some(max), Some(first)) = (limits.max_permission_check_time, self.first_check_at)
			&& now - first > max
		{
			return Some(BudgetLimit::Time);
		}

		None
	}
}

/// Stateful read-permission decision for one invocation.
pub struct NodePermissionAssessor<'a> {
	authority: &'a dyn AuthorityContext,
	oracle: &'a dyn PermissionOracle,
	clock: &'a dyn Clock,
	limits: BudgetLimits,
	budget: AssessmentBudget,
	readers_by_acl: Option<HashMap<i64, HashSet<String>>>,
}
impl<'a> NodePermissionAssessor<'a> {
	pub fn new(collaborators: &'a Collaborators, limits: BudgetLimits) -> Self {
		Self {
			authority: collaborators.authority.as_ref(),
			oracle: collaborators.oracle.as_ref(),
			clock: collaborators.clock.as_ref(),
			limits,
			budget: AssessmentBudget::default(),
			readers_by_acl: None,
		}
	}

	/// Memoizes reader sets by ACL reference for the lifetime of this assessor.
	pub fn with_reader_cache(mut self) -> Self {
		self.readers_by_acl = Some(HashMap::new());

		self
	}

	pub fn limits(&self) -> BudgetLimits {
		self.limits
	}

	pub fn max_permission_checks(&self) -> Option<u64> {
		self.limits.max_permission_checks
	}

	pub fn max_permission_check_time(&self) -> Option<Duration> {
		self.limits.max_permission_check_time
	}

	pub fn set_max_permission_checks(&mut self, max: Option<u64>) {
		self.limits.max_permission_checks = max;
	}

	pub fn set_max_permission_check_time(&mut self, max: Option<Duration>) {
		self.limits.max_permission_check_time = max;
	}

	pub fn budget(&self) -> &AssessmentBudget {
		&self.budget
	}

	/// Counts against the budget whether or not a principal is resolved.
	pub fn is_included(&mut self, node: &CandidateNode) -> Result<bool> {
		self.budget.record_check(self.clock.now());

		match self.authority.current_principal() {
			None => Ok(false),
			Some(Principal::System) => Ok(true),
			Some(Principal::Named(name)) => self.is_really_included(node, &name),
		}
	}

	/// Owner-read or reader-set membership. Performs no budget accounting.
	pub fn is_really_included(&mut self, node: &CandidateNode, principal: &str) -> Result<bool> {
		if node.owner() == Some(principal) {
			let owner_reads = self.oracle.owner_reads(node, principal).map_err(|err| {
				Error::Oracle {
					message: format!("owner-read check for node {} failed: {err}", node.node_id()),
				}
			})?;

			if owner_reads {
				return Ok(true);
			}
		}

		self.reader_allowed(node, principal)
	}

	pub fn should_quit_checks(&self) -> bool {
		self.exhausted_limit().is_some()
	}

	/// The budget dimension currently exceeded, if any.
	pub fn exhausted_limit(&self) -> Option<BudgetLimit> {
		if self.limits.max_permission_checks.is_none()
			&& self.limits.max_permission_check_time.is_none()
		{
			return None;
		}

		self.budget.exceeded(&self.limits, self.clock.now())
	}

	fn reader_allowed(&mut self, node: &CandidateNode, principal: &str) -> Result<bool> {
		let oracle = self.oracle;
		let lookup = |node: &CandidateNode| {
			oracle.readers_of(node).map_err(|err| Error::Oracle {
				message: format!("readers lookup for node {} failed: {err}", node.node_id()),
			})
		};

		if let (Some(cache), Some(acl_id)) = (self.readers_by_acl.as_mut(), node.acl_id()) {
			if let Some(readers) = cache.get(&acl_id) {
				return Ok(readers.contains(principal));
			}

			let readers = lookup(node)?;
			let allowed = readers.contains(principal);

			cache.insert(acl_id, readers);

			return Ok(allowed);
		}

		Ok(lookup(node)?.contains(principal))
	}
}

fn millis(ms: u64) -> Duration {
	i64::try_from(ms).map(Duration::milliseconds).unwrap_or(Duration::MAX)
}
