//! Permission-aware, budget-bounded selection of a result window from an unfiltered candidate
//! stream.
//!
//! Results that stop on [`StopReason::PermissionBudget`] are authoritative for the nodes they
//! contain but may be incomplete: accessible nodes past the cut-off were never assessed.

pub mod accumulator;
pub mod assessor;
pub mod cursor;
pub mod node;
pub mod options;
pub mod result_set;
pub mod select;

mod error;

use std::{collections::HashSet, sync::Arc};

use time::OffsetDateTime;

pub use accumulator::{Offer, ResultWindowAccumulator};
pub use assessor::{AssessmentBudget, BudgetLimit, BudgetLimits, NodePermissionAssessor};
pub use cursor::{CandidateCursorAdapter, CandidateSource, CursorControl, RowHandler};
pub use error::{Error, Result};
pub use node::{CandidateNode, CandidateRow};
pub use options::{BudgetOverride, QueryOptions, QueryOptionsRequest};
pub use result_set::{FilteringResultSet, StopReason};
pub use select::select_accessible_window;
use sift_config::Selection;

/// The identity a permission check is made on behalf of.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Principal {
	/// Trusted identity that bypasses per-node read checks.
	System,
	Named(String),
}
impl Principal {
	pub fn named(name: impl Into<String>) -> Self {
		Self::Named(name.into())
	}
}

pub trait AuthorityContext
where
	Self: Send + Sync,
{
	/// `None` when nobody is authenticated.
	fn current_principal(&self) -> Option<Principal>;
}

pub trait PermissionOracle
where
	Self: Send + Sync,
{
	/// Whether owner-read is permitted on `node` for `principal`, its registered owner.
	fn owner_reads(&self, node: &CandidateNode, principal: &str) -> color_eyre::Result<bool>;

	fn readers_of(&self, node: &CandidateNode) -> color_eyre::Result<HashSet<String>>;
}

pub trait Clock
where
	Self: Send + Sync,
{
	fn now(&self) -> OffsetDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}
}

#[derive(Clone)]
pub struct Collaborators {
	pub authority: Arc<dyn AuthorityContext>,
	pub oracle: Arc<dyn PermissionOracle>,
	pub clock: Arc<dyn Clock>,
}
impl Collaborators {
	pub fn new(authority: Arc<dyn AuthorityContext>, oracle: Arc<dyn PermissionOracle>) -> Self {
		Self { authority, oracle, clock: Arc::new(SystemClock) }
	}

	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}
}

pub struct SelectionEngine {
	pub cfg: Selection,
	pub collaborators: Collaborators,
}
impl SelectionEngine {
	pub fn new(cfg: Selection, collaborators: Collaborators) -> Self {
		Self { cfg, collaborators }
	}
}
