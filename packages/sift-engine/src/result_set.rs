use serde::Serialize;

use crate::{BudgetLimit, CandidateNode};

/// Why a scan ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopReason {
	/// The candidate source ran out of rows.
	Exhausted,
	/// The requested page reached `max_items`.
	WindowFilled,
	/// The permission budget ran out. The window is valid but may miss accessible nodes.
	PermissionBudget { limit: BudgetLimit },
}

/// An ordered window of accessible nodes plus every candidate the scan touched.
///
/// The window holds positions into the unfiltered buffer, so each node is stored once.
#[derive(Debug, Clone)]
pub struct FilteringResultSet {
	unfiltered: Vec<CandidateNode>,
	windowed: Vec<usize>,
	stop_reason: StopReason,
	accessible_found: usize,
	checks_performed: u64,
}
impl FilteringResultSet {
	pub(crate) fn new(
		unfiltered: Vec<CandidateNode>,
		windowed: Vec<usize>,
		stop_reason: StopReason,
		accessible_found: usize,
		checks_performed: u64,
	) -> Self {
		debug_assert!(windowed.iter().all(|position| *position < unfiltered.len()));

		Self { unfiltered, windowed, stop_reason, accessible_found, checks_performed }
	}

	pub fn len(&self) -> usize {
		self.windowed.len()
	}

	pub fn is_empty(&self) -> bool {
		self.windowed.is_empty()
	}

	pub fn get(&self, index: usize) -> Option<&CandidateNode> {
		self.windowed.get(index).map(|position| &self.unfiltered[*position])
	}

	pub fn iter(&self) -> impl Iterator<Item = &CandidateNode> + '_ {
		self.windowed.iter().map(|position| &self.unfiltered[*position])
	}

	pub fn node_ids(&self) -> Vec<i64> {
		self.iter().map(CandidateNode::node_id).collect()
	}

	/// Every candidate read before the scan stopped, accessible or not, in arrival order.
	pub fn unfiltered(&self) -> &[CandidateNode] {
		&self.unfiltered
	}

	pub fn candidates_scanned(&self) -> usize {
		self.unfiltered.len()
	}

	pub fn stop_reason(&self) -> StopReason {
		self.stop_reason
	}

	pub fn is_budget_limited(&self) -> bool {
		matches!(self.stop_reason, StopReason::PermissionBudget { .. })
	}

	/// Whether further accessible nodes may exist.
	///
	/// True whenever the scan halted on a full window or an exhausted budget, including when the
	/// window filled on the source's last row. Only a scan that reached the end of the source
	/// reports false.
	pub fn has_more_items(&self) -> bool {
		!matches!(self.stop_reason, StopReason::Exhausted)
	}

	/// Accessible nodes discovered, skipped ones included.
	pub fn accessible_found(&self) -> usize {
		self.accessible_found
	}

	pub fn checks_performed(&self) -> u64 {
		self.checks_performed
	}
}

#[cfg(test)]
mod tests {
	use uuid::Uuid;

	use crate::{BudgetLimit, CandidateNode, CandidateRow, FilteringResultSet, StopReason};

	fn nodes(count: i64) -> Vec<CandidateNode> {
		(0..count)
			.map(|id| {
				CandidateNode::from_row(
					id as usize,
					CandidateRow { node_id: id * 10, uuid: Uuid::nil(), owner: None, acl_id: None },
				)
			})
			.collect()
	}

	#[test]
	fn window_indexes_into_unfiltered_buffer() {
		let set = FilteringResultSet::new(nodes(6), vec![1, 4], StopReason::WindowFilled, 3, 6);

		assert_eq!(set.len(), 2);
		assert_eq!(set.get(0).map(CandidateNode::node_id), Some(10));
		assert_eq!(set.get(1).map(CandidateNode::node_id), Some(40));
		assert!(set.get(2).is_none());
		assert_eq!(set.node_ids(), vec![10, 40]);
		assert_eq!(set.candidates_scanned(), 6);
		assert_eq!(set.accessible_found(), 3);
		assert!(set.has_more_items());
	}

	#[test]
	fn exhausted_scan_reports_no_more_items() {
		let set = FilteringResultSet::new(nodes(2), vec![], StopReason::Exhausted, 0, 2);

		assert!(set.is_empty());
		assert!(!set.has_more_items());
		assert!(!set.is_budget_limited());
	}

	#[test]
	fn stop_reason_serializes_with_kind_tag() {
		let reason = StopReason::PermissionBudget { limit: BudgetLimit::Time };
		let value = serde_json::to_value(reason).expect("Stop reason must serialize.");

		assert_eq!(value, serde_json::json!({ "kind": "permission_budget", "limit": "time" }));
	}
}
