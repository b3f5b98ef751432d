use crate::{
	BudgetLimit, CandidateNode, NodePermissionAssessor, QueryOptions, Result, StopReason,
};

/// Whether the cursor should keep delivering rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
	Continue,
	Stop,
}

/// Applies skip/limit over the accessible subset of the candidates it is offered.
pub struct ResultWindowAccumulator<'a> {
	assessor: NodePermissionAssessor<'a>,
	skip_count: usize,
	max_items: Option<usize>,
	accepted_before_window: usize,
	windowed: Vec<usize>,
	stop_reason: Option<StopReason>,
}
impl<'a> ResultWindowAccumulator<'a> {
	pub fn new(options: &QueryOptions, assessor: NodePermissionAssessor<'a>) -> Self {
		Self {
			assessor,
			skip_count: options.skip_count(),
			max_items: options.max_items(),
			accepted_before_window: 0,
			windowed: Vec::with_capacity(options.max_items().unwrap_or(0).min(1_024)),
			stop_reason: None,
		}
	}

	pub fn offer(&mut self, node: &CandidateNode) -> Result<Offer> {
		if self.stop_reason.is_some() {
			return Ok(Offer::Stop);
		}
		if let Some(limit) = self.assessor.exhausted_limit() {
			self.stop_on_budget(limit);

			return Ok(Offer::Stop);
		}

		let included = self.assessor.is_included(node)?;
		// The node that trips the budget is still honoured.
		let tripped = self.assessor.exhausted_limit();

		if included {
			if self.accepted_before_window < self.skip_count {
				self.accepted_before_window += 1;
			} else {
				self.windowed.push(node.position());

				if self.max_items.is_some_and(|max| self.windowed.len() >= max) {
					self.stop_reason = Some(StopReason::WindowFilled);

					return Ok(Offer::Stop);
				}
			}
		}
		if let Some(limit) = tripped {
			self.stop_on_budget(limit);

			return Ok(Offer::Stop);
		}

		Ok(Offer::Continue)
	}

	pub fn assessor(&self) -> &NodePermissionAssessor<'a> {
		&self.assessor
	}

	pub fn accepted_before_window(&self) -> usize {
		self.accepted_before_window
	}

	pub fn windowed(&self) -> &[usize] {
		&self.windowed
	}

	pub fn stop_reason(&self) -> Option<StopReason> {
		self.stop_reason
	}

	/// Accessible nodes seen so far, skipped ones included.
	pub fn accessible_found(&self) -> usize {
		self.accepted_before_window + self.windowed.len()
	}

	pub(crate) fn into_parts(self) -> (Vec<usize>, StopReason, usize, u64) {
		let accessible_found = self.accessible_found();

		(
			self.windowed,
			self.stop_reason.unwrap_or(StopReason::Exhausted),
			accessible_found,
			self.assessor.budget().checks_performed(),
		)
	}

	fn stop_on_budget(&mut self, limit: BudgetLimit) {
		let budget = self.assessor.budget();

		tracing::warn!(
			?limit,
			checks_performed = budget.checks_performed(),
			max_permission_checks = ?self.assessor.max_permission_checks(),
			max_permission_check_time = ?self.assessor.max_permission_check_time(),
			windowed = self.windowed.len(),
			"Permission check budget exhausted before the window filled."
		);

		self.stop_reason = Some(StopReason::PermissionBudget { limit });
	}
}

#[cfg(test)]
mod tests {
	use std::{collections::HashSet, sync::Arc};

	use uuid::Uuid;

	use crate::{
		AuthorityContext, BudgetLimit, BudgetLimits, CandidateNode, CandidateRow, Collaborators,
		NodePermissionAssessor, Offer, PermissionOracle, Principal, QueryOptions,
		ResultWindowAccumulator, StopReason,
	};

	struct Alice;
	impl AuthorityContext for Alice {
		fn current_principal(&self) -> Option<Principal> {
			Some(Principal::named("alice"))
		}
	}

	/// Alice may read every node whose id is not listed.
	struct DenyList(HashSet<i64>);
	impl PermissionOracle for DenyList {
		fn owner_reads(&self, _node: &CandidateNode, _principal: &str) -> color_eyre::Result<bool> {
			Ok(false)
		}

		fn readers_of(&self, node: &CandidateNode) -> color_eyre::Result<HashSet<String>> {
			if self.0.contains(&node.node_id()) {
				Ok(HashSet::new())
			} else {
				Ok(HashSet::from(["alice".to_string()]))
			}
		}
	}

	fn collaborators(denied: &[i64]) -> Collaborators {
		Collaborators::new(Arc::new(Alice), Arc::new(DenyList(denied.iter().copied().collect())))
	}

	fn node(id: i64) -> CandidateNode {
		CandidateNode::from_row(
			id as usize,
			CandidateRow { node_id: id, uuid: Uuid::nil(), owner: None, acl_id: None },
		)
	}

	fn drain(accumulator: &mut ResultWindowAccumulator<'_>, count: i64) -> Vec<Offer> {
		let mut offers = Vec::new();

		for id in 0..count {
			let offer = accumulator.offer(&node(id)).expect("Offer must succeed.");

			offers.push(offer);

			if offer == Offer::Stop {
				break;
			}
		}

		offers
	}

	#[test]
	fn excluded_nodes_do_not_advance_skip() {
		let collaborators = collaborators(&[2, 3]);
		let assessor = NodePermissionAssessor::new(&collaborators, BudgetLimits::default());
		let mut accumulator = ResultWindowAccumulator::new(&QueryOptions::new(2, 2), assessor);
		let offers = drain(&mut accumulator, 6);

		assert_eq!(offers.last(), Some(&Offer::Stop));
		assert_eq!(accumulator.windowed(), &[4, 5]);
		assert_eq!(accumulator.accepted_before_window(), 2);
		assert_eq!(accumulator.stop_reason(), Some(StopReason::WindowFilled));
	}

	#[test]
	fn unbounded_window_never_stops() {
		let collaborators = collaborators(&[1]);
		let assessor = NodePermissionAssessor::new(&collaborators, BudgetLimits::default());
		let mut accumulator = ResultWindowAccumulator::new(&QueryOptions::unbounded(), assessor);
		let offers = drain(&mut accumulator, 50);

		assert!(offers.iter().all(|offer| *offer == Offer::Continue));
		assert_eq!(accumulator.windowed().len(), 49);
		assert_eq!(accumulator.stop_reason(), None);
	}

	#[test]
	fn tripping_node_is_still_honoured() {
		let collaborators = collaborators(&[]);
		let assessor = NodePermissionAssessor::new(
			&collaborators,
			BudgetLimits { max_permission_checks: Some(3), max_permission_check_time: None },
		);
		let mut accumulator = ResultWindowAccumulator::new(&QueryOptions::new(0, 10), assessor);
		let offers = drain(&mut accumulator, 10);

		assert_eq!(offers.len(), 4);
		assert_eq!(accumulator.windowed(), &[0, 1, 2, 3]);
		assert_eq!(accumulator.assessor().budget().checks_performed(), 4);
		assert_eq!(
			accumulator.stop_reason(),
			Some(StopReason::PermissionBudget { limit: BudgetLimit::Checks })
		);
	}

	#[test]
	fn offers_after_stop_are_not_assessed() {
		let collaborators = collaborators(&[]);
		let assessor = NodePermissionAssessor::new(&collaborators, BudgetLimits::default());
		let mut accumulator = ResultWindowAccumulator::new(&QueryOptions::new(0, 1), assessor);

		assert_eq!(accumulator.offer(&node(0)).expect("Offer must succeed."), Offer::Stop);
		assert_eq!(accumulator.offer(&node(1)).expect("Offer must succeed."), Offer::Stop);
		assert_eq!(accumulator.assessor().budget().checks_performed(), 1);
	}

	#[test]
	fn filling_the_window_wins_over_a_simultaneous_budget_trip() {
		let collaborators = collaborators(&[]);
		let assessor = NodePermissionAssessor::new(
			&collaborators,
			BudgetLimits { max_permission_checks: Some(1), max_permission_check_time: None },
		);
		let mut accumulator = ResultWindowAccumulator::new(&QueryOptions::new(0, 2), assessor);

		drain(&mut accumulator, 5);

		assert_eq!(accumulator.stop_reason(), Some(StopReason::WindowFilled));
		assert_eq!(accumulator.accessible_found(), 2);
	}
}
