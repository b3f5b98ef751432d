use crate::{
	BudgetLimits, CandidateCursorAdapter, CandidateSource, FilteringResultSet,
	NodePermissionAssessor, QueryOptions, QueryOptionsRequest, Result, ResultWindowAccumulator,
	SelectionEngine,
};

impl SelectionEngine {
	/// Seeds a fresh assessor from the query's budgets, falling back to configured defaults.
	pub fn create_assessor(&self, options: &QueryOptions) -> NodePermissionAssessor<'_> {
		let limits = BudgetLimits::resolve(options, &self.cfg);
		let assessor = NodePermissionAssessor::new(&self.collaborators, limits);

		if self.cfg.cache_readers_by_acl { assessor.with_reader_cache() } else { assessor }
	}

	/// Validates `req` before touching `source`, then selects one window.
	pub fn select(
		&self,
		req: &QueryOptionsRequest,
		source: &mut dyn CandidateSource,
	) -> Result<FilteringResultSet> {
		let options = QueryOptions::try_from(req)?;
		let assessor = self.create_assessor(&options);

		select_accessible_window(&options, source, assessor)
	}
}

/// Scans `source` until the window fills, the budget runs out, or the rows end.
///
/// The assessor is consumed so its budget cannot leak into another invocation. On any oracle or
/// source failure no partial result is returned.
pub fn select_accessible_window(
	options: &QueryOptions,
	source: &mut dyn CandidateSource,
	assessor: NodePermissionAssessor<'_>,
) -> Result<FilteringResultSet> {
	let accumulator = ResultWindowAccumulator::new(options, assessor);
	let result = CandidateCursorAdapter::new(accumulator).drive(source);

	match &result {
		Ok(set) => tracing::debug!(
			skip_count = options.skip_count(),
			max_items = ?options.max_items(),
			windowed = set.len(),
			accessible_found = set.accessible_found(),
			candidates_scanned = set.candidates_scanned(),
			checks_performed = set.checks_performed(),
			stop_reason = ?set.stop_reason(),
			"Selected accessible window."
		),
		Err(err) => tracing::error!(error = %err, "Accessible window selection failed."),
	}

	result
}
