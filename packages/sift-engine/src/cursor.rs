use crate::{
	CandidateNode, CandidateRow, Error, FilteringResultSet, Offer, Result,
	ResultWindowAccumulator,
};

/// Early-termination control handed to the row callback.
pub trait CursorControl {
	/// After this returns the source must deliver no further rows.
	fn halt(&mut self);
}

pub trait RowHandler {
	fn on_row(&mut self, row: CandidateRow, cursor: &mut dyn CursorControl);
}

/// An upstream, security-unaware producer of ordered candidate rows.
pub trait CandidateSource {
	/// Pushes rows into `handler` in a stable order until exhausted or halted.
	fn scan(&mut self, handler: &mut dyn RowHandler) -> color_eyre::Result<()>;
}

/// Materializes rows, buffers them, and feeds the accumulator until it asks to stop.
pub struct CandidateCursorAdapter<'a> {
	accumulator: ResultWindowAccumulator<'a>,
	unfiltered: Vec<CandidateNode>,
	halted: bool,
	failure: Option<Error>,
}
impl<'a> CandidateCursorAdapter<'a> {
	pub fn new(accumulator: ResultWindowAccumulator<'a>) -> Self {
		Self { accumulator, unfiltered: Vec::new(), halted: false, failure: None }
	}

	pub fn drive(mut self, source: &mut dyn CandidateSource) -> Result<FilteringResultSet> {
		let scanned = source.scan(&mut self);

		// An oracle failure halts the cursor, so it takes precedence over whatever the source
		// reported afterwards.
		if let Some(err) = self.failure.take() {
			return Err(err);
		}

		scanned.map_err(|err| Error::Source { message: err.to_string() })?;

		let (windowed, stop_reason, accessible_found, checks_performed) =
			self.accumulator.into_parts();

		Ok(FilteringResultSet::new(
			self.unfiltered,
			windowed,
			stop_reason,
			accessible_found,
			checks_performed,
		))
	}

	fn halt(&mut self, cursor: &mut dyn CursorControl) {
		self.halted = true;

		cursor.halt();

		tracing::debug!(
			candidates_scanned = self.unfiltered.len(),
			windowed = self.accumulator.windowed().len(),
			"Halted candidate cursor."
		);
	}
}
impl RowHandler for CandidateCursorAdapter<'_> {
	fn on_row(&mut self, row: CandidateRow, cursor: &mut dyn CursorControl) {
		if self.halted {
			tracing::warn!(node_id = row.node_id, "Candidate source delivered a row after halt.");

			return;
		}

		let position = self.unfiltered.len();

		self.unfiltered.push(CandidateNode::from_row(position, row));

		match self.accumulator.offer(&self.unfiltered[position]) {
			Ok(Offer::Continue) => {},
			Ok(Offer::Stop) => self.halt(cursor),
			Err(err) => {
				self.failure = Some(err);

				self.halt(cursor);
			},
		}
	}
}
