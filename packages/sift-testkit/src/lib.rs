//! In-memory collaborators for exercising the selection engine without a repository.

use std::{
	collections::{HashMap, HashSet},
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
};

use color_eyre::eyre;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use sift_engine::{
	AuthorityContext, CandidateNode, CandidateRow, CandidateSource, Clock, Collaborators,
	CursorControl, PermissionOracle, Principal, RowHandler,
};

/// Deterministic rows with ids `0..count`, no owner and no ACL.
pub fn candidate_rows(count: usize) -> Vec<CandidateRow> {
	(0..count).map(|id| candidate_row(id as i64)).collect()
}

pub fn candidate_row(node_id: i64) -> CandidateRow {
	CandidateRow {
		node_id,
		uuid: Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("sift-node-{node_id}").as_bytes()),
		owner: None,
		acl_id: None,
	}
}

pub fn collaborators(
	authority: StaticAuthority,
	oracle: Arc<TableOracle>,
	clock: Arc<ManualClock>,
) -> Collaborators {
	Collaborators::new(Arc::new(authority), oracle).with_clock(clock)
}

pub struct StaticAuthority {
	principal: Option<Principal>,
}
impl StaticAuthority {
	pub fn system() -> Self {
		Self { principal: Some(Principal::System) }
	}

	pub fn named(name: &str) -> Self {
		Self { principal: Some(Principal::named(name)) }
	}

	pub fn anonymous() -> Self {
		Self { principal: None }
	}
}
impl AuthorityContext for StaticAuthority {
	fn current_principal(&self) -> Option<Principal> {
		self.principal.clone()
	}
}

/// Reader sets and owner-read grants keyed by node id, with call counters.
#[derive(Default)]
pub struct TableOracle {
	readers: HashMap<i64, HashSet<String>>,
	owner_read: HashSet<i64>,
	fail_on: Option<i64>,
	owner_calls: AtomicUsize,
	reader_calls: AtomicUsize,
}
impl TableOracle {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn grant(mut self, node_id: i64, reader: &str) -> Self {
		self.readers.entry(node_id).or_default().insert(reader.to_string());

		self
	}

	pub fn grant_all(mut self, node_ids: impl IntoIterator<Item = i64>, reader: &str) -> Self {
		for node_id in node_ids {
			self = self.grant(node_id, reader);
		}

		self
	}

	pub fn allow_owner_read(mut self, node_id: i64) -> Self {
		self.owner_read.insert(node_id);

		self
	}

	/// Every lookup for `node_id` fails.
	pub fn fail_on(mut self, node_id: i64) -> Self {
		self.fail_on = Some(node_id);

		self
	}

	pub fn owner_calls(&self) -> usize {
		self.owner_calls.load(Ordering::SeqCst)
	}

	pub fn reader_calls(&self) -> usize {
		self.reader_calls.load(Ordering::SeqCst)
	}

	fn check_failure(&self, node: &CandidateNode) -> eyre::Result<()> {
		if self.fail_on == Some(node.node_id()) {
			return Err(eyre::eyre!("ACL store unavailable for node {}.", node.node_id()));
		}

		Ok(())
	}
}
impl PermissionOracle for TableOracle {
	fn owner_reads(&self, node: &CandidateNode, _principal: &str) -> eyre::Result<bool> {
		self.owner_calls.fetch_add(1, Ordering::SeqCst);
		self.check_failure(node)?;

		Ok(self.owner_read.contains(&node.node_id()))
	}

	fn readers_of(&self, node: &CandidateNode) -> eyre::Result<HashSet<String>> {
		self.reader_calls.fetch_add(1, Ordering::SeqCst);
		self.check_failure(node)?;

		Ok(self.readers.get(&node.node_id()).cloned().unwrap_or_default())
	}
}

/// A clock that only moves when told to, optionally by a fixed step on every read.
pub struct ManualClock {
	now: Mutex<OffsetDateTime>,
	step: Duration,
}
impl ManualClock {
	pub fn new(start: OffsetDateTime) -> Self {
		Self { now: Mutex::new(start), step: Duration::ZERO }
	}

	pub fn stepping(start: OffsetDateTime, step: Duration) -> Self {
		Self { now: Mutex::new(start), step }
	}

	pub fn advance(&self, by: Duration) {
		let mut now = self.now.lock().unwrap_or_else(|err| err.into_inner());

		*now += by;
	}
}
impl Default for ManualClock {
	fn default() -> Self {
		Self::new(OffsetDateTime::UNIX_EPOCH)
	}
}
impl Clock for ManualClock {
	fn now(&self) -> OffsetDateTime {
		let mut now = self.now.lock().unwrap_or_else(|err| err.into_inner());
		let current = *now;

		*now = current + self.step;

		current
	}
}

/// Serves rows from memory and records how the engine drove it.
pub struct VecSource {
	rows: Vec<CandidateRow>,
	fail_at: Option<usize>,
	ignore_halt: bool,
	delivered: usize,
	halts: usize,
	scans: usize,
}
impl VecSource {
	pub fn new(rows: Vec<CandidateRow>) -> Self {
		Self { rows, fail_at: None, ignore_halt: false, delivered: 0, halts: 0, scans: 0 }
	}

	/// Fails instead of fetching the row at `index`.
	pub fn failing_at(mut self, index: usize) -> Self {
		self.fail_at = Some(index);

		self
	}

	/// Keeps delivering rows after a halt, like a misbehaving driver.
	pub fn ignoring_halt(mut self) -> Self {
		self.ignore_halt = true;

		self
	}

	/// Rows handed to the callback across all scans.
	pub fn delivered(&self) -> usize {
		self.delivered
	}

	pub fn halts(&self) -> usize {
		self.halts
	}

	pub fn scans(&self) -> usize {
		self.scans
	}
}
impl CandidateSource for VecSource {
	fn scan(&mut self, handler: &mut dyn RowHandler) -> eyre::Result<()> {
		self.scans += 1;

		for (index, row) in self.rows.iter().enumerate() {
			if self.fail_at == Some(index) {
				return Err(eyre::eyre!("Cursor fetch failed at row {index}."));
			}

			let mut control = HaltFlag::default();

			handler.on_row(row.clone(), &mut control);

			self.delivered += 1;
			self.halts += control.calls;

			if control.calls > 0 && !self.ignore_halt {
				break;
			}
		}

		Ok(())
	}
}

#[derive(Default)]
struct HaltFlag {
	calls: usize,
}
impl CursorControl for HaltFlag {
	fn halt(&mut self) {
		self.calls += 1;
	}
}
