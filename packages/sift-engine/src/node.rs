use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A row as delivered by a candidate source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CandidateRow {
	pub node_id: i64,
	pub uuid: Uuid,
	#[serde(default)]
	pub owner: Option<String>,
	#[serde(default)]
	pub acl_id: Option<i64>,
}

/// A candidate materialized by the cursor adapter. Never mutated once read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateNode {
	position: usize,
	node_id: i64,
	uuid: Uuid,
	owner: Option<String>,
	acl_id: Option<i64>,
}
impl CandidateNode {
	/// `position` is the row's arrival ordinal within one scan.
	pub fn from_row(position: usize, row: CandidateRow) -> Self {
		let CandidateRow { node_id, uuid, owner, acl_id } = row;

		Self { position, node_id, uuid, owner, acl_id }
	}

	pub fn position(&self) -> usize {
		self.position
	}

	pub fn node_id(&self) -> i64 {
		self.node_id
	}

	pub fn uuid(&self) -> Uuid {
		self.uuid
	}

	pub fn owner(&self) -> Option<&str> {
		self.owner.as_deref()
	}

	pub fn acl_id(&self) -> Option<i64> {
		self.acl_id
	}
}
