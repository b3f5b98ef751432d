use std::{
	collections::{HashMap, HashSet},
	fs,
	path::{Path, PathBuf},
	sync::Arc,
	time::Instant,
};

use clap::Parser;
use color_eyre::eyre;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use sift_config::Config;
use sift_engine::{
	AuthorityContext, CandidateNode, CandidateRow, CandidateSource, Collaborators, CursorControl,
	PermissionOracle, Principal, QueryOptionsRequest, RowHandler, SelectionEngine, StopReason,
};

#[derive(Debug, Parser)]
#[command(version, rename_all = "kebab")]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	#[arg(long, short = 'd', value_name = "FILE")]
	pub dataset: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct EvalDataset {
	pub name: Option<String>,
	#[serde(default)]
	pub principal: DatasetPrincipal,
	pub candidates: Vec<DatasetCandidate>,
	pub queries: Vec<EvalQuery>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DatasetPrincipal {
	#[default]
	Anonymous,
	System,
	Named {
		name: String,
	},
}
impl DatasetPrincipal {
	fn resolve(&self) -> Option<Principal> {
		match self {
			Self::Anonymous => None,
			Self::System => Some(Principal::System),
			Self::Named { name } => Some(Principal::named(name.clone())),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatasetCandidate {
	#[serde(flatten)]
	pub row: CandidateRow,
	#[serde(default)]
	pub readers: Vec<String>,
	#[serde(default)]
	pub owner_read: bool,
}

#[derive(Debug, Deserialize)]
pub struct EvalQuery {
	pub id: Option<String>,
	pub principal: Option<DatasetPrincipal>,
	#[serde(default)]
	pub options: QueryOptionsRequest,
	pub expected_node_ids: Option<Vec<i64>>,
}

#[derive(Debug, Serialize)]
pub struct EvalOutput {
	pub dataset: EvalDatasetInfo,
	pub settings: EvalSettings,
	pub summary: EvalSummary,
	pub queries: Vec<QueryReport>,
}

#[derive(Debug, Serialize)]
pub struct EvalDatasetInfo {
	pub name: Option<String>,
	pub candidates: usize,
	pub queries: usize,
}

#[derive(Debug, Serialize)]
pub struct EvalSettings {
	pub max_permission_checks: u64,
	pub max_permission_check_time_ms: u64,
	pub cache_readers_by_acl: bool,
}

#[derive(Debug, Default, Serialize)]
pub struct EvalSummary {
	pub with_expectations: usize,
	pub matched_expectations: usize,
	pub budget_limited: usize,
	pub failed: usize,
}

#[derive(Debug, Serialize)]
pub struct QueryReport {
	pub id: String,
	pub node_ids: Vec<i64>,
	pub stop_reason: Option<StopReason>,
	pub has_more_items: bool,
	pub accessible_found: usize,
	pub candidates_scanned: usize,
	pub checks_performed: u64,
	pub expected_node_ids: Option<Vec<i64>>,
	pub matches_expected: Option<bool>,
	pub error: Option<String>,
	pub elapsed_ms: f64,
}

struct FixedAuthority(Option<Principal>);
impl AuthorityContext for FixedAuthority {
	fn current_principal(&self) -> Option<Principal> {
		self.0.clone()
	}
}

/// Answers permission questions from the dataset's candidate annotations.
struct DatasetOracle {
	readers: HashMap<i64, HashSet<String>>,
	owner_read: HashSet<i64>,
}
impl DatasetOracle {
	fn new(candidates: &[DatasetCandidate]) -> Self {
		let readers = candidates
			.iter()
			.map(|candidate| (candidate.row.node_id, candidate.readers.iter().cloned().collect()))
			.collect();
		let owner_read = candidates
			.iter()
			.filter(|candidate| candidate.owner_read)
			.map(|candidate| candidate.row.node_id)
			.collect();

		Self { readers, owner_read }
	}
}
impl PermissionOracle for DatasetOracle {
	fn owner_reads(&self, node: &CandidateNode, _principal: &str) -> eyre::Result<bool> {
		Ok(self.owner_read.contains(&node.node_id()))
	}

	fn readers_of(&self, node: &CandidateNode) -> eyre::Result<HashSet<String>> {
		self.readers
			.get(&node.node_id())
			.cloned()
			.ok_or_else(|| eyre::eyre!("Node {} is not in the dataset.", node.node_id()))
	}
}

struct DatasetSource<'a> {
	candidates: &'a [DatasetCandidate],
}
impl CandidateSource for DatasetSource<'_> {
	fn scan(&mut self, handler: &mut dyn RowHandler) -> eyre::Result<()> {
		let mut halt = Halt(false);

		for candidate in self.candidates {
			handler.on_row(candidate.row.clone(), &mut halt);

			if halt.0 {
				break;
			}
		}

		Ok(())
	}
}

struct Halt(bool);
impl CursorControl for Halt {
	fn halt(&mut self) {
		self.0 = true;
	}
}

pub fn run(args: Args) -> color_eyre::Result<()> {
	let config = sift_config::load(&args.config)?;
	let filter = EnvFilter::new(config.service.log_level.clone());

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

	let dataset = load_dataset(&args.dataset)?;
	let output = evaluate(&config, &dataset);
	let json = serde_json::to_string_pretty(&output)?;

	println!("{json}");

	Ok(())
}

pub fn load_dataset(path: &Path) -> color_eyre::Result<EvalDataset> {
	let raw = fs::read_to_string(path)?;
	let dataset: EvalDataset = serde_json::from_str(&raw)?;

	validate_dataset(&dataset)?;

	Ok(dataset)
}

pub fn validate_dataset(dataset: &EvalDataset) -> color_eyre::Result<()> {
	if dataset.queries.is_empty() {
		return Err(eyre::eyre!("Dataset must include at least one query."));
	}

	let mut seen = HashSet::with_capacity(dataset.candidates.len());

	for candidate in &dataset.candidates {
		if !seen.insert(candidate.row.node_id) {
			return Err(eyre::eyre!("Duplicate candidate node_id {}.", candidate.row.node_id));
		}
	}

	Ok(())
}

/// Runs every query; per-query failures are reported rather than aborting the run.
pub fn evaluate(cfg: &Config, dataset: &EvalDataset) -> EvalOutput {
	let oracle = Arc::new(DatasetOracle::new(&dataset.candidates));
	let mut summary = EvalSummary::default();
	let mut reports = Vec::with_capacity(dataset.queries.len());

	for (index, query) in dataset.queries.iter().enumerate() {
		let id = query.id.clone().unwrap_or_else(|| format!("q{}", index + 1));
		let principal = query.principal.as_ref().unwrap_or(&dataset.principal).resolve();
		let engine = SelectionEngine::new(
			cfg.selection.clone(),
			Collaborators::new(Arc::new(FixedAuthority(principal)), oracle.clone()),
		);
		let mut source = DatasetSource { candidates: &dataset.candidates };
		let started = Instant::now();
		let outcome = engine.select(&query.options, &mut source);
		let elapsed_ms = started.elapsed().as_secs_f64() * 1_000.0;
		let report = match outcome {
			Ok(set) => {
				let node_ids = set.node_ids();
				let matches_expected =
					query.expected_node_ids.as_ref().map(|expected| expected == &node_ids);

				if set.is_budget_limited() {
					summary.budget_limited += 1;
				}

				QueryReport {
					id,
					node_ids,
					stop_reason: Some(set.stop_reason()),
					has_more_items: set.has_more_items(),
					accessible_found: set.accessible_found(),
					candidates_scanned: set.candidates_scanned(),
					checks_performed: set.checks_performed(),
					expected_node_ids: query.expected_node_ids.clone(),
					matches_expected,
					error: None,
					elapsed_ms,
				}
			},
			Err(err) => {
				tracing::warn!(query_id = %id, error = %err, "Query failed.");

				summary.failed += 1;

				QueryReport {
					id,
					node_ids: Vec::new(),
					stop_reason: None,
					has_more_items: false,
					accessible_found: 0,
					candidates_scanned: 0,
					checks_performed: 0,
					expected_node_ids: query.expected_node_ids.clone(),
					matches_expected: query.expected_node_ids.as_ref().map(|_| false),
					error: Some(err.to_string()),
					elapsed_ms,
				}
			},
		};

		if let Some(matched) = report.matches_expected {
			summary.with_expectations += 1;

			if matched {
				summary.matched_expectations += 1;
			}
		}

		reports.push(report);
	}

	EvalOutput {
		dataset: EvalDatasetInfo {
			name: dataset.name.clone(),
			candidates: dataset.candidates.len(),
			queries: dataset.queries.len(),
		},
		settings: EvalSettings {
			max_permission_checks: cfg.selection.max_permission_checks,
			max_permission_check_time_ms: cfg.selection.max_permission_check_time_ms,
			cache_readers_by_acl: cfg.selection.cache_readers_by_acl,
		},
		summary,
		queries: reports,
	}
}
