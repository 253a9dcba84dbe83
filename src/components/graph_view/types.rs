//! Graph data structures: the raw hierarchical query result and the
//! flattened node/link form consumed by the renderer.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Map, Value};

/// One record of a hierarchical lens query result.
///
/// Identity fields are declared; everything else lands in [`RawNode::fields`],
/// where an array-of-objects value is an edge to nested records and any other
/// value is a scalar attribute. `uid` is unique within one fetch; `node_key`
/// is the stable identity across fetches.
#[derive(Clone, Debug, Deserialize)]
pub struct RawNode {
	/// Numeric identity within a single query result. A record without one
	/// is malformed and gets skipped during flattening.
	#[serde(default)]
	pub uid: Option<u64>,
	/// Stable identity across refetches.
	#[serde(default)]
	pub node_key: Option<String>,
	/// Type tags, most specific first.
	#[serde(default)]
	pub dgraph_type: Vec<String>,
	/// Optional display name.
	#[serde(default)]
	pub display: Option<String>,
	/// Remaining scalar attributes and edge fields, in document order.
	#[serde(flatten)]
	pub fields: Map<String, Value>,
}

/// A risk finding attached to a node via its `risks` edge. Aggregated onto
/// the owning node during flattening, never materialized as a node.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RiskEntry {
	/// Name of the analyzer that produced the finding.
	#[serde(default)]
	pub analyzer_name: Option<String>,
	/// Severity score.
	#[serde(default)]
	pub risk_score: u64,
}

/// A flattened, renderable node.
///
/// `x`/`y` are owned by the layout simulation and `fx`/`fy` by drag/click
/// handling; merges never touch them, so a node keeps its on-screen place
/// across refreshes.
#[derive(Clone, Debug, PartialEq)]
pub struct VizNode {
	/// Identity, equal to the source record's `uid`.
	pub id: u64,
	/// Stable cross-fetch identity.
	pub node_key: String,
	/// Primary type tag, `"Unknown"` when the record carried none.
	pub node_type: String,
	/// Label drawn on the canvas; falls back to the primary type.
	pub node_label: String,
	/// All type tags.
	pub dgraph_type: Vec<String>,
	/// Scalar attributes carried over from the raw record.
	pub properties: Map<String, Value>,
	/// Sum of the scores of the node's direct risk findings.
	pub risk_score: u64,
	/// ", "-joined analyzer names of those findings.
	pub analyzer_names: String,
	/// Simulation position.
	pub x: Option<f64>,
	/// Simulation position.
	pub y: Option<f64>,
	/// Pinned coordinate; `Some` keeps the simulation from moving the node.
	pub fx: Option<f64>,
	/// Pinned coordinate.
	pub fy: Option<f64>,
	/// Ids of nodes connected by any link. Rebuilt on every merge.
	pub neighbors: Vec<u64>,
	/// Links touching this node. Rebuilt on every merge.
	pub links: Vec<VizLink>,
}

impl VizNode {
	/// Whether the node is pinned to a fixed position.
	pub fn is_pinned(&self) -> bool {
		self.fx.is_some() || self.fy.is_some()
	}
}

/// A directed link between two flattened nodes, tagged with the edge field
/// it came from. Two links between the same pair with different names are
/// distinct.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct VizLink {
	/// Id of the parent node.
	pub source: u64,
	/// Id of the nested node.
	pub target: u64,
	/// Originating edge field name.
	pub name: String,
}

impl VizLink {
	/// Whether the link touches the given node.
	pub fn touches(&self, uid: u64) -> bool {
		self.source == uid || self.target == uid
	}
}

/// The live graph for the active lens.
///
/// Created empty when a lens is selected, mutated in place by every
/// refresh merge, discarded when the lens changes. `revision` increases on
/// every mutation the rendering engine needs to observe.
#[derive(Clone, Debug, Default)]
pub struct VizGraph {
	/// Active lens name.
	pub lens: String,
	/// Nodes in first-seen order.
	pub nodes: Vec<VizNode>,
	/// Current link set, replaced wholesale on every merge.
	pub links: Vec<VizLink>,
	/// Node id to position in `nodes`. Always covers exactly the same id
	/// set as `nodes`.
	pub index: HashMap<u64, usize>,
	/// Bumped by merges, resets and pin changes.
	pub revision: u64,
}

impl VizGraph {
	/// Create an empty graph for a lens.
	pub fn new(lens: impl Into<String>) -> Self {
		Self {
			lens: lens.into(),
			..Self::default()
		}
	}

	/// Look up a node by id.
	pub fn node(&self, uid: u64) -> Option<&VizNode> {
		self.index.get(&uid).map(|&i| &self.nodes[i])
	}

	/// Look up a node by id, mutably.
	pub fn node_mut(&mut self, uid: u64) -> Option<&mut VizNode> {
		let i = *self.index.get(&uid)?;
		Some(&mut self.nodes[i])
	}

	/// Mark the graph changed so the rendering engine resynchronizes its
	/// simulation state.
	pub fn touch(&mut self) {
		self.revision += 1;
	}
}
