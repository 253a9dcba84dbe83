//! Flattening of hierarchical query results into a node/link graph.
//!
//! A lens query returns a forest of nested records: every entity appears
//! once at the root level with its full attribute set, and again nested
//! under each entity that points at it. Flattening deduplicates by `uid`,
//! aggregates each record's `risks` edge into a score and analyzer list on
//! the owning node, and emits one link per traversed non-risk edge.

use std::collections::HashMap;

use log::warn;
use serde_json::Value;

use super::types::{RawNode, RiskEntry, VizLink, VizNode};

/// Edge field holding risk findings; aggregated, never linked.
const RISKS_EDGE: &str = "risks";

/// Flatten a query result forest into deduplicated nodes and links.
///
/// Nodes come out in first-seen order, links in traversal order. Roots are
/// materialized before any edge is walked, so the root-level appearance of
/// an entity (the one carrying its full attribute set) is the one that
/// determines its scalars and risk aggregates; nested re-appearances never
/// overwrite. Records without a `uid` are skipped with a warning instead
/// of failing the pass.
pub fn flatten(roots: &[RawNode]) -> (Vec<VizNode>, Vec<VizLink>) {
	let mut pass = Flattening::default();
	for root in roots {
		pass.insert_node(root);
	}
	for root in roots {
		pass.visit_edges(root);
	}
	(pass.nodes, pass.links)
}

#[derive(Default)]
struct Flattening {
	index: HashMap<u64, usize>,
	nodes: Vec<VizNode>,
	links: Vec<VizLink>,
}

impl Flattening {
	/// Materialize a record as a node unless its `uid` is already known.
	/// Returns the uid, or `None` for a record that has none.
	fn insert_node(&mut self, raw: &RawNode) -> Option<u64> {
		let Some(uid) = raw.uid else {
			warn!("skipping record without uid (node_key {:?})", raw.node_key);
			return None;
		};
		if self.index.contains_key(&uid) {
			return Some(uid);
		}

		let node_type = raw
			.dgraph_type
			.first()
			.cloned()
			.unwrap_or_else(|| "Unknown".to_string());
		let node_label = raw
			.display
			.clone()
			.filter(|d| !d.is_empty())
			.unwrap_or_else(|| node_type.clone());

		let mut properties = serde_json::Map::new();
		let mut risk_score = 0;
		let mut analyzer_names = Vec::new();
		for (name, value) in &raw.fields {
			match value {
				Value::Array(entries) if name == RISKS_EDGE => {
					for entry in entries {
						match serde_json::from_value::<RiskEntry>(entry.clone()) {
							Ok(risk) => {
								risk_score += risk.risk_score;
								if let Some(analyzer) = risk.analyzer_name {
									analyzer_names.push(analyzer);
								}
							}
							Err(e) => warn!("skipping undecodable risk entry on uid {}: {}", uid, e),
						}
					}
				}
				// Non-risk edges are walked by visit_edges; scalars
				// (nulls included) ride along as properties.
				Value::Array(_) => {}
				_ => {
					properties.insert(name.clone(), value.clone());
				}
			}
		}

		self.index.insert(uid, self.nodes.len());
		self.nodes.push(VizNode {
			id: uid,
			node_key: raw.node_key.clone().unwrap_or_default(),
			node_type,
			node_label,
			dgraph_type: raw.dgraph_type.clone(),
			properties,
			risk_score,
			analyzer_names: analyzer_names.join(", "),
			x: None,
			y: None,
			fx: None,
			fy: None,
			neighbors: Vec::new(),
			links: Vec::new(),
		});
		Some(uid)
	}

	/// Walk every non-risk edge field of a record, inserting nested nodes
	/// on first sight and appending one link per traversal.
	fn visit_edges(&mut self, raw: &RawNode) {
		let Some(uid) = raw.uid else {
			return;
		};
		for (name, value) in &raw.fields {
			if name == RISKS_EDGE {
				continue;
			}
			let Value::Array(entries) = value else {
				continue;
			};
			for entry in entries {
				let nested = match serde_json::from_value::<RawNode>(entry.clone()) {
					Ok(nested) => nested,
					Err(e) => {
						warn!("skipping undecodable {} entry under uid {}: {}", name, uid, e);
						continue;
					}
				};
				let Some(nested_uid) = self.insert_node(&nested) else {
					continue;
				};
				self.links.push(VizLink {
					source: uid,
					target: nested_uid,
					name: name.clone(),
				});
				self.visit_edges(&nested);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	/// The canonical asset/process forest: an asset running four processes,
	/// two of which spawned children, with risks attached at the root level.
	fn asset_forest() -> Vec<RawNode> {
		let roots = json!([
			{
				"uid": 40,
				"node_key": "53e2abc7-ce21-4be0-b70a-4c835eefecd1",
				"dgraph_type": ["Asset"],
				"display": "Asset",
				"hostname": "DESKTOP-FVSHABR",
				"asset_ip": null,
				"asset_processes": [
					{"uid": 171, "node_key": "9388ceda", "dgraph_type": ["Process"], "display": null, "process_name": "dropper.exe", "process_id": 4164},
					{"uid": 193, "node_key": "a9ca278c", "dgraph_type": ["Process"], "display": null, "process_name": "cmd.exe", "process_id": 5824},
					{"uid": 201, "node_key": "a0c5dacc", "dgraph_type": ["Process"], "display": null, "process_name": "cmd.exe", "process_id": 5824},
					{"uid": 207, "node_key": "739c609a", "dgraph_type": ["Process"], "display": null, "process_name": "svchost.exe", "process_id": 6132}
				],
				"files_on_asset": null,
				"risks": [
					{"uid": 213, "dgraph_type": ["Risk"], "node_key": "Rare Parent of cmd.exe", "analyzer_name": "Rare Parent of cmd.exe", "risk_score": 10},
					{"uid": 220, "dgraph_type": ["Risk"], "node_key": "Suspicious svchost", "analyzer_name": "Suspicious svchost", "risk_score": 75}
				]
			},
			{
				"uid": 171,
				"node_key": "9388ceda",
				"dgraph_type": ["Process"],
				"display": "Process",
				"process_name": "dropper.exe",
				"process_id": 4164,
				"children": [
					{"uid": 201, "node_key": "a0c5dacc", "dgraph_type": ["Process"], "display": null, "process_name": "cmd.exe", "process_id": 5824}
				],
				"risks": [
					{"uid": 213, "dgraph_type": ["Risk"], "node_key": "Rare Parent of cmd.exe", "analyzer_name": "Rare Parent of cmd.exe", "risk_score": 10}
				]
			},
			{
				"uid": 193,
				"node_key": "a9ca278c",
				"dgraph_type": ["Process"],
				"display": "Process",
				"process_name": "cmd.exe",
				"process_id": 5824,
				"children": [
					{"uid": 207, "node_key": "739c609a", "dgraph_type": ["Process"], "display": null, "process_name": "svchost.exe", "process_id": 6132}
				],
				"risks": [
					{"uid": 220, "dgraph_type": ["Risk"], "node_key": "Suspicious svchost", "analyzer_name": "Suspicious svchost", "risk_score": 75}
				]
			},
			{
				"uid": 201,
				"node_key": "a0c5dacc",
				"dgraph_type": ["Process"],
				"display": "Process",
				"process_name": "cmd.exe",
				"process_id": 5824,
				"children": null,
				"risks": [
					{"uid": 213, "dgraph_type": ["Risk"], "node_key": "Rare Parent of cmd.exe", "analyzer_name": "Rare Parent of cmd.exe", "risk_score": 10}
				]
			},
			{
				"uid": 207,
				"node_key": "739c609a",
				"dgraph_type": ["Process"],
				"display": "Process",
				"process_name": "svchost.exe",
				"process_id": 6132,
				"children": null,
				"risks": null
			}
		]);
		serde_json::from_value(roots).unwrap()
	}

	fn node<'a>(nodes: &'a [VizNode], uid: u64) -> &'a VizNode {
		nodes.iter().find(|n| n.id == uid).unwrap()
	}

	#[test]
	fn aggregates_risks_onto_owning_nodes() {
		let (nodes, _) = flatten(&asset_forest());

		let asset = node(&nodes, 40);
		assert_eq!(asset.risk_score, 85);
		assert_eq!(
			asset.analyzer_names,
			"Rare Parent of cmd.exe, Suspicious svchost"
		);

		assert_eq!(node(&nodes, 171).risk_score, 10);
		assert_eq!(node(&nodes, 171).analyzer_names, "Rare Parent of cmd.exe");
		assert_eq!(node(&nodes, 193).risk_score, 75);
		assert_eq!(node(&nodes, 193).analyzer_names, "Suspicious svchost");
		assert_eq!(node(&nodes, 201).risk_score, 10);

		let leaf = node(&nodes, 207);
		assert_eq!(leaf.risk_score, 0);
		assert_eq!(leaf.analyzer_names, "");
	}

	#[test]
	fn risks_never_become_nodes_or_links() {
		let (nodes, links) = flatten(&asset_forest());
		let ids: Vec<u64> = nodes.iter().map(|n| n.id).collect();
		assert_eq!(ids, vec![40, 171, 193, 201, 207]);
		assert!(nodes.iter().all(|n| n.node_type != "Risk"));
		assert!(links.iter().all(|l| l.name != "risks"));
	}

	#[test]
	fn derives_one_link_per_edge_traversal() {
		let (_, links) = flatten(&asset_forest());
		let expect = |source, name: &str, target| VizLink {
			source,
			target,
			name: name.to_string(),
		};
		assert_eq!(
			links,
			vec![
				expect(40, "asset_processes", 171),
				expect(40, "asset_processes", 193),
				expect(40, "asset_processes", 201),
				expect(40, "asset_processes", 207),
				expect(171, "children", 201),
				expect(193, "children", 207),
			]
		);
	}

	#[test]
	fn copies_scalars_and_keeps_labels() {
		let (nodes, _) = flatten(&asset_forest());
		let asset = node(&nodes, 40);
		assert_eq!(asset.node_type, "Asset");
		assert_eq!(asset.node_label, "Asset");
		assert_eq!(asset.properties["hostname"], json!("DESKTOP-FVSHABR"));
		// Null-valued fields ride along; consumed edge arrays do not.
		assert_eq!(asset.properties["asset_ip"], json!(null));
		assert!(!asset.properties.contains_key("asset_processes"));
		assert!(!asset.properties.contains_key("risks"));
	}

	#[test]
	fn label_falls_back_to_primary_type() {
		let roots: Vec<RawNode> = serde_json::from_value(json!([
			{"uid": 1, "node_key": "k", "dgraph_type": ["Process"]}
		]))
		.unwrap();
		let (nodes, _) = flatten(&roots);
		assert_eq!(nodes[0].node_label, "Process");
		assert_eq!(nodes[0].node_type, "Process");
	}

	#[test]
	fn record_without_uid_is_skipped_not_fatal() {
		let roots: Vec<RawNode> = serde_json::from_value(json!([
			{"node_key": "orphan", "dgraph_type": ["Process"]},
			{"uid": 7, "node_key": "kept", "dgraph_type": ["Asset"],
			 "asset_processes": [
				{"node_key": "nested-orphan", "dgraph_type": ["Process"]},
				{"uid": 9, "node_key": "nested-kept", "dgraph_type": ["Process"]}
			]}
		]))
		.unwrap();
		let (nodes, links) = flatten(&roots);
		let ids: Vec<u64> = nodes.iter().map(|n| n.id).collect();
		assert_eq!(ids, vec![7, 9]);
		assert_eq!(links.len(), 1);
		assert_eq!((links[0].source, links[0].target), (7, 9));
	}

	#[test]
	fn first_seen_record_wins() {
		let roots: Vec<RawNode> = serde_json::from_value(json!([
			{"uid": 1, "node_key": "first", "dgraph_type": ["Asset"], "hostname": "a",
			 "risks": [{"analyzer_name": "Seen", "risk_score": 5}]},
			{"uid": 1, "node_key": "second", "dgraph_type": ["File"], "hostname": "b"}
		]))
		.unwrap();
		let (nodes, _) = flatten(&roots);
		assert_eq!(nodes.len(), 1);
		assert_eq!(nodes[0].node_key, "first");
		assert_eq!(nodes[0].node_type, "Asset");
		assert_eq!(nodes[0].risk_score, 5);
	}

	#[test]
	fn missing_type_tags_fall_back_to_unknown() {
		let roots: Vec<RawNode> =
			serde_json::from_value(json!([{"uid": 3, "node_key": "k"}])).unwrap();
		let (nodes, _) = flatten(&roots);
		assert_eq!(nodes[0].node_type, "Unknown");
	}
}
