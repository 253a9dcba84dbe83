//! Hover and click highlight state.
//!
//! Highlight sets are values rebuilt from scratch on every pointer event,
//! never patched incrementally, so a missed "clear" can't leave ghost
//! highlights behind. The neighbor and incident-link lists they are built
//! from are maintained by the merge (see `store`).

use std::collections::HashSet;

use super::types::{VizGraph, VizLink, VizNode};

/// Transient highlight state derived from pointer events. Ephemeral: it is
/// never persisted and survives merges only until the next event.
#[derive(Clone, Debug, Default)]
pub struct HighlightState {
	/// Node currently under the pointer.
	pub hovered: Option<u64>,
	/// Last clicked node; drives the selection emphasis color.
	pub clicked: Option<u64>,
	/// Nodes to emphasize.
	pub nodes: HashSet<u64>,
	/// Links to emphasize.
	pub links: HashSet<VizLink>,
}

impl HighlightState {
	/// Recompute for a node hover: the node itself plus its neighbors, and
	/// every link touching it. `None` (or an id the graph no longer holds)
	/// clears the highlight.
	pub fn hover_node(&mut self, graph: &VizGraph, uid: Option<u64>) {
		self.nodes = HashSet::new();
		self.links = HashSet::new();
		self.hovered = None;

		let Some(node) = uid.and_then(|uid| graph.node(uid)) else {
			return;
		};
		self.hovered = Some(node.id);
		self.nodes.insert(node.id);
		self.nodes.extend(node.neighbors.iter().copied());
		self.links.extend(node.links.iter().cloned());
	}

	/// Recompute for a link hover: both endpoints and the link itself.
	pub fn hover_link(&mut self, link: Option<&VizLink>) {
		self.nodes = HashSet::new();
		self.links = HashSet::new();
		self.hovered = None;

		if let Some(link) = link {
			self.nodes.insert(link.source);
			self.nodes.insert(link.target);
			self.links.insert(link.clone());
		}
	}

	/// Record a click: the node becomes the selection, and its pin is
	/// cleared so the simulation is free to reposition it. Returns a copy
	/// of the node for the host's selection callback.
	pub fn click_node(&mut self, graph: &mut VizGraph, uid: u64) -> Option<VizNode> {
		let node = graph.node_mut(uid)?;
		node.fx = None;
		node.fy = None;
		let clicked = node.clone();
		graph.touch();

		self.clicked = Some(uid);
		self.hovered = Some(uid);
		Some(clicked)
	}

	/// Whether a node is in the current highlight set.
	pub fn node_highlighted(&self, uid: u64) -> bool {
		self.nodes.contains(&uid)
	}

	/// Whether a link is in the current highlight set.
	pub fn link_highlighted(&self, link: &VizLink) -> bool {
		self.links.contains(link)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::graph_view::flatten::flatten;
	use crate::components::graph_view::types::RawNode;
	use serde_json::json;

	/// hub -> spoke-a, hub -> spoke-b, plus an isolated node.
	fn graph() -> VizGraph {
		let roots: Vec<RawNode> = serde_json::from_value(json!([
			{"uid": 1, "node_key": "hub", "dgraph_type": ["Asset"],
			 "asset_processes": [
				{"uid": 2, "node_key": "spoke-a", "dgraph_type": ["Process"]},
				{"uid": 3, "node_key": "spoke-b", "dgraph_type": ["Process"]}
			]},
			{"uid": 9, "node_key": "alone", "dgraph_type": ["File"]}
		]))
		.unwrap();
		let (nodes, links) = flatten(&roots);
		let mut graph = VizGraph::new("lens-a");
		graph.merge(nodes, links);
		graph
	}

	#[test]
	fn hovering_a_node_highlights_it_and_its_neighborhood() {
		let graph = graph();
		let mut hl = HighlightState::default();

		hl.hover_node(&graph, Some(1));

		assert_eq!(hl.hovered, Some(1));
		assert_eq!(hl.nodes, HashSet::from([1, 2, 3]));
		let incident: HashSet<VizLink> = graph.node(1).unwrap().links.iter().cloned().collect();
		assert_eq!(hl.links, incident);
	}

	#[test]
	fn hovering_nothing_clears_the_highlight() {
		let graph = graph();
		let mut hl = HighlightState::default();

		hl.hover_node(&graph, Some(1));
		hl.hover_node(&graph, None);

		assert_eq!(hl.hovered, None);
		assert!(hl.nodes.is_empty());
		assert!(hl.links.is_empty());
	}

	#[test]
	fn isolated_nodes_highlight_alone() {
		let graph = graph();
		let mut hl = HighlightState::default();

		hl.hover_node(&graph, Some(9));

		assert_eq!(hl.nodes, HashSet::from([9]));
		assert!(hl.links.is_empty());
	}

	#[test]
	fn hovering_a_link_highlights_its_endpoints() {
		let graph = graph();
		let mut hl = HighlightState::default();
		let link = graph.links[0].clone();

		hl.hover_link(Some(&link));

		assert_eq!(hl.nodes, HashSet::from([link.source, link.target]));
		assert_eq!(hl.links, HashSet::from([link]));
	}

	#[test]
	fn clicking_selects_and_unpins() {
		let mut graph = graph();
		{
			let node = graph.node_mut(2).unwrap();
			node.x = Some(10.0);
			node.y = Some(20.0);
			node.fx = Some(10.0);
			node.fy = Some(20.0);
		}
		let mut hl = HighlightState::default();

		let selected = hl.click_node(&mut graph, 2).unwrap();

		assert_eq!(selected.id, 2);
		assert_eq!(hl.clicked, Some(2));
		let node = graph.node(2).unwrap();
		assert_eq!((node.fx, node.fy), (None, None));
		// The simulated position itself stays; only the pin is released.
		assert_eq!((node.x, node.y), (Some(10.0), Some(20.0)));
	}

	#[test]
	fn stale_hover_ids_clear_rather_than_panic() {
		let graph = graph();
		let mut hl = HighlightState::default();

		hl.hover_node(&graph, Some(404));

		assert_eq!(hl.hovered, None);
		assert!(hl.nodes.is_empty());
	}
}
