//! Reconciliation of freshly fetched graph data into the live graph.
//!
//! A refresh must reflect the current server-side view exactly (additions,
//! updates and deletions all propagate) without disturbing what the user
//! already sees: a node that survives a merge keeps its object identity,
//! its simulated position and its pin. Links carry no render-owned state
//! and are simply replaced each time.

use std::collections::HashSet;

use log::{debug, info};

use super::types::{VizGraph, VizLink, VizNode};

impl VizGraph {
	/// Merge a freshly flattened snapshot into the live graph, in place.
	///
	/// Existing nodes are updated field-by-field except for position and
	/// pin; new nodes arrive unpositioned for the simulation to place;
	/// nodes absent from the snapshot are removed together with every
	/// link touching them. Per-node neighbor and incident-link lists are
	/// rebuilt at the end; hover highlighting depends on them.
	pub fn merge(&mut self, fresh_nodes: Vec<VizNode>, fresh_links: Vec<VizLink>) {
		let fresh_ids: HashSet<u64> = fresh_nodes.iter().map(|n| n.id).collect();
		let before = self.nodes.len();
		self.nodes.retain(|n| fresh_ids.contains(&n.id));
		let removed = before - self.nodes.len();
		self.rebuild_index();

		let mut added = 0;
		for fresh in fresh_nodes {
			match self.index.get(&fresh.id).copied() {
				Some(i) => {
					let existing = &mut self.nodes[i];
					let (x, y, fx, fy) = (existing.x, existing.y, existing.fx, existing.fy);
					*existing = fresh;
					existing.x = x;
					existing.y = y;
					existing.fx = fx;
					existing.fy = fy;
				}
				None => {
					self.index.insert(fresh.id, self.nodes.len());
					self.nodes.push(fresh);
					added += 1;
				}
			}
		}

		self.links = fresh_links
			.into_iter()
			.filter(|l| {
				let bound = self.index.contains_key(&l.source) && self.index.contains_key(&l.target);
				if !bound {
					debug!("dropping unbound link {} -> {} ({})", l.source, l.target, l.name);
				}
				bound
			})
			.collect();

		self.rebuild_backrefs();
		self.revision += 1;
		info!(
			"lens {}: merged {} nodes ({} new, {} removed), {} links",
			self.lens,
			self.nodes.len(),
			added,
			removed,
			self.links.len()
		);
	}

	/// Throw away all graph data and start over for a new lens.
	pub fn reset(&mut self, lens: &str) {
		self.nodes.clear();
		self.links.clear();
		self.index.clear();
		self.lens = lens.to_string();
		self.revision += 1;
	}

	fn rebuild_index(&mut self) {
		self.index = self
			.nodes
			.iter()
			.enumerate()
			.map(|(i, n)| (n.id, i))
			.collect();
	}

	fn rebuild_backrefs(&mut self) {
		for node in &mut self.nodes {
			node.neighbors.clear();
			node.links.clear();
		}
		for link in self.links.clone() {
			if let Some(a) = self.node_mut(link.source) {
				a.neighbors.push(link.target);
				a.links.push(link.clone());
			}
			if link.target != link.source {
				if let Some(b) = self.node_mut(link.target) {
					b.neighbors.push(link.source);
					b.links.push(link.clone());
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn viz_node(id: u64, risk_score: u64) -> VizNode {
		VizNode {
			id,
			node_key: format!("key-{}", id),
			node_type: "Process".to_string(),
			node_label: "Process".to_string(),
			dgraph_type: vec!["Process".to_string()],
			properties: serde_json::Map::new(),
			risk_score,
			analyzer_names: String::new(),
			x: None,
			y: None,
			fx: None,
			fy: None,
			neighbors: Vec::new(),
			links: Vec::new(),
		}
	}

	fn viz_link(source: u64, target: u64) -> VizLink {
		VizLink {
			source,
			target,
			name: "children".to_string(),
		}
	}

	fn snapshot() -> (Vec<VizNode>, Vec<VizLink>) {
		(
			vec![viz_node(1, 0), viz_node(2, 10), viz_node(3, 75)],
			vec![viz_link(1, 2), viz_link(2, 3)],
		)
	}

	#[test]
	fn merge_is_idempotent() {
		let mut once = VizGraph::new("lens-a");
		let (nodes, links) = snapshot();
		once.merge(nodes, links);

		let mut twice = once.clone();
		let (nodes, links) = snapshot();
		twice.merge(nodes, links);

		assert_eq!(once.nodes, twice.nodes);
		assert_eq!(once.links, twice.links);
		assert_eq!(once.index, twice.index);
	}

	#[test]
	fn merge_preserves_position_and_pin() {
		let mut graph = VizGraph::new("lens-a");
		let (nodes, links) = snapshot();
		graph.merge(nodes, links);

		{
			let pinned = graph.node_mut(2).unwrap();
			pinned.x = Some(120.0);
			pinned.y = Some(-40.0);
			pinned.fx = Some(120.0);
			pinned.fy = Some(-40.0);
		}

		let (mut nodes, links) = snapshot();
		nodes[1].risk_score = 99;
		graph.merge(nodes, links);

		let merged = graph.node(2).unwrap();
		assert_eq!(merged.risk_score, 99);
		assert_eq!((merged.x, merged.y), (Some(120.0), Some(-40.0)));
		assert_eq!((merged.fx, merged.fy), (Some(120.0), Some(-40.0)));
	}

	#[test]
	fn new_nodes_arrive_unpositioned() {
		let mut graph = VizGraph::new("lens-a");
		let (nodes, links) = snapshot();
		graph.merge(nodes, links);

		let (mut nodes, links) = snapshot();
		nodes.push(viz_node(4, 0));
		graph.merge(nodes, links);

		let fresh = graph.node(4).unwrap();
		assert_eq!((fresh.x, fresh.y, fresh.fx, fresh.fy), (None, None, None, None));
	}

	#[test]
	fn deletions_propagate() {
		let mut graph = VizGraph::new("lens-a");
		let (nodes, links) = snapshot();
		graph.merge(nodes, links);

		graph.merge(vec![viz_node(1, 0), viz_node(2, 10)], vec![viz_link(1, 2)]);

		assert!(graph.node(3).is_none());
		assert!(!graph.index.contains_key(&3));
		assert!(graph.links.iter().all(|l| !l.touches(3)));
		let ids: Vec<u64> = graph.nodes.iter().map(|n| n.id).collect();
		assert_eq!(ids, vec![1, 2]);
	}

	#[test]
	fn unbound_links_are_dropped() {
		let mut graph = VizGraph::new("lens-a");
		graph.merge(
			vec![viz_node(1, 0), viz_node(2, 0)],
			vec![viz_link(1, 2), viz_link(2, 9)],
		);
		assert_eq!(graph.links, vec![viz_link(1, 2)]);
	}

	#[test]
	fn backrefs_cover_both_endpoints() {
		let mut graph = VizGraph::new("lens-a");
		let (nodes, links) = snapshot();
		graph.merge(nodes, links);

		let middle = graph.node(2).unwrap();
		assert_eq!(middle.neighbors, vec![1, 3]);
		assert_eq!(middle.links, vec![viz_link(1, 2), viz_link(2, 3)]);

		let end = graph.node(3).unwrap();
		assert_eq!(end.neighbors, vec![2]);
		assert_eq!(end.links, vec![viz_link(2, 3)]);
	}

	#[test]
	fn reset_clears_everything_for_the_new_lens() {
		let mut graph = VizGraph::new("lens-a");
		let (nodes, links) = snapshot();
		graph.merge(nodes, links);
		let revision = graph.revision;

		graph.reset("lens-b");

		assert_eq!(graph.lens, "lens-b");
		assert!(graph.nodes.is_empty());
		assert!(graph.links.is_empty());
		assert!(graph.index.is_empty());
		assert!(graph.revision > revision);
	}
}
