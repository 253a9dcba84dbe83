//! Color and label derivation for nodes and links.
//!
//! Node styling dispatches on the primary type tag through a lookup table,
//! so supporting a new entity type is one new row. Risk severity maps onto
//! a monotonic color ramp shared by node rings, link tinting and particle
//! sizing.

use super::types::{VizGraph, VizLink};

/// RGBA color representation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
	pub r: u8,
	pub g: u8,
	pub b: u8,
	pub a: f64,
}

impl Color {
	pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
		Self { r, g, b, a: 1.0 }
	}

	pub const fn rgba(r: u8, g: u8, b: u8, a: f64) -> Self {
		Self { r, g, b, a }
	}

	/// Darken the color by a factor (0.0 = unchanged, 1.0 = black)
	pub fn darken(self, factor: f64) -> Self {
		let f = 1.0 - factor.clamp(0.0, 1.0);
		Self {
			r: (self.r as f64 * f) as u8,
			g: (self.g as f64 * f) as u8,
			b: (self.b as f64 * f) as u8,
			a: self.a,
		}
	}

	pub fn to_css(self) -> String {
		if (self.a - 1.0).abs() < 0.001 {
			format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
		} else {
			format!("rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
		}
	}
}

/// Ring colors from no risk up to critical, in severity order.
const RISK_RAMP: [Color; 5] = [
	Color::rgb(120, 135, 150), // none: slate gray
	Color::rgb(86, 170, 108),  // low: green
	Color::rgb(214, 181, 64),  // elevated: yellow
	Color::rgb(224, 135, 57),  // high: orange
	Color::rgb(229, 15, 4),    // critical: red
];

/// Fill colors by primary type tag.
const NODE_FILL: &[(&str, Color)] = &[
	("Asset", Color::rgb(94, 129, 172)),
	("Process", Color::rgb(100, 148, 160)),
	("File", Color::rgb(180, 136, 100)),
	("IpAddress", Color::rgb(130, 120, 150)),
	("IpPort", Color::rgb(120, 130, 160)),
	("IpConnection", Color::rgb(85, 135, 155)),
	("NetworkConnection", Color::rgb(75, 115, 135)),
	("ProcessInboundConnection", Color::rgb(119, 158, 165)),
	("ProcessOutboundConnection", Color::rgb(143, 163, 180)),
	("Lens", Color::rgb(136, 160, 175)),
];

const DEFAULT_FILL: Color = Color::rgb(128, 128, 128);

/// Base link colors, picked per edge name when neither endpoint carries risk.
const LINK_PALETTE: [Color; 6] = [
	Color::rgb(140, 160, 180),
	Color::rgb(119, 158, 165),
	Color::rgb(160, 130, 110),
	Color::rgb(130, 120, 150),
	Color::rgb(100, 148, 160),
	Color::rgb(143, 163, 180),
];

/// Display names for well-known edge fields. Anything else falls back to
/// the field name with underscores spaced out.
const EDGE_LABELS: &[(&str, &str)] = &[
	("children", "spawned"),
	("asset_processes", "running process"),
	("files_on_asset", "file on asset"),
	("created_files", "created file"),
	("wrote_files", "wrote file"),
	("read_files", "read file"),
	("deleted_files", "deleted file"),
	("bin_file", "binary"),
	("created_connections", "created connection"),
	("inbound_connections", "inbound connection"),
];

/// Severity tier of a risk score, 0 (none) through 4 (critical).
/// Monotonic in the score.
pub fn risk_severity(score: u64) -> usize {
	match score {
		0 => 0,
		1..=24 => 1,
		25..=49 => 2,
		50..=74 => 3,
		_ => 4,
	}
}

/// Ring color for a node's aggregated risk score.
pub fn risk_outline(score: u64) -> Color {
	RISK_RAMP[risk_severity(score)]
}

/// Fill color for a node's primary type tag.
pub fn node_fill_color(node_type: &str) -> Color {
	NODE_FILL
		.iter()
		.find(|(tag, _)| *tag == node_type)
		.map(|&(_, color)| color)
		.unwrap_or(DEFAULT_FILL)
}

/// The higher aggregated risk score of a link's two endpoints.
pub fn link_risk(link: &VizLink, graph: &VizGraph) -> u64 {
	let endpoint_risk = |uid| graph.node(uid).map(|n| n.risk_score).unwrap_or(0);
	endpoint_risk(link.source).max(endpoint_risk(link.target))
}

/// Base color for a link, derived from its edge name and its endpoints'
/// aggregated risk: a risky endpoint tints the link with the (darkened)
/// ramp color of the riskier side; otherwise the edge name selects a
/// palette color so distinct relationships stay tellable apart.
pub fn calc_link_color(link: &VizLink, graph: &VizGraph) -> Color {
	let risk = link_risk(link, graph);
	if risk > 0 {
		risk_outline(risk).darken(0.25)
	} else {
		link_base_color(&link.name)
	}
}

fn link_base_color(name: &str) -> Color {
	let sum: usize = name.bytes().map(usize::from).sum();
	LINK_PALETTE[sum % LINK_PALETTE.len()]
}

/// Human-readable label for an edge field name.
pub fn map_edge_label(name: &str) -> String {
	EDGE_LABELS
		.iter()
		.find(|(edge, _)| *edge == name)
		.map(|&(_, label)| label.to_string())
		.unwrap_or_else(|| name.replace('_', " "))
}
