//! The callback surface handed to the rendering engine.
//!
//! Everything the engine needs to draw the graph lives here: node and link
//! painters, color/width functions, paint layering and the pointer-event
//! handlers. The engine itself stays ignorant of entity semantics.
//! Ring color encodes aggregated risk, fill color encodes entity type, and
//! both are overridden by hover/click emphasis.

use std::f64::consts::{FRAC_PI_2, PI, TAU};
use std::rc::Rc;

use web_sys::CanvasRenderingContext2d;

use super::highlight::HighlightState;
use super::style::{calc_link_color, link_risk, map_edge_label, node_fill_color, risk_outline, risk_severity};
use super::types::{VizGraph, VizLink, VizNode};

/// Base node radius in world units.
pub const NODE_RADIUS: f64 = 8.0;
/// Simulation ticks run before the first frame of a fresh layout.
pub const WARMUP_TICKS: u32 = 100;
/// Simulation ticks run after each graph change before the layout freezes.
pub const COOLDOWN_TICKS: u32 = 100;

const HOVER_RING_COLOR: &str = "red";
const CLICK_FILL_COLOR: &str = "magenta";
const HIGHLIGHT_LINK_COLOR: &str = "aliceblue";
const PARTICLE_COLOR: &str = "red";
const DEFAULT_NODE_COLOR: &str = "rgba(255, 255, 255, 0.15)";
const LABEL_BACKGROUND: &str = "rgba(0, 0, 0, 0.8)";

const NODE_FONT_SIZE: f64 = 12.0;
const LINK_REF_FONT_SIZE: f64 = 12.0;
const MAX_LINK_FONT_SIZE: f64 = 8.0;
const LABEL_NODE_MARGIN: f64 = NODE_RADIUS * 1.5;

/// Whether a node's custom painting goes under or over the engine's
/// default circle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaintLayer {
	/// Paint before the default circle (highlighted nodes).
	Before,
	/// Paint after the default circle.
	After,
}

/// Translates graph and highlight state into drawing instructions and
/// routes pointer events back into highlight state and the host.
#[derive(Clone, Default)]
pub struct RenderAdapter {
	on_node_selected: Option<Rc<dyn Fn(Option<&VizNode>)>>,
}

impl RenderAdapter {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register the host callback invoked whenever a node is clicked.
	pub fn on_node_selected(mut self, callback: impl Fn(Option<&VizNode>) + 'static) -> Self {
		self.on_node_selected = Some(Rc::new(callback));
		self
	}

	/// Which layer a node's custom painting belongs to.
	pub fn node_paint_layer(&self, node: &VizNode, highlight: &HighlightState) -> PaintLayer {
		if highlight.node_highlighted(node.id) {
			PaintLayer::Before
		} else {
			PaintLayer::After
		}
	}

	/// Color of the engine's default node circle.
	pub fn node_color(&self) -> &'static str {
		DEFAULT_NODE_COLOR
	}

	/// Paint one node: risk ring, type fill and a centered label with an
	/// opaque background, sized against the current zoom so it stays
	/// legible at any magnification.
	pub fn node_draw(
		&self,
		node: &VizNode,
		ctx: &CanvasRenderingContext2d,
		global_scale: f64,
		highlight: &HighlightState,
	) {
		let (Some(x), Some(y)) = (node.x, node.y) else {
			return;
		};

		// Outer ring: hover override, else the risk ramp.
		ctx.begin_path();
		let _ = ctx.arc(x, y, NODE_RADIUS * 1.4, 0.0, TAU);
		let ring = if highlight.hovered == Some(node.id) {
			HOVER_RING_COLOR.to_string()
		} else {
			risk_outline(node.risk_score).to_css()
		};
		ctx.set_fill_style_str(&ring);
		ctx.fill();

		// Inner fill: click override, else the type table.
		ctx.begin_path();
		let _ = ctx.arc(x, y, NODE_RADIUS * 1.2, 0.0, TAU);
		let fill = if highlight.clicked == Some(node.id) {
			CLICK_FILL_COLOR.to_string()
		} else {
			node_fill_color(&node.node_type).to_css()
		};
		ctx.set_fill_style_str(&fill);
		ctx.fill();

		let font_size = NODE_FONT_SIZE / global_scale;
		ctx.set_font(&format!("{}px Sans-Serif", font_size));
		let text_width = measure_width(ctx, &node.node_label);
		let pad = font_size * 0.2;
		let (w, h) = (text_width + pad, font_size + pad);
		ctx.set_fill_style_str(LABEL_BACKGROUND);
		ctx.fill_rect(x - w / 2.0, y - h / 2.0, w, h);

		ctx.set_text_align("center");
		ctx.set_text_baseline("middle");
		ctx.set_fill_style_str("white");
		let _ = ctx.fill_text(&node.node_label, x, y);
	}

	/// Paint one link's rotated display-name label at its midpoint. The
	/// font is sized to fit the on-screen link length up to a maximum, and
	/// the text flips 180° past ±90° so it never renders upside-down.
	pub fn link_draw(
		&self,
		link: &VizLink,
		ctx: &CanvasRenderingContext2d,
		graph: &VizGraph,
		_highlight: &HighlightState,
	) {
		let (Some(source), Some(target)) = (graph.node(link.source), graph.node(link.target))
		else {
			return;
		};
		let ((Some(x1), Some(y1)), (Some(x2), Some(y2))) =
			((source.x, source.y), (target.x, target.y))
		else {
			return;
		};

		let (dx, dy) = (x2 - x1, y2 - y1);
		let max_text_len = (dx * dx + dy * dy).sqrt() - LABEL_NODE_MARGIN * 2.0;
		if max_text_len <= 0.0 {
			return;
		}

		let label = map_edge_label(&link.name);
		ctx.set_font(&format!("{}px Roboto", LINK_REF_FONT_SIZE));
		let ref_width = measure_width(ctx, &label);
		let font_size = fitted_font_size(max_text_len, ref_width);
		ctx.set_font(&format!("{}px Roboto", font_size));
		let mut text_width = measure_width(ctx, &label);
		text_width += text_width * 0.25;
		let pad = font_size * 0.2;
		let (w, h) = (text_width + pad, font_size + pad);

		ctx.save();
		let _ = ctx.translate(x1 + dx / 2.0, y1 + dy / 2.0);
		let _ = ctx.rotate(label_angle(dx, dy));
		ctx.set_fill_style_str(LABEL_BACKGROUND);
		ctx.fill_rect(-w / 2.0, -h / 2.0, w, h);
		ctx.set_text_align("center");
		ctx.set_text_baseline("middle");
		ctx.set_fill_style_str("lightgrey");
		let _ = ctx.fill_text(&label, 0.0, 0.0);
		ctx.restore();
	}

	/// Link stroke color: highlight override, else risk/name derived.
	pub fn link_color(&self, link: &VizLink, graph: &VizGraph, highlight: &HighlightState) -> String {
		if highlight.link_highlighted(link) {
			HIGHLIGHT_LINK_COLOR.to_string()
		} else {
			calc_link_color(link, graph).to_css()
		}
	}

	/// Link stroke width in world units, wider when highlighted.
	pub fn link_width(&self, link: &VizLink, highlight: &HighlightState) -> f64 {
		if highlight.link_highlighted(link) {
			10.0
		} else {
			7.0
		}
	}

	/// Width of the directional particle: the endpoint risk tier, bumped
	/// further when the link is highlighted.
	pub fn particle_width(&self, link: &VizLink, graph: &VizGraph, highlight: &HighlightState) -> f64 {
		let base = risk_severity(link_risk(link, graph)) as f64;
		if highlight.link_highlighted(link) {
			base + 2.0
		} else {
			base + 1.0
		}
	}

	/// Color of the directional particle.
	pub fn particle_color(&self) -> &'static str {
		PARTICLE_COLOR
	}

	/// A node was clicked: update selection state, release the node's pin
	/// and report it to the host.
	pub fn node_click(&self, graph: &mut VizGraph, highlight: &mut HighlightState, uid: u64) {
		let selected = highlight.click_node(graph, uid);
		if let Some(callback) = &self.on_node_selected {
			callback(selected.as_ref());
		}
	}

	/// A drag ended: pin the node where the user left it so subsequent
	/// merges and simulation ticks don't move it.
	pub fn node_drag_end(&self, graph: &mut VizGraph, uid: u64, x: f64, y: f64) {
		if let Some(node) = graph.node_mut(uid) {
			node.x = Some(x);
			node.y = Some(y);
			node.fx = Some(x);
			node.fy = Some(y);
			graph.touch();
		}
	}
}

/// Midpoint label angle for a link direction, folded into [-90°, 90°] so
/// the text reads left-to-right regardless of link orientation.
fn label_angle(dx: f64, dy: f64) -> f64 {
	let mut angle = dy.atan2(dx);
	if angle > FRAC_PI_2 {
		angle -= PI;
	}
	if angle < -FRAC_PI_2 {
		angle += PI;
	}
	angle
}

/// Font size that fits a label (measured at the reference size) into the
/// available length, capped at the maximum link font size.
fn fitted_font_size(max_text_len: f64, ref_width: f64) -> f64 {
	if ref_width <= 0.0 {
		return MAX_LINK_FONT_SIZE;
	}
	(max_text_len / ref_width * LINK_REF_FONT_SIZE).min(MAX_LINK_FONT_SIZE)
}

fn measure_width(ctx: &CanvasRenderingContext2d, text: &str) -> f64 {
	ctx.measure_text(text).map(|m| m.width()).unwrap_or(0.0)
}
