//! Physics and canvas backend consuming the render adapter contract.
//!
//! Wraps the `force_graph` simulation with pan/zoom transforms, drag
//! tracking and hit testing, and draws the scene each animation frame
//! through the [`RenderAdapter`](super::render::RenderAdapter) callbacks.
//! The engine owns node positions: every tick it writes simulation
//! coordinates back into the live graph, reseeding its internal state
//! whenever the graph's revision changes (merge, pin change, reset).

use std::collections::HashMap;
use std::f64::consts::TAU;

use force_graph::{EdgeData, ForceGraph, NodeData, SimulationParameters};
use web_sys::CanvasRenderingContext2d;

use super::highlight::HighlightState;
use super::render::{PaintLayer, RenderAdapter, COOLDOWN_TICKS, NODE_RADIUS, WARMUP_TICKS};
use super::types::{VizGraph, VizLink};

const BACKGROUND_COLOR: &str = "#161b22";
const ARROW_LENGTH: f64 = 10.0;
/// Fraction of a link a directional particle travels per second.
const PARTICLE_SPEED: f64 = 0.6;
/// World-space distance within which a pointer counts as touching a link.
const LINK_HIT_DISTANCE: f64 = 4.0;
/// Screen-space slack below which a press-release still counts as a click.
const CLICK_DRAG_TOLERANCE: f64 = 3.0;
/// Radius for circular seeding of never-positioned nodes.
const SEED_RADIUS: f64 = 100.0;

/// Pan and zoom transform applied to the entire graph view.
#[derive(Clone, Debug, Default)]
pub struct ViewTransform {
	pub x: f64,
	pub y: f64,
	/// Zoom factor (1.0 = 100%, clamped to 0.1..10.0).
	pub k: f64,
}

/// Tracks an in-progress node drag operation.
#[derive(Clone, Debug, Default)]
pub struct DragState {
	pub active: bool,
	pub uid: Option<u64>,
	pub start_x: f64,
	pub start_y: f64,
	pub node_start_x: f64,
	pub node_start_y: f64,
	pub moved: bool,
}

/// Tracks an in-progress canvas pan operation.
#[derive(Clone, Debug, Default)]
pub struct PanState {
	pub active: bool,
	pub start_x: f64,
	pub start_y: f64,
	pub transform_start_x: f64,
	pub transform_start_y: f64,
}

#[derive(Clone, Debug, Default)]
struct SimNode {
	uid: u64,
}

/// Simulation and drawing state for one canvas.
pub struct GraphEngine {
	sim: ForceGraph<SimNode, ()>,
	pub transform: ViewTransform,
	pub drag: DragState,
	pub pan: PanState,
	synced_revision: u64,
	cooldown: u32,
	flow_time: f64,
	width: f64,
	height: f64,
}

fn simulation_parameters() -> SimulationParameters {
	SimulationParameters {
		force_charge: 150.0,
		force_spring: 0.05,
		force_max: 100.0,
		node_speed: 3000.0,
		damping_factor: 0.9,
	}
}

impl GraphEngine {
	pub fn new(width: f64, height: f64) -> Self {
		Self {
			sim: ForceGraph::new(simulation_parameters()),
			transform: ViewTransform {
				x: width / 2.0,
				y: height / 2.0,
				k: 1.0,
			},
			drag: DragState::default(),
			pan: PanState::default(),
			synced_revision: 0,
			cooldown: 0,
			flow_time: 0.0,
			width,
			height,
		}
	}

	/// Rebuild the simulation from the live graph if its revision moved.
	///
	/// Positions survive: pinned nodes are anchored at their pin, already
	/// placed nodes keep their coordinates, and only never-seen nodes get
	/// a seeded spot on a circle around the origin. A layout with no
	/// positioned node at all (fresh lens) is warmed up before the first
	/// frame; every resync reheats the cooldown window.
	pub fn sync(&mut self, graph: &VizGraph) {
		if self.synced_revision == graph.revision {
			return;
		}

		let fresh_layout = !graph.nodes.is_empty() && graph.nodes.iter().all(|n| n.x.is_none());
		let count = graph.nodes.len().max(1);
		let mut sim = ForceGraph::new(simulation_parameters());
		let mut idx_of = HashMap::new();

		for (i, node) in graph.nodes.iter().enumerate() {
			let (x, y) = match (node.fx, node.fy) {
				(Some(fx), Some(fy)) => (fx, fy),
				_ => match (node.x, node.y) {
					(Some(x), Some(y)) => (x, y),
					_ => {
						let angle = i as f64 * TAU / count as f64;
						let jitter = 1.0 + pseudo_random(node.id as f64);
						(
							SEED_RADIUS * jitter * angle.cos(),
							SEED_RADIUS * jitter * angle.sin(),
						)
					}
				},
			};
			let idx = sim.add_node(NodeData {
				x: x as f32,
				y: y as f32,
				mass: 10.0,
				is_anchor: node.is_pinned(),
				user_data: SimNode { uid: node.id },
			});
			idx_of.insert(node.id, idx);
		}

		for link in &graph.links {
			if let (Some(&a), Some(&b)) = (idx_of.get(&link.source), idx_of.get(&link.target)) {
				sim.add_edge(a, b, EdgeData::default());
			}
		}

		self.sim = sim;
		if fresh_layout {
			for _ in 0..WARMUP_TICKS {
				self.sim.update(0.016);
			}
		}
		self.cooldown = COOLDOWN_TICKS;
		self.synced_revision = graph.revision;
	}

	/// Advance one animation frame: resync if needed, step the simulation
	/// while the cooldown window is open, and write positions back into
	/// the graph nodes.
	pub fn tick(&mut self, graph: &mut VizGraph, dt: f64) {
		self.sync(graph);
		if self.cooldown > 0 {
			self.sim.update(dt as f32);
			self.cooldown -= 1;
		}
		self.flow_time += dt;

		self.sim.visit_nodes(|sim_node| {
			if let Some(node) = graph.node_mut(sim_node.data.user_data.uid) {
				node.x = Some(sim_node.x() as f64);
				node.y = Some(sim_node.y() as f64);
			}
		});
	}

	/// Reopen the cooldown window (drag interactions reheat the layout).
	pub fn reheat(&mut self) {
		self.cooldown = COOLDOWN_TICKS;
	}

	pub fn screen_to_graph(&self, sx: f64, sy: f64) -> (f64, f64) {
		(
			(sx - self.transform.x) / self.transform.k,
			(sy - self.transform.y) / self.transform.k,
		)
	}

	/// The topmost node under a screen position, if any.
	pub fn node_at(&self, graph: &VizGraph, sx: f64, sy: f64) -> Option<u64> {
		let (gx, gy) = self.screen_to_graph(sx, sy);
		let mut found = None;
		for node in &graph.nodes {
			let (Some(x), Some(y)) = (node.x, node.y) else {
				continue;
			};
			let (dx, dy) = (x - gx, y - gy);
			if (dx * dx + dy * dy).sqrt() < NODE_RADIUS * 1.4 {
				found = Some(node.id);
			}
		}
		found
	}

	/// The nearest link under a screen position, if any is within reach.
	pub fn link_at(&self, graph: &VizGraph, sx: f64, sy: f64) -> Option<VizLink> {
		let (gx, gy) = self.screen_to_graph(sx, sy);
		let mut best: Option<(f64, &VizLink)> = None;
		for link in &graph.links {
			let (Some(source), Some(target)) = (graph.node(link.source), graph.node(link.target))
			else {
				continue;
			};
			let ((Some(x1), Some(y1)), (Some(x2), Some(y2))) =
				((source.x, source.y), (target.x, target.y))
			else {
				continue;
			};
			let d = dist_to_segment(gx, gy, x1, y1, x2, y2);
			if d < LINK_HIT_DISTANCE && best.map(|(b, _)| d < b).unwrap_or(true) {
				best = Some((d, link));
			}
		}
		best.map(|(_, link)| link.clone())
	}

	/// Begin dragging a node at a screen position.
	pub fn begin_drag(&mut self, graph: &VizGraph, uid: u64, sx: f64, sy: f64) {
		let Some(node) = graph.node(uid) else {
			return;
		};
		self.drag = DragState {
			active: true,
			uid: Some(uid),
			start_x: sx,
			start_y: sy,
			node_start_x: node.x.unwrap_or(0.0),
			node_start_y: node.y.unwrap_or(0.0),
			moved: false,
		};
	}

	/// Move the dragged node with the pointer, anchoring it against the
	/// simulation for the duration of the drag.
	pub fn drag_to(&mut self, graph: &mut VizGraph, sx: f64, sy: f64) {
		let Some(uid) = self.drag.uid.filter(|_| self.drag.active) else {
			return;
		};
		let (dx, dy) = (
			(sx - self.drag.start_x) / self.transform.k,
			(sy - self.drag.start_y) / self.transform.k,
		);
		let screen_dist =
			((sx - self.drag.start_x).powi(2) + (sy - self.drag.start_y).powi(2)).sqrt();
		if screen_dist > CLICK_DRAG_TOLERANCE {
			self.drag.moved = true;
		}
		let (nx, ny) = (self.drag.node_start_x + dx, self.drag.node_start_y + dy);

		self.sim.visit_nodes_mut(|sim_node| {
			if sim_node.data.user_data.uid == uid {
				sim_node.data.x = nx as f32;
				sim_node.data.y = ny as f32;
				sim_node.data.is_anchor = true;
			}
		});
		if let Some(node) = graph.node_mut(uid) {
			node.x = Some(nx);
			node.y = Some(ny);
		}
		self.reheat();
	}

	/// Finish the drag. Returns the node, its rest position, and whether
	/// the pointer actually moved (a motionless press-release is a click).
	pub fn end_drag(&mut self, graph: &VizGraph) -> Option<(u64, f64, f64, bool)> {
		let uid = self.drag.uid.take()?;
		let moved = self.drag.moved;
		self.drag = DragState::default();
		let node = graph.node(uid)?;
		Some((uid, node.x.unwrap_or(0.0), node.y.unwrap_or(0.0), moved))
	}

	/// Zoom around a screen position, clamping the zoom factor.
	pub fn zoom(&mut self, sx: f64, sy: f64, delta_y: f64) {
		let factor = if delta_y > 0.0 { 0.9 } else { 1.1 };
		let new_k = (self.transform.k * factor).clamp(0.1, 10.0);
		let ratio = new_k / self.transform.k;
		self.transform.x = sx - (sx - self.transform.x) * ratio;
		self.transform.y = sy - (sy - self.transform.y) * ratio;
		self.transform.k = new_k;
	}

	/// Draw the whole scene through the adapter callbacks.
	pub fn render(
		&self,
		graph: &VizGraph,
		highlight: &HighlightState,
		adapter: &RenderAdapter,
		ctx: &CanvasRenderingContext2d,
	) {
		ctx.set_fill_style_str(BACKGROUND_COLOR);
		ctx.fill_rect(0.0, 0.0, self.width, self.height);

		ctx.save();
		let _ = ctx.translate(self.transform.x, self.transform.y);
		let _ = ctx.scale(self.transform.k, self.transform.k);

		for link in &graph.links {
			self.draw_link(link, graph, highlight, adapter, ctx);
		}
		for link in &graph.links {
			adapter.link_draw(link, ctx, graph, highlight);
		}
		self.draw_nodes(graph, highlight, adapter, ctx);

		ctx.restore();
	}

	fn draw_link(
		&self,
		link: &VizLink,
		graph: &VizGraph,
		highlight: &HighlightState,
		adapter: &RenderAdapter,
		ctx: &CanvasRenderingContext2d,
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
		let dist = (dx * dx + dy * dy).sqrt();
		if dist < 0.001 {
			return;
		}
		let (ux, uy) = (dx / dist, dy / dist);
		let color = adapter.link_color(link, graph, highlight);

		ctx.set_stroke_style_str(&color);
		ctx.set_line_width(adapter.link_width(link, highlight));
		ctx.begin_path();
		ctx.move_to(x1 + ux * NODE_RADIUS, y1 + uy * NODE_RADIUS);
		ctx.line_to(
			x2 - ux * (NODE_RADIUS + ARROW_LENGTH),
			y2 - uy * (NODE_RADIUS + ARROW_LENGTH),
		);
		ctx.stroke();

		// Arrowhead at the target end.
		let (tip_x, tip_y) = (x2 - ux * NODE_RADIUS, y2 - uy * NODE_RADIUS);
		let (back_x, back_y) = (tip_x - ux * ARROW_LENGTH, tip_y - uy * ARROW_LENGTH);
		let (px, py) = (-uy * ARROW_LENGTH * 0.5, ux * ARROW_LENGTH * 0.5);
		ctx.set_fill_style_str(&color);
		ctx.begin_path();
		ctx.move_to(tip_x, tip_y);
		ctx.line_to(back_x + px, back_y + py);
		ctx.line_to(back_x - px, back_y - py);
		ctx.close_path();
		ctx.fill();

		// Directional particle, phase-shifted per link so the flow
		// doesn't pulse in lockstep.
		let phase = pseudo_random(link.source.wrapping_mul(31).wrapping_add(link.target) as f64);
		let t = (self.flow_time * PARTICLE_SPEED + phase).fract();
		let radius = adapter.particle_width(link, graph, highlight) / 2.0;
		ctx.set_fill_style_str(adapter.particle_color());
		ctx.begin_path();
		let _ = ctx.arc(x1 + dx * t, y1 + dy * t, radius, 0.0, TAU);
		ctx.fill();
	}

	fn draw_nodes(
		&self,
		graph: &VizGraph,
		highlight: &HighlightState,
		adapter: &RenderAdapter,
		ctx: &CanvasRenderingContext2d,
	) {
		for node in &graph.nodes {
			let (Some(x), Some(y)) = (node.x, node.y) else {
				continue;
			};
			let default_circle = |ctx: &CanvasRenderingContext2d| {
				ctx.begin_path();
				let _ = ctx.arc(x, y, NODE_RADIUS, 0.0, TAU);
				ctx.set_fill_style_str(adapter.node_color());
				ctx.fill();
			};
			match adapter.node_paint_layer(node, highlight) {
				PaintLayer::Before => {
					adapter.node_draw(node, ctx, self.transform.k, highlight);
					default_circle(ctx);
				}
				PaintLayer::After => {
					default_circle(ctx);
					adapter.node_draw(node, ctx, self.transform.k, highlight);
				}
			}
		}
	}
}

/// Simple pseudo-random function (deterministic)
fn pseudo_random(seed: f64) -> f64 {
	let x = (seed * 12.9898 + seed * 78.233).sin() * 43758.5453;
	x - x.floor()
}

fn dist_to_segment(px: f64, py: f64, x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
	let (dx, dy) = (x2 - x1, y2 - y1);
	let len2 = dx * dx + dy * dy;
	if len2 == 0.0 {
		return ((px - x1).powi(2) + (py - y1).powi(2)).sqrt();
	}
	let t = (((px - x1) * dx + (py - y1) * dy) / len2).clamp(0.0, 1.0);
	let (cx, cy) = (x1 + t * dx, y1 + t * dy);
	((px - cx).powi(2) + (py - cy).powi(2)).sqrt()
}
