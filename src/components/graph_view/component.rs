//! Leptos component wrapping the lens graph canvas.
//!
//! The component creates an HTML canvas element, wires up mouse/wheel
//! handlers for hovering, node dragging, panning and zooming, and runs an
//! animation loop via `requestAnimationFrame`. Alongside the frame loop it
//! owns the refresh cycle: switching the `lens` prop activates a new
//! generation, fetches immediately, and then refetches on a fixed interval
//! until the lens changes again or the component is torn down.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use leptos::__reexports::send_wrapper::SendWrapper;
use leptos::prelude::*;
use leptos::task::spawn_local;
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, MouseEvent, WheelEvent, Window};

use super::engine::GraphEngine;
use super::error::FetchError;
use super::highlight::HighlightState;
use super::refresh::{REFRESH_INTERVAL_MS, RefreshLoop};
use super::render::RenderAdapter;
use super::types::{RawNode, VizGraph, VizNode};

/// What a lens fetch resolves to.
pub type FetchResult = Result<Vec<RawNode>, FetchError>;

/// The query/transport collaborator: maps a lens name to a future of its
/// record forest.
pub type LensFetcher = Rc<dyn Fn(String) -> Pin<Box<dyn Future<Output = FetchResult>>>>;

const FRAME_DT: f64 = 0.016;

/// Renders the continuously refreshing graph for the active lens.
///
/// The component sizes itself to its parent container by default; set
/// `fullscreen = true` to fill the viewport. Explicit `width`/`height`
/// override automatic sizing. Clicks are reported through
/// `on_node_selected`.
#[component]
pub fn LensGraphCanvas(
	#[prop(into)] lens: Signal<String>,
	fetcher: LensFetcher,
	#[prop(optional, into)] on_node_selected: Option<Callback<Option<VizNode>>>,
	#[prop(default = false)] fullscreen: bool,
	#[prop(default = None)] width: Option<f64>,
	#[prop(default = None)] height: Option<f64>,
) -> impl IntoView {
	let canvas_ref = NodeRef::<leptos::html::Canvas>::new();

	let graph: Rc<RefCell<VizGraph>> = Rc::new(RefCell::new(VizGraph::default()));
	let highlight: Rc<RefCell<HighlightState>> = Rc::new(RefCell::new(HighlightState::default()));
	let engine: Rc<RefCell<Option<GraphEngine>>> = Rc::new(RefCell::new(None));
	let adapter = Rc::new(RenderAdapter::new().on_node_selected(move |node| {
		if let Some(callback) = on_node_selected {
			callback.run(node.cloned());
		}
	}));
	let refresh = {
		let fetch = fetcher.clone();
		Rc::new(RefreshLoop::new(graph.clone(), move |lens: String| {
			(fetch)(lens)
		}))
	};

	let animate: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
	let running = Rc::new(Cell::new(true));
	let interval_id: Rc<Cell<Option<i32>>> = Rc::new(Cell::new(None));
	let interval_cb: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));

	let (engine_init, animate_init, graph_anim, highlight_anim, adapter_anim, running_anim) = (
		engine.clone(),
		animate.clone(),
		graph.clone(),
		highlight.clone(),
		adapter.clone(),
		running.clone(),
	);
	Effect::new(move |_| {
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		let canvas: HtmlCanvasElement = canvas.into();
		let window: Window = web_sys::window().unwrap();

		let (w, h) = if fullscreen {
			(
				window.inner_width().unwrap().as_f64().unwrap(),
				window.inner_height().unwrap().as_f64().unwrap(),
			)
		} else {
			(
				width.unwrap_or_else(|| {
					canvas
						.parent_element()
						.map(|p| p.client_width() as f64)
						.unwrap_or(800.0)
				}),
				height.unwrap_or_else(|| {
					canvas
						.parent_element()
						.map(|p| p.client_height() as f64)
						.unwrap_or(600.0)
				}),
			)
		};
		canvas.set_width(w as u32);
		canvas.set_height(h as u32);

		let ctx: CanvasRenderingContext2d = canvas
			.get_context("2d")
			.unwrap()
			.unwrap()
			.dyn_into()
			.unwrap();

		*engine_init.borrow_mut() = Some(GraphEngine::new(w, h));

		let (engine_anim, animate_inner, running_inner) = (
			engine_init.clone(),
			animate_init.clone(),
			running_anim.clone(),
		);
		let (graph_inner, highlight_inner, adapter_inner) = (
			graph_anim.clone(),
			highlight_anim.clone(),
			adapter_anim.clone(),
		);
		*animate_init.borrow_mut() = Some(Closure::new(move || {
			if !running_inner.get() {
				return;
			}
			if let Some(ref mut eng) = *engine_anim.borrow_mut() {
				eng.tick(&mut graph_inner.borrow_mut(), FRAME_DT);
				let g = graph_inner.borrow();
				let hl = highlight_inner.borrow();
				eng.render(&g, &hl, &adapter_inner, &ctx);
			}
			if let Some(ref cb) = *animate_inner.borrow() {
				let _ = web_sys::window()
					.unwrap()
					.request_animation_frame(cb.as_ref().unchecked_ref());
			}
		}));
		if let Some(ref cb) = *animate_init.borrow() {
			let _ = window.request_animation_frame(cb.as_ref().unchecked_ref());
		}
	});

	let (refresh_lens, highlight_lens, interval_id_lens, interval_cb_lens) = (
		refresh.clone(),
		highlight.clone(),
		interval_id.clone(),
		interval_cb.clone(),
	);
	Effect::new(move |_| {
		let lens_name = lens.get();
		let window: Window = web_sys::window().unwrap();

		if let Some(id) = interval_id_lens.take() {
			window.clear_interval_with_handle(id);
		}

		refresh_lens.activate(&lens_name);
		*highlight_lens.borrow_mut() = HighlightState::default();

		let refresh_now = refresh_lens.clone();
		spawn_local(async move {
			refresh_now.tick().await;
		});

		let refresh_timer = refresh_lens.clone();
		*interval_cb_lens.borrow_mut() = Some(Closure::new(move || {
			let refresh = refresh_timer.clone();
			spawn_local(async move {
				refresh.tick().await;
			});
		}));
		if let Some(ref cb) = *interval_cb_lens.borrow() {
			interval_id_lens.set(
				window
					.set_interval_with_callback_and_timeout_and_arguments_0(
						cb.as_ref().unchecked_ref(),
						REFRESH_INTERVAL_MS as i32,
					)
					.ok(),
			);
		}
	});

	let (refresh_drop, running_drop, interval_id_drop) =
		(refresh.clone(), running.clone(), interval_id.clone());
	// `on_cleanup` requires a `Send + Sync` closure, but the component's state is
	// the single-threaded `Rc`/`Cell` model described in the spec. `SendWrapper`
	// (re-exported by leptos) satisfies the bound without changing behavior: it is
	// only ever created and run on the WASM event loop's single thread.
	let cleanup_state = SendWrapper::new((refresh_drop, running_drop, interval_id_drop));
	on_cleanup(move || {
		let (refresh_drop, running_drop, interval_id_drop) = &*cleanup_state;
		running_drop.set(false);
		refresh_drop.cancel();
		if let Some(id) = interval_id_drop.take() {
			if let Some(window) = web_sys::window() {
				window.clear_interval_with_handle(id);
			}
		}
	});

	let (engine_md, graph_md) = (engine.clone(), graph.clone());
	let on_mousedown = move |ev: MouseEvent| {
		let canvas: HtmlCanvasElement = canvas_ref.get().unwrap().into();
		let rect = canvas.get_bounding_client_rect();
		let (x, y) = (
			ev.client_x() as f64 - rect.left(),
			ev.client_y() as f64 - rect.top(),
		);

		if let Some(ref mut eng) = *engine_md.borrow_mut() {
			let g = graph_md.borrow();
			if let Some(uid) = eng.node_at(&g, x, y) {
				eng.begin_drag(&g, uid, x, y);
			} else {
				eng.pan.active = true;
				eng.pan.start_x = x;
				eng.pan.start_y = y;
				eng.pan.transform_start_x = eng.transform.x;
				eng.pan.transform_start_y = eng.transform.y;
			}
		}
	};

	let (engine_mm, graph_mm, highlight_mm) = (engine.clone(), graph.clone(), highlight.clone());
	let on_mousemove = move |ev: MouseEvent| {
		let canvas: HtmlCanvasElement = canvas_ref.get().unwrap().into();
		let rect = canvas.get_bounding_client_rect();
		let (x, y) = (
			ev.client_x() as f64 - rect.left(),
			ev.client_y() as f64 - rect.top(),
		);

		if let Some(ref mut eng) = *engine_mm.borrow_mut() {
			if eng.drag.active {
				eng.drag_to(&mut graph_mm.borrow_mut(), x, y);
			} else if eng.pan.active {
				eng.transform.x = eng.pan.transform_start_x + (x - eng.pan.start_x);
				eng.transform.y = eng.pan.transform_start_y + (y - eng.pan.start_y);
			} else {
				let g = graph_mm.borrow();
				let mut hl = highlight_mm.borrow_mut();
				if let Some(uid) = eng.node_at(&g, x, y) {
					hl.hover_node(&g, Some(uid));
				} else if let Some(link) = eng.link_at(&g, x, y) {
					hl.hover_link(Some(&link));
				} else {
					hl.hover_node(&g, None);
				}
			}
		}
	};

	let (engine_mu, graph_mu, highlight_mu, adapter_mu) = (
		engine.clone(),
		graph.clone(),
		highlight.clone(),
		adapter.clone(),
	);
	let on_mouseup = move |_: MouseEvent| {
		if let Some(ref mut eng) = *engine_mu.borrow_mut() {
			if eng.drag.active {
				let ended = eng.end_drag(&graph_mu.borrow());
				if let Some((uid, x, y, moved)) = ended {
					if moved {
						adapter_mu.node_drag_end(&mut graph_mu.borrow_mut(), uid, x, y);
						eng.reheat();
					} else {
						adapter_mu.node_click(
							&mut graph_mu.borrow_mut(),
							&mut highlight_mu.borrow_mut(),
							uid,
						);
					}
				}
			}
			eng.pan.active = false;
		}
	};

	let (engine_ml, graph_ml, highlight_ml) = (engine.clone(), graph.clone(), highlight.clone());
	let on_mouseleave = move |_: MouseEvent| {
		if let Some(ref mut eng) = *engine_ml.borrow_mut() {
			let _ = eng.end_drag(&graph_ml.borrow());
			eng.pan.active = false;
			highlight_ml.borrow_mut().hover_node(&graph_ml.borrow(), None);
		}
	};

	let engine_wh = engine.clone();
	let on_wheel = move |ev: WheelEvent| {
		ev.prevent_default();
		let canvas: HtmlCanvasElement = canvas_ref.get().unwrap().into();
		let rect = canvas.get_bounding_client_rect();
		let (x, y) = (
			ev.client_x() as f64 - rect.left(),
			ev.client_y() as f64 - rect.top(),
		);

		if let Some(ref mut eng) = *engine_wh.borrow_mut() {
			eng.zoom(x, y, ev.delta_y());
		}
	};

	view! {
		<canvas
			node_ref=canvas_ref
			class="lens-graph-canvas"
			on:mousedown=on_mousedown
			on:mousemove=on_mousemove
			on:mouseup=on_mouseup
			on:mouseleave=on_mouseleave
			on:wheel=on_wheel
			style="display: block; cursor: grab;"
		/>
	}
}
