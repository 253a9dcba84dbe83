//! lens-graph: Interactive force-directed visualization of security entity graphs.
//!
//! This crate renders the entities in scope of a lens (assets, processes,
//! files and their attached risk findings) as a live graph. The active
//! lens is refetched on an interval and merged into the picture in place,
//! so nodes keep their on-screen positions across refreshes while risk
//! scores, labels and topology stay current.

use std::rc::Rc;

use leptos::prelude::*;
use leptos_meta::*;
use log::{Level, info};
use wasm_bindgen::JsCast;
use web_sys::{HtmlScriptElement, Window};

pub mod components;

pub use components::graph_view::{
	FetchError, FetchResult, LensFetcher, LensGraphCanvas, RawNode, VizGraph, VizLink, VizNode,
};

/// Initialize logging and panic hooks for the WASM target.
pub fn init_logging() {
	let _ = console_log::init_with_level(Level::Debug);
	console_error_panic_hook::set_once();
	info!("lens-graph: logging initialized");
}

/// Load a lens record forest from a script element with id="lens-data".
/// Expected format: a JSON array of root records.
fn load_lens_roots() -> Result<Vec<RawNode>, FetchError> {
	let embedded = || -> Option<String> {
		let window: Window = web_sys::window()?;
		let document = window.document()?;
		let element = document.get_element_by_id("lens-data")?;
		let script: HtmlScriptElement = element.dyn_into().ok()?;
		script.text().ok()
	};
	let json_text = embedded().ok_or_else(|| FetchError::Query("no lens-data element".into()))?;
	let roots: Vec<RawNode> = serde_json::from_str(&json_text)?;
	info!("lens-graph: loaded {} root records", roots.len());
	Ok(roots)
}

/// Fetcher backed by data embedded in the page, for running without a
/// query backend. A real transport plugs in through the same
/// [`LensFetcher`] seam.
pub fn embedded_fetcher() -> LensFetcher {
	Rc::new(|_lens: String| Box::pin(async { load_lens_roots() }))
}

/// Main application component: a fullscreen graph for the demo lens with
/// a heads-up readout of the current selection.
#[component]
pub fn App() -> impl IntoView {
	provide_meta_context();

	let lens = RwSignal::new("demo".to_string());
	let selected: RwSignal<Option<VizNode>> = RwSignal::new(None);
	let on_node_selected = Callback::new(move |node: Option<VizNode>| selected.set(node));

	view! {
		<Html attr:lang="en" attr:dir="ltr" attr:data-theme="dark" />
		<Title text="Lens Graph" />
		<Meta charset="UTF-8" />
		<Meta name="viewport" content="width=device-width, initial-scale=1.0" />

		<div class="fullscreen-graph">
			<LensGraphCanvas
				lens=lens
				fetcher=embedded_fetcher()
				on_node_selected=on_node_selected
				fullscreen=true
			/>
			<div class="graph-overlay">
				<h1>{move || format!("Lens: {}", lens.get())}</h1>
				<p class="subtitle">
					{move || match selected.get() {
						Some(node) => format!("{} (risk {})", node.node_label, node.risk_score),
						None => "Click a node to inspect it.".to_string(),
					}}
				</p>
			</div>
		</div>
	}
}
