//! Periodic, generation-guarded refresh of the active lens.
//!
//! The loop is cooperative: everything runs on the single UI thread, and
//! the only suspension point is the fetch itself. Two hazards are guarded.
//! Overlap: a tick that fires while a fetch is still outstanding is
//! skipped, so at most one fetch is in flight per lens. Staleness: every
//! activation bumps a generation counter and a response is applied only if
//! its generation is still current, so switching lenses mid-fetch discards
//! the obsolete result instead of corrupting the new lens's graph.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;

use log::{debug, info, warn};

use super::error::FetchError;
use super::flatten::flatten;
use super::types::{RawNode, VizGraph};

/// Tick period while a lens is active.
pub const REFRESH_INTERVAL_MS: u32 = 5_000;

/// Drives the fetch, flatten and merge cycle for the active lens.
///
/// Generic over the fetch collaborator: anything callable with a lens name
/// that yields a future of a record forest.
pub struct RefreshLoop<F> {
	graph: Rc<RefCell<VizGraph>>,
	fetcher: F,
	generation: Cell<u64>,
	in_flight: Cell<bool>,
}

impl<F, Fut> RefreshLoop<F>
where
	F: Fn(String) -> Fut,
	Fut: Future<Output = Result<Vec<RawNode>, FetchError>>,
{
	pub fn new(graph: Rc<RefCell<VizGraph>>, fetcher: F) -> Self {
		Self {
			graph,
			fetcher,
			generation: Cell::new(0),
			in_flight: Cell::new(false),
		}
	}

	/// The generation currently accepted by [`RefreshLoop::finish_tick`].
	pub fn generation(&self) -> u64 {
		self.generation.get()
	}

	/// Make a lens current: supersede any in-flight fetch and reset the
	/// graph so the first tick starts from empty. Returns the generation
	/// tag for this activation.
	pub fn activate(&self, lens: &str) -> u64 {
		let generation = self.generation.get() + 1;
		self.generation.set(generation);
		self.in_flight.set(false);
		self.graph.borrow_mut().reset(lens);
		info!("lens {} active (generation {})", lens, generation);
		generation
	}

	/// Stop accepting results, e.g. on view teardown. In-flight fetches
	/// are not interrupted; their results are dropped on arrival.
	pub fn cancel(&self) {
		self.generation.set(self.generation.get() + 1);
		self.in_flight.set(false);
	}

	/// Overlap guard: claim the tick, or `None` while a fetch for the
	/// current generation is still outstanding.
	pub fn begin_tick(&self) -> Option<u64> {
		if self.in_flight.get() {
			debug!("refresh tick skipped, fetch still in flight");
			return None;
		}
		self.in_flight.set(true);
		Some(self.generation.get())
	}

	/// Staleness guard and application: a result tagged with a superseded
	/// generation is dropped without touching anything; a current failure
	/// is logged and left for the next tick to retry; a current success is
	/// flattened and merged into the live graph.
	pub fn finish_tick(&self, generation: u64, result: Result<Vec<RawNode>, FetchError>) {
		if generation != self.generation.get() {
			debug!("dropping result for superseded generation {}", generation);
			return;
		}
		self.in_flight.set(false);
		match result {
			Ok(roots) => {
				let (nodes, links) = flatten(&roots);
				self.graph.borrow_mut().merge(nodes, links);
			}
			Err(e) => warn!("lens refresh failed, will retry: {}", e),
		}
	}

	/// One full refresh tick. Run once on activation and then from the
	/// interval timer.
	pub async fn tick(&self) {
		let Some(generation) = self.begin_tick() else {
			return;
		};
		let lens = self.graph.borrow().lens.clone();
		let result = (self.fetcher)(lens).await;
		self.finish_tick(generation, result);
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn roots() -> Vec<RawNode> {
		serde_json::from_value(json!([
			{"uid": 1, "node_key": "hub", "dgraph_type": ["Asset"],
			 "asset_processes": [{"uid": 2, "node_key": "leaf", "dgraph_type": ["Process"]}]}
		]))
		.unwrap()
	}

	fn refresh_loop() -> (Rc<RefCell<VizGraph>>, RefreshLoop<impl Fn(String) -> std::future::Ready<Result<Vec<RawNode>, FetchError>>>) {
		let graph = Rc::new(RefCell::new(VizGraph::default()));
		let fetcher = |_lens: String| std::future::ready(Ok(roots()));
		(graph.clone(), RefreshLoop::new(graph, fetcher))
	}

	#[test]
	fn overlapping_ticks_are_skipped() {
		let (_, refresh) = refresh_loop();
		refresh.activate("lens-a");

		let first = refresh.begin_tick();
		assert!(first.is_some());
		assert_eq!(refresh.begin_tick(), None);

		refresh.finish_tick(first.unwrap(), Ok(roots()));
		assert!(refresh.begin_tick().is_some());
	}

	#[test]
	fn stale_results_never_touch_the_graph() {
		let (graph, refresh) = refresh_loop();
		refresh.activate("lens-a");
		let stale = refresh.begin_tick().unwrap();

		// Lens switch while the fetch is in flight.
		let current = refresh.activate("lens-b");
		refresh.finish_tick(stale, Ok(roots()));
		assert!(graph.borrow().nodes.is_empty());
		assert_eq!(graph.borrow().lens, "lens-b");

		refresh.finish_tick(current, Ok(roots()));
		assert_eq!(graph.borrow().nodes.len(), 2);
	}

	#[test]
	fn cancellation_invalidates_in_flight_fetches() {
		let (graph, refresh) = refresh_loop();
		refresh.activate("lens-a");
		let generation = refresh.begin_tick().unwrap();

		refresh.cancel();
		refresh.finish_tick(generation, Ok(roots()));

		assert!(graph.borrow().nodes.is_empty());
	}

	#[test]
	fn fetch_failure_keeps_the_previous_graph() {
		let (graph, refresh) = refresh_loop();
		refresh.activate("lens-a");
		let generation = refresh.begin_tick().unwrap();
		refresh.finish_tick(generation, Ok(roots()));

		let generation = refresh.begin_tick().unwrap();
		refresh.finish_tick(generation, Err(FetchError::Query("boom".to_string())));

		assert_eq!(graph.borrow().nodes.len(), 2);
		// And the next tick is free to retry.
		assert!(refresh.begin_tick().is_some());
	}

	#[test]
	fn activation_resets_the_graph_for_the_new_lens() {
		let (graph, refresh) = refresh_loop();
		refresh.activate("lens-a");
		let generation = refresh.begin_tick().unwrap();
		refresh.finish_tick(generation, Ok(roots()));
		assert_eq!(graph.borrow().nodes.len(), 2);

		refresh.activate("lens-b");
		assert!(graph.borrow().nodes.is_empty());
		assert_eq!(graph.borrow().lens, "lens-b");
	}
}
