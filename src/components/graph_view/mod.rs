//! Continuously refreshing graph view for a lens.
//!
//! Turns hierarchical lens query results into an interactive graph of
//! security entities:
//! - Flattening of nested records into deduplicated nodes and links, with
//!   risk findings aggregated onto their owning node
//! - Identity-preserving merges, so refetches update the picture without
//!   resetting node positions or pins
//! - Hover/click highlighting over the live graph
//! - A generation-guarded refresh loop that survives lens switches and
//!   slow fetches
//! - A canvas rendering engine driven through a narrow callback contract
//!
//! # Example
//!
//! ```ignore
//! use lens_graph::{LensGraphCanvas, embedded_fetcher};
//!
//! view! {
//!     <LensGraphCanvas
//!         lens="my-investigation"
//!         fetcher=embedded_fetcher()
//!         fullscreen=true
//!     />
//! }
//! ```

mod component;
mod engine;
mod error;
mod flatten;
mod highlight;
mod refresh;
mod render;
mod store;
mod style;
mod types;

pub use component::{FetchResult, LensFetcher, LensGraphCanvas};
pub use error::FetchError;
pub use flatten::flatten;
pub use highlight::HighlightState;
pub use refresh::{REFRESH_INTERVAL_MS, RefreshLoop};
pub use render::{COOLDOWN_TICKS, NODE_RADIUS, PaintLayer, RenderAdapter, WARMUP_TICKS};
pub use types::{RawNode, RiskEntry, VizGraph, VizLink, VizNode};
