//! Failure taxonomy for the lens fetch boundary.
//!
//! A failed fetch never tears the view down: the refresh loop logs it and
//! retries on the next tick. Stale (superseded-generation) results are not
//! errors at all and are dropped silently.

use thiserror::Error;

/// Why a lens fetch produced no usable result.
#[derive(Debug, Error)]
pub enum FetchError {
	/// The transport or the query itself failed.
	#[error("lens query failed: {0}")]
	Query(String),
	/// The response was not a decodable record tree.
	#[error("malformed lens response: {0}")]
	Decode(#[from] serde_json::Error),
}
