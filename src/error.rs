use thiserror::Error;

/// Errors surfaced by the route-planning core.
#[derive(Error, Debug)]
pub enum RouteError {
    /// Malformed external input (bad request shape, out-of-world position, etc).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The A* search did not finish before its deadline.
    #[error("route search timed out")]
    Timeout,

    /// A referenced location id is absent, or a duplicate id/pos was introduced.
    #[error("storage inconsistency: {0}")]
    StorageInconsistency(String),

    /// A new id or pos collides with a live entry other than the one being updated.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    /// Reading or writing the heuristic cache failed; the caller should proceed uncached.
    #[error("heuristic cache io error: {0}")]
    CacheIoError(String),

    /// An invariant of the search was broken (popped node missing from cost map, etc).
    #[error("fatal route planner error: {0}")]
    Fatal(String),

    #[error("io error")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

/// `NotReachable` is a normal, successful outcome of a search, not an error: callers that need to
/// distinguish "no path" from "a real Itinerary" match on [`crate::itinerary::Itinerary`] instead
/// of folding it into `RouteError`.
pub type Result<T> = std::result::Result<T, RouteError>;
