//! Remote route plotting through the Spansh API.
//!
//! A plot is submitted as a GET request. Small routes come back finished;
//! larger ones come back as a queued job that has to be polled at
//! `/results/{job}` until it completes. Polling runs on its own thread and
//! can be cancelled at any point. A nearest-system lookup rounds it out.

mod backoff;
mod decode;
mod nearest;
mod poll;
mod transport;

pub use backoff::{Backoff, MAX_POLL_DELAY};
pub use decode::{JobStatus, decode_route, job_status, transport_failure};
pub use nearest::{NearestSystem, decode_nearest, nearest_query, nearest_system};
pub use poll::{
    CancelToken, ExactOptions, ExactRequest, JobPoller, NeutronRequest, PlotHandle, PlotRequest,
    PlotUpdate, spawn_plot,
};
pub use transport::{HttpTransport, Transport, TransportError};

/// Production API root.
pub const DEFAULT_API_URL: &str = "https://spansh.co.uk/api";

/// Which plotter a request targets; decides the result shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotKind {
    Neutron,
    Exact,
}

/// Errors plotting a route.
#[derive(Debug, thiserror::Error)]
pub enum PlotError {
    /// The service rejected the request and said why.
    #[error("Received error from Spansh: {0}")]
    Service(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("Received invalid response from Spansh")]
    InvalidResponse,

    #[error("failed to decode route: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("plot cancelled")]
    Cancelled,
}
