//! Error types for latvis operations.

use thiserror::Error;

/// Result type alias for latvis operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building, rendering or storing a density map.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Bounding box whose lower-left corner lies north of its upper-right corner.
    #[error("Invalid bounds: lower-left latitude {lower} is greater than upper-right latitude {upper}")]
    InvalidBounds {
        /// Latitude of the lower-left corner.
        lower: f64,
        /// Latitude of the upper-right corner.
        upper: f64,
    },

    /// A required request or handle parameter is absent.
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    /// A parameter is present but cannot be parsed.
    #[error("Invalid value for parameter {key}: {value:?}")]
    InvalidParameter {
        /// Name of the offending parameter.
        key: String,
        /// The raw value that failed to parse.
        value: String,
    },

    /// A handle path that does not match `/{page}/{ts}-{n1}-{n2}-{n3}.{suffix}`.
    #[error("Malformed handle path {path:?}: {reason}")]
    MalformedHandle {
        /// The path as received.
        path: String,
        /// Which structural check failed.
        reason: String,
    },

    /// Style selector that names no known renderer.
    #[error("Unknown style: {0}")]
    UnknownStyle(String),

    /// The location history source failed.
    #[error("History fetch failed: {0}")]
    HistoryFetch(String),

    /// The raster or vector encoder failed.
    #[error("Encoding failed: {0}")]
    Encoding(String),

    /// A render job was asked to move to a state it cannot reach, such as
    /// re-running a finished job.
    #[error("Invalid job transition for {handle}: {from} -> {to}")]
    InvalidTransition {
        /// Handle of the job.
        handle: String,
        /// State the job is in.
        from: String,
        /// State that was requested.
        to: String,
    },

    /// The task queue refused a task.
    #[error("Task queue error: {0}")]
    Queue(String),

    /// I/O error wrapper.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// PNG encoder error.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl Error {
    pub(crate) fn invalid_parameter(key: &str, value: &str) -> Self {
        Error::InvalidParameter {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    pub(crate) fn malformed_handle(path: &str, reason: &str) -> Self {
        Error::MalformedHandle {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }
}
