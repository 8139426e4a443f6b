use thiserror::Error;

/// Failures surfaced at construction time (`RouteSession::build`, `ProgressTracker::start`).
///
/// Once tracking is active nothing in the tracker returns an error: noisy or
/// off-route fixes are modeled as state and events.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NavError {
    #[error("Invalid geometry: a line needs at least 2 points, got {points}")]
    InvalidGeometry { points: usize },

    #[error("Invalid route: {0}")]
    InvalidRoute(String),
}

pub type NavResult<T> = Result<T, NavError>;
