//! Pedestrian Navigation Core
//!
//! Turns a stream of GPS fixes into turn-by-turn progress along a precomputed
//! walking route:
//! - Geodesic helpers (haversine distance, bearings, nearest point on a polyline)
//! - Route sessions built from a directions response or raw route data
//! - A progress tracker state machine (idle, tracking, arrived)
//! - Single-subscriber event channels for UI and audio consumers
//! - A sampling gate that normalizes and filters raw location fixes
//!
//! # Example
//!
//! ```no_run
//! use navcore::{ProgressTracker, RouteSession, SamplingGate, SamplingGateConfig, TrackerConfig};
//!
//! let json = std::fs::read_to_string("route.json").unwrap();
//! let session = RouteSession::from_directions_json(&json).unwrap();
//!
//! let mut tracker = ProgressTracker::new(TrackerConfig::default());
//! tracker.events().on_step_complete(|index, step| println!("Step {} done: {}", index, step.instruction));
//! tracker.events().on_route_complete(|| println!("Arrived"));
//! tracker.start(session).unwrap();
//!
//! let mut gate = SamplingGate::new(SamplingGateConfig::default());
//! # let fixes: Vec<navcore::RawPosition> = Vec::new();
//! for raw in &fixes {
//!     if let Some(sample) = gate.accept(raw) {
//!         tracker.update(&sample);
//!     }
//! }
//! ```

pub mod dispatcher;
pub mod error;
pub mod geometry;
pub mod route;
pub mod sampling_gate;
pub mod state;
pub mod tracker;

// Re-export commonly used types
pub use dispatcher::EventDispatcher;
pub use error::{NavError, NavResult};
pub use geometry::{Coordinate, NearestPoint};
pub use route::{DirectionsResponse, Maneuver, RawStep, RouteSession, RouteStep, RouteSummary};
pub use sampling_gate::{
    DropReason, GateStats, PositionSample, RawCoords, RawPosition, SamplingGate, SamplingGateConfig,
    TimestampUnit,
};
pub use state::{Instruction, NavigationState, StepInstruction, TrackerPhase, ARRIVED_INSTRUCTION};
pub use tracker::{HeadingCheckConfig, ProgressTracker, TrackerConfig, UpdateOutcome};
