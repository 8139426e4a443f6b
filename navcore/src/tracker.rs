//! Progress tracker
//!
//! Consumes one accepted GPS fix at a time and advances the navigation state
//! against the active [`RouteSession`]:
//!
//! - `Idle`: no session, fixes are ignored
//! - `Tracking`: fixes are projected onto the route and the current step
//! - `Arrived`: terminal until the next `start`/`stop`
//!
//! Noisy fixes, off-route excursions and missing steps are never errors once
//! tracking is active; they become state and events.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::dispatcher::EventDispatcher;
use crate::error::NavResult;
use crate::geometry::{
    angle_diff, bearing_degrees, nearest_point_on_line, Coordinate, NearestPoint,
};
use crate::route::{RawStep, RouteSession, RouteStep, RouteSummary};
use crate::sampling_gate::PositionSample;
use crate::state::{Instruction, NavigationState, StepInstruction, TrackerPhase};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Remaining distance on a step at which it counts as completed
    pub step_completion_threshold_meters: f64,
    /// Distance from the route beyond which the walker is off-route
    pub off_route_threshold_meters: f64,
    /// Fixes reporting a worse accuracy are ignored
    pub min_accuracy_threshold_meters: f64,
    /// Heading-assisted off-route detection, disabled when `None`
    pub heading_check: Option<HeadingCheckConfig>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            step_completion_threshold_meters: 15.0,
            off_route_threshold_meters: 40.0,
            min_accuracy_threshold_meters: 50.0,
            heading_check: None,
        }
    }
}

/// Declares off-route early when the walker is already drifting away from the
/// route and moving in a direction that disagrees with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadingCheckConfig {
    pub min_speed_mps: f64,
    pub max_heading_difference_degrees: f64,
    /// Fraction of the off-route threshold the fix must already be away
    pub early_distance_fraction: f64,
}

impl Default for HeadingCheckConfig {
    fn default() -> Self {
        Self {
            min_speed_mps: 1.0,
            max_heading_difference_degrees: 60.0,
            early_distance_fraction: 0.5,
        }
    }
}

/// What a call to [`ProgressTracker::update`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Idle or arrived; nothing happened
    Inactive,
    /// Fix accuracy worse than the threshold; nothing happened
    InaccurateSample,
    Progressed,
    StepCompleted { step_index: usize },
    Arrived,
    /// The step index points past the route; the last snapshot was re-emitted off-route
    StepUnavailable,
}

pub struct ProgressTracker {
    config: TrackerConfig,
    session: Option<RouteSession>,
    state: NavigationState,
    dispatcher: EventDispatcher,
}

fn step_time_remaining(step: &RouteStep, remaining_on_step: f64) -> f64 {
    if step.distance_meters <= 0.0 {
        return 0.0;
    }
    step.duration_seconds * (remaining_on_step / step.distance_meters)
}

fn heading_suggests_off_route(
    check: &HeadingCheckConfig,
    off_route_threshold: f64,
    sample: &PositionSample,
    nearest: &NearestPoint,
    line: &[Coordinate],
) -> bool {
    let (Some(speed), Some(heading)) = (sample.speed_mps, sample.heading_degrees) else {
        return false;
    };
    if speed < check.min_speed_mps
        || nearest.distance_from_line_meters <= off_route_threshold * check.early_distance_fraction
    {
        return false;
    }
    let (from, to) = (line[nearest.segment_index], line[nearest.segment_index + 1]);
    if from == to {
        return false;
    }
    angle_diff(heading, bearing_degrees(from, to)).abs() > check.max_heading_difference_degrees
}

impl ProgressTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            session: None,
            state: NavigationState::idle(),
            dispatcher: EventDispatcher::new(),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Handler registration.
    pub fn events(&mut self) -> &mut EventDispatcher {
        &mut self.dispatcher
    }

    pub fn state(&self) -> &NavigationState {
        &self.state
    }

    pub fn snapshot(&self) -> NavigationState {
        self.state.clone()
    }

    pub fn phase(&self) -> TrackerPhase {
        self.state.phase
    }

    pub fn is_active(&self) -> bool {
        self.state.phase == TrackerPhase::Tracking
    }

    pub fn is_off_route(&self) -> bool {
        self.state.is_off_route
    }

    pub fn session(&self) -> Option<&RouteSession> {
        self.session.as_ref()
    }

    /// Start following `session`, replacing whatever was tracked before.
    ///
    /// An invalid session leaves the tracker idle and emits nothing.
    pub fn start(&mut self, session: RouteSession) -> NavResult<()> {
        if let Err(e) = session.validate() {
            warn!("Refusing to start navigation: {}", e);
            self.session = None;
            self.state = NavigationState::idle();
            return Err(e);
        }

        let first = &session.steps()[0];
        self.state = NavigationState {
            phase: TrackerPhase::Tracking,
            current_step_index: 0,
            distance_to_next_maneuver_meters: first.effective_distance_meters(),
            time_to_next_maneuver_seconds: first.duration_seconds,
            distance_remaining_meters: session.total_distance_meters(),
            time_remaining_seconds: session.total_duration_seconds(),
            next_instruction: Some(Instruction::Maneuver(StepInstruction::from_step(0, first))),
            ..NavigationState::idle()
        };

        info!(
            "Navigation started: {} steps, {:.1} m, {:.0} s",
            session.steps().len(),
            session.total_distance_meters(),
            session.total_duration_seconds()
        );

        // Nothing to walk: every step is zero-length
        if session.measured_length_meters() <= 0.0 {
            info!("Route has no length, arriving immediately");
            self.state.phase = TrackerPhase::Arrived;
            self.state.current_step_index = session.steps().len();
            self.zero_progress();
            self.session = Some(session);
            self.dispatcher.emit_route_complete();
            self.dispatcher.emit_update(&self.state);
            return Ok(());
        }

        self.session = Some(session);
        self.dispatcher.emit_update(&self.state);
        Ok(())
    }

    /// Build a session from a route acquisition result and start it.
    pub fn start_route(
        &mut self,
        coordinates: Vec<Coordinate>,
        steps: Vec<RawStep>,
        summary: RouteSummary,
    ) -> NavResult<()> {
        match RouteSession::build(coordinates, steps, summary) {
            Ok(session) => self.start(session),
            Err(e) => {
                warn!("Refusing to start navigation: {}", e);
                self.session = None;
                self.state = NavigationState::idle();
                Err(e)
            }
        }
    }

    /// Drop the session and emit one zeroed snapshot.
    pub fn stop(&mut self) {
        info!("Navigation stopped");
        self.session = None;
        self.state = NavigationState::idle();
        self.dispatcher.emit_update(&self.state);
    }

    /// Advance the navigation state with one GPS fix.
    pub fn update(&mut self, sample: &PositionSample) -> UpdateOutcome {
        match self.process(sample) {
            Ok(outcome) => outcome,
            Err(e) => {
                // Geometry was validated when the session started
                warn!("Skipping position fix: {}", e);
                UpdateOutcome::Inactive
            }
        }
    }

    fn zero_progress(&mut self) {
        self.state.distance_to_next_maneuver_meters = 0.0;
        self.state.time_to_next_maneuver_seconds = 0.0;
        self.state.distance_remaining_meters = 0.0;
        self.state.time_remaining_seconds = 0.0;
        self.state.distance_traveled_on_step_meters = 0.0;
        self.state.next_instruction = Some(Instruction::arrived());
    }

    fn process(&mut self, sample: &PositionSample) -> NavResult<UpdateOutcome> {
        if self.state.phase != TrackerPhase::Tracking {
            return Ok(UpdateOutcome::Inactive);
        }
        let Some(session) = self.session.as_ref() else {
            return Ok(UpdateOutcome::Inactive);
        };

        if let Some(accuracy) = sample.accuracy_meters {
            if accuracy.is_nan() || accuracy > self.config.min_accuracy_threshold_meters {
                debug!("GPS accuracy poor ({:.1} m), skipping update", accuracy);
                return Ok(UpdateOutcome::InaccurateSample);
            }
        }

        let point = sample.coordinate;
        let on_route = nearest_point_on_line(session.full_geometry(), point)?;

        self.state.current_speed_mps = sample.speed_mps;
        self.state.current_heading_degrees = sample.heading_degrees;
        self.state.last_sample_timestamp_ms = Some(sample.timestamp_ms);

        let threshold = self.config.off_route_threshold_meters;
        let heading_away = self.config.heading_check.as_ref().is_some_and(|check| {
            heading_suggests_off_route(check, threshold, sample, &on_route, session.full_geometry())
        });
        if on_route.distance_from_line_meters > threshold || heading_away {
            if !self.state.is_off_route {
                warn!(
                    "Off route: {:.1} m from the route at {}",
                    on_route.distance_from_line_meters, point
                );
                self.state.is_off_route = true;
                self.dispatcher.emit_off_route(point);
            }
        } else if self.state.is_off_route {
            info!("Back on route");
            self.state.is_off_route = false;
        }

        let step_index = self.state.current_step_index;
        let Some(step) = session.step(step_index) else {
            warn!("No step at index {}, waiting for a new route", step_index);
            self.state.is_off_route = true;
            self.state.snapped_coordinate = Some(on_route.point);
            self.dispatcher.emit_update(&self.state);
            return Ok(UpdateOutcome::StepUnavailable);
        };

        let on_step = nearest_point_on_line(&step.geometry, point)?;
        let remaining_on_step = (step.measured_length_meters - on_step.distance_along_line_meters).max(0.0);
        self.state.distance_traveled_on_step_meters = on_step.distance_along_line_meters;
        self.state.distance_to_next_maneuver_meters = remaining_on_step;
        self.state.time_to_next_maneuver_seconds = step_time_remaining(step, remaining_on_step);
        self.state.snapped_coordinate = Some(on_step.point);

        let mut outcome = UpdateOutcome::Progressed;
        if remaining_on_step <= self.config.step_completion_threshold_meters {
            let completed = StepInstruction::from_step(step_index, step);
            let next_index = step_index + 1;

            match session.step(next_index) {
                None => {
                    info!("Arrived at destination");
                    self.state.phase = TrackerPhase::Arrived;
                    self.state.current_step_index = session.steps().len();
                    self.zero_progress();
                    self.dispatcher.emit_step_complete(step_index, &completed);
                    self.dispatcher.emit_route_complete();
                    self.dispatcher.emit_update(&self.state);
                    return Ok(UpdateOutcome::Arrived);
                }
                Some(next) => {
                    self.state.current_step_index = next_index;
                    self.state.next_instruction =
                        Some(Instruction::Maneuver(StepInstruction::from_step(next_index, next)));
                    self.state.distance_traveled_on_step_meters = 0.0;
                    // until the next fix lands on the new step
                    self.state.distance_to_next_maneuver_meters = next.effective_distance_meters();
                    self.state.time_to_next_maneuver_seconds = next.duration_seconds;
                    info!("Advanced to step {}: {}", next_index, next.maneuver.instruction);
                    self.dispatcher.emit_step_complete(step_index, &completed);
                    outcome = UpdateOutcome::StepCompleted { step_index };
                }
            }
        }

        let total_distance = session.total_distance_meters();
        let total_duration = session.total_duration_seconds();
        let completed_distance: f64 = session.steps()[..self.state.current_step_index]
            .iter()
            .map(RouteStep::effective_distance_meters)
            .sum();
        let traveled = (completed_distance + self.state.distance_traveled_on_step_meters).min(total_distance);
        let remaining = (total_distance - traveled).max(0.0);

        self.state.distance_remaining_meters = remaining;
        self.state.time_remaining_seconds = if total_distance > 0.0 && total_duration > 0.0 {
            total_duration * (remaining / total_distance)
        } else {
            total_duration
        };

        debug!("{}", self.state);
        self.dispatcher.emit_update(&self.state);
        Ok(outcome)
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}
