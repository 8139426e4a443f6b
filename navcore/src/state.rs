use serde::Serialize;

use crate::geometry::Coordinate;
use crate::route::RouteStep;

pub const ARRIVED_INSTRUCTION: &str = "You have arrived at your destination.";

/// Top-level tracker phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerPhase {
    Idle,
    Tracking,
    Arrived,
}

/// Maneuver data of the step currently being followed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepInstruction {
    pub step_index: usize,
    pub instruction: String,
    pub maneuver_type: String,
    pub modifier: Option<String>,
    pub street_name: String,
    pub location: Coordinate,
    pub bearing_after: Option<f64>,
}

impl StepInstruction {
    pub fn from_step(step_index: usize, step: &RouteStep) -> Self {
        Self {
            step_index,
            instruction: step.maneuver.instruction.clone(),
            maneuver_type: step.maneuver.maneuver_type.clone(),
            modifier: step.maneuver.modifier.clone(),
            street_name: step.street_name.clone(),
            location: step.maneuver.location,
            bearing_after: step.maneuver.bearing_after,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Instruction {
    Maneuver(StepInstruction),
    Arrived { instruction: String },
}

impl Instruction {
    pub fn arrived() -> Self {
        Instruction::Arrived {
            instruction: ARRIVED_INSTRUCTION.to_string(),
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Instruction::Maneuver(step) => &step.instruction,
            Instruction::Arrived { instruction } => instruction,
        }
    }
}

/// Progress along the active route. Owned by the tracker; listeners only
/// ever see it by reference or as a clone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavigationState {
    pub phase: TrackerPhase,
    /// Equal to the step count once arrived
    pub current_step_index: usize,
    pub distance_to_next_maneuver_meters: f64,
    pub time_to_next_maneuver_seconds: f64,
    pub distance_remaining_meters: f64,
    pub time_remaining_seconds: f64,
    pub next_instruction: Option<Instruction>,
    pub is_off_route: bool,
    pub current_speed_mps: Option<f64>,
    pub current_heading_degrees: Option<f64>,
    pub last_sample_timestamp_ms: Option<i64>,
    pub distance_traveled_on_step_meters: f64,
    pub snapped_coordinate: Option<Coordinate>,
}

impl NavigationState {
    pub fn idle() -> Self {
        Self {
            phase: TrackerPhase::Idle,
            current_step_index: 0,
            distance_to_next_maneuver_meters: 0.0,
            time_to_next_maneuver_seconds: 0.0,
            distance_remaining_meters: 0.0,
            time_remaining_seconds: 0.0,
            next_instruction: None,
            is_off_route: false,
            current_speed_mps: None,
            current_heading_degrees: None,
            last_sample_timestamp_ms: None,
            distance_traveled_on_step_meters: 0.0,
            snapped_coordinate: None,
        }
    }

    pub fn has_arrived(&self) -> bool {
        self.phase == TrackerPhase::Arrived
    }
}

impl Default for NavigationState {
    fn default() -> Self {
        Self::idle()
    }
}

impl std::fmt::Display for NavigationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let instruction = self
            .next_instruction
            .as_ref()
            .map(Instruction::text)
            .unwrap_or("-");
        write!(
            f,
            "[{:?}] step {} | next maneuver {:.0} m / {:.0} s | remaining {:.0} m / {:.0} s | {}{}",
            self.phase,
            self.current_step_index,
            self.distance_to_next_maneuver_meters,
            self.time_to_next_maneuver_seconds,
            self.distance_remaining_meters,
            self.time_remaining_seconds,
            instruction,
            if self.is_off_route { " | OFF ROUTE" } else { "" }
        )
    }
}
