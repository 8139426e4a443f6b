use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{NavError, NavResult};
use crate::geometry::{line_length_meters, Coordinate};

/// Maneuver data attached to a step, as delivered by the directions API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Maneuver {
    #[serde(default)]
    pub instruction: String,
    #[serde(rename = "type", default)]
    pub maneuver_type: String,
    #[serde(default)]
    pub modifier: Option<String>,
    pub location: Coordinate,
    #[serde(default)]
    pub bearing_after: Option<f64>,
}

/// One step of a route acquisition result, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStep {
    pub maneuver: Maneuver,
    #[serde(default)]
    pub distance_meters: f64,
    #[serde(default)]
    pub duration_seconds: f64,
    pub geometry_coordinates: Vec<Coordinate>,
    #[serde(default)]
    pub street_name: String,
}

/// Overall route figures reported by the route source. Zero or missing values
/// fall back to measured/summed values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSummary {
    #[serde(default)]
    pub distance_meters: Option<f64>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
}

// Directions API response (`routes[].legs[].steps[]` with GeoJSON geometries)

#[derive(Debug, Clone, Deserialize)]
pub struct DirectionsResponse {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub routes: Vec<DirectionsRoute>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirectionsRoute {
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub duration: f64,
    pub geometry: LineGeometry,
    #[serde(default)]
    pub legs: Vec<DirectionsLeg>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirectionsLeg {
    #[serde(default)]
    pub steps: Vec<DirectionsStep>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirectionsStep {
    pub maneuver: Maneuver,
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub duration: f64,
    pub geometry: LineGeometry,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineGeometry {
    #[serde(default)]
    pub coordinates: Vec<Coordinate>,
}

/// A validated route step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteStep {
    pub geometry: Vec<Coordinate>,
    /// Distance reported by the route source (authoritative when > 0)
    pub distance_meters: f64,
    pub duration_seconds: f64,
    pub maneuver: Maneuver,
    pub street_name: String,
    /// Polyline length of `geometry`
    pub measured_length_meters: f64,
}

impl RouteStep {
    pub fn maneuver_type(&self) -> &str {
        &self.maneuver.maneuver_type
    }

    pub fn location_of_maneuver(&self) -> Coordinate {
        self.maneuver.location
    }

    /// Reported distance, or the measured length when the source gave none.
    pub fn effective_distance_meters(&self) -> f64 {
        if self.distance_meters > 0.0 {
            self.distance_meters
        } else {
            self.measured_length_meters
        }
    }
}

/// Immutable description of a route being followed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteSession {
    full_geometry: Vec<Coordinate>,
    steps: Vec<RouteStep>,
    total_distance_meters: f64,
    total_duration_seconds: f64,
}

fn invalid(message: impl Into<String>) -> NavError {
    NavError::InvalidRoute(message.into())
}

fn check_quantity(value: f64, what: &str, index: usize) -> NavResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(invalid(format!("step {} has invalid {}: {}", index, what, value)));
    }
    Ok(())
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

impl RouteSession {
    /// Validate and normalize a route acquisition result.
    ///
    /// Each step keeps the geometry it was delivered with; the full geometry is
    /// never re-sliced into steps.
    pub fn build(
        coordinates: Vec<Coordinate>,
        raw_steps: Vec<RawStep>,
        summary: RouteSummary,
    ) -> NavResult<Self> {
        if coordinates.len() < 2 {
            return Err(invalid(format!(
                "route geometry needs at least 2 coordinates, got {}",
                coordinates.len()
            )));
        }
        if raw_steps.is_empty() {
            return Err(invalid("route has no steps"));
        }
        if let Some(bad) = coordinates.iter().find(|c| !c.is_valid()) {
            return Err(invalid(format!("route geometry has invalid coordinate {}", bad)));
        }

        let mut steps = Vec::with_capacity(raw_steps.len());
        for (index, raw) in raw_steps.into_iter().enumerate() {
            if raw.geometry_coordinates.len() < 2 {
                return Err(invalid(format!(
                    "step {} geometry needs at least 2 coordinates, got {}",
                    index,
                    raw.geometry_coordinates.len()
                )));
            }
            if let Some(bad) = raw.geometry_coordinates.iter().find(|c| !c.is_valid()) {
                return Err(invalid(format!("step {} has invalid coordinate {}", index, bad)));
            }
            check_quantity(raw.distance_meters, "distance", index)?;
            check_quantity(raw.duration_seconds, "duration", index)?;

            let measured_length_meters = line_length_meters(&raw.geometry_coordinates)?;
            steps.push(RouteStep {
                geometry: raw.geometry_coordinates,
                distance_meters: raw.distance_meters,
                duration_seconds: raw.duration_seconds,
                maneuver: raw.maneuver,
                street_name: raw.street_name,
                measured_length_meters,
            });
        }

        let total_distance_meters = match positive(summary.distance_meters) {
            Some(distance) => distance,
            None => {
                let measured = line_length_meters(&coordinates)?;
                if measured > 0.0 {
                    measured
                } else {
                    steps.iter().map(RouteStep::effective_distance_meters).sum()
                }
            }
        };
        let total_duration_seconds = positive(summary.duration_seconds)
            .unwrap_or_else(|| steps.iter().map(|s| s.duration_seconds).sum());

        debug!(
            "Route session built: {} steps, {:.1} m, {:.0} s",
            steps.len(),
            total_distance_meters,
            total_duration_seconds
        );

        Ok(Self {
            full_geometry: coordinates,
            steps,
            total_distance_meters,
            total_duration_seconds,
        })
    }

    /// Build a session from the first route of a directions response.
    ///
    /// Steps of every leg are concatenated in order.
    pub fn from_directions(response: &DirectionsResponse) -> NavResult<Self> {
        let route = response
            .routes
            .first()
            .ok_or_else(|| invalid("directions response contains no routes"))?;

        let raw_steps = route
            .legs
            .iter()
            .flat_map(|leg| leg.steps.iter())
            .map(|step| RawStep {
                maneuver: step.maneuver.clone(),
                distance_meters: step.distance,
                duration_seconds: step.duration,
                geometry_coordinates: step.geometry.coordinates.clone(),
                street_name: step
                    .name
                    .clone()
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| "Unknown".to_string()),
            })
            .collect();

        Self::build(
            route.geometry.coordinates.clone(),
            raw_steps,
            RouteSummary {
                distance_meters: Some(route.distance),
                duration_seconds: Some(route.duration),
            },
        )
    }

    /// Parse a directions response from JSON and build a session from it.
    pub fn from_directions_json(json: &str) -> NavResult<Self> {
        let response: DirectionsResponse = serde_json::from_str(json)
            .map_err(|e| invalid(format!("malformed directions response: {}", e)))?;
        Self::from_directions(&response)
    }

    /// Re-check the structural invariants `build` establishes.
    pub fn validate(&self) -> NavResult<()> {
        if self.full_geometry.len() < 2 {
            return Err(invalid("route geometry needs at least 2 coordinates"));
        }
        if self.steps.is_empty() {
            return Err(invalid("route has no steps"));
        }
        if let Some(index) = self.steps.iter().position(|s| s.geometry.len() < 2) {
            return Err(invalid(format!("step {} geometry needs at least 2 coordinates", index)));
        }
        if !self.total_distance_meters.is_finite() || self.total_distance_meters < 0.0 {
            return Err(invalid("route total distance is invalid"));
        }
        Ok(())
    }

    pub fn full_geometry(&self) -> &[Coordinate] {
        &self.full_geometry
    }

    pub fn steps(&self) -> &[RouteStep] {
        &self.steps
    }

    pub fn step(&self, index: usize) -> Option<&RouteStep> {
        self.steps.get(index)
    }

    pub fn total_distance_meters(&self) -> f64 {
        self.total_distance_meters
    }

    pub fn total_duration_seconds(&self) -> f64 {
        self.total_duration_seconds
    }

    /// Sum of measured step lengths.
    pub fn measured_length_meters(&self) -> f64 {
        self.steps.iter().map(|s| s.measured_length_meters).sum()
    }
}
