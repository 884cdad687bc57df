//! Solve orchestration: validate, build, optimize, decode, assemble.
//!
//! The whole path runs synchronously inside the caller's thread; every
//! data structure is request-scoped, so concurrent solves need no locking.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::formulation::{Capacity, Formulation};
use crate::traits::{DistanceMatrixProvider, EngineStatus, SolveLimits, SolverEngine};

/// One solve request: locations (depot first), per-stop demands, capacity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveRequest {
    /// Latitude/longitude pairs; index 0 is the depot.
    pub locations: Vec<(f64, f64)>,
    /// One demand per location; the depot's is zero.
    pub demands: Vec<f64>,
    pub capacity: Capacity,
}

/// Terminal status of a solve, serialized with the response-contract names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SolveStatus {
    #[serde(rename = "optimal")]
    Optimal,
    #[serde(rename = "infeasible")]
    Infeasible,
    #[serde(rename = "unbounded")]
    Unbounded,
    #[serde(rename = "timeout")]
    Timeout,
    #[serde(rename = "invalid-input")]
    InvalidInput,
    #[serde(rename = "unknown model")]
    UnknownModel,
    #[serde(rename = "decode-error")]
    DecodeError,
    #[serde(rename = "error")]
    Error,
}

impl SolveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SolveStatus::Optimal => "optimal",
            SolveStatus::Infeasible => "infeasible",
            SolveStatus::Unbounded => "unbounded",
            SolveStatus::Timeout => "timeout",
            SolveStatus::InvalidInput => "invalid-input",
            SolveStatus::UnknownModel => "unknown model",
            SolveStatus::DecodeError => "decode-error",
            SolveStatus::Error => "error",
        }
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The response contract: a status, plus routes only when optimal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolveResponse {
    pub status: SolveStatus,
    /// Each route is an ordered location sequence starting and ending at
    /// the depot. Present only on [`SolveStatus::Optimal`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routes: Option<Vec<Vec<(f64, f64)>>>,
}

impl SolveResponse {
    fn status_only(status: SolveStatus) -> Self {
        Self {
            status,
            routes: None,
        }
    }
}

/// A request rejected before any model is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputError {
    /// Locations and demands differ in length.
    LengthMismatch,
    /// Fewer than two locations (a depot and at least one stop).
    TooFewLocations,
    /// The depot carries a non-zero demand.
    DepotDemand,
    /// A stop carries a negative demand.
    NegativeDemand { node: usize },
    /// A capacity is zero or negative.
    NonPositiveCapacity,
    /// A per-vehicle capacity sequence is empty.
    EmptyCapacities,
    /// Per-vehicle capacities are only meaningful for the 3-index model.
    PerVehicleCapacityUnsupported,
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::LengthMismatch => write!(f, "locations and demands differ in length"),
            InputError::TooFewLocations => write!(f, "need a depot and at least one stop"),
            InputError::DepotDemand => write!(f, "depot demand must be zero"),
            InputError::NegativeDemand { node } => {
                write!(f, "negative demand at location {}", node)
            }
            InputError::NonPositiveCapacity => write!(f, "capacities must be strictly positive"),
            InputError::EmptyCapacities => write!(f, "capacity sequence is empty"),
            InputError::PerVehicleCapacityUnsupported => {
                write!(f, "per-vehicle capacities require the three-index model")
            }
        }
    }
}

fn validate(request: &SolveRequest, formulation: Formulation) -> Result<(), InputError> {
    if request.locations.len() != request.demands.len() {
        return Err(InputError::LengthMismatch);
    }
    if request.locations.len() < 2 {
        return Err(InputError::TooFewLocations);
    }
    if request.demands[0] != 0.0 {
        return Err(InputError::DepotDemand);
    }
    if let Some(node) = request.demands.iter().position(|&demand| demand < 0.0) {
        return Err(InputError::NegativeDemand { node });
    }
    match &request.capacity {
        Capacity::Uniform(capacity) => {
            if *capacity <= 0.0 {
                return Err(InputError::NonPositiveCapacity);
            }
        }
        Capacity::PerVehicle(capacities) => {
            if formulation != Formulation::ThreeIndex {
                return Err(InputError::PerVehicleCapacityUnsupported);
            }
            if capacities.is_empty() {
                return Err(InputError::EmptyCapacities);
            }
            if capacities.iter().any(|&capacity| capacity <= 0.0) {
                return Err(InputError::NonPositiveCapacity);
            }
        }
    }
    Ok(())
}

/// Solves one routing request with the given formulation.
///
/// The provider supplies travel matrices for the request's locations, the
/// engine optimizes the built model, and the solved arc selections are
/// decoded back into location routes. Every failure mode maps onto a
/// [`SolveStatus`]; routes are present only on `optimal`.
pub fn solve<M, E>(
    formulation: Formulation,
    request: &SolveRequest,
    provider: &M,
    engine: &E,
    limits: &SolveLimits,
) -> SolveResponse
where
    M: DistanceMatrixProvider,
    E: SolverEngine,
{
    if let Err(error) = validate(request, formulation) {
        tracing::warn!(%error, "rejecting solve request");
        return SolveResponse::status_only(SolveStatus::InvalidInput);
    }

    let node_count = request.locations.len();
    let matrices = match provider.matrices_for(&request.locations) {
        Ok(matrices) => matrices,
        Err(error) => {
            tracing::warn!(%error, "distance matrix lookup failed");
            return SolveResponse::status_only(SolveStatus::Error);
        }
    };
    if matrices.distances.len() != node_count
        || matrices.distances.iter().any(|row| row.len() != node_count)
    {
        tracing::warn!("provider returned a matrix of the wrong shape");
        return SolveResponse::status_only(SolveStatus::Error);
    }

    let model = match formulation.build(&matrices.distances, &request.demands, &request.capacity) {
        Ok(model) => model,
        Err(error) => {
            tracing::warn!(%error, "rejecting solve request");
            return SolveResponse::status_only(SolveStatus::InvalidInput);
        }
    };
    tracing::debug!(
        model = model.name(),
        variables = model.variable_count(),
        constraints = model.constraint_count(),
        "model built"
    );

    let solution = match engine.optimize(&model, limits) {
        Ok(solution) => solution,
        Err(error) => {
            tracing::warn!(%error, "solver engine failed");
            return SolveResponse::status_only(SolveStatus::Error);
        }
    };
    match solution.status {
        EngineStatus::Infeasible => return SolveResponse::status_only(SolveStatus::Infeasible),
        EngineStatus::Unbounded => return SolveResponse::status_only(SolveStatus::Unbounded),
        EngineStatus::TimedOut => return SolveResponse::status_only(SolveStatus::Timeout),
        EngineStatus::Optimal => {}
    }

    // An objective at the unreachable sentinel means the engine "optimized"
    // through a forbidden arc; treat it as infeasible no matter what the
    // engine's status flag says.
    if !solution.objective.is_finite() {
        tracing::warn!("optimal solution priced an unreachable arc");
        return SolveResponse::status_only(SolveStatus::Infeasible);
    }
    if solution.values.len() != model.variable_count() {
        tracing::warn!(
            expected = model.variable_count(),
            got = solution.values.len(),
            "engine returned a short value vector"
        );
        return SolveResponse::status_only(SolveStatus::Error);
    }

    match formulation.decode(
        &model,
        &solution.values,
        &request.demands,
        &request.capacity,
    ) {
        Ok(routes) => {
            let located = routes
                .iter()
                .map(|route| route.iter().map(|&node| request.locations[node]).collect())
                .collect();
            SolveResponse {
                status: SolveStatus::Optimal,
                routes: Some(located),
            }
        }
        Err(error) => {
            tracing::warn!(%error, "route decoding failed");
            SolveResponse::status_only(SolveStatus::DecodeError)
        }
    }
}

/// Solves a request for a formulation given by its request name.
///
/// Unknown names answer `unknown model` without touching the provider or
/// the engine.
pub fn solve_named<M, E>(
    name: &str,
    request: &SolveRequest,
    provider: &M,
    engine: &E,
    limits: &SolveLimits,
) -> SolveResponse
where
    M: DistanceMatrixProvider,
    E: SolverEngine,
{
    match Formulation::from_name(name) {
        Some(formulation) => solve(formulation, request, provider, engine, limits),
        None => SolveResponse::status_only(SolveStatus::UnknownModel),
    }
}
