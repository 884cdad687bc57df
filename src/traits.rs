//! Core traits for the routing planner's external collaborators.
//!
//! These are intentionally minimal. The planner talks to two services it
//! does not own: a mapping provider that turns locations into travel
//! matrices, and a mixed-integer solver engine that optimizes a constraint
//! model. Concrete adapters implement them for their own backends.

use std::fmt;
use std::time::Duration;

use crate::model::ConstraintModel;

/// Travel matrices for an ordered list of locations.
///
/// Both matrices are square with one row per location, in input order.
/// Diagonal entries are meaningless; the planner overwrites them.
#[derive(Debug, Clone, PartialEq)]
pub struct TravelMatrices {
    /// Pairwise travel distances in meters.
    pub distances: Vec<Vec<f64>>,
    /// Pairwise travel durations in seconds.
    pub durations: Vec<Vec<f64>>,
}

/// Provides distance/duration matrices for a set of locations.
///
/// The matrices are indexed by the provided location order.
pub trait DistanceMatrixProvider {
    fn matrices_for(&self, locations: &[(f64, f64)]) -> Result<TravelMatrices, MatrixError>;
}

/// Failure talking to a distance-matrix provider.
#[derive(Debug)]
pub enum MatrixError {
    /// Transport-level failure (connection, HTTP status, deserialization).
    Transport(String),
    /// The provider answered, but with a malformed or incomplete table.
    BadResponse(String),
}

impl fmt::Display for MatrixError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatrixError::Transport(message) => write!(f, "provider transport error: {}", message),
            MatrixError::BadResponse(message) => write!(f, "bad provider response: {}", message),
        }
    }
}

/// Optional budget forwarded to the solver engine.
///
/// The engine must respect these rather than block indefinitely; running
/// out of budget is reported as [`EngineStatus::TimedOut`].
#[derive(Debug, Clone, Default)]
pub struct SolveLimits {
    /// Wall-clock budget for the optimization call.
    pub time_limit: Option<Duration>,
    /// Iteration/node budget, in engine-defined units.
    pub iteration_limit: Option<u64>,
}

/// Terminal state reported by the solver engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    /// A provably optimal assignment was found.
    Optimal,
    /// The constraint set admits no assignment.
    Infeasible,
    /// The objective is unbounded below.
    Unbounded,
    /// The time or iteration budget ran out before a proof.
    TimedOut,
}

/// The engine's answer for one optimization call.
#[derive(Debug, Clone)]
pub struct EngineSolution {
    pub status: EngineStatus,
    /// Value per decision variable, indexed by `Var::index`.
    /// Empty unless the status is [`EngineStatus::Optimal`].
    pub values: Vec<f64>,
    /// Objective value of the returned assignment.
    pub objective: f64,
}

/// Engine-internal runtime failure (license, crash, numerical breakdown).
///
/// Distinct from infeasibility or unboundedness, which are properties of
/// the instance and come back as an [`EngineStatus`].
#[derive(Debug)]
pub struct EngineError {
    pub message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "solver engine error: {}", self.message)
    }
}

/// An external mixed-integer solver engine.
///
/// The planner hands over a complete [`ConstraintModel`] and expects back a
/// status plus, on success, a concrete value for every decision variable.
/// How the engine searches (branch-and-bound, cutting planes, ...) is its
/// own business.
pub trait SolverEngine {
    fn optimize(
        &self,
        model: &ConstraintModel,
        limits: &SolveLimits,
    ) -> Result<EngineSolution, EngineError>;
}
