//! CVRP formulations: one model-building strategy per family.
//!
//! Each variant turns a distance matrix, a demand vector, and a capacity
//! spec into a [`ConstraintModel`], and knows how to read the solved
//! arc-selection variables back out into routes. Selection happens through
//! the closed [`Formulation`] type, never free-form text.

use serde::{Deserialize, Serialize};

use crate::decode::{self, DecodeError, DecodeMode};
use crate::matrix::CostMatrix;
use crate::model::{ConstraintModel, LinExpr, Sense, VarKey};
use crate::solver::InputError;

/// A binary variable above this value counts as selected.
const SELECTED: f64 = 0.5;

/// Vehicle capacity specification.
///
/// Deserializes untagged, so a request body may carry either a single
/// number (one capacity for every vehicle) or a sequence (per-vehicle
/// capacities, 3-index model only; the length fixes the fleet size).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Capacity {
    Uniform(f64),
    PerVehicle(Vec<f64>),
}

impl Capacity {
    /// Number of vehicles: `ceil(total demand / capacity)` when uniform,
    /// the sequence length otherwise.
    pub fn fleet_size(&self, total_demand: f64) -> usize {
        match self {
            Capacity::Uniform(capacity) => (total_demand / capacity).ceil() as usize,
            Capacity::PerVehicle(capacities) => capacities.len(),
        }
    }

    /// Expands to one capacity per vehicle.
    pub fn per_vehicle(&self, total_demand: f64) -> Vec<f64> {
        match self {
            Capacity::Uniform(capacity) => vec![*capacity; self.fleet_size(total_demand)],
            Capacity::PerVehicle(capacities) => capacities.clone(),
        }
    }
}

/// The three supported model families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Formulation {
    /// Asymmetric single-commodity vehicle flow with load-tracking cuts.
    VehicleFlow,
    /// 3-index multi-vehicle flow with explicit per-vehicle capacities.
    ThreeIndex,
    /// Undirected two-commodity flow over a symmetrized matrix.
    CommodityFlow,
}

impl Formulation {
    /// Resolves a formulation from its request name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "vrp1" | "vehicle-flow" => Some(Formulation::VehicleFlow),
            "vrp3" | "three-index" => Some(Formulation::ThreeIndex),
            "vrp4" | "commodity-flow" => Some(Formulation::CommodityFlow),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Formulation::VehicleFlow => "vehicle-flow",
            Formulation::ThreeIndex => "three-index",
            Formulation::CommodityFlow => "commodity-flow",
        }
    }

    /// Builds the constraint model for this formulation.
    ///
    /// `distances` is the provider matrix in location order; its diagonal
    /// is meaningless and gets overwritten with the unreachable sentinel.
    pub fn build(
        &self,
        distances: &[Vec<f64>],
        demands: &[f64],
        capacity: &Capacity,
    ) -> Result<ConstraintModel, InputError> {
        let total_demand: f64 = demands.iter().sum();
        match self {
            Formulation::VehicleFlow => {
                let uniform = uniform_capacity(capacity)?;
                let fleet = capacity.fleet_size(total_demand);
                let mut costs = CostMatrix::new(distances.to_vec());
                costs.forbid_self_loops();
                Ok(build_vehicle_flow(&costs, demands, uniform, fleet))
            }
            Formulation::ThreeIndex => {
                let capacities = capacity.per_vehicle(total_demand);
                let mut costs = CostMatrix::new(distances.to_vec());
                costs.forbid_self_loops();
                Ok(build_three_index(&costs, demands, &capacities))
            }
            Formulation::CommodityFlow => {
                let uniform = uniform_capacity(capacity)?;
                let fleet = capacity.fleet_size(total_demand);
                let mut costs = CostMatrix::new(distances.to_vec());
                costs.symmetrize();
                costs.append_depot_copy();
                costs.forbid_self_loops();
                Ok(build_commodity_flow(&costs, demands, uniform, fleet))
            }
        }
    }

    /// Reads the solved arc selections back into depot-anchored routes.
    ///
    /// Runs the coverage and per-route capacity sanity checks before
    /// returning; a failure there means the solver's assignment broke the
    /// decoder's contract.
    pub fn decode(
        &self,
        model: &ConstraintModel,
        values: &[f64],
        demands: &[f64],
        capacity: &Capacity,
    ) -> Result<Vec<Vec<usize>>, DecodeError> {
        let node_count = demands.len();
        let total_demand: f64 = demands.iter().sum();
        match self {
            Formulation::VehicleFlow | Formulation::CommodityFlow => {
                let mode = match self {
                    Formulation::VehicleFlow => DecodeMode::Directed,
                    _ => DecodeMode::UndirectedFold,
                };
                let selected = selected_arcs(model, values);
                let routes = decode::decode_routes(&selected, node_count, mode)?;
                let route_capacity = match capacity {
                    Capacity::Uniform(value) => *value,
                    // Never reached through solve(): per-vehicle capacities
                    // are rejected for these formulations up front.
                    Capacity::PerVehicle(capacities) => {
                        capacities.iter().cloned().fold(0.0, f64::max)
                    }
                };
                let capacities = vec![route_capacity; routes.len()];
                decode::verify_routes(&routes, demands, &capacities)?;
                Ok(routes)
            }
            Formulation::ThreeIndex => {
                let mut routes = Vec::new();
                let mut route_capacities = Vec::new();
                for (vehicle, &vehicle_capacity) in
                    capacity.per_vehicle(total_demand).iter().enumerate()
                {
                    let selected = selected_vehicle_arcs(model, values, vehicle);
                    if selected.is_empty() {
                        continue;
                    }
                    for route in decode::decode_routes(&selected, node_count, DecodeMode::Directed)?
                    {
                        routes.push(route);
                        route_capacities.push(vehicle_capacity);
                    }
                }
                decode::verify_routes(&routes, demands, &route_capacities)?;
                Ok(routes)
            }
        }
    }
}

fn uniform_capacity(capacity: &Capacity) -> Result<f64, InputError> {
    match capacity {
        Capacity::Uniform(value) => Ok(*value),
        Capacity::PerVehicle(_) => Err(InputError::PerVehicleCapacityUnsupported),
    }
}

/// Whether an arc may carry a decision variable.
///
/// Unreachable arcs (the sentinel diagonal, unroutable provider entries)
/// get none, and neither does a pair whose combined demand can never share
/// a vehicle: omitting the variable both prunes the model and forbids the
/// arc.
fn arc_allowed(
    costs: &CostMatrix,
    demands: &[f64],
    capacity: f64,
    from: usize,
    to: usize,
) -> bool {
    from != to && costs.is_reachable(from, to) && demands[from] + demands[to] <= capacity
}

fn degree_expr(model: &ConstraintModel, node_count: usize, node: usize, incoming: bool) -> LinExpr {
    let mut expr = LinExpr::new();
    for other in 0..node_count {
        let key = if incoming {
            VarKey::Arc {
                from: other,
                to: node,
            }
        } else {
            VarKey::Arc {
                from: node,
                to: other,
            }
        };
        if let Some(var) = model.var(key) {
            expr.add(var, 1.0);
        }
    }
    expr
}

// ============================================================================
// Vehicle flow (asymmetric single-commodity)
// ============================================================================

fn build_vehicle_flow(
    costs: &CostMatrix,
    demands: &[f64],
    capacity: f64,
    fleet: usize,
) -> ConstraintModel {
    let node_count = costs.len();
    let mut model = ConstraintModel::new("vehicle-flow");
    let mut objective = LinExpr::new();

    for from in 0..node_count {
        for to in 0..node_count {
            if !arc_allowed(costs, demands, capacity, from, to) {
                continue;
            }
            let arc = model.binary(VarKey::Arc { from, to });
            objective.add(arc, costs.cost(from, to));
        }
    }
    for node in 1..node_count {
        model.continuous(VarKey::Load { node }, demands[node], capacity);
    }

    // One selected arc into and out of every stop; the depot sees the
    // whole fleet.
    for node in 1..node_count {
        let inbound = degree_expr(&model, node_count, node, true);
        model.constrain(inbound, Sense::Eq, 1.0);
        let outbound = degree_expr(&model, node_count, node, false);
        model.constrain(outbound, Sense::Eq, 1.0);
    }
    let depot_in = degree_expr(&model, node_count, 0, true);
    model.constrain(depot_in, Sense::Eq, fleet as f64);
    let depot_out = degree_expr(&model, node_count, 0, false);
    model.constrain(depot_out, Sense::Eq, fleet as f64);

    // Load tracking doubles as sub-tour elimination: selecting i -> j
    // forces u[j] >= u[i] + d[j].
    for from in 1..node_count {
        for to in 1..node_count {
            let Some(arc) = model.var(VarKey::Arc { from, to }) else {
                continue;
            };
            let (Some(load_from), Some(load_to)) = (
                model.var(VarKey::Load { node: from }),
                model.var(VarKey::Load { node: to }),
            ) else {
                continue;
            };
            let cut = LinExpr::new()
                .term(load_from, 1.0)
                .term(load_to, -1.0)
                .term(arc, capacity);
            model.constrain(cut, Sense::Le, capacity - demands[to]);
        }
    }

    model.minimize(objective);
    model
}

// ============================================================================
// 3-index (explicit per-vehicle capacities)
// ============================================================================

fn build_three_index(costs: &CostMatrix, demands: &[f64], capacities: &[f64]) -> ConstraintModel {
    let node_count = costs.len();
    let fleet = capacities.len();
    let mut model = ConstraintModel::new("three-index");
    let mut objective = LinExpr::new();

    for (vehicle, &capacity) in capacities.iter().enumerate() {
        for from in 0..node_count {
            for to in 0..node_count {
                if !arc_allowed(costs, demands, capacity, from, to) {
                    continue;
                }
                let arc = model.binary(VarKey::VehicleArc { from, to, vehicle });
                objective.add(arc, costs.cost(from, to));
            }
        }
    }
    for vehicle in 0..fleet {
        for node in 0..node_count {
            model.binary(VarKey::Assign { node, vehicle });
        }
        for node in 1..node_count {
            model.continuous(VarKey::VehicleLoad { node, vehicle }, 0.0, capacities[vehicle]);
        }
    }

    // Every stop rides exactly one vehicle; the depot rides them all.
    for node in 1..node_count {
        let mut assigned = LinExpr::new();
        for vehicle in 0..fleet {
            if let Some(assign) = model.var(VarKey::Assign { node, vehicle }) {
                assigned.add(assign, 1.0);
            }
        }
        model.constrain(assigned, Sense::Eq, 1.0);
    }
    for vehicle in 0..fleet {
        if let Some(depot) = model.var(VarKey::Assign { node: 0, vehicle }) {
            model.constrain(LinExpr::new().term(depot, 1.0), Sense::Eq, 1.0);
        }
    }

    // Per-vehicle flow conservation: in and out degree both equal the
    // assignment indicator.
    for vehicle in 0..fleet {
        for node in 0..node_count {
            let Some(assign) = model.var(VarKey::Assign { node, vehicle }) else {
                continue;
            };
            let mut outbound = vehicle_degree_expr(&model, node_count, node, vehicle, false);
            outbound.add(assign, -1.0);
            model.constrain(outbound, Sense::Eq, 0.0);
            let mut inbound = vehicle_degree_expr(&model, node_count, node, vehicle, true);
            inbound.add(assign, -1.0);
            model.constrain(inbound, Sense::Eq, 0.0);
        }
    }

    // Load tracking, per vehicle with that vehicle's capacity. The load is
    // tied to the assignment indicator so an unassigned node leaves the
    // vehicle's ledger untouched.
    for (vehicle, &capacity) in capacities.iter().enumerate() {
        for from in 1..node_count {
            for to in 1..node_count {
                let Some(arc) = model.var(VarKey::VehicleArc { from, to, vehicle }) else {
                    continue;
                };
                let (Some(load_from), Some(load_to)) = (
                    model.var(VarKey::VehicleLoad {
                        node: from,
                        vehicle,
                    }),
                    model.var(VarKey::VehicleLoad { node: to, vehicle }),
                ) else {
                    continue;
                };
                let cut = LinExpr::new()
                    .term(load_from, 1.0)
                    .term(load_to, -1.0)
                    .term(arc, capacity);
                model.constrain(cut, Sense::Le, capacity - demands[to]);
            }
        }
        for node in 1..node_count {
            let (Some(load), Some(assign)) = (
                model.var(VarKey::VehicleLoad { node, vehicle }),
                model.var(VarKey::Assign { node, vehicle }),
            ) else {
                continue;
            };
            let floor = LinExpr::new().term(load, 1.0).term(assign, -demands[node]);
            model.constrain(floor, Sense::Ge, 0.0);
        }
    }

    model.minimize(objective);
    model
}

fn vehicle_degree_expr(
    model: &ConstraintModel,
    node_count: usize,
    node: usize,
    vehicle: usize,
    incoming: bool,
) -> LinExpr {
    let mut expr = LinExpr::new();
    for other in 0..node_count {
        let key = if incoming {
            VarKey::VehicleArc {
                from: other,
                to: node,
                vehicle,
            }
        } else {
            VarKey::VehicleArc {
                from: node,
                to: other,
                vehicle,
            }
        };
        if let Some(var) = model.var(key) {
            expr.add(var, 1.0);
        }
    }
    expr
}

// ============================================================================
// Two-commodity flow (undirected, symmetrized matrix with depot copy)
// ============================================================================

fn build_commodity_flow(
    costs: &CostMatrix,
    demands: &[f64],
    capacity: f64,
    fleet: usize,
) -> ConstraintModel {
    // The matrix already carries the synthetic depot copy as its last node.
    let extended = costs.len();
    let copy = extended - 1;
    let total_demand: f64 = demands.iter().sum();
    let fleet_capacity = fleet as f64 * capacity;
    let mut model = ConstraintModel::new("commodity-flow");
    let mut objective = LinExpr::new();

    for from in 0..extended {
        for to in (from + 1)..extended {
            if !costs.is_reachable(from, to) {
                continue;
            }
            let edge = model.binary(VarKey::Arc { from, to });
            objective.add(edge, costs.cost(from, to));
            model.continuous(VarKey::Flow { from, to }, 0.0, capacity);
            model.continuous(VarKey::Flow { from: to, to: from }, 0.0, capacity);
        }
    }

    // Inflow minus outflow equals twice the demand at each stop.
    for node in 1..copy {
        let mut balance = LinExpr::new();
        for other in 0..extended {
            if other == node {
                continue;
            }
            if let Some(inflow) = model.var(VarKey::Flow {
                from: other,
                to: node,
            }) {
                balance.add(inflow, 1.0);
            }
            if let Some(outflow) = model.var(VarKey::Flow {
                from: node,
                to: other,
            }) {
                balance.add(outflow, -1.0);
            }
        }
        model.constrain(balance, Sense::Eq, 2.0 * demands[node]);
    }

    // The depot sends out exactly the total demand, takes back the fleet's
    // slack, and the copy emits the full fleet capacity.
    let mut depot_out = LinExpr::new();
    let mut depot_in = LinExpr::new();
    let mut copy_out = LinExpr::new();
    for node in 1..copy {
        if let Some(var) = model.var(VarKey::Flow { from: 0, to: node }) {
            depot_out.add(var, 1.0);
        }
        if let Some(var) = model.var(VarKey::Flow { from: node, to: 0 }) {
            depot_in.add(var, 1.0);
        }
        if let Some(var) = model.var(VarKey::Flow {
            from: copy,
            to: node,
        }) {
            copy_out.add(var, 1.0);
        }
    }
    model.constrain(depot_out, Sense::Eq, total_demand);
    model.constrain(depot_in, Sense::Eq, fleet_capacity - total_demand);
    model.constrain(copy_out, Sense::Eq, fleet_capacity);

    // Each selected edge carries exactly one vehicle's worth of flow.
    for from in 0..extended {
        for to in (from + 1)..extended {
            let Some(edge) = model.var(VarKey::Arc { from, to }) else {
                continue;
            };
            let (Some(forward), Some(backward)) = (
                model.var(VarKey::Flow { from, to }),
                model.var(VarKey::Flow { from: to, to: from }),
            ) else {
                continue;
            };
            let coupling = LinExpr::new()
                .term(forward, 1.0)
                .term(backward, 1.0)
                .term(edge, -capacity);
            model.constrain(coupling, Sense::Eq, 0.0);
        }
    }

    // Two incident selected edges per stop.
    for node in 1..copy {
        let mut degree = LinExpr::new();
        for other in 0..extended {
            if other == node {
                continue;
            }
            let key = VarKey::Arc {
                from: node.min(other),
                to: node.max(other),
            };
            if let Some(var) = model.var(key) {
                degree.add(var, 1.0);
            }
        }
        model.constrain(degree, Sense::Eq, 2.0);
    }

    model.minimize(objective);
    model
}

// ============================================================================
// Arc extraction
// ============================================================================

fn selected_arcs(model: &ConstraintModel, values: &[f64]) -> Vec<(usize, usize)> {
    model
        .variables()
        .iter()
        .enumerate()
        .filter(|&(position, _)| values[position] > SELECTED)
        .filter_map(|(_, variable)| match variable.key {
            VarKey::Arc { from, to } => Some((from, to)),
            _ => None,
        })
        .collect()
}

fn selected_vehicle_arcs(
    model: &ConstraintModel,
    values: &[f64],
    vehicle: usize,
) -> Vec<(usize, usize)> {
    model
        .variables()
        .iter()
        .enumerate()
        .filter(|&(position, _)| values[position] > SELECTED)
        .filter_map(|(_, variable)| match variable.key {
            VarKey::VehicleArc {
                from,
                to,
                vehicle: owner,
            } if owner == vehicle => Some((from, to)),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fleet_size_rounds_up() {
        assert_eq!(Capacity::Uniform(15.0).fleet_size(17.0), 2);
        assert_eq!(Capacity::Uniform(15.0).fleet_size(15.0), 1);
        assert_eq!(Capacity::Uniform(15.0).fleet_size(0.0), 0);
        assert_eq!(Capacity::PerVehicle(vec![10.0, 20.0]).fleet_size(17.0), 2);
    }

    #[test]
    fn scalar_capacity_expands_to_fleet() {
        assert_eq!(
            Capacity::Uniform(15.0).per_vehicle(17.0),
            vec![15.0, 15.0]
        );
    }

    #[test]
    fn names_round_trip() {
        for formulation in [
            Formulation::VehicleFlow,
            Formulation::ThreeIndex,
            Formulation::CommodityFlow,
        ] {
            assert_eq!(Formulation::from_name(formulation.name()), Some(formulation));
        }
        assert_eq!(Formulation::from_name("vrp1"), Some(Formulation::VehicleFlow));
        assert_eq!(Formulation::from_name("vrp2"), None);
    }

    #[test]
    fn capacity_deserializes_untagged() {
        let uniform: Capacity = serde_json::from_str("15.0").unwrap();
        assert_eq!(uniform, Capacity::Uniform(15.0));
        let per_vehicle: Capacity = serde_json::from_str("[10.0, 20.0]").unwrap();
        assert_eq!(per_vehicle, Capacity::PerVehicle(vec![10.0, 20.0]));
    }
}
