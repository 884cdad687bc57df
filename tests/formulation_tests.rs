//! Formulation model-structure tests
//!
//! Pin down the variables and constraints each formulation emits, and
//! check built models against hand-worked assignments: feasible route
//! sets must satisfy every constraint, sub-tours and overloads must not.

use cvrp_planner::formulation::{Capacity, Formulation};
use cvrp_planner::model::{ConstraintModel, VarKey};

// ============================================================================
// Test Fixtures
// ============================================================================

/// Symmetric grid-ish distances for `n` nodes; values are arbitrary but
/// finite, which is all the builders care about.
fn distances(n: usize) -> Vec<Vec<f64>> {
    (0..n)
        .map(|i| {
            (0..n)
                .map(|j| (i as f64 - j as f64).abs() * 100.0)
                .collect()
        })
        .collect()
}

/// Dense assignment vector with every variable at zero.
fn zero_assignment(model: &ConstraintModel) -> Vec<f64> {
    vec![0.0; model.variable_count()]
}

fn set(model: &ConstraintModel, values: &mut [f64], key: VarKey, value: f64) {
    let var = model
        .var(key)
        .unwrap_or_else(|| panic!("missing variable {:?}", key));
    values[var.index()] = value;
}

fn arc(from: usize, to: usize) -> VarKey {
    VarKey::Arc { from, to }
}

// ============================================================================
// Vehicle flow (vrp1)
// ============================================================================

#[test]
fn vehicle_flow_variable_and_constraint_counts() {
    let demands = [0.0, 4.0, 2.0, 6.0, 5.0];
    let model = Formulation::VehicleFlow
        .build(&distances(5), &demands, &Capacity::Uniform(15.0))
        .unwrap();

    // 20 arcs (all ordered pairs fit together under capacity 15) + 4 loads.
    assert_eq!(model.variable_count(), 24);
    // 8 stop-degree + 2 depot-degree + 12 load-tracking cuts.
    assert_eq!(model.constraint_count(), 22);
}

#[test]
fn vehicle_flow_prunes_and_forbids_heavy_pairs() {
    let demands = [0.0, 4.0, 2.0, 6.0, 5.0];
    let model = Formulation::VehicleFlow
        .build(&distances(5), &demands, &Capacity::Uniform(7.0))
        .unwrap();

    // Stops 1 and 2 (4 + 2) and stops 2 and 4 (2 + 5) still fit together;
    // every other stop pair exceeds capacity 7 and loses its arcs.
    assert!(model.var(arc(1, 2)).is_some());
    assert!(model.var(arc(2, 4)).is_some());
    assert!(model.var(arc(1, 3)).is_none());
    assert!(model.var(arc(3, 4)).is_none());
    // Depot arcs survive for every stop (all demands fit alone).
    for stop in 1..5 {
        assert!(model.var(arc(0, stop)).is_some());
        assert!(model.var(arc(stop, 0)).is_some());
    }
    // 8 depot + 4 stop arcs + 4 loads; 8 + 2 degree + 4 cuts.
    assert_eq!(model.variable_count(), 16);
    assert_eq!(model.constraint_count(), 14);
}

#[test]
fn vehicle_flow_never_creates_self_loops() {
    let demands = [0.0, 4.0, 2.0];
    let model = Formulation::VehicleFlow
        .build(&distances(3), &demands, &Capacity::Uniform(15.0))
        .unwrap();
    for node in 0..3 {
        assert!(model.var(arc(node, node)).is_none());
    }
}

#[test]
fn vehicle_flow_accepts_a_two_route_assignment() {
    let demands = [0.0, 4.0, 2.0, 6.0, 5.0];
    let model = Formulation::VehicleFlow
        .build(&distances(5), &demands, &Capacity::Uniform(15.0))
        .unwrap();

    // Routes 0 -> 1 -> 2 -> 0 and 0 -> 3 -> 4 -> 0 with running loads.
    let mut values = zero_assignment(&model);
    for (from, to) in [(0, 1), (1, 2), (2, 0), (0, 3), (3, 4), (4, 0)] {
        set(&model, &mut values, arc(from, to), 1.0);
    }
    for (node, load) in [(1, 4.0), (2, 6.0), (3, 6.0), (4, 11.0)] {
        set(&model, &mut values, VarKey::Load { node }, load);
    }

    assert_eq!(model.violations(&values), vec![]);
    assert_eq!(model.objective_value(&values), 1200.0);
}

#[test]
fn vehicle_flow_rejects_a_subtour() {
    let demands = [0.0, 4.0, 2.0, 6.0, 5.0];
    let model = Formulation::VehicleFlow
        .build(&distances(5), &demands, &Capacity::Uniform(15.0))
        .unwrap();

    // Two depot loops plus a disconnected 3 <-> 4 cycle. Degrees all hold;
    // only the load-tracking cuts can catch it.
    let mut values = zero_assignment(&model);
    for (from, to) in [(0, 1), (1, 0), (0, 2), (2, 0), (3, 4), (4, 3)] {
        set(&model, &mut values, arc(from, to), 1.0);
    }
    for (node, load) in [(1, 4.0), (2, 2.0), (3, 6.0), (4, 11.0)] {
        set(&model, &mut values, VarKey::Load { node }, load);
    }

    assert!(!model.violations(&values).is_empty());
}

#[test]
fn vehicle_flow_single_heavy_stop_has_no_feasible_load() {
    let demands = [0.0, 20.0];
    let model = Formulation::VehicleFlow
        .build(&distances(2), &demands, &Capacity::Uniform(15.0))
        .unwrap();

    // The stop cannot share a vehicle even with the depot: no arcs exist,
    // so the degree constraints are unsatisfiable for any assignment.
    assert!(model.var(arc(0, 1)).is_none());
    assert!(model.var(arc(1, 0)).is_none());
    let values = zero_assignment(&model);
    assert!(!model.violations(&values).is_empty());
}

// ============================================================================
// 3-index (vrp3)
// ============================================================================

#[test]
fn three_index_variable_and_constraint_counts() {
    let demands = [0.0, 3.0, 4.0];
    let model = Formulation::ThreeIndex
        .build(
            &distances(3),
            &demands,
            &Capacity::PerVehicle(vec![10.0, 20.0]),
        )
        .unwrap();

    // 12 vehicle arcs + 6 assignments + 4 loads.
    assert_eq!(model.variable_count(), 22);
    // 2 stop assignments + 2 depot assignments + 12 conservation
    // + 4 load cuts + 4 load floors.
    assert_eq!(model.constraint_count(), 24);
}

#[test]
fn three_index_scalar_capacity_expands_to_fleet() {
    let demands = [0.0, 4.0, 2.0, 6.0, 5.0];
    let model = Formulation::ThreeIndex
        .build(&distances(5), &demands, &Capacity::Uniform(15.0))
        .unwrap();

    // ceil(17 / 15) = 2 vehicles.
    assert!(
        model
            .var(VarKey::Assign {
                node: 0,
                vehicle: 1
            })
            .is_some()
    );
    assert!(
        model
            .var(VarKey::Assign {
                node: 0,
                vehicle: 2
            })
            .is_none()
    );
}

#[test]
fn three_index_small_vehicle_cannot_reach_heavy_stop() {
    let demands = [0.0, 12.0, 3.0];
    let model = Formulation::ThreeIndex
        .build(
            &distances(3),
            &demands,
            &Capacity::PerVehicle(vec![10.0, 20.0]),
        )
        .unwrap();

    assert!(
        model
            .var(VarKey::VehicleArc {
                from: 0,
                to: 1,
                vehicle: 0
            })
            .is_none()
    );
    assert!(
        model
            .var(VarKey::VehicleArc {
                from: 0,
                to: 1,
                vehicle: 1
            })
            .is_some()
    );
}

#[test]
fn three_index_accepts_a_split_assignment() {
    let demands = [0.0, 3.0, 4.0];
    let model = Formulation::ThreeIndex
        .build(
            &distances(3),
            &demands,
            &Capacity::PerVehicle(vec![10.0, 20.0]),
        )
        .unwrap();

    // Vehicle 0 serves stop 1, vehicle 1 serves stop 2.
    let mut values = zero_assignment(&model);
    for (from, to, vehicle) in [(0, 1, 0), (1, 0, 0), (0, 2, 1), (2, 0, 1)] {
        set(&model, &mut values, VarKey::VehicleArc { from, to, vehicle }, 1.0);
    }
    for (node, vehicle) in [(0, 0), (1, 0), (0, 1), (2, 1)] {
        set(&model, &mut values, VarKey::Assign { node, vehicle }, 1.0);
    }
    set(
        &model,
        &mut values,
        VarKey::VehicleLoad {
            node: 1,
            vehicle: 0,
        },
        3.0,
    );
    set(
        &model,
        &mut values,
        VarKey::VehicleLoad {
            node: 2,
            vehicle: 1,
        },
        4.0,
    );

    assert_eq!(model.violations(&values), vec![]);
}

#[test]
fn three_index_rejects_an_unassigned_departure() {
    let demands = [0.0, 3.0, 4.0];
    let model = Formulation::ThreeIndex
        .build(
            &distances(3),
            &demands,
            &Capacity::PerVehicle(vec![10.0, 20.0]),
        )
        .unwrap();

    // Vehicle 0 drives through stop 1 without the assignment indicator:
    // flow conservation must object.
    let mut values = zero_assignment(&model);
    for (from, to, vehicle) in [(0, 1, 0), (1, 0, 0)] {
        set(&model, &mut values, VarKey::VehicleArc { from, to, vehicle }, 1.0);
    }
    set(
        &model,
        &mut values,
        VarKey::Assign {
            node: 0,
            vehicle: 0,
        },
        1.0,
    );

    assert!(!model.violations(&values).is_empty());
}

// ============================================================================
// Two-commodity flow (vrp4)
// ============================================================================

#[test]
fn commodity_flow_variable_and_constraint_counts() {
    let demands = [0.0, 4.0, 7.0];
    let model = Formulation::CommodityFlow
        .build(&distances(3), &demands, &Capacity::Uniform(15.0))
        .unwrap();

    // 6 undirected edges over 4 nodes (depot copy appended) + 12 flows.
    assert_eq!(model.variable_count(), 18);
    // 2 balance + 3 depot/copy flow totals + 6 couplings + 2 degrees.
    assert_eq!(model.constraint_count(), 13);
}

#[test]
fn commodity_flow_accepts_a_single_route_assignment() {
    let demands = [0.0, 4.0, 7.0];
    let model = Formulation::CommodityFlow
        .build(&distances(3), &demands, &Capacity::Uniform(15.0))
        .unwrap();

    // One vehicle: depot -> 1 -> 2 -> copy, loaded with 11 of 15.
    let mut values = zero_assignment(&model);
    for (from, to) in [(0, 1), (1, 2), (2, 3)] {
        set(&model, &mut values, arc(from, to), 1.0);
    }
    for (from, to, flow) in [
        (0, 1, 11.0),
        (1, 0, 4.0),
        (1, 2, 7.0),
        (2, 1, 8.0),
        (2, 3, 0.0),
        (3, 2, 15.0),
    ] {
        set(&model, &mut values, VarKey::Flow { from, to }, flow);
    }

    assert_eq!(model.violations(&values), vec![]);
}

#[test]
fn commodity_flow_rejects_flow_without_an_edge() {
    let demands = [0.0, 4.0, 7.0];
    let model = Formulation::CommodityFlow
        .build(&distances(3), &demands, &Capacity::Uniform(15.0))
        .unwrap();

    // Flow on the unselected edge 0 - 2 violates its coupling.
    let mut values = zero_assignment(&model);
    set(&model, &mut values, VarKey::Flow { from: 0, to: 2 }, 5.0);
    assert!(!model.violations(&values).is_empty());
}

#[test]
fn commodity_flow_objective_uses_symmetrized_costs() {
    // Asymmetric input: the upper triangle must win for both directions.
    let raw = vec![
        vec![0.0, 100.0, 200.0],
        vec![999.0, 0.0, 300.0],
        vec![999.0, 999.0, 0.0],
    ];
    let demands = [0.0, 4.0, 7.0];
    let model = Formulation::CommodityFlow
        .build(&raw, &demands, &Capacity::Uniform(15.0))
        .unwrap();

    let mut values = zero_assignment(&model);
    set(&model, &mut values, arc(1, 2), 1.0);
    assert_eq!(model.objective_value(&values), 300.0);
}
