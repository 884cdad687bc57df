//! Cost-matrix preparation shared by the formulations.

/// Sentinel cost for an arc that must never be selected.
///
/// Distinguished from every real distance; the formulations skip creating
/// arc variables for unreachable pairs, so the sentinel never reaches the
/// objective directly.
pub const UNREACHABLE: f64 = f64::INFINITY;

/// Square matrix of arc costs, by node index.
#[derive(Debug, Clone, PartialEq)]
pub struct CostMatrix {
    costs: Vec<Vec<f64>>,
}

impl CostMatrix {
    pub fn new(costs: Vec<Vec<f64>>) -> Self {
        debug_assert!(costs.iter().all(|row| row.len() == costs.len()));
        Self { costs }
    }

    /// Number of nodes (rows).
    pub fn len(&self) -> usize {
        self.costs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.costs.is_empty()
    }

    pub fn cost(&self, from: usize, to: usize) -> f64 {
        self.costs[from][to]
    }

    /// Whether an arc may carry a decision variable.
    pub fn is_reachable(&self, from: usize, to: usize) -> bool {
        self.costs[from][to].is_finite()
    }

    /// Overwrites the diagonal with the [`UNREACHABLE`] sentinel.
    pub fn forbid_self_loops(&mut self) {
        for (node, row) in self.costs.iter_mut().enumerate() {
            row[node] = UNREACHABLE;
        }
    }

    /// Forces symmetry by copying the upper triangle over the lower.
    pub fn symmetrize(&mut self) {
        for from in 1..self.costs.len() {
            for to in 0..from {
                self.costs[from][to] = self.costs[to][from];
            }
        }
    }

    /// Appends a synthetic duplicate of the depot as the last row/column.
    ///
    /// The two-commodity model routes vehicles from the depot to this copy
    /// to linearize the undirected circuit into a path. Depot and copy sit
    /// at the same physical point, so their mutual cost is zero.
    pub fn append_depot_copy(&mut self) {
        let depot_row: Vec<f64> = self.costs[0].clone();
        for (from, row) in self.costs.iter_mut().enumerate() {
            row.push(depot_row[from]);
        }
        let mut copy_row = depot_row;
        copy_row.push(0.0);
        self.costs.push(copy_row);
        let copy = self.costs.len() - 1;
        self.costs[0][copy] = 0.0;
        self.costs[copy][0] = 0.0;
    }
}
