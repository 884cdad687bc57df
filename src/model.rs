//! Linear constraint model assembled by the formulations.
//!
//! A [`ConstraintModel`] is the unit of work handed to a solver engine:
//! a set of decision variables addressed by tuple keys, linear constraints
//! over them, and a linear minimization objective.

use std::collections::HashMap;

/// Tolerance used when checking an assignment against the model.
const FEASIBILITY_TOLERANCE: f64 = 1e-6;

/// Handle to a decision variable within its model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Var(usize);

impl Var {
    /// Position of this variable in the model's value vector.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Tuple key addressing a variable by its role in the formulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarKey {
    /// Arc selection between two nodes. Directed formulations key both
    /// orders; undirected ones key `from < to`.
    Arc { from: usize, to: usize },
    /// Arc selection for one specific vehicle (3-index model).
    VehicleArc {
        from: usize,
        to: usize,
        vehicle: usize,
    },
    /// Node-to-vehicle assignment indicator (3-index model).
    Assign { node: usize, vehicle: usize },
    /// Cumulative load after serving a node.
    Load { node: usize },
    /// Cumulative load after serving a node, for one vehicle.
    VehicleLoad { node: usize, vehicle: usize },
    /// Commodity flow carried from one node to another.
    Flow { from: usize, to: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Binary,
    Continuous,
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub key: VarKey,
    pub kind: VarKind,
    pub lower: f64,
    pub upper: f64,
}

/// Sparse linear expression over model variables.
#[derive(Debug, Clone, Default)]
pub struct LinExpr {
    terms: Vec<(Var, f64)>,
}

impl LinExpr {
    pub fn new() -> Self {
        Self { terms: Vec::new() }
    }

    pub fn add(&mut self, var: Var, coefficient: f64) {
        self.terms.push((var, coefficient));
    }

    /// Builder-style [`add`](Self::add).
    pub fn term(mut self, var: Var, coefficient: f64) -> Self {
        self.add(var, coefficient);
        self
    }

    pub fn terms(&self) -> &[(Var, f64)] {
        &self.terms
    }

    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|(var, coefficient)| coefficient * values[var.index()])
            .sum()
    }
}

/// Comparison sense of a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Le,
    Eq,
    Ge,
}

#[derive(Debug, Clone)]
pub struct Constraint {
    pub expr: LinExpr,
    pub sense: Sense,
    pub rhs: f64,
}

impl Constraint {
    fn holds(&self, values: &[f64]) -> bool {
        let lhs = self.expr.evaluate(values);
        match self.sense {
            Sense::Le => lhs <= self.rhs + FEASIBILITY_TOLERANCE,
            Sense::Eq => (lhs - self.rhs).abs() <= FEASIBILITY_TOLERANCE,
            Sense::Ge => lhs >= self.rhs - FEASIBILITY_TOLERANCE,
        }
    }
}

/// A way an assignment can disagree with a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    /// A variable value lies outside its declared bounds.
    Bound { var: Var },
    /// A constraint (by position in the model) does not hold.
    Constraint { index: usize },
}

/// A complete mixed-integer model: variables, constraints, and a linear
/// minimization objective.
#[derive(Debug, Clone)]
pub struct ConstraintModel {
    name: String,
    variables: Vec<Variable>,
    index: HashMap<VarKey, Var>,
    constraints: Vec<Constraint>,
    objective: LinExpr,
}

impl ConstraintModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variables: Vec::new(),
            index: HashMap::new(),
            constraints: Vec::new(),
            objective: LinExpr::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds a binary decision variable. Keys must be unique per model.
    pub fn binary(&mut self, key: VarKey) -> Var {
        self.push_variable(key, VarKind::Binary, 0.0, 1.0)
    }

    /// Adds a continuous decision variable with inclusive bounds.
    pub fn continuous(&mut self, key: VarKey, lower: f64, upper: f64) -> Var {
        self.push_variable(key, VarKind::Continuous, lower, upper)
    }

    fn push_variable(&mut self, key: VarKey, kind: VarKind, lower: f64, upper: f64) -> Var {
        let var = Var(self.variables.len());
        let previous = self.index.insert(key, var);
        debug_assert!(previous.is_none(), "duplicate variable key {:?}", key);
        self.variables.push(Variable {
            key,
            kind,
            lower,
            upper,
        });
        var
    }

    /// Looks up a variable by its tuple key.
    pub fn var(&self, key: VarKey) -> Option<Var> {
        self.index.get(&key).copied()
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    pub fn constrain(&mut self, expr: LinExpr, sense: Sense, rhs: f64) {
        self.constraints.push(Constraint { expr, sense, rhs });
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    pub fn minimize(&mut self, objective: LinExpr) {
        self.objective = objective;
    }

    pub fn objective(&self) -> &LinExpr {
        &self.objective
    }

    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.objective.evaluate(values)
    }

    /// Checks an assignment against every bound and constraint.
    ///
    /// An empty result means the assignment is feasible up to tolerance.
    pub fn violations(&self, values: &[f64]) -> Vec<Violation> {
        let mut found = Vec::new();
        for (position, variable) in self.variables.iter().enumerate() {
            let value = values[position];
            if value < variable.lower - FEASIBILITY_TOLERANCE
                || value > variable.upper + FEASIBILITY_TOLERANCE
            {
                found.push(Violation::Bound { var: Var(position) });
            }
        }
        for (index, constraint) in self.constraints.iter().enumerate() {
            if !constraint.holds(values) {
                found.push(Violation::Constraint { index });
            }
        }
        found
    }
}
