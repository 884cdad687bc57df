//! Route reconstruction from a solved arc-selection assignment.
//!
//! The solver hands back a sparse set of selected arcs; this module turns
//! them into ordered routes, each starting and ending at the depot
//! (node 0). The walk is bounded and fails loudly on malformed input
//! instead of looping.

use std::fmt;

/// How the selected arcs are to be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
    /// Each selection is an ordered arc; every node has one outgoing arc,
    /// so the walk follows it directly.
    Directed,
    /// Selections are undirected edges over `n + 1` nodes, where node `n`
    /// is a synthetic copy of the depot. Its edges are folded back onto
    /// the depot before walking.
    UndirectedFold,
}

/// Contract violation between solver output and decoder assumptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// A node's only neighbour is itself.
    DegenerateAdjacency { node: usize },
    /// A walk reached a node with no onward selection.
    DeadEnd { node: usize },
    /// A walk failed to return to the depot within the step bound.
    NonTerminatingWalk { seed: usize },
    /// A non-depot node appears on no route.
    MissingStop { node: usize },
    /// A non-depot node appears on more than one route (or twice on one).
    RepeatedStop { node: usize },
    /// A route's total demand exceeds its vehicle's capacity.
    CapacityExceeded { route: usize },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::DegenerateAdjacency { node } => {
                write!(f, "node {} is adjacent only to itself", node)
            }
            DecodeError::DeadEnd { node } => {
                write!(f, "walk dead-ends at node {}", node)
            }
            DecodeError::NonTerminatingWalk { seed } => {
                write!(f, "walk seeded at node {} never returns to the depot", seed)
            }
            DecodeError::MissingStop { node } => {
                write!(f, "node {} is not covered by any route", node)
            }
            DecodeError::RepeatedStop { node } => {
                write!(f, "node {} is covered more than once", node)
            }
            DecodeError::CapacityExceeded { route } => {
                write!(f, "route {} exceeds its vehicle capacity", route)
            }
        }
    }
}

/// Reconstructs depot-anchored routes from selected arcs.
///
/// `node_count` is the number of real locations; in
/// [`DecodeMode::UndirectedFold`] the arcs may also reference the synthetic
/// node `node_count`, which is folded onto the depot.
pub fn decode_routes(
    selected: &[(usize, usize)],
    node_count: usize,
    mode: DecodeMode,
) -> Result<Vec<Vec<usize>>, DecodeError> {
    let mut adjacency = build_adjacency(selected, node_count, mode);

    for (node, neighbours) in adjacency.iter().enumerate() {
        if neighbours.len() == 1 && neighbours[0] == node {
            return Err(DecodeError::DegenerateAdjacency { node });
        }
    }

    let seeds: Vec<usize> = adjacency[0].clone();
    let mut visited = vec![false; node_count];
    let mut routes = Vec::new();

    for seed in seeds {
        // The same undirected cycle is seeded from both of its
        // depot-adjacent endpoints; keep only the first walk.
        if seed == 0 || visited[seed] {
            continue;
        }
        let route = match mode {
            DecodeMode::Directed => walk_directed(&adjacency, seed, &mut visited)?,
            DecodeMode::UndirectedFold => walk_undirected(&mut adjacency, seed, &mut visited)?,
        };
        routes.push(route);
    }

    Ok(routes)
}

/// Verifies the decoded route set against the problem data.
///
/// Coverage must be exact (every non-depot node on exactly one route) and
/// each route's demand must fit `capacities[route]`. Capacity is enforced
/// by the model's constraints already; this is a sanity check on the
/// solver's output, not a re-derivation.
pub fn verify_routes(
    routes: &[Vec<usize>],
    demands: &[f64],
    capacities: &[f64],
) -> Result<(), DecodeError> {
    let mut seen = vec![false; demands.len()];
    for (route_index, route) in routes.iter().enumerate() {
        let mut load = 0.0;
        for &stop in route.iter().filter(|&&stop| stop != 0) {
            if seen[stop] {
                return Err(DecodeError::RepeatedStop { node: stop });
            }
            seen[stop] = true;
            load += demands[stop];
        }
        if load > capacities[route_index] + 1e-6 {
            return Err(DecodeError::CapacityExceeded { route: route_index });
        }
    }
    for (node, &covered) in seen.iter().enumerate().skip(1) {
        if !covered {
            return Err(DecodeError::MissingStop { node });
        }
    }
    Ok(())
}

fn build_adjacency(
    selected: &[(usize, usize)],
    node_count: usize,
    mode: DecodeMode,
) -> Vec<Vec<usize>> {
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); node_count];
    match mode {
        DecodeMode::Directed => {
            for &(from, to) in selected {
                if !adjacency[from].contains(&to) {
                    adjacency[from].push(to);
                }
            }
        }
        DecodeMode::UndirectedFold => {
            for &(from, to) in selected {
                let from = if from == node_count { 0 } else { from };
                let to = if to == node_count { 0 } else { to };
                if from == 0 && to == 0 {
                    // Depot-to-copy edge: an unused-capacity path, no stops.
                    continue;
                }
                // Kept as a multiset: a single-stop route folds to two
                // parallel depot edges, and the walk must consume both.
                adjacency[from].push(to);
                adjacency[to].push(from);
            }
        }
    }
    adjacency
}

fn walk_directed(
    adjacency: &[Vec<usize>],
    seed: usize,
    visited: &mut [bool],
) -> Result<Vec<usize>, DecodeError> {
    let node_count = adjacency.len();
    let mut route = vec![0, seed];
    visited[seed] = true;

    let mut steps = 0;
    loop {
        let current = route[route.len() - 1];
        if current == 0 {
            return Ok(route);
        }
        steps += 1;
        if steps > node_count {
            return Err(DecodeError::NonTerminatingWalk { seed });
        }
        let next = *adjacency[current]
            .first()
            .ok_or(DecodeError::DeadEnd { node: current })?;
        if next != 0 {
            visited[next] = true;
        }
        route.push(next);
    }
}

fn walk_undirected(
    adjacency: &mut [Vec<usize>],
    seed: usize,
    visited: &mut [bool],
) -> Result<Vec<usize>, DecodeError> {
    let node_count = adjacency.len();
    consume_edge(adjacency, 0, seed);
    let mut route = vec![0, seed];
    visited[seed] = true;

    let mut steps = 0;
    loop {
        let current = route[route.len() - 1];
        if current == 0 {
            return Ok(route);
        }
        steps += 1;
        if steps > node_count {
            return Err(DecodeError::NonTerminatingWalk { seed });
        }
        let previous = route[route.len() - 2];
        // Degree-2 tie-break: don't walk straight back. A single-stop
        // route has only the parallel folded edge left, so fall back to it.
        let next = adjacency[current]
            .iter()
            .copied()
            .find(|&candidate| candidate != previous)
            .or_else(|| adjacency[current].first().copied())
            .ok_or(DecodeError::DeadEnd { node: current })?;
        consume_edge(adjacency, current, next);
        if next != 0 {
            visited[next] = true;
        }
        route.push(next);
    }
}

fn consume_edge(adjacency: &mut [Vec<usize>], a: usize, b: usize) {
    if let Some(position) = adjacency[a].iter().position(|&neighbour| neighbour == b) {
        adjacency[a].remove(position);
    }
    if let Some(position) = adjacency[b].iter().position(|&neighbour| neighbour == a) {
        adjacency[b].remove(position);
    }
}
