//! First-order node model.
//!
//! The [`NodeModel`] distributes the supply of a node's outgoing links over the competing turn
//! flows of its incoming links. It follows the generic node model of Tampère et al. (2011):
//!
//! - supply of an outgoing link is shared in proportion to the *oriented capacity*
//!   `C_i * S_ij / S_i` of each turn, so larger incoming links have priority;
//! - an incoming link is restricted by its most restrictive outgoing link only;
//! - the reduction of an incoming link applies equally to all of its turns (invariance principle),
//!   because the queue forms on the single upstream link.
//!
//! Each iteration finds the most restrictive outgoing link among those with unresolved
//! contributors. Contributors that can send all their demand within their share are accepted
//! fully; otherwise all contributors are reduced to exactly their share and the outgoing link is
//! closed. At least one incoming link is resolved per iteration.
//!
//! ```text
//!   in 0 ──┐        ┌──> out 0
//!   in 1 ──┼─ node ─┼──> out 1
//!   in 2 ──┘        └──> out 2
//! ```
mod input;
mod settings;

pub use input::{NodeModelFixedInput, NodeModelInput};
pub use settings::{NodeModelSettings, NodeModelSettingsBuilder, DEFAULT_MAX_ITERATIONS, DEFAULT_TOLERANCE};

use crate::TraflowError;
use ndarray::{Array2, Axis};
use rayon::prelude::*;
use tracing::{debug, trace, warn};

/// Result of a single node model solve.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeModelSolution {
    flow_acceptance_factors: Vec<f64>,
    accepted_turn_flows: Array2<f64>,
    realized_inflows: Vec<f64>,
    iterations: usize,
}

impl NodeModelSolution {
    /// One factor per incoming link, in the caller's incoming link order.
    ///
    /// The factor is the fraction of the link's capacity-clipped sending flow that may pass the
    /// node this step. `1.0` means the link is not restricted downstream. A link feeding an
    /// outgoing link with no receiving flow is stopped entirely and gets `0.0`.
    pub fn flow_acceptance_factors(&self) -> &[f64] {
        &self.flow_acceptance_factors
    }

    /// Turn flows that pass the node, `[incoming, outgoing]`.
    pub fn accepted_turn_flows(&self) -> &Array2<f64> {
        &self.accepted_turn_flows
    }

    /// Total accepted flow entering each outgoing link.
    pub fn realized_inflows(&self) -> &[f64] {
        &self.realized_inflows
    }

    /// Total accepted flow leaving each incoming link.
    pub fn accepted_outflows(&self) -> Vec<f64> {
        self.accepted_turn_flows.sum_axis(Axis(1)).to_vec()
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }
}

/// Working arrays of one solve.
struct SolveState {
    /// Capacity-clipped turn sending flows.
    sending: Array2<f64>,
    /// Capacity-clipped total sending flow per incoming link.
    sending_totals: Vec<f64>,
    /// Share of each incoming link's capacity attributed to its turns.
    oriented_capacities: Array2<f64>,
    factors: Vec<f64>,
    unresolved: Vec<bool>,
    open: Vec<bool>,
    remaining_supply: Vec<f64>,
}

impl SolveState {
    fn new(input: &NodeModelInput) -> Self {
        let (num_incoming, num_outgoing) = (input.num_incoming(), input.num_outgoing());
        let turns = input.turn_sending_flows();

        let mut sending = Array2::zeros((num_incoming, num_outgoing));
        let mut oriented_capacities = Array2::zeros((num_incoming, num_outgoing));
        let mut sending_totals = vec![0.0; num_incoming];

        for i in 0..num_incoming {
            let clip = input.capacity_scaling_factors()[i].min(1.0);
            let raw_total = input.incoming_sending_flow(i);
            let capacity = input.incoming_capacities()[i];

            for j in 0..num_outgoing {
                let turn = turns[[i, j]];
                sending[[i, j]] = turn * clip;
                if raw_total > 0.0 {
                    oriented_capacities[[i, j]] = capacity * turn / raw_total;
                }
            }
            sending_totals[i] = raw_total * clip;
        }

        let unresolved = sending_totals.iter().map(|s| *s > 0.0).collect();

        Self {
            sending,
            sending_totals,
            oriented_capacities,
            factors: vec![1.0; num_incoming],
            unresolved,
            open: vec![true; num_outgoing],
            remaining_supply: input.outgoing_receiving_flows().to_vec(),
        }
    }

    fn is_resolved(&self) -> bool {
        !self.unresolved.iter().any(|u| *u)
    }

    /// Reduction factor of open outgoing link `j`: its remaining supply over the oriented
    /// capacity of its unresolved contributors.
    fn reduction_factor(&self, j: usize) -> Option<f64> {
        if !self.open[j] {
            return None;
        }
        let demand: f64 = self
            .unresolved
            .iter()
            .enumerate()
            .filter(|(_, u)| **u)
            .map(|(i, _)| self.oriented_capacities[[i, j]])
            .sum();

        if demand > 0.0 {
            Some(self.remaining_supply[j] / demand)
        } else {
            None
        }
    }

    /// The open outgoing link with the smallest reduction factor; ties go to the lowest index.
    fn most_restrictive(&self) -> Option<(usize, f64)> {
        let mut most_restrictive: Option<(usize, f64)> = None;
        for j in 0..self.open.len() {
            if let Some(a) = self.reduction_factor(j) {
                match most_restrictive {
                    Some((_, a_min)) if a_min <= a => {}
                    _ => most_restrictive = Some((j, a)),
                }
            }
        }
        most_restrictive
    }

    fn accept(&mut self, i: usize, factor: f64) {
        self.factors[i] = factor;
        self.unresolved[i] = false;
        for (supply, sending) in self.remaining_supply.iter_mut().zip(self.sending.row(i)) {
            *supply = (*supply - factor * sending).max(0.0);
        }
    }

    /// Acceptance factors if the solve stopped now. Unresolved links are limited by the tightest
    /// share they are currently offered.
    fn partial_factors(&self, input: &NodeModelInput) -> Vec<f64> {
        let reduction_factors: Vec<Option<f64>> = (0..self.open.len()).map(|j| self.reduction_factor(j)).collect();

        self.factors
            .iter()
            .enumerate()
            .map(|(i, factor)| {
                if !self.unresolved[i] {
                    return *factor;
                }
                let capacity = input.incoming_capacities()[i];
                reduction_factors
                    .iter()
                    .enumerate()
                    .filter_map(|(j, a)| match a {
                        Some(a) if self.oriented_capacities[[i, j]] > 0.0 => Some(a * capacity / self.sending_totals[i]),
                        _ => None,
                    })
                    .fold(1.0, f64::min)
            })
            .collect()
    }
}

/// Accepted turn flows and the resulting inflow of each outgoing link.
fn realize(sending: &Array2<f64>, factors: &[f64]) -> (Array2<f64>, Vec<f64>) {
    let mut accepted = sending.clone();
    for (mut row, factor) in accepted.rows_mut().into_iter().zip(factors) {
        row *= *factor;
    }
    let inflows = accepted.sum_axis(Axis(0)).to_vec();
    (accepted, inflows)
}

/// Solver for the flow acceptance factors of a node.
///
/// The model holds no state between solves, so one instance may be shared between threads solving
/// different nodes.
#[derive(Debug, Clone, Default)]
pub struct NodeModel {
    settings: NodeModelSettings,
}

impl NodeModel {
    pub fn new(settings: NodeModelSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &NodeModelSettings {
        &self.settings
    }

    /// Solve one node.
    ///
    /// Fails with [`TraflowError::ConvergenceError`] if the iteration bound is reached before every
    /// incoming link is resolved. The error carries the best known partial solution.
    pub fn run(&self, input: &NodeModelInput) -> Result<NodeModelSolution, TraflowError> {
        let tolerance = self.settings.tolerance();
        let mut state = SolveState::new(input);
        let mut iterations = 0;

        while !state.is_resolved() {
            if iterations >= self.settings.max_iterations() {
                return Err(self.exhausted(input, &state, iterations));
            }
            iterations += 1;

            // Every unresolved link feeds at least one open outgoing link with a positive oriented
            // capacity, so this only fails if all remaining demand is zero.
            let Some((j_star, a)) = state.most_restrictive() else {
                break;
            };

            let contributors: Vec<usize> = (0..input.num_incoming())
                .filter(|&i| state.unresolved[i] && state.oriented_capacities[[i, j_star]] > 0.0)
                .collect();

            let demand_constrained: Vec<usize> = contributors
                .iter()
                .copied()
                .filter(|&i| state.sending_totals[i] <= a * input.incoming_capacities()[i] + tolerance)
                .collect();

            if !demand_constrained.is_empty() {
                trace!(
                    "Iteration {iterations}: outgoing link {j_star} (reduction factor {a}) admits incoming links {demand_constrained:?} fully."
                );
                for i in demand_constrained {
                    state.accept(i, 1.0);
                }
            } else {
                trace!(
                    "Iteration {iterations}: outgoing link {j_star} (reduction factor {a}) restricts incoming links {contributors:?}."
                );
                for i in contributors {
                    let factor = (a * input.incoming_capacities()[i] / state.sending_totals[i]).clamp(0.0, 1.0);
                    state.accept(i, factor);
                }
                state.open[j_star] = false;
            }
        }

        let (accepted_turn_flows, realized_inflows) = realize(&state.sending, &state.factors);

        debug!(
            "Node model resolved {} incoming links in {iterations} iterations.",
            input.num_incoming()
        );

        Ok(NodeModelSolution {
            flow_acceptance_factors: state.factors,
            accepted_turn_flows,
            realized_inflows,
            iterations,
        })
    }

    fn exhausted(&self, input: &NodeModelInput, state: &SolveState, iterations: usize) -> TraflowError {
        let partial_factors = state.partial_factors(input);
        let (_, inflows) = realize(&state.sending, &partial_factors);

        let max_residual = inflows
            .iter()
            .zip(input.outgoing_receiving_flows())
            .map(|(inflow, supply)| (inflow - supply).max(0.0))
            .fold(0.0, f64::max);

        warn!(
            "Node model did not converge within {} iterations; maximum oversubscription {max_residual}.",
            self.settings.max_iterations()
        );

        TraflowError::ConvergenceError {
            iterations,
            max_residual,
            partial_factors,
        }
    }

    /// Solve a batch of independent nodes.
    ///
    /// Results are returned in the order of `inputs`. If the settings enable parallel solving the
    /// nodes are distributed over a `rayon` thread pool; a pool with the configured number of
    /// threads is created for the batch, or the global pool is used when `threads` is zero.
    pub fn run_batch(
        &self,
        inputs: &[NodeModelInput],
    ) -> Result<Vec<Result<NodeModelSolution, TraflowError>>, TraflowError> {
        if !self.settings.parallel() {
            return Ok(inputs.iter().map(|input| self.run(input)).collect());
        }

        let solve = || inputs.par_iter().map(|input| self.run(input)).collect::<Vec<_>>();

        if self.settings.threads() > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.settings.threads())
                .build()
                .map_err(|e| TraflowError::ThreadPool(e.to_string()))?;
            Ok(pool.install(solve))
        } else {
            Ok(solve())
        }
    }
}
