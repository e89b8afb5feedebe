//! Serialisable results of diagram evaluations and node solves.
use traflow_core::fundamental_diagram::{FundamentalDiagram, Regime};
use traflow_core::node_model::{NodeModelInput, NodeModelSolution};
use traflow_core::TraflowError;

/// The solution of one node.
#[derive(serde::Deserialize, serde::Serialize, Clone, Debug, PartialEq)]
pub struct NodeOutput {
    pub name: String,
    pub flow_acceptance_factors: Vec<f64>,
    pub capacity_scaling_factors: Vec<f64>,
    pub accepted_turn_flows: Vec<Vec<f64>>,
    pub realized_inflows: Vec<f64>,
    pub iterations: usize,
    /// False if the iteration bound was reached and the factors are a partial solution.
    pub converged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_residual: Option<f64>,
}

fn accepted_rows(input: &NodeModelInput, factors: &[f64]) -> Vec<Vec<f64>> {
    (0..input.num_incoming())
        .map(|i| {
            (0..input.num_outgoing())
                .map(|j| input.clipped_turn_sending_flow(i, j) * factors[i])
                .collect()
        })
        .collect()
}

impl NodeOutput {
    pub fn from_solution(name: &str, input: &NodeModelInput, solution: &NodeModelSolution) -> Self {
        Self {
            name: name.to_string(),
            flow_acceptance_factors: solution.flow_acceptance_factors().to_vec(),
            capacity_scaling_factors: input.capacity_scaling_factors().to_vec(),
            accepted_turn_flows: solution
                .accepted_turn_flows()
                .rows()
                .into_iter()
                .map(|row| row.to_vec())
                .collect(),
            realized_inflows: solution.realized_inflows().to_vec(),
            iterations: solution.iterations(),
            converged: true,
            max_residual: None,
        }
    }

    /// Build an output from the partial solution carried by a convergence error.
    ///
    /// Returns `None` for any other error.
    pub fn from_convergence_error(name: &str, input: &NodeModelInput, error: &TraflowError) -> Option<Self> {
        let TraflowError::ConvergenceError {
            iterations,
            max_residual,
            partial_factors,
        } = error
        else {
            return None;
        };

        let accepted_turn_flows = accepted_rows(input, partial_factors);
        let realized_inflows = (0..input.num_outgoing())
            .map(|j| accepted_turn_flows.iter().map(|row| row[j]).sum::<f64>())
            .collect();

        Some(Self {
            name: name.to_string(),
            flow_acceptance_factors: partial_factors.clone(),
            capacity_scaling_factors: input.capacity_scaling_factors().to_vec(),
            accepted_turn_flows,
            realized_inflows,
            iterations: *iterations,
            converged: false,
            max_residual: Some(*max_residual),
        })
    }
}

/// State of a link at one density on a diagram.
#[derive(serde::Deserialize, serde::Serialize, Clone, Debug, PartialEq)]
pub struct DiagramEvaluation {
    pub diagram: String,
    pub density: f64,
    pub regime: Regime,
    pub flow: f64,
    pub speed: f64,
    pub sending_flow: f64,
    pub receiving_flow: f64,
}

impl DiagramEvaluation {
    pub fn evaluate(name: &str, diagram: &FundamentalDiagram, density: f64) -> Result<Self, TraflowError> {
        Ok(Self {
            diagram: name.to_string(),
            density,
            regime: diagram.regime_at_density(density),
            flow: diagram.flow_at(density)?,
            speed: diagram.speed_at_density(density)?,
            sending_flow: diagram.sending_flow(density)?,
            receiving_flow: diagram.receiving_flow(density)?,
        })
    }
}
