use crate::TraflowError;
use ndarray::{Array2, ArrayView1};

fn check_flows(name: &str, values: &[f64]) -> Result<(), TraflowError> {
    if values.is_empty() {
        return Err(TraflowError::invalid(format!("{name} must not be empty")));
    }
    if let Some((idx, v)) = values.iter().enumerate().find(|(_, v)| !v.is_finite() || **v < 0.0) {
        return Err(TraflowError::invalid(format!(
            "{name} must be finite and non-negative (found {v} at index {idx})"
        )));
    }
    Ok(())
}

/// Capacity data of a node that does not depend on the current traffic state.
///
/// Incoming and outgoing links are identified by their position in the arrays; the caller assigns
/// these link-local indices per node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeModelFixedInput {
    incoming_capacities: Vec<f64>,
    outgoing_receiving_flows: Vec<f64>,
}

impl NodeModelFixedInput {
    pub fn new(incoming_capacities: Vec<f64>, outgoing_receiving_flows: Vec<f64>) -> Result<Self, TraflowError> {
        check_flows("incoming capacities", &incoming_capacities)?;
        check_flows("outgoing receiving flows", &outgoing_receiving_flows)?;

        Ok(Self {
            incoming_capacities,
            outgoing_receiving_flows,
        })
    }

    pub fn num_incoming(&self) -> usize {
        self.incoming_capacities.len()
    }

    pub fn num_outgoing(&self) -> usize {
        self.outgoing_receiving_flows.len()
    }

    pub fn incoming_capacities(&self) -> &[f64] {
        &self.incoming_capacities
    }

    pub fn outgoing_receiving_flows(&self) -> &[f64] {
        &self.outgoing_receiving_flows
    }
}

/// The complete input of one node model solve: fixed capacities plus the current turn sending
/// flows.
///
/// `turn_sending_flows[[i, j]]` is the flow wanting to move from incoming link `i` to outgoing
/// link `j`. On construction each incoming link gets a capacity scaling factor, the ratio of its
/// capacity to its total sending flow. A factor below one means the link wants to send more
/// than it can discharge and its turn flows are clipped before conflicts at the node are resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeModelInput {
    fixed: NodeModelFixedInput,
    turn_sending_flows: Array2<f64>,
    capacity_scaling_factors: Vec<f64>,
}

impl NodeModelInput {
    pub fn new(fixed: NodeModelFixedInput, turn_sending_flows: Array2<f64>) -> Result<Self, TraflowError> {
        let expected = (fixed.num_incoming(), fixed.num_outgoing());
        if turn_sending_flows.dim() != expected {
            return Err(TraflowError::invalid(format!(
                "turn sending flows have shape {:?} but the node has {} incoming and {} outgoing links",
                turn_sending_flows.dim(),
                expected.0,
                expected.1
            )));
        }
        if let Some(((i, j), v)) = turn_sending_flows
            .indexed_iter()
            .find(|(_, v)| !v.is_finite() || **v < 0.0)
        {
            return Err(TraflowError::invalid(format!(
                "turn sending flows must be finite and non-negative (found {v} at [{i}, {j}])"
            )));
        }

        let capacity_scaling_factors = turn_sending_flows
            .rows()
            .into_iter()
            .zip(fixed.incoming_capacities())
            .map(|(row, capacity)| {
                let sending: f64 = row.sum();
                if sending > 0.0 {
                    capacity / sending
                } else {
                    1.0
                }
            })
            .collect();

        Ok(Self {
            fixed,
            turn_sending_flows,
            capacity_scaling_factors,
        })
    }

    /// Create the input from one row of turn sending flows per incoming link.
    pub fn from_rows(fixed: NodeModelFixedInput, rows: &[Vec<f64>]) -> Result<Self, TraflowError> {
        let num_outgoing = fixed.num_outgoing();
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != num_outgoing) {
            return Err(TraflowError::invalid(format!(
                "row {i} of the turn sending flows has {} entries; expected {num_outgoing}",
                row.len()
            )));
        }

        let values: Vec<f64> = rows.iter().flatten().copied().collect();
        let turn_sending_flows = Array2::from_shape_vec((rows.len(), num_outgoing), values)
            .map_err(|e| TraflowError::invalid(format!("invalid turn sending flow matrix: {e}")))?;

        Self::new(fixed, turn_sending_flows)
    }

    pub fn fixed(&self) -> &NodeModelFixedInput {
        &self.fixed
    }

    pub fn num_incoming(&self) -> usize {
        self.fixed.num_incoming()
    }

    pub fn num_outgoing(&self) -> usize {
        self.fixed.num_outgoing()
    }

    pub fn incoming_capacities(&self) -> &[f64] {
        self.fixed.incoming_capacities()
    }

    pub fn outgoing_receiving_flows(&self) -> &[f64] {
        self.fixed.outgoing_receiving_flows()
    }

    pub fn turn_sending_flows(&self) -> &Array2<f64> {
        &self.turn_sending_flows
    }

    /// Turn sending flows of incoming link `incoming`.
    pub fn turn_sending_flows_from(&self, incoming: usize) -> ArrayView1<'_, f64> {
        self.turn_sending_flows.row(incoming)
    }

    pub fn capacity_scaling_factors(&self) -> &[f64] {
        &self.capacity_scaling_factors
    }

    /// Total (unclipped) sending flow of incoming link `incoming`.
    pub fn incoming_sending_flow(&self, incoming: usize) -> f64 {
        self.turn_sending_flows.row(incoming).sum()
    }

    /// Turn sending flow after clipping the incoming link's total to its capacity.
    pub fn clipped_turn_sending_flow(&self, incoming: usize, outgoing: usize) -> f64 {
        self.turn_sending_flows[[incoming, outgoing]] * self.capacity_scaling_factors[incoming].min(1.0)
    }
}
