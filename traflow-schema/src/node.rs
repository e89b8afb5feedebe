use crate::SchemaError;
use schemars::JsonSchema;
use traflow_core::node_model::{NodeModelFixedInput, NodeModelInput, NodeModelSettings, NodeModelSettingsBuilder};
use traflow_core::TraflowError;

/// A snapshot of one intersection at one simulation step.
///
/// Incoming and outgoing links are referred to by their position in the arrays. Row `i` of
/// `turn_sending_flows` holds the flows from incoming link `i` to each outgoing link.
#[derive(serde::Deserialize, serde::Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct NodeDefinition {
    pub name: String,
    /// Capacity of each incoming link (pcu/h).
    pub incoming_capacities: Vec<f64>,
    /// Receiving flow of each outgoing link (pcu/h).
    pub outgoing_receiving_flows: Vec<f64>,
    /// Turn sending flows (pcu/h), one row per incoming link.
    pub turn_sending_flows: Vec<Vec<f64>>,
}

impl NodeDefinition {
    pub fn build(&self) -> Result<NodeModelInput, SchemaError> {
        let to_schema_error = |error: TraflowError| SchemaError::InvalidNode {
            name: self.name.clone(),
            error,
        };

        let fixed = NodeModelFixedInput::new(self.incoming_capacities.clone(), self.outgoing_receiving_flows.clone())
            .map_err(to_schema_error)?;
        NodeModelInput::from_rows(fixed, &self.turn_sending_flows).map_err(to_schema_error)
    }
}

/// Node model settings. Missing values take the solver defaults.
#[derive(serde::Deserialize, serde::Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SettingsDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<f64>,
    /// Solve nodes in parallel.
    #[serde(default)]
    pub parallel: bool,
    /// Number of threads for parallel solving; zero or missing uses all cores.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,
    /// Report the partial solution of nodes that hit the iteration bound instead of failing.
    #[serde(default)]
    pub accept_partial: bool,
}

impl SettingsDefinition {
    pub fn build(&self) -> NodeModelSettings {
        let mut builder = NodeModelSettingsBuilder::default();
        if let Some(max_iterations) = self.max_iterations {
            builder = builder.max_iterations(max_iterations);
        }
        if let Some(tolerance) = self.tolerance {
            builder = builder.tolerance(tolerance);
        }
        if self.parallel {
            builder = builder.parallel();
        }
        if let Some(threads) = self.threads {
            builder = builder.threads(threads);
        }
        builder.build()
    }
}
