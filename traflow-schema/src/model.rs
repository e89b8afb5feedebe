use crate::diagram::DiagramDefinition;
use crate::node::{NodeDefinition, SettingsDefinition};
use crate::outputs::{DiagramEvaluation, NodeOutput};
use crate::SchemaError;
use schemars::JsonSchema;
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};
use traflow_core::fundamental_diagram::FundamentalDiagram;
use traflow_core::node_model::{NodeModel, NodeModelInput};

/// A document of link segment type diagrams and node snapshots.
#[derive(serde::Deserialize, serde::Serialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TraflowModel {
    #[serde(default)]
    pub diagrams: Vec<DiagramDefinition>,
    #[serde(default)]
    pub nodes: Vec<NodeDefinition>,
    #[serde(default)]
    pub settings: SettingsDefinition,
}

fn check_unique<'a>(kind: &'static str, names: impl Iterator<Item = &'a str>) -> Result<(), SchemaError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(SchemaError::DuplicateName {
                kind,
                name: name.to_string(),
            });
        }
    }
    Ok(())
}

impl FromStr for TraflowModel {
    type Err = SchemaError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        Ok(serde_json::from_str(data)?)
    }
}

impl TraflowModel {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|error| SchemaError::IO {
            path: path.to_path_buf(),
            error,
        })?;
        data.parse()
    }

    pub fn get_diagram_by_name(&self, name: &str) -> Option<&DiagramDefinition> {
        self.diagrams.iter().find(|d| d.name == name)
    }

    pub fn get_node_by_name(&self, name: &str) -> Option<&NodeDefinition> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Build every diagram, paired with its name.
    pub fn build_diagrams(&self) -> Result<Vec<(String, FundamentalDiagram)>, SchemaError> {
        check_unique("diagram", self.diagrams.iter().map(|d| d.name.as_str()))?;

        self.diagrams
            .iter()
            .map(|d| d.build().map(|diagram| (d.name.clone(), diagram)))
            .collect()
    }

    pub fn build_node_inputs(&self) -> Result<Vec<NodeModelInput>, SchemaError> {
        check_unique("node", self.nodes.iter().map(|n| n.name.as_str()))?;

        self.nodes.iter().map(|n| n.build()).collect()
    }

    /// Evaluate the named diagram at each of `densities`.
    pub fn evaluate_diagram(&self, name: &str, densities: &[f64]) -> Result<Vec<DiagramEvaluation>, SchemaError> {
        let definition = self
            .get_diagram_by_name(name)
            .ok_or_else(|| SchemaError::DiagramNotFound(name.to_string()))?;
        let diagram = definition.build()?;

        densities
            .iter()
            .map(|density| {
                DiagramEvaluation::evaluate(name, &diagram, *density).map_err(|error| SchemaError::InvalidDiagram {
                    name: name.to_string(),
                    error,
                })
            })
            .collect()
    }

    /// Solve every node with the document's settings.
    ///
    /// Nodes that reach the iteration bound fail the whole solve unless `accept_partial` is set,
    /// in which case their partial solutions are reported with `converged: false`.
    pub fn solve_nodes(&self) -> Result<Vec<NodeOutput>, SchemaError> {
        let inputs = self.build_node_inputs()?;
        let model = NodeModel::new(self.settings.build());

        info!("Solving {} nodes.", inputs.len());
        let results = model.run_batch(&inputs)?;

        self.nodes
            .iter()
            .zip(&inputs)
            .zip(results)
            .map(|((node, input), result)| match result {
                Ok(solution) => Ok(NodeOutput::from_solution(&node.name, input, &solution)),
                Err(error) => {
                    let partial = if self.settings.accept_partial {
                        NodeOutput::from_convergence_error(&node.name, input, &error)
                    } else {
                        None
                    };
                    match partial {
                        Some(output) => {
                            warn!("Node `{}` did not converge; reporting its partial solution.", node.name);
                            Ok(output)
                        }
                        None => Err(SchemaError::NodeSolve {
                            name: node.name.clone(),
                            error,
                        }),
                    }
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::TraflowModel;
    use crate::SchemaError;

    #[test]
    fn test_empty_model() {
        let model: TraflowModel = "{}".parse().unwrap();

        assert!(model.diagrams.is_empty());
        assert!(model.solve_nodes().unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_names() {
        let data = r#"
            {
                "diagrams": [
                    {"name": "urban", "max_speed": 50.0},
                    {"name": "urban", "max_speed": 60.0}
                ]
            }
        "#;
        let model: TraflowModel = data.parse().unwrap();

        assert!(matches!(
            model.build_diagrams(),
            Err(SchemaError::DuplicateName { kind: "diagram", .. })
        ));
    }

    #[test]
    fn test_missing_diagram() {
        let model = TraflowModel::default();
        assert!(matches!(
            model.evaluate_diagram("rural", &[10.0]),
            Err(SchemaError::DiagramNotFound(_))
        ));
    }
}
