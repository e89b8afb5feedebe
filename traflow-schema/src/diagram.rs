use crate::SchemaError;
use schemars::JsonSchema;
use std::fmt::{Display, Formatter};
use traflow_core::fundamental_diagram::{FundamentalDiagram, DEFAULT_MAXIMUM_DENSITY};

/// A triangular fundamental diagram of a link segment type.
///
/// The congested branch is defined by at most one of `backward_wave_speed` or `capacity`. If
/// neither is given the diagram is symmetric (backward wave speed equal to `-max_speed`).
#[derive(serde::Deserialize, serde::Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DiagramDefinition {
    pub name: String,
    /// Free-flow speed (km/h).
    pub max_speed: f64,
    /// Jam density (pcu/km/lane). Defaults to 180.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_density: Option<f64>,
    /// Negative propagation speed of congestion (km/h).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backward_wave_speed: Option<f64>,
    /// Maximum flow (pcu/h/lane).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<f64>,
}

impl DiagramDefinition {
    pub fn build(&self) -> Result<FundamentalDiagram, SchemaError> {
        let maximum_density = self.maximum_density.unwrap_or(DEFAULT_MAXIMUM_DENSITY);

        let diagram = match (self.backward_wave_speed, self.capacity) {
            (Some(_), Some(_)) => return Err(SchemaError::OverdeterminedDiagram(self.name.clone())),
            (Some(w), None) => FundamentalDiagram::new(self.max_speed, w, maximum_density),
            (None, Some(c)) => FundamentalDiagram::with_capacity(self.max_speed, c, maximum_density),
            (None, None) => FundamentalDiagram::new(self.max_speed, -self.max_speed, maximum_density),
        };

        diagram.map_err(|error| SchemaError::InvalidDiagram {
            name: self.name.clone(),
            error,
        })
    }
}

impl From<(&str, &FundamentalDiagram)> for DiagramDefinition {
    fn from((name, diagram): (&str, &FundamentalDiagram)) -> Self {
        Self {
            name: name.to_string(),
            max_speed: diagram.maximum_speed(),
            maximum_density: Some(diagram.maximum_density()),
            backward_wave_speed: Some(diagram.backward_wave_speed()),
            capacity: None,
        }
    }
}

impl Display for DiagramDefinition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (v = {} km/h", self.name, self.max_speed)?;
        if let Some(k) = self.maximum_density {
            write!(f, ", k_jam = {k}")?;
        }
        if let Some(w) = self.backward_wave_speed {
            write!(f, ", w = {w}")?;
        }
        if let Some(c) = self.capacity {
            write!(f, ", q_max = {c}")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::DiagramDefinition;
    use crate::SchemaError;
    use float_cmp::assert_approx_eq;

    fn definition(data: &str) -> DiagramDefinition {
        serde_json::from_str(data).unwrap()
    }

    #[test]
    fn test_symmetric_default() {
        let fd = definition(r#"{"name": "urban", "max_speed": 60.0}"#).build().unwrap();

        assert_approx_eq!(f64, fd.maximum_density(), 180.0);
        assert_approx_eq!(f64, fd.capacity(), 5400.0);
    }

    #[test]
    fn test_capacity_definition() {
        let fd = definition(r#"{"name": "motorway", "max_speed": 100.0, "capacity": 2000.0, "maximum_density": 150.0}"#)
            .build()
            .unwrap();

        assert_approx_eq!(f64, fd.capacity(), 2000.0);
        assert_approx_eq!(f64, fd.critical_density(), 20.0);
        assert_approx_eq!(f64, fd.backward_wave_speed(), -2000.0 / 130.0, epsilon = 1e-9);
    }

    #[test]
    fn test_invalid_definitions() {
        let both = definition(r#"{"name": "x", "max_speed": 60.0, "capacity": 2000.0, "backward_wave_speed": -15.0}"#);
        assert!(matches!(both.build(), Err(SchemaError::OverdeterminedDiagram(_))));

        let positive_wave = definition(r#"{"name": "x", "max_speed": 60.0, "backward_wave_speed": 15.0}"#);
        assert!(matches!(positive_wave.build(), Err(SchemaError::InvalidDiagram { .. })));

        assert!(serde_json::from_str::<DiagramDefinition>(r#"{"name": "x", "speed": 60.0}"#).is_err());
    }

    #[test]
    fn test_definition_from_diagram() {
        let original = definition(r#"{"name": "rural", "max_speed": 80.0, "backward_wave_speed": -20.0, "maximum_density": 150.0}"#);
        let fd = original.build().unwrap();

        let rebuilt = DiagramDefinition::from(("rural", &fd));
        assert_eq!(rebuilt, original);
        assert_eq!(rebuilt.build().unwrap(), fd);
    }
}
