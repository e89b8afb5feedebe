//! Physical supply model for macroscopic traffic simulation.
//!
//! Two independent components are provided:
//!
//! - [`fundamental_diagram::FundamentalDiagram`]: the density / flow / speed relation of a link
//!   segment type, from which the sending and receiving flows of a link are derived.
//! - [`node_model::NodeModel`]: a first-order node model that resolves competing turn flows at an
//!   intersection into one flow acceptance factor per incoming link.
//!
//! Units are not converted anywhere in this crate. Densities are expected in pcu/km/lane, flows in
//! pcu/h and speeds in km/h.
use thiserror::Error;

pub mod fundamental_diagram;
pub mod node_model;
pub mod test_utils;

#[derive(Error, Debug, PartialEq)]
pub enum TraflowError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(
        "node model did not converge after {iterations} iterations (maximum oversubscription: {max_residual})"
    )]
    ConvergenceError {
        iterations: usize,
        /// Largest amount by which an outgoing link's receiving flow is exceeded by the partial solution.
        max_residual: f64,
        /// Best known flow acceptance factors when the iteration bound was reached.
        partial_factors: Vec<f64>,
    },
    #[error("failed to create thread pool: {0}")]
    ThreadPool(String),
}

impl TraflowError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}
