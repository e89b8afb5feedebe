//! Schema for traflow documents.
//!
//! A document holds fundamental diagram definitions of link segment types and node snapshots
//! (capacities, receiving flows and turn sending flows) together with the node model settings.
//!
//! Serializing and deserializing is accomplished using [`serde`]. A JSON schema of the document
//! is available through [`schemars`].
//!
pub mod diagram;
mod error;
pub mod model;
pub mod node;
pub mod outputs;

pub use error::SchemaError;
pub use model::TraflowModel;
