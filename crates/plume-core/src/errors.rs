//! Error types for PLUME.
//!
//! Every fallible operation in the workspace returns a [`PlumeError`]
//! through the crate-level [`Result`] alias. Fatal kinds are mapped to a
//! process exit by the realization driver; nothing below the driver calls
//! `exit`.

use thiserror::Error;

/// Unified error type for all PLUME operations.
///
/// Fatal messages name the offending entity (region by label and index,
/// reaction by index, actor by index) and the phase in which the failure
/// was detected.
#[derive(Error, Debug)]
pub enum PlumeError {
    /// Configuration is structurally invalid and cannot be repaired.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Region geometry failed validation during the build phase.
    #[error("Geometry error in region {region}: {message}")]
    Geometry { region: String, message: String },

    /// A reaction definition is incompatible with a region it is placed in.
    #[error("Reaction {reaction} incompatible: {message}")]
    ReactionIncompatible { reaction: usize, message: String },

    /// A geometric query was asked of a shape pair it does not support.
    #[error("Unsupported shape pair for {operation}: {pair}")]
    UnsupportedShapePair { operation: &'static str, pair: String },

    /// Numerical degeneracy (NaN, division by zero) on an unguarded path.
    #[error("Numerical error: {0}")]
    Numerical(String),

    /// Actor definition or placement is invalid.
    #[error("Actor {actor} invalid: {message}")]
    Actor { actor: usize, message: String },

    /// I/O errors (configuration reading, output writing).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic errors (fallback).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlumeError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        PlumeError::Config(message.into())
    }

    /// Creates a geometry error tagged with the offending region.
    pub fn geometry(region: impl Into<String>, message: impl Into<String>) -> Self {
        PlumeError::Geometry {
            region: region.into(),
            message: message.into(),
        }
    }

    /// Creates a reaction incompatibility error.
    pub fn reaction(reaction: usize, message: impl Into<String>) -> Self {
        PlumeError::ReactionIncompatible {
            reaction,
            message: message.into(),
        }
    }

    /// Creates an unsupported shape pair error.
    pub fn shape_pair(operation: &'static str, pair: impl Into<String>) -> Self {
        PlumeError::UnsupportedShapePair {
            operation,
            pair: pair.into(),
        }
    }

    /// Creates a numerical error.
    pub fn numerical(message: impl Into<String>) -> Self {
        PlumeError::Numerical(message.into())
    }

    /// Creates an actor definition error.
    pub fn actor(actor: usize, message: impl Into<String>) -> Self {
        PlumeError::Actor {
            actor,
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        PlumeError::Internal(message.into())
    }
}

/// Result type alias for PLUME operations.
pub type Result<T> = std::result::Result<T, PlumeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_constructors() {
        let geo = PlumeError::geometry("tank", "child not surrounded by parent");
        assert!(matches!(geo, PlumeError::Geometry { .. }));
        assert!(geo.to_string().contains("tank"));

        let rxn = PlumeError::reaction(2, "exclusive reaction shares a reactant");
        assert!(matches!(
            rxn,
            PlumeError::ReactionIncompatible { reaction: 2, .. }
        ));

        let pair = PlumeError::shape_pair("intersects", "Sphere/Cylinder");
        assert!(pair.to_string().contains("intersects"));
    }
}
