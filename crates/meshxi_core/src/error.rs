//! Error types for find element xi operations.
//!
//! Only programmer errors are reported here. An element that fails to converge,
//! or a search that finds no element, is a normal outcome and never an error.

use thiserror::Error;

/// Result type alias using [`FindXiError`].
pub type Result<T> = std::result::Result<T, FindXiError>;

/// Fatal input errors for a search or for building a mesh.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FindXiError {
    /// The field being inverted has no components.
    #[error("field has no components")]
    NoComponents,

    /// The target vector length does not match the field.
    #[error("target has {provided} values but the field has {expected} components")]
    ComponentMismatch { expected: usize, provided: usize },

    /// A target value is NaN or infinite.
    #[error("target value {value} at component {component} is not finite")]
    NonFiniteTarget { component: usize, value: f64 },

    /// Search settings failed validation.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// Mesh construction failed.
    #[error("invalid mesh: {0}")]
    InvalidMesh(String),
}
