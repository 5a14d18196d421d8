//! Error types for the engine
//!
//! Every fallible engine operation returns [`EngineError`]. Situations that
//! only reduce rendering fidelity (no shadow-casting light, more lights than a
//! material accepts) are never errors; they are logged and rendering goes on.

use crate::gfx::device::DeviceError;

/// Result alias used across the engine.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Broad failure family an [`EngineError`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad setup detected at construction or attachment time.
    Configuration,
    /// Two resources that must agree do not.
    ResourceMismatch,
    /// The graphics backend refused an operation.
    Device,
    /// An asset collaborator could not produce its resource.
    Asset,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("invalid attribute type '{0}' (expected int, float, vec2, vec3 or vec4)")]
    InvalidAttributeType(String),

    #[error("attribute data of {len} components does not divide into '{type_name}' elements")]
    InvalidAttributeLength { type_name: String, len: usize },

    #[error("material '{material}' has no setting named '{key}'")]
    UnknownSetting { material: String, key: String },

    #[error("invalid value for setting '{key}': {reason}")]
    InvalidSettingValue { key: String, reason: String },

    #[error("attaching node {child} under {parent} would create a cycle")]
    CycleDetected { parent: String, child: String },

    #[error("node {0} does not exist in this scene")]
    NodeNotFound(String),

    #[error("node {0} is not a camera")]
    NotACamera(String),

    #[error("geometry is missing required attribute '{0}'")]
    MissingAttribute(String),

    #[error("attribute sets differ: [{left}] vs [{right}]")]
    AttributeMismatch { left: String, right: String },

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("asset error: {0}")]
    Asset(String),
}

impl EngineError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EngineError::InvalidAttributeType(_)
            | EngineError::InvalidAttributeLength { .. }
            | EngineError::UnknownSetting { .. }
            | EngineError::InvalidSettingValue { .. }
            | EngineError::CycleDetected { .. }
            | EngineError::NodeNotFound(_)
            | EngineError::NotACamera(_)
            | EngineError::MissingAttribute(_) => ErrorCategory::Configuration,
            EngineError::AttributeMismatch { .. } => ErrorCategory::ResourceMismatch,
            EngineError::Device(_) => ErrorCategory::Device,
            EngineError::Asset(_) => ErrorCategory::Asset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert_eq!(
            EngineError::InvalidAttributeType("mat3".into()).category(),
            ErrorCategory::Configuration
        );
        assert_eq!(
            EngineError::AttributeMismatch {
                left: "position".into(),
                right: "position, uv".into()
            }
            .category(),
            ErrorCategory::ResourceMismatch
        );
        assert_eq!(
            EngineError::Asset("missing.obj".into()).category(),
            ErrorCategory::Asset
        );
    }

    #[test]
    fn test_error_messages_name_the_offender() {
        let err = EngineError::UnknownSetting {
            material: "line".into(),
            key: "shininess".into(),
        };
        assert_eq!(err.to_string(), "material 'line' has no setting named 'shininess'");
    }
}
