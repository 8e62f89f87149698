//! Error Types
//!
//! This module defines the error types used throughout the engine.
//!
//! # Overview
//!
//! The main error type [`HoloError`] covers every failure mode of the
//! pipeline and the shader patcher. Variants fall into four categories
//! (see [`ErrorCategory`]):
//!
//! - **Configuration**: shader marker regions that cannot be found, malformed
//!   settings, template or validation failures
//! - **Resource**: assets that are missing or of the wrong kind
//! - **Lifecycle**: pipeline operations invoked in the wrong state
//! - **Backend**: GPU adapter/device/surface failures
//!
//! None of these are transient; there is no retry policy anywhere in the crate.
//!
//! # Usage
//!
//! ```rust,ignore
//! use holo::errors::{HoloError, Result};
//!
//! fn build() -> Result<()> {
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::renderer::PipelineState;

/// Coarse classification of a [`HoloError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Resource,
    Lifecycle,
    Backend,
}

/// The main error type for the engine.
#[derive(Error, Debug)]
pub enum HoloError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// A patch targeted a shader chunk that the base program does not contain.
    #[error("Shader marker region `{chunk}` not found in program `{program}`")]
    MarkerNotFound {
        /// Label of the program being patched
        program: String,
        /// Name of the missing chunk
        chunk: &'static str,
    },

    /// Invalid user-facing configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Shader template could not be loaded or rendered.
    #[error("Shader template error: {0}")]
    ShaderTemplate(#[from] minijinja::Error),

    /// Generated WGSL failed to parse or validate.
    #[error("Shader validation failed for `{label}`: {message}")]
    ShaderValidation {
        /// Program label
        label: String,
        /// Diagnostic emitted by the validator
        message: String,
    },

    /// A uniform name that is not part of the set.
    #[error("Unknown uniform `{0}`")]
    UnknownUniform(String),

    /// A uniform was written with a value of a different type.
    #[error("Uniform `{name}` expects {expected}, got {actual}")]
    UniformTypeMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// Uniform declared after the owning program was compiled.
    #[error("Uniform set is frozen; cannot declare `{0}`")]
    UniformSetFrozen(String),

    // ========================================================================
    // Resource Errors
    // ========================================================================
    /// The requested asset was not found.
    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    /// The asset exists but is not of the requested kind.
    #[error("Asset `{name}` is not a {expected}")]
    AssetTypeMismatch {
        name: String,
        expected: &'static str,
    },

    /// A device resource id that is unknown or already released.
    #[error("Unknown {kind} resource")]
    UnknownResource { kind: &'static str },

    /// Encoded image bytes could not be decoded.
    #[error("Failed to decode image `{label}`: {message}")]
    ImageDecode { label: String, message: String },

    /// Geometry attribute data is inconsistent.
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// A pipeline operation was called in a state that does not allow it.
    #[error("Pipeline lifecycle violation: `{operation}` called while {state:?}")]
    Lifecycle {
        operation: &'static str,
        state: PipelineState,
    },

    // ========================================================================
    // GPU & Backend Errors
    // ========================================================================
    /// Failed to request a compatible GPU adapter.
    #[error("Failed to request WGPU adapter: {0}")]
    AdapterRequestFailed(String),

    /// Failed to create the GPU device.
    #[error("Failed to create WGPU device: {0}")]
    DeviceCreateFailed(#[from] wgpu::RequestDeviceError),

    /// Failed to create the presentation surface.
    #[error("Failed to create surface: {0}")]
    SurfaceCreateFailed(#[from] wgpu::CreateSurfaceError),

    // ========================================================================
    // I/O & Parsing Errors
    // ========================================================================
    /// File I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl HoloError {
    /// Returns the category this error belongs to.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MarkerNotFound { .. }
            | Self::InvalidConfiguration(_)
            | Self::ShaderTemplate(_)
            | Self::ShaderValidation { .. }
            | Self::UnknownUniform(_)
            | Self::UniformTypeMismatch { .. }
            | Self::UniformSetFrozen(_)
            | Self::JsonError(_) => ErrorCategory::Configuration,
            Self::AssetNotFound(_)
            | Self::AssetTypeMismatch { .. }
            | Self::UnknownResource { .. }
            | Self::ImageDecode { .. }
            | Self::InvalidGeometry(_)
            | Self::IoError(_) => ErrorCategory::Resource,
            Self::Lifecycle { .. } => ErrorCategory::Lifecycle,
            Self::AdapterRequestFailed(_)
            | Self::DeviceCreateFailed(_)
            | Self::SurfaceCreateFailed(_) => ErrorCategory::Backend,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }

    #[inline]
    #[must_use]
    pub fn is_lifecycle(&self) -> bool {
        self.category() == ErrorCategory::Lifecycle
    }
}

/// Alias for `Result<T, HoloError>`.
pub type Result<T> = std::result::Result<T, HoloError>;
