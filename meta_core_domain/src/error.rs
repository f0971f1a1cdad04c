//! # Domain Error System
//!
//! Hierarchical error type for the pipeline-and-plugin-scheduler domain.
//! Errors are categorized so that infrastructure and application code can
//! make systematic retry/alerting decisions without matching on every
//! variant.

use thiserror::Error;

/// Domain-specific errors for the pipeline and plugin scheduler.
#[derive(Error, Debug, Clone)]
pub enum CoreError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("invalid state transition: {0}")]
    InvalidTransition(String),

    #[error("validation failed: {0}")]
    ValidationError(String),

    #[error("plugin error: {0}")]
    PluginError(String),

    #[error("container error: {0}")]
    ContainerError(String),

    #[error("dispatch failed: {0}")]
    DispatchFailed(String),

    #[error("callback error: {0}")]
    CallbackError(String),

    #[error("persistence error: {0}")]
    PersistenceError(String),

    #[error("io error: {0}")]
    IoError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("timeout: {0}")]
    TimeoutError(String),

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        Self::InvalidTransition(msg.into())
    }

    pub fn validation_error(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    pub fn plugin_error(msg: impl Into<String>) -> Self {
        Self::PluginError(msg.into())
    }

    pub fn container_error(msg: impl Into<String>) -> Self {
        Self::ContainerError(msg.into())
    }

    pub fn dispatch_failed(msg: impl Into<String>) -> Self {
        Self::DispatchFailed(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn persistence_error(msg: impl Into<String>) -> Self {
        Self::PersistenceError(msg.into())
    }

    /// Whether a caller may reasonably retry the operation that produced
    /// this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CoreError::TimeoutError(_) | CoreError::ResourceExhausted(_) | CoreError::IoError(_) | CoreError::ContainerError(_)
        )
    }

    /// Coarse category, useful for metrics labels and log filtering.
    pub fn category(&self) -> &'static str {
        match self {
            CoreError::InvalidConfiguration(_) => "configuration",
            CoreError::InvalidTransition(_) => "state",
            CoreError::ValidationError(_) => "validation",
            CoreError::PluginError(_) => "plugin",
            CoreError::ContainerError(_) => "container",
            CoreError::DispatchFailed(_) => "dispatch",
            CoreError::CallbackError(_) => "callback",
            CoreError::PersistenceError(_) => "persistence",
            CoreError::IoError(_) => "io",
            CoreError::SerializationError(_) => "serialization",
            CoreError::ResourceExhausted(_) => "resource",
            CoreError::TimeoutError(_) => "timeout",
            CoreError::Cancelled(_) => "cancellation",
            CoreError::NotFound(_) => "not_found",
            CoreError::Internal(_) => "internal",
        }
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        CoreError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::SerializationError(err.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
