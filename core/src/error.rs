use thiserror::Error;

/// Error type for map surface and marker reconciliation failures.
#[derive(Error, Debug, Clone, PartialEq, uniffi::Error)]
pub enum MapError {
    #[error("map surface failed to initialize: {message}")]
    SurfaceInit { message: String },

    #[error("map surface lost: {message}")]
    SurfaceLost { message: String },

    #[error("map surface was torn down")]
    StaleSurface,

    #[error("failed to create marker for dive {id}: {message}")]
    MarkerCreate { id: String, message: String },

    #[error("draw command failed: {message}")]
    Draw { message: String },

    #[error("map is not ready: {message}")]
    NotReady { message: String },

    #[error("invalid map configuration: {message}")]
    Config { message: String },

    #[error("unexpected callback error: {reason}")]
    Callback { reason: String },
}

impl MapError {
    /// Fatal errors leave the surface unusable until it is re-initialized.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MapError::SurfaceInit { .. } | MapError::SurfaceLost { .. } | MapError::Callback { .. }
        )
    }
}

impl From<uniffi::UnexpectedUniFFICallbackError> for MapError {
    fn from(err: uniffi::UnexpectedUniFFICallbackError) -> Self {
        MapError::Callback { reason: err.reason }
    }
}

impl From<ConfigError> for MapError {
    fn from(err: ConfigError) -> Self {
        MapError::Config {
            message: err.to_string(),
        }
    }
}

/// Error type for dive record and photo operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DiveLogError {
    #[error("dive not found: {0}")]
    NotFound(String),

    #[error("photo not found: {0}")]
    PhotoNotFound(String),

    #[error("sign in required")]
    Unauthenticated,

    #[error("dive {0} belongs to another user")]
    Forbidden(String),

    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("document store error: {0}")]
    Store(String),

    #[error("blob store error: {0}")]
    Blob(String),
}

impl DiveLogError {
    pub(crate) fn validation(field: &str, message: impl Into<String>) -> Self {
        DiveLogError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Error type for coordinate text parsing.
#[derive(Error, Debug, Clone, PartialEq, uniffi::Error)]
pub enum CoordinateError {
    #[error("empty coordinate text")]
    Empty,

    #[error("parse error at position {position}: {message}")]
    Parse { position: u32, message: String },

    #[error("{axis} {value} is out of range")]
    OutOfRange { axis: String, value: f64 },
}

/// Error type for configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(Box<figment::Error>),

    #[error("invalid configuration: {message}")]
    Validation { message: String },
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Load(Box::new(err))
    }
}
