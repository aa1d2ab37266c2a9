//! Error taxonomy shared by every component of the core.

use rover_kinematics::KinematicsError;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the rover simulation core.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Invalid or incomplete configuration. Fatal for the component being
    /// initialized, never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A tick produced an unusable number (zero `dt`, NaN, Inf). The update is
    /// skipped and the previous value held.
    #[error("Transient numeric error: {0}")]
    TransientNumeric(&'static str),

    /// The Clock or the Actuator/World stopped answering. The component
    /// disables itself.
    #[error("Collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),
}

impl Error {
    /// Shorthand for a [`Error::Configuration`] error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    /// Shorthand for a [`Error::CollaboratorUnavailable`] error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Error::CollaboratorUnavailable(msg.into())
    }

    /// Returns `true` for errors after which the component must stop ticking.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::TransientNumeric(_))
    }
}

impl From<KinematicsError> for Error {
    fn from(err: KinematicsError) -> Self {
        match err {
            KinematicsError::InvalidTimeDelta(msg) => Error::TransientNumeric(msg),
            other => Error::Configuration(other.to_string()),
        }
    }
}
