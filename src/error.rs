//! Error types for the reminder engine.

/// Top-level error type for reminder scheduling.
///
/// None of these are fatal to the host application: the engine's public
/// entry points log them and degrade toward "fewer or no reminders".
#[derive(Debug, thiserror::Error)]
pub enum HiveError {
    /// Notification permission is not granted.
    #[error("notification permission denied")]
    PermissionDenied,

    /// A single schedule or cancel call against the notification facility failed.
    #[error("scheduling error: {0}")]
    Scheduling(String),

    /// Reading or writing a durable slot failed.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Background trigger registration failed.
    #[error("registration error: {0}")]
    Registration(String),

    /// Background execution is restricted or denied by OS policy.
    #[error("background registration restricted: {0}")]
    RegistrationRestricted(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, HiveError>;
