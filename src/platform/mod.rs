//! Platform capabilities consumed by the reminder engine.
//!
//! The engine never talks to an OS API directly. It goes through two
//! traits that the host application implements on top of its notification
//! and background-fetch facilities:
//!
//! - [`NotificationScheduler`]: schedule-at-time, cancel-by-handle, permission
//! - [`BackgroundRegistrar`]: periodic wake-up registration
//!
//! Every method returns an explicit `Result` so that each call site in the
//! engine decides whether a failure skips one item or aborts the pass.
//! [`memory`] provides in-process implementations with failure injection.

pub mod memory;

use crate::tasks::TaskId;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque id returned by the notification facility for a pending notification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScheduledHandle(pub String);

impl ScheduledHandle {
    /// Wrap a platform id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The platform id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScheduledHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Notification permission state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    Granted,
    Denied,
    /// The user has not been asked yet.
    Undetermined,
}

impl PermissionStatus {
    pub fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// When a notification fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationTrigger {
    /// Once, at an absolute instant.
    At {
        /// Fire instant, carrying the local offset it was planned in.
        at: DateTime<FixedOffset>,
    },
    /// Every day at a local wall-clock time.
    Daily {
        /// Hour of day (0-23, local).
        hour: u32,
        /// Minute of hour (0-59).
        minute: u32,
    },
    /// Once, a number of seconds after submission.
    After {
        /// Delay in seconds.
        secs: u64,
    },
    /// Deliver right away.
    Immediate,
}

impl fmt::Display for NotificationTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::At { at } => write!(f, "at {}", at.format("%Y-%m-%d %H:%M %:z")),
            Self::Daily { hour, minute } => write!(f, "daily at {hour:02}:{minute:02}"),
            Self::After { secs } => write!(f, "in {secs}s"),
            Self::Immediate => f.write_str("immediately"),
        }
    }
}

/// Everything the notification facility needs to schedule one notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub title: String,
    pub body: String,
    pub trigger: NotificationTrigger,
    /// Task the notification refers to, if any.
    pub correlation_id: Option<TaskId>,
    /// Link opened when the notification is tapped.
    pub deep_link: Option<String>,
    /// Delivery channel (Android).
    pub channel_id: Option<String>,
}

impl NotificationRequest {
    /// Request with no payload beyond title and body.
    pub fn new(title: impl Into<String>, body: impl Into<String>, trigger: NotificationTrigger) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            trigger,
            correlation_id: None,
            deep_link: None,
            channel_id: None,
        }
    }
}

/// Error reported by a platform adapter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    /// The platform refused the request (bad trigger, quota, policy).
    #[error("rejected: {0}")]
    Rejected(String),

    /// The platform has no primitive for this operation.
    #[error("operation not supported")]
    Unsupported,

    /// Unexpected failure in the underlying facility.
    #[error("backend error: {0}")]
    Backend(String),
}

/// The device's local notification facility.
#[async_trait]
pub trait NotificationScheduler: Send + Sync {
    /// Submit a notification and return its handle.
    async fn schedule(&self, request: &NotificationRequest) -> Result<ScheduledHandle, PlatformError>;

    /// Cancel a pending notification. Cancelling a handle that already fired
    /// or never existed succeeds.
    async fn cancel(&self, handle: &ScheduledHandle) -> Result<(), PlatformError>;

    /// Current permission state, without prompting.
    async fn permission_status(&self) -> Result<PermissionStatus, PlatformError>;

    /// Prompt the user for permission if the platform allows it.
    ///
    /// The default implementation only reports the current status.
    async fn request_permission(&self) -> Result<PermissionStatus, PlatformError> {
        self.permission_status().await
    }
}

/// Whether the OS lets this app run background work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundStatus {
    Available,
    /// Disabled by OS policy (parental controls, low power).
    Restricted,
    /// Disabled by the user.
    Denied,
}

/// The OS facility that wakes the app periodically.
#[async_trait]
pub trait BackgroundRegistrar: Send + Sync {
    /// Whether background execution is currently allowed.
    async fn status(&self) -> Result<BackgroundStatus, PlatformError>;

    /// Whether a trigger named `name` is registered.
    async fn is_registered(&self, name: &str) -> Result<bool, PlatformError>;

    /// Minimum interval of the registered trigger, when the platform exposes it.
    ///
    /// `Ok(None)` means "unknown"; callers then update the interval
    /// unconditionally.
    async fn registered_interval(&self, _name: &str) -> Result<Option<u64>, PlatformError> {
        Ok(None)
    }

    /// Register a periodic trigger with a minimum interval in seconds.
    async fn register(&self, name: &str, min_interval_secs: u64) -> Result<(), PlatformError>;

    /// Change the minimum interval of a registered trigger in place.
    ///
    /// Platforms without an update primitive return
    /// [`PlatformError::Unsupported`].
    async fn set_min_interval(&self, _name: &str, _secs: u64) -> Result<(), PlatformError> {
        Err(PlatformError::Unsupported)
    }

    /// Remove a trigger.
    async fn unregister(&self, name: &str) -> Result<(), PlatformError>;
}
