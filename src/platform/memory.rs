//! In-process implementations of the platform traits.
//!
//! These back the operator CLI's dry runs and the test suites. Both record
//! every call in order and support failure injection so the engine's
//! degrade-don't-fail paths can be exercised without a device.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use super::{
    BackgroundRegistrar, BackgroundStatus, NotificationRequest, NotificationScheduler,
    NotificationTrigger, PermissionStatus, PlatformError, ScheduledHandle,
};

/// One recorded call against [`InMemoryNotificationScheduler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerCall {
    Schedule(ScheduledHandle),
    Cancel(ScheduledHandle),
}

#[derive(Debug, Default)]
struct SchedulerState {
    pending: BTreeMap<ScheduledHandle, NotificationRequest>,
    delivered: Vec<NotificationRequest>,
    calls: Vec<SchedulerCall>,
    fail_bodies: Vec<String>,
}

/// Notification facility that keeps pending notifications in memory.
///
/// Immediate notifications are recorded as delivered and never become
/// pending.
#[derive(Debug)]
pub struct InMemoryNotificationScheduler {
    state: Mutex<SchedulerState>,
    permission: Mutex<PermissionStatus>,
    grant_on_request: AtomicBool,
    fail_cancels: AtomicBool,
}

impl Default for InMemoryNotificationScheduler {
    fn default() -> Self {
        Self::with_permission(PermissionStatus::Granted)
    }
}

impl InMemoryNotificationScheduler {
    /// Scheduler with permission already granted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scheduler starting from a given permission state.
    pub fn with_permission(permission: PermissionStatus) -> Self {
        Self {
            state: Mutex::new(SchedulerState::default()),
            permission: Mutex::new(permission),
            grant_on_request: AtomicBool::new(true),
            fail_cancels: AtomicBool::new(false),
        }
    }

    /// Change the permission state.
    pub fn set_permission(&self, permission: PermissionStatus) {
        if let Ok(mut guard) = self.permission.lock() {
            *guard = permission;
        }
    }

    /// Whether a permission prompt on an undetermined state grants (default) or denies.
    pub fn set_grant_on_request(&self, grant: bool) {
        self.grant_on_request.store(grant, Ordering::SeqCst);
    }

    /// Make every schedule call whose body contains `needle` fail.
    pub fn fail_schedules_containing(&self, needle: impl Into<String>) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_bodies.push(needle.into());
        }
    }

    /// Make every cancel call fail.
    pub fn set_fail_cancels(&self, fail: bool) {
        self.fail_cancels.store(fail, Ordering::SeqCst);
    }

    /// Handles of notifications that are still pending.
    pub fn pending_handles(&self) -> Vec<ScheduledHandle> {
        self.state
            .lock()
            .map(|s| s.pending.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Pending notifications in handle order.
    pub fn pending(&self) -> Vec<NotificationRequest> {
        self.state
            .lock()
            .map(|s| s.pending.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Notifications delivered immediately.
    pub fn delivered(&self) -> Vec<NotificationRequest> {
        self.state
            .lock()
            .map(|s| s.delivered.clone())
            .unwrap_or_default()
    }

    /// Every schedule/cancel call, in order.
    pub fn calls(&self) -> Vec<SchedulerCall> {
        self.state
            .lock()
            .map(|s| s.calls.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, SchedulerState>, PlatformError> {
        self.state
            .lock()
            .map_err(|_| PlatformError::Backend("scheduler lock poisoned".to_owned()))
    }

    fn current_permission(&self) -> Result<PermissionStatus, PlatformError> {
        self.permission
            .lock()
            .map(|p| *p)
            .map_err(|_| PlatformError::Backend("permission lock poisoned".to_owned()))
    }
}

#[async_trait]
impl NotificationScheduler for InMemoryNotificationScheduler {
    async fn schedule(&self, request: &NotificationRequest) -> Result<ScheduledHandle, PlatformError> {
        if !self.current_permission()?.is_granted() {
            return Err(PlatformError::Rejected("notification permission not granted".to_owned()));
        }
        let mut state = self.lock()?;
        if state
            .fail_bodies
            .iter()
            .any(|needle| request.body.contains(needle.as_str()))
        {
            return Err(PlatformError::Backend(format!(
                "injected schedule failure for '{}'",
                request.body
            )));
        }

        let handle = ScheduledHandle::new(uuid::Uuid::new_v4().to_string());
        if request.trigger == NotificationTrigger::Immediate {
            state.delivered.push(request.clone());
        } else {
            state.pending.insert(handle.clone(), request.clone());
        }
        state.calls.push(SchedulerCall::Schedule(handle.clone()));
        Ok(handle)
    }

    async fn cancel(&self, handle: &ScheduledHandle) -> Result<(), PlatformError> {
        let mut state = self.lock()?;
        state.calls.push(SchedulerCall::Cancel(handle.clone()));
        if self.fail_cancels.load(Ordering::SeqCst) {
            return Err(PlatformError::Backend(format!(
                "injected cancel failure for {handle}"
            )));
        }
        state.pending.remove(handle);
        Ok(())
    }

    async fn permission_status(&self) -> Result<PermissionStatus, PlatformError> {
        self.current_permission()
    }

    async fn request_permission(&self) -> Result<PermissionStatus, PlatformError> {
        let mut guard = self
            .permission
            .lock()
            .map_err(|_| PlatformError::Backend("permission lock poisoned".to_owned()))?;
        if *guard == PermissionStatus::Undetermined {
            *guard = if self.grant_on_request.load(Ordering::SeqCst) {
                PermissionStatus::Granted
            } else {
                PermissionStatus::Denied
            };
        }
        Ok(*guard)
    }
}

/// One recorded call against [`InMemoryRegistrar`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrarCall {
    Register { name: String, secs: u64 },
    SetMinInterval { name: String, secs: u64 },
    Unregister { name: String },
}

#[derive(Debug)]
struct RegistrarState {
    triggers: HashMap<String, u64>,
    calls: Vec<RegistrarCall>,
    status: BackgroundStatus,
    duplicate_registrations: usize,
}

/// Background registrar that keeps registrations in memory.
#[derive(Debug)]
pub struct InMemoryRegistrar {
    state: Mutex<RegistrarState>,
    supports_update: bool,
    expose_interval: bool,
    fail_register: AtomicBool,
}

impl Default for InMemoryRegistrar {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRegistrar {
    /// Registrar with an in-place interval update primitive.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RegistrarState {
                triggers: HashMap::new(),
                calls: Vec::new(),
                status: BackgroundStatus::Available,
                duplicate_registrations: 0,
            }),
            supports_update: true,
            expose_interval: true,
            fail_register: AtomicBool::new(false),
        }
    }

    /// Registrar whose platform cannot change an interval in place.
    pub fn without_update_primitive() -> Self {
        Self {
            supports_update: false,
            ..Self::new()
        }
    }

    /// Registrar that cannot report the registered interval.
    pub fn without_interval_query() -> Self {
        Self {
            expose_interval: false,
            ..Self::new()
        }
    }

    /// Change the OS availability status.
    pub fn set_status(&self, status: BackgroundStatus) {
        if let Ok(mut state) = self.state.lock() {
            state.status = status;
        }
    }

    /// Make every register call fail.
    pub fn set_fail_register(&self, fail: bool) {
        self.fail_register.store(fail, Ordering::SeqCst);
    }

    /// Interval of the trigger named `name`, if registered.
    pub fn interval_of(&self, name: &str) -> Option<u64> {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.triggers.get(name).copied())
    }

    /// Number of registered triggers.
    pub fn trigger_count(&self) -> usize {
        self.state.lock().map(|s| s.triggers.len()).unwrap_or(0)
    }

    /// Register calls made while the trigger already existed.
    pub fn duplicate_registrations(&self) -> usize {
        self.state
            .lock()
            .map(|s| s.duplicate_registrations)
            .unwrap_or(0)
    }

    /// Every mutating call, in order.
    pub fn calls(&self) -> Vec<RegistrarCall> {
        self.state
            .lock()
            .map(|s| s.calls.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, RegistrarState>, PlatformError> {
        self.state
            .lock()
            .map_err(|_| PlatformError::Backend("registrar lock poisoned".to_owned()))
    }
}

#[async_trait]
impl BackgroundRegistrar for InMemoryRegistrar {
    async fn status(&self) -> Result<BackgroundStatus, PlatformError> {
        Ok(self.lock()?.status)
    }

    async fn is_registered(&self, name: &str) -> Result<bool, PlatformError> {
        Ok(self.lock()?.triggers.contains_key(name))
    }

    async fn registered_interval(&self, name: &str) -> Result<Option<u64>, PlatformError> {
        if !self.expose_interval {
            return Ok(None);
        }
        Ok(self.lock()?.triggers.get(name).copied())
    }

    async fn register(&self, name: &str, min_interval_secs: u64) -> Result<(), PlatformError> {
        let mut state = self.lock()?;
        state.calls.push(RegistrarCall::Register {
            name: name.to_owned(),
            secs: min_interval_secs,
        });
        if self.fail_register.load(Ordering::SeqCst) {
            return Err(PlatformError::Rejected("injected register failure".to_owned()));
        }
        if state.status != BackgroundStatus::Available {
            return Err(PlatformError::Rejected(format!(
                "background execution is {:?}",
                state.status
            )));
        }
        if state
            .triggers
            .insert(name.to_owned(), min_interval_secs)
            .is_some()
        {
            state.duplicate_registrations += 1;
        }
        Ok(())
    }

    async fn set_min_interval(&self, name: &str, secs: u64) -> Result<(), PlatformError> {
        if !self.supports_update {
            return Err(PlatformError::Unsupported);
        }
        let mut state = self.lock()?;
        state.calls.push(RegistrarCall::SetMinInterval {
            name: name.to_owned(),
            secs,
        });
        match state.triggers.get_mut(name) {
            Some(interval) => {
                *interval = secs;
                Ok(())
            }
            None => Err(PlatformError::Rejected(format!("no trigger named '{name}'"))),
        }
    }

    async fn unregister(&self, name: &str) -> Result<(), PlatformError> {
        let mut state = self.lock()?;
        state.calls.push(RegistrarCall::Unregister {
            name: name.to_owned(),
        });
        state.triggers.remove(name);
        Ok(())
    }
}
