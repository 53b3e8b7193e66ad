//! Plugin lifecycle
//!
//! A plugin is attached exactly once, receives per-tick and fixed updates
//! plus directly addressed messages while attached, and is detached exactly
//! once before it is destroyed. All hooks run on the main thread.

use std::ptr::NonNull;
use std::sync::{Arc, Weak};

use void_async::Promise;
use void_core::{DeltaTime, Outcome};
use void_event::Message;
use void_services::{Host, HostHandle};

use crate::error::{PluginError, PluginResult};

/// Boxed plugin object. Dynamic modules hand these across the C ABI behind a
/// thin pointer.
pub type PluginBox = Box<dyn Plugin>;

/// `create_<name>` export signature
pub type CreatePluginFn = unsafe extern "C" fn() -> *mut PluginBox;

/// `destroy_<name>` export signature
pub type DestroyPluginFn = unsafe extern "C" fn(*mut PluginBox);

/// Report returned by [`HostLink`] helpers before attach
pub const NOT_ATTACHED_REPORT: &str = "Plugin is not attached to a host";

/// Behaviour contributed by a plugin
pub trait Plugin: Send {
    /// Plugin name, matching its manifest
    fn name(&self) -> &str;

    /// Capture host references and register message handlers
    fn on_attach(&mut self, host: &HostHandle);

    /// Unregister handlers and drop host references
    fn on_detach(&mut self);

    /// Once per tick with the variable frame delta
    fn on_update(&mut self, _dt: &DeltaTime) {}

    /// Zero or more times per tick with the fixed step
    fn on_fixed_update(&mut self, _dt: &DeltaTime) {}

    /// Direct unicast from the host, separate from bus handlers
    fn on_receive_message(&mut self, _message: &mut dyn Message) {}
}

/// Non-owning host reference kept by plugins
///
/// The host owns plugins, never the other way round. Sending through an
/// unattached (or already torn down) link fails instead of panicking.
#[derive(Debug, Default, Clone)]
pub struct HostLink {
    host: Option<Weak<Host>>,
}

impl HostLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, host: &HostHandle) {
        self.host = Some(Arc::downgrade(host));
    }

    pub fn detach(&mut self) {
        self.host = None;
    }

    /// The host, while attached and alive
    pub fn host(&self) -> Option<HostHandle> {
        self.host.as_ref().and_then(Weak::upgrade)
    }

    pub fn is_attached(&self) -> bool {
        self.host().is_some()
    }

    /// Send on the host coordinator
    pub fn send_message(&self, message: &mut dyn Message) -> Outcome {
        match self.host() {
            Some(host) => host.send(message),
            None => {
                log::warn!("{} sent before attach", message.type_name());
                Outcome::failure(NOT_ATTACHED_REPORT)
            }
        }
    }

    /// Post on the host coordinator. The promise is already failed when
    /// unattached.
    pub fn post_message<M: Message>(&self, message: M) -> Promise<()> {
        match self.host() {
            Some(host) => host.post(message),
            None => {
                log::warn!("{} posted before attach", message.type_name());
                Promise::failed(NOT_ATTACHED_REPORT)
            }
        }
    }
}

/// Where an instance's memory lives
enum InstanceStorage {
    /// Built in this process (static plugins)
    Owned(PluginBox),
    /// Built by a dynamic module; handed back to its `destroy_<name>`
    Foreign {
        plugin: NonNull<PluginBox>,
        destroy: DestroyPluginFn,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttachState {
    Created,
    Attached,
    Detached,
}

/// Owned plugin object with attach/detach bookkeeping
pub struct PluginInstance {
    name: String,
    storage: InstanceStorage,
    state: AttachState,
}

// Foreign instances are only touched through `&mut self`
unsafe impl Send for PluginInstance {}

impl PluginInstance {
    /// Wrap a plugin built in this process
    pub fn owned(name: impl Into<String>, plugin: PluginBox) -> Self {
        Self {
            name: name.into(),
            storage: InstanceStorage::Owned(plugin),
            state: AttachState::Created,
        }
    }

    /// Wrap a pointer returned by a module's `create_<name>`
    ///
    /// # Safety
    /// `plugin` must come from the same module's factory and `destroy` must
    /// be its matching deleter. The module must stay loaded until this
    /// instance is dropped.
    pub unsafe fn foreign(name: impl Into<String>, plugin: *mut PluginBox, destroy: DestroyPluginFn) -> PluginResult<Self> {
        let name = name.into();
        let plugin = NonNull::new(plugin).ok_or_else(|| PluginError::NullInstance(name.clone()))?;
        Ok(Self {
            name,
            storage: InstanceStorage::Foreign { plugin, destroy },
            state: AttachState::Created,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_attached(&self) -> bool {
        self.state == AttachState::Attached
    }

    fn plugin_mut(&mut self) -> &mut dyn Plugin {
        match &mut self.storage {
            InstanceStorage::Owned(plugin) => plugin.as_mut(),
            // SAFETY: the pointer is non-null, uniquely owned by this instance
            // and valid until `destroy` runs in Drop.
            InstanceStorage::Foreign { plugin, .. } => unsafe { plugin.as_mut().as_mut() },
        }
    }

    /// Attach to `host`. Only the first call succeeds.
    pub fn attach(&mut self, host: &HostHandle) -> PluginResult<()> {
        if self.state != AttachState::Created {
            return Err(PluginError::AlreadyAttached(self.name.clone()));
        }
        log::info!("Attaching plugin: {}", self.name);
        self.plugin_mut().on_attach(host);
        self.state = AttachState::Attached;
        Ok(())
    }

    /// Detach. Only valid once, after attach.
    pub fn detach(&mut self) -> PluginResult<()> {
        if self.state != AttachState::Attached {
            return Err(PluginError::NotAttached(self.name.clone()));
        }
        log::info!("Detaching plugin: {}", self.name);
        self.plugin_mut().on_detach();
        self.state = AttachState::Detached;
        Ok(())
    }

    pub fn update(&mut self, dt: &DeltaTime) {
        if self.is_attached() {
            self.plugin_mut().on_update(dt);
        }
    }

    pub fn fixed_update(&mut self, dt: &DeltaTime) {
        if self.is_attached() {
            self.plugin_mut().on_fixed_update(dt);
        }
    }

    pub fn receive_message(&mut self, message: &mut dyn Message) {
        if self.is_attached() {
            self.plugin_mut().on_receive_message(message);
        }
    }
}

impl Drop for PluginInstance {
    fn drop(&mut self) {
        if self.state == AttachState::Attached {
            log::warn!("Plugin {} dropped while attached", self.name);
        }
        if let InstanceStorage::Foreign { plugin, destroy } = self.storage {
            // SAFETY: created by the module's factory, destroyed exactly once
            unsafe { destroy(plugin.as_ptr()) };
        }
    }
}

impl std::fmt::Debug for PluginInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginInstance")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("foreign", &matches!(self.storage, InstanceStorage::Foreign { .. }))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use void_core::ErrorKind;
    use void_event::messages::QuitApplicationCommand;
    use void_services::HostConfig;

    #[derive(Default)]
    struct Probe {
        link: HostLink,
        attached: Arc<AtomicU32>,
        updates: Arc<AtomicU32>,
    }

    impl Plugin for Probe {
        fn name(&self) -> &str {
            "probe"
        }

        fn on_attach(&mut self, host: &HostHandle) {
            self.link.attach(host);
            self.attached.fetch_add(1, Ordering::SeqCst);
        }

        fn on_detach(&mut self) {
            self.link.detach();
        }

        fn on_update(&mut self, _dt: &DeltaTime) {
            self.updates.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_attach_and_detach_once() {
        let host = Host::new(HostConfig::default()).unwrap();
        let probe = Probe::default();
        let attached = probe.attached.clone();
        let mut instance = PluginInstance::owned("probe", Box::new(probe));

        assert_eq!(instance.detach().unwrap_err().kind(), ErrorKind::InvalidArgument);
        instance.attach(&host).unwrap();
        assert!(matches!(instance.attach(&host), Err(PluginError::AlreadyAttached(_))));
        assert_eq!(attached.load(Ordering::SeqCst), 1);

        instance.detach().unwrap();
        assert!(instance.detach().is_err());
        assert!(instance.attach(&host).is_err());
    }

    #[test]
    fn test_updates_only_while_attached() {
        let host = Host::new(HostConfig::default()).unwrap();
        let probe = Probe::default();
        let updates = probe.updates.clone();
        let mut instance = PluginInstance::owned("probe", Box::new(probe));
        let dt = DeltaTime::from_seconds(0.016);

        instance.update(&dt);
        instance.attach(&host).unwrap();
        instance.update(&dt);
        instance.detach().unwrap();
        instance.update(&dt);
        assert_eq!(updates.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_link_fails_before_attach() {
        let link = HostLink::new();
        let mut quit = QuitApplicationCommand::new();
        let outcome = link.send_message(&mut quit);
        assert!(!outcome.succeeded());
        assert_eq!(outcome.report(), NOT_ATTACHED_REPORT);

        let promise = link.post_message(QuitApplicationCommand::new());
        assert_eq!(promise.resolve().unwrap().report(), NOT_ATTACHED_REPORT);
    }

    #[test]
    fn test_link_does_not_keep_host_alive() {
        let host = Host::new(HostConfig::default()).unwrap();
        let mut link = HostLink::new();
        link.attach(&host);
        assert!(link.is_attached());
        assert!(link.send_message(&mut QuitApplicationCommand::new()).succeeded());
        drop(host);
        assert!(!link.is_attached());
    }

    #[test]
    fn test_null_foreign_instance_rejected() {
        unsafe extern "C" fn destroy(_: *mut PluginBox) {}
        let result = unsafe { PluginInstance::foreign("ghost", std::ptr::null_mut(), destroy) };
        assert_eq!(result.unwrap_err().kind(), ErrorKind::LoadFailure);
    }
}
