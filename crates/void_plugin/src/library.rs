//! Dynamic plugin modules
//!
//! A module exports `create_<name>` and `destroy_<name>` with C linkage.
//! The pair passes a boxed [`Plugin`](crate::Plugin) trait object behind a
//! thin pointer, so host and module must be built by the same compiler.

use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};

use crate::error::{PluginError, PluginResult};
use crate::plugin::{CreatePluginFn, DestroyPluginFn, PluginInstance};

/// An open plugin module
pub struct PluginLibrary {
    library: Library,
    path: PathBuf,
}

impl PluginLibrary {
    /// Open the shared library at `path`
    pub fn open(path: impl AsRef<Path>) -> PluginResult<Self> {
        let path = path.as_ref();

        // SAFETY: module initialisers run here; plugin modules are trusted
        let library = unsafe { Library::new(path).map_err(|e| PluginError::load_error(path, e.to_string()))? };

        log::info!("Loaded plugin module: {}", path.display());

        Ok(Self {
            library,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn symbol<T: Copy>(&self, name: &str) -> PluginResult<T> {
        let mut bytes = name.as_bytes().to_vec();
        bytes.push(0);
        // SAFETY: callers name the exact export signature
        let symbol: Symbol<T> = unsafe {
            self.library
                .get(&bytes)
                .map_err(|_| PluginError::symbol_not_found(self.path.display().to_string(), name))?
        };
        Ok(*symbol)
    }

    /// Resolve the factory pair for `name` and build an instance
    ///
    /// The returned instance calls `destroy_<name>` when dropped and must be
    /// dropped before this library.
    pub fn instantiate(&self, name: &str) -> PluginResult<PluginInstance> {
        let create: CreatePluginFn = self.symbol(&format!("create_{}", name))?;
        let destroy: DestroyPluginFn = self.symbol(&format!("destroy_{}", name))?;

        // SAFETY: both functions come from this module and the instance is
        // dropped before the module closes
        unsafe {
            let plugin = create();
            PluginInstance::foreign(name, plugin, destroy)
        }
    }

    /// Unload the module
    pub fn close(self) -> PluginResult<()> {
        let path = self.path;
        self.library
            .close()
            .map_err(|e| PluginError::load_error(&path, e.to_string()))?;
        log::info!("Unloaded plugin module: {}", path.display());
        Ok(())
    }
}

impl std::fmt::Debug for PluginLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginLibrary").field("path", &self.path).finish()
    }
}

/// Export a plugin type from a `cdylib`
///
/// The symbol names must be `create_<name>` and `destroy_<name>` for the
/// manifest `name`.
///
/// ```ignore
/// #[derive(Default)]
/// struct Physics;
/// impl void_plugin::Plugin for Physics { /* ... */ }
/// void_plugin::export_plugin!(Physics => create_physics, destroy_physics);
/// ```
#[macro_export]
macro_rules! export_plugin {
    ($ty:ty => $create:ident, $destroy:ident) => {
        #[allow(improper_ctypes_definitions)]
        #[no_mangle]
        pub extern "C" fn $create() -> *mut $crate::PluginBox {
            let plugin: $crate::PluginBox = ::std::boxed::Box::new(<$ty as ::std::default::Default>::default());
            ::std::boxed::Box::into_raw(::std::boxed::Box::new(plugin))
        }

        #[allow(improper_ctypes_definitions)]
        #[no_mangle]
        pub extern "C" fn $destroy(plugin: *mut $crate::PluginBox) {
            if !plugin.is_null() {
                // SAFETY: produced by the matching create function
                drop(unsafe { ::std::boxed::Box::from_raw(plugin) });
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicBool, Ordering};
    use void_core::{DeltaTime, ErrorKind};
    use void_services::HostHandle;

    static PROBE_DROPPED: AtomicBool = AtomicBool::new(false);

    #[derive(Default)]
    struct ExportProbe;

    impl crate::Plugin for ExportProbe {
        fn name(&self) -> &str {
            "export_probe"
        }
        fn on_attach(&mut self, _host: &HostHandle) {}
        fn on_detach(&mut self) {}
        fn on_update(&mut self, _dt: &DeltaTime) {}
    }

    impl Drop for ExportProbe {
        fn drop(&mut self) {
            PROBE_DROPPED.store(true, Ordering::SeqCst);
        }
    }

    crate::export_plugin!(ExportProbe => create_export_probe, destroy_export_probe);

    #[test]
    fn test_exported_pair_round_trips_through_instance() {
        let plugin = create_export_probe();
        let instance = unsafe { PluginInstance::foreign("export_probe", plugin, destroy_export_probe) }.unwrap();
        assert_eq!(instance.name(), "export_probe");
        drop(instance);
        assert!(PROBE_DROPPED.load(Ordering::SeqCst));
    }

    #[test]
    fn test_missing_module_is_load_failure() {
        let err = PluginLibrary::open("/definitely/not/here/libghost.so").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LoadFailure);
        assert!(err.to_string().contains("libghost"));
    }

    #[test]
    fn test_garbage_module_is_load_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(format!("{}junk{}", std::env::consts::DLL_PREFIX, std::env::consts::DLL_SUFFIX));
        std::fs::File::create(&path).unwrap().write_all(b"not a library").unwrap();
        assert!(matches!(PluginLibrary::open(&path), Err(PluginError::LoadError { .. })));
    }
}
