use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::core::auth::SessionProvider;
use crate::core::config::PreflightConfig;
use crate::core::diagnose::DiagnoseService;
use crate::core::error::{ConfigError, RegistryError};
use crate::core::install::InstallService;
use crate::core::instance_config::{FsInstanceStore, InstanceStore};
use crate::core::instance_runner::ProcessLauncher;
use crate::core::java::JavaScanner;
use crate::core::java_manager::CommandJavaScanner;
use crate::core::layout::LauncherDataLayout;
use crate::core::tasks::TaskEventSource;
use crate::core::validator::LocalDiagnoseService;
use crate::core::version_resolver::{FsVersionStore, VersionStore};

type Factory<T> = Box<dyn Fn() -> Arc<T> + Send + Sync>;

/// A capability handle, created by its factory on first use and then reused.
struct Slot<T: ?Sized> {
    factory: Factory<T>,
    handle: OnceCell<Arc<T>>,
}

impl<T: ?Sized> Slot<T> {
    fn new(factory: Factory<T>) -> Self {
        Self {
            factory,
            handle: OnceCell::new(),
        }
    }

    fn get(&self) -> Arc<T> {
        self.handle.get_or_init(|| (self.factory)()).clone()
    }

    fn is_initialized(&self) -> bool {
        self.handle.get().is_some()
    }
}

fn require<T: ?Sized>(
    factory: Option<Factory<T>>,
    name: &'static str,
) -> Result<Slot<T>, RegistryError> {
    factory
        .map(Slot::new)
        .ok_or(RegistryError::MissingCapability(name))
}

/// Explicit dependency context: one lazily created handle per external capability.
pub struct CapabilityRegistry {
    session: Slot<dyn SessionProvider>,
    versions: Slot<dyn VersionStore>,
    diagnose: Slot<dyn DiagnoseService>,
    install: Slot<dyn InstallService>,
    java: Slot<dyn JavaScanner>,
    tasks: Slot<dyn TaskEventSource>,
    launcher: Slot<dyn ProcessLauncher>,
    instances: Slot<dyn InstanceStore>,
}

impl CapabilityRegistry {
    pub fn builder() -> CapabilityRegistryBuilder {
        CapabilityRegistryBuilder::default()
    }

    pub fn session(&self) -> Arc<dyn SessionProvider> {
        self.session.get()
    }

    pub fn versions(&self) -> Arc<dyn VersionStore> {
        self.versions.get()
    }

    pub fn diagnose(&self) -> Arc<dyn DiagnoseService> {
        self.diagnose.get()
    }

    pub fn install(&self) -> Arc<dyn InstallService> {
        self.install.get()
    }

    pub fn java(&self) -> Arc<dyn JavaScanner> {
        self.java.get()
    }

    pub fn tasks(&self) -> Arc<dyn TaskEventSource> {
        self.tasks.get()
    }

    pub fn launcher(&self) -> Arc<dyn ProcessLauncher> {
        self.launcher.get()
    }

    pub fn instances(&self) -> Arc<dyn InstanceStore> {
        self.instances.get()
    }

    /// Names of the capabilities that have been instantiated so far.
    pub fn initialized(&self) -> Vec<&'static str> {
        [
            ("session", self.session.is_initialized()),
            ("versions", self.versions.is_initialized()),
            ("diagnose", self.diagnose.is_initialized()),
            ("install", self.install.is_initialized()),
            ("java", self.java.is_initialized()),
            ("tasks", self.tasks.is_initialized()),
            ("launcher", self.launcher.is_initialized()),
            ("instances", self.instances.is_initialized()),
        ]
        .into_iter()
        .filter_map(|(name, ready)| ready.then_some(name))
        .collect()
    }
}

#[derive(Default)]
pub struct CapabilityRegistryBuilder {
    session: Option<Factory<dyn SessionProvider>>,
    versions: Option<Factory<dyn VersionStore>>,
    diagnose: Option<Factory<dyn DiagnoseService>>,
    install: Option<Factory<dyn InstallService>>,
    java: Option<Factory<dyn JavaScanner>>,
    tasks: Option<Factory<dyn TaskEventSource>>,
    launcher: Option<Factory<dyn ProcessLauncher>>,
    instances: Option<Factory<dyn InstanceStore>>,
}

impl CapabilityRegistryBuilder {
    pub fn session<S>(mut self, factory: impl Fn() -> Arc<S> + Send + Sync + 'static) -> Self
    where
        S: SessionProvider + 'static,
    {
        self.session = Some(Box::new(move || -> Arc<dyn SessionProvider> { factory() }));
        self
    }

    pub fn versions<S>(mut self, factory: impl Fn() -> Arc<S> + Send + Sync + 'static) -> Self
    where
        S: VersionStore + 'static,
    {
        self.versions = Some(Box::new(move || -> Arc<dyn VersionStore> { factory() }));
        self
    }

    pub fn diagnose<S>(mut self, factory: impl Fn() -> Arc<S> + Send + Sync + 'static) -> Self
    where
        S: DiagnoseService + 'static,
    {
        self.diagnose = Some(Box::new(move || -> Arc<dyn DiagnoseService> { factory() }));
        self
    }

    pub fn install<S>(mut self, factory: impl Fn() -> Arc<S> + Send + Sync + 'static) -> Self
    where
        S: InstallService + 'static,
    {
        self.install = Some(Box::new(move || -> Arc<dyn InstallService> { factory() }));
        self
    }

    pub fn java<S>(mut self, factory: impl Fn() -> Arc<S> + Send + Sync + 'static) -> Self
    where
        S: JavaScanner + 'static,
    {
        self.java = Some(Box::new(move || -> Arc<dyn JavaScanner> { factory() }));
        self
    }

    pub fn tasks<S>(mut self, factory: impl Fn() -> Arc<S> + Send + Sync + 'static) -> Self
    where
        S: TaskEventSource + 'static,
    {
        self.tasks = Some(Box::new(move || -> Arc<dyn TaskEventSource> { factory() }));
        self
    }

    pub fn launcher<S>(mut self, factory: impl Fn() -> Arc<S> + Send + Sync + 'static) -> Self
    where
        S: ProcessLauncher + 'static,
    {
        self.launcher = Some(Box::new(move || -> Arc<dyn ProcessLauncher> { factory() }));
        self
    }

    pub fn instances<S>(mut self, factory: impl Fn() -> Arc<S> + Send + Sync + 'static) -> Self
    where
        S: InstanceStore + 'static,
    {
        self.instances = Some(Box::new(move || -> Arc<dyn InstanceStore> { factory() }));
        self
    }

    /// Registers the filesystem-backed version store, diagnose service,
    /// Java scanner and instance store under `layout`.
    pub fn with_local_services(self, layout: LauncherDataLayout, config: &PreflightConfig) -> Self {
        let verify_hashes = config.verify_asset_hashes;
        let versions = layout.clone();
        let diagnose = layout.clone();
        let java = layout.clone();
        let instances = layout;
        self.versions(move || Arc::new(FsVersionStore::new(versions.clone())))
            .diagnose(move || Arc::new(LocalDiagnoseService::new(diagnose.clone(), verify_hashes)))
            .java(move || Arc::new(CommandJavaScanner::new(java.clone())))
            .instances(move || Arc::new(FsInstanceStore::new(instances.clone())))
    }

    /// [`Self::with_local_services`] rooted at the configured launcher root.
    pub fn with_configured_local_services(
        self,
        config: &PreflightConfig,
    ) -> Result<Self, ConfigError> {
        let layout = config.layout()?;
        tracing::debug!(root = %layout.root.display(), "using local launcher services");
        Ok(self.with_local_services(layout, config))
    }

    pub fn build(self) -> Result<CapabilityRegistry, RegistryError> {
        Ok(CapabilityRegistry {
            session: require(self.session, "session")?,
            versions: require(self.versions, "versions")?,
            diagnose: require(self.diagnose, "diagnose")?,
            install: require(self.install, "install")?,
            java: require(self.java, "java")?,
            tasks: require(self.tasks, "tasks")?,
            launcher: require(self.launcher, "launcher")?,
            instances: require(self.instances, "instances")?,
        })
    }
}
