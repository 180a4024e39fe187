//! In-memory capabilities shared by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::core::auth::{Account, SessionProvider};
use crate::core::diagnose::{
    AssetRef, AssetsDiagnosis, DiagnoseService, IssueKind, JarIssue,
    LibraryIssue, ProfileIssue, Side,
};
use crate::core::error::{
    DiagnoseError, InstallError, LaunchError, SessionError, StoreError, TaskControlError,
};
use crate::core::install::{InstallService, ProfileInstallRequest, VersionInstallRequest};
use crate::core::instance::InstanceRecord;
use crate::core::instance_config::InstanceStore;
use crate::core::instance_runner::{GameExit, ProcessHandle, ProcessLauncher};
use crate::core::java::{JavaRuntimeRecord, JavaScanner};
use crate::core::launcher::LaunchOptions;
use crate::core::tasks::{TaskEventBatch, TaskEventSource};
use crate::core::version_resolver::{LibraryRef, VersionDescriptor, VersionStore};

fn locked<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub(crate) fn account(id: &str, expires_at: DateTime<Utc>) -> Account {
    Account {
        id: id.to_string(),
        username: id.to_string(),
        uuid: format!("{id}-uuid"),
        access_token: format!("{id}-token"),
        user_type: "msa".to_string(),
        expires_at,
    }
}

pub(crate) fn descriptor(id: &str) -> VersionDescriptor {
    VersionDescriptor {
        id: id.to_string(),
        minecraft_version: id.split('-').next().unwrap_or(id).to_string(),
        inherits_from: None,
        jar: id.to_string(),
        main_class: Some("net.minecraft.client.main.Main".to_string()),
        client_sha1: None,
        java_major: None,
        asset_index: None,
        libraries: Vec::new(),
    }
}

pub(crate) fn library_issue(path: &str, kind: IssueKind) -> LibraryIssue {
    LibraryIssue {
        library: LibraryRef {
            name: path.to_string(),
            path: path.to_string(),
            sha1: None,
            url: None,
            size: None,
        },
        kind,
    }
}

#[derive(Default)]
pub(crate) struct FakeSessionProvider {
    account: Mutex<Option<Account>>,
    refreshed_expiry: Option<DateTime<Utc>>,
    refreshes: AtomicUsize,
    logins: AtomicUsize,
}

impl FakeSessionProvider {
    pub fn with(account: Account) -> Self {
        Self {
            account: Mutex::new(Some(account)),
            ..Self::default()
        }
    }

    /// Makes `refresh` succeed and move the expiry to `expires_at`.
    pub fn refreshing_to(mut self, expires_at: DateTime<Utc>) -> Self {
        self.refreshed_expiry = Some(expires_at);
        self
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionProvider for FakeSessionProvider {
    async fn active_account(&self) -> Option<Account> {
        locked(&self.account).clone()
    }

    async fn refresh(&self, _account_id: &str) -> Result<(), SessionError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        let expires_at = self
            .refreshed_expiry
            .ok_or_else(|| SessionError::RefreshFailed("token revoked".to_string()))?;
        if let Some(account) = locked(&self.account).as_mut() {
            account.expires_at = expires_at;
        }
        Ok(())
    }

    async fn begin_interactive_login(&self) -> Result<Account, SessionError> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        Err(SessionError::LoginCancelled)
    }
}

#[derive(Default)]
pub(crate) struct FakeVersionStore {
    versions: HashMap<String, VersionDescriptor>,
}

impl FakeVersionStore {
    pub fn with(version: VersionDescriptor) -> Self {
        let mut store = Self::default();
        store.insert(version);
        store
    }

    pub fn insert(&mut self, version: VersionDescriptor) {
        self.versions.insert(version.id.clone(), version);
    }
}

#[async_trait]
impl VersionStore for FakeVersionStore {
    async fn resolve_local_version(&self, version_id: &str) -> Option<VersionDescriptor> {
        self.versions.get(version_id).cloned()
    }
}

#[derive(Default)]
pub(crate) struct FakeDiagnoseService {
    libraries: Vec<LibraryIssue>,
    profile: Option<ProfileIssue>,
    jar_fails: bool,
    assets_fail: bool,
    calls: AtomicUsize,
}

impl FakeDiagnoseService {
    pub fn with_libraries(mut self, issues: Vec<LibraryIssue>) -> Self {
        self.libraries = issues;
        self
    }

    pub fn with_profile(mut self, issue: ProfileIssue) -> Self {
        self.profile = Some(issue);
        self
    }

    pub fn failing_jar(mut self) -> Self {
        self.jar_fails = true;
        self
    }

    pub fn failing_assets(mut self) -> Self {
        self.assets_fail = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn count(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DiagnoseService for FakeDiagnoseService {
    async fn diagnose_jar(
        &self,
        version: &VersionDescriptor,
        _side: Side,
    ) -> Result<Option<JarIssue>, DiagnoseError> {
        self.count();
        if self.jar_fails {
            return Err(DiagnoseError::Io {
                path: version.jar.clone(),
                reason: "permission denied".to_string(),
            });
        }
        Ok(None)
    }

    async fn diagnose_libraries(
        &self,
        _version: &VersionDescriptor,
    ) -> Result<Vec<LibraryIssue>, DiagnoseError> {
        self.count();
        Ok(self.libraries.clone())
    }

    async fn diagnose_assets(
        &self,
        _version: &VersionDescriptor,
    ) -> Result<AssetsDiagnosis, DiagnoseError> {
        self.count();
        if self.assets_fail {
            return Err(DiagnoseError::Network("index unreachable".to_string()));
        }
        Ok(AssetsDiagnosis::default())
    }

    async fn diagnose_profile(
        &self,
        _version_id: &str,
        _side: Side,
        _instance_id: &str,
    ) -> Result<Option<ProfileIssue>, DiagnoseError> {
        self.count();
        Ok(self.profile.clone())
    }
}

#[derive(Default)]
pub(crate) struct FakeInstaller {
    jar_fails: bool,
    libraries_error: Option<InstallError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl FakeInstaller {
    pub fn failing_jar(mut self) -> Self {
        self.jar_fails = true;
        self
    }

    pub fn failing_libraries(mut self, error: InstallError) -> Self {
        self.libraries_error = Some(error);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn step(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl InstallService for FakeInstaller {
    async fn install_version(&self, _request: &VersionInstallRequest) -> Result<(), InstallError> {
        self.step().await;
        Ok(())
    }

    async fn install_jar(&self, version: &VersionDescriptor, _side: Side) -> Result<(), InstallError> {
        self.step().await;
        if self.jar_fails {
            return Err(InstallError::Network {
                target: version.jar.clone(),
                reason: "connection reset".to_string(),
            });
        }
        Ok(())
    }

    async fn install_libraries(
        &self,
        _libraries: &[LibraryRef],
        _minecraft_version: &str,
    ) -> Result<(), InstallError> {
        self.step().await;
        self.libraries_error.clone().map_or(Ok(()), Err)
    }

    async fn install_assets_by_index(&self, _version: &VersionDescriptor) -> Result<(), InstallError> {
        self.step().await;
        Ok(())
    }

    async fn install_assets(
        &self,
        _assets: &[AssetRef],
        _minecraft_version: &str,
    ) -> Result<(), InstallError> {
        self.step().await;
        Ok(())
    }

    async fn install_by_profile(&self, _request: &ProfileInstallRequest) -> Result<(), InstallError> {
        self.step().await;
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeJavaScanner {
    runtimes: Vec<JavaRuntimeRecord>,
}

impl FakeJavaScanner {
    pub fn with(runtimes: Vec<JavaRuntimeRecord>) -> Self {
        Self { runtimes }
    }
}

#[async_trait]
impl JavaScanner for FakeJavaScanner {
    async fn all_runtimes(&self) -> Vec<JavaRuntimeRecord> {
        self.runtimes.clone()
    }

    async fn validate_path(&self, path: &str) -> Option<JavaRuntimeRecord> {
        self.runtimes.iter().find(|runtime| runtime.path == path).cloned()
    }
}

pub(crate) struct FakeLauncher {
    fails: bool,
    launched: Mutex<Vec<LaunchOptions>>,
    kills: AtomicUsize,
    exits: broadcast::Sender<GameExit>,
}

impl Default for FakeLauncher {
    fn default() -> Self {
        let (exits, _) = broadcast::channel(8);
        Self {
            fails: false,
            launched: Mutex::new(Vec::new()),
            kills: AtomicUsize::new(0),
            exits,
        }
    }
}

impl FakeLauncher {
    pub fn failing() -> Self {
        Self {
            fails: true,
            ..Self::default()
        }
    }

    pub fn launches(&self) -> usize {
        locked(&self.launched).len()
    }

    pub fn last_options(&self) -> Option<LaunchOptions> {
        locked(&self.launched).last().cloned()
    }

    pub fn kills(&self) -> usize {
        self.kills.load(Ordering::SeqCst)
    }

    pub fn emit_exit(&self, exit: GameExit) {
        let _ = self.exits.send(exit);
    }
}

#[async_trait]
impl ProcessLauncher for FakeLauncher {
    async fn launch(&self, options: &LaunchOptions) -> Result<ProcessHandle, LaunchError> {
        if self.fails {
            return Err(LaunchError::SpawnFailed("java exited immediately".to_string()));
        }
        let mut launched = locked(&self.launched);
        launched.push(options.clone());
        Ok(ProcessHandle {
            pid: 4000 + launched.len() as u32,
            instance_id: options.instance_id.clone(),
            launched_at: Utc::now(),
        })
    }

    async fn kill(&self, _handle: &ProcessHandle) -> Result<(), LaunchError> {
        self.kills.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn exits(&self) -> broadcast::Receiver<GameExit> {
        self.exits.subscribe()
    }
}

#[derive(Default)]
pub(crate) struct FakeInstanceStore {
    failures_left: AtomicUsize,
    saved: Mutex<Vec<InstanceRecord>>,
}

impl FakeInstanceStore {
    pub fn failing() -> Self {
        Self {
            failures_left: AtomicUsize::new(usize::MAX),
            ..Self::default()
        }
    }

    /// Fails the first save, then behaves.
    pub fn failing_once() -> Self {
        Self {
            failures_left: AtomicUsize::new(1),
            ..Self::default()
        }
    }

    /// Every successful save, in write order.
    pub fn saved(&self) -> Vec<InstanceRecord> {
        locked(&self.saved).clone()
    }
}

#[async_trait]
impl InstanceStore for FakeInstanceStore {
    async fn load(&self, instance_id: &str) -> Result<InstanceRecord, StoreError> {
        locked(&self.saved)
            .iter()
            .rev()
            .find(|record| record.id == instance_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(instance_id.to_string()))
    }

    async fn save(&self, record: &InstanceRecord) -> Result<(), StoreError> {
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StoreError::Io {
                path: format!("instances/{}/instance.json", record.id),
                reason: "read-only file system".to_string(),
            });
        }
        locked(&self.saved).push(record.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<InstanceRecord>, StoreError> {
        let mut latest: HashMap<String, InstanceRecord> = HashMap::new();
        for record in locked(&self.saved).iter() {
            latest.insert(record.id.clone(), record.clone());
        }
        let mut records: Vec<_> = latest.into_values().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }
}

pub(crate) struct FakeTaskSource {
    events: Mutex<Option<broadcast::Sender<TaskEventBatch>>>,
    commands: Mutex<Vec<(String, String)>>,
}

impl FakeTaskSource {
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity);
        Self {
            events: Mutex::new(Some(events)),
            commands: Mutex::new(Vec::new()),
        }
    }

    pub fn emit(&self, batch: TaskEventBatch) {
        if let Some(events) = locked(&self.events).as_ref() {
            let _ = events.send(batch);
        }
    }

    /// Drops the sender so every subscriber sees the stream end.
    pub fn close(&self) {
        locked(&self.events).take();
    }

    pub fn commands(&self) -> Vec<(String, String)> {
        locked(&self.commands).clone()
    }

    fn record(&self, command: &str, task_id: &str) {
        locked(&self.commands).push((command.to_string(), task_id.to_string()));
    }
}

#[async_trait]
impl TaskEventSource for FakeTaskSource {
    fn subscribe(&self) -> broadcast::Receiver<TaskEventBatch> {
        match locked(&self.events).as_ref() {
            Some(events) => events.subscribe(),
            None => broadcast::channel(1).1,
        }
    }

    async fn pause(&self, task_id: &str) -> Result<(), TaskControlError> {
        self.record("pause", task_id);
        Ok(())
    }

    async fn resume(&self, task_id: &str) -> Result<(), TaskControlError> {
        self.record("resume", task_id);
        Ok(())
    }

    async fn cancel(&self, task_id: &str) -> Result<(), TaskControlError> {
        self.record("cancel", task_id);
        Ok(())
    }
}
