use std::collections::HashMap;
use std::fmt::{self, Display};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use once_cell::sync::OnceCell;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::core::auth::{check_session, Account, SessionCheck};
use crate::core::capabilities::CapabilityRegistry;
use crate::core::config::PreflightConfig;
use crate::core::diagnose::{DiagnosisFinding, Diagnostician, RepairInstruction};
use crate::core::error::{
    classify, HookError, InvariantViolation, IssueCategory, LaunchError, SessionError,
    SuggestedFix, UserFacingIssue,
};
use crate::core::instance::InstanceRecord;
use crate::core::instance_locks::InstanceLocks;
use crate::core::instance_runner::{ExitKind, ProcessHandle};
use crate::core::java::{CompatibilityVerdict, ResolvedJava};
use crate::core::java_resolver::{required_java_major, resolve_java};
use crate::core::launcher::LaunchOptions;
use crate::core::repair::{plan, RepairExecutor, RepairRun};

/// Work that must happen before every launch attempt, such as flushing edits.
#[async_trait]
pub trait PreflightHook: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self) -> Result<(), HookError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LaunchStage {
    Idle,
    ExecutingPreflightHooks,
    CheckingSession,
    CheckingVersionAssets,
    CheckingJava,
    BuildingOptions,
    Launched,
}

impl Display for LaunchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LaunchStage::Idle => "idle",
            LaunchStage::ExecutingPreflightHooks => "executing preflight hooks",
            LaunchStage::CheckingSession => "checking session",
            LaunchStage::CheckingVersionAssets => "checking version and assets",
            LaunchStage::CheckingJava => "checking java",
            LaunchStage::BuildingOptions => "building options",
            LaunchStage::Launched => "launched",
        };
        f.write_str(label)
    }
}

/// Priority of a blocking issue; lower ranks are always handled first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum IssueRank {
    Session,
    Version,
    Java,
}

#[derive(Debug, Clone)]
pub enum LaunchIssue {
    Session {
        reason: SessionError,
    },
    /// Another launch is diagnosing or repairing this instance; nothing was checked.
    RepairInProgress {
        instance_id: String,
    },
    Version {
        instruction: RepairInstruction,
        repair: RepairRun,
    },
    Java {
        resolved: ResolvedJava,
    },
}

impl LaunchIssue {
    pub fn rank(&self) -> IssueRank {
        match self {
            LaunchIssue::Session { .. } => IssueRank::Session,
            LaunchIssue::RepairInProgress { .. } | LaunchIssue::Version { .. } => {
                IssueRank::Version
            }
            LaunchIssue::Java { .. } => IssueRank::Java,
        }
    }

    pub fn stage(&self) -> LaunchStage {
        match self.rank() {
            IssueRank::Session => LaunchStage::CheckingSession,
            IssueRank::Version => LaunchStage::CheckingVersionAssets,
            IssueRank::Java => LaunchStage::CheckingJava,
        }
    }

    pub fn to_user_issue(&self) -> UserFacingIssue {
        match self {
            LaunchIssue::Session { reason } => classify(&reason.clone().into()),
            LaunchIssue::RepairInProgress { .. } => repair_in_progress(
                "A repair for this instance is already running. Try again once it finishes.",
            ),
            LaunchIssue::Version { instruction, repair } => version_issue(instruction, repair),
            LaunchIssue::Java { resolved } => java_issue(resolved),
        }
    }
}

fn repair_in_progress(description: impl Into<String>) -> UserFacingIssue {
    UserFacingIssue::new(
        IssueCategory::Transient,
        "Repair In Progress",
        description,
        SuggestedFix::None,
    )
}

fn version_issue(instruction: &RepairInstruction, repair: &RepairRun) -> UserFacingIssue {
    let found: Vec<String> = instruction
        .user_findings()
        .iter()
        .map(DiagnosisFinding::describe)
        .collect();
    let found = found.join("; ");

    match repair {
        RepairRun::Skipped => {
            repair_in_progress(format!("{found}. A repair for this instance is already running."))
        }
        RepairRun::Completed(report) if report.is_success() => UserFacingIssue::new(
            IssueCategory::UserActionable,
            "Instance Repaired",
            format!("{found}. The files were repaired; launch again to continue."),
            SuggestedFix::Retry,
        ),
        RepairRun::Completed(report) if !report.unresolved.is_empty() => UserFacingIssue::new(
            IssueCategory::UserActionable,
            "Java Required For Repair",
            report.user_message(),
            SuggestedFix::PickJava,
        ),
        RepairRun::Completed(report) => UserFacingIssue::new(
            IssueCategory::Transient,
            "Repair Failed",
            report.user_message(),
            SuggestedFix::RepairInstance,
        ),
    }
}

fn java_issue(resolved: &ResolvedJava) -> UserFacingIssue {
    let description = match (resolved.verdict, resolved.requested_path.as_deref()) {
        (CompatibilityVerdict::Incompatible, _) => format!(
            "The selected Java {} does not match the required Java {}.",
            resolved
                .resolved
                .as_ref()
                .map(|runtime| runtime.major_version.to_string())
                .unwrap_or_else(|| "runtime".to_string()),
            resolved.required_major
        ),
        (_, Some(requested)) => match &resolved.auto_pick {
            Some(candidate) => format!(
                "The selected Java at {requested} is not usable. {} would work instead.",
                candidate.path
            ),
            None => format!(
                "The selected Java at {requested} is not usable and no Java {} was found.",
                resolved.required_major
            ),
        },
        (_, None) => format!("No Java {} runtime was found.", resolved.required_major),
    };
    UserFacingIssue::new(
        IssueCategory::UserActionable,
        "Java Issue",
        description,
        SuggestedFix::PickJava,
    )
}

#[derive(Debug, Clone)]
pub enum LaunchOutcome {
    Launched(ProcessHandle),
    Blocked(LaunchIssue),
    Failed(LaunchError),
    Aborted(InvariantViolation),
}

impl LaunchOutcome {
    pub fn user_issue(&self) -> Option<UserFacingIssue> {
        match self {
            LaunchOutcome::Launched(_) => None,
            LaunchOutcome::Blocked(issue) => Some(issue.to_user_issue()),
            LaunchOutcome::Failed(error) => Some(classify(&error.clone().into())),
            LaunchOutcome::Aborted(violation) => Some(classify(&violation.clone().into())),
        }
    }
}

/// Runs the launch checks in a fixed order and starts the game when all pass.
///
/// One call handles at most one blocking issue and never loops back: after a
/// repair the caller launches again, which re-diagnoses from scratch.
pub struct LaunchSequencer {
    registry: Arc<CapabilityRegistry>,
    config: PreflightConfig,
    hooks: Mutex<Vec<Arc<dyn PreflightHook>>>,
    repairs: OnceCell<RepairExecutor>,
    locks: InstanceLocks,
    stage: watch::Sender<LaunchStage>,
    running: Mutex<HashMap<String, ProcessHandle>>,
}

impl LaunchSequencer {
    pub fn new(registry: Arc<CapabilityRegistry>, config: PreflightConfig) -> Self {
        let (stage, _) = watch::channel(LaunchStage::Idle);
        Self {
            registry,
            config,
            hooks: Mutex::new(Vec::new()),
            repairs: OnceCell::new(),
            locks: InstanceLocks::new(),
            stage,
            running: Mutex::new(HashMap::new()),
        }
    }

    pub fn register_hook(&self, hook: Arc<dyn PreflightHook>) {
        self.hooks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(hook);
    }

    pub fn stages(&self) -> watch::Receiver<LaunchStage> {
        self.stage.subscribe()
    }

    pub fn current_stage(&self) -> LaunchStage {
        *self.stage.borrow()
    }

    pub fn running(&self, instance_id: &str) -> Option<ProcessHandle> {
        self.running_map().get(instance_id).cloned()
    }

    fn running_map(&self) -> std::sync::MutexGuard<'_, HashMap<String, ProcessHandle>> {
        self.running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn repairs(&self) -> &RepairExecutor {
        self.repairs
            .get_or_init(|| RepairExecutor::new(self.registry.install()))
    }

    fn enter(&self, instance_id: &str, stage: LaunchStage) {
        tracing::debug!(instance_id, %stage, "launch stage");
        self.stage.send_replace(stage);
    }

    fn stop(&self, instance_id: &str, outcome: LaunchOutcome) -> LaunchOutcome {
        match &outcome {
            LaunchOutcome::Blocked(issue) => {
                tracing::info!(instance_id, rank = ?issue.rank(), "launch blocked");
            }
            LaunchOutcome::Failed(error) => tracing::warn!(instance_id, %error, "launch failed"),
            LaunchOutcome::Aborted(violation) => {
                tracing::error!(instance_id, %violation, "launch aborted")
            }
            LaunchOutcome::Launched(_) => {}
        }
        self.stage.send_replace(LaunchStage::Idle);
        outcome
    }

    pub async fn launch(&self, instance: &InstanceRecord) -> LaunchOutcome {
        let instance_id = instance.id.as_str();
        if self.running(instance_id).is_some() {
            return self.stop(
                instance_id,
                LaunchOutcome::Failed(LaunchError::AlreadyRunning(instance.id.clone())),
            );
        }

        self.enter(instance_id, LaunchStage::ExecutingPreflightHooks);
        self.run_hooks(instance_id).await;

        self.enter(instance_id, LaunchStage::CheckingSession);
        let account = match check_session(
            self.registry.session().as_ref(),
            self.config.session_grace(),
            Utc::now(),
        )
        .await
        {
            SessionCheck::Valid(account) => account,
            SessionCheck::LoginRequired { reason } => {
                return self.stop(
                    instance_id,
                    LaunchOutcome::Blocked(LaunchIssue::Session { reason }),
                );
            }
        };

        self.enter(instance_id, LaunchStage::CheckingVersionAssets);
        let instruction = match self.check_version(instance).await {
            Ok(instruction) => instruction,
            Err(issue) => return self.stop(instance_id, LaunchOutcome::Blocked(issue)),
        };

        self.enter(instance_id, LaunchStage::CheckingJava);
        let java = self.check_java(instance, &instruction).await;
        if !java.verdict.is_launch_eligible() {
            return self.stop(
                instance_id,
                LaunchOutcome::Blocked(LaunchIssue::Java { resolved: java }),
            );
        }

        self.enter(instance_id, LaunchStage::BuildingOptions);
        let options = match self.build_options(instance, &account, &java, &instruction) {
            Ok(options) => options,
            Err(violation) => return self.stop(instance_id, LaunchOutcome::Aborted(violation)),
        };

        match self.registry.launcher().launch(&options).await {
            Ok(handle) => {
                self.running_map()
                    .insert(instance.id.clone(), handle.clone());
                self.enter(instance_id, LaunchStage::Launched);
                tracing::info!(instance_id, pid = handle.pid, "game launched");
                LaunchOutcome::Launched(handle)
            }
            Err(error) => self.stop(instance_id, LaunchOutcome::Failed(error)),
        }
    }

    async fn run_hooks(&self, instance_id: &str) {
        let hooks = self
            .hooks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        let results = join_all(hooks.iter().map(|hook| hook.run())).await;
        for error in results.into_iter().filter_map(Result::err) {
            tracing::warn!(instance_id, hook = %error.hook, %error, "preflight hook failed");
        }
    }

    /// Diagnoses and, when anything is wrong, repairs. Any finding stops the launch.
    /// Diagnosis and repair of one instance hold its lock from start to end.
    async fn check_version(&self, instance: &InstanceRecord) -> Result<RepairInstruction, LaunchIssue> {
        let Some(_serialized) = self.locks.try_acquire(&instance.id) else {
            tracing::info!(instance_id = %instance.id, "instance is busy with another check or repair");
            return Err(LaunchIssue::RepairInProgress {
                instance_id: instance.id.clone(),
            });
        };

        let instruction = self.diagnostician().diagnose(instance).await;
        if instruction.is_ready() {
            return Ok(instruction);
        }

        let needs_java = instruction
            .findings
            .iter()
            .any(|finding| matches!(finding, DiagnosisFinding::BadInstallProfile { .. }));
        let runtimes = if needs_java {
            self.registry.java().all_runtimes().await
        } else {
            Vec::new()
        };

        let plan = plan(&instruction, &runtimes);
        let repair = self.repairs().execute(&plan).await;
        Err(LaunchIssue::Version {
            instruction,
            repair,
        })
    }

    fn diagnostician(&self) -> Diagnostician {
        Diagnostician::new(self.registry.versions(), self.registry.diagnose())
    }

    async fn check_java(&self, instance: &InstanceRecord, instruction: &RepairInstruction) -> ResolvedJava {
        let requirement = &instruction.runtime_requirement;
        let required_major = required_java_major(
            &requirement.minecraft,
            instruction
                .resolved_version
                .as_ref()
                .and_then(|version| version.java_major),
            None,
        );
        let requested = instance
            .java_override()
            .or_else(|| self.config.java_override());

        let scanner = self.registry.java();
        let runtimes = scanner.all_runtimes().await;
        resolve_java(
            &instance.id,
            required_major,
            requested,
            &runtimes,
            |path| async move { scanner.validate_path(&path).await },
        )
        .await
    }

    fn build_options(
        &self,
        instance: &InstanceRecord,
        account: &Account,
        java: &ResolvedJava,
        instruction: &RepairInstruction,
    ) -> Result<LaunchOptions, InvariantViolation> {
        LaunchOptions::assemble(
            Some(instance),
            Some(account),
            Some(java),
            instruction.resolved_version.as_ref(),
        )
    }

    pub async fn kill(&self, instance_id: &str) -> Result<(), LaunchError> {
        let handle = self
            .running(instance_id)
            .ok_or_else(|| LaunchError::NotRunning(instance_id.to_string()))?;
        self.registry.launcher().kill(&handle).await?;
        self.forget(instance_id, handle.pid);
        tracing::info!(instance_id, pid = handle.pid, "game process killed");
        Ok(())
    }

    fn forget(&self, instance_id: &str, pid: u32) {
        let mut running = self.running_map();
        if running.get(instance_id).is_some_and(|handle| handle.pid == pid) {
            running.remove(instance_id);
        }
    }

    /// Clears process handles as games exit.
    pub fn watch_exits(self: &Arc<Self>) -> JoinHandle<()> {
        let mut exits = self.registry.launcher().exits();
        let sequencer = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match exits.recv().await {
                    Ok(exit) => {
                        sequencer.forget(&exit.instance_id, exit.pid);
                        let kind = exit.classify();
                        if kind == ExitKind::Crashed {
                            tracing::warn!(
                                instance_id = %exit.instance_id,
                                exit_code = ?exit.exit_code,
                                crash_report = ?exit.crash_report_path,
                                "game crashed"
                            );
                        } else {
                            tracing::info!(instance_id = %exit.instance_id, ?kind, "game exited");
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "missed game exit events");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}
