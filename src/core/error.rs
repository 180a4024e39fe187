use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("No active account")]
    NoAccount,

    #[error("Session refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Interactive login failed: {0}")]
    LoginFailed(String),

    #[error("Interactive login was cancelled")]
    LoginCancelled,
}

#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum InstallError {
    #[error("Network failure while installing {target}: {reason}")]
    Network { target: String, reason: String },

    #[error("Could not write {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Installation of {0} was cancelled")]
    Cancelled(String),

    #[error("Unsupported install request: {0}")]
    Unsupported(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DiagnoseError {
    #[error("Could not inspect {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Network failure during diagnosis: {0}")]
    Network(String),

    #[error("Malformed metadata in {path}: {reason}")]
    Malformed { path: String, reason: String },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LaunchError {
    #[error("Instance {0} is already running")]
    AlreadyRunning(String),

    #[error("Instance {0} is not running")]
    NotRunning(String),

    #[error("Failed to start the game process: {0}")]
    SpawnFailed(String),

    #[error("Failed to terminate process {pid}: {reason}")]
    KillFailed { pid: u32, reason: String },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Instance {0} not found")]
    NotFound(String),

    #[error("Could not access {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Invalid instance record {path}: {reason}")]
    Invalid { path: String, reason: String },

    #[error("Instance writer has shut down")]
    WriterClosed,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Could not read config {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Invalid config: {0}")]
    Parse(String),

    #[error("No launcher root is configured")]
    MissingLauncherRoot,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskControlError {
    #[error("Unknown task {0}")]
    UnknownTask(String),

    #[error("Task {0} already finished")]
    AlreadyFinished(String),

    #[error("Task source rejected the request: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Preflight hook {hook} failed: {reason}")]
pub struct HookError {
    pub hook: String,
    pub reason: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("No factory registered for the {0} capability")]
    MissingCapability(&'static str),
}

/// Conditions the sequencer guarantees never happen once every check passed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("No instance selected while building launch options")]
    NoInstance,

    #[error("No active account while building launch options")]
    NoAccount,

    #[error("No resolved Java path while building launch options")]
    NoJavaPath,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PreflightError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Install(#[from] InstallError),

    #[error(transparent)]
    Diagnose(#[from] DiagnoseError),

    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    TaskControl(#[from] TaskControlError),

    #[error(transparent)]
    Hook(#[from] HookError),

    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum IssueCategory {
    UserActionable,
    Transient,
    Invariant,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SuggestedFix {
    SignIn,
    PickJava,
    RepairInstance,
    Retry,
    None,
}

/// What the UI shows for a single blocking problem.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserFacingIssue {
    pub category: IssueCategory,
    pub title: String,
    pub description: String,
    pub fix: SuggestedFix,
}

impl UserFacingIssue {
    pub(crate) fn new(
        category: IssueCategory,
        title: impl Into<String>,
        description: impl Into<String>,
        fix: SuggestedFix,
    ) -> Self {
        Self {
            category,
            title: title.into(),
            description: description.into(),
            fix,
        }
    }
}

pub fn classify(error: &PreflightError) -> UserFacingIssue {
    use IssueCategory::{Invariant, Transient, UserActionable};

    match error {
        PreflightError::Session(SessionError::NoAccount)
        | PreflightError::Session(SessionError::RefreshFailed(_))
        | PreflightError::Session(SessionError::LoginCancelled) => UserFacingIssue::new(
            UserActionable,
            "Login Required",
            error.to_string(),
            SuggestedFix::SignIn,
        ),
        PreflightError::Session(SessionError::LoginFailed(_)) => UserFacingIssue::new(
            Transient,
            "Login Failed",
            error.to_string(),
            SuggestedFix::SignIn,
        ),
        PreflightError::Install(InstallError::Cancelled(_)) => UserFacingIssue::new(
            UserActionable,
            "Repair Cancelled",
            error.to_string(),
            SuggestedFix::RepairInstance,
        ),
        PreflightError::Install(InstallError::Unsupported(_)) => UserFacingIssue::new(
            UserActionable,
            "Repair Not Possible",
            error.to_string(),
            SuggestedFix::None,
        ),
        PreflightError::Install(_) | PreflightError::Diagnose(_) => UserFacingIssue::new(
            Transient,
            "Repair Failed",
            error.to_string(),
            SuggestedFix::Retry,
        ),
        PreflightError::Launch(LaunchError::AlreadyRunning(_)) => UserFacingIssue::new(
            UserActionable,
            "Already Running",
            error.to_string(),
            SuggestedFix::None,
        ),
        PreflightError::Launch(_) => UserFacingIssue::new(
            Transient,
            "Launch Failed",
            error.to_string(),
            SuggestedFix::Retry,
        ),
        PreflightError::Store(_) | PreflightError::Hook(_) => UserFacingIssue::new(
            Transient,
            "Could Not Save Instance",
            error.to_string(),
            SuggestedFix::Retry,
        ),
        PreflightError::Config(_) => UserFacingIssue::new(
            UserActionable,
            "Invalid Configuration",
            error.to_string(),
            SuggestedFix::None,
        ),
        PreflightError::TaskControl(_) => UserFacingIssue::new(
            Transient,
            "Task Unavailable",
            error.to_string(),
            SuggestedFix::None,
        ),
        PreflightError::Invariant(_) => UserFacingIssue::new(
            Invariant,
            "Internal Error",
            error.to_string(),
            SuggestedFix::None,
        ),
    }
}
