//! Launch-readiness checks for FrutiStudio instances: session, installed
//! files, Java runtime, then the launch itself.

pub mod core;

pub use crate::core::capabilities::{CapabilityRegistry, CapabilityRegistryBuilder};
pub use crate::core::config::PreflightConfig;
pub use crate::core::error::{classify, PreflightError, UserFacingIssue};
pub use crate::core::launch_pipeline::{
    LaunchIssue, LaunchOutcome, LaunchSequencer, LaunchStage, PreflightHook,
};
