pub mod auth;
pub mod capabilities;
pub mod config;
pub mod diagnose;
pub mod error;
pub mod install;
pub mod instance;
pub mod instance_config;
pub mod instance_locks;
pub mod instance_runner;
pub mod instance_writer;
pub mod java;
pub mod java_manager;
pub mod java_resolver;
pub mod launch_pipeline;
pub mod launcher;
pub mod layout;
pub mod loaders;
pub mod repair;
pub mod tasks;
pub mod validator;
pub mod version_resolver;

#[cfg(test)]
pub(crate) mod testing;
