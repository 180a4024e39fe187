use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::core::config::PreflightConfig;
use crate::core::error::{HookError, StoreError};
use crate::core::instance::InstanceRecord;
use crate::core::instance_config::InstanceStore;
use crate::core::launch_pipeline::PreflightHook;

type Reply = oneshot::Sender<Result<(), StoreError>>;

enum WriterCommand {
    Stage(InstanceRecord),
    SaveNow(InstanceRecord, Reply),
    Flush(Reply),
}

/// Single serialized writer for instance records.
///
/// Staged edits are coalesced per instance and written once the quiet period
/// passes without further edits; explicit saves and flushes bypass the wait.
/// A staged edit whose write fails stays staged and is retried.
pub struct InstanceWriter {
    commands: mpsc::Sender<WriterCommand>,
    handle: JoinHandle<()>,
}

struct WriterState {
    store: Arc<dyn InstanceStore>,
    quiet_period: Duration,
    pending: HashMap<String, InstanceRecord>,
    deadline: Option<Instant>,
}

impl WriterState {
    async fn write_pending(&mut self) -> Result<(), StoreError> {
        self.deadline = None;
        let mut pending: Vec<_> = self.pending.drain().map(|(_, record)| record).collect();
        pending.sort_by(|a, b| a.id.cmp(&b.id));

        let mut first_error = None;
        for record in pending {
            if let Err(error) = self.store.save(&record).await {
                tracing::warn!(instance_id = %record.id, %error, "staged instance save failed");
                first_error.get_or_insert(error);
                self.pending.entry(record.id.clone()).or_insert(record);
            }
        }
        if !self.pending.is_empty() {
            self.deadline = Some(Instant::now() + self.quiet_period);
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn handle(&mut self, command: WriterCommand) {
        match command {
            WriterCommand::Stage(record) => {
                self.pending.insert(record.id.clone(), record);
                self.deadline = Some(Instant::now() + self.quiet_period);
            }
            WriterCommand::SaveNow(record, reply) => {
                self.pending.remove(&record.id);
                if self.pending.is_empty() {
                    self.deadline = None;
                }
                let _ = reply.send(self.store.save(&record).await);
            }
            WriterCommand::Flush(reply) => {
                let _ = reply.send(self.write_pending().await);
            }
        }
    }
}

impl InstanceWriter {
    pub fn spawn(store: Arc<dyn InstanceStore>, quiet_period: Duration) -> Self {
        let (commands, mut inbox) = mpsc::channel(64);
        let mut state = WriterState {
            store,
            quiet_period,
            pending: HashMap::new(),
            deadline: None,
        };

        let handle = tokio::spawn(async move {
            loop {
                let deadline = state.deadline;
                tokio::select! {
                    command = inbox.recv() => match command {
                        Some(command) => state.handle(command).await,
                        None => break,
                    },
                    _ = async {
                        match deadline {
                            Some(deadline) => sleep_until(deadline).await,
                            None => std::future::pending().await,
                        }
                    } => {
                        if let Err(error) = state.write_pending().await {
                            tracing::warn!(%error, "staged instance edits will be retried");
                        }
                    }
                }
            }
            if !state.pending.is_empty() {
                if let Err(error) = state.write_pending().await {
                    tracing::error!(
                        %error,
                        unsaved = state.pending.len(),
                        "instance writer stopped with unsaved edits"
                    );
                }
            }
        });

        Self { commands, handle }
    }

    /// Writer with the configured autosave quiet period.
    pub fn from_config(store: Arc<dyn InstanceStore>, config: &PreflightConfig) -> Self {
        Self::spawn(store, config.autosave_quiet_period())
    }

    /// Queues an edit; rapid edits to the same instance collapse into one write.
    pub async fn stage(&self, record: InstanceRecord) -> Result<(), StoreError> {
        self.commands
            .send(WriterCommand::Stage(record))
            .await
            .map_err(|_| StoreError::WriterClosed)
    }

    /// Writes `record` immediately, discarding any staged edit for it.
    pub async fn save_now(&self, record: InstanceRecord) -> Result<(), StoreError> {
        let (reply, done) = oneshot::channel();
        self.commands
            .send(WriterCommand::SaveNow(record, reply))
            .await
            .map_err(|_| StoreError::WriterClosed)?;
        done.await.map_err(|_| StoreError::WriterClosed)?
    }

    pub async fn flush(&self) -> Result<(), StoreError> {
        let (reply, done) = oneshot::channel();
        self.commands
            .send(WriterCommand::Flush(reply))
            .await
            .map_err(|_| StoreError::WriterClosed)?;
        done.await.map_err(|_| StoreError::WriterClosed)?
    }

    /// Writes whatever is still staged, then stops the writer task.
    pub async fn close(self) {
        let Self { commands, handle } = self;
        drop(commands);
        if let Err(error) = handle.await {
            tracing::warn!(%error, "instance writer ended abnormally");
        }
    }
}

#[async_trait]
impl PreflightHook for InstanceWriter {
    fn name(&self) -> &str {
        "instance-writer"
    }

    async fn run(&self) -> Result<(), HookError> {
        self.flush().await.map_err(|error| HookError {
            hook: self.name().to_string(),
            reason: error.to_string(),
        })
    }
}
