mod aggregator;
mod monitor;

pub use aggregator::{
    TaskAggregator, TaskEventBatch, TaskEventPayload, TaskRecord, TaskState, TaskSummary,
    INDETERMINATE,
};
pub use monitor::TaskMonitor;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};

use crate::core::error::TaskControlError;

/// Push stream of task lifecycle batches plus the controls it accepts.
#[async_trait]
pub trait TaskEventSource: Send + Sync {
    fn subscribe(&self) -> broadcast::Receiver<TaskEventBatch>;

    async fn pause(&self, id: &str) -> Result<(), TaskControlError>;

    async fn resume(&self, id: &str) -> Result<(), TaskControlError>;

    async fn cancel(&self, id: &str) -> Result<(), TaskControlError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskCommand {
    Pause,
    Resume,
    Cancel,
}

/// Forwards user controls for tasks the aggregator knows are still active.
pub struct TaskController {
    source: Arc<dyn TaskEventSource>,
    aggregator: Arc<RwLock<TaskAggregator>>,
}

impl TaskController {
    pub fn new(source: Arc<dyn TaskEventSource>, aggregator: Arc<RwLock<TaskAggregator>>) -> Self {
        Self { source, aggregator }
    }

    pub async fn pause(&self, id: &str) -> Result<(), TaskControlError> {
        self.send(id, TaskCommand::Pause).await
    }

    pub async fn resume(&self, id: &str) -> Result<(), TaskControlError> {
        self.send(id, TaskCommand::Resume).await
    }

    pub async fn cancel(&self, id: &str) -> Result<(), TaskControlError> {
        self.send(id, TaskCommand::Cancel).await
    }

    async fn send(&self, id: &str, command: TaskCommand) -> Result<(), TaskControlError> {
        {
            // The same id may live in several groups; any active one accepts the control.
            let tasks = self.aggregator.read().await;
            let mut matches = tasks.records().filter(|record| record.id == id).peekable();
            if matches.peek().is_none() {
                return Err(TaskControlError::UnknownTask(id.to_string()));
            }
            if matches.all(|record| record.state.is_terminal()) {
                return Err(TaskControlError::AlreadyFinished(id.to_string()));
            }
        }
        tracing::debug!(task_id = id, ?command, "forwarding task control");
        match command {
            TaskCommand::Pause => self.source.pause(id).await,
            TaskCommand::Resume => self.source.resume(id).await,
            TaskCommand::Cancel => self.source.cancel(id).await,
        }
    }
}
