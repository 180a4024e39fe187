use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{oneshot, watch, RwLock};
use tokio::task::JoinHandle;

use super::aggregator::{TaskAggregator, TaskSummary};
use super::TaskEventSource;

/// The single long-lived subscription to the task event source.
pub struct TaskMonitor {
    aggregator: Arc<RwLock<TaskAggregator>>,
    summary: watch::Receiver<TaskSummary>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl TaskMonitor {
    pub fn spawn(source: Arc<dyn TaskEventSource>, aggregator: Arc<RwLock<TaskAggregator>>) -> Self {
        let mut events = source.subscribe();
        let (summary_tx, summary) = watch::channel(TaskSummary::default());
        let (shutdown, mut shutdown_rx) = oneshot::channel();
        let tasks = aggregator.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    event = events.recv() => match event {
                        Ok(batch) => {
                            let summary = {
                                let mut tasks = tasks.write().await;
                                tasks.apply(&batch);
                                tasks.summary()
                            };
                            summary_tx.send_replace(summary);
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "task monitor fell behind, batches were dropped");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
            tracing::debug!("task monitor stopped");
        });

        Self {
            aggregator,
            summary,
            shutdown: Some(shutdown),
            handle,
        }
    }

    pub fn summary(&self) -> watch::Receiver<TaskSummary> {
        self.summary.clone()
    }

    pub fn aggregator(&self) -> Arc<RwLock<TaskAggregator>> {
        self.aggregator.clone()
    }

    pub async fn shutdown(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Err(error) = (&mut self.handle).await {
            tracing::warn!(%error, "task monitor ended abnormally");
        }
    }
}

impl Drop for TaskMonitor {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
