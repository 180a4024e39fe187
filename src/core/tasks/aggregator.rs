use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `total` value marking progress that cannot be expressed as a fraction.
pub const INDETERMINATE: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskState {
    Waiting,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Succeeded | TaskState::Failed | TaskState::Cancelled
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: String,
    pub group_id: String,
    pub started_at: DateTime<Utc>,
    pub label: String,
    pub progress: i64,
    pub total: i64,
    pub state: TaskState,
}

impl TaskRecord {
    pub fn is_indeterminate(&self) -> bool {
        self.total <= 0
    }

    /// Completion in `[0, 1]`, `None` while indeterminate.
    pub fn fraction(&self) -> Option<f64> {
        if self.is_indeterminate() {
            return None;
        }
        Some((self.progress as f64 / self.total as f64).clamp(0.0, 1.0))
    }

    fn clamp_progress(&mut self) {
        self.progress = self.progress.max(0);
        if self.total > 0 {
            self.progress = self.progress.min(self.total);
        }
    }
}

/// One add or update as emitted by the task source. Absent fields are unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskEventPayload {
    pub id: String,
    pub group_id: String,
    pub label: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub progress: Option<i64>,
    pub total: Option<i64>,
    pub state: Option<TaskState>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskEventBatch {
    pub adds: Vec<TaskEventPayload>,
    pub updates: Vec<TaskEventPayload>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    pub running: usize,
    pub waiting: usize,
    pub indeterminate: usize,
    /// Mean completion of running tasks with a known total, in `[0, 100]`.
    pub percent: Option<f64>,
}

type TaskKey = (String, String);

/// Session history of background tasks. Records are never removed.
#[derive(Debug, Default)]
pub struct TaskAggregator {
    records: HashMap<TaskKey, TaskRecord>,
    order: Vec<TaskKey>,
}

impl TaskAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds are applied before updates so a task added and advanced in the
    /// same batch ends up advanced.
    pub fn apply(&mut self, batch: &TaskEventBatch) {
        for add in &batch.adds {
            self.add(add);
        }
        for update in &batch.updates {
            self.update(update);
        }
    }

    pub fn add(&mut self, payload: &TaskEventPayload) -> bool {
        let key = (payload.group_id.clone(), payload.id.clone());
        if self.records.contains_key(&key) {
            return false;
        }
        let mut record = TaskRecord {
            id: payload.id.clone(),
            group_id: payload.group_id.clone(),
            started_at: payload.started_at.unwrap_or_else(Utc::now),
            label: payload.label.clone().unwrap_or_else(|| payload.id.clone()),
            progress: payload.progress.unwrap_or_default(),
            total: payload.total.unwrap_or(INDETERMINATE),
            state: payload.state.unwrap_or(TaskState::Running),
        };
        record.clamp_progress();
        self.order.push(key.clone());
        self.records.insert(key, record);
        true
    }

    pub fn update(&mut self, payload: &TaskEventPayload) -> bool {
        let key = (payload.group_id.clone(), payload.id.clone());
        let Some(record) = self.records.get_mut(&key) else {
            tracing::trace!(task_id = %payload.id, group_id = %payload.group_id, "update for unknown task dropped");
            return false;
        };
        if record.state.is_terminal() {
            return false;
        }

        if let Some(label) = &payload.label {
            record.label = label.clone();
        }
        if let Some(total) = payload.total {
            record.total = total;
        }
        if let Some(progress) = payload.progress {
            record.progress = progress;
        }
        record.clamp_progress();

        match payload.state {
            Some(TaskState::Waiting) if record.state != TaskState::Waiting => {}
            Some(state) => record.state = state,
            None if payload.progress.is_some() && record.state == TaskState::Waiting => {
                record.state = TaskState::Running
            }
            None => {}
        }
        true
    }

    pub fn get(&self, group_id: &str, id: &str) -> Option<&TaskRecord> {
        self.records.get(&(group_id.to_string(), id.to_string()))
    }

    /// First record with this id in arrival order, whatever its group.
    pub fn find(&self, id: &str) -> Option<&TaskRecord> {
        self.order
            .iter()
            .filter(|(_, task_id)| task_id == id)
            .find_map(|key| self.records.get(key))
    }

    pub fn records(&self) -> impl Iterator<Item = &TaskRecord> {
        self.order.iter().filter_map(|key| self.records.get(key))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn aggregate_progress(&self) -> Option<f64> {
        let fractions: Vec<f64> = self
            .records
            .values()
            .filter(|record| record.state == TaskState::Running)
            .filter_map(TaskRecord::fraction)
            .collect();
        if fractions.is_empty() {
            return None;
        }
        let mean = fractions.iter().sum::<f64>() / fractions.len() as f64;
        Some((mean * 100.0).clamp(0.0, 100.0))
    }

    pub fn summary(&self) -> TaskSummary {
        let mut summary = TaskSummary {
            percent: self.aggregate_progress(),
            ..TaskSummary::default()
        };
        for record in self.records.values() {
            match record.state {
                TaskState::Running => {
                    summary.running += 1;
                    if record.is_indeterminate() {
                        summary.indeterminate += 1;
                    }
                }
                TaskState::Waiting => summary.waiting += 1,
                _ => {}
            }
        }
        summary
    }
}
