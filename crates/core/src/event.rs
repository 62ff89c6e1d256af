use serde::{Deserialize, Serialize};

use crate::process::OpType;

/// What a timeline interval represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// Productive work on the step.
    Normal,
    /// The crew or equipment acquire phase blocked.
    Waiting,
    /// A rule-A or rule-B rest.
    Rest,
    /// A work interval whose inspection failed.
    Rework,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Normal => "NORMAL",
            EventKind::Waiting => "WAITING",
            EventKind::Rest => "REST",
            EventKind::Rework => "REWORK",
        }
    }
}

/// One interval on the timeline. Appended once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimEvent {
    /// Ordinal of the unit under production.
    pub engine_id: u32,
    pub step_id: String,
    pub task_name: String,
    pub op_type: OpType,
    /// Virtual minutes from run start.
    pub start_time: f64,
    pub end_time: f64,
    pub kind: EventKind,
    pub worker_ids: Vec<String>,
    pub equipment_used: Vec<String>,
    /// Cumulative reworks of this task instance; carried by REWORK and
    /// terminal NORMAL events.
    pub rework_count: u32,
}

impl SimEvent {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    pub fn overlaps(&self, start: f64, end: f64) -> bool {
        self.end_time > start && self.start_time < end
    }
}
