use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Station assigned to steps that do not name one.
pub const DEFAULT_STATION: &str = "ST01";

/// Operation class of a process step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpType {
    /// Handling (fetch / place).
    H,
    /// Assembly.
    A,
    /// Measurement. The only class that can fail inspection and rework.
    M,
    /// Tooling operation.
    T,
    /// Data recording.
    D,
}

impl OpType {
    /// Parses a CSV cell, accepting lower case.
    pub fn parse(raw: &str) -> Option<OpType> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "H" => Some(OpType::H),
            "A" => Some(OpType::A),
            "M" => Some(OpType::M),
            "T" => Some(OpType::T),
            "D" => Some(OpType::D),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OpType::H => "H",
            OpType::A => "A",
            OpType::M => "M",
            OpType::T => "T",
            OpType::D => "D",
        }
    }

    pub fn is_measurement(self) -> bool {
        matches!(self, OpType::M)
    }
}

/// One step of the assembly process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDef {
    pub step_id: String,
    pub task_name: String,
    pub op_type: OpType,
    /// Step ids that must finish before this step may start.
    #[serde(default)]
    pub predecessors: Vec<String>,
    /// Nominal duration in virtual minutes.
    pub mean_duration: f64,
    /// Standard deviation of the truncated-normal duration sample.
    #[serde(default)]
    pub duration_stddev: f64,
    /// REBA load score, 1..=10.
    #[serde(default = "default_load_score")]
    pub work_load_score: u8,
    /// Probability of a failed inspection; only meaningful for M steps.
    #[serde(default)]
    pub rework_prob: f64,
    #[serde(default = "default_required_workers")]
    pub required_workers: usize,
    /// Tool names; names declared as critical equipment queue, the rest
    /// are treated as unlimited.
    #[serde(default)]
    pub required_tools: Vec<String>,
    #[serde(default = "default_station")]
    pub station: String,
}

fn default_load_score() -> u8 {
    5
}

fn default_required_workers() -> usize {
    1
}

fn default_station() -> String {
    DEFAULT_STATION.to_string()
}

impl TaskDef {
    /// Whether a run of this step can end in a failed inspection.
    pub fn can_trigger_rework(&self) -> bool {
        self.op_type.is_measurement() && self.rework_prob > 0.0
    }
}

/// The full process graph for one unit of product.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessGraph {
    #[serde(default)]
    pub name: String,
    pub tasks: Vec<TaskDef>,
}

impl ProcessGraph {
    pub fn task(&self, step_id: &str) -> Option<&TaskDef> {
        self.tasks.iter().find(|t| t.step_id == step_id)
    }

    /// Field-level range checks for every step. Structural checks
    /// (cycles, unknown predecessors) are the dependency index's job.
    pub fn validate_fields(&self) -> Result<(), crate::error::SimError> {
        use crate::error::SimError;
        for task in &self.tasks {
            let invalid = |reason: String| {
                Err(SimError::InvalidTask {
                    step_id: task.step_id.clone(),
                    reason,
                })
            };
            if !task.mean_duration.is_finite() || task.mean_duration < 0.0 {
                return invalid(format!("mean duration {} must be >= 0", task.mean_duration));
            }
            if !task.duration_stddev.is_finite() || task.duration_stddev < 0.0 {
                return invalid(format!(
                    "duration stddev {} must be >= 0",
                    task.duration_stddev
                ));
            }
            if !(1..=10).contains(&task.work_load_score) {
                return invalid(format!(
                    "work load score {} must be 1..=10",
                    task.work_load_score
                ));
            }
            if !task.rework_prob.is_finite() || !(0.0..=1.0).contains(&task.rework_prob) {
                return invalid(format!(
                    "rework probability {} must be in 0..=1",
                    task.rework_prob
                ));
            }
            if task.required_workers < 1 {
                return invalid("at least one worker is required".to_string());
            }
        }
        Ok(())
    }

    /// Steps with no predecessors, in input order.
    pub fn start_tasks(&self) -> impl Iterator<Item = &TaskDef> {
        self.tasks.iter().filter(|t| t.predecessors.is_empty())
    }

    /// The largest crew any single step demands.
    pub fn max_required_workers(&self) -> usize {
        self.tasks
            .iter()
            .map(|t| t.required_workers)
            .max()
            .unwrap_or(0)
    }

    /// Every tool name referenced anywhere in the graph.
    pub fn all_tools(&self) -> BTreeSet<String> {
        self.tasks
            .iter()
            .flat_map(|t| t.required_tools.iter().cloned())
            .collect()
    }

    /// Every non-empty station referenced anywhere in the graph.
    pub fn stations(&self) -> BTreeSet<String> {
        self.tasks
            .iter()
            .filter(|t| !t.station.is_empty())
            .map(|t| t.station.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(id: &str, preds: &[&str], tools: &[&str]) -> TaskDef {
        TaskDef {
            step_id: id.to_string(),
            task_name: id.to_string(),
            op_type: OpType::A,
            predecessors: preds.iter().map(|p| p.to_string()).collect(),
            mean_duration: 10.0,
            duration_stddev: 0.0,
            work_load_score: 5,
            rework_prob: 0.0,
            required_workers: 1,
            required_tools: tools.iter().map(|t| t.to_string()).collect(),
            station: DEFAULT_STATION.to_string(),
        }
    }

    #[test]
    fn op_type_parse_accepts_lower_case() {
        assert_eq!(OpType::parse(" m "), Some(OpType::M));
        assert_eq!(OpType::parse("X"), None);
    }

    #[test]
    fn field_validation_rejects_out_of_range_values() {
        let mut bad = step("A", &[], &[]);
        bad.rework_prob = 1.5;
        let graph = ProcessGraph {
            name: String::new(),
            tasks: vec![bad],
        };
        assert!(matches!(
            graph.validate_fields(),
            Err(crate::error::SimError::InvalidTask { .. })
        ));

        let mut bad = step("A", &[], &[]);
        bad.work_load_score = 11;
        let graph = ProcessGraph {
            name: String::new(),
            tasks: vec![bad],
        };
        assert!(graph.validate_fields().is_err());

        let good = ProcessGraph {
            name: String::new(),
            tasks: vec![step("A", &[], &[])],
        };
        assert!(good.validate_fields().is_ok());
    }

    #[test]
    fn start_tasks_and_tools() {
        let graph = ProcessGraph {
            name: String::new(),
            tasks: vec![
                step("A", &[], &["rig"]),
                step("B", &["A"], &["rig", "crane"]),
            ],
        };
        let starts: Vec<&str> = graph.start_tasks().map(|t| t.step_id.as_str()).collect();
        assert_eq!(starts, ["A"]);
        let tools: Vec<String> = graph.all_tools().into_iter().collect();
        assert_eq!(tools, ["crane", "rig"]);
        assert_eq!(graph.max_required_workers(), 1);
    }
}
