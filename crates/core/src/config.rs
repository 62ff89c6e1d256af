use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::process::ProcessGraph;

/// Offset applied to the seed of the no-rest comparison run so the two
/// runs draw independent streams.
pub const NO_REST_SEED_OFFSET: u64 = 1000;

/// Immutable per-run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Working hours per virtual day, 1..=24.
    pub work_hours_per_day: u32,
    /// Working days per month, 1..=31. Together with the hours this sets
    /// the time budget: `hours * 60 * days` virtual minutes.
    pub work_days_per_month: u32,
    pub num_workers: usize,
    /// Capacity-limited equipment, name -> capacity.
    pub critical_equipment: BTreeMap<String, usize>,
    /// Rule A: rest once a worker's consecutive work time reaches this
    /// many minutes.
    pub rest_time_threshold: f64,
    /// Rule A rest duration in minutes.
    pub rest_duration_time: f64,
    /// Rule B: rest after any task whose load score exceeds this, 1..=10.
    pub rest_load_threshold: u8,
    /// Rule B rest duration in minutes.
    pub rest_duration_load: f64,
    /// Units of product the month should yield.
    pub target_output: u32,
    /// Overlap several units on the line instead of producing one at a
    /// time.
    pub pipeline_mode: bool,
    /// Promote every station to a capacity-1 critical resource.
    pub station_constraint_mode: bool,
    /// Fixed seed for reproducible runs; `None` draws from the OS.
    pub random_seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            work_hours_per_day: 8,
            work_days_per_month: 22,
            num_workers: 6,
            critical_equipment: BTreeMap::from([
                ("balancing_machine".to_string(), 2),
                ("test_stand".to_string(), 1),
                ("assembly_bench".to_string(), 3),
                ("inspection_bench".to_string(), 2),
            ]),
            rest_time_threshold: 50.0,
            rest_duration_time: 5.0,
            rest_load_threshold: 7,
            rest_duration_load: 3.0,
            target_output: 3,
            pipeline_mode: true,
            station_constraint_mode: false,
            random_seed: None,
        }
    }
}

impl SimConfig {
    /// Virtual minutes per working day.
    pub fn minutes_per_day(&self) -> f64 {
        f64::from(self.work_hours_per_day) * 60.0
    }

    /// The run's time budget T in virtual minutes.
    pub fn sim_time_minutes(&self) -> f64 {
        self.minutes_per_day() * f64::from(self.work_days_per_month)
    }

    /// Range checks for every field. Called by the kernel before any
    /// event is scheduled.
    pub fn validate(&self) -> Result<(), SimError> {
        let invalid = |msg: String| Err(SimError::InvalidConfig(msg));

        if !(1..=24).contains(&self.work_hours_per_day) {
            return invalid(format!(
                "work_hours_per_day must be 1..=24, got {}",
                self.work_hours_per_day
            ));
        }
        if !(1..=31).contains(&self.work_days_per_month) {
            return invalid(format!(
                "work_days_per_month must be 1..=31, got {}",
                self.work_days_per_month
            ));
        }
        if self.num_workers < 1 {
            return invalid("num_workers must be at least 1".to_string());
        }
        for (name, capacity) in &self.critical_equipment {
            if *capacity < 1 {
                return invalid(format!("equipment `{name}` needs capacity >= 1"));
            }
        }
        if !self.rest_time_threshold.is_finite() || self.rest_time_threshold < 0.0 {
            return invalid("rest_time_threshold must be >= 0 minutes".to_string());
        }
        if !self.rest_duration_time.is_finite() || self.rest_duration_time < 0.0 {
            return invalid("rest_duration_time must be >= 0 minutes".to_string());
        }
        if !(1..=10).contains(&self.rest_load_threshold) {
            return invalid(format!(
                "rest_load_threshold must be 1..=10, got {}",
                self.rest_load_threshold
            ));
        }
        if !self.rest_duration_load.is_finite() || self.rest_duration_load < 0.0 {
            return invalid("rest_duration_load must be >= 0 minutes".to_string());
        }
        if self.target_output < 1 {
            return invalid("target_output must be at least 1".to_string());
        }
        Ok(())
    }

    /// Feasibility against a concrete process: every step's crew must fit
    /// the pool.
    pub fn validate_against(&self, process: &ProcessGraph) -> Result<(), SimError> {
        self.validate()?;
        for task in &process.tasks {
            if task.required_workers > self.num_workers {
                return Err(SimError::NotEnoughWorkers {
                    step_id: task.step_id.clone(),
                    required: task.required_workers,
                    available: self.num_workers,
                });
            }
        }
        Ok(())
    }

    /// Non-fatal observations worth surfacing before a run.
    pub fn warnings(&self, process: &ProcessGraph) -> Vec<String> {
        let mut out = Vec::new();
        if self.work_hours_per_day > 12 {
            out.push(format!(
                "{} working hours per day is unusually long",
                self.work_hours_per_day
            ));
        }
        if self.num_workers < 2 {
            out.push("a single worker rules out any task parallelism".to_string());
        }
        if self.rest_time_threshold < self.rest_duration_time {
            out.push("rest_time_threshold is shorter than rest_duration_time".to_string());
        }
        for task in &process.tasks {
            if task.op_type.is_measurement() && task.rework_prob == 0.0 {
                out.push(format!(
                    "measurement step `{}` has rework probability 0",
                    task.step_id
                ));
            }
            if task.rework_prob > 0.5 {
                out.push(format!(
                    "step `{}` reworks more often than not (p = {})",
                    task.step_id, task.rework_prob
                ));
            }
            if task.duration_stddev > task.mean_duration {
                out.push(format!(
                    "step `{}` has stddev {} above its mean {}; samples will clamp at 1 minute",
                    task.step_id, task.duration_stddev, task.mean_duration
                ));
            }
            for tool in &task.required_tools {
                if !self.critical_equipment.contains_key(tool) {
                    out.push(format!(
                        "tool `{tool}` of step `{}` is not declared critical; treating it as unlimited",
                        task.step_id
                    ));
                }
            }
        }
        out
    }

    /// The same schedule with both rest rules disabled, for the delta
    /// report: an unreachable time threshold, zero durations, and the
    /// maximum load threshold.
    pub fn no_rest_variant(&self) -> SimConfig {
        SimConfig {
            rest_time_threshold: 999_999.0,
            rest_duration_time: 0.0,
            rest_load_threshold: 10,
            rest_duration_load: 0.0,
            random_seed: self.random_seed.map(|s| s.wrapping_add(NO_REST_SEED_OFFSET)),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{OpType, TaskDef};

    #[test]
    fn defaults_validate() {
        let cfg = SimConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.sim_time_minutes(), 8.0 * 60.0 * 22.0);
    }

    #[test]
    fn out_of_range_fields_are_rejected() {
        let mut cfg = SimConfig {
            work_hours_per_day: 25,
            ..SimConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(SimError::InvalidConfig(_))));

        cfg.work_hours_per_day = 8;
        cfg.rest_load_threshold = 0;
        assert!(matches!(cfg.validate(), Err(SimError::InvalidConfig(_))));

        cfg.rest_load_threshold = 7;
        cfg.critical_equipment.insert("press".to_string(), 0);
        assert!(matches!(cfg.validate(), Err(SimError::InvalidConfig(_))));
    }

    #[test]
    fn oversized_crew_is_infeasible() {
        let cfg = SimConfig {
            num_workers: 2,
            ..SimConfig::default()
        };
        let process = ProcessGraph {
            name: String::new(),
            tasks: vec![TaskDef {
                step_id: "S1".to_string(),
                task_name: "fit".to_string(),
                op_type: OpType::A,
                predecessors: vec![],
                mean_duration: 5.0,
                duration_stddev: 0.0,
                work_load_score: 5,
                rework_prob: 0.0,
                required_workers: 3,
                required_tools: vec![],
                station: "ST01".to_string(),
            }],
        };
        assert!(matches!(
            cfg.validate_against(&process),
            Err(SimError::NotEnoughWorkers { required: 3, .. })
        ));
    }

    #[test]
    fn no_rest_variant_disables_both_rules() {
        let cfg = SimConfig {
            random_seed: Some(7),
            ..SimConfig::default()
        };
        let quiet = cfg.no_rest_variant();
        assert_eq!(quiet.rest_duration_time, 0.0);
        assert_eq!(quiet.rest_duration_load, 0.0);
        assert_eq!(quiet.rest_load_threshold, 10);
        assert_eq!(quiet.random_seed, Some(7 + NO_REST_SEED_OFFSET));
        assert!(quiet.rest_time_threshold > cfg.sim_time_minutes());
    }

    #[test]
    fn config_round_trips_through_json() {
        let cfg = SimConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: SimConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }
}
