#![allow(dead_code)]

use std::collections::BTreeMap;

use linesim_core::config::SimConfig;
use linesim_core::event::{EventKind, SimEvent};
use linesim_core::process::{OpType, ProcessGraph, TaskDef};
use linesim_core::result::SimulationResult;

pub fn task(id: &str, op: OpType, preds: &[&str], mean: f64, tools: &[&str]) -> TaskDef {
    TaskDef {
        step_id: id.to_string(),
        task_name: id.to_string(),
        op_type: op,
        predecessors: preds.iter().map(|p| p.to_string()).collect(),
        mean_duration: mean,
        duration_stddev: 0.0,
        work_load_score: 5,
        rework_prob: 0.0,
        required_workers: 1,
        required_tools: tools.iter().map(|t| t.to_string()).collect(),
        station: "ST01".to_string(),
    }
}

pub fn graph(tasks: Vec<TaskDef>) -> ProcessGraph {
    ProcessGraph {
        name: "test-flow".to_string(),
        tasks,
    }
}

/// A sequential-mode configuration with both rest rules disabled and a
/// fixed seed; scenarios opt back into the rules they exercise.
pub fn config(hours: u32, days: u32, workers: usize, target: u32) -> SimConfig {
    SimConfig {
        work_hours_per_day: hours,
        work_days_per_month: days,
        num_workers: workers,
        critical_equipment: BTreeMap::new(),
        rest_time_threshold: 1_000_000.0,
        rest_duration_time: 0.0,
        rest_load_threshold: 10,
        rest_duration_load: 0.0,
        target_output: target,
        pipeline_mode: false,
        station_constraint_mode: false,
        random_seed: Some(42),
    }
}

pub fn events_of_kind<'a>(
    result: &'a SimulationResult,
    kind: EventKind,
) -> Vec<&'a SimEvent> {
    result.events.iter().filter(|e| e.kind == kind).collect()
}

pub fn normals_for<'a>(result: &'a SimulationResult, step_id: &str) -> Vec<&'a SimEvent> {
    result
        .events
        .iter()
        .filter(|e| e.kind == EventKind::Normal && e.step_id == step_id)
        .collect()
}

pub fn approx(actual: f64, expected: f64, slack: f64) -> bool {
    (actual - expected).abs() <= slack
}
