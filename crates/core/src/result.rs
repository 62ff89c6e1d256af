use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::event::{EventKind, SimEvent};
use crate::timegrid::TimeMapping;

/// A fatigue reading taken whenever a worker finishes working or resting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FatigueSample {
    pub time: f64,
    pub level: f64,
}

/// Per-worker accounting over the whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerStats {
    pub worker_id: String,
    pub total_time: f64,
    pub work_time: f64,
    pub rest_time: f64,
    pub idle_time: f64,
    pub utilization: f64,
    pub tasks_completed: u32,
    /// Fatigue level at the end of the run, 0..=100.
    pub fatigue_level: f64,
    /// Times the worker was put on a task with load score >= 7.
    pub high_intensity_count: u32,
    pub fatigue_history: Vec<FatigueSample>,
}

/// Per-equipment accounting over the whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquipmentStats {
    pub equipment_name: String,
    /// `None` for unlimited tools.
    pub capacity: Option<usize>,
    /// Capacity-weighted minutes available (`capacity * sim_duration`).
    pub total_time: f64,
    pub work_time: f64,
    pub idle_time: f64,
    pub utilization: f64,
    pub tasks_served: u32,
    /// Peak simultaneous holders; the interesting figure for unlimited
    /// tools, which carry no utilization.
    pub max_concurrent: u32,
    pub is_bottleneck: bool,
}

/// Inspection and rework counters derived from the event log.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityStats {
    /// Completed measurement steps.
    pub total_inspections: u32,
    pub total_reworks: u32,
    pub first_pass_rate: f64,
    pub rework_time_total: f64,
}

impl Default for QualityStats {
    fn default() -> Self {
        Self {
            total_inspections: 0,
            total_reworks: 0,
            first_pass_rate: 1.0,
            rework_time_total: 0.0,
        }
    }
}

/// Human-factor aggregates across the worker pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HumanFactorsStats {
    pub total_rest_time: f64,
    pub avg_fatigue_level: f64,
    pub max_fatigue_level: f64,
    pub total_high_intensity_exposure: u32,
    pub rest_events_count: u32,
}

/// Everything a finished run reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Effective configuration, including any stations promoted to
    /// critical equipment.
    pub config: SimConfig,
    /// Virtual minutes actually simulated, at most the time budget.
    pub sim_duration: f64,
    pub engines_completed: u32,
    pub target_achievement_rate: f64,
    pub avg_cycle_time: f64,
    pub worker_stats: Vec<WorkerStats>,
    pub equipment_stats: Vec<EquipmentStats>,
    pub quality: QualityStats,
    pub human_factors: HumanFactorsStats,
    pub events: Vec<SimEvent>,
    pub time_mapping: TimeMapping,
    pub created_at: String,
    pub completed_at: String,
}

impl SimulationResult {
    /// Events overlapping the window `[start, end)`.
    pub fn events_in_window(&self, start: f64, end: f64) -> impl Iterator<Item = &SimEvent> {
        self.events.iter().filter(move |e| e.overlaps(start, end))
    }

    pub fn events_of_kind(&self, kind: EventKind) -> impl Iterator<Item = &SimEvent> {
        self.events.iter().filter(move |e| e.kind == kind)
    }

    pub fn events_for_worker(&self, worker_id: &str) -> impl Iterator<Item = &SimEvent> {
        self.events
            .iter()
            .filter(move |e| e.worker_ids.iter().any(|w| w == worker_id))
    }

    pub fn events_for_equipment(&self, name: &str) -> impl Iterator<Item = &SimEvent> {
        self.events
            .iter()
            .filter(move |e| e.equipment_used.iter().any(|t| t == name))
    }

    /// Completion time of a unit: the latest end among its events.
    pub fn completion_time(&self, engine_id: u32) -> Option<f64> {
        self.events
            .iter()
            .filter(|e| e.engine_id == engine_id)
            .map(|e| e.end_time)
            .reduce(f64::max)
    }
}

/// Compact summary of the no-rest comparison run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoRestSummary {
    pub engines_completed: u32,
    pub avg_cycle_time: f64,
    pub sim_duration: f64,
    pub avg_worker_utilization: f64,
    pub first_pass_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::OpType;

    fn event(engine_id: u32, kind: EventKind, span: (f64, f64)) -> SimEvent {
        SimEvent {
            engine_id,
            step_id: "S1".to_string(),
            task_name: "fit".to_string(),
            op_type: OpType::A,
            start_time: span.0,
            end_time: span.1,
            kind,
            worker_ids: vec!["Worker_01".to_string()],
            equipment_used: vec!["rig".to_string()],
            rework_count: 0,
        }
    }

    fn result_with(events: Vec<SimEvent>) -> SimulationResult {
        SimulationResult {
            config: SimConfig::default(),
            sim_duration: 20.0,
            engines_completed: 1,
            target_achievement_rate: 1.0,
            avg_cycle_time: 10.0,
            worker_stats: vec![],
            equipment_stats: vec![],
            quality: QualityStats::default(),
            human_factors: HumanFactorsStats::default(),
            events,
            time_mapping: TimeMapping::from_schedule(8, 22),
            created_at: String::new(),
            completed_at: String::new(),
        }
    }

    #[test]
    fn timeline_queries_project_over_the_event_log() {
        let result = result_with(vec![
            event(1, EventKind::Normal, (0.0, 10.0)),
            event(2, EventKind::Waiting, (5.0, 12.0)),
        ]);

        assert_eq!(result.events_in_window(0.0, 4.0).count(), 1);
        assert_eq!(result.events_in_window(11.0, 20.0).count(), 1);
        assert_eq!(result.events_of_kind(EventKind::Waiting).count(), 1);
        assert_eq!(result.events_for_worker("Worker_01").count(), 2);
        assert_eq!(result.events_for_worker("Worker_02").count(), 0);
        assert_eq!(result.events_for_equipment("rig").count(), 2);
        assert_eq!(result.completion_time(1), Some(10.0));
        assert_eq!(result.completion_time(2), Some(12.0));
        assert_eq!(result.completion_time(3), None);
    }
}
