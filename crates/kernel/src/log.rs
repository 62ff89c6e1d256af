use std::cell::{Cell, RefCell};

use linesim_core::event::{EventKind, SimEvent};
use linesim_core::result::QualityStats;

/// Append-only timeline of the run.
///
/// Events are never mutated or removed once appended; the result record
/// exposes them for querying. The inspection/rework counters are kept
/// incrementally because the quality stats are read on every result
/// assembly.
#[derive(Default)]
pub(crate) struct EventLog {
    events: RefCell<Vec<SimEvent>>,
    total_inspections: Cell<u32>,
    total_reworks: Cell<u32>,
    rework_time_total: Cell<f64>,
}

impl EventLog {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn append(&self, event: SimEvent) {
        if event.op_type.is_measurement() && event.kind == EventKind::Normal {
            self.total_inspections.set(self.total_inspections.get() + 1);
        }
        if event.kind == EventKind::Rework {
            self.total_reworks.set(self.total_reworks.get() + 1);
            self.rework_time_total
                .set(self.rework_time_total.get() + event.duration());
        }
        self.events.borrow_mut().push(event);
    }

    pub(crate) fn count_kind(&self, kind: EventKind) -> usize {
        self.events.borrow().iter().filter(|e| e.kind == kind).count()
    }

    /// Inspections are completed measurement steps; the first-pass rate
    /// is the fraction that needed no rework.
    pub(crate) fn quality(&self) -> QualityStats {
        let inspections = self.total_inspections.get();
        let reworks = self.total_reworks.get();
        QualityStats {
            total_inspections: inspections,
            total_reworks: reworks,
            first_pass_rate: if inspections > 0 {
                f64::from(inspections.saturating_sub(reworks)) / f64::from(inspections)
            } else {
                1.0
            },
            rework_time_total: self.rework_time_total.get(),
        }
    }

    pub(crate) fn snapshot(&self) -> Vec<SimEvent> {
        self.events.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linesim_core::process::OpType;

    fn event(step: &str, kind: EventKind, op: OpType, span: (f64, f64)) -> SimEvent {
        SimEvent {
            engine_id: 1,
            step_id: step.to_string(),
            task_name: step.to_string(),
            op_type: op,
            start_time: span.0,
            end_time: span.1,
            kind,
            worker_ids: vec!["Worker_01".to_string()],
            equipment_used: vec![],
            rework_count: 0,
        }
    }

    #[test]
    fn quality_counts_inspections_and_reworks() {
        let log = EventLog::new();
        log.append(event("S1", EventKind::Normal, OpType::M, (0.0, 10.0)));
        log.append(event("S2", EventKind::Rework, OpType::M, (10.0, 18.0)));
        log.append(event("S2", EventKind::Normal, OpType::M, (18.0, 26.0)));
        log.append(event("S3", EventKind::Normal, OpType::A, (26.0, 30.0)));

        let quality = log.quality();
        assert_eq!(quality.total_inspections, 2);
        assert_eq!(quality.total_reworks, 1);
        assert!((quality.first_pass_rate - 0.5).abs() < 1e-9);
        assert!((quality.rework_time_total - 8.0).abs() < 1e-9);
        assert_eq!(log.count_kind(EventKind::Normal), 3);
        assert_eq!(log.snapshot().len(), 4);
    }

    #[test]
    fn empty_log_reports_perfect_first_pass() {
        assert_eq!(EventLog::new().quality().first_pass_rate, 1.0);
    }

    #[test]
    fn waiting_on_a_measurement_step_is_not_an_inspection() {
        let log = EventLog::new();
        log.append(event("S1", EventKind::Waiting, OpType::M, (0.0, 3.0)));
        log.append(event("S1", EventKind::Rest, OpType::M, (3.0, 8.0)));
        assert_eq!(log.quality().total_inspections, 0);
    }
}
