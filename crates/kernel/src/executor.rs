use std::rc::Rc;

use rand_distr::{Distribution, Normal};
use tracing::trace;

use linesim_core::event::{EventKind, SimEvent};
use linesim_core::process::TaskDef;

use crate::context::SimContext;
use crate::workers::RestReason;

/// Sampled durations never drop below one virtual minute.
const MIN_TASK_MINUTES: f64 = 1.0;

/// Runs one task instance of one unit through its full lifecycle:
/// wait → rule-A rest → work → inspection → rule-B rest → release.
///
/// A failed inspection releases the crew and every station and re-enters
/// from the top, so other ready tasks can overtake while this one
/// re-queues. Rule A fires before the work interval, rule B after it;
/// re-entry re-evaluates both.
pub(crate) async fn execute_task(ctx: Rc<SimContext>, engine_id: u32, task_idx: usize) {
    let task = ctx.process.tasks[task_idx].clone();
    let mut rework_count = 0u32;

    loop {
        let wait_start = ctx.clock.now();
        let crew = ctx.workers.acquire(task.required_workers).await;
        let grant = ctx.equipment.request(&task.required_tools, &ctx.clock).await;
        let wait_end = ctx.clock.now();
        if wait_end > wait_start {
            ctx.log.append(make_event(
                &task,
                engine_id,
                EventKind::Waiting,
                wait_start,
                wait_end,
                Vec::new(),
                Vec::new(),
                0,
            ));
        }

        if ctx
            .workers
            .needs_time_rest(&crew, ctx.cfg.rest_time_threshold)
        {
            let rest_start = ctx.clock.now();
            ctx.workers
                .enter_rest(&crew, &ctx.clock, ctx.cfg.rest_duration_time, RestReason::Time)
                .await;
            ctx.log.append(make_event(
                &task,
                engine_id,
                EventKind::Rest,
                rest_start,
                ctx.clock.now(),
                crew.ids().to_vec(),
                grant.station_names(),
                0,
            ));
        }

        let work_start = ctx.clock.now();
        let duration = sample_duration(&ctx, &task);
        ctx.clock.sleep(duration).await;
        ctx.workers
            .add_work_time(&crew, duration, task.work_load_score, work_start);
        let work_end = ctx.clock.now();

        if task.can_trigger_rework() && ctx.draw_rework(task.rework_prob) {
            rework_count += 1;
            ctx.log.append(make_event(
                &task,
                engine_id,
                EventKind::Rework,
                work_start,
                work_end,
                crew.ids().to_vec(),
                grant.station_names(),
                rework_count,
            ));
            ctx.equipment.release(&task.required_tools, grant, &ctx.clock);
            ctx.workers.release(crew);
            trace!(
                engine_id,
                step = %task.step_id,
                rework_count,
                "inspection failed, re-queueing"
            );
            continue;
        }

        if task.work_load_score > ctx.cfg.rest_load_threshold {
            let rest_start = ctx.clock.now();
            ctx.workers
                .enter_rest(&crew, &ctx.clock, ctx.cfg.rest_duration_load, RestReason::Load)
                .await;
            ctx.log.append(make_event(
                &task,
                engine_id,
                EventKind::Rest,
                rest_start,
                ctx.clock.now(),
                crew.ids().to_vec(),
                grant.station_names(),
                0,
            ));
        }

        let worker_ids = crew.ids().to_vec();
        let stations = grant.station_names();
        ctx.equipment.release(&task.required_tools, grant, &ctx.clock);
        ctx.workers.increment_tasks_completed(&crew);
        ctx.workers.release(crew);
        ctx.log.append(make_event(
            &task,
            engine_id,
            EventKind::Normal,
            work_start,
            work_end,
            worker_ids,
            stations,
            rework_count,
        ));
        return;
    }
}

/// Truncated-normal work duration: N(μ, σ²) clamped to at least one
/// minute; a zero σ short-circuits without touching the shared stream.
fn sample_duration(ctx: &SimContext, task: &TaskDef) -> f64 {
    if task.duration_stddev <= 0.0 {
        return task.mean_duration.max(MIN_TASK_MINUTES);
    }
    let sampled = Normal::new(task.mean_duration, task.duration_stddev)
        .map(|dist| dist.sample(&mut *ctx.rng.borrow_mut()))
        .unwrap_or(task.mean_duration);
    sampled.max(MIN_TASK_MINUTES)
}

#[allow(clippy::too_many_arguments)]
fn make_event(
    task: &TaskDef,
    engine_id: u32,
    kind: EventKind,
    start_time: f64,
    end_time: f64,
    worker_ids: Vec<String>,
    equipment_used: Vec<String>,
    rework_count: u32,
) -> SimEvent {
    SimEvent {
        engine_id,
        step_id: task.step_id.clone(),
        task_name: task.task_name.clone(),
        op_type: task.op_type,
        start_time,
        end_time,
        kind,
        worker_ids,
        equipment_used,
        rework_count,
    }
}
