use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use tokio::task::JoinSet;
use tracing::debug;

use crate::context::SimContext;
use crate::executor::execute_task;

/// How long the dispatch loop yields between ready-set checks. Under the
/// event scheduler this hands control to the running executors and only
/// advances the clock when nothing else can run.
const DISPATCH_TICK_MINUTES: f64 = 0.1;

/// Admission back-off when the pool has no room for a new unit.
const ADMISSION_BACKOFF_MINUTES: f64 = 10.0;

/// Extra units the pipeline may start beyond the target, to allow
/// exceeding it.
const PIPELINE_SLACK_UNITS: u32 = 2;

/// Dispatch loop for one unit under production: launch every ready task
/// as its predecessors complete, until the whole graph is done or the
/// budget runs out.
pub(crate) async fn run_unit(ctx: Rc<SimContext>, engine_id: u32) {
    let total = ctx.dag.len();
    let completed: Rc<RefCell<HashSet<usize>>> = Rc::new(RefCell::new(HashSet::new()));
    let running: Rc<RefCell<HashSet<usize>>> = Rc::new(RefCell::new(HashSet::new()));

    while completed.borrow().len() < total {
        if ctx.clock.now() >= ctx.time_budget {
            debug!(engine_id, "time budget reached with unit incomplete");
            return;
        }

        let ready: Vec<usize> = {
            let done = completed.borrow();
            let active = running.borrow();
            ctx.dag
                .ready(&done)
                .into_iter()
                .filter(|idx| !active.contains(idx))
                .collect()
        };
        for task_idx in ready {
            running.borrow_mut().insert(task_idx);
            let ctx = ctx.clone();
            let completed = completed.clone();
            let running = running.clone();
            let _ = tokio::task::spawn_local(async move {
                execute_task(ctx, engine_id, task_idx).await;
                running.borrow_mut().remove(&task_idx);
                completed.borrow_mut().insert(task_idx);
            });
        }

        ctx.clock.sleep(DISPATCH_TICK_MINUTES).await;
    }

    ctx.unit_end_times
        .borrow_mut()
        .insert(engine_id, ctx.clock.now());
    ctx.engines_completed.set(ctx.engines_completed.get() + 1);
    debug!(engine_id, at = ctx.clock.now(), "unit completed");
}

/// Pipeline admission: keep starting units while there is worker
/// headroom for the first step, staggered by half its nominal duration,
/// up to `target_output` plus a small slack.
pub(crate) async fn run_pipeline(ctx: Rc<SimContext>) {
    let max_units = ctx.cfg.target_output + PIPELINE_SLACK_UNITS;
    let Some(&first) = ctx.dag.start_nodes().first() else {
        return;
    };
    let first_task = &ctx.process.tasks[first];
    let min_workers = first_task.required_workers;
    let stagger = first_task.mean_duration * 0.5;

    let mut units = JoinSet::new();
    let mut engine_id = 0u32;
    while engine_id < max_units && ctx.clock.now() < ctx.time_budget {
        if ctx.workers.idle_count() >= min_workers {
            engine_id += 1;
            ctx.unit_start_times
                .borrow_mut()
                .insert(engine_id, ctx.clock.now());
            debug!(engine_id, at = ctx.clock.now(), "admitting unit");
            units.spawn_local(run_unit(ctx.clone(), engine_id));
            ctx.clock.sleep(stagger).await;
        } else {
            ctx.clock.sleep(ADMISSION_BACKOFF_MINUTES).await;
        }
    }

    while units.join_next().await.is_some() {}
}

/// Sequential production: one unit at a time until the target is reached
/// or time runs out.
pub(crate) async fn run_sequential(ctx: Rc<SimContext>) {
    let max_units = ctx.cfg.target_output;
    let mut engine_id = 1u32;
    while engine_id <= max_units && ctx.clock.now() < ctx.time_budget {
        ctx.unit_start_times
            .borrow_mut()
            .insert(engine_id, ctx.clock.now());
        run_unit(ctx.clone(), engine_id).await;
        engine_id += 1;
    }
}
