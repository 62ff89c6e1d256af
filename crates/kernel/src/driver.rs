use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::task::LocalSet;
use tracing::{debug, info};

use linesim_core::config::SimConfig;
use linesim_core::error::SimError;
use linesim_core::event::EventKind;
use linesim_core::process::ProcessGraph;
use linesim_core::result::{HumanFactorsStats, NoRestSummary, SimulationResult};
use linesim_core::timegrid::TimeMapping;

use crate::clock::SimClock;
use crate::context::SimContext;
use crate::dag::DagIndex;
use crate::engine::{run_pipeline, run_sequential};
use crate::equipment::EquipmentManager;
use crate::log::EventLog;
use crate::workers::WorkerPool;

/// Runs one simulation to completion or to the time budget.
///
/// Validation happens before anything is scheduled: an `Err` means no
/// event was ever emitted. A run that merely fails to finish any unit
/// within the budget is still `Ok`, with truthful zero counters and a
/// partial event log.
pub fn run(config: &SimConfig, process: &ProcessGraph) -> Result<SimulationResult, SimError> {
    let created_at = Utc::now().to_rfc3339();

    config.validate_against(process)?;
    process.validate_fields()?;
    DagIndex::build(process)?.validate()?;

    let (cfg, process) = apply_station_constraints(config, process);
    let dag = DagIndex::build(&process)?;
    let time_budget = cfg.sim_time_minutes();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .map_err(|err| SimError::Runtime(err.to_string()))?;

    let result = runtime.block_on(async move {
        let clock = SimClock::start();
        let rng = match cfg.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let ctx = Rc::new(SimContext {
            workers: WorkerPool::new(cfg.num_workers),
            equipment: EquipmentManager::new(&cfg.critical_equipment),
            log: EventLog::new(),
            rng: RefCell::new(rng),
            time_budget,
            engines_completed: Cell::new(0),
            unit_start_times: RefCell::new(BTreeMap::new()),
            unit_end_times: RefCell::new(BTreeMap::new()),
            clock,
            dag,
            cfg,
            process,
        });

        debug!(
            tasks = ctx.dag.len(),
            workers = ctx.cfg.num_workers,
            budget_minutes = time_budget,
            pipeline = ctx.cfg.pipeline_mode,
            "starting run"
        );

        let local = LocalSet::new();
        {
            let ctx = ctx.clone();
            local
                .run_until(async move {
                    let controller = async {
                        if ctx.cfg.pipeline_mode {
                            run_pipeline(ctx.clone()).await;
                        } else {
                            run_sequential(ctx.clone()).await;
                        }
                    };
                    tokio::select! {
                        _ = controller => {}
                        _ = ctx.clock.sleep_until(ctx.time_budget) => {
                            debug!("time budget exhausted, abandoning pending work");
                        }
                    }
                })
                .await;
        }
        // dropping the LocalSet abandons every pending suspension; no
        // event is synthesised for abandoned work
        drop(local);

        assemble_result(&ctx, created_at)
    });

    info!(
        engines_completed = result.engines_completed,
        events = result.events.len(),
        sim_duration = result.sim_duration,
        "run finished"
    );
    Ok(result)
}

/// The comparison run of the same schedule with both rest rules
/// disabled, reduced to the headline numbers.
pub fn run_no_rest(config: &SimConfig, process: &ProcessGraph) -> Result<NoRestSummary, SimError> {
    let result = run(&config.no_rest_variant(), process)?;
    let utilizations: Vec<f64> = result.worker_stats.iter().map(|w| w.utilization).collect();
    Ok(NoRestSummary {
        engines_completed: result.engines_completed,
        avg_cycle_time: result.avg_cycle_time,
        sim_duration: result.sim_duration,
        avg_worker_utilization: mean(&utilizations),
        first_pass_rate: result.quality.first_pass_rate,
    })
}

/// Station-constraint promotion: every station named in the graph
/// becomes a capacity-1 critical resource (unless the configuration
/// already caps it) and is added to the tool list of each of its tasks.
fn apply_station_constraints(
    config: &SimConfig,
    process: &ProcessGraph,
) -> (SimConfig, ProcessGraph) {
    let mut cfg = config.clone();
    let mut process = process.clone();
    if !cfg.station_constraint_mode {
        return (cfg, process);
    }

    for station in process.stations() {
        cfg.critical_equipment.entry(station).or_insert(1);
    }
    for task in &mut process.tasks {
        if !task.station.is_empty() && !task.required_tools.contains(&task.station) {
            task.required_tools.push(task.station.clone());
        }
    }
    (cfg, process)
}

fn assemble_result(ctx: &SimContext, created_at: String) -> SimulationResult {
    let sim_duration = ctx.clock.now();

    let starts = ctx.unit_start_times.borrow();
    let ends = ctx.unit_end_times.borrow();
    let cycle_times: Vec<f64> = ends
        .iter()
        .filter_map(|(id, end)| starts.get(id).map(|start| end - start))
        .collect();

    let worker_stats = ctx.workers.stats(sim_duration);
    let total_rest_time: f64 = worker_stats.iter().map(|w| w.rest_time).sum();
    let fatigue_levels: Vec<f64> = worker_stats.iter().map(|w| w.fatigue_level).collect();
    let human_factors = HumanFactorsStats {
        total_rest_time,
        avg_fatigue_level: mean(&fatigue_levels),
        max_fatigue_level: fatigue_levels.iter().copied().fold(0.0, f64::max),
        total_high_intensity_exposure: worker_stats
            .iter()
            .map(|w| w.high_intensity_count)
            .sum(),
        rest_events_count: ctx.log.count_kind(EventKind::Rest) as u32,
    };

    let engines_completed = ctx.engines_completed.get();
    SimulationResult {
        sim_duration,
        engines_completed,
        target_achievement_rate: f64::from(engines_completed) / f64::from(ctx.cfg.target_output),
        avg_cycle_time: mean(&cycle_times),
        equipment_stats: ctx.equipment.stats(sim_duration),
        quality: ctx.log.quality(),
        human_factors,
        worker_stats,
        events: ctx.log.snapshot(),
        time_mapping: TimeMapping::from_schedule(
            ctx.cfg.work_hours_per_day,
            ctx.cfg.work_days_per_month,
        ),
        config: ctx.cfg.clone(),
        created_at,
        completed_at: Utc::now().to_rfc3339(),
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
