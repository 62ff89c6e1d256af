use linesim_core::process::ProcessGraph;
use linesim_core::result::{NoRestSummary, SimulationResult};
use linesim_kernel::DagIndex;

fn percent(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}

fn hours(minutes: f64) -> String {
    format!("{minutes:.1} min ({:.1} h)", minutes / 60.0)
}

pub fn print_summary(result: &SimulationResult) {
    let cfg = &result.config;
    println!(
        "simulated {} over {} days of {} h ({} workers, {} mode)",
        hours(result.sim_duration),
        cfg.work_days_per_month,
        cfg.work_hours_per_day,
        cfg.num_workers,
        if cfg.pipeline_mode { "pipeline" } else { "sequential" },
    );
    println!(
        "output: {} / {} units ({} of target), avg cycle time {}",
        result.engines_completed,
        cfg.target_output,
        percent(result.target_achievement_rate),
        hours(result.avg_cycle_time),
    );
    println!(
        "quality: {} inspections, {} reworks, first pass {}, {} lost to rework",
        result.quality.total_inspections,
        result.quality.total_reworks,
        percent(result.quality.first_pass_rate),
        hours(result.quality.rework_time_total),
    );
    println!(
        "human factors: {} rested over {} rest breaks, avg fatigue {:.1}, peak {:.1}, {} high-intensity exposures",
        hours(result.human_factors.total_rest_time),
        result.human_factors.rest_events_count,
        result.human_factors.avg_fatigue_level,
        result.human_factors.max_fatigue_level,
        result.human_factors.total_high_intensity_exposure,
    );

    println!("workers:");
    for worker in &result.worker_stats {
        println!(
            "  {}  util {}  work {:.1}  rest {:.1}  idle {:.1}  tasks {}  fatigue {:.1}",
            worker.worker_id,
            percent(worker.utilization),
            worker.work_time,
            worker.rest_time,
            worker.idle_time,
            worker.tasks_completed,
            worker.fatigue_level,
        );
    }

    if !result.equipment_stats.is_empty() {
        println!("equipment:");
        for equip in &result.equipment_stats {
            match equip.capacity {
                Some(capacity) => println!(
                    "  {} (cap {})  util {}  served {}{}",
                    equip.equipment_name,
                    capacity,
                    percent(equip.utilization),
                    equip.tasks_served,
                    if equip.is_bottleneck { "  BOTTLENECK" } else { "" },
                ),
                None => println!(
                    "  {} (unlimited)  peak concurrency {}  in use {:.1} min",
                    equip.equipment_name, equip.max_concurrent, equip.work_time,
                ),
            }
        }
    }
}

/// Static analysis of the graph itself, independent of the run.
pub fn print_graph_analysis(process: &ProcessGraph) {
    let Ok(dag) = DagIndex::build(process) else {
        return;
    };
    let (path, length) = dag.critical_path();
    if !path.is_empty() {
        println!("critical path: {} ({:.1} min nominal)", path.join(" -> "), length);
    }
    let groups = dag.parallel_groups();
    let widest = groups.iter().map(Vec::len).max().unwrap_or(0);
    println!(
        "{} steps in {} waves, widest wave {} steps",
        process.tasks.len(),
        groups.len(),
        widest,
    );
}

pub fn print_no_rest_delta(result: &SimulationResult, baseline: &NoRestSummary) {
    println!("without rest rules (comparison run):");
    println!(
        "  output {} units (vs {}), avg cycle time {:.1} min (vs {:.1})",
        baseline.engines_completed,
        result.engines_completed,
        baseline.avg_cycle_time,
        result.avg_cycle_time,
    );
    println!(
        "  avg worker utilization {} (first pass {})",
        percent(baseline.avg_worker_utilization),
        percent(baseline.first_pass_rate),
    );
}
