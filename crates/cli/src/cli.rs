use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "linesim", version, about = "Assembly-line discrete-event simulator")]
pub struct Cli {
    /// Process graph CSV (step_id, task_name, op_type, predecessors, ...).
    #[arg(long, env = "LINESIM_PROCESS", value_name = "CSV")]
    pub process: Option<PathBuf>,

    /// Run configuration JSON; built-in defaults apply when omitted.
    #[arg(long, env = "LINESIM_CONFIG", value_name = "JSON")]
    pub config: Option<PathBuf>,

    /// Override the configured random seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Produce one unit at a time instead of overlapping them.
    #[arg(long, default_value_t = false)]
    pub sequential: bool,

    /// Promote every station to a capacity-1 shared resource.
    #[arg(long, default_value_t = false)]
    pub station_constraints: bool,

    /// Also run the no-rest comparison and report the delta.
    #[arg(long, default_value_t = false)]
    pub compare_no_rest: bool,

    /// Write the full result record as JSON.
    #[arg(long, value_name = "PATH")]
    pub result_out: Option<PathBuf>,

    /// Write the event timeline as CSV.
    #[arg(long, value_name = "PATH")]
    pub events_out: Option<PathBuf>,

    /// Write a template process CSV to PATH and exit.
    #[arg(long, value_name = "PATH")]
    pub write_template: Option<PathBuf>,
}
