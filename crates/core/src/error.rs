use thiserror::Error;

/// Failure kinds the simulator raises instead of producing a timeline.
///
/// Validation runs before any event is scheduled, so an `Err` always
/// means no events were emitted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("process graph is empty")]
    EmptyProcess,

    #[error("duplicate step id `{0}`")]
    DuplicateStepId(String),

    #[error("step `{step_id}` references unknown predecessor `{missing}`")]
    MissingPredecessor { step_id: String, missing: String },

    #[error("dependency cycle: {}", .path.join(" -> "))]
    DependencyCycle { path: Vec<String> },

    #[error("no start step: every step has at least one predecessor")]
    NoStartStep,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid task `{step_id}`: {reason}")]
    InvalidTask { step_id: String, reason: String },

    #[error("step `{step_id}` needs {required} workers but the pool only holds {available}")]
    NotEnoughWorkers {
        step_id: String,
        required: usize,
        available: usize,
    },

    #[error("simulation runtime could not be built: {0}")]
    Runtime(String),
}
