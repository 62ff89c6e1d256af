//! Discrete-event simulation kernel for manual assembly lines.
//!
//! The kernel schedules a directed-acyclic process graph across a
//! bounded worker pool and capacity-limited shared equipment, enforcing
//! two human-factor rest rules and stochastic rework, and emits a
//! timeline of every interval each resource spent in each state.
//!
//! Concurrency model: a single-threaded cooperative scheduler. The
//! whole run executes on a current-thread tokio runtime whose clock is
//! paused, so sleeps cost no wall time and resource waits resolve in
//! strict FIFO order. With a fixed seed a run is reproducible.
//!
//! The crate exposes two entry points: [`run`] for the full result
//! record and [`run_no_rest`] for the rest-rules-disabled comparison
//! summary. Both are synchronous and may be called repeatedly from one
//! process; runs share no state.

mod clock;
mod context;
mod dag;
mod driver;
mod engine;
mod equipment;
mod executor;
mod log;
mod workers;

pub use dag::DagIndex;
pub use driver::{run, run_no_rest};
pub use linesim_core::error::SimError;
