use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use rand::Rng;
use rand::rngs::StdRng;

use linesim_core::config::SimConfig;
use linesim_core::process::ProcessGraph;

use crate::clock::SimClock;
use crate::dag::DagIndex;
use crate::equipment::EquipmentManager;
use crate::log::EventLog;
use crate::workers::WorkerPool;

/// Shared state of one run.
///
/// Built by the driver and handed to every cooperative task through
/// reference counting. The single-threaded scheduler serialises all
/// access, so interior mutability needs no locks; executors never
/// outlive the driver's `LocalSet`.
pub(crate) struct SimContext {
    /// Effective configuration, after station promotion.
    pub(crate) cfg: SimConfig,
    /// Effective process, after station promotion.
    pub(crate) process: ProcessGraph,
    pub(crate) clock: SimClock,
    pub(crate) dag: DagIndex,
    pub(crate) workers: Rc<WorkerPool>,
    pub(crate) equipment: EquipmentManager,
    pub(crate) log: EventLog,
    pub(crate) rng: RefCell<StdRng>,
    /// The hard stop T in virtual minutes.
    pub(crate) time_budget: f64,
    pub(crate) engines_completed: Cell<u32>,
    pub(crate) unit_start_times: RefCell<BTreeMap<u32, f64>>,
    pub(crate) unit_end_times: RefCell<BTreeMap<u32, f64>>,
}

impl SimContext {
    /// One Bernoulli draw from the shared stream; `p` was validated into
    /// `0..=1` before the run started.
    pub(crate) fn draw_rework(&self, p: f64) -> bool {
        self.rng.borrow_mut().gen_bool(p)
    }
}
