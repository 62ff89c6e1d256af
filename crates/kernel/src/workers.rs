use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::trace;

use linesim_core::result::{FatigueSample, WorkerStats};

use crate::clock::SimClock;

/// Fatigue gained per worked minute at the maximum load score.
const FATIGUE_PER_MINUTE_AT_FULL_LOAD: f64 = 0.5;
/// Fatigue recovered per rested minute.
const FATIGUE_RECOVERY_PER_MINUTE: f64 = 2.0;
/// Load score at which a task counts as high-intensity exposure.
const HIGH_INTENSITY_LOAD: u8 = 7;
const MAX_FATIGUE: f64 = 100.0;

/// Which rule put the crew to rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RestReason {
    /// Rule A: consecutive work time reached the threshold.
    Time,
    /// Rule B: the finished task's load score exceeded the threshold.
    Load,
}

impl RestReason {
    fn as_str(self) -> &'static str {
        match self {
            RestReason::Time => "time",
            RestReason::Load => "load",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerState {
    Idle,
    Working,
    Resting,
}

#[derive(Debug)]
struct Worker {
    id: String,
    state: WorkerState,
    /// Minutes worked since the last rest ended.
    consecutive_work_time: f64,
    total_work_time: f64,
    total_rest_time: f64,
    tasks_completed: u32,
    fatigue_level: f64,
    high_intensity_count: u32,
    fatigue_history: Vec<FatigueSample>,
}

impl Worker {
    fn new(idx: usize) -> Self {
        Self {
            id: format!("Worker_{:02}", idx + 1),
            state: WorkerState::Idle,
            consecutive_work_time: 0.0,
            total_work_time: 0.0,
            total_rest_time: 0.0,
            tasks_completed: 0,
            fatigue_level: 0.0,
            high_intensity_count: 0,
            fatigue_history: Vec::new(),
        }
    }

    fn add_work(&mut self, duration: f64, load_score: u8, started_at: f64) {
        self.consecutive_work_time += duration;
        self.total_work_time += duration;

        let load_factor = f64::from(load_score) / 10.0;
        self.fatigue_level =
            (self.fatigue_level + duration * load_factor * FATIGUE_PER_MINUTE_AT_FULL_LOAD)
                .min(MAX_FATIGUE);
        if load_score >= HIGH_INTENSITY_LOAD {
            self.high_intensity_count += 1;
        }
        self.fatigue_history.push(FatigueSample {
            time: started_at + duration,
            level: self.fatigue_level,
        });
    }

    fn apply_rest(&mut self, duration: f64, rest_started_at: f64) {
        self.total_rest_time += duration;
        self.consecutive_work_time = 0.0;
        let recovery = (duration * FATIGUE_RECOVERY_PER_MINUTE).min(self.fatigue_level);
        self.fatigue_level -= recovery;
        self.fatigue_history.push(FatigueSample {
            time: rest_started_at + duration,
            level: self.fatigue_level,
        });
    }
}

/// The workers a task currently holds.
///
/// Returning the crew to the pool goes through [`WorkerPool::release`],
/// which consumes it; the semaphore permits travel with the crew so a
/// held worker is never counted as idle.
pub(crate) struct WorkerCrew {
    members: Vec<usize>,
    ids: Vec<String>,
    _permits: OwnedSemaphorePermit,
}

impl WorkerCrew {
    pub(crate) fn ids(&self) -> &[String] {
        &self.ids
    }
}

/// Bounded pool of workers with FIFO blocking and least-loaded selection.
pub(crate) struct WorkerPool {
    slots: Arc<Semaphore>,
    workers: RefCell<Vec<Worker>>,
}

impl WorkerPool {
    pub(crate) fn new(count: usize) -> Rc<Self> {
        Rc::new(Self {
            slots: Arc::new(Semaphore::new(count)),
            workers: RefCell::new((0..count).map(Worker::new).collect()),
        })
    }

    /// Workers currently in the idle set.
    pub(crate) fn idle_count(&self) -> usize {
        self.slots.available_permits()
    }

    /// Blocks until `count` workers are idle, then claims the ones with
    /// the least accumulated work time (ties resolve by id). Blocked
    /// callers are served in arrival order.
    pub(crate) async fn acquire(&self, count: usize) -> WorkerCrew {
        let permits = self
            .slots
            .clone()
            .acquire_many_owned(count as u32)
            .await
            .expect("worker pool semaphore is never closed");

        let mut workers = self.workers.borrow_mut();
        let mut idle: Vec<usize> = (0..workers.len())
            .filter(|&i| workers[i].state == WorkerState::Idle)
            .collect();
        idle.sort_by(|&a, &b| {
            workers[a]
                .total_work_time
                .partial_cmp(&workers[b].total_work_time)
                .unwrap_or(Ordering::Equal)
                .then(a.cmp(&b))
        });
        let members: Vec<usize> = idle.into_iter().take(count).collect();
        debug_assert_eq!(members.len(), count, "permits guarantee enough idle workers");

        let mut ids = Vec::with_capacity(count);
        for &i in &members {
            workers[i].state = WorkerState::Working;
            ids.push(workers[i].id.clone());
        }
        WorkerCrew {
            members,
            ids,
            _permits: permits,
        }
    }

    /// Returns every crew member to the idle set.
    pub(crate) fn release(&self, crew: WorkerCrew) {
        let mut workers = self.workers.borrow_mut();
        for &i in &crew.members {
            workers[i].state = WorkerState::Idle;
        }
        // dropping the crew releases the permits and wakes the next
        // blocked acquirer
    }

    /// Rule A trigger: any crew member at or past the threshold.
    pub(crate) fn needs_time_rest(&self, crew: &WorkerCrew, threshold: f64) -> bool {
        let workers = self.workers.borrow();
        crew.members
            .iter()
            .any(|&i| workers[i].consecutive_work_time >= threshold)
    }

    /// Rests the crew in place. The workers stay held by the task (they
    /// never re-enter the idle set) and come back in the working state.
    pub(crate) async fn enter_rest(
        &self,
        crew: &WorkerCrew,
        clock: &SimClock,
        duration: f64,
        reason: RestReason,
    ) {
        {
            let mut workers = self.workers.borrow_mut();
            for &i in &crew.members {
                workers[i].state = WorkerState::Resting;
            }
        }
        let rest_started_at = clock.now();
        clock.sleep(duration).await;
        let mut workers = self.workers.borrow_mut();
        for &i in &crew.members {
            workers[i].apply_rest(duration, rest_started_at);
            workers[i].state = WorkerState::Working;
        }
        trace!(
            reason = reason.as_str(),
            duration,
            crew = ?crew.ids,
            "crew rested"
        );
    }

    /// Accrues work time, fatigue and the high-intensity counter on the
    /// whole crew.
    pub(crate) fn add_work_time(
        &self,
        crew: &WorkerCrew,
        duration: f64,
        load_score: u8,
        started_at: f64,
    ) {
        let mut workers = self.workers.borrow_mut();
        for &i in &crew.members {
            workers[i].add_work(duration, load_score, started_at);
        }
    }

    pub(crate) fn increment_tasks_completed(&self, crew: &WorkerCrew) {
        let mut workers = self.workers.borrow_mut();
        for &i in &crew.members {
            workers[i].tasks_completed += 1;
        }
    }

    /// Final per-worker accounting. Idle time is the remainder of the
    /// run, so work + rest + idle always equals `sim_duration`.
    pub(crate) fn stats(&self, sim_duration: f64) -> Vec<WorkerStats> {
        self.workers
            .borrow()
            .iter()
            .map(|w| {
                let idle = (sim_duration - w.total_work_time - w.total_rest_time).max(0.0);
                WorkerStats {
                    worker_id: w.id.clone(),
                    total_time: sim_duration,
                    work_time: w.total_work_time,
                    rest_time: w.total_rest_time,
                    idle_time: idle,
                    utilization: if sim_duration > 0.0 {
                        (w.total_work_time / sim_duration).min(1.0)
                    } else {
                        0.0
                    },
                    tasks_completed: w.tasks_completed,
                    fatigue_level: w.fatigue_level,
                    high_intensity_count: w.high_intensity_count,
                    fatigue_history: w.fatigue_history.clone(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatigue_accrues_with_load_and_duration() {
        let mut worker = Worker::new(0);
        worker.add_work(10.0, 8, 0.0);
        assert!((worker.fatigue_level - 4.0).abs() < 1e-9);
        assert_eq!(worker.high_intensity_count, 1);
        assert_eq!(worker.consecutive_work_time, 10.0);
        assert_eq!(worker.fatigue_history.len(), 1);

        worker.add_work(10.0, 2, 10.0);
        assert!((worker.fatigue_level - 5.0).abs() < 1e-9);
        assert_eq!(worker.high_intensity_count, 1);
    }

    #[test]
    fn rest_recovers_capped_fatigue_and_resets_the_streak() {
        let mut worker = Worker::new(0);
        worker.add_work(20.0, 10, 0.0);
        assert!((worker.fatigue_level - 10.0).abs() < 1e-9);

        worker.apply_rest(3.0, 20.0);
        assert!((worker.fatigue_level - 4.0).abs() < 1e-9);
        assert_eq!(worker.consecutive_work_time, 0.0);
        assert_eq!(worker.total_rest_time, 3.0);

        worker.apply_rest(60.0, 23.0);
        assert_eq!(worker.fatigue_level, 0.0);
    }

    #[test]
    fn fatigue_saturates_at_the_ceiling() {
        let mut worker = Worker::new(0);
        worker.add_work(500.0, 10, 0.0);
        assert_eq!(worker.fatigue_level, MAX_FATIGUE);
    }

    #[test]
    fn acquire_prefers_least_loaded_and_tie_breaks_by_id() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();
        rt.block_on(async {
            let clock = SimClock::start();
            let pool = WorkerPool::new(3);

            let crew = pool.acquire(1).await;
            assert_eq!(crew.ids(), ["Worker_01"]);
            pool.add_work_time(&crew, 10.0, 5, clock.now());
            pool.release(crew);

            let crew = pool.acquire(2).await;
            assert_eq!(crew.ids(), ["Worker_02", "Worker_03"]);
            pool.release(crew);
            assert_eq!(pool.idle_count(), 3);
        });
    }

    #[test]
    fn resting_workers_stay_out_of_the_idle_set() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();
        rt.block_on(async {
            let clock = SimClock::start();
            let pool = WorkerPool::new(2);
            let crew = pool.acquire(2).await;
            assert_eq!(pool.idle_count(), 0);
            pool.enter_rest(&crew, &clock, 5.0, RestReason::Time).await;
            assert_eq!(pool.idle_count(), 0);
            assert!((clock.now() - 5.0).abs() < 1e-9);
            pool.release(crew);
            assert_eq!(pool.idle_count(), 2);

            let stats = pool.stats(10.0);
            assert!((stats[0].rest_time - 5.0).abs() < 1e-9);
            assert!((stats[0].idle_time - 5.0).abs() < 1e-9);
        });
    }
}
