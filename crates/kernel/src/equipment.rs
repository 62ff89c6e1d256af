use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::trace;

use linesim_core::result::EquipmentStats;

use crate::clock::SimClock;

/// Utilization above which a station is flagged as a bottleneck.
pub(crate) const BOTTLENECK_UTILIZATION: f64 = 0.8;

/// A usage interval; `None` end means the holder had not released when
/// the run stopped.
type UsageSpan = (f64, Option<f64>);

struct Station {
    capacity: usize,
    slots: Arc<Semaphore>,
    usage: RefCell<Vec<UsageSpan>>,
}

/// Tokens for the critical stations a task holds. Produced by
/// [`EquipmentManager::request`], consumed by [`EquipmentManager::release`].
pub(crate) struct EquipmentGrant {
    held: Vec<(String, OwnedSemaphorePermit)>,
}

impl EquipmentGrant {
    pub(crate) fn station_names(&self) -> Vec<String> {
        self.held.iter().map(|(name, _)| name.clone()).collect()
    }
}

/// Capacity-limited stations plus a pass-through tally for unlimited
/// tools.
///
/// Stations queue in strict arrival order. Unlimited tools are tracked
/// purely for reporting and never introduce a wait.
pub(crate) struct EquipmentManager {
    stations: BTreeMap<String, Station>,
    unlimited: RefCell<BTreeMap<String, Vec<UsageSpan>>>,
}

impl EquipmentManager {
    pub(crate) fn new(critical: &BTreeMap<String, usize>) -> Self {
        Self {
            stations: critical
                .iter()
                .map(|(name, &capacity)| {
                    (
                        name.clone(),
                        Station {
                            capacity,
                            slots: Arc::new(Semaphore::new(capacity)),
                            usage: RefCell::new(Vec::new()),
                        },
                    )
                })
                .collect(),
            unlimited: RefCell::new(BTreeMap::new()),
        }
    }

    pub(crate) fn is_critical(&self, tool: &str) -> bool {
        self.stations.contains_key(tool)
    }

    /// Waits until every critical tool in `tools` is held, as one
    /// conjunction: each request enqueues at its station immediately, so
    /// partially granted capacity stays held while the rest arrives.
    /// Unlimited tools open a tally span and never wait.
    pub(crate) async fn request(&self, tools: &[String], clock: &SimClock) -> EquipmentGrant {
        let mut names = Vec::new();
        let mut waits = Vec::new();
        for tool in tools {
            if let Some(station) = self.stations.get(tool) {
                names.push(tool.clone());
                waits.push(station.slots.clone().acquire_many_owned(1));
            } else {
                self.unlimited
                    .borrow_mut()
                    .entry(tool.clone())
                    .or_default()
                    .push((clock.now(), None));
            }
        }

        let permits = join_all(waits).await;
        let held: Vec<(String, OwnedSemaphorePermit)> = names
            .into_iter()
            .zip(permits)
            .map(|(name, permit)| {
                (
                    name,
                    permit.expect("equipment semaphore is never closed"),
                )
            })
            .collect();

        // usage opens once the whole conjunction is held
        let now = clock.now();
        for (name, _) in &held {
            if let Some(station) = self.stations.get(name) {
                station.usage.borrow_mut().push((now, None));
            }
        }
        if !held.is_empty() {
            trace!(at = now, stations = ?held.iter().map(|(n, _)| n).collect::<Vec<_>>(), "equipment granted");
        }
        EquipmentGrant { held }
    }

    /// Returns capacity for every critical tool (waking the next waiter
    /// in FIFO order) and closes the tally spans of unlimited tools.
    pub(crate) fn release(&self, tools: &[String], grant: EquipmentGrant, clock: &SimClock) {
        let now = clock.now();
        for (name, permit) in grant.held {
            if let Some(station) = self.stations.get(&name) {
                close_last_open(&mut station.usage.borrow_mut(), now);
            }
            drop(permit);
        }
        let mut unlimited = self.unlimited.borrow_mut();
        for tool in tools {
            if !self.is_critical(tool) {
                if let Some(spans) = unlimited.get_mut(tool) {
                    close_last_open(spans, now);
                }
            }
        }
    }

    /// Final per-resource accounting. Spans still open when the run
    /// stopped are clipped at `sim_duration`.
    pub(crate) fn stats(&self, sim_duration: f64) -> Vec<EquipmentStats> {
        let mut out = Vec::new();
        for (name, station) in &self.stations {
            let usage = station.usage.borrow();
            let work_time = spans_total(&usage, sim_duration);
            let total = sim_duration * station.capacity as f64;
            let utilization = if total > 0.0 { work_time / total } else { 0.0 };
            out.push(EquipmentStats {
                equipment_name: name.clone(),
                capacity: Some(station.capacity),
                total_time: total,
                work_time,
                idle_time: (total - work_time).max(0.0),
                utilization,
                tasks_served: usage.iter().filter(|(_, end)| end.is_some()).count() as u32,
                max_concurrent: peak_concurrency(&usage, sim_duration),
                is_bottleneck: utilization > BOTTLENECK_UTILIZATION,
            });
        }
        for (name, spans) in self.unlimited.borrow().iter() {
            out.push(EquipmentStats {
                equipment_name: name.clone(),
                capacity: None,
                total_time: sim_duration,
                work_time: spans_total(spans, sim_duration),
                idle_time: 0.0,
                utilization: 0.0,
                tasks_served: spans.iter().filter(|(_, end)| end.is_some()).count() as u32,
                max_concurrent: peak_concurrency(spans, sim_duration),
                is_bottleneck: false,
            });
        }
        out
    }
}

fn close_last_open(spans: &mut [UsageSpan], end: f64) {
    if let Some(span) = spans.iter_mut().rev().find(|(_, e)| e.is_none()) {
        span.1 = Some(end);
    }
}

fn spans_total(spans: &[UsageSpan], horizon: f64) -> f64 {
    spans
        .iter()
        .map(|&(start, end)| (end.unwrap_or(horizon) - start).max(0.0))
        .sum()
}

fn peak_concurrency(spans: &[UsageSpan], horizon: f64) -> u32 {
    let mut edges: Vec<(f64, i32)> = Vec::with_capacity(spans.len() * 2);
    for &(start, end) in spans {
        edges.push((start, 1));
        edges.push((end.unwrap_or(horizon), -1));
    }
    // releases before acquisitions at the same instant
    edges.sort_by(|a, b| {
        a.0.partial_cmp(&b.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.1.cmp(&b.1))
    });
    let mut current = 0i32;
    let mut peak = 0i32;
    for (_, delta) in edges {
        current += delta;
        peak = peak.max(current);
    }
    peak.max(0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(spec: &[(&str, usize)]) -> EquipmentManager {
        let critical: BTreeMap<String, usize> = spec
            .iter()
            .map(|&(name, cap)| (name.to_string(), cap))
            .collect();
        EquipmentManager::new(&critical)
    }

    fn run<F: std::future::Future>(fut: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap()
            .block_on(fut)
    }

    #[test]
    fn unlimited_tools_never_wait_and_are_tallied() {
        run(async {
            let clock = SimClock::start();
            let mgr = manager(&[("rig", 1)]);
            let tools = vec!["glue_gun".to_string()];

            let first = mgr.request(&tools, &clock).await;
            let second = mgr.request(&tools, &clock).await;
            assert!(first.station_names().is_empty());
            assert_eq!(clock.now(), 0.0);

            clock.sleep(5.0).await;
            mgr.release(&tools, first, &clock);
            mgr.release(&tools, second, &clock);

            let stats = mgr.stats(10.0);
            let tally = stats
                .iter()
                .find(|s| s.equipment_name == "glue_gun")
                .unwrap();
            assert_eq!(tally.capacity, None);
            assert_eq!(tally.max_concurrent, 2);
            assert!((tally.work_time - 10.0).abs() < 1e-9);
            assert_eq!(tally.utilization, 0.0);
        });
    }

    #[test]
    fn station_capacity_bounds_concurrent_holders() {
        run(async {
            let clock = SimClock::start();
            let mgr = manager(&[("rig", 1)]);
            let tools = vec!["rig".to_string()];

            let held = mgr.request(&tools, &clock).await;
            assert_eq!(held.station_names(), ["rig"]);

            // a second request must park until the holder releases
            let blocked = tokio::time::timeout(
                std::time::Duration::from_millis(1),
                mgr.request(&tools, &clock),
            )
            .await;
            assert!(blocked.is_err(), "capacity 1 must block the second acquirer");

            clock.sleep(3.0).await;
            mgr.release(&tools, held, &clock);
            let second = mgr.request(&tools, &clock).await;
            mgr.release(&tools, second, &clock);

            let stats = mgr.stats(10.0);
            assert_eq!(stats[0].tasks_served, 2);
            assert!(stats[0].work_time <= 10.0 + 1e-9);
            assert_eq!(stats[0].max_concurrent, 1);
        });
    }

    #[test]
    fn utilization_flags_bottlenecks() {
        run(async {
            let clock = SimClock::start();
            let mgr = manager(&[("rig", 1)]);
            let tools = vec!["rig".to_string()];
            let grant = mgr.request(&tools, &clock).await;
            clock.sleep(9.0).await;
            mgr.release(&tools, grant, &clock);

            let stats = mgr.stats(10.0);
            assert!((stats[0].utilization - 0.9).abs() < 1e-9);
            assert!(stats[0].is_bottleneck);
        });
    }
}
