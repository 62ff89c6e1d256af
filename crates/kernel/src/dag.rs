use std::collections::{BinaryHeap, HashMap, HashSet};

use linesim_core::error::SimError;
use linesim_core::process::ProcessGraph;

/// Dependency index over the process graph, built once per run.
///
/// Tasks are addressed by their position in the input order; that order
/// is also the dispatch order of ready sets, so runs are reproducible.
#[derive(Debug)]
pub struct DagIndex {
    ids: Vec<String>,
    preds: Vec<Vec<usize>>,
    succs: Vec<Vec<usize>>,
    durations: Vec<f64>,
}

impl DagIndex {
    /// Builds the index, rejecting empty graphs, duplicate step ids and
    /// references to unknown predecessors.
    pub fn build(process: &ProcessGraph) -> Result<Self, SimError> {
        if process.tasks.is_empty() {
            return Err(SimError::EmptyProcess);
        }

        let mut index: HashMap<&str, usize> = HashMap::with_capacity(process.tasks.len());
        for (idx, task) in process.tasks.iter().enumerate() {
            if index.insert(task.step_id.as_str(), idx).is_some() {
                return Err(SimError::DuplicateStepId(task.step_id.clone()));
            }
        }

        let mut preds = vec![Vec::new(); process.tasks.len()];
        let mut succs = vec![Vec::new(); process.tasks.len()];
        for (idx, task) in process.tasks.iter().enumerate() {
            for pred_id in &task.predecessors {
                let Some(&pred) = index.get(pred_id.as_str()) else {
                    return Err(SimError::MissingPredecessor {
                        step_id: task.step_id.clone(),
                        missing: pred_id.clone(),
                    });
                };
                preds[idx].push(pred);
                succs[pred].push(idx);
            }
        }

        Ok(Self {
            ids: process.tasks.iter().map(|t| t.step_id.clone()).collect(),
            preds,
            succs,
            durations: process.tasks.iter().map(|t| t.mean_duration).collect(),
        })
    }

    /// Full validity check: rejects cycles (self-loops included) with an
    /// example path, and graphs where no task can ever start.
    pub fn validate(&self) -> Result<(), SimError> {
        if let Some(path) = self.find_cycle() {
            return Err(SimError::DependencyCycle { path });
        }
        if self.start_nodes().is_empty() {
            return Err(SimError::NoStartStep);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn step_id(&self, idx: usize) -> &str {
        &self.ids[idx]
    }

    pub fn predecessors(&self, idx: usize) -> &[usize] {
        &self.preds[idx]
    }

    pub fn successors(&self, idx: usize) -> &[usize] {
        &self.succs[idx]
    }

    /// Tasks with no predecessors, in input order.
    pub fn start_nodes(&self) -> Vec<usize> {
        (0..self.len()).filter(|&i| self.preds[i].is_empty()).collect()
    }

    /// Tasks not yet completed whose predecessors are all completed, in
    /// input order.
    pub fn ready(&self, completed: &HashSet<usize>) -> Vec<usize> {
        (0..self.len())
            .filter(|idx| !completed.contains(idx))
            .filter(|&idx| self.preds[idx].iter().all(|p| completed.contains(p)))
            .collect()
    }

    /// Kahn's algorithm, smallest task index first among the available.
    pub fn topological_order(&self) -> Vec<usize> {
        let mut in_degree: Vec<usize> = self.preds.iter().map(Vec::len).collect();
        let mut heap: BinaryHeap<std::cmp::Reverse<usize>> = (0..self.len())
            .filter(|&i| in_degree[i] == 0)
            .map(std::cmp::Reverse)
            .collect();
        let mut order = Vec::with_capacity(self.len());
        while let Some(std::cmp::Reverse(idx)) = heap.pop() {
            order.push(idx);
            for &succ in &self.succs[idx] {
                in_degree[succ] -= 1;
                if in_degree[succ] == 0 {
                    heap.push(std::cmp::Reverse(succ));
                }
            }
        }
        order
    }

    /// Longest chain by nominal duration. Ties resolve toward the
    /// lexicographically smaller step id. Returns the path of step ids
    /// and its total nominal duration.
    pub fn critical_path(&self) -> (Vec<String>, f64) {
        let order = self.topological_order();
        if order.len() != self.len() {
            return (Vec::new(), 0.0);
        }

        let mut earliest = vec![0.0_f64; self.len()];
        for &idx in &order {
            earliest[idx] = self.preds[idx]
                .iter()
                .map(|&p| earliest[p] + self.durations[p])
                .fold(0.0, f64::max);
        }

        let mut end = None;
        let mut end_finish = f64::NEG_INFINITY;
        for idx in 0..self.len() {
            if !self.succs[idx].is_empty() {
                continue;
            }
            let finish = earliest[idx] + self.durations[idx];
            if finish > end_finish
                || (finish == end_finish
                    && end.is_some_and(|e: usize| self.ids[idx] < self.ids[e]))
            {
                end = Some(idx);
                end_finish = finish;
            }
        }
        let Some(end) = end else {
            return (Vec::new(), 0.0);
        };

        let mut path = vec![end];
        let mut current = end;
        while !self.preds[current].is_empty() {
            let mut best = self.preds[current][0];
            for &p in &self.preds[current][1..] {
                let candidate = earliest[p] + self.durations[p];
                let incumbent = earliest[best] + self.durations[best];
                if candidate > incumbent
                    || (candidate == incumbent && self.ids[p] < self.ids[best])
                {
                    best = p;
                }
            }
            path.push(best);
            current = best;
        }
        path.reverse();
        (
            path.into_iter().map(|i| self.ids[i].clone()).collect(),
            end_finish,
        )
    }

    /// Waves of tasks that could run concurrently given unlimited
    /// resources: iterated ready-set computation.
    pub fn parallel_groups(&self) -> Vec<Vec<String>> {
        let mut groups = Vec::new();
        let mut completed = HashSet::new();
        while completed.len() < self.len() {
            let wave = self.ready(&completed);
            if wave.is_empty() {
                break;
            }
            completed.extend(wave.iter().copied());
            groups.push(wave.into_iter().map(|i| self.ids[i].clone()).collect());
        }
        groups
    }

    /// Iterative DFS over successor edges; returns a closed example path
    /// when a cycle exists.
    fn find_cycle(&self) -> Option<Vec<String>> {
        const UNSEEN: u8 = 0;
        const ON_STACK: u8 = 1;
        const DONE: u8 = 2;

        let mut state = vec![UNSEEN; self.len()];
        for root in 0..self.len() {
            if state[root] != UNSEEN {
                continue;
            }
            let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
            state[root] = ON_STACK;
            while let Some(&mut (node, ref mut edge)) = stack.last_mut() {
                if *edge < self.succs[node].len() {
                    let next = self.succs[node][*edge];
                    *edge += 1;
                    match state[next] {
                        UNSEEN => {
                            state[next] = ON_STACK;
                            stack.push((next, 0));
                        }
                        ON_STACK => {
                            let from = stack
                                .iter()
                                .position(|&(n, _)| n == next)
                                .unwrap_or(0);
                            let mut path: Vec<String> = stack[from..]
                                .iter()
                                .map(|&(n, _)| self.ids[n].clone())
                                .collect();
                            path.push(self.ids[next].clone());
                            return Some(path);
                        }
                        _ => {}
                    }
                } else {
                    state[node] = DONE;
                    stack.pop();
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linesim_core::process::{OpType, TaskDef};

    fn step(id: &str, preds: &[&str], duration: f64) -> TaskDef {
        TaskDef {
            step_id: id.to_string(),
            task_name: id.to_string(),
            op_type: OpType::A,
            predecessors: preds.iter().map(|p| p.to_string()).collect(),
            mean_duration: duration,
            duration_stddev: 0.0,
            work_load_score: 5,
            rework_prob: 0.0,
            required_workers: 1,
            required_tools: vec![],
            station: "ST01".to_string(),
        }
    }

    fn graph(tasks: Vec<TaskDef>) -> ProcessGraph {
        ProcessGraph {
            name: String::new(),
            tasks,
        }
    }

    fn diamond() -> DagIndex {
        DagIndex::build(&graph(vec![
            step("A", &[], 10.0),
            step("B", &["A"], 10.0),
            step("C", &["A"], 5.0),
            step("D", &["B", "C"], 10.0),
        ]))
        .unwrap()
    }

    #[test]
    fn ready_sets_follow_completion() {
        let dag = diamond();
        assert_eq!(dag.start_nodes(), [0]);
        assert_eq!(dag.ready(&HashSet::new()), [0]);
        assert_eq!(dag.ready(&HashSet::from([0])), [1, 2]);
        assert_eq!(dag.ready(&HashSet::from([0, 1])), [2]);
        assert_eq!(dag.ready(&HashSet::from([0, 1, 2])), [3]);
    }

    #[test]
    fn topological_order_and_groups() {
        let dag = diamond();
        assert_eq!(dag.topological_order(), [0, 1, 2, 3]);
        assert_eq!(
            dag.parallel_groups(),
            [vec!["A".to_string()], vec!["B".to_string(), "C".to_string()], vec!["D".to_string()]]
        );
    }

    #[test]
    fn critical_path_prefers_longer_branch() {
        let dag = diamond();
        let (path, length) = dag.critical_path();
        assert_eq!(path, ["A", "B", "D"]);
        assert_eq!(length, 30.0);
    }

    #[test]
    fn critical_path_tie_breaks_by_id() {
        let dag = DagIndex::build(&graph(vec![
            step("A", &[], 10.0),
            step("C", &["A"], 5.0),
            step("B", &["A"], 5.0),
            step("D", &["B", "C"], 10.0),
        ]))
        .unwrap();
        let (path, _) = dag.critical_path();
        assert_eq!(path, ["A", "B", "D"]);
    }

    #[test]
    fn cycle_is_rejected_with_a_path() {
        let dag = DagIndex::build(&graph(vec![
            step("A", &["C"], 1.0),
            step("B", &["A"], 1.0),
            step("C", &["B"], 1.0),
        ]))
        .unwrap();
        match dag.validate() {
            Err(SimError::DependencyCycle { path }) => {
                assert!(path.len() >= 3);
                assert_eq!(path.first(), path.last());
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let dag = DagIndex::build(&graph(vec![step("A", &["A"], 1.0)])).unwrap();
        assert!(matches!(
            dag.validate(),
            Err(SimError::DependencyCycle { .. })
        ));
    }

    #[test]
    fn missing_predecessor_is_rejected_at_build() {
        let err = DagIndex::build(&graph(vec![step("A", &["ghost"], 1.0)])).unwrap_err();
        assert!(matches!(err, SimError::MissingPredecessor { .. }));
    }

    #[test]
    fn all_dependent_graph_has_no_start() {
        let dag = DagIndex::build(&graph(vec![
            step("A", &["B"], 1.0),
            step("B", &["A"], 1.0),
        ]))
        .unwrap();
        assert!(dag.validate().is_err());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err =
            DagIndex::build(&graph(vec![step("A", &[], 1.0), step("A", &[], 1.0)])).unwrap_err();
        assert!(matches!(err, SimError::DuplicateStepId(_)));
    }
}
