use std::cmp::Reverse;
use std::ops::Index;
use priority_queue::PriorityQueue;
use tracing::trace;

use crate::model::plan::PartialOrderPlan;
use super::Error;

/// Reachability between plan steps: `m[(i, j)]` holds when step `i` must
/// finish before step `j` starts, directly or through other steps.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderMatrix {
    size: usize,
    cells: Vec<bool>,
}

impl OrderMatrix {
    pub fn new(size: usize) -> Self {
        Self { size, cells: vec![false; size * size] }
    }

    /// Closure of the plan's ordering edges. Fails on an edge that names a
    /// step the plan does not have.
    pub fn from_plan(plan: &PartialOrderPlan) -> Result<Self, Error> {
        let mut matrix = Self::new(plan.len());
        for &(before, after) in plan.orderings() {
            if before >= matrix.size || after >= matrix.size {
                return Err(Error::InvalidOrdering { before, after, steps: matrix.size });
            }
            matrix.set(before, after);
        }
        matrix.close();
        Ok(matrix)
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn set(&mut self, before: usize, after: usize) {
        self.cells[before * self.size + after] = true;
    }

    #[inline]
    pub fn precedes(&self, before: usize, after: usize) -> bool {
        self.cells[before * self.size + after]
    }

    /// Warshall's algorithm. With the intermediate step in the outer loop a
    /// single pass reaches the fixed point.
    pub fn close(&mut self) {
        let n = self.size;
        for k in 0..n {
            for i in 0..n {
                if !self.cells[i * n + k] {
                    continue;
                }
                for j in 0..n {
                    if self.cells[k * n + j] {
                        self.cells[i * n + j] = true;
                    }
                }
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        let n = self.size;
        (0..n).all(|i| (0..n).all(|j| !self.precedes(i, j) || (0..n).all(|k| !self.precedes(j, k) || self.precedes(i, k))))
    }

    /// Unexecuted steps none of whose predecessors is still unexecuted.
    /// A step on a cycle precedes itself and so is never ready.
    pub fn ready(&self, executed: &[bool]) -> Vec<usize> {
        (0..self.size)
            .filter(|&j| !executed[j] && (0..self.size).all(|i| executed[i] || !self.precedes(i, j)))
            .collect()
    }
}

impl Index<(usize, usize)> for OrderMatrix {
    type Output = bool;

    fn index(&self, (before, after): (usize, usize)) -> &Self::Output {
        &self.cells[before * self.size + after]
    }
}

/// One total order of the steps consistent with `matrix`. Steps come out
/// batch by batch, lowest index first within a batch, which is the order a
/// sequential executor would replay them in. `None` when the ordering has a
/// cycle.
pub fn linearize(matrix: &OrderMatrix) -> Option<Vec<usize>> {
    let n = matrix.size();
    let mut pending: Vec<usize> = (0..n).map(|j| (0..n).filter(|&i| matrix[(i, j)]).count()).collect();
    let mut level = vec![0usize; n];
    let mut open = PriorityQueue::new();
    for (j, count) in pending.iter().enumerate() {
        if *count == 0 {
            open.push(j, Reverse((0usize, j)));
        }
    }
    let mut order = Vec::with_capacity(n);
    while let Some((i, Reverse((depth, _)))) = open.pop() {
        trace!("linearize: step {} at level {}", i, depth);
        order.push(i);
        for j in (0..n).filter(|&j| j != i && matrix[(i, j)]) {
            level[j] = level[j].max(depth + 1);
            pending[j] -= 1;
            if pending[j] == 0 {
                open.push(j, Reverse((level[j], j)));
            }
        }
    }
    if order.len() == n {
        Some(order)
    } else {
        None
    }
}
