//! Indexed binary min-heap of worker loads.
//!
//! The [`Pool`] keeps one [`Slot`] per worker in an arena and orders worker ids
//! in a heap by `(pending, id)`. Every slot records its current heap position,
//! so a worker whose load changed can be re-sifted from where it sits instead
//! of being searched for.
//!
//! The pool is not synchronized. It is owned by the arbitration loop and never
//! shared with worker tasks or generators.

use crate::error::{Error, Result};
use core::fmt;

/// Identity of a worker: its index in the pool's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkerId(usize);

impl WorkerId {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Ordering metadata for a single worker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Slot {
    /// Items assigned to the worker that have not completed yet.
    pending: usize,
    /// Index in `heap`, or `None` while the worker is popped.
    position: Option<usize>,
}

/// Min-ordered collection of workers keyed by pending load.
///
/// Ties on `pending` are broken by [`WorkerId`], so the extraction order is a
/// pure function of the loads.
#[derive(Clone, Debug, Default)]
pub struct Pool {
    slots: Vec<Slot>,
    heap: Vec<WorkerId>,
}

impl Pool {
    /// Creates a pool of `workers` idle workers.
    pub fn new(workers: usize) -> Self {
        Self::from_pending(&vec![0; workers])
    }

    /// Creates a pool whose workers start with the given loads, then heapifies.
    pub fn from_pending(pending: &[usize]) -> Self {
        let mut pool = Self {
            slots: pending
                .iter()
                .enumerate()
                .map(|(i, &pending)| Slot {
                    pending,
                    position: Some(i),
                })
                .collect(),
            heap: (0..pending.len()).map(WorkerId::new).collect(),
        };

        for i in (0..pool.heap.len() / 2).rev() {
            pool.sift_down(i);
        }

        pool
    }

    /// Number of workers currently in the heap.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Number of workers known to the pool, popped or not.
    pub fn workers(&self) -> usize {
        self.slots.len()
    }

    /// Adds a new worker with the given load and returns its id.
    pub fn push(&mut self, pending: usize) -> WorkerId {
        let id = WorkerId::new(self.slots.len());
        self.slots.push(Slot {
            pending,
            position: None,
        });
        self.insert(id);
        id
    }

    /// Removes and returns the least-loaded worker.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolExhausted`] if no worker is in the heap.
    pub fn pop_min(&mut self) -> Result<WorkerId> {
        let last = self.heap.len().checked_sub(1).ok_or(Error::PoolExhausted)?;
        self.swap(0, last);

        let id = self.heap.pop().ok_or(Error::PoolExhausted)?;
        self.slots[id.index()].position = None;

        if !self.heap.is_empty() {
            self.sift_down(0);
        }

        Ok(id)
    }

    /// Returns a popped worker to the heap at the place its load dictates.
    ///
    /// Reinserting a worker that is already in the heap only restores its
    /// order.
    pub fn reinsert(&mut self, id: WorkerId) -> Result<()> {
        match self.slot(id)?.position {
            Some(_) => self.fix(id),
            None => {
                self.insert(id);
                Ok(())
            }
        }
    }

    /// Restores heap order around a worker whose load changed in place.
    pub fn fix(&mut self, id: WorkerId) -> Result<()> {
        let Some(i) = self.slot(id)?.position else {
            return Err(Error::InvariantViolation {
                reason: format!("worker {id} is not in the heap"),
            });
        };

        if !self.sift_down(i) {
            self.sift_up(i);
        }

        Ok(())
    }

    /// Records one more pending item on a worker. Heap order is not touched.
    pub fn increment(&mut self, id: WorkerId) -> Result<usize> {
        let slot = self.slot_mut(id)?;
        slot.pending += 1;
        Ok(slot.pending)
    }

    /// Records one fewer pending item on a worker. Heap order is not touched.
    pub fn decrement(&mut self, id: WorkerId) -> Result<usize> {
        let slot = self.slot_mut(id)?;
        slot.pending = slot
            .pending
            .checked_sub(1)
            .ok_or(Error::LoadUnderflow(id))?;
        Ok(slot.pending)
    }

    pub fn pending(&self, id: WorkerId) -> Result<usize> {
        Ok(self.slot(id)?.pending)
    }

    /// Current heap index of a worker, `None` while it is popped.
    pub fn position(&self, id: WorkerId) -> Result<Option<usize>> {
        Ok(self.slot(id)?.position)
    }

    /// Sum of pending items across every worker.
    pub fn total_pending(&self) -> usize {
        self.slots.iter().map(|s| s.pending).sum()
    }

    /// Pending load per worker, indexed by [`WorkerId`].
    pub fn loads(&self) -> Vec<usize> {
        self.slots.iter().map(|s| s.pending).collect()
    }

    /// Verifies the heap property and that every slot's position matches the
    /// heap array.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvariantViolation`] describing the first mismatch.
    pub fn check(&self) -> Result<()> {
        for (i, id) in self.heap.iter().enumerate() {
            let slot = self.slot(*id)?;
            if slot.position != Some(i) {
                return Err(Error::InvariantViolation {
                    reason: format!(
                        "worker {id} sits at {i} but records {:?}",
                        slot.position
                    ),
                });
            }

            if i > 0 {
                let parent = (i - 1) / 2;
                if self.less(i, parent) {
                    return Err(Error::InvariantViolation {
                        reason: format!(
                            "worker {id} (pending {}) is above its parent {} (pending {})",
                            slot.pending,
                            self.heap[parent],
                            self.slots[self.heap[parent].index()].pending
                        ),
                    });
                }
            }
        }

        let in_heap = self.slots.iter().filter(|s| s.position.is_some()).count();
        if in_heap != self.heap.len() {
            return Err(Error::InvariantViolation {
                reason: format!(
                    "{in_heap} slots claim a position but the heap holds {}",
                    self.heap.len()
                ),
            });
        }

        Ok(())
    }

    fn slot(&self, id: WorkerId) -> Result<&Slot> {
        self.slots.get(id.index()).ok_or(Error::UnknownWorker(id))
    }

    fn slot_mut(&mut self, id: WorkerId) -> Result<&mut Slot> {
        self.slots.get_mut(id.index()).ok_or(Error::UnknownWorker(id))
    }

    fn insert(&mut self, id: WorkerId) {
        let i = self.heap.len();
        self.heap.push(id);
        self.slots[id.index()].position = Some(i);
        self.sift_up(i);
    }

    fn key(&self, i: usize) -> (usize, WorkerId) {
        let id = self.heap[i];
        (self.slots[id.index()].pending, id)
    }

    fn less(&self, i: usize, j: usize) -> bool {
        self.key(i) < self.key(j)
    }

    fn swap(&mut self, i: usize, j: usize) {
        self.heap.swap(i, j);
        self.slots[self.heap[i].index()].position = Some(i);
        self.slots[self.heap[j].index()].position = Some(j);
    }

    fn sift_up(&mut self, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if !self.less(i, parent) {
                break;
            }
            self.swap(i, parent);
            i = parent;
        }
    }

    /// Returns whether the element moved.
    fn sift_down(&mut self, start: usize) -> bool {
        let n = self.heap.len();
        let mut i = start;
        loop {
            let left = 2 * i + 1;
            if left >= n {
                break;
            }
            let mut child = left;
            let right = left + 1;
            if right < n && self.less(right, left) {
                child = right;
            }
            if !self.less(child, i) {
                break;
            }
            self.swap(i, child);
            i = child;
        }
        i > start
    }
}
