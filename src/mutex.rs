//! Reader/writer mutex scheduler.
//!
//! Realizes `SPEC_FULL.md` §4.1: a single FIFO queue per instance holding
//! **R** (shared, counted) and **W** (exclusive, queued) slots. Joining is
//! tail-based (same-kind arrivals extend the tail slot; different-kind
//! arrivals append a new one), writers within one W-slot run strictly one
//! at a time in arrival order, and a slot is released — waking the new
//! head — once every member enrolled in it has finished.
//!
//! Grounded on the teacher's `commit_lock: Mutex<()>` paired with a
//! `Condvar`-style wake-the-next-waiter design in `SingleFileDB` (a short,
//! synchronous critical section guarding shared state, with a separate
//! notification step to hand off to the next waiter) — re-expressed with
//! `tokio::sync::Notify` because every operation this scheduler guards
//! suspends at `.await` points (blob I/O, catalog queries), not just at
//! OS-thread blocking calls.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

/// One entry in the scheduler's queue.
struct Slot {
    id: u64,
    notify: Arc<Notify>,
    body: SlotBody,
}

enum SlotBody {
    Read { joined: usize, finished: usize },
    Write { queued: usize, finished: usize, running: bool },
}

impl Slot {
    fn is_fully_done(&self) -> bool {
        match &self.body {
            SlotBody::Read { joined, finished } => finished == joined,
            SlotBody::Write { queued, finished, .. } => finished == queued,
        }
    }
}

struct State {
    queue: VecDeque<Slot>,
}

/// Per-bucket FIFO scheduler. Cloning the `Arc<RwScheduler>` a `Manager`
/// holds is the intended way to share it with streams that must serialize
/// against the same instance.
pub struct RwScheduler {
    state: Mutex<State>,
    next_id: AtomicU64,
}

impl Default for RwScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl RwScheduler {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                queue: VecDeque::new(),
            }),
            next_id: AtomicU64::new(0),
        }
    }

    /// Acquire a reader slot. Resolves once the slot this call joined (or
    /// created) becomes the queue head; concurrent readers within one
    /// slot all resolve without waiting on each other.
    pub async fn acquire_read(&self) -> ReadGuard<'_> {
        let id = {
            let mut st = self.state.lock();
            let id = match st.queue.back_mut() {
                Some(slot) if matches!(slot.body, SlotBody::Read { .. }) => {
                    if let SlotBody::Read { joined, .. } = &mut slot.body {
                        *joined += 1;
                    }
                    slot.id
                }
                _ => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    st.queue.push_back(Slot {
                        id,
                        notify: Arc::new(Notify::new()),
                        body: SlotBody::Read {
                            joined: 1,
                            finished: 0,
                        },
                    });
                    id
                }
            };
            self.try_advance(&mut st);
            id
        };
        self.wait_ready(id, |_slot| true).await;
        ReadGuard {
            scheduler: self,
            id,
        }
    }

    /// Acquire a writer slot. Resolves once it is this specific call's
    /// turn: its slot is the queue head, and every writer queued ahead of
    /// it within the same slot has finished.
    pub async fn acquire_write(&self) -> WriteGuard<'_> {
        let (id, ticket) = {
            let mut st = self.state.lock();
            let result = match st.queue.back_mut() {
                Some(slot) if matches!(slot.body, SlotBody::Write { .. }) => {
                    if let SlotBody::Write { queued, .. } = &mut slot.body {
                        let ticket = *queued;
                        *queued += 1;
                        (slot.id, ticket)
                    } else {
                        unreachable!()
                    }
                }
                _ => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    st.queue.push_back(Slot {
                        id,
                        notify: Arc::new(Notify::new()),
                        body: SlotBody::Write {
                            queued: 1,
                            finished: 0,
                            running: false,
                        },
                    });
                    (id, 0)
                }
            };
            self.try_advance(&mut st);
            result
        };
        self.wait_ready(id, move |slot| match &slot.body {
            SlotBody::Write {
                finished, running, ..
            } => *finished == ticket && !*running,
            SlotBody::Read { .. } => false,
        })
        .await;
        {
            let mut st = self.state.lock();
            if let Some(slot) = st.queue.iter_mut().find(|s| s.id == id) {
                if let SlotBody::Write { running, .. } = &mut slot.body {
                    *running = true;
                }
            }
        }
        WriteGuard {
            scheduler: self,
            id,
        }
    }

    /// Wait until `id`'s slot is the queue head and `ready` holds for it.
    ///
    /// The `Notified` future is constructed while still holding `state`'s
    /// lock, in the same critical section as the condition check: any
    /// `notify_waiters()` call is itself made only while holding that same
    /// lock (see `try_advance`/`finish_write`), so a waiter can never miss
    /// a wakeup between checking the condition and subscribing to it.
    async fn wait_ready(&self, id: u64, ready: impl Fn(&Slot) -> bool) {
        loop {
            let notified = {
                let st = self.state.lock();
                let is_front = st.queue.front().map(|s| s.id) == Some(id);
                if is_front {
                    let slot = st.queue.front().unwrap();
                    if ready(slot) {
                        return;
                    }
                }
                let slot = st
                    .queue
                    .iter()
                    .find(|s| s.id == id)
                    .expect("waiter's own slot must still be enqueued");
                slot.notify.notified()
            };
            notified.await;
        }
    }

    /// Pop fully-drained slots from the front as long as there is a next
    /// slot waiting behind them, waking each new head in turn. A
    /// fully-drained slot that is also the tail is left in place — it may
    /// still gain new same-kind joiners.
    fn try_advance(&self, st: &mut State) {
        loop {
            let should_pop = match st.queue.front() {
                Some(front) => st.queue.len() > 1 && front.is_fully_done(),
                None => false,
            };
            if !should_pop {
                break;
            }
            st.queue.pop_front();
            if let Some(new_front) = st.queue.front() {
                new_front.notify.notify_waiters();
            }
        }
    }

    fn finish_read(&self, id: u64) {
        let mut st = self.state.lock();
        if let Some(slot) = st.queue.iter_mut().find(|s| s.id == id) {
            if let SlotBody::Read { finished, .. } = &mut slot.body {
                *finished += 1;
            }
        }
        self.try_advance(&mut st);
    }

    fn finish_write(&self, id: u64) {
        let mut st = self.state.lock();
        if let Some(slot) = st.queue.iter_mut().find(|s| s.id == id) {
            if let SlotBody::Write {
                finished, running, ..
            } = &mut slot.body
            {
                *finished += 1;
                *running = false;
            }
        }
        self.try_advance(&mut st);
        // If our slot is still enqueued (more writers queued behind us in
        // the same slot), wake the next one in arrival order. If it was
        // popped instead, `try_advance` already woke the new head.
        if let Some(slot) = st.queue.front() {
            if slot.id == id {
                slot.notify.notify_waiters();
            }
        }
    }

    #[cfg(test)]
    fn queue_len(&self) -> usize {
        self.state.lock().queue.len()
    }
}

/// Held while a read operation runs; releases its slot membership on drop.
pub struct ReadGuard<'a> {
    scheduler: &'a RwScheduler,
    id: u64,
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        self.scheduler.finish_read(self.id);
    }
}

/// Held while a write operation runs; releases its slot membership on drop.
pub struct WriteGuard<'a> {
    scheduler: &'a RwScheduler,
    id: u64,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        self.scheduler.finish_write(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[tokio::test]
    async fn single_writer_runs_and_releases() {
        let scheduler = RwScheduler::new();
        {
            let _g = scheduler.acquire_write().await;
            assert_eq!(scheduler.queue_len(), 1);
        }
        assert_eq!(scheduler.queue_len(), 1, "finished tail slot stays until a new arrival pops it");
    }

    #[tokio::test]
    async fn writers_serialize_in_arrival_order() {
        let scheduler = Arc::new(RwScheduler::new());
        let order = Arc::new(StdMutex::new(Vec::new()));
        let mut handles = Vec::new();
        for i in 0..5u32 {
            let scheduler = scheduler.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                let _g = scheduler.acquire_write().await;
                order.lock().unwrap().push(i);
            }));
            // Let the just-spawned task run its synchronous join step
            // (which happens before its first await) so the next
            // iteration's acquire_write call observes it already queued.
            tokio::task::yield_now().await;
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn readers_in_one_slot_run_concurrently() {
        let scheduler = Arc::new(RwScheduler::new());
        let concurrent = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let max_concurrent = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let scheduler = scheduler.clone();
            let concurrent = concurrent.clone();
            let max_concurrent = max_concurrent.clone();
            handles.push(tokio::spawn(async move {
                let _g = scheduler.acquire_read().await;
                let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                max_concurrent.fetch_max(now, Ordering::SeqCst);
                tokio::task::yield_now().await;
                concurrent.fetch_sub(1, Ordering::SeqCst);
            }));
            tokio::task::yield_now().await;
        }
        for h in handles {
            h.await.unwrap();
        }
        assert!(max_concurrent.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test]
    async fn reader_after_writer_observes_its_effect() {
        let scheduler = RwScheduler::new();
        let value = StdMutex::new(0);
        {
            let _g = scheduler.acquire_write().await;
            *value.lock().unwrap() = 42;
        }
        {
            let _g = scheduler.acquire_read().await;
            assert_eq!(*value.lock().unwrap(), 42);
        }
    }
}
