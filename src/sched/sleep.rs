// Sleep queue: tasks waiting out a tick delay
//
// Sleeping is a state, not a home: every sleeper still belongs to the
// class it registered with and returns there on wake. The queue stays
// sorted by wake tick with the priority value breaking ties, so due
// tasks always sit at the head and the tick handler pops until the
// head is in the future.

use crate::list::List;
use crate::task::{TaskId, TaskTable, Tick, tick_le, tick_lt};

pub(crate) struct SleepQueue {
    queue: List<TaskId>,
}

impl SleepQueue {
    pub(crate) const fn new() -> Self {
        Self { queue: List::new() }
    }

    /// Queue `id` to wake at `wake_at`.
    pub(crate) fn add(&mut self, tasks: &mut TaskTable, id: TaskId, wake_at: Tick) {
        tasks.task_mut(id).wake_at = wake_at;
        self.queue.insert(tasks, id, |t, at, new| {
            let (at, new) = (t.task(at), t.task(new));
            tick_lt(new.wake_at, at.wake_at)
                || (new.wake_at == at.wake_at && new.priority < at.priority)
        });
    }

    /// Early wake: unlink `id` before its time.
    pub(crate) fn remove(&mut self, tasks: &mut TaskTable, id: TaskId) -> bool {
        self.queue.remove(tasks, id)
    }

    /// Pop the head if its wake tick has arrived. One task per call;
    /// the tick handler loops until this returns None.
    pub(crate) fn take_due(&mut self, tasks: &mut TaskTable, now: Tick) -> Option<TaskId> {
        let head = self.queue.first()?;
        if !tick_le(tasks.task(head).wake_at, now) {
            return None;
        }
        self.queue.pop(tasks)
    }

    #[cfg(test)]
    pub(crate) fn next_wake(&self, tasks: &TaskTable) -> Option<Tick> {
        self.queue.first().map(|id| tasks.task(id).wake_at)
    }

    #[cfg(test)]
    pub(crate) fn queued(&self, tasks: &TaskTable) -> usize {
        self.queue.len(tasks)
    }
}
