// Aperiodic class: event-driven tasks, strict priority order
//
// The ready list stays sorted ascending by priority value (0 runs
// first). Equal priorities keep arrival order, so repeated
// requeue-and-dispatch round-robins through them.

use crate::list::List;
use crate::task::{TaskId, TaskTable};

pub(crate) struct Aperiodic {
    ready: List<TaskId>,
}

impl Aperiodic {
    pub(crate) const fn new() -> Self {
        Self { ready: List::new() }
    }

    /// Queue `id` at its priority position, behind equal priorities.
    pub(crate) fn add(&mut self, tasks: &mut TaskTable, id: TaskId) {
        self.ready.insert(tasks, id, |t, at, new| {
            t.task(new).priority < t.task(at).priority
        });
    }

    pub(crate) fn remove(&mut self, tasks: &mut TaskTable, id: TaskId) -> bool {
        self.ready.remove(tasks, id)
    }

    /// Unlink and return the best ready task.
    pub(crate) fn take_next(&mut self, tasks: &mut TaskTable) -> Option<TaskId> {
        self.ready.pop(tasks)
    }

    #[cfg(test)]
    pub(crate) fn queued(&self, tasks: &TaskTable) -> usize {
        self.ready.len(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn test_take_next_by_priority() {
        let mut tasks = TaskTable::new();
        let mut class = Aperiodic::new();
        let low = testing::spawn(&mut tasks, "low", 20);
        let high = testing::spawn(&mut tasks, "high", 1);
        let mid = testing::spawn(&mut tasks, "mid", 10);
        class.add(&mut tasks, low);
        class.add(&mut tasks, high);
        class.add(&mut tasks, mid);
        assert_eq!(class.take_next(&mut tasks), Some(high));
        assert_eq!(class.take_next(&mut tasks), Some(mid));
        assert_eq!(class.take_next(&mut tasks), Some(low));
        assert_eq!(class.take_next(&mut tasks), None);
    }

    #[test]
    fn test_equal_priority_round_robin() {
        let mut tasks = TaskTable::new();
        let mut class = Aperiodic::new();
        let a = testing::spawn(&mut tasks, "a", 5);
        let b = testing::spawn(&mut tasks, "b", 5);
        let c = testing::spawn(&mut tasks, "c", 5);
        for id in [a, b, c] {
            class.add(&mut tasks, id);
        }
        // requeueing the winner behind its peers cycles a, b, c
        for expect in [a, b, c, a, b, c] {
            let got = class.take_next(&mut tasks).unwrap();
            assert_eq!(got, expect);
            class.add(&mut tasks, got);
        }
    }

    #[test]
    fn test_remove_unlinks() {
        let mut tasks = TaskTable::new();
        let mut class = Aperiodic::new();
        let a = testing::spawn(&mut tasks, "a", 1);
        let b = testing::spawn(&mut tasks, "b", 2);
        class.add(&mut tasks, a);
        class.add(&mut tasks, b);
        assert!(class.remove(&mut tasks, a));
        assert!(!class.remove(&mut tasks, a));
        assert_eq!(class.queued(&tasks), 1);
        assert_eq!(class.take_next(&mut tasks), Some(b));
    }
}
