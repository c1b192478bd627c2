// Periodic class: deadline order, earliest first
//
// The ready list stays sorted by deadline on the wrapping tick clock;
// ties go to the smaller priority value, and full ties keep arrival
// order. Dispatch hands out the head whether or not its deadline has
// arrived. Holding to the period is the task's job: it reprograms its
// deadline each cycle and sleeps out the remainder, so an early pick
// costs nothing.

use crate::list::List;
use crate::task::{TaskId, TaskTable, tick_lt};

pub(crate) struct Periodic {
    ready: List<TaskId>,
}

impl Periodic {
    pub(crate) const fn new() -> Self {
        Self { ready: List::new() }
    }

    /// Queue `id` by its control block's deadline.
    pub(crate) fn add(&mut self, tasks: &mut TaskTable, id: TaskId) {
        self.ready.insert(tasks, id, |t, at, new| {
            let (at, new) = (t.task(at), t.task(new));
            tick_lt(new.deadline, at.deadline)
                || (new.deadline == at.deadline && new.priority < at.priority)
        });
    }

    pub(crate) fn remove(&mut self, tasks: &mut TaskTable, id: TaskId) -> bool {
        self.ready.remove(tasks, id)
    }

    /// Unlink and return the earliest-deadline task.
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
    use crate::task::Tick;
    use crate::testing;

    fn spawn_at(tasks: &mut TaskTable, name: &str, priority: u8, deadline: Tick) -> TaskId {
        let id = testing::spawn(tasks, name, priority);
        tasks.task_mut(id).deadline = deadline;
        id
    }

    #[test]
    fn test_take_next_by_deadline() {
        let mut tasks = TaskTable::new();
        let mut class = Periodic::new();
        let late = spawn_at(&mut tasks, "late", 0, 300);
        let soon = spawn_at(&mut tasks, "soon", 0, 10);
        let mid = spawn_at(&mut tasks, "mid", 0, 50);
        for id in [late, soon, mid] {
            class.add(&mut tasks, id);
        }
        assert_eq!(class.take_next(&mut tasks), Some(soon));
        assert_eq!(class.take_next(&mut tasks), Some(mid));
        assert_eq!(class.take_next(&mut tasks), Some(late));
    }

    #[test]
    fn test_equal_deadline_priority_breaks_tie() {
        let mut tasks = TaskTable::new();
        let mut class = Periodic::new();
        let b = spawn_at(&mut tasks, "b", 9, 100);
        let a = spawn_at(&mut tasks, "a", 2, 100);
        class.add(&mut tasks, b);
        class.add(&mut tasks, a);
        assert_eq!(class.take_next(&mut tasks), Some(a));
        assert_eq!(class.take_next(&mut tasks), Some(b));
    }

    #[test]
    fn test_deadline_order_across_wrap() {
        let mut tasks = TaskTable::new();
        let mut class = Periodic::new();
        // close to the counter wrap, 20 ticks out wraps past zero
        let before = spawn_at(&mut tasks, "before", 0, Tick::MAX - 5);
        let after = spawn_at(&mut tasks, "after", 0, (Tick::MAX - 5).wrapping_add(20));
        class.add(&mut tasks, after);
        class.add(&mut tasks, before);
        assert_eq!(class.take_next(&mut tasks), Some(before));
        assert_eq!(class.take_next(&mut tasks), Some(after));
    }

    #[test]
    fn test_take_next_ignores_the_clock() {
        let mut tasks = TaskTable::new();
        let mut class = Periodic::new();
        // deadline far in the future; the head is handed out anyway
        let id = spawn_at(&mut tasks, "t", 0, 1_000_000);
        class.add(&mut tasks, id);
        assert_eq!(class.take_next(&mut tasks), Some(id));
        assert_eq!(class.queued(&tasks), 0);
    }
}
