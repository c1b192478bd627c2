// Usage statistics
//
// Stack watermarks from the fill pattern, per-task dispatch counts,
// and a one-call system dump over the log facade. The whole module
// rides the `stats` feature; a lean build drops it along with the
// stack painting that feeds the watermark.

use log::info;

use crate::config::MAX_TASKS;
use crate::mask::IntMask;
use crate::sched::Kernel;
use crate::task::{ClassId, TaskId, TaskState};

/// Point-in-time view of one task.
pub struct TaskReport<'a> {
    pub id: TaskId,
    pub name: &'a str,
    pub state: TaskState,
    pub class: Option<ClassId>,
    pub priority: u8,
    pub stack_size: usize,
    pub stack_free: usize,
    pub scheduled: u32,
}

impl<M: IntMask> Kernel<M> {
    /// Bytes of `id`'s stack never written since create.
    pub fn free_stack_bytes(&self, id: TaskId) -> usize {
        self.task(id).free_stack_bytes()
    }

    pub fn task_report(&self, id: TaskId) -> TaskReport<'_> {
        let task = self.task(id);
        TaskReport {
            id,
            name: task.name(),
            state: task.state(),
            class: task.class(),
            priority: task.priority(),
            stack_size: task.stack_size(),
            stack_free: task.free_stack_bytes(),
            scheduled: task.dispatch_count(),
        }
    }

    /// Reports for every allocated slot, in id order.
    pub fn reports(&self) -> impl Iterator<Item = TaskReport<'_>> {
        self.tasks().iter().map(|(id, _)| self.task_report(id))
    }

    /// Dump the system picture at info level.
    pub fn log_sys_info(&self) {
        info!(
            "sys: tick {}, {} of {} task slots used",
            self.now(),
            self.tasks().occupied(),
            MAX_TASKS
        );
        for report in self.reports() {
            info!(
                "  {} {:<8} {:?} p{} sched {} stack {}/{}B free",
                report.id,
                report.name,
                report.state,
                report.priority,
                report.scheduled,
                report.stack_free,
                report.stack_size
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sched::ClassSel;
    use crate::testing::{self, TestMask};

    fn kernel() -> Kernel<TestMask> {
        let mut k = Kernel::new(TestMask::new());
        k.init(testing::stack(128));
        k
    }

    #[test]
    fn test_report_snapshot() {
        let mut k = kernel();
        let a = k.task_create("worker", testing::noop_entry, 0, testing::stack(256)).unwrap();
        k.task_add(a, ClassSel::Aperiodic, 3);
        assert_eq!(k.next_task(), a);
        let report = k.task_report(a);
        assert_eq!(report.name, "worker");
        assert_eq!(report.state, TaskState::Running);
        assert_eq!(report.class, Some(ClassId::Aperiodic));
        assert_eq!(report.priority, 3);
        assert_eq!(report.stack_size, 256);
        assert_eq!(report.stack_free, 256);
        assert_eq!(report.scheduled, 1);
    }

    #[test]
    fn test_reports_cover_every_slot() {
        let mut k = kernel();
        k.task_create("a", testing::noop_entry, 0, testing::stack(64)).unwrap();
        k.task_create("b", testing::noop_entry, 0, testing::stack(64)).unwrap();
        assert_eq!(k.reports().count(), 3);
        k.log_sys_info();
    }
}
