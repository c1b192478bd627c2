// Test support: heap-leaked stacks and a recording interrupt mask.
// Host builds only.

use std::boxed::Box;
use std::vec;

use crate::mask::IntMask;
use crate::task::{TaskControl, TaskId, TaskTable};

pub(crate) fn stack(bytes: usize) -> &'static mut [u8] {
    Box::leak(vec![0u8; bytes].into_boxed_slice())
}

pub(crate) fn noop_entry(_ctx: usize) {}

/// Allocate a bare control block at the given priority, outside any
/// class. Class tests queue it themselves.
pub(crate) fn spawn(tasks: &mut TaskTable, name: &str, priority: u8) -> TaskId {
    let task = TaskControl::new(name, noop_entry, 0, stack(64));
    let id = tasks.allocate(task).expect("task table full");
    tasks.task_mut(id).priority = priority;
    id
}

/// IntMask that records transitions instead of touching hardware. The
/// asserts catch a lock that would double-mask or double-restore.
pub(crate) struct TestMask {
    pub(crate) masked: bool,
    pub(crate) disables: u32,
    pub(crate) restores: u32,
}

impl TestMask {
    pub(crate) fn new() -> Self {
        Self { masked: false, disables: 0, restores: 0 }
    }
}

impl IntMask for TestMask {
    fn disable(&mut self) {
        assert!(!self.masked, "disable while already masked");
        self.masked = true;
        self.disables += 1;
    }

    fn restore(&mut self) {
        assert!(self.masked, "restore while unmasked");
        self.masked = false;
        self.restores += 1;
    }
}
