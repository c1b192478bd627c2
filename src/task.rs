// Task control blocks and the fixed task table
//
// The table is the arena behind every scheduler list: task ids are
// plain indexes into it, and each control block embeds the single link
// the list engine threads through.

use core::fmt;

use crate::config::{MAX_TASKS, TASK_NAME_LEN};
use crate::list::Links;

/// System time in timer-interrupt periods. The counter wraps; compare
/// ticks with [`tick_le`] or [`tick_lt`], never with plain `<`.
pub type Tick = u32;

/// True when `a` is at or before `b` on the wrapping clock. Holds for
/// distances under half the tick range, which bounds how far ahead a
/// deadline or wake time may be scheduled.
pub fn tick_le(a: Tick, b: Tick) -> bool {
    b.wrapping_sub(a) < Tick::MAX / 2
}

pub fn tick_lt(a: Tick, b: Tick) -> bool {
    a != b && tick_le(a, b)
}

/// Index handle for a registered task.
///
/// A handle goes stale once its task is removed; the slot is then free
/// for reuse and the same id will name the new occupant. Using a stale
/// id is a usage error and trips the table's vacant-slot panic at the
/// next lookup.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TaskId(u8);

impl TaskId {
    pub(crate) const fn new(index: usize) -> Self {
        TaskId(index as u8)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Task execution state.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TaskState {
    /// Created but not yet handed to a scheduling class.
    Initial,
    /// Queued in its class, eligible for dispatch.
    Ready,
    Running,
    /// Parked off every queue until resumed.
    Suspended,
    /// In the sleep queue until its wake tick.
    Sleeping,
    /// Entry function returned; never dispatched again.
    Finished,
}

/// The class a task is registered with. Sleeping is a transient state
/// every task passes through, not a registration target.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ClassId {
    Periodic,
    Aperiodic,
}

/// Saved execution context. The scheduler stores and hands it across
/// switches; only the architecture layer ever interprets it.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct SavedContext(pub usize);

/// Entry function, called with the context argument given at create.
pub type TaskEntry = fn(usize);

/// One task control block.
pub struct TaskControl {
    name: [u8; TASK_NAME_LEN],
    entry: TaskEntry,
    ctx: usize,
    stack: &'static mut [u8],
    pub(crate) saved: SavedContext,
    pub(crate) state: TaskState,
    pub(crate) class: Option<ClassId>,
    pub(crate) priority: u8,
    pub(crate) deadline: Tick,
    pub(crate) wake_at: Tick,
    pub(crate) next: Option<TaskId>,
    pub(crate) preempt: bool,
    #[cfg(feature = "stats")]
    pub(crate) scheduled: u32,
}

impl TaskControl {
    pub(crate) fn new(name: &str, entry: TaskEntry, ctx: usize, stack: &'static mut [u8]) -> Self {
        let mut fixed = [0u8; TASK_NAME_LEN];
        let len = name.len().min(TASK_NAME_LEN);
        fixed[..len].copy_from_slice(&name.as_bytes()[..len]);
        #[cfg(feature = "stats")]
        stack.fill(crate::config::STACK_FILL);
        Self {
            name: fixed,
            entry,
            ctx,
            stack,
            saved: SavedContext::default(),
            state: TaskState::Initial,
            class: None,
            priority: 0,
            deadline: 0,
            wake_at: 0,
            next: None,
            preempt: true,
            #[cfg(feature = "stats")]
            scheduled: 0,
        }
    }

    /// Name with the fixed buffer's trailing NULs stripped.
    pub fn name(&self) -> &str {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(TASK_NAME_LEN);
        core::str::from_utf8(&self.name[..end]).unwrap_or("?")
    }

    pub fn entry(&self) -> TaskEntry {
        self.entry
    }

    pub fn ctx(&self) -> usize {
        self.ctx
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn class(&self) -> Option<ClassId> {
        self.class
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn deadline(&self) -> Tick {
        self.deadline
    }

    pub fn stack_size(&self) -> usize {
        self.stack.len()
    }

    /// Times this task won a dispatch.
    #[cfg(feature = "stats")]
    pub fn dispatch_count(&self) -> u32 {
        self.scheduled
    }

    /// Bytes never written since create. Stacks grow down, so the
    /// untouched fill pattern piles up from the low end; a used byte
    /// that happens to match the pattern overcounts, which is the
    /// usual price of the technique.
    #[cfg(feature = "stats")]
    pub fn free_stack_bytes(&self) -> usize {
        self.stack.iter().take_while(|&&b| b == crate::config::STACK_FILL).count()
    }
}

/// Fixed arena of control blocks.
pub struct TaskTable {
    slots: [Option<TaskControl>; MAX_TASKS],
}

impl TaskTable {
    pub(crate) const fn new() -> Self {
        const VACANT: Option<TaskControl> = None;
        Self { slots: [VACANT; MAX_TASKS] }
    }

    /// Place `task` in the lowest vacant slot.
    pub(crate) fn allocate(&mut self, task: TaskControl) -> Option<TaskId> {
        let free = self.slots.iter().position(|slot| slot.is_none())?;
        self.slots[free] = Some(task);
        Some(TaskId::new(free))
    }

    pub(crate) fn release(&mut self, id: TaskId) {
        self.slots[id.index()] = None;
    }

    /// Panics on a vacant slot: the id is stale or was never issued.
    pub(crate) fn task(&self, id: TaskId) -> &TaskControl {
        match &self.slots[id.index()] {
            Some(task) => task,
            None => panic!("no task in slot {id}"),
        }
    }

    pub(crate) fn task_mut(&mut self, id: TaskId) -> &mut TaskControl {
        match &mut self.slots[id.index()] {
            Some(task) => task,
            None => panic!("no task in slot {id}"),
        }
    }

    /// Non-panicking probe.
    pub fn get(&self, id: TaskId) -> Option<&TaskControl> {
        self.slots.get(id.index())?.as_ref()
    }

    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TaskId, &TaskControl)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|task| (TaskId::new(index), task)))
    }
}

impl Links for TaskTable {
    type Id = TaskId;

    fn next(&self, id: TaskId) -> Option<TaskId> {
        self.task(id).next
    }

    fn set_next(&mut self, id: TaskId, next: Option<TaskId>) {
        self.task_mut(id).next = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn test_tick_compare_plain() {
        assert!(tick_le(5, 5));
        assert!(tick_le(5, 6));
        assert!(!tick_le(6, 5));
        assert!(tick_lt(5, 6));
        assert!(!tick_lt(5, 5));
    }

    #[test]
    fn test_tick_compare_across_wrap() {
        let near_wrap: Tick = Tick::MAX - 2;
        let wrapped = near_wrap.wrapping_add(10);
        assert!(tick_lt(near_wrap, wrapped));
        assert!(!tick_le(wrapped, near_wrap));
    }

    #[test]
    fn test_name_truncates() {
        let task = TaskControl::new("measurement", testing::noop_entry, 0, testing::stack(64));
        assert_eq!(task.name(), "measurem");
        let short = TaskControl::new("idle", testing::noop_entry, 0, testing::stack(64));
        assert_eq!(short.name(), "idle");
    }

    #[test]
    fn test_new_task_defaults() {
        let task = TaskControl::new("t", testing::noop_entry, 7, testing::stack(64));
        assert_eq!(task.state(), TaskState::Initial);
        assert_eq!(task.class(), None);
        assert_eq!(task.ctx(), 7);
        assert!(task.preempt);
        assert_eq!(task.next, None);
    }

    #[cfg(feature = "stats")]
    #[test]
    fn test_new_stack_is_painted() {
        let task = TaskControl::new("t", testing::noop_entry, 0, testing::stack(64));
        assert!(task.stack.iter().all(|&b| b == crate::config::STACK_FILL));
    }

    #[cfg(feature = "stats")]
    #[test]
    fn test_watermark_counts_from_low_end() {
        let mut task = TaskControl::new("t", testing::noop_entry, 0, testing::stack(64));
        assert_eq!(task.free_stack_bytes(), 64);
        // consume the top half the way a descending stack would
        for byte in task.stack[32..].iter_mut() {
            *byte = 0x11;
        }
        assert_eq!(task.free_stack_bytes(), 32);
        // an excursion that reached the lowest byte reads as exhausted
        task.stack[0] = 0x22;
        assert_eq!(task.free_stack_bytes(), 0);
    }

    #[test]
    fn test_allocate_reuses_released_slot() {
        let mut table = TaskTable::new();
        let a = table
            .allocate(TaskControl::new("a", testing::noop_entry, 0, testing::stack(64)))
            .unwrap();
        let b = table
            .allocate(TaskControl::new("b", testing::noop_entry, 0, testing::stack(64)))
            .unwrap();
        assert_ne!(a, b);
        table.release(a);
        let c = table
            .allocate(TaskControl::new("c", testing::noop_entry, 0, testing::stack(64)))
            .unwrap();
        assert_eq!(a, c);
        assert_eq!(table.task(c).name(), "c");
        assert_eq!(table.occupied(), 2);
    }

    #[test]
    fn test_allocate_full_table() {
        let mut table = TaskTable::new();
        for i in 0..crate::config::MAX_TASKS {
            let task = TaskControl::new("x", testing::noop_entry, i, testing::stack(32));
            assert!(table.allocate(task).is_some());
        }
        let task = TaskControl::new("y", testing::noop_entry, 0, testing::stack(32));
        assert!(table.allocate(task).is_none());
    }

    #[test]
    #[should_panic(expected = "no task in slot")]
    fn test_stale_id_panics() {
        let mut table = TaskTable::new();
        let id = table
            .allocate(TaskControl::new("a", testing::noop_entry, 0, testing::stack(32)))
            .unwrap();
        table.release(id);
        let _ = table.task(id);
    }
}
