//! # Scheduler
//!
//! Owns the run queue and the current-task pointer, and implements the
//! selection and switch policy.
//!
//! ## Policy
//!
//! The run queue is partitioned by priority: across classes the most
//! urgent non-empty class always wins (lower numeric priority value is
//! more urgent), and within a class tasks run in the order they became
//! `Ready` — strict priority scheduling with round-robin tie-breaking.
//!
//! Strict priority can starve lower classes indefinitely under sustained
//! high-priority load. That is an accepted, documented property of this
//! kernel: callers needing fairness across workloads must split them
//! into equal-priority tasks.
//!
//! ## Decision vs. switch
//!
//! [`Scheduler::run`] is the single decision point, reached from
//! voluntary yields, task teardown, and — once preemption is wired up —
//! the timer trap. The scheduling *decision* ([`Scheduler::reschedule`])
//! is kept separate from the raw context switch so the selection
//! algorithm is testable on the host, where the switch primitive does
//! not exist.
//!
//! ## Concurrency
//!
//! Single core, cooperative. The queue and current-task pointer are
//! mutated only on the switch path, which is also the only way CPU
//! ownership changes, so no lock is needed. A preemptive extension must
//! mask interrupts for the duration of the switch.

use core::ptr::NonNull;

use log::trace;

use crate::arch::riscv64::{self, TaskContext};
use crate::config::MAX_TASKS;
use crate::task::{Task, TaskId, TaskState};

// ---------------------------------------------------------------------------
// Run queue
// ---------------------------------------------------------------------------

/// Fixed-capacity queue of `Ready` tasks in insertion order.
///
/// Selection scans for the most urgent priority class and takes its
/// first-inserted member, so FIFO order within a class falls out of the
/// storage order. O(n) over at most `MAX_TASKS` entries.
struct RunQueue {
    slots: [Option<NonNull<Task>>; MAX_TASKS],
    len: usize,
}

impl RunQueue {
    const fn new() -> Self {
        Self {
            slots: [None; MAX_TASKS],
            len: 0,
        }
    }

    fn clear(&mut self) {
        self.slots = [None; MAX_TASKS];
        self.len = 0;
    }

    fn len(&self) -> usize {
        self.len
    }

    /// Append at the tail. The queue has no error channel; exceeding
    /// `MAX_TASKS` live tasks is a configuration error and halts.
    fn push(&mut self, task: NonNull<Task>) {
        assert!(self.len < MAX_TASKS, "run queue overflow");
        self.slots[self.len] = Some(task);
        self.len += 1;
    }

    /// Dequeue the head of the most urgent non-empty priority class.
    fn take_most_urgent(&mut self) -> Option<NonNull<Task>> {
        let mut best: Option<(usize, u8)> = None;
        for index in 0..self.len {
            if let Some(task) = self.slots[index] {
                // Safety: queued tasks live in registered 'static stacks.
                let priority = unsafe { task.as_ref().priority };
                match best {
                    Some((_, urgency)) if priority >= urgency => {}
                    _ => best = Some((index, priority)),
                }
            }
        }
        best.and_then(|(index, _)| self.remove_at(index))
    }

    /// Remove a specific task by identity. Absence is not an error: the
    /// running task is transiently outside the queue, and tearing it
    /// down must still work.
    fn remove(&mut self, id: TaskId) {
        for index in 0..self.len {
            if let Some(task) = self.slots[index] {
                // Safety: as in `take_most_urgent`.
                if unsafe { task.as_ref().id } == id {
                    self.remove_at(index);
                    return;
                }
            }
        }
    }

    fn remove_at(&mut self, index: usize) -> Option<NonNull<Task>> {
        let task = self.slots[index].take();
        for slot in index..self.len - 1 {
            self.slots[slot] = self.slots[slot + 1];
        }
        self.slots[self.len - 1] = None;
        self.len -= 1;
        task
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Run-queue state plus the task presently owning the CPU.
///
/// The boot context is where the CPU state of the caller of the first
/// `run()` is parked; it is resumed again only when the run queue
/// drains, which is how `kernel::start` regains control to idle.
pub struct Scheduler {
    queue: RunQueue,
    current: Option<NonNull<Task>>,
    boot_context: TaskContext,
}

impl Scheduler {
    pub const fn new() -> Self {
        Self {
            queue: RunQueue::new(),
            current: None,
            boot_context: TaskContext::zeroed(),
        }
    }

    /// Reset run-queue state. Idempotent; meant to run once before the
    /// scheduler first runs.
    pub fn init(&mut self) {
        self.queue.clear();
        self.current = None;
    }

    /// Insert a `Ready` task at the tail of its priority class.
    pub fn add_task(&mut self, task: NonNull<Task>) {
        // Safety: the caller hands in a task placed in a live stack.
        let task_ref = unsafe { task.as_ref() };
        debug_assert!(task_ref.state == TaskState::Ready);
        trace!(
            "enqueue task {} (priority {})",
            task_ref.id.thread_id,
            task_ref.priority
        );
        self.queue.push(task);
    }

    /// Remove a task from the run queue by identity; no-op if absent.
    pub fn remove_task(&mut self, id: TaskId) {
        self.queue.remove(id);
    }

    /// The task presently marked `Running`, or `None` before the first
    /// selection and after the run queue drains.
    pub fn current(&self) -> Option<NonNull<Task>> {
        self.current
    }

    pub fn current_id(&self) -> Option<TaskId> {
        // Safety: `current` is only ever a task in a live stack.
        self.current.map(|task| unsafe { task.as_ref().id })
    }

    /// Number of tasks waiting in the run queue.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// The central decision point: pick the next task and transfer
    /// control to it. Returns (into the caller's saved context) when a
    /// later decision selects the caller again — or, for the boot
    /// context, when the run queue drains.
    pub fn run(&mut self) {
        if let Some((prev, next)) = self.reschedule() {
            // Sole place raw register state crosses task boundaries.
            unsafe { riscv64::task_switch(prev, next) };
        }
    }

    /// Scheduling decision without the switch.
    ///
    /// Re-enqueues a still-running current task at the tail of its
    /// priority class (round-robin fairness), selects the head of the
    /// most urgent class, marks it `Running`, and reports the pair of
    /// contexts the switch must cross. `None` means no switch is needed:
    /// either the current task was re-selected, or there is nothing to
    /// run and no caller to return to.
    fn reschedule(&mut self) -> Option<(*mut TaskContext, *const TaskContext)> {
        if let Some(current) = self.current {
            // Safety: the current task occupies a live stack.
            if unsafe { current.as_ref().state } == TaskState::Running {
                unsafe { (*current.as_ptr()).state = TaskState::Ready };
                self.queue.push(current);
            }
        }

        match self.queue.take_most_urgent() {
            Some(next) => {
                let prev_ctx: *mut TaskContext = match self.current {
                    Some(current) => unsafe { &mut (*current.as_ptr()).context },
                    None => &mut self.boot_context,
                };
                // Safety: selected tasks occupy live stacks.
                unsafe { (*next.as_ptr()).state = TaskState::Running };
                let reselected = self.current == Some(next);
                self.current = Some(next);
                if reselected {
                    return None;
                }
                trace!("switch to task {}", unsafe { next.as_ref().id.thread_id });
                Some((prev_ctx, unsafe { &(*next.as_ptr()).context as *const _ }))
            }
            None => {
                // Queue drained. If a (no longer eligible) task called
                // us, park its state and resume the boot context; if the
                // boot context itself called us, there is nothing to do.
                let previous = self.current.take()?;
                let prev_ctx = unsafe { &mut (*previous.as_ptr()).context as *mut _ };
                trace!("run queue empty, resuming boot context");
                Some((prev_ctx, &self.boot_context))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskStack;

    extern "C" fn nop_entry() {}

    fn place(stack: &mut TaskStack, priority: u8, thread_id: u64) -> NonNull<Task> {
        unsafe { Task::place(stack, nop_entry, priority, thread_id) }
    }

    fn current_thread(sched: &Scheduler) -> u64 {
        sched.current_id().expect("a task should be running").thread_id
    }

    /// Drive one scheduling decision, ignoring the context pair.
    fn select(sched: &mut Scheduler) {
        let _ = sched.reschedule();
    }

    /// Simulate the current task finishing: the teardown path marks it
    /// terminated, removes it (usually a no-op) and reschedules.
    fn terminate_current(sched: &mut Scheduler) {
        let current = sched.current().unwrap();
        unsafe { (*current.as_ptr()).state = TaskState::Terminated };
        let id = unsafe { current.as_ref().id };
        sched.remove_task(id);
        select(sched);
    }

    #[test]
    fn test_round_robin_within_one_priority_class() {
        let mut stacks = [TaskStack::new(), TaskStack::new(), TaskStack::new()];
        let mut sched = Scheduler::new();
        sched.init();
        for (index, stack) in stacks.iter_mut().enumerate() {
            sched.add_task(place(stack, 1, index as u64 + 1));
        }

        // Three full cycles: every task selected exactly once per cycle,
        // in creation order.
        let mut order = [0u64; 9];
        for slot in order.iter_mut() {
            select(&mut sched);
            *slot = current_thread(&sched);
        }
        assert_eq!(order, [1, 2, 3, 1, 2, 3, 1, 2, 3]);
    }

    #[test]
    fn test_most_urgent_class_always_wins() {
        let mut high_stack = TaskStack::new();
        let mut low_stack = TaskStack::new();
        let mut sched = Scheduler::new();
        sched.init();
        sched.add_task(place(&mut low_stack, 5, 1));
        sched.add_task(place(&mut high_stack, 0, 2));

        // The high-priority task is re-selected on every decision while
        // it stays eligible; the low one starves.
        for _ in 0..4 {
            select(&mut sched);
            assert_eq!(current_thread(&sched), 2);
        }

        terminate_current(&mut sched);
        assert_eq!(current_thread(&sched), 1);
    }

    #[test]
    fn test_removing_an_absent_task_is_a_no_op() {
        let mut stack = TaskStack::new();
        let mut sched = Scheduler::new();
        sched.init();
        sched.add_task(place(&mut stack, 1, 1));

        sched.remove_task(TaskId::new(99));
        assert_eq!(sched.queued(), 1);

        // The selected task is outside the queue; removing it twice is
        // equally fine — this is the teardown path.
        select(&mut sched);
        sched.remove_task(TaskId::new(1));
        sched.remove_task(TaskId::new(1));
        assert_eq!(sched.queued(), 0);
        assert_eq!(current_thread(&sched), 1);
    }

    #[test]
    fn test_exactly_one_task_is_running() {
        let mut stacks = [TaskStack::new(), TaskStack::new()];
        let mut sched = Scheduler::new();
        sched.init();
        let first = place(&mut stacks[0], 1, 1);
        let second = place(&mut stacks[1], 1, 2);
        let tasks = [first, second];
        for task in tasks {
            sched.add_task(task);
        }

        assert!(sched.current_id().is_none());
        for _ in 0..5 {
            select(&mut sched);
            let running = tasks
                .iter()
                .filter(|t| unsafe { t.as_ref().state } == TaskState::Running)
                .count();
            assert_eq!(running, 1);
        }
    }

    #[test]
    fn test_reselecting_the_only_task_needs_no_switch() {
        let mut stack = TaskStack::new();
        let mut sched = Scheduler::new();
        sched.init();
        sched.add_task(place(&mut stack, 1, 1));

        assert!(sched.reschedule().is_some()); // boot → task
        assert!(sched.reschedule().is_none()); // task yields to itself
        assert_eq!(current_thread(&sched), 1);
        assert_eq!(sched.queued(), 0);
        let current = sched.current().unwrap();
        assert_eq!(unsafe { current.as_ref().state }, TaskState::Running);
    }

    #[test]
    fn test_termination_hands_off_without_revisiting_the_task() {
        let mut stacks = [TaskStack::new(), TaskStack::new()];
        let mut sched = Scheduler::new();
        sched.init();
        let first = place(&mut stacks[0], 1, 1);
        sched.add_task(first);
        sched.add_task(place(&mut stacks[1], 1, 2));

        select(&mut sched);
        assert_eq!(current_thread(&sched), 1);

        terminate_current(&mut sched);
        assert_eq!(current_thread(&sched), 2);
        assert_eq!(unsafe { first.as_ref().state }, TaskState::Terminated);
        assert_eq!(sched.queued(), 0);

        // The terminated task never becomes current again.
        for _ in 0..3 {
            select(&mut sched);
            assert_eq!(current_thread(&sched), 2);
        }
    }

    #[test]
    fn test_drained_queue_falls_back_to_the_boot_context() {
        let mut stack = TaskStack::new();
        let mut sched = Scheduler::new();
        sched.init();
        sched.add_task(place(&mut stack, 0, 1));

        select(&mut sched);
        let current = sched.current().unwrap();
        unsafe { (*current.as_ptr()).state = TaskState::Terminated };
        sched.remove_task(TaskId::new(1));

        let boot_ctx = &sched.boot_context as *const TaskContext;
        let (prev, next) = sched.reschedule().expect("switch back to boot");
        assert_eq!(next, boot_ctx);
        assert_eq!(prev, unsafe { &mut (*current.as_ptr()).context as *mut _ });
        assert!(sched.current_id().is_none());

        // And with no caller to park, a further decision is a no-op.
        assert!(sched.reschedule().is_none());
    }

    #[test]
    fn test_priority_and_round_robin_end_to_end() {
        // Three tasks: A and B share a class and each run five times
        // before finishing; C is more urgent and runs once. The
        // selection sequence interleaves both rules.
        let mut stacks = [TaskStack::new(), TaskStack::new(), TaskStack::new()];
        let mut sched = Scheduler::new();
        sched.init();
        let (a, b, c) = (1u64, 2u64, 3u64);
        sched.add_task(place(&mut stacks[0], 1, a)); // A
        sched.add_task(place(&mut stacks[1], 1, b)); // B
        sched.add_task(place(&mut stacks[2], 0, c)); // C

        // Runs each task performs before finishing, indexed by thread id.
        let mut remaining = [5u32, 5, 1];

        let mut observed = [0u64; 16];
        let mut runs = 0;
        select(&mut sched);
        while let Some(id) = sched.current_id() {
            observed[runs] = id.thread_id;
            runs += 1;
            assert!(runs < observed.len(), "scheduler failed to wind down");

            let slot = (id.thread_id - 1) as usize;
            remaining[slot] -= 1;
            if remaining[slot] == 0 {
                // Body returned: the teardown path marks and removes it.
                let current = sched.current().unwrap();
                unsafe { (*current.as_ptr()).state = TaskState::Terminated };
                sched.remove_task(id);
            }
            // Yield and teardown both funnel into the same decision.
            select(&mut sched);
        }

        assert_eq!(runs, 11);
        assert_eq!(&observed[..runs], &[c, a, b, a, b, a, b, a, b, a, b]);
    }
}
