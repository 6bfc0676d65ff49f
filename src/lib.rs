//! # rvtask — a minimal cooperative task kernel for RV64
//!
//! A single-core, preemption-ready task kernel: lightweight tasks backed
//! by statically allocated stacks, a strict-priority run queue with
//! round-robin tie-breaking, and a narrowly scoped context-switch
//! primitive that respects the RISC-V calling convention.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                 Application Tasks                    │
//! ├──────────────────────────────────────────────────────┤
//! │              Kernel API (kernel.rs)                  │
//! │   init() · create_task() · start() · yield_now()     │
//! │                    · exit()                          │
//! ├───────────────────────┬──────────────────────────────┤
//! │  Scheduler            │  Task Model (task.rs)        │
//! │  scheduler.rs         │  Task · TaskId · TaskState   │
//! │  ─ run queue          │  ThreadIdAllocator           │
//! │  ─ run()/reschedule   │  trampoline (task_rt)        │
//! ├───────────────────────┴──────────────────────────────┤
//! │          Arch Port (arch/riscv64.rs, arch/trap.rs)   │
//! │   TaskContext · init_task_stack · __task_switch      │
//! │   handle_exception · wfi idle                        │
//! ├──────────────────────────────────────────────────────┤
//! │            RV64 machine mode (QEMU virt)             │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Model
//!
//! - **Cooperative**: a task runs until it yields, terminates, or — once
//!   the trap path drives preemption — is interrupted. The context
//!   layout already saves/restores the full callee-saved set, which is
//!   exactly what any suspension point, synchronous or asynchronous,
//!   must preserve.
//! - **No heap**: every task's control structure is embedded at the base
//!   of a caller-provided, fixed-size stack region; nothing is ever
//!   allocated or freed at runtime.
//! - **Strict priority**: lower numeric priority value wins; equal
//!   priorities round-robin in creation order. Sustained high-priority
//!   load starves lower classes by design.
//!
//! The scheduler and task logic compile and unit-test on the host; only
//! the switch primitive itself is riscv64-only.

#![no_std]

pub mod arch;
pub mod config;
pub mod console;
pub mod kernel;
pub mod scheduler;
pub mod sync;
pub mod task;
