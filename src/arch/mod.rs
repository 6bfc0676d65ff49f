//! # Architecture Abstraction Layer
//!
//! Hardware-specific boundary for the task kernel. Currently implements
//! the RV64 port (QEMU `virt` machine mode); extensible to other
//! architectures by adding sibling modules.
//!
//! The ABI facts consumed by the rest of the kernel — word size, stack
//! alignment, the callee-saved register set, the first-argument register —
//! are compile-time constants of the port and are never discovered at
//! runtime.

pub mod riscv64;
pub mod trap;
