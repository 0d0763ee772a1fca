//! Crate-wide error type.
//!
//! Unifies the error kinds a syscall handler or driver can raise. Syscall
//! dispatch maps any `KernelError` to the ABI's `-1`; nothing here ever
//! unwinds (the crate builds with `panic = "abort"`).

use core::fmt;

/// A kernel-internal error condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// A syscall argument was malformed or out of range.
    InvalidArgument,
    /// A lookup (dentry, PID, FD) found nothing.
    NotFound,
    /// `execute` was asked to run a file that isn't a valid ELF image.
    NotExecutable,
    /// No PCB slot, FD slot, or heap block is free.
    ResourceExhausted,
    /// A hardware or protection fault was taken.
    Fault,
    /// A `free` call targeted a block the allocator didn't hand out.
    InvalidFree,
    /// An IRQ line outside 0..=15 was requested.
    IrqRangeError,
    /// The scheduler found no runnable process.
    NoRunnableProcess,
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            KernelError::InvalidArgument => "invalid argument",
            KernelError::NotFound => "not found",
            KernelError::NotExecutable => "not executable",
            KernelError::ResourceExhausted => "resource exhausted",
            KernelError::Fault => "fault",
            KernelError::InvalidFree => "invalid free",
            KernelError::IrqRangeError => "irq out of range",
            KernelError::NoRunnableProcess => "no runnable process",
        };
        f.write_str(msg)
    }
}

impl KernelError {
    /// Syscall ABI return value for this error: always -1.
    pub const fn as_syscall_return(self) -> i32 {
        -1
    }
}

pub type KernelResult<T> = Result<T, KernelError>;
