//! Kernel library: subsystem wiring and, under `cfg(test)`, the custom
//! test harness `cargo test` drives against the bare-metal target.

#![no_std]
#![cfg_attr(test, no_main)]
#![feature(custom_test_frameworks)]
#![cfg_attr(not(test), feature(alloc_error_handler))]
#![test_runner(crate::test_runner)]
#![reexport_test_harness_main = "test_main"]

extern crate alloc;

#[macro_use]
pub mod print;
#[macro_use]
pub mod serial;

pub mod arch;
pub mod config;
pub mod drivers;
pub mod error;
pub mod fs;
pub mod logging;
pub mod mm;
pub mod process;
pub mod sched;
pub mod syscall;

pub use log::{
    debug as log_debug, error as log_error, info as log_info, trace as log_trace, warn as log_warn,
};

use core::panic::PanicInfo;

/// Brings every subsystem up in dependency order: CPU descriptor tables
/// and the PIC/IDT first (so a fault anywhere later in boot has
/// somewhere to go), then paging and the heap, then the read-only
/// filesystem module the bootloader handed off, then device drivers,
/// and finally one shell per terminal.
///
/// # Safety
/// Must be called exactly once, at the very start of execution, and
/// `fs_module_base` must point at a valid filesystem image placed there
/// before the kernel was entered.
pub unsafe fn init(fs_module_base: usize) {
    logging::init();
    // SAFETY: called once, in the order each subsystem's own contract
    // requires; see each `init`'s doc comment.
    unsafe {
        arch::init();
        mm::init();
        fs::init(fs_module_base);
        drivers::init();
    }
    // Only terminal 0's shell spawns at boot; terminals 1 and 2 spawn
    // their shells lazily on first Alt+F2/F3 visit (see
    // `drivers::keyboard::switch_terminal`).
    if syscall::spawn_shell(0).is_err() {
        log_error!("failed to spawn initial shell on terminal 0");
    }
}

/// Heap allocation failure is unrecoverable in a `no_std` kernel; the
/// `alloc_error_handler` ABI requires diverging.
#[cfg(not(test))]
#[alloc_error_handler]
fn alloc_error_handler(layout: core::alloc::Layout) -> ! {
    panic!("allocation error: {:?}", layout);
}

#[cfg(test)]
#[no_mangle]
pub extern "C" fn _start() -> ! {
    test_main();
    loop {
        arch::x86::halt();
    }
}

#[cfg(test)]
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    test_panic_handler(info)
}

#[cfg(test)]
pub fn test_runner(tests: &[&dyn Testable]) {
    serial_println!("Running {} tests", tests.len());
    for test in tests {
        test.run();
    }
    exit_qemu(QemuExitCode::Success);
}

#[cfg(test)]
pub trait Testable {
    fn run(&self);
}

#[cfg(test)]
impl<T: Fn()> Testable for T {
    fn run(&self) {
        serial_print!("{}...\t", core::any::type_name::<T>());
        self();
        serial_println!("[ok]");
    }
}

#[cfg(test)]
pub fn test_panic_handler(info: &PanicInfo) -> ! {
    serial_println!("[failed]\n");
    serial_println!("Error: {}\n", info);
    exit_qemu(QemuExitCode::Failed)
}

#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum QemuExitCode {
    Success = 0x10,
    Failed = 0x11,
}

/// Exits QEMU via the `isa-debug-exit` device at port `0xf4`. Only used
/// by the test harness; never linked into a normal boot.
#[cfg(test)]
pub fn exit_qemu(exit_code: QemuExitCode) -> ! {
    // SAFETY: `isa-debug-exit` at port 0xf4, iosize 4, as configured for
    // the test runner's QEMU invocation.
    unsafe { crate::arch::x86::port::outl(0xf4, exit_code as u32) };
    loop {
        arch::x86::halt();
    }
}
