//! Kernel entry point. The multiboot trampoline in
//! `arch::x86::boot` calls [`kernel_main`] once it's put a stack under us.

#![no_std]
#![no_main]

use core::panic::PanicInfo;

use puffy_kernel::{arch, log_error, println};

#[no_mangle]
pub extern "C" fn kernel_main() -> ! {
    println!("puffy-kernel ({})", env!("GIT_HASH"));

    // SAFETY: first and only call, right after the boot trampoline hands
    // off with a valid stack and nothing else running.
    unsafe { puffy_kernel::init(0x0040_0000) };

    println!("all terminals ready");
    loop {
        arch::x86::halt();
    }
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    log_error!("panic: {}", info);
    println!("KERNEL PANIC: {}", info);
    loop {
        arch::x86::halt();
    }
}
