//! Smoke-test: the kernel binary this test harness links against should
//! simply reach `_start` and run to completion without faulting.

#![no_std]
#![no_main]

use core::panic::PanicInfo;

use puffy_kernel::{exit_qemu, serial_println, test_panic_handler, QemuExitCode};

#[no_mangle]
pub extern "C" fn _start() -> ! {
    serial_println!("starting basic boot test");

    test_println();
    test_simple_assertion();

    serial_println!("all tests passed");
    exit_qemu(QemuExitCode::Success)
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    test_panic_handler(info)
}

fn test_println() {
    serial_println!("test_println output");
}

fn test_simple_assertion() {
    assert_eq!(2 + 2, 4);
}
