//! Vectored interrupt/exception/syscall entry stubs.
//!
//! Every vector lands in assembly first: save general registers, pass a
//! pointer to them as a `TrapFrame`, call into Rust, restore, `iret`.
//! The stubs themselves are generated once via a GNU-as macro inside a
//! single `global_asm!` block rather than duplicated by hand per vector.

use core::arch::global_asm;

use crate::drivers::{keyboard, pit, rtc};
use crate::process::current_pid;
use crate::sched;
use crate::syscall;
use crate::{println, log_error};

/// Register state captured by `pusha`, plus the vector/error code we push
/// ourselves and the frame the CPU pushes on any interrupt.
///
/// `user_esp`/`user_ss` are only meaningful when the trap interrupted
/// ring-3 code; they're the two words the CPU pushes in addition to
/// eip/cs/eflags whenever a privilege transition occurs.
#[repr(C)]
pub struct TrapFrame {
    pub edi: u32,
    pub esi: u32,
    pub ebp: u32,
    _esp_dummy: u32,
    pub ebx: u32,
    pub edx: u32,
    pub ecx: u32,
    pub eax: u32,
    pub vector: u32,
    pub error_code: u32,
    pub eip: u32,
    pub cs: u32,
    pub eflags: u32,
    pub user_esp: u32,
    pub user_ss: u32,
}

const EXCEPTION_NAMES: [&str; 20] = [
    "divide-by-zero",
    "debug",
    "non-maskable-interrupt",
    "breakpoint",
    "overflow",
    "bound-range-exceeded",
    "invalid-opcode",
    "device-not-available",
    "double-fault",
    "coprocessor-segment-overrun",
    "invalid-tss",
    "segment-not-present",
    "stack-segment-fault",
    "general-protection-fault",
    "page-fault",
    "reserved",
    "x87-fpu-error",
    "alignment-check",
    "machine-check",
    "simd-fpu-error",
];

/// Vector used for the heap allocator's "invalid free" trap, matching
/// `original_source/malloc.c`'s `INT $0x19` (25 decimal). Outside the
/// 0-19 range the CPU ever raises on its own, so it can only be reached
/// via the explicit `int 25` in [`raise_invalid_free`].
pub const INVALID_FREE_VECTOR: u8 = 25;

/// Raises the heap allocator's fatal "invalid free" trap. Never returns.
pub fn raise_invalid_free() -> ! {
    // SAFETY: `int 25` is wired to `exception_stub_25`, which never
    // returns control to its caller.
    unsafe { core::arch::asm!("int 25", options(noreturn)) }
}

/// Called from `exception_common`. Exceptions are always fatal in this
/// kernel: print the faulting process's state and halt it rather than
/// returning, matching `original_source/exceptions.c`.
#[no_mangle]
extern "C" fn exception_dispatch(frame: &TrapFrame) {
    let name = if frame.vector == INVALID_FREE_VECTOR as u32 {
        "invalid-free"
    } else {
        EXCEPTION_NAMES
            .get(frame.vector as usize)
            .copied()
            .unwrap_or("unknown-exception")
    };
    log_error!(
        "exception {} ({}) at eip={:#x}, err={:#x}, pid={:?}",
        frame.vector,
        name,
        frame.eip,
        frame.error_code,
        current_pid(),
    );
    println!("EXCEPTION: {}", name);
    match current_pid() {
        Some(pid) => sched::halt_and_resume(pid, 256),
        None => panic!("unrecoverable exception with no running process"),
    }
}

/// Called from `irq_common`. `frame.vector` carries the remapped vector
/// (32-47); the PIC line is `vector - PIC1_OFFSET`.
#[no_mangle]
extern "C" fn irq_dispatch(frame: &mut TrapFrame) {
    let irq = (frame.vector - super::pic::PIC1_OFFSET as u32) as u8;
    match irq {
        0 => pit::on_tick(frame),
        1 => keyboard::on_scancode(),
        8 => rtc::on_tick(),
        _ => {}
    }
    // SAFETY: the corresponding IRQ line is unmasked, so acking is correct.
    unsafe { super::pic::send_eoi(irq) };
}

/// Called from `syscall_common`. Writes the return value directly into
/// `frame.eax`, which `popa` restores into the real EAX register on the
/// way back to user mode.
#[no_mangle]
extern "C" fn syscall_dispatch(frame: &mut TrapFrame) {
    frame.eax = syscall::dispatch(frame) as u32;
}

global_asm!(
    r#"
.intel_syntax noprefix

.macro exception_stub vector, haserr
.global exception_stub_\vector
exception_stub_\vector:
.if \haserr == 0
push 0
.endif
push \vector
jmp exception_common
.endm

exception_stub 0, 0
exception_stub 1, 0
exception_stub 2, 0
exception_stub 3, 0
exception_stub 4, 0
exception_stub 5, 0
exception_stub 6, 0
exception_stub 7, 0
exception_stub 8, 1
exception_stub 9, 0
exception_stub 10, 1
exception_stub 11, 1
exception_stub 12, 1
exception_stub 13, 1
exception_stub 14, 1
exception_stub 15, 0
exception_stub 16, 0
exception_stub 17, 1
exception_stub 18, 0
exception_stub 19, 0
exception_stub 25, 0

exception_common:
pusha
push esp
call exception_dispatch
add esp, 4
popa
add esp, 8
iretd

.macro irq_stub num, vector
.global irq_stub_\num
irq_stub_\num:
push 0
push \vector
jmp irq_common
.endm

irq_stub 0, 32
irq_stub 1, 33
irq_stub 2, 34
irq_stub 3, 35
irq_stub 4, 36
irq_stub 5, 37
irq_stub 6, 38
irq_stub 7, 39
irq_stub 8, 40
irq_stub 9, 41
irq_stub 10, 42
irq_stub 11, 43
irq_stub 12, 44
irq_stub 13, 45
irq_stub 14, 46
irq_stub 15, 47

irq_common:
pusha
push esp
call irq_dispatch
add esp, 4
popa
add esp, 8
iretd

.global syscall_stub
syscall_stub:
push 0
push 128
pusha
push esp
call syscall_dispatch
add esp, 4
popa
add esp, 8
iretd
"#
);

extern "C" {
    fn exception_stub_0();
    fn exception_stub_1();
    fn exception_stub_2();
    fn exception_stub_3();
    fn exception_stub_4();
    fn exception_stub_5();
    fn exception_stub_6();
    fn exception_stub_7();
    fn exception_stub_8();
    fn exception_stub_9();
    fn exception_stub_10();
    fn exception_stub_11();
    fn exception_stub_12();
    fn exception_stub_13();
    fn exception_stub_14();
    fn exception_stub_15();
    fn exception_stub_16();
    fn exception_stub_17();
    fn exception_stub_18();
    fn exception_stub_19();
    pub fn exception_stub_25();

    fn irq_stub_0();
    fn irq_stub_1();
    fn irq_stub_2();
    fn irq_stub_3();
    fn irq_stub_4();
    fn irq_stub_5();
    fn irq_stub_6();
    fn irq_stub_7();
    fn irq_stub_8();
    fn irq_stub_9();
    fn irq_stub_10();
    fn irq_stub_11();
    fn irq_stub_12();
    fn irq_stub_13();
    fn irq_stub_14();
    fn irq_stub_15();

    pub fn syscall_stub();
}

pub static EXCEPTION_STUBS: [unsafe extern "C" fn(); 20] = [
    exception_stub_0,
    exception_stub_1,
    exception_stub_2,
    exception_stub_3,
    exception_stub_4,
    exception_stub_5,
    exception_stub_6,
    exception_stub_7,
    exception_stub_8,
    exception_stub_9,
    exception_stub_10,
    exception_stub_11,
    exception_stub_12,
    exception_stub_13,
    exception_stub_14,
    exception_stub_15,
    exception_stub_16,
    exception_stub_17,
    exception_stub_18,
    exception_stub_19,
];

pub static IRQ_STUBS: [unsafe extern "C" fn(); 16] = [
    irq_stub_0,
    irq_stub_1,
    irq_stub_2,
    irq_stub_3,
    irq_stub_4,
    irq_stub_5,
    irq_stub_6,
    irq_stub_7,
    irq_stub_8,
    irq_stub_9,
    irq_stub_10,
    irq_stub_11,
    irq_stub_12,
    irq_stub_13,
    irq_stub_14,
    irq_stub_15,
];
