//! Interrupt Descriptor Table.
//!
//! 256 gate descriptors built once at boot and loaded with `lidt`. Vector
//! assignment: 0-19 CPU exceptions, 32-47 remapped PIC IRQs (see `pic.rs`),
//! 128 the syscall gate (DPL=3 so ring-3 code can `int 0x80`).

use core::arch::asm;
use core::mem::size_of;

pub const SYSCALL_VECTOR: u8 = 0x80;
const GATE_INTERRUPT32: u8 = 0x8E; // present, DPL=0, 32-bit interrupt gate
const GATE_SYSCALL32: u8 = 0xEE; // present, DPL=3, 32-bit interrupt gate

#[repr(C, packed)]
#[derive(Clone, Copy)]
struct IdtEntry {
    offset_low: u16,
    selector: u16,
    zero: u8,
    type_attr: u8,
    offset_high: u16,
}

impl IdtEntry {
    const fn missing() -> Self {
        Self {
            offset_low: 0,
            selector: 0,
            zero: 0,
            type_attr: 0,
            offset_high: 0,
        }
    }

    fn new(handler: u32, selector: u16, type_attr: u8) -> Self {
        Self {
            offset_low: (handler & 0xFFFF) as u16,
            selector,
            zero: 0,
            type_attr,
            offset_high: ((handler >> 16) & 0xFFFF) as u16,
        }
    }
}

#[repr(C, packed)]
struct IdtPointer {
    limit: u16,
    base: u32,
}

const IDT_ENTRIES: usize = 256;

static mut IDT: [IdtEntry; IDT_ENTRIES] = [IdtEntry::missing(); IDT_ENTRIES];

/// Installs one gate. `handler` is the address of a `global_asm!`-generated
/// stub, never a Rust function pointer directly (the ABI at the boundary is
/// raw asm, see `interrupts.rs`).
fn set_gate(vector: u8, handler: u32, type_attr: u8) {
    // SAFETY: single-threaded boot sequence, table isn't in use yet.
    unsafe {
        let idt = &mut *core::ptr::addr_of_mut!(IDT);
        idt[vector as usize] = IdtEntry::new(handler, super::gdt::KERNEL_CODE_SELECTOR, type_attr);
    }
}

/// Populates all 256 gates from the `extern "C"` stub table in
/// `interrupts.rs` and loads the table with `lidt`.
///
/// # Safety
/// Must run after `gdt::init` and before interrupts are enabled.
pub unsafe fn init() {
    for (vector, &stub) in super::interrupts::EXCEPTION_STUBS.iter().enumerate() {
        set_gate(vector as u8, stub as u32, GATE_INTERRUPT32);
    }
    for (irq, &stub) in super::interrupts::IRQ_STUBS.iter().enumerate() {
        set_gate((super::pic::PIC1_OFFSET as usize + irq) as u8, stub as u32, GATE_INTERRUPT32);
    }
    set_gate(SYSCALL_VECTOR, super::interrupts::syscall_stub as u32, GATE_SYSCALL32);
    set_gate(
        super::interrupts::INVALID_FREE_VECTOR,
        super::interrupts::exception_stub_25 as u32,
        GATE_INTERRUPT32,
    );

    let pointer = IdtPointer {
        limit: (size_of::<[IdtEntry; IDT_ENTRIES]>() - 1) as u16,
        base: core::ptr::addr_of!(IDT) as u32,
    };
    // SAFETY: pointer refers to the static table populated above.
    unsafe {
        asm!("lidt [{0}]", in(reg) &pointer, options(readonly, nostack, preserves_flags));
    }
}
