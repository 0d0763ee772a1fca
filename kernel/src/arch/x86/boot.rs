//! Multiboot entry point.
//!
//! GRUB loads the kernel per the multiboot v1 header below and jumps to
//! `_start` with `esp` unspecified, so the very first thing this does is
//! point it at a statically-allocated stack before calling into
//! [`crate::kernel_main`] — matching how `original_source/boot.S` hands
//! off to `kernel_main` in the original teaching kernel.

use core::arch::global_asm;

const STACK_SIZE: usize = 16 * 1024;

#[repr(align(16))]
struct BootStack([u8; STACK_SIZE]);

#[no_mangle]
static mut BOOT_STACK: BootStack = BootStack([0; STACK_SIZE]);

const MULTIBOOT_MAGIC: u32 = 0x1BADB002;
const MULTIBOOT_FLAGS: u32 = 0x0;
const MULTIBOOT_CHECKSUM: u32 = (0xFFFF_FFFFu32 - MULTIBOOT_MAGIC - MULTIBOOT_FLAGS).wrapping_add(1);

global_asm!(
    r#"
.intel_syntax noprefix

.section .multiboot
.align 4
.long {magic}
.long {flags}
.long {checksum}

.section .text
.global _start
_start:
lea esp, [{stack} + {stack_size}]
mov ebp, esp
call kernel_main
2:
hlt
jmp 2b
"#,
    magic = const MULTIBOOT_MAGIC,
    flags = const MULTIBOOT_FLAGS,
    checksum = const MULTIBOOT_CHECKSUM,
    stack = sym BOOT_STACK,
    stack_size = const STACK_SIZE,
);
