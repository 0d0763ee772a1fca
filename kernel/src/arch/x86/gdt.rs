//! Global Descriptor Table and Task State Segment.
//!
//! Five flat segments (null, kernel code/data, user code/data) plus one
//! TSS descriptor. The TSS itself is only used for its `esp0`/`ss0`
//! fields: every privilege transition from ring 3 back to ring 0 reloads
//! the kernel stack pointer from here, so `set_kernel_stack` is called
//! once per process switch.

use core::arch::asm;
use core::mem::size_of;

use lazy_static::lazy_static;
use spin::Mutex;

pub const KERNEL_CODE_SELECTOR: u16 = 0x08;
pub const KERNEL_DATA_SELECTOR: u16 = 0x10;
pub const USER_CODE_SELECTOR: u16 = 0x18 | 3;
pub const USER_DATA_SELECTOR: u16 = 0x20 | 3;
const TSS_SELECTOR: u16 = 0x28;

#[repr(C, packed)]
#[derive(Clone, Copy)]
struct GdtEntry {
    limit_low: u16,
    base_low: u16,
    base_mid: u8,
    access: u8,
    granularity: u8,
    base_high: u8,
}

impl GdtEntry {
    const fn null() -> Self {
        Self {
            limit_low: 0,
            base_low: 0,
            base_mid: 0,
            access: 0,
            granularity: 0,
            base_high: 0,
        }
    }

    const fn new(base: u32, limit: u32, access: u8, granularity: u8) -> Self {
        Self {
            limit_low: (limit & 0xFFFF) as u16,
            base_low: (base & 0xFFFF) as u16,
            base_mid: ((base >> 16) & 0xFF) as u8,
            access,
            granularity: (granularity & 0xF0) | (((limit >> 16) & 0x0F) as u8),
            base_high: ((base >> 24) & 0xFF) as u8,
        }
    }
}

#[repr(C, packed)]
struct GdtPointer {
    limit: u16,
    base: u32,
}

/// x86 Task State Segment. Only `esp0`/`ss0` are live; the rest of the
/// fields exist because the CPU's hardware task-switch layout requires
/// a full structure even when we only ever `ltr` it once.
#[repr(C, packed)]
pub struct Tss {
    prev_tss: u32,
    pub esp0: u32,
    pub ss0: u32,
    esp1: u32,
    ss1: u32,
    esp2: u32,
    ss2: u32,
    cr3: u32,
    eip: u32,
    eflags: u32,
    eax: u32,
    ecx: u32,
    edx: u32,
    ebx: u32,
    esp: u32,
    ebp: u32,
    esi: u32,
    edi: u32,
    es: u32,
    cs: u32,
    ss: u32,
    ds: u32,
    fs: u32,
    gs: u32,
    ldt: u32,
    trap: u16,
    iomap_base: u16,
}

impl Tss {
    const fn new() -> Self {
        Self {
            prev_tss: 0,
            esp0: 0,
            ss0: KERNEL_DATA_SELECTOR as u32,
            esp1: 0,
            ss1: 0,
            esp2: 0,
            ss2: 0,
            cr3: 0,
            eip: 0,
            eflags: 0,
            eax: 0,
            ecx: 0,
            edx: 0,
            ebx: 0,
            esp: 0,
            ebp: 0,
            esi: 0,
            edi: 0,
            es: 0,
            cs: 0,
            ss: 0,
            ds: 0,
            fs: 0,
            gs: 0,
            ldt: 0,
            trap: 0,
            iomap_base: size_of::<Tss>() as u16,
        }
    }
}

const GDT_ENTRIES: usize = 6;

struct Gdt {
    entries: [GdtEntry; GDT_ENTRIES],
}

lazy_static! {
    static ref TSS: Mutex<Tss> = Mutex::new(Tss::new());
}

static mut GDT: Gdt = Gdt {
    entries: [GdtEntry::null(); GDT_ENTRIES],
};

/// Loads the GDT, TSS descriptor, and segment registers. Call once at boot.
///
/// # Safety
/// Must run before any interrupt or privilege transition relies on these
/// selectors, and must not run more than once.
pub unsafe fn init() {
    let tss_addr = {
        let guard = TSS.lock();
        &*guard as *const Tss as u32
    };
    let tss_limit = (size_of::<Tss>() - 1) as u32;

    // SAFETY: GDT is only written here, before `lgdt`, single-threaded boot.
    unsafe {
        let gdt = &mut *core::ptr::addr_of_mut!(GDT);
        gdt.entries[0] = GdtEntry::null();
        gdt.entries[1] = GdtEntry::new(0, 0xFFFFF, 0x9A, 0xC0); // kernel code
        gdt.entries[2] = GdtEntry::new(0, 0xFFFFF, 0x92, 0xC0); // kernel data
        gdt.entries[3] = GdtEntry::new(0, 0xFFFFF, 0xFA, 0xC0); // user code
        gdt.entries[4] = GdtEntry::new(0, 0xFFFFF, 0xF2, 0xC0); // user data
        gdt.entries[5] = GdtEntry::new(tss_addr, tss_limit, 0x89, 0x00); // TSS

        let pointer = GdtPointer {
            limit: (size_of::<[GdtEntry; GDT_ENTRIES]>() - 1) as u16,
            base: gdt.entries.as_ptr() as u32,
        };

        asm!("lgdt [{0}]", in(reg) &pointer, options(readonly, nostack, preserves_flags));
        reload_segments();
        asm!("ltr {0:x}", in(reg) TSS_SELECTOR, options(nostack, preserves_flags));
    }
}

/// # Safety
/// Only valid immediately after `lgdt` has loaded a GDT with our layout.
unsafe fn reload_segments() {
    // SAFETY: selectors match the layout just installed by `init`. `retf`
    // to a label in the current function performs the far jump needed to
    // reload CS; no rip-relative addressing, this is 32-bit code.
    unsafe {
        asm!(
            "push {sel}",
            "lea {tmp}, [2f]",
            "push {tmp}",
            "retf",
            "2:",
            "mov ax, {data_sel:x}",
            "mov ds, ax",
            "mov es, ax",
            "mov fs, ax",
            "mov gs, ax",
            "mov ss, ax",
            sel = in(reg) KERNEL_CODE_SELECTOR as u32,
            tmp = out(reg) _,
            data_sel = in(reg) KERNEL_DATA_SELECTOR,
        );
    }
}

/// Updates the TSS's ring-0 stack so the next ring-3 -> ring-0 transition
/// (interrupt or syscall) lands on the given process's kernel stack.
pub fn set_kernel_stack(esp0: u32) {
    TSS.lock().esp0 = esp0;
}
