//! Memory management: paging and the kernel heap.

pub mod heap;
pub mod paging;

/// # Safety
/// Must run after `arch::init` (so a page fault has somewhere to go) and
/// before any process is created.
pub unsafe fn init() {
    // SAFETY: called once at boot, before any user mapping exists.
    unsafe { paging::init() };
    heap::init();
}
