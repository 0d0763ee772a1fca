//! Kernel heap allocator.
//!
//! A bump-then-reuse first-fit allocator: new requests walk the chain of
//! previously carved blocks looking for a free one big enough before
//! falling back to bumping the high-water mark. Freed blocks are never
//! coalesced with their neighbours, matching `original_source/malloc.c`.
//! Each block carries a `{status, size}` header and a 4-byte guard word
//! right after the header; `free` checks the guard and raises a fatal
//! internal trap (vector 25) on mismatch, rather than corrupting memory
//! silently.

use core::alloc::{GlobalAlloc, Layout};
use core::mem::size_of;

use spin::Mutex;

use crate::config::{HEAP_SIZE, HEAP_START};

const GUARD_MAGIC: u32 = 0xFEED_C0DE;
const STATUS_FREE: u8 = 0;
const STATUS_USED: u8 = 1;

#[repr(C)]
struct BlockHeader {
    status: u8,
    size: u32,
    guard: u32,
}

const HEADER_SIZE: usize = size_of::<BlockHeader>();

struct HeapState {
    /// Offset from `HEAP_START` of the first byte not yet carved into a
    /// block.
    bump: usize,
}

struct KernelHeap {
    state: Mutex<HeapState>,
}

#[global_allocator]
static ALLOCATOR: KernelHeap = KernelHeap {
    state: Mutex::new(HeapState { bump: 0 }),
};

/// No-op: the heap region is carved out of identity-mapped memory by
/// `mm::paging::init`; there's nothing left to do beyond logging.
pub fn init() {
    crate::println!(
        "[HEAP] {} bytes available at {:#x}",
        HEAP_SIZE,
        HEAP_START
    );
}

impl KernelHeap {
    fn header_at(offset: usize) -> *mut BlockHeader {
        (HEAP_START + offset) as *mut BlockHeader
    }

    /// Walks already-carved blocks from the start of the heap looking
    /// for a free one at least `size` bytes. Returns its offset.
    fn find_free_fit(&self, state: &HeapState, size: usize) -> Option<usize> {
        let mut offset = 0usize;
        while offset < state.bump {
            // SAFETY: every offset < bump was written by a prior alloc.
            let header = unsafe { &*Self::header_at(offset) };
            let block_size = header.size as usize;
            if header.status == STATUS_FREE && block_size >= size {
                return Some(offset);
            }
            offset += HEADER_SIZE + block_size;
        }
        None
    }
}

// SAFETY: `KernelHeap` only exposes shared access through its internal
// `Mutex`; nothing here assumes thread affinity.
unsafe impl Sync for KernelHeap {}

// SAFETY: see per-method reasoning; all bookkeeping is behind `state`'s
// mutex and block headers are never aliased as `&mut` concurrently.
unsafe impl GlobalAlloc for KernelHeap {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let size = layout.size().max(layout.align());
        let mut state = self.state.lock();

        let offset = match self.find_free_fit(&state, size) {
            Some(offset) => offset,
            None => {
                let offset = state.bump;
                if offset + HEADER_SIZE + size > HEAP_SIZE {
                    return core::ptr::null_mut();
                }
                state.bump = offset + HEADER_SIZE + size;
                offset
            }
        };

        // SAFETY: offset is within the heap and large enough for a header.
        let header = unsafe { &mut *Self::header_at(offset) };
        header.status = STATUS_USED;
        header.size = size as u32;
        header.guard = GUARD_MAGIC;

        let payload = (HEAP_START + offset + HEADER_SIZE) as *mut u8;
        // SAFETY: payload..payload+size is within the block just carved.
        unsafe { core::ptr::write_bytes(payload, 0, size) };
        payload
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        let offset = ptr as usize - HEADER_SIZE - HEAP_START;
        // SAFETY: every pointer this allocator handed out has a header
        // immediately before it at this offset.
        let header = unsafe { &mut *Self::header_at(offset) };
        if header.guard != GUARD_MAGIC || header.status != STATUS_USED {
            // Invalid free: the guard was overwritten or this block was
            // already freed. Matches the original's `INT $0x19` trap.
            crate::arch::x86::interrupts::raise_invalid_free();
        }
        header.status = STATUS_FREE;
    }
}

#[cfg(test)]
mod tests {
    use alloc::boxed::Box;
    use alloc::vec::Vec;

    #[test_case]
    fn boxed_allocation_roundtrips() {
        let value = Box::new(42u32);
        assert_eq!(*value, 42);
    }

    #[test_case]
    fn vec_grows_past_first_block() {
        let mut v = Vec::new();
        for i in 0..256u32 {
            v.push(i);
        }
        assert_eq!(v.len(), 256);
        assert_eq!(v[255], 255);
    }

    #[test_case]
    fn freed_block_is_reused() {
        let first = Box::new([0u8; 64]);
        let first_addr = first.as_ptr() as usize;
        drop(first);
        let second = Box::new([0u8; 64]);
        assert_eq!(second.as_ptr() as usize, first_addr);
    }
}
