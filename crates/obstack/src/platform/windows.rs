use core::ptr;

// Windows stubs: page mapping is not wired up yet, so MapAllocator
// construction fails cleanly and HeapAllocator remains the default.

pub unsafe fn map_anonymous(_size: usize) -> *mut u8 {
    ptr::null_mut() // TODO: VirtualAlloc
}

pub unsafe fn unmap(_ptr: *mut u8, _size: usize) {
    // TODO: VirtualFree
}

pub fn os_entropy64() -> Option<u64> {
    None // TODO: BCryptGenRandom; the address/clock fallback covers us meanwhile
}
