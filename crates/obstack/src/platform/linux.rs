use core::ptr;

pub unsafe fn map_anonymous(size: usize) -> *mut u8 {
    let result = libc::mmap(
        ptr::null_mut(),
        size,
        libc::PROT_READ | libc::PROT_WRITE,
        libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
        -1,
        0,
    );
    if result == libc::MAP_FAILED {
        ptr::null_mut()
    } else {
        result as *mut u8
    }
}

pub unsafe fn unmap(ptr: *mut u8, size: usize) {
    libc::munmap(ptr as *mut libc::c_void, size);
}

/// Draw 64 bits from the getrandom(2) urandom pool.
pub fn os_entropy64() -> Option<u64> {
    let mut bits: u64 = 0;
    let n = unsafe {
        libc::getrandom(
            &mut bits as *mut u64 as *mut libc::c_void,
            core::mem::size_of::<u64>(),
            0,
        )
    };
    if n == core::mem::size_of::<u64>() as libc::ssize_t {
        Some(bits)
    } else {
        None
    }
}
