use core::mem;
use core::ptr::NonNull;

use crate::buffer::{HeapAllocator, RawAllocator, Region};
use crate::chunk::{self, drop_glue, effective_align, ChunkHeader, DtorFn, HEADER_STRIDE};
use crate::hardening::{self, cookies};
use crate::util::{is_aligned, offset_to_align, MAX_ALIGN};

/// An object stack: a bounded arena allocating heterogeneously typed
/// objects by pointer bumping.
///
/// Every allocation places a chunk header in front of the payload; the
/// headers form a singly linked list from `top_chunk` down to the first
/// allocation. Deallocating the top object pops it immediately; deallocating
/// an interior object runs its destructor and leaves a tombstone whose
/// memory is reclaimed once everything above it is gone.
///
/// An `Obstack` is single-owner and deliberately neither `Send` nor `Sync`;
/// independent arenas on different threads need no coordination.
pub struct Obstack<A: RawAllocator = HeapAllocator> {
    /// Most recently allocated chunk header, or null when empty.
    top_chunk: *mut ChunkHeader,
    /// Top of stack: first byte past the most recent payload.
    tos: *mut u8,
    memory: Region<A>,
}

impl Obstack<HeapAllocator> {
    /// Construct an arena of `capacity` bytes backed by the process heap.
    ///
    /// # Panics
    /// Panics when `capacity` is zero or the heap refuses the buffer;
    /// construction failure is fatal by contract.
    pub fn new(capacity: usize) -> Self {
        Self::with_allocator(capacity, HeapAllocator)
    }
}

impl<A: RawAllocator> Obstack<A> {
    /// Construct an arena of `capacity` bytes acquired from `allocator`.
    ///
    /// When sizing `capacity`, budget [`Obstack::max_overhead`] bytes on
    /// top of the payload bytes you intend to store.
    ///
    /// # Panics
    /// Panics when `capacity` is zero or the allocator returns null.
    pub fn with_allocator(capacity: usize, allocator: A) -> Self {
        assert!(capacity > 0, "obstack with capacity of 0 requested");
        let memory =
            Region::acquire(capacity, allocator).expect("raw allocator failed to supply a buffer");
        let tos = memory.base();
        Obstack {
            top_chunk: core::ptr::null_mut(),
            tos,
            memory,
        }
    }

    /// Construct an arena over a caller-owned buffer, e.g. stack space.
    /// The allocator's `deallocate` still runs at teardown, so pass one
    /// whose release is a no-op (see
    /// [`NullAllocator`](crate::buffer::NullAllocator)).
    ///
    /// # Safety
    /// `buffer` must be aligned to [`MAX_ALIGN`], valid for writes of
    /// `size` bytes, and must outlive the arena.
    ///
    /// # Panics
    /// Panics when `buffer` is null, unaligned, or `size` is zero.
    pub unsafe fn from_raw_buffer(buffer: *mut u8, size: usize, allocator: A) -> Self {
        assert!(!buffer.is_null(), "supplied buffer is null");
        assert!(size > 0, "supplied buffer size is 0");
        assert!(
            is_aligned(buffer as usize, MAX_ALIGN),
            "supplied buffer is not max-aligned"
        );
        let memory = Region::adopt(buffer, size, allocator);
        Obstack {
            top_chunk: core::ptr::null_mut(),
            tos: buffer,
            memory,
        }
    }

    /// Allocate `value` on the stack, returning a pointer stable for the
    /// arena's lifetime, or `None` when the remaining capacity cannot hold
    /// the chunk. On failure no state changes and `value` is dropped.
    pub fn alloc<T>(&mut self, value: T) -> Option<NonNull<T>> {
        let pad = self.fit(effective_align::<T>(), mem::size_of::<T>())?;
        unsafe {
            let obj = self.push_chunk(pad, mem::size_of::<T>(), cookies::mask_dtor(drop_glue::<T>));
            let obj = obj as *mut T;
            obj.write(value);
            Some(NonNull::new_unchecked(obj))
        }
    }

    /// Allocate with late construction: the chunk is committed, then `init`
    /// builds the value directly into it.
    ///
    /// The chunk is committed carrying the free marker and only swaps in
    /// the real drop glue after `init` returns. A panicking `init` thus
    /// leaves a well-formed tombstone -- capacity stays consumed, and no
    /// destructor ever sees the unconstructed payload.
    pub fn alloc_with<T, F>(&mut self, init: F) -> Option<NonNull<T>>
    where
        F: FnOnce() -> T,
    {
        let pad = self.fit(effective_align::<T>(), mem::size_of::<T>())?;
        unsafe {
            let obj = self.push_chunk(pad, mem::size_of::<T>(), cookies::free_marker_xor());
            let obj = obj as *mut T;
            obj.write(init());
            let dtor_xor = cookies::mask_dtor(drop_glue::<T>);
            (*self.top_chunk).dtor_xor = dtor_xor;
            (*self.top_chunk).checksum = cookies::make_checksum((*self.top_chunk).prev, dtor_xor);
            Some(NonNull::new_unchecked(obj))
        }
    }

    /// Allocate `count` contiguous uninitialised elements of `T`.
    ///
    /// `T: Copy` guarantees trivial destruction, so the chunk records the
    /// no-op array marker instead of per-element drop glue -- no element
    /// count needs to be stored. `count == 0` yields a payload-free chunk
    /// whose (non-null) pointer deallocates like any other.
    pub fn alloc_array<T: Copy>(&mut self, count: usize) -> Option<NonNull<T>> {
        let bytes = mem::size_of::<T>().checked_mul(count)?;
        let pad = self.fit(effective_align::<T>(), bytes)?;
        unsafe {
            let obj = self.push_chunk(pad, bytes, cookies::array_marker_xor());
            Some(NonNull::new_unchecked(obj as *mut T))
        }
    }

    /// Destruct one object and reclaim memory where possible.
    ///
    /// For the top object the destructor runs and the stack rewinds across
    /// it plus any run of tombstones beneath. For an interior object only
    /// the destructor runs; the memory waits, blocked by objects above.
    /// Null is a no-op. A header that fails its integrity check refuses the
    /// operation (panics in debug builds).
    ///
    /// # Safety
    /// `obj` must be null or a payload pointer obtained from this arena's
    /// `alloc` / `alloc_with` / `alloc_array` that has been neither
    /// deallocated nor swept by [`dealloc_all`](Self::dealloc_all).
    pub unsafe fn dealloc(&mut self, obj: *mut u8) {
        if obj.is_null() {
            return;
        }
        let chead = chunk::header_of(obj);
        if chead == self.top_chunk {
            self.pop(chead, obj);
        } else if let Some(dtor) = self.mark_destructed(chead) {
            // interior destruct: the destructor runs, the memory stays
            // blocked behind later allocations
            dtor(obj);
        }
    }

    /// Destruct every live object in reverse allocation order and reclaim
    /// the whole stack. Callers rely on the strict ordering for nested
    /// resource semantics. Idempotent; also runs from `Drop`.
    ///
    /// A destructor panic aborts the sweep at that object with all
    /// invariants restored; calling `dealloc_all` again resumes it.
    pub fn dealloc_all(&mut self) {
        unsafe {
            while !self.top_chunk.is_null() {
                let chead = self.top_chunk;
                if !self.pop(chead, chunk::payload_of(chead)) {
                    // corrupted top header: refuse to walk the chain further
                    break;
                }
            }
        }
    }

    /// Whether `obj` is the payload of the most recent live chunk.
    pub fn is_top(&self, obj: *const u8) -> bool {
        !self.top_chunk.is_null()
            && !obj.is_null()
            && chunk::header_of(obj) == self.top_chunk
    }

    /// Advisory validity probe: `obj` points strictly inside the arena and
    /// the header in front of it carries a coherent checksum.
    ///
    /// True for every live allocation. For other interior pointers a false
    /// positive needs a checksum collision against the process cookies, so
    /// treat the answer as a diagnostic aid, not a security decision.
    pub fn is_valid(&self, obj: *const u8) -> bool {
        let base = self.memory.base() as usize;
        let end = base + self.memory.capacity();
        let addr = obj as usize;
        if addr <= base || addr >= end {
            return false;
        }
        let chead_addr = addr.wrapping_sub(HEADER_STRIDE);
        if chead_addr < base || !is_aligned(chead_addr, mem::align_of::<ChunkHeader>()) {
            return false;
        }
        let chead = chead_addr as *const ChunkHeader;
        unsafe { cookies::checksum_ok((*chead).prev, (*chead).dtor_xor, (*chead).checksum) }
    }

    /// Bytes currently occupied, including headers, padding and tombstones.
    pub fn size(&self) -> usize {
        self.tos as usize - self.memory.base() as usize
    }

    /// Total bytes the arena can hold.
    pub fn capacity(&self) -> usize {
        self.memory.capacity()
    }

    /// Worst-case header-plus-padding overhead for `count` allocations of
    /// any mix of types aligned up to [`MAX_ALIGN`]. Actual overhead may be
    /// less, never more. Independent of the backing allocator.
    pub const fn max_overhead(count: usize) -> usize {
        count.saturating_mul(HEADER_STRIDE + MAX_ALIGN)
    }

    /// Padding needed in front of the next chunk so its payload meets
    /// `align`, or `None` when padding + header + payload exceed the
    /// remaining capacity. Exact fits succeed.
    #[inline]
    fn fit(&self, align: usize, bytes: usize) -> Option<usize> {
        let pad = offset_to_align((self.tos as usize).wrapping_add(HEADER_STRIDE), align);
        let avail = self.memory.end() as usize - self.tos as usize;
        let needed = pad.checked_add(HEADER_STRIDE)?.checked_add(bytes)?;
        if needed <= avail {
            Some(pad)
        } else {
            None
        }
    }

    /// Write and link a fresh chunk header, bump `tos` past the payload,
    /// and return the payload address.
    ///
    /// # Safety
    /// `pad` and `bytes` must come from a successful [`fit`](Self::fit)
    /// with no intervening state change.
    unsafe fn push_chunk(&mut self, pad: usize, bytes: usize, dtor_xor: usize) -> *mut u8 {
        let chead = self.tos.add(pad) as *mut ChunkHeader;
        chead.write(ChunkHeader {
            prev: self.top_chunk,
            dtor_xor,
            checksum: cookies::make_checksum(self.top_chunk, dtor_xor),
        });
        self.top_chunk = chead;
        let obj = chunk::payload_of(chead);
        self.tos = obj.add(bytes);
        obj
    }

    /// Pop a top chunk: mark it free, rewind, run the real destructor,
    /// then poison whatever span the rewind reclaimed. Returns false when
    /// the header failed its integrity check and nothing was done.
    ///
    /// The destructor runs after the rewind, so internal invariants are
    /// already restored if it panics; the poison fill runs after the
    /// destructor, so the payload is still intact while it executes.
    unsafe fn pop(&mut self, chead: *mut ChunkHeader, obj: *mut u8) -> bool {
        debug_assert!(chead == self.top_chunk);
        let dtor = match self.mark_destructed(chead) {
            Some(dtor) => dtor,
            None => return false,
        };
        #[cfg(feature = "poison-on-free")]
        let prior_tos = self.tos;
        self.reclaim();
        dtor(obj);
        #[cfg(feature = "poison-on-free")]
        hardening::poison::poison_region(self.tos, prior_tos as usize - self.tos as usize);
        true
    }

    /// Verify the header, swap its destructor slot for the free marker and
    /// hand back the real destructor. `None` means the checksum failed and
    /// nothing was touched.
    unsafe fn mark_destructed(&mut self, chead: *mut ChunkHeader) -> Option<DtorFn> {
        if !cookies::checksum_ok((*chead).prev, (*chead).dtor_xor, (*chead).checksum) {
            hardening::integrity_failure("obstack: chunk header integrity check failed");
            return None;
        }
        let masked = mem::replace(&mut (*chead).dtor_xor, cookies::free_marker_xor());
        // checksum deliberately left stale; tombstones are only read via
        // the trusted top_chunk walk
        Some(cookies::unmask_dtor(masked))
    }

    /// Rewind `tos` and `top_chunk` across the run of tombstones at the
    /// top. O(k) in consecutive freed chunks, amortised O(1) over a
    /// balanced workload.
    unsafe fn reclaim(&mut self) {
        let free_xor = cookies::free_marker_xor();
        while !self.top_chunk.is_null() && (*self.top_chunk).dtor_xor == free_xor {
            self.tos = self.top_chunk as *mut u8;
            self.top_chunk = (*self.top_chunk).prev;
        }
        if self.top_chunk.is_null() {
            // rewind across leading padding too, so an emptied arena
            // reports size() == 0 even after an over-aligned first chunk
            self.tos = self.memory.base();
        }
    }
}

impl<A: RawAllocator> Drop for Obstack<A> {
    fn drop(&mut self) {
        self.dealloc_all();
        // Region releases the buffer, even if a destructor panicked above
    }
}
