//! Alignment discipline, capacity boundaries, and the borrowed-buffer
//! construction path.

use obstack::{HeapAllocator, NullAllocator, Obstack, RawAllocator, MAX_ALIGN};

const DEFAULT_SIZE: usize = 64 * 1024;

fn aligned_to<T>(ptr: *const T) -> bool {
    ptr as usize % std::mem::align_of::<T>() == 0
}

/// The fixed header-to-payload distance, derived from the public overhead
/// bound: max_overhead(1) == header stride + worst-case padding.
fn header_stride() -> usize {
    Obstack::<HeapAllocator>::max_overhead(1) - MAX_ALIGN
}

// ---------------------------------------------------------------------------
// Mixed-type allocation keeps every payload aligned
// ---------------------------------------------------------------------------

fn run_alignment_confusion<A: RawAllocator>(stack: &mut Obstack<A>) {
    let c1 = stack.alloc(b'a').expect("u8");
    assert!(aligned_to(c1.as_ptr()));

    let s1 = stack.alloc(String::from("foo")).expect("String");
    assert!(aligned_to(s1.as_ptr()));

    let wide = stack.alloc(1u128).expect("u128");
    assert!(aligned_to(wide.as_ptr()));

    let c2 = stack.alloc(b'b').expect("u8");
    assert!(aligned_to(c2.as_ptr()));

    let int = stack.alloc(-1i32).expect("i32");
    assert!(aligned_to(int.as_ptr()));

    let dbl = stack.alloc(4.2f64).expect("f64");
    assert!(aligned_to(dbl.as_ptr()));

    let arr = stack.alloc_array::<u8>(3).expect("u8 array");
    assert!(aligned_to(arr.as_ptr()));

    let s2 = stack.alloc(String::from("bar")).expect("String");
    assert!(aligned_to(s2.as_ptr()));

    unsafe {
        assert_eq!(s1.as_ref().as_str(), "foo");
        assert_eq!(s2.as_ref().as_str(), "bar");
        assert_eq!(*wide.as_ref(), 1);
    }
}

#[test]
fn alignment_confusion_on_heap_arena() {
    let mut stack = Obstack::new(DEFAULT_SIZE);
    run_alignment_confusion(&mut stack);

    // eight chunks: size is payloads plus bounded per-chunk overhead
    let payloads: usize = 1 + std::mem::size_of::<String>() + 16 + 1 + 4 + 8 + 3
        + std::mem::size_of::<String>();
    assert!(stack.size() >= payloads + 8 * header_stride());
    assert!(stack.size() <= payloads + Obstack::<HeapAllocator>::max_overhead(8));
    assert_eq!(stack.capacity(), DEFAULT_SIZE);

    stack.dealloc_all();
    assert_eq!(stack.size(), 0);
}

#[test]
fn alignment_confusion_on_borrowed_stack_buffer() {
    #[repr(align(16))]
    struct Backing([u8; DEFAULT_SIZE]);

    let mut backing = Backing([0; DEFAULT_SIZE]);
    let mut stack = unsafe {
        Obstack::from_raw_buffer(backing.0.as_mut_ptr(), backing.0.len(), NullAllocator)
    };

    assert_eq!(stack.capacity(), DEFAULT_SIZE);
    run_alignment_confusion(&mut stack);
    stack.dealloc_all();
    assert_eq!(stack.size(), 0);
}

#[test]
fn over_aligned_payloads_are_honoured() {
    #[repr(align(64))]
    #[derive(Clone, Copy)]
    struct CacheLine([u8; 64]);

    let mut stack = Obstack::new(DEFAULT_SIZE);
    stack.alloc(b'x').unwrap();

    let line = stack.alloc(CacheLine([7; 64])).unwrap();
    assert_eq!(line.as_ptr() as usize % 64, 0);

    let arr = stack.alloc_array::<CacheLine>(3).unwrap();
    assert_eq!(arr.as_ptr() as usize % 64, 0);

    stack.dealloc_all();
    assert_eq!(stack.size(), 0);
}

// ---------------------------------------------------------------------------
// Capacity boundary: exact fits succeed, one byte over fails untouched
// ---------------------------------------------------------------------------

#[test]
fn exact_fit_succeeds() {
    let capacity = header_stride() + std::mem::size_of::<u64>();
    let mut stack = Obstack::new(capacity);

    let obj = stack.alloc(7u64).expect("exact fit must succeed");
    assert_eq!(stack.size(), stack.capacity());
    unsafe { assert_eq!(*obj.as_ref(), 7) };

    // completely full: even a zero-sized follow-up needs a header
    assert!(stack.alloc(()).is_none());
}

#[test]
fn one_byte_short_fails_without_state_change() {
    let capacity = header_stride() + std::mem::size_of::<u64>() - 1;
    let mut stack = Obstack::new(capacity);

    assert!(stack.alloc(7u64).is_none());
    assert_eq!(stack.size(), 0);

    // smaller requests still fit afterwards
    assert!(stack.alloc(7u32).is_some());
}

#[test]
fn exhaustion_then_release_allows_reuse() {
    let capacity = 2 * (header_stride() + std::mem::size_of::<u64>());
    let mut stack = Obstack::new(capacity);

    let first = stack.alloc(1u64).unwrap();
    let second = stack.alloc(2u64).unwrap();
    assert!(stack.alloc(3u64).is_none());

    unsafe {
        stack.dealloc(second.as_ptr().cast());
        stack.dealloc(first.as_ptr().cast());
    }
    assert_eq!(stack.size(), 0);
    assert!(stack.alloc(3u64).is_some());
}

#[test]
fn array_element_count_overflow_is_rejected() {
    let mut stack = Obstack::new(DEFAULT_SIZE);
    assert!(stack.alloc_array::<u64>(usize::MAX / 4).is_none());
    assert_eq!(stack.size(), 0);
}

// ---------------------------------------------------------------------------
// Overhead bound and allocator plumbing
// ---------------------------------------------------------------------------

#[test]
fn max_overhead_bounds_a_full_workload() {
    const COUNT: usize = 100;
    let capacity = COUNT * std::mem::size_of::<u64>() + Obstack::<HeapAllocator>::max_overhead(COUNT);
    let mut stack = Obstack::new(capacity);

    for i in 0..COUNT {
        assert!(
            stack.alloc(i as u64).is_some(),
            "allocation {} must fit inside the advertised overhead bound",
            i
        );
    }
}

/// RawAllocator wrapper counting acquisitions, to pin down the arena's
/// single-buffer contract.
struct CountingAllocator {
    inner: HeapAllocator,
    allocs: std::rc::Rc<std::cell::Cell<usize>>,
}

impl RawAllocator for CountingAllocator {
    fn allocate(&mut self, size: usize) -> *mut u8 {
        self.allocs.set(self.allocs.get() + 1);
        self.inner.allocate(size)
    }

    unsafe fn deallocate(&mut self, ptr: *mut u8, size: usize) {
        self.inner.deallocate(ptr, size);
    }
}

#[test]
fn arena_acquires_exactly_one_buffer() {
    let allocs = std::rc::Rc::new(std::cell::Cell::new(0));
    {
        let mut stack = Obstack::with_allocator(
            DEFAULT_SIZE,
            CountingAllocator {
                inner: HeapAllocator,
                allocs: allocs.clone(),
            },
        );
        for i in 0..50 {
            stack.alloc(i as u64).unwrap();
        }
        stack.dealloc_all();
        for i in 0..50 {
            stack.alloc(format!("object {}", i)).unwrap();
        }
    }
    assert_eq!(allocs.get(), 1);
}
