#![no_main]

use libfuzzer_sys::fuzz_target;
use obstack::Obstack;

/// Fuzz target interpreting the input as a sequence of arena operations.
///
/// Each operation is encoded as:
///   byte 0: opcode (0=alloc boxed, 1=alloc array, 2=dealloc, 3=reset, 4=probe)
///   byte 1-2: argument (little-endian u16: value or element count)
///   byte 3: slot index (which tracked pointer to operate on)
///
/// Up to 64 live pointers are tracked; a deallocated slot is forgotten so
/// no pointer is ever passed to dealloc twice.
const MAX_SLOTS: usize = 64;
const ARENA_CAPACITY: usize = 1 << 16;

fuzz_target!(|data: &[u8]| {
    let mut stack = Obstack::new(ARENA_CAPACITY);
    let mut slots: [Option<*mut u8>; MAX_SLOTS] = [None; MAX_SLOTS];

    let mut i = 0;
    while i + 4 <= data.len() {
        let opcode = data[i] % 5;
        let arg = u16::from_le_bytes([data[i + 1], data[i + 2]]) as usize;
        let slot = data[i + 3] as usize % MAX_SLOTS;
        i += 4;

        match opcode {
            0 => {
                // boxed payload: exercises real drop glue on every path
                if slots[slot].is_none() {
                    slots[slot] = stack
                        .alloc(Box::new(arg as u64))
                        .map(|obj| obj.as_ptr().cast::<u8>());
                }
            }
            1 => {
                // trivially destructible array, including length zero
                if slots[slot].is_none() {
                    slots[slot] = stack.alloc_array::<u8>(arg % 512).map(|obj| obj.as_ptr());
                }
            }
            2 => {
                if let Some(obj) = slots[slot].take() {
                    unsafe { stack.dealloc(obj) };
                }
            }
            3 => {
                stack.dealloc_all();
                assert_eq!(stack.size(), 0);
                slots = [None; MAX_SLOTS];
            }
            _ => {
                assert!(stack.size() <= stack.capacity());
                if let Some(obj) = slots[slot] {
                    assert!(stack.is_valid(obj.cast_const()));
                }
            }
        }
    }
    // dropping the arena sweeps every remaining payload
});
