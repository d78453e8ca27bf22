//! A hardened object stack: O(1) arena allocation with stack-order reuse
//! and out-of-order destruction.
//!
//! An [`Obstack`] owns one contiguous, fixed-capacity buffer. Allocation
//! bumps a top-of-stack pointer; everything behind the pointer is occupied,
//! everything in front is free. Each payload is preceded by a small chunk
//! header recording the previous chunk and the payload's destructor, so
//! arbitrary user types can be destroyed without their static type.
//!
//! Deallocation separates *destruction* from *reclamation*: destroying the
//! top object frees its memory immediately, destroying an interior object
//! runs its destructor and leaves a tombstone that is reclaimed once every
//! later allocation is gone.
//!
//! The destructor pointers stored in-band would be a code-reuse target for
//! anyone who can scribble over arena memory, so they are masked with a
//! per-process random cookie, and each header carries a cookie-salted
//! checksum that catches overruns from neighbouring chunks.
//!
//! Memory layout:
//!
//! ```text
//!              |padding       |padding       |padding
//! |chunk_header||chunk_header ||chunk_header ||chunk_header
//! |  | payload ||  | payload  ||  | payload  ||  | payload  |
//! ____________________________________________________________..._____
//! |  |         ||  |          ||  |          ||  |          |        |
//! ------------------------------------------------------------...-----
//! ^                                           ^              ^        ^
//! base                                        top_chunk      tos      end
//! ```
//!
//! # Examples
//!
//! ```
//! use obstack::Obstack;
//!
//! let mut stack = Obstack::new(64 * 1024);
//!
//! let point = stack.alloc((1.0f64, 2.0f64)).unwrap();
//! let label = stack.alloc(String::from("origin")).unwrap();
//!
//! unsafe {
//!     assert_eq!(label.as_ref().as_str(), "origin");
//!     stack.dealloc(label.as_ptr().cast()); // top of stack: reclaimed at once
//!     stack.dealloc(point.as_ptr().cast());
//! }
//! assert_eq!(stack.size(), 0);
//! ```
//!
//! Arenas can also live on caller-owned memory, e.g. stack space:
//!
//! ```
//! use obstack::{NullAllocator, Obstack};
//!
//! #[repr(align(16))]
//! struct Backing([u8; 4096]);
//!
//! let mut backing = Backing([0; 4096]);
//! let mut stack = unsafe {
//!     Obstack::from_raw_buffer(backing.0.as_mut_ptr(), backing.0.len(), NullAllocator)
//! };
//! assert!(stack.alloc(42u64).is_some());
//! ```

pub mod arena;
pub mod buffer;

mod chunk;
mod config;
mod hardening;
mod platform;
mod util;

pub use arena::Obstack;
pub use buffer::{HeapAllocator, MapAllocator, NullAllocator, RawAllocator};
pub use hardening::cookies::invalid_addr;
pub use util::MAX_ALIGN;
