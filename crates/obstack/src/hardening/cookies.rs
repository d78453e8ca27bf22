use std::sync::OnceLock;

use crate::chunk::{ChunkHeader, DtorFn};
use crate::{config, platform};

/// Process-wide secrets protecting in-band chunk metadata. Generated once,
/// on the first arena construction, and never reset: re-keying would
/// invalidate every live chunk header in the process.
struct Cookies {
    /// Masks every destructor pointer stored in a chunk header.
    xor: usize,
    /// Salts the header checksum.
    checksum: usize,
    /// `free_marker_dtor` pre-masked with `xor`.
    free_marker_xor: usize,
    /// `array_marker_dtor` pre-masked with `xor`.
    array_marker_xor: usize,
}

static COOKIES: OnceLock<Cookies> = OnceLock::new();

/// A static whose address no heap or stack pointer can ever equal.
static INVALID_SENTINEL: u8 = 0;

fn cookies() -> &'static Cookies {
    COOKIES.get_or_init(|| {
        config::read_config();
        let mut xor = platform::entropy64() as usize;
        let mut checksum = platform::entropy64() as usize;
        // A zero cookie would store destructor pointers in the clear.
        if xor == 0 {
            xor = 0x9E37_79B9 ^ (&INVALID_SENTINEL as *const u8 as usize);
        }
        if checksum == 0 {
            checksum = 0x85EB_CA6B ^ xor;
        }
        Cookies {
            xor,
            checksum,
            free_marker_xor: (free_marker_dtor as DtorFn as usize) ^ xor,
            array_marker_xor: (array_marker_dtor as DtorFn as usize) ^ xor,
        }
    })
}

// The two marker destructors are no-ops, but their bodies read distinct
// statics: identical bodies could be folded to one address by the linker,
// and the reclamation scan must be able to tell the markers apart.

static FREE_MARKER_TAG: u8 = 0;
static ARRAY_MARKER_TAG: u8 = 0;

unsafe fn free_marker_dtor(_obj: *mut u8) {
    core::ptr::read_volatile(&FREE_MARKER_TAG);
}

unsafe fn array_marker_dtor(_obj: *mut u8) {
    core::ptr::read_volatile(&ARRAY_MARKER_TAG);
}

/// Mask a destructor pointer for in-arena storage. Symmetric with
/// [`unmask_dtor`].
#[inline]
pub(crate) fn mask_dtor(dtor: DtorFn) -> usize {
    (dtor as usize) ^ cookies().xor
}

/// Recover a destructor pointer previously masked with [`mask_dtor`].
///
/// # Safety
/// `masked` must be a value produced by `mask_dtor` within this process.
#[inline]
pub(crate) unsafe fn unmask_dtor(masked: usize) -> DtorFn {
    core::mem::transmute::<usize, DtorFn>(masked ^ cookies().xor)
}

/// The masked sentinel marking a destructed-but-unreclaimed chunk.
#[inline]
pub(crate) fn free_marker_xor() -> usize {
    cookies().free_marker_xor
}

/// The masked sentinel stored for arrays of trivially destructible
/// elements, where no per-element destruction is needed.
#[inline]
pub(crate) fn array_marker_xor() -> usize {
    cookies().array_marker_xor
}

/// Checksum over the two mutable header fields, salted with the process
/// checksum cookie. Weak by design: it catches overruns and stray writes
/// from neighbouring chunks, not deliberate forgery with a leaked cookie.
#[inline]
pub(crate) fn make_checksum(prev: *mut ChunkHeader, dtor_xor: usize) -> usize {
    (prev as usize) ^ dtor_xor ^ cookies().checksum
}

#[inline]
pub(crate) fn checksum_ok(prev: *mut ChunkHeader, dtor_xor: usize, checksum: usize) -> bool {
    make_checksum(prev, dtor_xor) == checksum
}

/// An address guaranteed to differ from every live heap or stack pointer,
/// for debugging comparisons.
pub fn invalid_addr() -> *const u8 {
    &INVALID_SENTINEL
}
