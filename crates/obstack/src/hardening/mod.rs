pub mod cookies;

#[cfg(feature = "poison-on-free")]
pub mod poison;

use crate::config;

/// Disposition for a failed chunk-header integrity check.
///
/// Debug builds panic at the corruption site. Release builds report to
/// stderr and let the caller refuse the operation, unless
/// `OBSTACK_HARD_FAIL` upgrades the disposition to an abort.
#[cold]
#[inline(never)]
pub(crate) fn integrity_failure(msg: &str) {
    if cfg!(debug_assertions) {
        panic!("{}", msg);
    }
    if config::hard_fail() {
        eprintln!("{} (aborting, OBSTACK_HARD_FAIL is set)", msg);
        std::process::abort();
    }
    eprintln!("{} (operation refused)", msg);
}
