use std::sync::atomic::{AtomicBool, Ordering};

/// Cached config values, read once from the environment during cookie
/// initialisation and immutable afterwards.
static HARD_FAIL: AtomicBool = AtomicBool::new(false);

#[cfg(feature = "poison-on-free")]
static POISON: AtomicBool = AtomicBool::new(true);

/// Read configuration from environment variables. Called exactly once,
/// from the cookie one-shot init, before the first arena exists.
pub(crate) fn read_config() {
    if let Some(val) = std::env::var_os("OBSTACK_HARD_FAIL") {
        HARD_FAIL.store(val != "0", Ordering::Relaxed);
    }
    // The poison fill is compiled in by the poison-on-free feature;
    // OBSTACK_POISON=0 turns it off at runtime.
    #[cfg(feature = "poison-on-free")]
    if let Some(val) = std::env::var_os("OBSTACK_POISON") {
        POISON.store(val != "0", Ordering::Relaxed);
    }
}

/// Whether a release-build integrity failure aborts instead of refusing.
pub(crate) fn hard_fail() -> bool {
    HARD_FAIL.load(Ordering::Relaxed)
}

/// Whether reclaimed spans are poison-filled.
#[cfg(feature = "poison-on-free")]
pub(crate) fn poison_enabled() -> bool {
    POISON.load(Ordering::Relaxed)
}
