use std::sync::{Mutex, MutexGuard};

use tracing::warn;

/// Acquire a tier lock, recovering the guard if a panicking holder poisoned it.
///
/// Cached entries are self-contained values, so a poisoned map is still usable;
/// at worst an entry is stale until its TTL runs out.
pub(crate) fn lock_tier<'a, T>(
    lock: &'a Mutex<T>,
    tier: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    lock.lock().unwrap_or_else(|poisoned| {
        warn!(
            op,
            tier,
            result = "poisoned_recovered",
            "Recovered from poisoned cache tier lock"
        );
        poisoned.into_inner()
    })
}
