//! Thread-to-core pinning for the hot loops.
//!
//! The publisher's generation loop and the shared-memory consumer's spin loop
//! sit on opposite ends of the ring; keeping each on its own core avoids
//! scheduler migrations that would show up as latency spikes. Wraps the
//! `core_affinity` crate.

use tracing::{info, warn};

/// Pin the current thread to `core_id`.
///
/// Returns whether the pin took effect. Failure (unknown core, OS refusal)
/// is logged and otherwise harmless.
pub fn pin_current(core_id: usize) -> bool {
    let Some(core) = core_affinity::get_core_ids().unwrap_or_default().into_iter().nth(core_id)
    else {
        warn!("cannot pin to core {core_id}: not present on this system");
        return false;
    };
    let ok = core_affinity::set_for_current(core);
    if ok {
        info!("pinned thread to core {core_id}");
    } else {
        warn!("pin to core {core_id} rejected by the OS");
    }
    ok
}

/// Pin the current thread if a core was configured. `None` and negative
/// values mean "leave scheduling alone".
pub fn maybe_bind(core_id: Option<i32>) {
    if let Some(id) = core_id
        && id >= 0
    {
        pin_current(id as usize);
    }
}
