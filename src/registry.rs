//! Parameter registry: named scalar parameters shared between the control
//! surface (knobs) and the audio thread.
//!
//! Devices never own a copy of a parameter value; they hold a handle into
//! the registry and read it live on every stamp. Writes are single `f64`
//! slots stored as bit-cast `AtomicU64`, so a knob write is observationally
//! atomic at sample granularity without a mutex on the audio thread.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A single named parameter: its live value and the value at the last
/// converged sample (`prev`), used by expressions referencing `prev(name)`.
#[derive(Debug)]
struct Slot {
    live: AtomicU64,
    prev: AtomicU64,
}

impl Slot {
    fn new(value: f64) -> Self {
        let bits = value.to_bits();
        Self {
            live: AtomicU64::new(bits),
            prev: AtomicU64::new(bits),
        }
    }
}

/// A handle to a single named parameter inside a registry.
///
/// Cheap to clone; all handles to the same name share the same slot.
#[derive(Debug, Clone)]
pub struct ParamHandle {
    slot: Arc<Slot>,
}

impl ParamHandle {
    /// The parameter's current (live) value.
    pub fn get(&self) -> f64 {
        f64::from_bits(self.slot.live.load(Ordering::Relaxed))
    }

    /// The parameter's value as of the last `commit()` call.
    pub fn prev(&self) -> f64 {
        f64::from_bits(self.slot.prev.load(Ordering::Relaxed))
    }

    /// Set the live value (called by the control surface or by a
    /// parameter-evaluator device).
    pub fn set(&self, value: f64) {
        self.slot.live.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Named scalar parameter store.
///
/// Grounded on the original implementation's simple map-based
/// `ParameterRegistry` (`getPtr`/`set`/`get`/`getAll`): devices hold a
/// [`ParamHandle`] rather than an owning copy, so control-surface writes
/// are visible to every device referencing the same name without any
/// additional plumbing.
#[derive(Debug, Default)]
pub struct ParameterRegistry {
    slots: HashMap<String, Arc<Slot>>,
}

impl ParameterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            slots: HashMap::new(),
        }
    }

    /// Get (creating with `0.0` if absent) a handle to a named parameter.
    pub fn handle(&mut self, name: &str) -> ParamHandle {
        let slot = self
            .slots
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Slot::new(0.0)))
            .clone();
        ParamHandle { slot }
    }

    /// Set a parameter's live value, creating it if absent.
    pub fn set(&mut self, name: &str, value: f64) {
        self.handle(name).set(value);
    }

    /// Get a parameter's live value, or `None` if it has never been set.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.slots
            .get(name)
            .map(|s| f64::from_bits(s.live.load(Ordering::Relaxed)))
    }

    /// All parameter names currently registered.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(|s| s.as_str())
    }

    /// Advance every parameter's `prev` snapshot to its current live value.
    /// Called once per converged sample, alongside device `update_history`.
    pub fn commit(&mut self) {
        for slot in self.slots.values() {
            let live = slot.live.load(Ordering::Relaxed);
            slot.prev.store(live, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_shares_slot_across_lookups() {
        let mut reg = ParameterRegistry::new();
        let a = reg.handle("gain");
        let b = reg.handle("gain");
        a.set(0.75);
        assert_eq!(b.get(), 0.75);
    }

    #[test]
    fn commit_snapshots_prev() {
        let mut reg = ParameterRegistry::new();
        let h = reg.handle("pos");
        h.set(0.2);
        reg.commit();
        h.set(0.9);
        assert_eq!(h.get(), 0.9);
        assert_eq!(h.prev(), 0.2);
    }

    #[test]
    fn get_returns_none_when_unset() {
        let reg = ParameterRegistry::new();
        assert_eq!(reg.get("missing"), None);
    }
}
